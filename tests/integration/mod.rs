//! Integration tests for the share tree

mod cli_contracts;
mod collection_flow;
mod local_session;
mod share_cascade;
mod support;
