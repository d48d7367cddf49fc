//! Tooling & Integration Layer
//!
//! Command-line front end over the share tree and the local transfer session.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
