//! Sharetree CLI Binary
//!
//! Command-line interface for sharing local files as content-addressed transfers.

use anyhow::Context;
use clap::Parser;
use sharetree::logging::init_logging;
use sharetree::tooling::cli::{Cli, CliContext};
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = CliContext::new(cli.config.clone(), cli.roots.clone(), cli.collection_dir.clone())
        .context("failed to load configuration")?;

    if let Err(e) = init_logging(Some(&context.logging_config(cli))) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let output = context.execute(&cli.command)?;
    Ok(output)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
