//! Nima - command line host for the auth stack
//!
//! Run with: `nima <command>`
//!
//! This is a CLI tool, so `println!` and `eprintln!` are used for user-facing
//! output; diagnostics go through `tracing` on stderr.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::env;
use std::process::ExitCode;

use anyhow::Context;
use nima_infra::observability::{init_tracing, LogFormat};
use nima_infra::{config, AuthContext};
use tracing::debug;

mod commands;

use commands::Command;

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    init_tracing(None, LogFormat::Pretty);
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!("No .env file loaded: {}", e),
    }

    let args: Vec<String> = env::args().skip(1).collect();
    let command = match Command::parse(args.as_slice()) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            commands::print_help();
            return ExitCode::FAILURE;
        }
    };

    match run(command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("nima: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    if command == Command::Help {
        commands::print_help();
        return Ok(());
    }

    let config = config::load().context("failed to load configuration")?;
    let ctx = AuthContext::from_config(&config.auth);

    let result = commands::run(&ctx, command).await;
    ctx.dispose();
    result
}
