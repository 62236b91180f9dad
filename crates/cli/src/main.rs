// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `cpost`: the Command Post supervision CLI.

mod commands;
mod exit_error;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cpost", about = "Supervise a fleet of AI agents building software")]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the supervisor until interrupted
    Run,
    /// Show the agent roster and kanban summary
    Status,
    /// Send a message into an agent's inbox
    Send(commands::send::SendArgs),
    /// File a spawn request with the admission queue
    RequestAgent(commands::request_agent::RequestAgentArgs),
    /// Run the closeout flow once, immediately
    Closeout,
}

fn init_tracing(state: &cpost_storage::StateDir) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("CPOST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    match std::fs::create_dir_all(state.logs_dir()) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(state.logs_dir(), "cpost.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let project = cli
        .project
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let state = cpost_storage::StateDir::new(project);
    let _guard = init_tracing(&state);

    let result: Result<(), ExitError> = match cli.command {
        Command::Run => commands::run::run(&state).await,
        Command::Status => commands::status::run(&state),
        Command::Send(args) => commands::send::run(&state, args),
        Command::RequestAgent(args) => commands::request_agent::run(&state, args),
        Command::Closeout => commands::closeout::run(&state).await,
    };

    if let Err(e) = result {
        eprintln!("cpost: {e}");
        std::process::exit(e.code);
    }
}
