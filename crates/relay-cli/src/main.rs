// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(not(test), forbid(unsafe_code))]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! `relayctl`: the admin CLI for `relayd`, talking to it over a Unix
//! socket using the `relay-wire` protocol.

mod client;
mod color;
mod commands;
mod exit_error;
mod output;

use clap::{Parser, Subcommand};
use commands::StageArg;
use exit_error::ExitError;
use output::OutputFormat;
use std::path::PathBuf;

fn default_socket_path() -> PathBuf {
    std::env::var("RELAY_SOCKET").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/var/run/relay/relayd.sock"))
}

#[derive(Parser)]
#[command(name = "relayctl", version, styles = color::styles())]
struct Cli {
    /// Path to the daemon's admin Unix socket.
    #[arg(long, global = true, default_value_os_t = default_socket_path())]
    socket: PathBuf,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Shows per-stage unit counts and halt state.
    Status,

    /// Lists the units sitting in one stage's directory.
    ListUnits {
        #[arg(value_enum)]
        stage: StageArg,
    },

    /// Fetches one unit's full task document.
    UnitDetail { id: String },

    /// Forces a study or patient aggregate to complete immediately.
    ForceComplete { id: String },

    /// Resets a unit's dispatch or processing state and restarts it.
    Restart {
        id: String,
        /// Also clear a stale (> 5 minute old) `.processing` marker left
        /// behind in the destination stage.
        #[arg(long)]
        force: bool,
        /// JSON object overriding the unit's processing settings.
        #[arg(long)]
        with_settings: Option<String>,
    },

    /// Deletes a unit outright.
    Delete { id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        if let Some(exit_err) = err.downcast_ref::<ExitError>() {
            eprintln!("{}", exit_err.message);
            std::process::exit(exit_err.code);
        }
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Status => commands::status::handle(&cli.socket, cli.output).await,
        Command::ListUnits { stage } => commands::units::list(&cli.socket, stage, cli.output).await,
        Command::UnitDetail { id } => commands::units::detail(&cli.socket, id, cli.output).await,
        Command::ForceComplete { id } => commands::force_complete::handle(&cli.socket, id).await,
        Command::Restart { id, force, with_settings } => {
            let with_settings = with_settings.map(|s| serde_json::from_str(&s)).transpose()?;
            commands::restart::handle(&cli.socket, id, force, with_settings).await
        }
        Command::Delete { id } => commands::delete::handle(&cli.socket, id).await,
    }
}
