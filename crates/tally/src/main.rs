// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tally - per-scope sequence numbering for chats and messages.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod readiness;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - per-scope sequence numbering for chats and messages.
#[derive(Parser, Debug)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API (and the embedded worker unless disabled).
    Serve,
    /// Run only the queue worker and count reconciler.
    Worker,
    /// Validate the configuration and exit.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => tally_config::load_and_validate_path(path),
        None => tally_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tally_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Worker) => serve::run_worker(config).await,
        Some(Commands::Check) => match config.to_toml() {
            Ok(rendered) => {
                println!("# tally: config ok\n{rendered}");
                Ok(())
            }
            Err(e) => Err(tally_core::TallyError::Config(e.to_string())),
        },
        None => {
            println!("tally: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("tally: {e}");
        std::process::exit(1);
    }
}
