// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! plughost - an extension host for isolated wasm plugin bundles.
//!
//! This is the binary entry point.

mod commands;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use plughost_config::PlughostConfig;

/// plughost - load, run and manage plugin bundles at runtime.
#[derive(Parser, Debug)]
#[command(name = "plughost", version, about, long_about = None)]
struct Cli {
    /// Configuration file to use instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the plugin directory and serve the HTTP API.
    Serve,
    /// Load every bundle in the plugin directory and print the result.
    List,
    /// Run one plugin's execute entrypoint.
    Exec {
        /// Plugin name as reported by its identity.
        name: String,
        /// JSON input handed to the plugin.
        #[arg(long)]
        input: Option<String>,
    },
    /// Show the units of a bundle and which one would be loaded.
    Inspect {
        /// Path of the bundle file.
        bundle: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> PlughostConfig {
    let result = match path {
        Some(path) => plughost_config::load_and_validate_path(path),
        None => plughost_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(errors) => {
            plughost_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides the config level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("plughost={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    init_tracing(&config.host.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await.map_err(anyhow::Error::from),
        Some(Commands::List) => commands::run_list(&config).await,
        Some(Commands::Exec { name, input }) => {
            commands::run_exec(&config, &name, input.as_deref()).await
        }
        Some(Commands::Inspect { bundle }) => commands::run_inspect(&config, &bundle),
        None => {
            println!("plughost: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
