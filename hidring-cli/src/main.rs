// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! hidring CLI
//!
//! Command-line interface for inspecting and exercising the HID event ring.

use clap::{Parser, Subcommand};

mod commands;
mod output;

/// hidring - Bluetooth HID event ring consumer
#[derive(Parser)]
#[command(name = "hidring")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "hidring.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },

    /// Attach to a ring and print its events
    Dump {
        /// Keep polling until interrupted
        #[arg(short, long)]
        follow: bool,

        /// Emit one JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Create a ring, fill it with synthetic records and read them back
    Simulate {
        /// Number of records to write
        #[arg(short, long, default_value_t = 32)]
        records: u32,

        /// Back-date every Nth report record past the staleness window (0 = never)
        #[arg(long, default_value_t = 4)]
        stale_every: u32,

        /// Leave the records in the ring for `hidring dump` until Ctrl+C
        #[arg(long)]
        hold: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Validate { file } => commands::validate::execute(&file).await,
        Commands::Dump { follow, json } => commands::dump::execute(&cli.config, follow, json).await,
        Commands::Simulate {
            records,
            stale_every,
            hold,
        } => commands::simulate::execute(&cli.config, records, stale_every, hold).await,
    }
}
