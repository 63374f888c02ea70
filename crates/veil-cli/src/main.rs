//! Veil command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Show this device's public key and whether it was just created
//! veil --data-dir ~/.veil identity show
//!
//! # Mint a shareable room link
//! veil room new
//!
//! # Seal and open a room message
//! veil room seal 'https://veil.example/room/…#KEY' hi
//! veil room open 'https://veil.example/room/…#KEY' '{"ciphertext":…}'
//!
//! # Conversation messages, keyed by the peer's published public key
//! veil conversation seal BASE64 hi
//! ```

mod cli;
mod commands;

use std::io;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let mut stdout = io::stdout().lock();
    if let Err(err) = commands::run(&args, &mut stdout) {
        tracing::error!(error = %err, "command failed");
        return Err(err.into());
    }

    Ok(())
}
