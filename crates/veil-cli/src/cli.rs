//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// End-to-end encrypted messaging toolkit
#[derive(Parser, Debug)]
#[command(name = "veil")]
#[command(about = "Veil identity, room link and envelope tool")]
#[command(version)]
pub struct Args {
    /// Directory holding the device identity database
    #[arg(long, default_value = ".veil")]
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Base URL used when minting room links
    #[arg(long, default_value = "https://veil.example")]
    pub base_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Device identity
    #[command(subcommand)]
    Identity(IdentityCommand),

    /// Link-shared rooms
    #[command(subcommand)]
    Room(RoomCommand),

    /// Identity-based conversations
    #[command(subcommand)]
    Conversation(ConversationCommand),
}

#[derive(Subcommand, Debug)]
pub enum IdentityCommand {
    /// Print the public key and whether it was just created
    Show,

    /// Replace the identity. Existing conversations become unreadable.
    Reset {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum RoomCommand {
    /// Mint a new room link
    New,

    /// Encrypt a message for a room
    Seal {
        /// Full room link including the key fragment
        link: String,
        /// Message text
        #[arg(allow_hyphen_values = true)]
        message: String,
    },

    /// Decrypt a room envelope
    Open {
        /// Full room link including the key fragment
        link: String,
        /// Envelope JSON
        envelope: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConversationCommand {
    /// Encrypt a message for a peer
    Seal {
        /// Peer's published public key
        peer_key: String,
        /// Message text
        #[arg(allow_hyphen_values = true)]
        message: String,
    },

    /// Decrypt an envelope from a peer
    Open {
        /// Peer's published public key
        peer_key: String,
        /// Envelope JSON
        envelope: String,
    },
}
