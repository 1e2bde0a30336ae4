use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rtsession")]
#[command(about = "A realtime WebSocket session client exchanging keyed binary records")]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to a realtime server and exchange chat lines
    ///
    /// Prints every message the server pushes until Ctrl-C, then closes
    /// the connection and prints a session summary.
    ///
    /// Examples:
    ///   rtsession connect wss://example.com/gaming
    ///   rtsession connect wss://example.com/gaming --token abc --message "hi"
    Connect {
        /// Endpoint to connect to. Falls back to the configured endpoint
        url: Option<String>,
        /// Bearer token sent in the Authorization header
        #[arg(short, long)]
        token: Option<String>,
        /// Inbound buffer capacity in bytes
        #[arg(short, long)]
        buffer_size: Option<usize>,
        /// Configuration file to load instead of the default location
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Name used as the sender of outgoing chat lines
        #[arg(short, long, default_value = "rtsession")]
        name: String,
        /// Chat line to send after connecting (repeatable)
        #[arg(short, long)]
        message: Vec<String>,
        /// Disconnect after sending instead of waiting for Ctrl-C
        #[arg(long)]
        once: bool,
    },
    /// Configuration file management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the default configuration file path
    Path,
    /// Print the effective configuration
    Show {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
    /// Write a configuration file with default values
    Init {
        /// Endpoint to store in the new file
        #[arg(short, long)]
        endpoint: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
