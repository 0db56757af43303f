use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    DEFAULT_LIFETIME, DEFAULT_STEP, ENV_CONFIG, ENV_HOST, ENV_PERSISTENT, ENV_PORT, ENV_TIMEOUT,
};

#[derive(Parser)]
#[command(name = "kvcache")]
#[command(version, about = "Key-value cache client for Redis-compatible servers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (JSON with a "server" section)
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Cache server host
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Cache server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Connect/response timeout in seconds
    #[arg(long, global = true, env = ENV_TIMEOUT)]
    pub timeout: Option<f64>,

    /// Reuse one shared connection per endpoint
    #[arg(long, global = true, env = ENV_PERSISTENT)]
    pub persistent: Option<bool>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Read a value
    Get {
        key: String,
        /// Printed when the key is absent
        #[arg(long)]
        default: Option<String>,
    },
    /// Store a value with a lifetime
    Set {
        key: String,
        value: String,
        /// Lifetime in seconds
        #[arg(long, short = 'l', default_value_t = DEFAULT_LIFETIME.as_secs())]
        lifetime: u64,
    },
    /// Remaining time to live (-1: no expiry, -2: missing)
    Ttl { key: String },
    /// Delete a key
    Delete { key: String },
    /// Flush EVERY key on the server, not only this application's. Requires confirmation.
    DeleteAll {
        /// Confirm the flush
        #[arg(short, long)]
        yes: bool,
    },
    /// Atomically increment a counter
    Incr {
        key: String,
        #[arg(long, short = 's', default_value_t = DEFAULT_STEP, allow_hyphen_values = true)]
        step: i64,
    },
    /// Atomically decrement a counter
    Decr {
        key: String,
        #[arg(long, short = 's', default_value_t = DEFAULT_STEP, allow_hyphen_values = true)]
        step: i64,
    },
    /// Check whether a key exists
    Exists { key: String },
    /// Set a new lifetime on an existing key
    Expire {
        key: String,
        /// Lifetime in seconds
        seconds: u64,
    },
    /// Check the connection
    Ping,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout: Option<f64>,
    pub persistent: Option<bool>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        host: cli.host,
        port: cli.port,
        timeout: cli.timeout,
        persistent: cli.persistent,
    };
    (config, cli.command)
}
