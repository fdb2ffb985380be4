//! CLI parse: clap types for checkoutfs. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// checkoutfs - checkout/check-in network file service
#[derive(Parser)]
#[command(name = "checkoutfs")]
#[command(about = "Network file service with whole-file checkout and distributed locks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (default: ./checkoutfs.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable logging in the interactive shell (servers always log)
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the file server (control and bulk channels, embedded lock service)
    Serve {
        /// Address to listen on
        #[arg(long)]
        host: Option<String>,
        /// Control channel port
        #[arg(long)]
        port: Option<u16>,
        /// Bulk channel port
        #[arg(long)]
        bulk_port: Option<u16>,
        /// Directory holding file contents
        #[arg(long)]
        blob_dir: Option<PathBuf>,
        /// Namespace snapshot file
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Do not start the embedded lock service
        #[arg(long)]
        no_lock_service: bool,
    },
    /// Run the lock service on its own
    Lockd {
        /// Address to listen on
        #[arg(long)]
        host: Option<String>,
        /// Lock service port
        #[arg(long)]
        port: Option<u16>,
        /// Grace period (ms) before a disconnected session's locks are reclaimed
        #[arg(long)]
        lease_ttl_ms: Option<u64>,
    },
    /// Interactive checkout shell
    Shell {
        /// File server host
        #[arg(long)]
        host: Option<String>,
        /// File server control port
        #[arg(long)]
        port: Option<u16>,
        /// File server bulk port
        #[arg(long)]
        bulk_port: Option<u16>,
        /// Lock service host
        #[arg(long)]
        lock_host: Option<String>,
        /// Lock service port
        #[arg(long)]
        lock_port: Option<u16>,
    },
}
