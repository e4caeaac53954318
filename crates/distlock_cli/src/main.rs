//! distlock CLI
//!
//! Command-line tools for distlock.
//!
//! # Commands
//!
//! - `participant` - Run a two-phase commit participant server
//! - `demo` - Drive lock, timestamp and commit traffic against a participant

mod commands;

use clap::{Parser, Subcommand};
use distlock_participant::DEFAULT_PORT;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT);

/// distlock lock manager and two-phase commit tools.
#[derive(Parser)]
#[command(name = "distlock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a participant server until Ctrl-C
    Participant {
        /// Address to listen on
        #[arg(short, long, default_value_t = DEFAULT_ADDR)]
        bind: SocketAddr,

        /// Vote no on every prepare
        #[arg(long)]
        vote_no: bool,

        /// Maximum concurrent connections
        #[arg(short, long, default_value = "1000")]
        max_connections: usize,
    },

    /// Run transactions through the lock manager and coordinator
    Demo {
        /// Participant server address
        #[arg(short, long, default_value_t = DEFAULT_ADDR)]
        participant: SocketAddr,

        /// Number of transactions to run
        #[arg(short, long, default_value = "100")]
        transactions: usize,

        /// Stall detector sweep interval in milliseconds
        #[arg(long, default_value = "50")]
        detect_interval_ms: u64,

        /// Start an in-process participant on the given address
        #[arg(short, long)]
        spawn_participant: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Participant {
            bind,
            vote_no,
            max_connections,
        } => {
            commands::participant::run(bind, vote_no, max_connections)?;
        }
        Commands::Demo {
            participant,
            transactions,
            detect_interval_ms,
            spawn_participant,
            format,
        } => {
            let options = commands::demo::DemoOptions {
                participant,
                transactions,
                detect_interval: Duration::from_millis(detect_interval_ms),
                spawn_participant,
            };
            commands::demo::run(&options, &format)?;
        }
        Commands::Version => {
            println!("distlock CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("distlock core v{}", distlock_core::VERSION);
        }
    }

    Ok(())
}
