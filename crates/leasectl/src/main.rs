//! hostlease admin tool (leasectl).
//!
//! `leasectl` operates a file-backed lock manager on a state directory.
//! Each invocation loads the saved lockspaces, leaders and host records,
//! runs one command and saves the result.
//!
//! Host membership belongs to the running process, so a lockspace joined
//! by one invocation is not joined in the next. Commands that need a live
//! host (`lockspace join`, `resource acquire`) join within the same run.
//!
//! # Usage
//!
//! ```text
//! leasectl [OPTIONS] <COMMAND>
//!
//! Commands:
//!   lockspace  Lockspace management
//!   resource   Resource lease management
//!
//! Options:
//!   -d, --dir <DIR>                  State directory [default: /var/lib/hostlease]
//!   -s, --disk-sector <DISK_SECTOR>  Sector size of the shared storage [default: 512]
//!   -v, --verbose                    Enable verbose/debug logging
//! ```

mod common;
mod lockspace;
mod resource;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hostlease_proto::defaults::DEFAULT_DISK_SECTOR;
use tracing_subscriber::EnvFilter;

/// hostlease admin tool.
///
/// Writes and inspects lockspaces and resource leases kept in a state
/// directory.
#[derive(Parser)]
#[command(name = "leasectl", version, about = "hostlease admin tool")]
struct Cli {
    /// State directory
    #[arg(short = 'd', long, default_value = "/var/lib/hostlease")]
    dir: PathBuf,

    /// Sector size of the shared storage
    #[arg(short = 's', long, default_value_t = DEFAULT_DISK_SECTOR.bytes())]
    disk_sector: u64,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lockspace management
    Lockspace(lockspace::LockspaceArgs),
    /// Resource lease management
    Resource(resource::ResourceArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let lm = common::open_manager(&cli.dir, cli.disk_sector).await;

    match cli.command {
        Commands::Lockspace(args) => {
            lockspace::run(&lm, args).await;
        }
        Commands::Resource(args) => {
            resource::run(&lm, args).await;
        }
    }
}
