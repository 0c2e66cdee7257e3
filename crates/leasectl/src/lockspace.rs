//! Lockspace subcommands for the leasectl tool.
//!
//! Write and inspect lockspaces, list their hosts, and run a join/leave
//! cycle that records a new host generation.

use clap::{Args, Subcommand};
use tabled::{Table, Tabled};

use hostlease_core::LockManager;
use hostlease_proto::defaults::{DEFAULT_IO_TIMEOUT_SECS, DEFAULT_MAX_HOSTS};
use hostlease_proto::host::{HostId, HostRecord};
use hostlease_proto::lockspace::{JoinOptions, LockspaceOptions, Mode};

use crate::common::{describe, exit_error, format_size, parse_size, print_success};

// ---------------------------------------------------------------------------
// CLI argument types
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct LockspaceArgs {
    #[command(subcommand)]
    pub command: LockspaceCommands,
}

#[derive(Subcommand)]
pub enum LockspaceCommands {
    /// Write (or overwrite) lockspace metadata
    Write {
        /// Lockspace name
        name: String,
        /// Path of the lockspace storage
        path: String,
        /// Byte offset in the storage
        #[arg(long, default_value = "0", value_parser = parse_size)]
        offset: u64,
        /// Host slots, 0 for the alignment limit
        #[arg(long, default_value_t = DEFAULT_MAX_HOSTS)]
        max_hosts: u32,
        /// I/O timeout in seconds, 0 for the service default
        #[arg(long, default_value_t = DEFAULT_IO_TIMEOUT_SECS)]
        iotimeout: u32,
        /// Alignment (1M, 2M, 4M or 8M)
        #[arg(long, default_value = "1M", value_parser = parse_size)]
        align: u64,
        /// Sector size, must match the disk sector size
        #[arg(long)]
        sector: Option<u64>,
    },
    /// Show lockspace metadata
    Show {
        /// Lockspace name
        name: String,
    },
    /// List hosts that joined a lockspace
    Hosts {
        /// Lockspace name
        name: String,
        /// Only this host (0 lists all)
        #[arg(long, default_value_t = 0)]
        host_id: HostId,
    },
    /// Join and leave a lockspace, recording a new generation
    Join {
        /// Lockspace name
        name: String,
        /// Host id to join as
        host_id: HostId,
        /// I/O timeout in seconds
        #[arg(long, default_value_t = DEFAULT_IO_TIMEOUT_SECS)]
        iotimeout: u32,
        /// Join and leave through pending tickets
        #[arg(long = "async")]
        asynchronous: bool,
    },
}

// ---------------------------------------------------------------------------
// Table display types
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "Host Id")]
    id: HostId,
    #[tabled(rename = "Generation")]
    generation: u64,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&HostRecord> for HostRow {
    fn from(h: &HostRecord) -> Self {
        Self {
            id: h.id,
            generation: h.generation,
            status: h.flags.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

/// Execute a lockspace subcommand.
pub async fn run(lm: &LockManager, args: LockspaceArgs) {
    match args.command {
        LockspaceCommands::Write {
            name,
            path,
            offset,
            max_hosts,
            iotimeout,
            align,
            sector,
        } => {
            let opts = LockspaceOptions {
                offset,
                max_hosts,
                iotimeout,
                align,
                sector: sector.unwrap_or_else(|| lm.config().disk_sector.bytes()),
            };
            lockspace_write(lm, &name, &path, opts).await;
        }
        LockspaceCommands::Show { name } => {
            lockspace_show(lm, &name).await;
        }
        LockspaceCommands::Hosts { name, host_id } => {
            lockspace_hosts(lm, &name, host_id).await;
        }
        LockspaceCommands::Join {
            name,
            host_id,
            iotimeout,
            asynchronous,
        } => {
            let mode = if asynchronous { Mode::Async } else { Mode::Sync };
            lockspace_join(lm, &name, host_id, iotimeout, mode).await;
        }
    }
}

async fn lockspace_write(lm: &LockManager, name: &str, path: &str, opts: LockspaceOptions) {
    match lm.write_lockspace(name, path, opts).await {
        Ok(()) => print_success(&format!("Lockspace {} written at {}:{}", name, path, opts.offset)),
        Err(e) => exit_error(&format!("Failed to write lockspace {}: {}", name, describe(e))),
    }
}

async fn lockspace_show(lm: &LockManager, name: &str) {
    let info = match lm.read_lockspace(name).await {
        Ok(info) => info,
        Err(e) => exit_error(&format!("Failed to read lockspace {}: {}", name, describe(e))),
    };

    println!("Lockspace {}:", info.name);
    println!("  Path:        {}", info.path);
    println!("  Offset:      {}", info.offset);
    println!("  Max hosts:   {}", info.max_hosts);
    println!("  I/O timeout: {}", info.iotimeout);
    println!("  Alignment:   {}", format_size(info.geometry.align.bytes()));
    println!("  Sector:      {}", format_size(info.geometry.sector.bytes()));
}

async fn lockspace_hosts(lm: &LockManager, name: &str, host_id: HostId) {
    let hosts = match lm.get_hosts(name, host_id).await {
        Ok(hosts) => hosts,
        Err(e) => exit_error(&format!("Failed to list hosts of {}: {}", name, describe(e))),
    };
    if hosts.is_empty() {
        println!("No hosts in lockspace {}.", name);
        return;
    }

    let rows: Vec<HostRow> = hosts.iter().map(HostRow::from).collect();
    println!("{}", Table::new(&rows));
    println!();
    println!("Total {} host(s)", hosts.len());
}

async fn lockspace_join(lm: &LockManager, name: &str, host_id: HostId, iotimeout: u32, mode: Mode) {
    let info = match lm.read_lockspace(name).await {
        Ok(info) => info,
        Err(e) => exit_error(&format!("Failed to read lockspace {}: {}", name, describe(e))),
    };

    let opts = JoinOptions {
        offset: info.offset,
        iotimeout,
        mode,
    };
    if let Err(e) = lm.add_lockspace(name, host_id, &info.path, opts).await {
        exit_error(&format!("Failed to join {} as host {}: {}", name, host_id, describe(e)));
    }
    settle(lm, name, host_id, &info.path, mode).await;

    match lm.get_hosts(name, host_id).await {
        Ok(hosts) => {
            for h in &hosts {
                println!("Joined {} as host {} at generation {}", name, h.id, h.generation);
            }
        }
        Err(e) => exit_error(&format!("Failed to read host {}: {}", host_id, describe(e))),
    }

    if let Err(e) = lm.rem_lockspace(name, host_id, &info.path, mode).await {
        exit_error(&format!("Failed to leave {}: {}", name, describe(e)));
    }
    settle(lm, name, host_id, &info.path, mode).await;
    print_success(&format!("Left {}", name));
}

/// Complete a pending ticket and report what a waiting caller observes.
async fn settle(lm: &LockManager, name: &str, host_id: HostId, path: &str, mode: Mode) {
    if mode == Mode::Async {
        if let Err(e) = lm.complete_async(name).await {
            exit_error(&format!("Failed to complete {}: {}", name, describe(e)));
        }
    }
    match lm.inq_lockspace(name, host_id, path, true).await {
        Ok(Some(true)) => println!("Host {} holds {}", host_id, name),
        Ok(_) => println!("Host {} does not hold {}", host_id, name),
        Err(e) => exit_error(&format!("Failed to inquire {}: {}", name, describe(e))),
    }
}
