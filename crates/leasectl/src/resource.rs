//! Resource subcommands for the leasectl tool.

use clap::{Args, Subcommand};
use tabled::{Table, Tabled};

use hostlease_core::LockManager;
use hostlease_proto::host::HostId;
use hostlease_proto::lockspace::JoinOptions;
use hostlease_proto::resource::{DiskLocation, Owner, ResourceLeader};

use crate::common::{describe, exit_error, format_size, parse_disk, print_success, GeometryArgs};

// ---------------------------------------------------------------------------
// CLI argument types
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ResourceArgs {
    #[command(subcommand)]
    pub command: ResourceCommands,
}

#[derive(Subcommand)]
pub enum ResourceCommands {
    /// Write a fresh leader to every disk of a resource
    Write {
        /// Lockspace name
        lockspace: String,
        /// Resource name
        resource: String,
        /// Mirrors as PATH:OFFSET
        #[arg(required = true, value_parser = parse_disk)]
        disks: Vec<DiskLocation>,
        #[command(flatten)]
        geometry: GeometryArgs,
    },
    /// Read the leader at one disk location
    Read {
        /// Location as PATH:OFFSET
        #[arg(value_parser = parse_disk)]
        disk: DiskLocation,
        #[command(flatten)]
        geometry: GeometryArgs,
    },
    /// List the current owners of a resource
    Owners {
        /// Lockspace name
        lockspace: String,
        /// Resource name
        resource: String,
        /// Mirrors as PATH:OFFSET
        #[arg(required = true, value_parser = parse_disk)]
        disks: Vec<DiskLocation>,
        #[command(flatten)]
        geometry: GeometryArgs,
    },
    /// Join the lockspace and acquire a resource
    Acquire {
        /// Lockspace name
        lockspace: String,
        /// Resource name
        resource: String,
        /// Mirrors as PATH:OFFSET
        #[arg(required = true, value_parser = parse_disk)]
        disks: Vec<DiskLocation>,
        /// Host id to join as
        #[arg(long)]
        host_id: HostId,
        #[command(flatten)]
        geometry: GeometryArgs,
    },
    /// Release a resource
    Release {
        /// Lockspace name
        lockspace: String,
        /// Resource name
        resource: String,
        /// Mirrors as PATH:OFFSET
        #[arg(required = true, value_parser = parse_disk)]
        disks: Vec<DiskLocation>,
        #[command(flatten)]
        geometry: GeometryArgs,
    },
}

// ---------------------------------------------------------------------------
// Table display types
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct OwnerRow {
    #[tabled(rename = "Host Id")]
    host_id: HostId,
    #[tabled(rename = "Generation")]
    generation: u64,
}

impl From<&Owner> for OwnerRow {
    fn from(o: &Owner) -> Self {
        Self {
            host_id: o.host_id,
            generation: o.generation,
        }
    }
}

// ---------------------------------------------------------------------------
// Command execution
// ---------------------------------------------------------------------------

/// Execute a resource subcommand.
pub async fn run(lm: &LockManager, args: ResourceArgs) {
    match args.command {
        ResourceCommands::Write {
            lockspace,
            resource,
            disks,
            geometry,
        } => {
            match lm
                .write_resource(&lockspace, &resource, &disks, geometry.options())
                .await
            {
                Ok(()) => print_success(&format!(
                    "Resource {}/{} written on {} disk(s)",
                    lockspace,
                    resource,
                    disks.len()
                )),
                Err(e) => exit_error(&format!(
                    "Failed to write resource {}/{}: {}",
                    lockspace,
                    resource,
                    describe(e)
                )),
            }
        }
        ResourceCommands::Read { disk, geometry } => {
            match lm.read_resource(&disk, geometry.options()).await {
                Ok(leader) => print_leader(&disk, &leader),
                Err(e) => exit_error(&format!("Failed to read {}: {}", disk, describe(e))),
            }
        }
        ResourceCommands::Owners {
            lockspace,
            resource,
            disks,
            geometry,
        } => {
            resource_owners(lm, &lockspace, &resource, &disks, geometry).await;
        }
        ResourceCommands::Acquire {
            lockspace,
            resource,
            disks,
            host_id,
            geometry,
        } => {
            resource_acquire(lm, &lockspace, &resource, &disks, host_id, geometry).await;
        }
        ResourceCommands::Release {
            lockspace,
            resource,
            disks,
            geometry,
        } => {
            match lm
                .release(&lockspace, &resource, &disks, None, geometry.options())
                .await
            {
                Ok(()) => print_success(&format!("Released {}/{}", lockspace, resource)),
                Err(e) => exit_error(&format!(
                    "Failed to release {}/{}: {}",
                    lockspace,
                    resource,
                    describe(e)
                )),
            }
        }
    }
}

fn print_leader(disk: &DiskLocation, leader: &ResourceLeader) {
    println!("Resource {}/{} at {}:", leader.lockspace, leader.resource, disk);
    println!("  Version:    {}", leader.version);
    println!("  Acquired:   {}", if leader.acquired { "yes" } else { "no" });
    println!("  Owner:      {}", leader.host_id);
    println!("  Generation: {}", leader.generation);
    println!("  Alignment:  {}", format_size(leader.align()));
    println!("  Sector:     {}", format_size(leader.sector()));
    let mirrors: Vec<String> = leader.disks.iter().map(|d| d.to_string()).collect();
    println!("  Mirrors:    {}", mirrors.join(", "));
}

async fn resource_owners(
    lm: &LockManager,
    lockspace: &str,
    resource: &str,
    disks: &[DiskLocation],
    geometry: GeometryArgs,
) {
    let owners = match lm
        .read_resource_owners(lockspace, resource, disks, geometry.options())
        .await
    {
        Ok(owners) => owners,
        Err(e) => exit_error(&format!(
            "Failed to read owners of {}/{}: {}",
            lockspace,
            resource,
            describe(e)
        )),
    };
    if owners.is_empty() {
        println!("Resource {}/{} has no owner.", lockspace, resource);
        return;
    }
    let rows: Vec<OwnerRow> = owners.iter().map(OwnerRow::from).collect();
    println!("{}", Table::new(&rows));
}

async fn resource_acquire(
    lm: &LockManager,
    lockspace: &str,
    resource: &str,
    disks: &[DiskLocation],
    host_id: HostId,
    geometry: GeometryArgs,
) {
    let info = match lm.read_lockspace(lockspace).await {
        Ok(info) => info,
        Err(e) => exit_error(&format!("Failed to read lockspace {}: {}", lockspace, describe(e))),
    };
    let join = JoinOptions {
        offset: info.offset,
        iotimeout: info.iotimeout,
        ..Default::default()
    };
    if let Err(e) = lm.add_lockspace(lockspace, host_id, &info.path, join).await {
        exit_error(&format!(
            "Failed to join {} as host {}: {}",
            lockspace,
            host_id,
            describe(e)
        ));
    }

    let session = match lm.register() {
        Ok(s) => s,
        Err(e) => exit_error(&format!("Failed to register: {}", describe(e))),
    };
    if let Err(e) = lm
        .acquire(lockspace, resource, disks, session, geometry.options())
        .await
    {
        exit_error(&format!(
            "Failed to acquire {}/{}: {}",
            lockspace,
            resource,
            describe(e)
        ));
    }
    print_success(&format!("Acquired {}/{} as host {}", lockspace, resource, host_id));
    resource_owners(lm, lockspace, resource, disks, geometry).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_row() {
        let row = OwnerRow::from(&Owner {
            host_id: 1,
            generation: 4,
        });
        assert_eq!((row.host_id, row.generation), (1, 4));
    }
}
