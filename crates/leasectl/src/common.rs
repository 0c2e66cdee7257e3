//! Shared utilities for the leasectl tool.
//!
//! Opening the file-backed manager, argument parsers, and formatting
//! helpers used across subcommands.

use std::path::Path;

use clap::Args;
use hostlease_core::{FileBackend, LockManager, ManagerConfig};
use hostlease_proto::constants::SECTOR_512;
use hostlease_proto::defaults::{DEFAULT_ALIGNMENT, DEFAULT_SECTOR};
use hostlease_proto::error::LkError;
use hostlease_proto::geometry::SectorSize;
use hostlease_proto::resource::{DiskLocation, ResourceOptions};

/// Alignment and sector flags shared by resource commands.
#[derive(Args, Debug, Clone, Copy)]
pub struct GeometryArgs {
    /// Leader alignment (1M, 2M, 4M or 8M)
    #[arg(long, default_value = "1M", value_parser = parse_size)]
    pub align: u64,

    /// Leader sector size (512 or 4096)
    #[arg(long, default_value_t = DEFAULT_SECTOR)]
    pub sector: u64,
}

impl Default for GeometryArgs {
    fn default() -> Self {
        Self {
            align: DEFAULT_ALIGNMENT,
            sector: DEFAULT_SECTOR,
        }
    }
}

impl GeometryArgs {
    pub fn options(self) -> ResourceOptions {
        ResourceOptions::new(self.align, self.sector)
    }
}

/// Open the file-backed manager on `dir`, exiting on failure.
pub async fn open_manager(dir: &Path, disk_sector: u64) -> LockManager {
    let disk_sector = match SectorSize::from_bytes(disk_sector) {
        Ok(s) => s,
        Err(e) => exit_error(&describe(e)),
    };
    let backend = match FileBackend::open(dir).await {
        Ok(b) => b,
        Err(e) => exit_error(&format!(
            "Failed to open state directory {}: {}",
            dir.display(),
            describe(e)
        )),
    };
    match LockManager::open(ManagerConfig::with_disk_sector(disk_sector), Box::new(backend)).await {
        Ok(lm) => lm,
        Err(e) => exit_error(&format!("Failed to load state: {}", describe(e))),
    }
}

/// Parse a size string with optional K/M suffix.
///
/// Examples: "1M" = 1024^2, "4K" = 4096, "512" = 512
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let (num_str, multiplier) = match s.as_bytes().last() {
        Some(b'K' | b'k') => (&s[..s.len() - 1], 1024u64),
        Some(b'M' | b'm') => (&s[..s.len() - 1], 1024u64 * 1024),
        _ => (s, 1u64),
    };

    let num: u64 = num_str
        .parse()
        .map_err(|e| format!("invalid size '{}': {}", s, e))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size '{}' overflows u64", s))
}

/// Parse a disk location written as `PATH:OFFSET`.
///
/// The offset accepts the suffixes of [`parse_size`]. The path itself may
/// contain colons; only the last one separates the offset.
pub fn parse_disk(s: &str) -> Result<DiskLocation, String> {
    let (path, offset) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("disk '{}' is not PATH:OFFSET", s))?;
    if path.is_empty() {
        return Err(format!("disk '{}' has an empty path", s));
    }
    Ok(DiskLocation::new(path, parse_size(offset)?))
}

/// Format an alignment or sector size the way it is passed on the
/// command line.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    if bytes >= MB && bytes % MB == 0 {
        format!("{}M", bytes / MB)
    } else if bytes > SECTOR_512 && bytes % KB == 0 {
        format!("{}K", bytes / KB)
    } else {
        format!("{}", bytes)
    }
}

/// Describe an error together with the code the service reports for it.
pub fn describe(e: LkError) -> String {
    match e.code() {
        Some(code) => format!("{} ({})", e, code),
        None => e.to_string(),
    }
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{}", msg);
}

/// Print an error message and exit.
pub fn exit_error(msg: &str) -> ! {
    eprintln!("Error: {}", msg);
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlease_proto::constants::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1M").unwrap(), ALIGNMENT_1M);
        assert_eq!(parse_size("8m").unwrap(), ALIGNMENT_8M);
        assert_eq!(parse_size("4K").unwrap(), SECTOR_4K);
        assert_eq!(parse_size("512").unwrap(), SECTOR_512);
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
    }

    #[test]
    fn test_parse_disk() {
        assert_eq!(
            parse_disk("/dev/vg/leases:1M").unwrap(),
            DiskLocation::new("/dev/vg/leases", ALIGNMENT_1M)
        );
        assert_eq!(
            parse_disk("/rhev/a:b/leases:0").unwrap(),
            DiskLocation::new("/rhev/a:b/leases", 0)
        );
        assert!(parse_disk("/dev/vg/leases").is_err());
        assert!(parse_disk(":0").is_err());
        assert!(parse_disk("/dev/vg/leases:x").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(SECTOR_512), "512");
        assert_eq!(format_size(SECTOR_4K), "4K");
        assert_eq!(format_size(ALIGNMENT_2M), "2M");
        assert_eq!(format_size(0), "0");
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(LkError::NoSpace), "no space available (28)");
        assert_eq!(describe(LkError::MalformedSector(8192)), "invalid sector size 8192");
    }

    #[test]
    fn test_geometry_args_default() {
        let opts = GeometryArgs::default().options();
        assert_eq!((opts.align, opts.sector), (ALIGNMENT_1M, SECTOR_512));
    }
}
