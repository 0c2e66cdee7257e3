//! Tunable operational defaults for hostlease.
//!
//! Format-level constants (alignments, sector sizes, error codes) remain
//! in [`crate::constants`]. This module centralizes the defaults that
//! callers and the `leasectl` flags can override.

use crate::constants::{ALIGNMENT_1M, SECTOR_512};
use crate::geometry::SectorSize;

// ─── Geometry ───────────────────────────────────────────────────────────────

/// Default leader alignment in bytes.
pub const DEFAULT_ALIGNMENT: u64 = ALIGNMENT_1M;

/// Default leader sector size in bytes.
pub const DEFAULT_SECTOR: u64 = SECTOR_512;

/// Default logical sector size of the underlying shared storage.
pub const DEFAULT_DISK_SECTOR: SectorSize = SectorSize::S512;

// ─── Lockspace ──────────────────────────────────────────────────────────────

/// Default I/O timeout in seconds. Zero selects the service default.
pub const DEFAULT_IO_TIMEOUT_SECS: u32 = 0;

/// Requesting zero host slots selects the limit of the lockspace geometry.
pub const DEFAULT_MAX_HOSTS: u32 = 0;

// ─── Sessions ───────────────────────────────────────────────────────────────

/// First session handle returned by `register`.
pub const FIRST_SESSION_ID: u64 = 1;

// ─── File backend ───────────────────────────────────────────────────────────

/// Name of the snapshot file inside the state directory.
pub const STATE_FILE_NAME: &str = "leases";

/// Suffix of the temporary file written before the atomic rename.
pub const STATE_TMP_SUFFIX: &str = "tmp";
