/// Lease-format and error-code constants.

/// 1 MiB leader alignment
pub const ALIGNMENT_1M: u64 = 1 << 20;
/// 2 MiB leader alignment
pub const ALIGNMENT_2M: u64 = 2 << 20;
/// 4 MiB leader alignment
pub const ALIGNMENT_4M: u64 = 4 << 20;
/// 8 MiB leader alignment
pub const ALIGNMENT_8M: u64 = 8 << 20;

/// Logical sector size of 512 bytes
pub const SECTOR_512: u64 = 512;
/// Logical sector size of 4 KiB
pub const SECTOR_4K: u64 = 4096;

/// Maximum lockspace name length
pub const LOCKSPACE_NAME_MAX: usize = 48;
/// Maximum resource name length
pub const RESOURCE_NAME_MAX: usize = 48;

/// Host slots available in a lockspace for each supported geometry.
pub const MAX_HOSTS_1M_512: u32 = 2000;
pub const MAX_HOSTS_1M_4K: u32 = 250;
pub const MAX_HOSTS_2M_4K: u32 = 500;
pub const MAX_HOSTS_4M_4K: u32 = 1000;
pub const MAX_HOSTS_8M_4K: u32 = 2000;

// errno values reported by the lock service

pub const EPERM: i32 = 1;
pub const EIO: i32 = 5;
pub const EEXIST: i32 = 17;
pub const EINVAL: i32 = 22;
pub const ENOSPC: i32 = 28;

/// Reported when a leader block has no valid magic (never written).
pub const SANLK_LEADER_MAGIC: i32 = -223;

/// Reported by operations failed through failure injection.
pub const INJECTED_FAILURE: i32 = -1;
