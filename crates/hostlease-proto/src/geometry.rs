//! Alignment and sector-size policy for on-disk leader records.
//!
//! Every lockspace and resource leader is written with an (alignment,
//! sector size) pair. Two kinds of check apply:
//!
//! - Values outside the enumerated domains are rejected locally by
//!   [`Geometry::new`] with [`LkError::MalformedAlignment`] or
//!   [`LkError::MalformedSector`]. Nothing is read or written.
//! - In-domain values are checked by the service against the supported
//!   combinations and against what was stored on disk. Those failures
//!   carry the `EINVAL` code.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::*;
use crate::error::{LkError, LkResult};

/// Leader alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Alignment {
    M1,
    M2,
    M4,
    M8,
}

impl Alignment {
    pub fn from_bytes(bytes: u64) -> LkResult<Self> {
        match bytes {
            ALIGNMENT_1M => Ok(Self::M1),
            ALIGNMENT_2M => Ok(Self::M2),
            ALIGNMENT_4M => Ok(Self::M4),
            ALIGNMENT_8M => Ok(Self::M8),
            _ => Err(LkError::MalformedAlignment(bytes)),
        }
    }

    pub fn bytes(self) -> u64 {
        match self {
            Self::M1 => ALIGNMENT_1M,
            Self::M2 => ALIGNMENT_2M,
            Self::M4 => ALIGNMENT_4M,
            Self::M8 => ALIGNMENT_8M,
        }
    }
}

impl TryFrom<u64> for Alignment {
    type Error = LkError;

    fn try_from(bytes: u64) -> LkResult<Self> {
        Self::from_bytes(bytes)
    }
}

/// Logical sector size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectorSize {
    S512,
    S4K,
}

impl SectorSize {
    pub fn from_bytes(bytes: u64) -> LkResult<Self> {
        match bytes {
            SECTOR_512 => Ok(Self::S512),
            SECTOR_4K => Ok(Self::S4K),
            _ => Err(LkError::MalformedSector(bytes)),
        }
    }

    pub fn bytes(self) -> u64 {
        match self {
            Self::S512 => SECTOR_512,
            Self::S4K => SECTOR_4K,
        }
    }
}

impl TryFrom<u64> for SectorSize {
    type Error = LkError;

    fn try_from(bytes: u64) -> LkResult<Self> {
        Self::from_bytes(bytes)
    }
}

/// A validated (alignment, sector size) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub align: Alignment,
    pub sector: SectorSize,
}

impl Geometry {
    /// Build a pair from raw byte values, rejecting values outside the
    /// enumerated domains.
    pub fn new(align: u64, sector: u64) -> LkResult<Self> {
        Ok(Self {
            align: Alignment::from_bytes(align)?,
            sector: SectorSize::from_bytes(sector)?,
        })
    }

    /// Number of host slots a lockspace with this geometry can hold, or
    /// `None` for unsupported combinations.
    pub fn max_hosts(self) -> Option<u32> {
        match (self.align, self.sector) {
            (Alignment::M1, SectorSize::S512) => Some(MAX_HOSTS_1M_512),
            (Alignment::M1, SectorSize::S4K) => Some(MAX_HOSTS_1M_4K),
            (Alignment::M2, SectorSize::S4K) => Some(MAX_HOSTS_2M_4K),
            (Alignment::M4, SectorSize::S4K) => Some(MAX_HOSTS_4M_4K),
            (Alignment::M8, SectorSize::S4K) => Some(MAX_HOSTS_8M_4K),
            // 512 byte sectors only fit the 1 MiB layout
            (_, SectorSize::S512) => None,
        }
    }

    pub fn is_supported(self) -> bool {
        self.max_hosts().is_some()
    }

    /// Reject combinations the on-disk format cannot represent.
    pub fn ensure_supported(self) -> LkResult<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(LkError::InvalidArgument)
        }
    }

    /// Check a requested pair against the pair a leader was written with.
    pub fn ensure_matches(self, stored: Geometry) -> LkResult<()> {
        if self == stored {
            Ok(())
        } else {
            Err(LkError::GeometryMismatch)
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            align: Alignment::M1,
            sector: SectorSize::S512,
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "align={} sector={}", self.align.bytes(), self.sector.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_values_are_local() {
        assert_eq!(
            Geometry::new(1024, SECTOR_512),
            Err(LkError::MalformedAlignment(1024))
        );
        assert_eq!(
            Geometry::new(ALIGNMENT_1M, 8 * 1024),
            Err(LkError::MalformedSector(8 * 1024))
        );
    }

    #[test]
    fn test_supported_combinations() {
        let legal = [
            (ALIGNMENT_1M, SECTOR_512, 2000),
            (ALIGNMENT_1M, SECTOR_4K, 250),
            (ALIGNMENT_2M, SECTOR_4K, 500),
            (ALIGNMENT_4M, SECTOR_4K, 1000),
            (ALIGNMENT_8M, SECTOR_4K, 2000),
        ];
        for (align, sector, hosts) in legal {
            let g = Geometry::new(align, sector).unwrap();
            assert!(g.is_supported());
            assert_eq!(g.max_hosts(), Some(hosts));
            assert_eq!(g.align.bytes(), align);
            assert_eq!(g.sector.bytes(), sector);
        }
    }

    #[test]
    fn test_unsupported_combination_is_service_error() {
        let g = Geometry::new(ALIGNMENT_8M, SECTOR_512).unwrap();
        assert!(!g.is_supported());
        assert_eq!(g.ensure_supported(), Err(LkError::InvalidArgument));
    }

    #[test]
    fn test_mismatch() {
        let stored = Geometry::default();
        let other = Geometry::new(ALIGNMENT_1M, SECTOR_4K).unwrap();
        assert_eq!(other.ensure_matches(stored), Err(LkError::GeometryMismatch));
        assert_eq!(stored.ensure_matches(stored), Ok(()));
    }

    #[test]
    fn test_default_display() {
        assert_eq!(Geometry::default().to_string(), "align=1048576 sector=512");
    }
}
