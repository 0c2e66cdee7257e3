/// Lock manager error types.
///
/// Call-site errors (malformed alignment or sector values) carry no code.
/// Every other variant is a refusal by the lock service and maps onto the
/// numeric code a client of the service observes. Several variants share
/// `EINVAL` so that diagnostics can tell them apart while the external
/// code stays the same.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::op::Operation;

/// Unified error type for all lock manager operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum LkError {
    // Local errors, raised before any stored state is consulted
    #[error("invalid alignment {0}")]
    MalformedAlignment(u64),
    #[error("invalid sector size {0}")]
    MalformedSector(u64),

    // Service errors
    #[error("invalid argument")]
    InvalidArgument,
    #[error("alignment or sector size differ from the stored leader")]
    GeometryMismatch,
    #[error("sector size differs from the disk sector size")]
    DiskSectorMismatch,
    #[error("mirrored leader records disagree")]
    MirrorMismatch,
    #[error("no space available")]
    NoSpace,
    #[error("already exists")]
    Exists,
    #[error("leader block not found")]
    LeaderNotFound,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("I/O error")]
    Io,
    #[error("injected failure in {0}")]
    Injected(Operation),
}

impl LkError {
    /// Whether this error was raised at the call site rather than by the
    /// lock service.
    pub fn is_local(self) -> bool {
        matches!(self, Self::MalformedAlignment(_) | Self::MalformedSector(_))
    }

    /// The numeric code reported by the service, or `None` for local errors.
    pub fn code(self) -> Option<i32> {
        match self {
            Self::MalformedAlignment(_) | Self::MalformedSector(_) => None,
            Self::InvalidArgument
            | Self::GeometryMismatch
            | Self::DiskSectorMismatch
            | Self::MirrorMismatch => Some(EINVAL),
            Self::NoSpace => Some(ENOSPC),
            Self::Exists => Some(EEXIST),
            Self::LeaderNotFound => Some(SANLK_LEADER_MAGIC),
            Self::NotPermitted => Some(EPERM),
            Self::Io => Some(EIO),
            Self::Injected(_) => Some(INJECTED_FAILURE),
        }
    }

    /// Convert a raw service code to the generic variant carrying it.
    ///
    /// Returns `None` for zero (success) and for codes the service never
    /// reports.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            EPERM => Some(Self::NotPermitted),
            EIO => Some(Self::Io),
            EEXIST => Some(Self::Exists),
            EINVAL => Some(Self::InvalidArgument),
            ENOSPC => Some(Self::NoSpace),
            SANLK_LEADER_MAGIC => Some(Self::LeaderNotFound),
            _ => None,
        }
    }
}

/// Result type alias for lock manager operations.
pub type LkResult<T> = Result<T, LkError>;

impl From<std::io::Error> for LkError {
    fn from(_: std::io::Error) -> Self {
        LkError::Io
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_errors_have_no_code() {
        assert!(LkError::MalformedAlignment(1024).is_local());
        assert!(LkError::MalformedSector(8192).is_local());
        assert_eq!(LkError::MalformedSector(8192).code(), None);
        assert!(!LkError::InvalidArgument.is_local());
    }

    #[test]
    fn test_einval_variants_share_code() {
        for e in [
            LkError::InvalidArgument,
            LkError::GeometryMismatch,
            LkError::DiskSectorMismatch,
            LkError::MirrorMismatch,
        ] {
            assert_eq!(e.code(), Some(EINVAL));
        }
    }

    #[test]
    fn test_from_code() {
        assert_eq!(LkError::from_code(0), None);
        assert_eq!(LkError::from_code(ENOSPC), Some(LkError::NoSpace));
        assert_eq!(LkError::from_code(-223), Some(LkError::LeaderNotFound));
        assert_eq!(LkError::from_code(EEXIST).and_then(LkError::code), Some(EEXIST));
    }

    #[test]
    fn test_injected_display() {
        let e = LkError::Injected(Operation::WriteResource);
        assert_eq!(e.to_string(), "injected failure in write_resource");
    }
}
