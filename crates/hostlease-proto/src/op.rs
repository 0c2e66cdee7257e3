/// Lock manager operation kinds, used to arm injected failures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every public lock manager entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    WriteLockspace,
    AddLockspace,
    RemLockspace,
    InqLockspace,
    CompleteAsync,
    WriteResource,
    ReadResource,
    ReadResourceOwners,
    Acquire,
    Release,
    GetHosts,
    Register,
    Close,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WriteLockspace => "write_lockspace",
            Self::AddLockspace => "add_lockspace",
            Self::RemLockspace => "rem_lockspace",
            Self::InqLockspace => "inq_lockspace",
            Self::CompleteAsync => "complete_async",
            Self::WriteResource => "write_resource",
            Self::ReadResource => "read_resource",
            Self::ReadResourceOwners => "read_resource_owners",
            Self::Acquire => "acquire",
            Self::Release => "release",
            Self::GetHosts => "get_hosts",
            Self::Register => "register",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
