use std::fmt;

use tally_ledger::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A durable write failed earlier; mutations are refused until a store
    /// health probe succeeds.
    StoreHalted,
    Persistence(StoreError),
    /// The member directory has not been synced yet.
    DirectoryUnknown,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreHalted => write!(f, "STORE_HALTED: mutations refused until store recovers"),
            Self::Persistence(e) => write!(f, "persistence failure: {e}"),
            Self::DirectoryUnknown => write!(f, "member directory not synced"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for RuntimeError {
    fn from(e: StoreError) -> Self {
        Self::Persistence(e)
    }
}
