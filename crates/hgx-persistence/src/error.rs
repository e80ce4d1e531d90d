use hgx_store::StoreError;
use hgx_types::{Ghid, PrimitiveKind};

/// Errors that can occur while ingesting a primitive.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The bytes do not parse as any primitive kind.
    #[error("malformed primitive: {0}")]
    MalformedPrimitive(String),

    /// The signature does not verify against the claimed author.
    #[error("verification failed for {ghid}: {reason}")]
    VerificationFailure { ghid: Ghid, reason: String },

    /// The author or recipient identity is not known to the store.
    #[error("unknown identity: {0}")]
    UnknownIdentity(Ghid),

    /// A binding or debinding targets a primitive it may not target.
    #[error("{ghid} may not target {target} ({target_kind})")]
    InvalidTarget {
        ghid: Ghid,
        target: Ghid,
        target_kind: PrimitiveKind,
    },

    /// A dynamic frame does not carry the current frame in its history.
    #[error("frame {frame} of {ghid} omits the current frame {current} from its history")]
    IllegalDynamicFrame {
        ghid: Ghid,
        frame: Ghid,
        current: Ghid,
    },

    #[error("inconsistent author for {ghid}: expected {expected}, found {found}")]
    InconsistentAuthor {
        ghid: Ghid,
        expected: Ghid,
        found: Ghid,
    },

    #[error("container {0} is not bound")]
    UnboundContainer(Ghid),

    #[error("{0} has already been debound")]
    AlreadyDebound(Ghid),

    #[error("primitive not found: {0}")]
    NotFound(Ghid),

    #[error("upstream unavailable: {0}")]
    UnavailableUpstream(String),

    /// Configuration is invalid or could not be read.
    #[error("configuration error: {0}")]
    Config(String),

    /// A blocking parse or verify job did not complete.
    #[error("worker error: {0}")]
    Worker(String),

    /// Any other collaborator failure.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl PersistenceError {
    /// Whether probing with another loader may still succeed.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedPrimitive(_))
    }
}

impl From<StoreError> for PersistenceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(ghid) => Self::NotFound(ghid),
            StoreError::UnknownIdentity(ghid) => Self::UnknownIdentity(ghid),
            StoreError::InconsistentAuthor {
                ghid,
                expected,
                found,
            } => Self::InconsistentAuthor {
                ghid,
                expected,
                found,
            },
            StoreError::UnboundContainer(ghid) => Self::UnboundContainer(ghid),
            StoreError::AlreadyDebound(ghid) => Self::AlreadyDebound(ghid),
            StoreError::UnavailableUpstream(reason) => Self::UnavailableUpstream(reason),
            other @ StoreError::Inconsistent(_) => Self::Store(other),
        }
    }
}

/// Result alias for ingestion operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn g(n: u8) -> Ghid {
        Ghid::from_hash([n; 32])
    }

    #[test]
    fn store_taxonomy_is_lifted() {
        assert_eq!(
            PersistenceError::from(StoreError::UnknownIdentity(g(1))),
            PersistenceError::UnknownIdentity(g(1))
        );
        assert_eq!(
            PersistenceError::from(StoreError::UnboundContainer(g(2))),
            PersistenceError::UnboundContainer(g(2))
        );
        assert_eq!(
            PersistenceError::from(StoreError::Inconsistent(g(3))),
            PersistenceError::Store(StoreError::Inconsistent(g(3)))
        );
    }

    #[test]
    fn only_malformed_is_probeable() {
        assert!(PersistenceError::MalformedPrimitive("x".into()).is_malformed());
        assert!(!PersistenceError::UnknownIdentity(g(1)).is_malformed());
    }
}
