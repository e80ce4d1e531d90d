use hgx_types::Ghid;

/// Errors from persistence collaborators.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested primitive is not in the store.
    #[error("primitive not found: {0}")]
    NotFound(Ghid),

    /// A primitive with this address is stored with different content.
    #[error("conflicting primitive already stored at {0}")]
    Inconsistent(Ghid),

    /// The author of a primitive disagrees with the author it must match.
    #[error("inconsistent author for {ghid}: expected {expected}, found {found}")]
    InconsistentAuthor {
        ghid: Ghid,
        expected: Ghid,
        found: Ghid,
    },

    /// The author or recipient identity is not stored.
    #[error("unknown identity: {0}")]
    UnknownIdentity(Ghid),

    /// A container arrived with nothing binding it.
    #[error("container {0} is not bound")]
    UnboundContainer(Ghid),

    /// A binding, debinding, or request arrived for a debound address.
    #[error("{0} has already been debound")]
    AlreadyDebound(Ghid),

    /// Remote replication is unreachable or has no copy.
    #[error("upstream unavailable: {0}")]
    UnavailableUpstream(String),
}

/// Result alias for collaborator operations.
pub type StoreResult<T> = Result<T, StoreError>;
