use hgx_golix::GolixError;
use hgx_persistence::PersistenceError;
use hgx_privateer::PrivateerError;
use hgx_store::StoreError;
use hgx_types::{Ghid, PrimitiveKind};

/// Errors from GAO operations.
#[derive(Debug, thiserror::Error)]
pub enum GaoError {
    /// The object was deleted; create a new one instead.
    #[error("object {0} has been deleted")]
    DeadObject(Ghid),

    /// Static objects cannot change once created.
    #[error("static object {0} cannot be updated")]
    StaticImmutable(Ghid),

    /// The operation only applies to dynamic objects.
    #[error("object {0} is not dynamic")]
    NotDynamic(Ghid),

    /// The operation needs an address, but the object was never pushed.
    #[error("object has not been pushed yet")]
    Unaddressed,

    /// The address holds a primitive that is not an object.
    #[error("{ghid} is a {kind}, not an object")]
    NotAnObject { ghid: Ghid, kind: PrimitiveKind },

    /// A notification or debinding does not concern this object.
    #[error("notification {notification} does not apply to {ghid}")]
    MismatchedNotification { ghid: Ghid, notification: Ghid },

    /// No locally known secret anchors the frame's ratchet chain.
    #[error("cannot derive the secret for frame {frame} of {ghid}")]
    Ratchet { ghid: Ghid, frame: Ghid },

    /// The decrypted payload does not unpack into the object's state.
    #[error("payload error: {0}")]
    Payload(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Privateer(#[from] PrivateerError),

    #[error(transparent)]
    Golix(#[from] GolixError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GaoError {
    /// Whether the object was deleted.
    pub fn is_dead(&self) -> bool {
        matches!(self, Self::DeadObject(_))
    }
}

/// Result alias for GAO operations.
pub type GaoResult<T> = Result<T, GaoError>;
