use hgx_types::Ghid;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrivateerError {
    #[error("no secret for {0}")]
    NotFound(Ghid),

    #[error("conflicting secret for {0}")]
    Conflict(Ghid),
}

pub type PrivateerResult<T> = Result<T, PrivateerError>;
