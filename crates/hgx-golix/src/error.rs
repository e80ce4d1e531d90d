use hgx_crypto::{CipherError, SignatureError};
use hgx_types::PrimitiveKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GolixError {
    #[error("truncated {kind} primitive: {len} bytes")]
    Truncated { kind: PrimitiveKind, len: usize },

    #[error("bad magic for {expected}: found {found:?}")]
    WrongMagic { expected: PrimitiveKind, found: [u8; 4] },

    #[error("unsupported {kind} version: {version}")]
    UnsupportedVersion { kind: PrimitiveKind, version: u8 },

    #[error("dynamic binding history too long: {len} frames (max {max})")]
    HistoryTooLong { len: usize, max: usize },

    #[error("encoding error: {0}")]
    Serialization(String),

    #[error("decoding error: {0}")]
    Deserialization(String),

    #[error("unrecognised primitive")]
    Unrecognised,

    #[error("{kind} primitive is not signed")]
    Unsigned { kind: PrimitiveKind },

    #[error("author mismatch: primitive names {claimed}, verifier is {actual}")]
    WrongAuthor {
        claimed: hgx_types::Ghid,
        actual: hgx_types::Ghid,
    },

    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
}

impl GolixError {
    /// Whether this error means the bytes could not be parsed at all.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::WrongMagic { .. }
                | Self::UnsupportedVersion { .. }
                | Self::HistoryTooLong { .. }
                | Self::Deserialization(_)
                | Self::Unrecognised
        )
    }
}

pub type GolixResult<T> = Result<T, GolixError>;
