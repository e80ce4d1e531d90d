//! High-level SDK for Hypergolix.
//!
//! [`HgxCore`] wires every component together explicitly: the persistence
//! pipeline with its collaborators, the secret store, the local identity,
//! and the [`Oracle`] registry of live objects. Applications create and
//! load objects through it and receive remote updates through its delivery
//! task.
//!
//! Call [`telemetry::init`] once from the binary to see the logs.

pub mod assembly;
pub mod error;
pub mod oracle;
pub mod telemetry;

pub use assembly::{HgxCore, Object};
pub use error::{SdkError, SdkResult};
pub use oracle::Oracle;

// Re-export key types
pub use hgx_gao::{Gao, GaoContext, GaoError, GaoPayload};
pub use hgx_golix::FirstParty;
pub use hgx_persistence::CoreConfig;
pub use hgx_types::{Ghid, PrimitiveKind, PrimitiveSummary};
