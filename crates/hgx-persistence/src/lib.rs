//! Ingestion pipeline for Hypergolix.
//!
//! Every primitive enters the store through [`PersistenceCore`]:
//!
//! 1. [`Doorman`] -- parse untrusted bytes and verify signatures
//! 2. Validators -- redundancy, [`Enforcer`], lawyer, bookie
//! 3. Preparers -- undertaker staging, bookie placement
//! 4. Store, replicate upstream, notify subscribers, collect garbage
//!
//! # Design Rules
//!
//! 1. The stage order is fixed. Validators and preparers see the store as it
//!    was before the primitive; notification and collection see it after.
//! 2. A failed validator leaves the store untouched.
//! 3. Only malformed-input failures are swallowed while probing kinds.

pub mod config;
pub mod doorman;
pub mod enforcer;
pub mod error;
pub mod pipeline;

pub use config::{CoreConfig, MIN_LEGROOM};
pub use doorman::Doorman;
pub use enforcer::Enforcer;
pub use error::{PersistenceError, PersistenceResult};
pub use pipeline::{Collaborators, IngestStage, PersistenceCore};
