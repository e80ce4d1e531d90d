//! Persistence collaborators for Hypergolix.
//!
//! The ingestion pipeline consults six collaborators, each behind an
//! `async` trait so that durable or remote-backed implementations can be
//! swapped in:
//!
//! - [`Librarian`] -- address-keyed storage of packed primitives
//! - [`Lawyer`] -- authorship consistency
//! - [`Bookie`] -- binding, debinding, and request bookkeeping
//! - [`Undertaker`] -- garbage collection of unbound or debound primitives
//! - [`Postman`] -- subscription notifications
//! - [`Salmonator`] -- upstream replication
//!
//! In-memory implementations of each are provided for tests and embedding.
//!
//! # Design Rules
//!
//! 1. Collaborators never hold a lock across an `.await`.
//! 2. Collaborators see summaries only; verification already happened.
//! 3. Preparation runs before the store write, collection after.

pub mod bookie;
pub mod error;
pub mod lawyer;
pub mod librarian;
pub mod postman;
pub mod salmonator;
pub mod traits;
pub mod undertaker;

pub use bookie::MemoryBookie;
pub use error::{StoreError, StoreResult};
pub use lawyer::MemoryLawyer;
pub use librarian::MemoryLibrarian;
pub use postman::BroadcastPostman;
pub use salmonator::MirrorSalmonator;
pub use traits::{
    Bookie, Lawyer, Librarian, Postcard, PostcardStream, Postman, Salmonator, Undertaker,
};
pub use undertaker::MemoryUndertaker;
