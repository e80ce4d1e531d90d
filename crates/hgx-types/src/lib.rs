//! Foundation types for Hypergolix.
//!
//! This crate provides the address and primitive-model types shared by every
//! other `hgx-*` crate.
//!
//! # Key Types
//!
//! - [`Ghid`] -- Content/identity-derived address of any Golix primitive
//! - [`PrimitiveKind`] -- The six wire primitive kinds
//! - [`PrimitiveSummary`] -- Lightweight, immutable description of a verified
//!   primitive, carrying only what validation and bookkeeping need

pub mod error;
pub mod ghid;
pub mod summary;

pub use error::TypeError;
pub use ghid::Ghid;
pub use summary::{
    ContainerSummary, DebindingSummary, DynamicBindingSummary, IdentitySummary, PrimitiveKind,
    PrimitiveSummary, RequestSummary, StaticBindingSummary,
};
