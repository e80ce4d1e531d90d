//! Two-tier transactional secret store for Hypergolix.
//!
//! Secrets are staged while the primitives they protect are in flight and
//! committed only once those primitives are durably stored. Staging and
//! committed tiers are read as one merged view.

pub mod error;
pub mod privateer;

pub use error::{PrivateerError, PrivateerResult};
pub use privateer::Privateer;
