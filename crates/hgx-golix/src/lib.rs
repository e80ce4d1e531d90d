//! Golix wire primitives for Hypergolix.
//!
//! Defines the packed layout of the six primitive kinds, the codec that
//! reads and writes them, [`FirstParty`] for building and signing primitives,
//! and [`SecondParty`] for verifying them.

pub mod codec;
pub mod error;
pub mod identity;
pub mod primitive;

pub use codec::{GolixCodec, MAX_HISTORY, VERSION};
pub use error::{GolixError, GolixResult};
pub use identity::{FirstParty, SecondParty};
pub use primitive::{dynamic_address, Garq, Gdxx, Geoc, Gidc, Gobd, Gobs, Primitive};
