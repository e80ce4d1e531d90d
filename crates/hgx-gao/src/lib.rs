//! Golix-aware objects for Hypergolix.
//!
//! A [`Gao`] holds application state and keeps it synchronised with the
//! store. Dynamic objects push a new frame per update, each container sealed
//! under the next secret of a forward ratchet; pulls heal the ratchet across
//! missed frames and align the bounded local [`History`] with the frame's
//! declared history.

pub mod error;
pub mod gao;
pub mod healing;
pub mod history;
pub mod payload;

pub use error::{GaoError, GaoResult};
pub use gao::{Gao, GaoContext};
pub use healing::heal;
pub use history::{Alignment, History};
pub use payload::GaoPayload;
