//! Cryptographic primitives for Hypergolix.
//!
//! Provides domain-separated BLAKE3 address hashing, Ed25519 signing and
//! verification, XChaCha20-Poly1305 container sealing under a symmetric
//! [`Secret`], and the forward-only secret ratchet.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod cipher;
pub mod hasher;
pub mod ratchet;
pub mod signer;

pub use cipher::{CipherError, Secret};
pub use hasher::ContentHasher;
pub use ratchet::{ratchet, ratchet_forward};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
