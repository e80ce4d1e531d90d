use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use zeroize::Zeroize;

/// Length of a packed secret: 32-byte key followed by a 24-byte nonce.
pub const SECRET_LEN: usize = 56;

/// Symmetric secret protecting exactly one container.
///
/// Because a secret never seals more than one container, its nonce travels
/// with the key instead of alongside the ciphertext.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct Secret {
    key: [u8; 32],
    nonce: [u8; 24],
}

impl Secret {
    /// Fresh random secret: the root of a new ratchet chain.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        let mut nonce = [0u8; 24];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut key);
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce);
        Self { key, nonce }
    }

    pub fn from_parts(key: [u8; 32], nonce: [u8; 24]) -> Self {
        Self { key, nonce }
    }

    /// Split a 56-byte packed secret.
    pub fn from_bytes(bytes: &[u8; SECRET_LEN]) -> Self {
        let mut key = [0u8; 32];
        let mut nonce = [0u8; 24];
        key.copy_from_slice(&bytes[..32]);
        nonce.copy_from_slice(&bytes[32..]);
        Self { key, nonce }
    }

    pub fn to_bytes(&self) -> [u8; SECRET_LEN] {
        let mut out = [0u8; SECRET_LEN];
        out[..32].copy_from_slice(&self.key);
        out[32..].copy_from_slice(&self.nonce);
        out
    }

    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn nonce(&self) -> &[u8; 24] {
        &self.nonce
    }

    /// Encrypt a container payload.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = XChaCha20Poly1305::new((&self.key).into());
        cipher
            .encrypt(XNonce::from_slice(&self.nonce), plaintext)
            .map_err(|e| CipherError::Seal(e.to_string()))
    }

    /// Decrypt and authenticate a container payload.
    pub fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = XChaCha20Poly1305::new((&self.key).into());
        cipher
            .decrypt(XNonce::from_slice(&self.nonce), ciphertext)
            .map_err(|_| CipherError::Open)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(<redacted>)")
    }
}

/// Errors from container sealing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("sealing failed: {0}")]
    Seal(String),
    #[error("ciphertext failed authentication")]
    Open,
}
