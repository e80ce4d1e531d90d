use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length in bytes of every Golix address.
pub const GHID_LEN: usize = 32;

/// Golix address ("ghid") of any primitive.
///
/// A `Ghid` is the BLAKE3 hash of a primitive's packed bytes (or, for a
/// dynamic binding, of its binder and creation nonce). It is the primary key
/// for every primitive in the store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ghid([u8; GHID_LEN]);

impl Ghid {
    /// Compute a `Ghid` directly from raw bytes, without domain separation.
    ///
    /// Production addresses come from the domain-separated hashers in
    /// `hgx-crypto`; this is for fixtures and derived lookup keys.
    pub fn digest(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create a `Ghid` from a pre-computed hash.
    pub const fn from_hash(hash: [u8; GHID_LEN]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; GHID_LEN] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Debug for Ghid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ghid({})", self.short_hex())
    }
}

impl fmt::Display for Ghid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; GHID_LEN]> for Ghid {
    fn from(bytes: [u8; GHID_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<Ghid> for [u8; GHID_LEN] {
    fn from(ghid: Ghid) -> Self {
        ghid.0
    }
}

impl TryFrom<&[u8]> for Ghid {
    type Error = TypeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; GHID_LEN] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: GHID_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let data = b"hello world";
        assert_eq!(Ghid::digest(data), Ghid::digest(data));
    }

    #[test]
    fn different_data_produces_different_ghids() {
        assert_ne!(Ghid::digest(b"hello"), Ghid::digest(b"world"));
    }

    #[test]
    fn hex_roundtrip() {
        let ghid = Ghid::digest(b"test");
        let parsed = Ghid::from_hex(&ghid.to_hex()).unwrap();
        assert_eq!(ghid, parsed);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = Ghid::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(matches!(
            Ghid::from_hex("not hex at all"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(Ghid::digest(b"test").short_hex().len(), 8);
    }

    #[test]
    fn display_is_full_hex() {
        let ghid = Ghid::digest(b"test");
        let display = format!("{ghid}");
        assert_eq!(display.len(), 64);
        assert_eq!(display, ghid.to_hex());
    }

    #[test]
    fn serde_roundtrip() {
        let ghid = Ghid::digest(b"serde test");
        let json = serde_json::to_string(&ghid).unwrap();
        let parsed: Ghid = serde_json::from_str(&json).unwrap();
        assert_eq!(ghid, parsed);
    }

    #[test]
    fn ordering_is_consistent() {
        assert!(Ghid::from_hash([0; 32]) < Ghid::from_hash([1; 32]));
    }

    proptest::proptest! {
        #[test]
        fn try_from_slice_accepts_only_32_bytes(bytes in proptest::collection::vec(proptest::num::u8::ANY, 0..64)) {
            let parsed = Ghid::try_from(bytes.as_slice());
            proptest::prop_assert_eq!(parsed.is_ok(), bytes.len() == GHID_LEN);
        }
    }
}
