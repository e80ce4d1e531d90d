use bincode::Options;
use hgx_crypto::signer::SIGNATURE_LEN;
use hgx_crypto::{Signature, SigningKey};
use hgx_types::PrimitiveKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{GolixError, GolixResult};

/// Current primitive format version.
pub const VERSION: u8 = 1;

/// Maximum frames a dynamic binding may carry in its history.
pub const MAX_HISTORY: usize = 64;

/// Upper bound on an encoded body, guarding allocation on hostile input.
pub const MAX_BODY_SIZE: u64 = 16 * 1024 * 1024;

const HEADER_LEN: usize = 5;

/// Four-byte magic prefix of each primitive kind.
pub const fn magic(kind: PrimitiveKind) -> [u8; 4] {
    match kind {
        PrimitiveKind::Gidc => *b"GIDC",
        PrimitiveKind::Geoc => *b"GEOC",
        PrimitiveKind::Gobs => *b"GOBS",
        PrimitiveKind::Gobd => *b"GOBD",
        PrimitiveKind::Gdxx => *b"GDXX",
        PrimitiveKind::Garq => *b"GARQ",
    }
}

/// A decoded body and its trailing signature, if the kind is signed.
#[derive(Debug)]
pub struct Decoded<B> {
    pub body: B,
    pub signature: Option<Signature>,
}

/// Codec for packing and unpacking Golix primitives.
///
/// Layout: `[4 bytes magic][1 byte version][bincode body][64 byte signature]`,
/// the signature present only for signed kinds and covering everything
/// before it.
pub struct GolixCodec;

impl GolixCodec {
    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_limit(MAX_BODY_SIZE)
            .reject_trailing_bytes()
    }

    /// Encode header and body without a signature.
    pub fn encode<B: Serialize>(kind: PrimitiveKind, body: &B) -> GolixResult<Vec<u8>> {
        let payload = Self::options()
            .serialize(body)
            .map_err(|e| GolixError::Serialization(e.to_string()))?;
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + SIGNATURE_LEN);
        buf.extend_from_slice(&magic(kind));
        buf.push(VERSION);
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Encode and append a signature over the encoded bytes.
    pub fn encode_signed<B: Serialize>(
        kind: PrimitiveKind,
        body: &B,
        signer: &SigningKey,
    ) -> GolixResult<Vec<u8>> {
        let mut buf = Self::encode(kind, body)?;
        let signature = signer.sign(&buf);
        buf.extend_from_slice(&signature.to_bytes());
        Ok(buf)
    }

    /// Split off the signed region of a packed primitive.
    pub fn signed_region(kind: PrimitiveKind, data: &[u8]) -> &[u8] {
        if kind.is_signed() && data.len() >= SIGNATURE_LEN {
            &data[..data.len() - SIGNATURE_LEN]
        } else {
            data
        }
    }

    /// Check the header and decode the body of a `kind` primitive.
    pub fn decode<B: DeserializeOwned>(
        kind: PrimitiveKind,
        data: &[u8],
    ) -> GolixResult<Decoded<B>> {
        let trailer = if kind.is_signed() { SIGNATURE_LEN } else { 0 };
        if data.len() < HEADER_LEN + trailer {
            return Err(GolixError::Truncated {
                kind,
                len: data.len(),
            });
        }

        let found: [u8; 4] = [data[0], data[1], data[2], data[3]];
        if found != magic(kind) {
            return Err(GolixError::WrongMagic {
                expected: kind,
                found,
            });
        }
        if data[4] != VERSION {
            return Err(GolixError::UnsupportedVersion {
                kind,
                version: data[4],
            });
        }

        let body_end = data.len() - trailer;
        let body: B = Self::options()
            .deserialize(&data[HEADER_LEN..body_end])
            .map_err(|e| GolixError::Deserialization(e.to_string()))?;

        let signature = if kind.is_signed() {
            let mut raw = [0u8; SIGNATURE_LEN];
            raw.copy_from_slice(&data[body_end..]);
            Some(Signature::from_bytes(&raw))
        } else {
            None
        };

        Ok(Decoded { body, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Body {
        value: u64,
        name: String,
    }

    fn body() -> Body {
        Body {
            value: 42,
            name: "frame".into(),
        }
    }

    #[test]
    fn header_layout() {
        let packed = GolixCodec::encode(PrimitiveKind::Gidc, &body()).unwrap();
        assert_eq!(&packed[..4], b"GIDC");
        assert_eq!(packed[4], VERSION);
    }

    #[test]
    fn unsigned_decode() {
        let packed = GolixCodec::encode(PrimitiveKind::Garq, &body()).unwrap();
        let decoded: Decoded<Body> = GolixCodec::decode(PrimitiveKind::Garq, &packed).unwrap();
        assert_eq!(decoded.body, body());
        assert!(decoded.signature.is_none());
    }

    #[test]
    fn signed_decode_carries_signature() {
        let key = SigningKey::generate();
        let packed = GolixCodec::encode_signed(PrimitiveKind::Geoc, &body(), &key).unwrap();
        let decoded: Decoded<Body> = GolixCodec::decode(PrimitiveKind::Geoc, &packed).unwrap();
        let signature = decoded.signature.unwrap();
        let region = GolixCodec::signed_region(PrimitiveKind::Geoc, &packed);
        assert!(key.verifying_key().verify(region, &signature).is_ok());
    }

    #[test]
    fn wrong_magic_rejected() {
        let packed = GolixCodec::encode(PrimitiveKind::Gidc, &body()).unwrap();
        let err = GolixCodec::decode::<Body>(PrimitiveKind::Garq, &packed).unwrap_err();
        assert!(matches!(err, GolixError::WrongMagic { .. }));
        assert!(err.is_malformed());
    }

    #[test]
    fn wrong_version_rejected() {
        let mut packed = GolixCodec::encode(PrimitiveKind::Gidc, &body()).unwrap();
        packed[4] = 9;
        let err = GolixCodec::decode::<Body>(PrimitiveKind::Gidc, &packed).unwrap_err();
        assert!(matches!(
            err,
            GolixError::UnsupportedVersion { version: 9, .. }
        ));
    }

    #[test]
    fn truncated_rejected() {
        let err = GolixCodec::decode::<Body>(PrimitiveKind::Geoc, b"GEOC").unwrap_err();
        assert!(matches!(err, GolixError::Truncated { len: 4, .. }));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut packed = GolixCodec::encode(PrimitiveKind::Gidc, &body()).unwrap();
        packed.push(0);
        let err = GolixCodec::decode::<Body>(PrimitiveKind::Gidc, &packed).unwrap_err();
        assert!(matches!(err, GolixError::Deserialization(_)));
    }

    proptest::proptest! {
        #[test]
        fn garbage_never_panics(data in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            for kind in PrimitiveKind::ALL {
                let _ = GolixCodec::decode::<Body>(kind, &data);
            }
        }
    }
}
