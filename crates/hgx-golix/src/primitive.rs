//! The six Golix primitives, as parsed from or packed into wire bytes.
//!
//! Every primitive keeps its exact packed bytes, so storing and forwarding
//! never re-encodes.

use hgx_crypto::{ContentHasher, Secret, Signature};
use hgx_types::{
    ContainerSummary, DebindingSummary, DynamicBindingSummary, Ghid, IdentitySummary,
    PrimitiveKind, PrimitiveSummary, RequestSummary, StaticBindingSummary,
};
use serde::{Deserialize, Serialize};

use crate::codec::{GolixCodec, MAX_HISTORY};
use crate::error::{GolixError, GolixResult};

#[derive(Serialize, Deserialize)]
pub(crate) struct IdentityBody {
    pub signature_key: [u8; 32],
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ContainerBody {
    pub author: Ghid,
    pub payload: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct StaticBindingBody {
    pub binder: Ghid,
    pub target: Ghid,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct DynamicBindingBody {
    pub binder: Ghid,
    pub nonce: [u8; 32],
    pub target: Ghid,
    pub history: Vec<Ghid>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct DebindingBody {
    pub debinder: Ghid,
    pub target: Ghid,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct RequestBody {
    pub recipient: Ghid,
    pub payload: Vec<u8>,
}

/// Stable address of a dynamic binding created by `binder` with `nonce`.
pub fn dynamic_address(binder: &Ghid, nonce: &[u8; 32]) -> Ghid {
    ContentHasher::DYNAMIC_ADDRESS.hash_parts(&[binder.as_bytes(), nonce])
}

/// Public identity.
#[derive(Debug, Clone)]
pub struct Gidc {
    pub ghid: Ghid,
    pub signature_key: [u8; 32],
    packed: Vec<u8>,
}

/// Encrypted container.
#[derive(Debug, Clone)]
pub struct Geoc {
    pub ghid: Ghid,
    pub author: Ghid,
    pub payload: Vec<u8>,
    pub signature: Signature,
    packed: Vec<u8>,
}

/// Static binding.
#[derive(Debug, Clone)]
pub struct Gobs {
    pub ghid: Ghid,
    pub binder: Ghid,
    pub target: Ghid,
    pub signature: Signature,
    packed: Vec<u8>,
}

/// One frame of a dynamic binding.
#[derive(Debug, Clone)]
pub struct Gobd {
    /// Stable object address, identical across frames.
    pub ghid: Ghid,
    /// Address of this frame.
    pub frame_ghid: Ghid,
    pub binder: Ghid,
    pub nonce: [u8; 32],
    pub target: Ghid,
    /// Prior frames, newest first.
    pub history: Vec<Ghid>,
    pub signature: Signature,
    packed: Vec<u8>,
}

/// Debinding.
#[derive(Debug, Clone)]
pub struct Gdxx {
    pub ghid: Ghid,
    pub debinder: Ghid,
    pub target: Ghid,
    pub signature: Signature,
    packed: Vec<u8>,
}

/// Asymmetric request addressed to a recipient identity.
#[derive(Debug, Clone)]
pub struct Garq {
    pub ghid: Ghid,
    pub recipient: Ghid,
    pub payload: Vec<u8>,
    packed: Vec<u8>,
}

fn signature_of(kind: PrimitiveKind, signature: Option<Signature>) -> GolixResult<Signature> {
    signature.ok_or(GolixError::Unsigned { kind })
}

impl Gidc {
    pub(crate) fn from_packed(packed: Vec<u8>) -> GolixResult<Self> {
        let decoded = GolixCodec::decode::<IdentityBody>(PrimitiveKind::Gidc, &packed)?;
        Ok(Self {
            ghid: ContentHasher::GIDC.hash(&packed),
            signature_key: decoded.body.signature_key,
            packed,
        })
    }

    pub fn unpack(data: &[u8]) -> GolixResult<Self> {
        Self::from_packed(data.to_vec())
    }

    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    pub fn summarize(&self) -> IdentitySummary {
        IdentitySummary {
            ghid: self.ghid,
            signature_key: self.signature_key,
        }
    }
}

impl Geoc {
    pub(crate) fn from_packed(packed: Vec<u8>) -> GolixResult<Self> {
        let decoded = GolixCodec::decode::<ContainerBody>(PrimitiveKind::Geoc, &packed)?;
        Ok(Self {
            ghid: ContentHasher::GEOC.hash(&packed),
            author: decoded.body.author,
            payload: decoded.body.payload,
            signature: signature_of(PrimitiveKind::Geoc, decoded.signature)?,
            packed,
        })
    }

    pub fn unpack(data: &[u8]) -> GolixResult<Self> {
        Self::from_packed(data.to_vec())
    }

    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    /// Decrypt the payload.
    pub fn open(&self, secret: &Secret) -> GolixResult<Vec<u8>> {
        Ok(secret.open(&self.payload)?)
    }

    pub fn summarize(&self) -> ContainerSummary {
        ContainerSummary {
            ghid: self.ghid,
            author: self.author,
        }
    }
}

impl Gobs {
    pub(crate) fn from_packed(packed: Vec<u8>) -> GolixResult<Self> {
        let decoded = GolixCodec::decode::<StaticBindingBody>(PrimitiveKind::Gobs, &packed)?;
        Ok(Self {
            ghid: ContentHasher::GOBS.hash(&packed),
            binder: decoded.body.binder,
            target: decoded.body.target,
            signature: signature_of(PrimitiveKind::Gobs, decoded.signature)?,
            packed,
        })
    }

    pub fn unpack(data: &[u8]) -> GolixResult<Self> {
        Self::from_packed(data.to_vec())
    }

    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    pub fn summarize(&self) -> StaticBindingSummary {
        StaticBindingSummary {
            ghid: self.ghid,
            author: self.binder,
            target: self.target,
        }
    }
}

impl Gobd {
    pub(crate) fn from_packed(packed: Vec<u8>) -> GolixResult<Self> {
        let decoded = GolixCodec::decode::<DynamicBindingBody>(PrimitiveKind::Gobd, &packed)?;
        let body = decoded.body;
        if body.history.len() > MAX_HISTORY {
            return Err(GolixError::HistoryTooLong {
                len: body.history.len(),
                max: MAX_HISTORY,
            });
        }
        Ok(Self {
            ghid: dynamic_address(&body.binder, &body.nonce),
            frame_ghid: ContentHasher::GOBD.hash(&packed),
            binder: body.binder,
            nonce: body.nonce,
            target: body.target,
            history: body.history,
            signature: signature_of(PrimitiveKind::Gobd, decoded.signature)?,
            packed,
        })
    }

    pub fn unpack(data: &[u8]) -> GolixResult<Self> {
        Self::from_packed(data.to_vec())
    }

    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    pub fn summarize(&self) -> DynamicBindingSummary {
        DynamicBindingSummary {
            ghid: self.ghid,
            author: self.binder,
            target: self.target,
            frame: self.frame_ghid,
            history: self.history.clone(),
        }
    }
}

impl Gdxx {
    pub(crate) fn from_packed(packed: Vec<u8>) -> GolixResult<Self> {
        let decoded = GolixCodec::decode::<DebindingBody>(PrimitiveKind::Gdxx, &packed)?;
        Ok(Self {
            ghid: ContentHasher::GDXX.hash(&packed),
            debinder: decoded.body.debinder,
            target: decoded.body.target,
            signature: signature_of(PrimitiveKind::Gdxx, decoded.signature)?,
            packed,
        })
    }

    pub fn unpack(data: &[u8]) -> GolixResult<Self> {
        Self::from_packed(data.to_vec())
    }

    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    pub fn summarize(&self) -> DebindingSummary {
        DebindingSummary {
            ghid: self.ghid,
            author: self.debinder,
            target: self.target,
        }
    }
}

impl Garq {
    pub(crate) fn from_packed(packed: Vec<u8>) -> GolixResult<Self> {
        let decoded = GolixCodec::decode::<RequestBody>(PrimitiveKind::Garq, &packed)?;
        Ok(Self {
            ghid: ContentHasher::GARQ.hash(&packed),
            recipient: decoded.body.recipient,
            payload: decoded.body.payload,
            packed,
        })
    }

    pub fn unpack(data: &[u8]) -> GolixResult<Self> {
        Self::from_packed(data.to_vec())
    }

    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    pub fn summarize(&self) -> RequestSummary {
        RequestSummary {
            ghid: self.ghid,
            recipient: self.recipient,
        }
    }
}

/// Any parsed primitive.
#[derive(Debug, Clone)]
pub enum Primitive {
    Gidc(Gidc),
    Geoc(Geoc),
    Gobs(Gobs),
    Gobd(Gobd),
    Gdxx(Gdxx),
    Garq(Garq),
}

impl Primitive {
    /// Parse `data` as a primitive of the given kind.
    pub fn unpack(kind: PrimitiveKind, data: &[u8]) -> GolixResult<Self> {
        let packed = data.to_vec();
        Ok(match kind {
            PrimitiveKind::Gidc => Self::Gidc(Gidc::from_packed(packed)?),
            PrimitiveKind::Geoc => Self::Geoc(Geoc::from_packed(packed)?),
            PrimitiveKind::Gobs => Self::Gobs(Gobs::from_packed(packed)?),
            PrimitiveKind::Gobd => Self::Gobd(Gobd::from_packed(packed)?),
            PrimitiveKind::Gdxx => Self::Gdxx(Gdxx::from_packed(packed)?),
            PrimitiveKind::Garq => Self::Garq(Garq::from_packed(packed)?),
        })
    }

    /// Parse bytes of unknown kind by their magic prefix.
    pub fn unpack_any(data: &[u8]) -> GolixResult<Self> {
        let kind = PrimitiveKind::ALL
            .into_iter()
            .find(|kind| data.starts_with(&crate::codec::magic(*kind)))
            .ok_or(GolixError::Unrecognised)?;
        Self::unpack(kind, data)
    }

    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Gidc(_) => PrimitiveKind::Gidc,
            Self::Geoc(_) => PrimitiveKind::Geoc,
            Self::Gobs(_) => PrimitiveKind::Gobs,
            Self::Gobd(_) => PrimitiveKind::Gobd,
            Self::Gdxx(_) => PrimitiveKind::Gdxx,
            Self::Garq(_) => PrimitiveKind::Garq,
        }
    }

    pub fn ghid(&self) -> Ghid {
        match self {
            Self::Gidc(p) => p.ghid,
            Self::Geoc(p) => p.ghid,
            Self::Gobs(p) => p.ghid,
            Self::Gobd(p) => p.ghid,
            Self::Gdxx(p) => p.ghid,
            Self::Garq(p) => p.ghid,
        }
    }

    pub fn packed(&self) -> &[u8] {
        match self {
            Self::Gidc(p) => p.packed(),
            Self::Geoc(p) => p.packed(),
            Self::Gobs(p) => p.packed(),
            Self::Gobd(p) => p.packed(),
            Self::Gdxx(p) => p.packed(),
            Self::Garq(p) => p.packed(),
        }
    }

    /// Claimed author of signed kinds.
    pub fn author(&self) -> Option<Ghid> {
        match self {
            Self::Geoc(p) => Some(p.author),
            Self::Gobs(p) => Some(p.binder),
            Self::Gobd(p) => Some(p.binder),
            Self::Gdxx(p) => Some(p.debinder),
            Self::Gidc(_) | Self::Garq(_) => None,
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Self::Geoc(p) => Some(&p.signature),
            Self::Gobs(p) => Some(&p.signature),
            Self::Gobd(p) => Some(&p.signature),
            Self::Gdxx(p) => Some(&p.signature),
            Self::Gidc(_) | Self::Garq(_) => None,
        }
    }

    /// Bytes covered by the signature.
    pub fn signed_region(&self) -> &[u8] {
        GolixCodec::signed_region(self.kind(), self.packed())
    }

    pub fn summarize(&self) -> PrimitiveSummary {
        match self {
            Self::Gidc(p) => p.summarize().into(),
            Self::Geoc(p) => p.summarize().into(),
            Self::Gobs(p) => p.summarize().into(),
            Self::Gobd(p) => p.summarize().into(),
            Self::Gdxx(p) => p.summarize().into(),
            Self::Garq(p) => p.summarize().into(),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Primitive {
                fn from(p: $variant) -> Self {
                    Self::$variant(p)
                }
            }
        )*
    };
}

impl_from_primitive!(Gidc, Geoc, Gobs, Gobd, Gdxx, Garq);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FirstParty;

    #[test]
    fn unpack_any_dispatches_on_magic() {
        let alice = FirstParty::generate().unwrap();
        let binding = alice.make_binding_stat(Ghid::digest(b"target")).unwrap();
        let parsed = Primitive::unpack_any(binding.packed()).unwrap();
        assert_eq!(parsed.kind(), PrimitiveKind::Gobs);
        assert_eq!(parsed.ghid(), binding.ghid);
        assert_eq!(parsed.author(), Some(alice.ghid()));
    }

    #[test]
    fn unpack_any_rejects_unknown_magic() {
        let err = Primitive::unpack_any(b"XXXX\x01").unwrap_err();
        assert!(matches!(err, GolixError::Unrecognised));
    }

    #[test]
    fn address_is_hash_of_packed_bytes() {
        let alice = FirstParty::generate().unwrap();
        let debinding = alice.make_debinding(Ghid::digest(b"target")).unwrap();
        assert!(ContentHasher::GDXX.verify(debinding.packed(), &debinding.ghid));
    }

    #[test]
    fn frames_share_the_dynamic_address() {
        let alice = FirstParty::generate().unwrap();
        let first = alice
            .make_binding_dyn(Ghid::digest(b"c1"), None, Vec::new())
            .unwrap();
        let second = alice
            .make_binding_dyn(Ghid::digest(b"c2"), Some(first.nonce), vec![first.frame_ghid])
            .unwrap();
        assert_eq!(first.ghid, second.ghid);
        assert_ne!(first.frame_ghid, second.frame_ghid);
        assert_eq!(second.summarize().history, vec![first.frame_ghid]);
    }

    #[test]
    fn oversized_history_is_malformed() {
        let alice = FirstParty::generate().unwrap();
        let history = vec![Ghid::digest(b"f"); MAX_HISTORY + 1];
        let frame = alice.make_binding_dyn(Ghid::digest(b"c"), None, history);
        let err = frame.unwrap_err();
        assert!(matches!(err, GolixError::HistoryTooLong { .. }));
        assert!(err.is_malformed());
    }

    #[test]
    fn repacking_is_byte_identical() {
        let alice = FirstParty::generate().unwrap();
        let container = alice.make_container(&Secret::generate(), b"state").unwrap();
        let reparsed = Geoc::unpack(container.packed()).unwrap();
        assert_eq!(reparsed.packed(), container.packed());
        assert_eq!(reparsed.ghid, container.ghid);
    }
}
