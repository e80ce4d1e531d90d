//! Lightweight summaries of the six Golix primitive kinds.
//!
//! A summary carries only what validation and bookkeeping need. Encrypted
//! payloads and signatures stay in the packed bytes held by the librarian.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::ghid::Ghid;

/// The closed set of primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// Public identity.
    Gidc,
    /// Encrypted container.
    Geoc,
    /// Static binding.
    Gobs,
    /// Dynamic binding frame.
    Gobd,
    /// Debinding.
    Gdxx,
    /// Asymmetric request.
    Garq,
}

impl PrimitiveKind {
    /// Every kind, in the order the ingestion pipeline probes them.
    pub const ALL: [PrimitiveKind; 6] = [
        PrimitiveKind::Gidc,
        PrimitiveKind::Geoc,
        PrimitiveKind::Gobs,
        PrimitiveKind::Gobd,
        PrimitiveKind::Gdxx,
        PrimitiveKind::Garq,
    ];

    /// Four-letter lowercase tag.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Gidc => "gidc",
            Self::Geoc => "geoc",
            Self::Gobs => "gobs",
            Self::Gobd => "gobd",
            Self::Gdxx => "gdxx",
            Self::Garq => "garq",
        }
    }

    /// Whether primitives of this kind are signed by an author.
    pub const fn is_signed(self) -> bool {
        !matches!(self, Self::Gidc | Self::Garq)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Public identity: address plus the Ed25519 key its primitives are signed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub ghid: Ghid,
    pub signature_key: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub ghid: Ghid,
    pub author: Ghid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticBindingSummary {
    pub ghid: Ghid,
    pub author: Ghid,
    pub target: Ghid,
}

/// One frame of a dynamic binding.
///
/// `ghid` is the stable object address shared by every frame; `frame` is the
/// address of this particular signed update. `history` is newest-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicBindingSummary {
    pub ghid: Ghid,
    pub author: Ghid,
    pub target: Ghid,
    pub frame: Ghid,
    pub history: Vec<Ghid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebindingSummary {
    pub ghid: Ghid,
    pub author: Ghid,
    pub target: Ghid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub ghid: Ghid,
    pub recipient: Ghid,
}

/// Summary of any primitive.
///
/// Equality and hashing go by [`store_key`](Self::store_key) only. Use
/// [`is_consistent_with`](Self::is_consistent_with) to detect two summaries
/// that share an address but disagree on content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrimitiveSummary {
    Identity(IdentitySummary),
    Container(ContainerSummary),
    StaticBinding(StaticBindingSummary),
    DynamicBinding(DynamicBindingSummary),
    Debinding(DebindingSummary),
    Request(RequestSummary),
}

impl PrimitiveSummary {
    /// The primitive's address. For dynamic bindings this is the stable
    /// object address, not the frame.
    pub fn ghid(&self) -> Ghid {
        match self {
            Self::Identity(s) => s.ghid,
            Self::Container(s) => s.ghid,
            Self::StaticBinding(s) => s.ghid,
            Self::DynamicBinding(s) => s.ghid,
            Self::Debinding(s) => s.ghid,
            Self::Request(s) => s.ghid,
        }
    }

    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Identity(_) => PrimitiveKind::Gidc,
            Self::Container(_) => PrimitiveKind::Geoc,
            Self::StaticBinding(_) => PrimitiveKind::Gobs,
            Self::DynamicBinding(_) => PrimitiveKind::Gobd,
            Self::Debinding(_) => PrimitiveKind::Gdxx,
            Self::Request(_) => PrimitiveKind::Garq,
        }
    }

    /// The signing author, if this kind has one.
    pub fn author(&self) -> Option<Ghid> {
        match self {
            Self::Container(s) => Some(s.author),
            Self::StaticBinding(s) => Some(s.author),
            Self::DynamicBinding(s) => Some(s.author),
            Self::Debinding(s) => Some(s.author),
            Self::Identity(_) | Self::Request(_) => None,
        }
    }

    /// The bound or debound address, for bindings and debindings.
    pub fn target(&self) -> Option<Ghid> {
        match self {
            Self::StaticBinding(s) => Some(s.target),
            Self::DynamicBinding(s) => Some(s.target),
            Self::Debinding(s) => Some(s.target),
            _ => None,
        }
    }

    /// Frame address of a dynamic binding.
    pub fn frame(&self) -> Option<Ghid> {
        match self {
            Self::DynamicBinding(s) => Some(s.frame),
            _ => None,
        }
    }

    /// Key under which the packed bytes are stored: the frame address for
    /// dynamic bindings, the primitive address otherwise.
    pub fn store_key(&self) -> Ghid {
        match self {
            Self::DynamicBinding(s) => s.frame,
            other => other.ghid(),
        }
    }

    /// Structural comparison of every summarized field.
    pub fn is_consistent_with(&self, other: &PrimitiveSummary) -> bool {
        match (self, other) {
            (Self::Identity(a), Self::Identity(b)) => a == b,
            (Self::Container(a), Self::Container(b)) => a == b,
            (Self::StaticBinding(a), Self::StaticBinding(b)) => a == b,
            (Self::DynamicBinding(a), Self::DynamicBinding(b)) => a == b,
            (Self::Debinding(a), Self::Debinding(b)) => a == b,
            (Self::Request(a), Self::Request(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for PrimitiveSummary {
    fn eq(&self, other: &Self) -> bool {
        self.store_key() == other.store_key()
    }
}

impl Eq for PrimitiveSummary {}

impl Hash for PrimitiveSummary {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.store_key().hash(state);
    }
}

impl fmt::Display for PrimitiveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.ghid().short_hex())
    }
}

impl From<IdentitySummary> for PrimitiveSummary {
    fn from(s: IdentitySummary) -> Self {
        Self::Identity(s)
    }
}

impl From<ContainerSummary> for PrimitiveSummary {
    fn from(s: ContainerSummary) -> Self {
        Self::Container(s)
    }
}

impl From<StaticBindingSummary> for PrimitiveSummary {
    fn from(s: StaticBindingSummary) -> Self {
        Self::StaticBinding(s)
    }
}

impl From<DynamicBindingSummary> for PrimitiveSummary {
    fn from(s: DynamicBindingSummary) -> Self {
        Self::DynamicBinding(s)
    }
}

impl From<DebindingSummary> for PrimitiveSummary {
    fn from(s: DebindingSummary) -> Self {
        Self::Debinding(s)
    }
}

impl From<RequestSummary> for PrimitiveSummary {
    fn from(s: RequestSummary) -> Self {
        Self::Request(s)
    }
}
