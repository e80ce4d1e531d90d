use hgx_types::{Ghid, PrimitiveKind};

/// Domain-separated BLAKE3 address hasher.
///
/// Each hasher carries a domain tag (e.g., `"hgx-geoc-v1"`) that is prepended
/// to every hash computation. A container and a binding with identical packed
/// bytes therefore never share an address.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for identity primitives.
    pub const GIDC: Self = Self::new("hgx-gidc-v1");
    /// Hasher for containers.
    pub const GEOC: Self = Self::new("hgx-geoc-v1");
    /// Hasher for static bindings.
    pub const GOBS: Self = Self::new("hgx-gobs-v1");
    /// Hasher for dynamic binding frames.
    pub const GOBD: Self = Self::new("hgx-gobd-v1");
    /// Hasher for debindings.
    pub const GDXX: Self = Self::new("hgx-gdxx-v1");
    /// Hasher for requests.
    pub const GARQ: Self = Self::new("hgx-garq-v1");
    /// Hasher for the stable address of a dynamic binding.
    pub const DYNAMIC_ADDRESS: Self = Self::new("hgx-gobd-address-v1");

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// The hasher that addresses packed primitives of `kind`.
    pub const fn for_kind(kind: PrimitiveKind) -> Self {
        match kind {
            PrimitiveKind::Gidc => Self::GIDC,
            PrimitiveKind::Geoc => Self::GEOC,
            PrimitiveKind::Gobs => Self::GOBS,
            PrimitiveKind::Gobd => Self::GOBD,
            PrimitiveKind::Gdxx => Self::GDXX,
            PrimitiveKind::Garq => Self::GARQ,
        }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Ghid {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Ghid::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash several byte strings as one domain-separated message.
    ///
    /// Each part is length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> Ghid {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Ghid::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected address.
    pub fn verify(&self, data: &[u8], expected: &Ghid) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::GEOC.hash(data), ContentHasher::GEOC.hash(data));
    }

    #[test]
    fn every_kind_has_its_own_domain() {
        let data = b"same content";
        let mut seen = std::collections::HashSet::new();
        for kind in PrimitiveKind::ALL {
            assert!(seen.insert(ContentHasher::for_kind(kind).hash(data)));
        }
        assert!(seen.insert(ContentHasher::DYNAMIC_ADDRESS.hash(data)));
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::GOBS.hash(b"original");
        assert!(ContentHasher::GOBS.verify(b"original", &id));
        assert!(!ContentHasher::GOBS.verify(b"tampered", &id));
    }

    #[test]
    fn hash_parts_is_unambiguous() {
        let a = ContentHasher::DYNAMIC_ADDRESS.hash_parts(&[b"ab", b"c"]);
        let b = ContentHasher::DYNAMIC_ADDRESS.hash_parts(&[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn domain_hash_differs_from_plain_digest() {
        assert_ne!(ContentHasher::GIDC.hash(b"test"), Ghid::digest(b"test"));
        assert_eq!(ContentHasher::GIDC.domain(), "hgx-gidc-v1");
    }
}
