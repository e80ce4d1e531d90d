//! First-party (private, signing) and second-party (public, verifying)
//! Golix identities.

use hgx_crypto::{Secret, SigningKey, VerifyingKey};
use hgx_types::{Ghid, IdentitySummary, PrimitiveKind};
use rand::RngCore;

use crate::codec::GolixCodec;
use crate::error::{GolixError, GolixResult};
use crate::primitive::{
    ContainerBody, DebindingBody, DynamicBindingBody, Garq, Gdxx, Geoc, Gidc, Gobd, Gobs,
    IdentityBody, Primitive, RequestBody, StaticBindingBody,
};

/// An identity we hold the private keys for.
///
/// Builds and signs every primitive this process authors.
pub struct FirstParty {
    signing: SigningKey,
    identity: Gidc,
}

impl FirstParty {
    /// Fresh identity with a random signing key.
    pub fn generate() -> GolixResult<Self> {
        Self::from_signing_key(SigningKey::generate())
    }

    pub fn from_signing_key(signing: SigningKey) -> GolixResult<Self> {
        let body = IdentityBody {
            signature_key: signing.verifying_key().as_bytes(),
        };
        let identity = Gidc::from_packed(GolixCodec::encode(PrimitiveKind::Gidc, &body)?)?;
        Ok(Self { signing, identity })
    }

    pub fn ghid(&self) -> Ghid {
        self.identity.ghid
    }

    /// The public identity primitive, to be ingested before anything we sign.
    pub fn identity(&self) -> &Gidc {
        &self.identity
    }

    pub fn second_party(&self) -> SecondParty {
        SecondParty {
            ghid: self.identity.ghid,
            key: self.signing.verifying_key(),
        }
    }

    /// Encrypt `plaintext` under `secret` into a signed container.
    pub fn make_container(&self, secret: &Secret, plaintext: &[u8]) -> GolixResult<Geoc> {
        let body = ContainerBody {
            author: self.ghid(),
            payload: secret.seal(plaintext)?,
        };
        Geoc::from_packed(GolixCodec::encode_signed(
            PrimitiveKind::Geoc,
            &body,
            &self.signing,
        )?)
    }

    pub fn make_binding_stat(&self, target: Ghid) -> GolixResult<Gobs> {
        let body = StaticBindingBody {
            binder: self.ghid(),
            target,
        };
        Gobs::from_packed(GolixCodec::encode_signed(
            PrimitiveKind::Gobs,
            &body,
            &self.signing,
        )?)
    }

    /// Build a dynamic binding frame.
    ///
    /// Pass `nonce: None` for the first frame; later frames reuse the first
    /// frame's nonce, which fixes the stable address. `history` is newest
    /// first.
    pub fn make_binding_dyn(
        &self,
        target: Ghid,
        nonce: Option<[u8; 32]>,
        history: Vec<Ghid>,
    ) -> GolixResult<Gobd> {
        let nonce = nonce.unwrap_or_else(|| {
            let mut fresh = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut fresh);
            fresh
        });
        let body = DynamicBindingBody {
            binder: self.ghid(),
            nonce,
            target,
            history,
        };
        Gobd::from_packed(GolixCodec::encode_signed(
            PrimitiveKind::Gobd,
            &body,
            &self.signing,
        )?)
    }

    pub fn make_debinding(&self, target: Ghid) -> GolixResult<Gdxx> {
        let body = DebindingBody {
            debinder: self.ghid(),
            target,
        };
        Gdxx::from_packed(GolixCodec::encode_signed(
            PrimitiveKind::Gdxx,
            &body,
            &self.signing,
        )?)
    }

    /// Address an opaque request payload to `recipient`.
    pub fn make_request(&self, recipient: Ghid, payload: Vec<u8>) -> GolixResult<Garq> {
        let body = RequestBody { recipient, payload };
        Garq::from_packed(GolixCodec::encode(PrimitiveKind::Garq, &body)?)
    }
}

impl std::fmt::Debug for FirstParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FirstParty({})", self.ghid().short_hex())
    }
}

/// A public identity, used to verify what it signed.
#[derive(Debug, Clone)]
pub struct SecondParty {
    ghid: Ghid,
    key: VerifyingKey,
}

impl SecondParty {
    pub fn from_summary(summary: &IdentitySummary) -> GolixResult<Self> {
        Ok(Self {
            ghid: summary.ghid,
            key: VerifyingKey::from_bytes(summary.signature_key)?,
        })
    }

    pub fn ghid(&self) -> Ghid {
        self.ghid
    }

    /// Check that `primitive` names this identity as author and carries a
    /// valid signature from it.
    pub fn verify(&self, primitive: &Primitive) -> GolixResult<()> {
        let signature = primitive.signature().ok_or(GolixError::Unsigned {
            kind: primitive.kind(),
        })?;
        if let Some(claimed) = primitive.author() {
            if claimed != self.ghid {
                return Err(GolixError::WrongAuthor {
                    claimed,
                    actual: self.ghid,
                });
            }
        }
        self.key.verify(primitive.signed_region(), signature)?;
        Ok(())
    }
}
