use std::sync::Arc;

use hgx_golix::{Primitive, SecondParty};
use hgx_store::{Librarian, StoreError};
use hgx_types::{PrimitiveKind, PrimitiveSummary};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{PersistenceError, PersistenceResult};

/// Parses untrusted bytes into primitives and verifies their signatures.
///
/// Parsing and signature checks are CPU-bound and run on the blocking pool,
/// at most `parse_workers` at a time. Every call parses its own copy of the
/// bytes, so loaders never share in-flight state.
pub struct Doorman {
    librarian: Arc<dyn Librarian>,
    workers: Arc<Semaphore>,
}

impl Doorman {
    pub fn new(librarian: Arc<dyn Librarian>, parse_workers: usize) -> Self {
        Self {
            librarian,
            workers: Arc::new(Semaphore::new(parse_workers.max(1))),
        }
    }

    pub async fn load_gidc(&self, packed: &[u8]) -> PersistenceResult<Primitive> {
        self.load(PrimitiveKind::Gidc, Arc::from(packed)).await
    }

    pub async fn load_geoc(&self, packed: &[u8]) -> PersistenceResult<Primitive> {
        self.load(PrimitiveKind::Geoc, Arc::from(packed)).await
    }

    pub async fn load_gobs(&self, packed: &[u8]) -> PersistenceResult<Primitive> {
        self.load(PrimitiveKind::Gobs, Arc::from(packed)).await
    }

    pub async fn load_gobd(&self, packed: &[u8]) -> PersistenceResult<Primitive> {
        self.load(PrimitiveKind::Gobd, Arc::from(packed)).await
    }

    pub async fn load_gdxx(&self, packed: &[u8]) -> PersistenceResult<Primitive> {
        self.load(PrimitiveKind::Gdxx, Arc::from(packed)).await
    }

    pub async fn load_garq(&self, packed: &[u8]) -> PersistenceResult<Primitive> {
        self.load(PrimitiveKind::Garq, Arc::from(packed)).await
    }

    /// Probe every kind concurrently; the first loader that accepts wins.
    ///
    /// Malformed results are swallowed while probing. Any other failure,
    /// such as a bad signature, is returned as is.
    pub async fn load_any(&self, packed: &[u8]) -> PersistenceResult<Primitive> {
        let packed: Arc<[u8]> = Arc::from(packed);
        let (gidc, geoc, gobs, gobd, gdxx, garq) = tokio::join!(
            self.load(PrimitiveKind::Gidc, packed.clone()),
            self.load(PrimitiveKind::Geoc, packed.clone()),
            self.load(PrimitiveKind::Gobs, packed.clone()),
            self.load(PrimitiveKind::Gobd, packed.clone()),
            self.load(PrimitiveKind::Gdxx, packed.clone()),
            self.load(PrimitiveKind::Garq, packed.clone()),
        );

        for result in [gidc, geoc, gobs, gobd, gdxx, garq] {
            match result {
                Ok(primitive) => return Ok(primitive),
                Err(e) if e.is_malformed() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(PersistenceError::MalformedPrimitive(format!(
            "no primitive kind accepts these {} bytes",
            packed.len()
        )))
    }

    async fn load(&self, kind: PrimitiveKind, packed: Arc<[u8]>) -> PersistenceResult<Primitive> {
        let primitive = self.parse(kind, packed).await?;
        self.verify(primitive).await
    }

    async fn parse(&self, kind: PrimitiveKind, packed: Arc<[u8]>) -> PersistenceResult<Primitive> {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|e| PersistenceError::Worker(e.to_string()))?;
        tokio::task::spawn_blocking(move || Primitive::unpack(kind, &packed))
            .await
            .map_err(|e| PersistenceError::Worker(e.to_string()))?
            .map_err(|e| PersistenceError::MalformedPrimitive(format!("{kind}: {e}")))
    }

    /// Check the signature of authored kinds against the stored identity.
    async fn verify(&self, primitive: Primitive) -> PersistenceResult<Primitive> {
        let Some(author) = primitive.author() else {
            return Ok(primitive);
        };
        let identity = match self.librarian.summarize(&author).await {
            Ok(PrimitiveSummary::Identity(identity)) => identity,
            Ok(_) | Err(StoreError::NotFound(_)) => {
                return Err(PersistenceError::UnknownIdentity(author))
            }
            Err(e) => return Err(e.into()),
        };

        let ghid = primitive.ghid();
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|e| PersistenceError::Worker(e.to_string()))?;
        let verified = tokio::task::spawn_blocking(move || {
            SecondParty::from_summary(&identity)?.verify(&primitive)?;
            Ok::<_, hgx_golix::GolixError>(primitive)
        })
        .await
        .map_err(|e| PersistenceError::Worker(e.to_string()))?;

        match verified {
            Ok(primitive) => {
                debug!(ghid = %ghid, author = %author, "signature verified");
                Ok(primitive)
            }
            Err(e) => Err(PersistenceError::VerificationFailure {
                ghid,
                reason: e.to_string(),
            }),
        }
    }
}
