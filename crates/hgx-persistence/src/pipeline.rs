use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use hgx_golix::Primitive;
use hgx_store::{
    Bookie, BroadcastPostman, Lawyer, Librarian, MemoryBookie, MemoryLawyer, MemoryLibrarian,
    MemoryUndertaker, MirrorSalmonator, Postman, Salmonator, StoreError, Undertaker,
};
use hgx_types::{Ghid, PrimitiveSummary};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::doorman::Doorman;
use crate::enforcer::Enforcer;
use crate::error::{PersistenceError, PersistenceResult};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Handles to every collaborator the pipeline consults.
#[derive(Clone)]
pub struct Collaborators {
    pub librarian: Arc<dyn Librarian>,
    pub lawyer: Arc<dyn Lawyer>,
    pub bookie: Arc<dyn Bookie>,
    pub undertaker: Arc<dyn Undertaker>,
    pub postman: Arc<dyn Postman>,
    pub salmonator: Arc<dyn Salmonator>,
}

impl Collaborators {
    /// In-memory collaborators, optionally replicating into `upstream`.
    pub fn in_memory(config: &CoreConfig, upstream: Option<Arc<dyn Librarian>>) -> Self {
        Self::with_librarian(config, Arc::new(MemoryLibrarian::new()), upstream)
    }

    /// In-memory collaborators around an existing librarian.
    pub fn with_librarian(
        config: &CoreConfig,
        librarian: Arc<dyn Librarian>,
        upstream: Option<Arc<dyn Librarian>>,
    ) -> Self {
        let bookie: Arc<dyn Bookie> = Arc::new(MemoryBookie::new(librarian.clone()));
        let postman: Arc<dyn Postman> = Arc::new(BroadcastPostman::new(
            librarian.clone(),
            bookie.clone(),
            config.notify_capacity,
        ));
        Self {
            lawyer: Arc::new(MemoryLawyer::new(librarian.clone())),
            undertaker: Arc::new(MemoryUndertaker::new(
                librarian.clone(),
                bookie.clone(),
                postman.clone(),
            )),
            salmonator: Arc::new(MirrorSalmonator::new(librarian.clone(), upstream)),
            librarian,
            bookie,
            postman,
        }
    }
}

// ---------------------------------------------------------------------------
// IngestStage
// ---------------------------------------------------------------------------

/// One step of the ingestion pipeline.
///
/// Validators run against the prior store state, preparers see it too, and
/// everything after [`IngestStage::Store`] sees the new primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestStage {
    Redundancy,
    Enforcer,
    Lawyer,
    Bookie,
    Undertaker,
    Placement,
    Store,
    Replicate,
    Notify,
    Collect,
}

impl IngestStage {
    /// Every stage in execution order.
    pub const PIPELINE: [Self; 10] = [
        Self::Redundancy,
        Self::Enforcer,
        Self::Lawyer,
        Self::Bookie,
        Self::Undertaker,
        Self::Placement,
        Self::Store,
        Self::Replicate,
        Self::Notify,
        Self::Collect,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Redundancy => "redundancy",
            Self::Enforcer => "enforcer",
            Self::Lawyer => "lawyer",
            Self::Bookie => "bookie",
            Self::Undertaker => "undertaker",
            Self::Placement => "placement",
            Self::Store => "store",
            Self::Replicate => "replicate",
            Self::Notify => "notify",
            Self::Collect => "collect",
        }
    }
}

enum StageOutcome {
    Continue,
    /// Already stored; the ingest is a no-op.
    Redundant,
}

// ---------------------------------------------------------------------------
// PersistenceCore
// ---------------------------------------------------------------------------

/// The single path by which primitives enter the store.
///
/// Every primitive passes the same fixed pipeline whether it arrived as
/// untrusted bytes ([`Self::ingest`]) or was built locally
/// ([`Self::direct_ingest`]).
///
/// Ingests touching the same address run one at a time, so validation and
/// storage of a primitive see no interleaved writes to that address.
pub struct PersistenceCore {
    doorman: Doorman,
    enforcer: Enforcer,
    collaborators: Collaborators,
    address_locks: Mutex<HashMap<Ghid, Arc<AsyncMutex<()>>>>,
}

impl PersistenceCore {
    pub fn new(config: &CoreConfig, collaborators: Collaborators) -> Self {
        Self {
            doorman: Doorman::new(collaborators.librarian.clone(), config.parse_workers),
            enforcer: Enforcer::new(collaborators.librarian.clone()),
            collaborators,
            address_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn doorman(&self) -> &Doorman {
        &self.doorman
    }

    pub fn enforcer(&self) -> &Enforcer {
        &self.enforcer
    }

    pub fn librarian(&self) -> &Arc<dyn Librarian> {
        &self.collaborators.librarian
    }

    pub fn bookie(&self) -> &Arc<dyn Bookie> {
        &self.collaborators.bookie
    }

    pub fn postman(&self) -> &Arc<dyn Postman> {
        &self.collaborators.postman
    }

    pub fn salmonator(&self) -> &Arc<dyn Salmonator> {
        &self.collaborators.salmonator
    }

    /// Parse, verify, and persist untrusted bytes.
    ///
    /// Returns the stored summary, or `None` if the primitive was already
    /// held.
    pub async fn ingest(
        &self,
        packed: &[u8],
        remotable: bool,
    ) -> PersistenceResult<Option<PrimitiveSummary>> {
        let primitive = self.doorman.load_any(packed).await?;
        self.run_pipeline(&primitive, remotable).await
    }

    /// Persist a primitive this process just built. Skips parsing and
    /// signature checks only.
    pub async fn direct_ingest(
        &self,
        primitive: &Primitive,
        remotable: bool,
    ) -> PersistenceResult<Option<PrimitiveSummary>> {
        self.run_pipeline(primitive, remotable).await
    }

    /// Fetch upstream state for `ghid` and ingest it.
    ///
    /// Returns the summaries that were new locally. With `quiet` set an
    /// unreachable upstream is logged and yields nothing.
    pub async fn attempt_pull(
        &self,
        ghid: &Ghid,
        quiet: bool,
    ) -> PersistenceResult<Vec<PrimitiveSummary>> {
        let pulled = match self.collaborators.salmonator.pull(ghid).await {
            Ok(pulled) => pulled,
            Err(StoreError::UnavailableUpstream(reason)) if quiet => {
                warn!(ghid = %ghid, reason = %reason, "upstream pull failed; continuing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut ingested = Vec::new();
        for packed in pulled {
            if let Some(summary) = self.ingest(&packed, false).await? {
                ingested.push(summary);
            }
        }
        debug!(ghid = %ghid, new = ingested.len(), "upstream pull ingested");
        Ok(ingested)
    }

    async fn run_pipeline(
        &self,
        primitive: &Primitive,
        remotable: bool,
    ) -> PersistenceResult<Option<PrimitiveSummary>> {
        let summary = primitive.summarize();
        let address = summary.ghid();

        let lock = self
            .address_locks
            .lock()
            .expect("lock poisoned")
            .entry(address)
            .or_default()
            .clone();
        let guard = lock.clone().lock_owned().await;
        let result = self.run_stages(&summary, primitive, remotable).await;
        drop(guard);

        // Last one out removes the entry; the map lock keeps new waiters out.
        let mut locks = self.address_locks.lock().expect("lock poisoned");
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&address);
        }
        result
    }

    async fn run_stages(
        &self,
        summary: &PrimitiveSummary,
        primitive: &Primitive,
        remotable: bool,
    ) -> PersistenceResult<Option<PrimitiveSummary>> {
        let pipeline_start = Instant::now();

        for stage in IngestStage::PIPELINE {
            let stage_start = Instant::now();
            let outcome = self.run_stage(stage, summary, primitive, remotable).await;
            let elapsed = stage_start.elapsed();

            match outcome {
                Ok(StageOutcome::Continue) => {
                    debug!(stage = stage.name(), ghid = %summary.ghid(), ?elapsed, "stage passed");
                }
                Ok(StageOutcome::Redundant) => {
                    debug!(ghid = %summary.ghid(), kind = %summary.kind(), "already stored; ingest is a no-op");
                    return Ok(None);
                }
                Err(e) => {
                    debug!(stage = stage.name(), ghid = %summary.ghid(), error = %e, "stage failed");
                    return Err(e);
                }
            }
        }

        debug!(
            ghid = %summary.ghid(),
            kind = %summary.kind(),
            elapsed = ?pipeline_start.elapsed(),
            "primitive ingested"
        );
        Ok(Some(summary.clone()))
    }

    async fn run_stage(
        &self,
        stage: IngestStage,
        summary: &PrimitiveSummary,
        primitive: &Primitive,
        remotable: bool,
    ) -> PersistenceResult<StageOutcome> {
        let c = &self.collaborators;
        match stage {
            IngestStage::Redundancy => {
                if c.librarian.contains(&summary.store_key()).await? {
                    return Ok(StageOutcome::Redundant);
                }
            }
            IngestStage::Enforcer => self.enforcer.validate(summary).await?,
            IngestStage::Lawyer => c.lawyer.validate(summary).await?,
            IngestStage::Bookie => c.bookie.validate(summary).await?,
            IngestStage::Undertaker => c.undertaker.prep(summary).await?,
            IngestStage::Placement => c.bookie.place(summary).await?,
            IngestStage::Store => {
                c.librarian
                    .store(summary.clone(), primitive.packed().to_vec())
                    .await?
            }
            IngestStage::Replicate => {
                if remotable {
                    // Stored locally already; upstream replication is best effort.
                    if let Err(e) = c.salmonator.push(&summary.ghid()).await {
                        warn!(ghid = %summary.ghid(), error = %e, "upstream push failed");
                    }
                }
            }
            IngestStage::Notify => c.postman.schedule(summary, false).await?,
            IngestStage::Collect => {
                let collected = c.undertaker.collect().await?;
                if !collected.is_empty() {
                    info!(ghid = %summary.ghid(), collected = collected.len(), "garbage collected");
                }
            }
        }
        Ok(StageOutcome::Continue)
    }
}
