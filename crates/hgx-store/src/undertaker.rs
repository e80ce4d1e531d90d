use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hgx_types::{DebindingSummary, DynamicBindingSummary, Ghid, PrimitiveSummary};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{Bookie, Librarian, Postman, Undertaker};

/// Garbage collector driven by the bookie's binding records.
///
/// Identities are never collected. Containers go once nothing binds them;
/// bindings, debindings, and requests go once they are themselves debound.
pub struct MemoryUndertaker {
    librarian: Arc<dyn Librarian>,
    bookie: Arc<dyn Bookie>,
    postman: Arc<dyn Postman>,
    staging: Mutex<HashSet<Ghid>>,
}

impl MemoryUndertaker {
    pub fn new(
        librarian: Arc<dyn Librarian>,
        bookie: Arc<dyn Bookie>,
        postman: Arc<dyn Postman>,
    ) -> Self {
        Self {
            librarian,
            bookie,
            postman,
            staging: Mutex::new(HashSet::new()),
        }
    }

    /// Schedule a GC check for `ghid` at the next `collect`.
    pub fn triage(&self, ghid: Ghid) {
        debug!(ghid = %ghid, "triaged for collection");
        self.staging.lock().expect("lock poisoned").insert(ghid);
    }

    fn pop_staged(&self) -> Option<Ghid> {
        let mut staging = self.staging.lock().expect("lock poisoned");
        let next = staging.iter().next().copied()?;
        staging.remove(&next);
        Some(next)
    }

    /// Whether `obj` should be erased. Bindings also stage their target.
    async fn is_garbage(&self, obj: &PrimitiveSummary) -> StoreResult<bool> {
        let ghid = obj.ghid();
        Ok(match obj {
            PrimitiveSummary::Identity(_) => false,
            PrimitiveSummary::Container(_) => !self.bookie.is_bound(&ghid).await,
            PrimitiveSummary::StaticBinding(binding) => {
                let debound = self.bookie.is_debound(&ghid).await?;
                if debound {
                    self.triage(binding.target);
                }
                debound
            }
            PrimitiveSummary::DynamicBinding(binding) => {
                // Something binding the dynamic address keeps it alive.
                let debound =
                    self.bookie.is_debound(&ghid).await? && !self.bookie.is_bound(&ghid).await;
                if debound {
                    self.triage(binding.target);
                }
                debound
            }
            PrimitiveSummary::Debinding(_) | PrimitiveSummary::Request(_) => {
                self.bookie.is_debound(&ghid).await?
            }
        })
    }

    async fn execute(&self, obj: &PrimitiveSummary) -> StoreResult<()> {
        self.librarian.force_gc(obj).await?;
        self.postman.schedule(obj, true).await?;
        self.bookie.force_gc(obj).await;
        Ok(())
    }
}

#[async_trait]
impl Undertaker for MemoryUndertaker {
    async fn prep_gobd(&self, obj: &DynamicBindingSummary) -> StoreResult<()> {
        match self.librarian.summarize(&obj.ghid).await {
            Ok(existing) => {
                if let Some(target) = existing.target() {
                    if target != obj.target {
                        self.triage(target);
                    }
                }
                Ok(())
            }
            Err(StoreError::NotFound(_)) => {
                if !obj.history.is_empty() {
                    warn!(ghid = %obj.ghid, "no prior frame to check for an existing target");
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn prep_gdxx(&self, obj: &DebindingSummary) -> StoreResult<()> {
        self.triage(obj.target);
        Ok(())
    }

    async fn collect(&self) -> StoreResult<Vec<PrimitiveSummary>> {
        let mut collected = Vec::new();
        while let Some(ghid) = self.pop_staged() {
            let obj = match self.librarian.summarize(&ghid).await {
                Ok(obj) => obj,
                Err(StoreError::NotFound(_)) => {
                    debug!(ghid = %ghid, "triaged object not stored; nothing to collect");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if self.is_garbage(&obj).await? {
                self.execute(&obj).await?;
                debug!(ghid = %ghid, kind = %obj.kind(), "garbage collected");
                collected.push(obj);
            }
        }
        Ok(collected)
    }
}
