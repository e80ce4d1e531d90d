use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use hgx_types::{Ghid, PrimitiveSummary};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::traits::{Librarian, Salmonator};

/// Salmonator that replicates into another librarian standing in for a
/// remote persistence provider.
///
/// With no upstream configured every pull fails with `UnavailableUpstream`
/// and pushes are recorded only.
pub struct MirrorSalmonator {
    local: Arc<dyn Librarian>,
    upstream: Option<Arc<dyn Librarian>>,
    registered: RwLock<HashSet<Ghid>>,
    pushed: RwLock<Vec<Ghid>>,
}

impl MirrorSalmonator {
    pub fn new(local: Arc<dyn Librarian>, upstream: Option<Arc<dyn Librarian>>) -> Self {
        Self {
            local,
            upstream,
            registered: RwLock::new(HashSet::new()),
            pushed: RwLock::new(Vec::new()),
        }
    }

    /// Local-only salmonator.
    pub fn offline(local: Arc<dyn Librarian>) -> Self {
        Self::new(local, None)
    }

    /// Every address pushed so far, oldest first.
    pub fn pushed(&self) -> Vec<Ghid> {
        self.pushed.read().expect("lock poisoned").clone()
    }

    pub fn is_registered(&self, ghid: &Ghid) -> bool {
        self.registered.read().expect("lock poisoned").contains(ghid)
    }

    fn upstream(&self) -> StoreResult<&Arc<dyn Librarian>> {
        self.upstream
            .as_ref()
            .ok_or_else(|| StoreError::UnavailableUpstream("no upstream configured".into()))
    }
}

#[async_trait]
impl Salmonator for MirrorSalmonator {
    async fn push(&self, ghid: &Ghid) -> StoreResult<()> {
        self.pushed.write().expect("lock poisoned").push(*ghid);
        let Some(upstream) = &self.upstream else {
            return Ok(());
        };
        let summary = self.local.summarize(ghid).await?;
        let packed = self.local.retrieve(ghid).await?;
        upstream.store(summary, packed).await?;
        debug!(ghid = %ghid, "pushed upstream");
        Ok(())
    }

    async fn pull(&self, ghid: &Ghid) -> StoreResult<Vec<Vec<u8>>> {
        let upstream = self.upstream()?;
        let summary = match upstream.summarize(ghid).await {
            Ok(summary) => summary,
            Err(StoreError::NotFound(_)) => {
                return Err(StoreError::UnavailableUpstream(format!(
                    "{ghid} unknown upstream"
                )))
            }
            Err(e) => return Err(e),
        };

        // Bindings precede what they bind so the container is never unbound.
        let mut packed = vec![upstream.retrieve(ghid).await?];
        if let PrimitiveSummary::DynamicBinding(binding) = &summary {
            if let Ok(container) = upstream.retrieve(&binding.target).await {
                packed.push(container);
            }
        }
        info!(ghid = %ghid, count = packed.len(), "pulled from upstream");
        Ok(packed)
    }

    async fn register(&self, ghid: &Ghid) -> StoreResult<()> {
        self.registered.write().expect("lock poisoned").insert(*ghid);
        Ok(())
    }

    async fn deregister(&self, ghid: &Ghid) -> StoreResult<()> {
        self.registered.write().expect("lock poisoned").remove(ghid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::librarian::MemoryLibrarian;
    use hgx_types::{ContainerSummary, DynamicBindingSummary};

    fn g(n: u8) -> Ghid {
        Ghid::from_hash([n; 32])
    }

    #[tokio::test]
    async fn offline_pull_is_unavailable() {
        let salmon = MirrorSalmonator::offline(Arc::new(MemoryLibrarian::new()));
        assert!(matches!(
            salmon.pull(&g(1)).await,
            Err(StoreError::UnavailableUpstream(_))
        ));
        salmon.push(&g(1)).await.unwrap();
        assert_eq!(salmon.pushed(), vec![g(1)]);
    }

    #[tokio::test]
    async fn push_then_pull_through_upstream() {
        let local = Arc::new(MemoryLibrarian::new());
        let upstream = Arc::new(MemoryLibrarian::new());
        let salmon = MirrorSalmonator::new(local.clone(), Some(upstream.clone()));

        let container: PrimitiveSummary = ContainerSummary {
            ghid: g(10),
            author: g(1),
        }
        .into();
        let frame: PrimitiveSummary = DynamicBindingSummary {
            ghid: g(50),
            author: g(1),
            target: g(10),
            frame: g(60),
            history: vec![],
        }
        .into();
        local.store(container, b"geoc".to_vec()).await.unwrap();
        local.store(frame, b"gobd".to_vec()).await.unwrap();

        salmon.push(&g(50)).await.unwrap();
        salmon.push(&g(10)).await.unwrap();

        let pulled = salmon.pull(&g(50)).await.unwrap();
        assert_eq!(pulled, vec![b"gobd".to_vec(), b"geoc".to_vec()]);
    }

    #[tokio::test]
    async fn registration_tracked() {
        let salmon = MirrorSalmonator::offline(Arc::new(MemoryLibrarian::new()));
        salmon.register(&g(5)).await.unwrap();
        assert!(salmon.is_registered(&g(5)));
        salmon.deregister(&g(5)).await.unwrap();
        assert!(!salmon.is_registered(&g(5)));
    }
}
