use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use hgx_types::{Ghid, PrimitiveSummary};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::Librarian;

#[derive(Default)]
struct Shelves {
    /// Packed bytes by store key (frame address for dynamic bindings).
    packed: HashMap<Ghid, Vec<u8>>,
    /// Summaries by store key, including superseded frames.
    catalog: HashMap<Ghid, PrimitiveSummary>,
    /// Dynamic address -> newest frame address.
    dyn_resolver: HashMap<Ghid, Ghid>,
}

impl Shelves {
    fn resolve(&self, ghid: &Ghid) -> Ghid {
        self.dyn_resolver.get(ghid).copied().unwrap_or(*ghid)
    }
}

/// In-memory librarian.
///
/// Intended for tests and embedding. Everything sits behind one `RwLock`.
pub struct MemoryLibrarian {
    shelves: RwLock<Shelves>,
}

impl MemoryLibrarian {
    pub fn new() -> Self {
        Self {
            shelves: RwLock::new(Shelves::default()),
        }
    }

    /// Number of primitives with stored bytes.
    pub fn len(&self) -> usize {
        self.shelves.read().expect("lock poisoned").packed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryLibrarian {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Librarian for MemoryLibrarian {
    async fn contains(&self, ghid: &Ghid) -> StoreResult<bool> {
        let shelves = self.shelves.read().expect("lock poisoned");
        Ok(shelves.packed.contains_key(&shelves.resolve(ghid)))
    }

    async fn summarize(&self, ghid: &Ghid) -> StoreResult<PrimitiveSummary> {
        let shelves = self.shelves.read().expect("lock poisoned");
        shelves
            .catalog
            .get(&shelves.resolve(ghid))
            .cloned()
            .ok_or(StoreError::NotFound(*ghid))
    }

    async fn retrieve(&self, ghid: &Ghid) -> StoreResult<Vec<u8>> {
        let shelves = self.shelves.read().expect("lock poisoned");
        shelves
            .packed
            .get(&shelves.resolve(ghid))
            .cloned()
            .ok_or(StoreError::NotFound(*ghid))
    }

    async fn store(&self, summary: PrimitiveSummary, packed: Vec<u8>) -> StoreResult<()> {
        let key = summary.store_key();
        let mut shelves = self.shelves.write().expect("lock poisoned");

        if let Some(existing) = shelves.catalog.get(&key) {
            if !existing.is_consistent_with(&summary) {
                warn!(ghid = %key, "refusing inconsistent primitive");
                return Err(StoreError::Inconsistent(key));
            }
        }

        if let PrimitiveSummary::DynamicBinding(frame) = &summary {
            if let Some(old_frame) = shelves.dyn_resolver.insert(frame.ghid, frame.frame) {
                if old_frame != frame.frame {
                    // The superseded frame stays summarizable for ratchet healing.
                    shelves.packed.remove(&old_frame);
                    debug!(ghid = %frame.ghid, old = %old_frame, new = %frame.frame, "frame superseded");
                }
            }
        }

        shelves.packed.insert(key, packed);
        shelves.catalog.insert(key, summary);
        Ok(())
    }

    async fn force_gc(&self, summary: &PrimitiveSummary) -> StoreResult<()> {
        let mut shelves = self.shelves.write().expect("lock poisoned");
        match summary {
            PrimitiveSummary::DynamicBinding(binding) => {
                shelves.dyn_resolver.remove(&binding.ghid);
                let frames: Vec<Ghid> = shelves
                    .catalog
                    .iter()
                    .filter_map(|(key, s)| match s {
                        PrimitiveSummary::DynamicBinding(b) if b.ghid == binding.ghid => Some(*key),
                        _ => None,
                    })
                    .collect();
                for frame in frames {
                    shelves.catalog.remove(&frame);
                    shelves.packed.remove(&frame);
                }
            }
            other => {
                let key = other.store_key();
                shelves.catalog.remove(&key);
                shelves.packed.remove(&key);
            }
        }
        debug!(ghid = %summary.ghid(), kind = %summary.kind(), "primitive collected");
        Ok(())
    }
}

impl std::fmt::Debug for MemoryLibrarian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLibrarian")
            .field("primitive_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hgx_types::{ContainerSummary, DynamicBindingSummary};

    fn g(n: u8) -> Ghid {
        Ghid::from_hash([n; 32])
    }

    fn container(n: u8, author: u8) -> PrimitiveSummary {
        ContainerSummary {
            ghid: g(n),
            author: g(author),
        }
        .into()
    }

    fn frame(frame: u8, target: u8, history: Vec<Ghid>) -> PrimitiveSummary {
        DynamicBindingSummary {
            ghid: g(50),
            author: g(1),
            target: g(target),
            frame: g(frame),
            history,
        }
        .into()
    }

    #[tokio::test]
    async fn store_and_retrieve() {
        let lib = MemoryLibrarian::new();
        lib.store(container(10, 1), b"packed".to_vec()).await.unwrap();
        assert!(lib.contains(&g(10)).await.unwrap());
        assert_eq!(lib.retrieve(&g(10)).await.unwrap(), b"packed");
        assert_eq!(lib.summarize(&g(10)).await.unwrap(), container(10, 1));
    }

    #[tokio::test]
    async fn missing_is_not_found() {
        let lib = MemoryLibrarian::new();
        assert!(!lib.contains(&g(1)).await.unwrap());
        assert_eq!(
            lib.summarize(&g(1)).await.unwrap_err(),
            StoreError::NotFound(g(1))
        );
        assert!(lib.retrieve(&g(1)).await.is_err());
    }

    #[tokio::test]
    async fn inconsistent_duplicate_refused() {
        let lib = MemoryLibrarian::new();
        lib.store(container(10, 1), b"a".to_vec()).await.unwrap();
        lib.store(container(10, 1), b"a".to_vec()).await.unwrap();
        let err = lib.store(container(10, 2), b"b".to_vec()).await.unwrap_err();
        assert_eq!(err, StoreError::Inconsistent(g(10)));
    }

    #[tokio::test]
    async fn dynamic_address_resolves_to_newest_frame() {
        let lib = MemoryLibrarian::new();
        lib.store(frame(60, 10, vec![]), b"f1".to_vec()).await.unwrap();
        lib.store(frame(61, 11, vec![g(60)]), b"f2".to_vec()).await.unwrap();

        assert_eq!(lib.retrieve(&g(50)).await.unwrap(), b"f2");
        assert_eq!(lib.summarize(&g(50)).await.unwrap().frame(), Some(g(61)));

        // Superseded: summary kept, bytes dropped.
        assert!(!lib.contains(&g(60)).await.unwrap());
        assert_eq!(lib.summarize(&g(60)).await.unwrap().target(), Some(g(10)));
        assert_eq!(lib.len(), 1);
    }

    #[tokio::test]
    async fn force_gc_dynamic_drops_every_frame() {
        let lib = MemoryLibrarian::new();
        lib.store(frame(60, 10, vec![]), b"f1".to_vec()).await.unwrap();
        lib.store(frame(61, 11, vec![g(60)]), b"f2".to_vec()).await.unwrap();
        let current = lib.summarize(&g(50)).await.unwrap();
        lib.force_gc(&current).await.unwrap();

        assert!(!lib.contains(&g(50)).await.unwrap());
        assert!(lib.summarize(&g(60)).await.is_err());
        assert!(lib.is_empty());
    }
}
