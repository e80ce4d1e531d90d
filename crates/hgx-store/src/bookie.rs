use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use hgx_types::{
    ContainerSummary, DebindingSummary, DynamicBindingSummary, Ghid, PrimitiveSummary,
    RequestSummary, StaticBindingSummary,
};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{Bookie, Librarian};

/// `key -> set of addresses` with empty sets pruned.
#[derive(Default)]
struct SetMap(HashMap<Ghid, HashSet<Ghid>>);

impl SetMap {
    fn add(&mut self, key: Ghid, value: Ghid) {
        self.0.entry(key).or_default().insert(value);
    }

    fn discard(&mut self, key: &Ghid, value: &Ghid) -> bool {
        let Some(set) = self.0.get_mut(key) else {
            return false;
        };
        let removed = set.remove(value);
        if set.is_empty() {
            self.0.remove(key);
        }
        removed
    }

    fn get_any(&self, key: &Ghid) -> HashSet<Ghid> {
        self.0.get(key).cloned().unwrap_or_default()
    }

    fn contains_key(&self, key: &Ghid) -> bool {
        self.0.contains_key(key)
    }
}

#[derive(Default)]
struct Books {
    bound_by: SetMap,
    debound_by: SetMap,
    /// Debindings whose target was unknown when they arrived.
    debound_by_staged: SetMap,
    requests_for: SetMap,
    illegal_debindings: HashSet<Ghid>,
}

/// In-memory bookie.
pub struct MemoryBookie {
    librarian: Arc<dyn Librarian>,
    books: RwLock<Books>,
}

impl MemoryBookie {
    pub fn new(librarian: Arc<dyn Librarian>) -> Self {
        Self {
            librarian,
            books: RwLock::new(Books::default()),
        }
    }

    /// Whether a debinding was found illegal after its target arrived.
    pub fn is_illegal(&self, debinding: &Ghid) -> bool {
        self.books
            .read()
            .expect("lock poisoned")
            .illegal_debindings
            .contains(debinding)
    }

    async fn check_not_debound(&self, ghid: &Ghid) -> StoreResult<()> {
        if self.is_debound(ghid).await? {
            Err(StoreError::AlreadyDebound(*ghid))
        } else {
            Ok(())
        }
    }

    fn remove_binding(&self, binding: &PrimitiveSummary) {
        let (Some(target), ghid) = (binding.target(), binding.ghid()) else {
            return;
        };
        let removed = self
            .books
            .write()
            .expect("lock poisoned")
            .bound_by
            .discard(&target, &ghid);
        if !removed {
            warn!(binding = %ghid, target = %target, "removing a binding the bookie never recorded");
        }
    }
}

#[async_trait]
impl Bookie for MemoryBookie {
    async fn validate_geoc(&self, obj: &ContainerSummary) -> StoreResult<()> {
        if self.is_bound(&obj.ghid).await {
            Ok(())
        } else {
            Err(StoreError::UnboundContainer(obj.ghid))
        }
    }

    async fn validate_gobs(&self, obj: &StaticBindingSummary) -> StoreResult<()> {
        self.check_not_debound(&obj.ghid).await
    }

    async fn validate_gobd(&self, obj: &DynamicBindingSummary) -> StoreResult<()> {
        // A dynamic binding that is itself still bound may override its debinding.
        if self.is_debound(&obj.ghid).await? && !self.is_bound(&obj.ghid).await {
            Err(StoreError::AlreadyDebound(obj.ghid))
        } else {
            Ok(())
        }
    }

    async fn validate_gdxx(&self, obj: &DebindingSummary) -> StoreResult<()> {
        self.check_not_debound(&obj.ghid).await
    }

    async fn validate_garq(&self, obj: &RequestSummary) -> StoreResult<()> {
        self.check_not_debound(&obj.ghid).await
    }

    async fn place_gobs(&self, obj: &StaticBindingSummary) -> StoreResult<()> {
        self.books
            .write()
            .expect("lock poisoned")
            .bound_by
            .add(obj.target, obj.ghid);
        Ok(())
    }

    async fn place_gobd(&self, obj: &DynamicBindingSummary) -> StoreResult<()> {
        match self.librarian.summarize(&obj.ghid).await {
            Ok(existing) => self.remove_binding(&existing),
            Err(StoreError::NotFound(_)) => {
                if !obj.history.is_empty() {
                    warn!(ghid = %obj.ghid, "placing a frame with history, but no prior frame is stored");
                }
            }
            Err(e) => return Err(e),
        }
        self.books
            .write()
            .expect("lock poisoned")
            .bound_by
            .add(obj.target, obj.ghid);
        Ok(())
    }

    async fn place_gdxx(&self, obj: &DebindingSummary) -> StoreResult<()> {
        let known = self.librarian.contains(&obj.target).await?;
        let mut books = self.books.write().expect("lock poisoned");
        if known {
            books.debound_by.add(obj.target, obj.ghid);
        } else {
            debug!(ghid = %obj.ghid, target = %obj.target, "staging debinding for unknown target");
            books.debound_by_staged.add(obj.target, obj.ghid);
        }
        Ok(())
    }

    async fn place_garq(&self, obj: &RequestSummary) -> StoreResult<()> {
        self.books
            .write()
            .expect("lock poisoned")
            .requests_for
            .add(obj.recipient, obj.ghid);
        Ok(())
    }

    async fn bind_status(&self, ghid: &Ghid) -> HashSet<Ghid> {
        self.books.read().expect("lock poisoned").bound_by.get_any(ghid)
    }

    async fn debind_status(&self, ghid: &Ghid) -> HashSet<Ghid> {
        let books = self.books.read().expect("lock poisoned");
        let mut total = books.debound_by.get_any(ghid);
        total.extend(books.debound_by_staged.get_any(ghid));
        total
    }

    async fn recipient_status(&self, recipient: &Ghid) -> HashSet<Ghid> {
        self.books
            .read()
            .expect("lock poisoned")
            .requests_for
            .get_any(recipient)
    }

    async fn is_bound(&self, ghid: &Ghid) -> bool {
        self.books
            .read()
            .expect("lock poisoned")
            .bound_by
            .contains_key(ghid)
    }

    async fn is_debound(&self, ghid: &Ghid) -> StoreResult<bool> {
        let staged = self
            .books
            .read()
            .expect("lock poisoned")
            .debound_by_staged
            .get_any(ghid);

        if !staged.is_empty() {
            // The target may have arrived since; its author decides which
            // staged debindings were legitimate.
            let target = match self.librarian.summarize(ghid).await {
                Ok(target) => Some(target),
                Err(StoreError::NotFound(_)) => None,
                Err(e) => return Err(e),
            };
            if let Some(target) = target {
                let owner = match &target {
                    PrimitiveSummary::Request(request) => Some(request.recipient),
                    other => other.author(),
                };
                for debinding_ghid in staged {
                    let debinder = match self.librarian.summarize(&debinding_ghid).await {
                        Ok(debinding) => debinding.author(),
                        Err(StoreError::NotFound(_)) => None,
                        Err(e) => return Err(e),
                    };
                    let mut books = self.books.write().expect("lock poisoned");
                    books.debound_by_staged.discard(ghid, &debinding_ghid);
                    if debinder.is_some() && debinder == owner {
                        books.debound_by.add(*ghid, debinding_ghid);
                    } else {
                        warn!(debinding = %debinding_ghid, target = %ghid, "discarding illegal debinding");
                        books.illegal_debindings.insert(debinding_ghid);
                    }
                }
            }
        }

        Ok(self
            .books
            .read()
            .expect("lock poisoned")
            .debound_by
            .contains_key(ghid))
    }

    async fn force_gc(&self, obj: &PrimitiveSummary) {
        match obj {
            PrimitiveSummary::StaticBinding(_) | PrimitiveSummary::DynamicBinding(_) => {
                self.remove_binding(obj)
            }
            PrimitiveSummary::Debinding(debinding) => {
                let mut books = self.books.write().expect("lock poisoned");
                books.illegal_debindings.remove(&debinding.ghid);
                books.debound_by.discard(&debinding.target, &debinding.ghid);
                books.debound_by_staged.discard(&debinding.target, &debinding.ghid);
            }
            PrimitiveSummary::Request(request) => {
                self.books
                    .write()
                    .expect("lock poisoned")
                    .requests_for
                    .discard(&request.recipient, &request.ghid);
            }
            PrimitiveSummary::Identity(_) | PrimitiveSummary::Container(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::librarian::MemoryLibrarian;

    fn g(n: u8) -> Ghid {
        Ghid::from_hash([n; 32])
    }

    fn setup() -> (Arc<MemoryLibrarian>, MemoryBookie) {
        let lib = Arc::new(MemoryLibrarian::new());
        let bookie = MemoryBookie::new(lib.clone());
        (lib, bookie)
    }

    fn gobs(ghid: u8, target: u8) -> StaticBindingSummary {
        StaticBindingSummary {
            ghid: g(ghid),
            author: g(1),
            target: g(target),
        }
    }

    fn gdxx(ghid: u8, author: u8, target: u8) -> DebindingSummary {
        DebindingSummary {
            ghid: g(ghid),
            author: g(author),
            target: g(target),
        }
    }

    #[tokio::test]
    async fn unbound_container_rejected() {
        let (_lib, bookie) = setup();
        let geoc = ContainerSummary {
            ghid: g(10),
            author: g(1),
        };
        assert_eq!(
            bookie.validate_geoc(&geoc).await.unwrap_err(),
            StoreError::UnboundContainer(g(10))
        );

        bookie.place_gobs(&gobs(20, 10)).await.unwrap();
        bookie.validate_geoc(&geoc).await.unwrap();
        assert_eq!(bookie.bind_status(&g(10)).await, HashSet::from([g(20)]));
    }

    #[tokio::test]
    async fn debound_binding_cannot_return() {
        let (lib, bookie) = setup();
        let binding = gobs(20, 10);
        lib.store(binding.clone().into(), vec![0]).await.unwrap();
        bookie.place_gobs(&binding).await.unwrap();

        bookie.place_gdxx(&gdxx(30, 1, 20)).await.unwrap();
        assert!(bookie.is_debound(&g(20)).await.unwrap());
        assert_eq!(
            bookie.validate_gobs(&binding).await.unwrap_err(),
            StoreError::AlreadyDebound(g(20))
        );
    }

    #[tokio::test]
    async fn frame_replaces_previous_binding() {
        let (lib, bookie) = setup();
        let first = DynamicBindingSummary {
            ghid: g(50),
            author: g(1),
            target: g(10),
            frame: g(60),
            history: vec![],
        };
        bookie.place_gobd(&first).await.unwrap();
        lib.store(first.clone().into(), vec![0]).await.unwrap();

        let second = DynamicBindingSummary {
            target: g(11),
            frame: g(61),
            history: vec![g(60)],
            ..first
        };
        bookie.place_gobd(&second).await.unwrap();
        assert!(!bookie.is_bound(&g(10)).await);
        assert!(bookie.is_bound(&g(11)).await);
    }

    #[tokio::test]
    async fn staged_debinding_promoted_once_target_known() {
        let (lib, bookie) = setup();
        bookie.place_gdxx(&gdxx(30, 1, 20)).await.unwrap();
        lib.store(gdxx(30, 1, 20).into(), vec![0]).await.unwrap();
        assert_eq!(bookie.debind_status(&g(20)).await, HashSet::from([g(30)]));
        // Unknown target: not yet confirmed.
        assert!(!bookie.is_debound(&g(20)).await.unwrap());

        lib.store(gobs(20, 10).into(), vec![1]).await.unwrap();
        assert!(bookie.is_debound(&g(20)).await.unwrap());
    }

    #[tokio::test]
    async fn staged_debinding_from_stranger_is_illegal() {
        let (lib, bookie) = setup();
        bookie.place_gdxx(&gdxx(30, 2, 20)).await.unwrap();
        lib.store(gdxx(30, 2, 20).into(), vec![0]).await.unwrap();
        lib.store(gobs(20, 10).into(), vec![1]).await.unwrap();

        assert!(!bookie.is_debound(&g(20)).await.unwrap());
        assert!(bookie.is_illegal(&g(30)));
    }

    #[tokio::test]
    async fn requests_tracked_by_recipient() {
        let (_lib, bookie) = setup();
        let request = RequestSummary {
            ghid: g(40),
            recipient: g(2),
        };
        bookie.place_garq(&request).await.unwrap();
        assert_eq!(bookie.recipient_status(&g(2)).await, HashSet::from([g(40)]));
        bookie.force_gc(&request.into()).await;
        assert!(bookie.recipient_status(&g(2)).await.is_empty());
    }
}
