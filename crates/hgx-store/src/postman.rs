use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use hgx_types::{Ghid, PrimitiveSummary};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::traits::{Bookie, Librarian, Postcard, PostcardStream, Postman};

/// Postman that fans postcards out over a tokio broadcast channel.
///
/// Dynamic frames whose target container has not arrived yet are held back
/// until that container is stored.
pub struct BroadcastPostman {
    librarian: Arc<dyn Librarian>,
    bookie: Arc<dyn Bookie>,
    sender: broadcast::Sender<Postcard>,
    /// Awaited address -> postcards released when it arrives.
    deferred: RwLock<HashMap<Ghid, Vec<Postcard>>>,
}

impl BroadcastPostman {
    pub fn new(librarian: Arc<dyn Librarian>, bookie: Arc<dyn Bookie>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            librarian,
            bookie,
            sender,
            deferred: RwLock::new(HashMap::new()),
        }
    }

    /// Number of addresses currently blocking deferred postcards.
    pub fn deferred_count(&self) -> usize {
        self.deferred.read().expect("lock poisoned").len()
    }

    fn deliver(&self, postcard: Postcard) {
        // No live receivers is not an error; nobody is listening yet.
        if self.sender.send(postcard).is_err() {
            debug!(subscription = %postcard.subscription, "postcard dropped: no subscribers");
        } else {
            debug!(
                subscription = %postcard.subscription,
                notification = %postcard.notification,
                "postcard scheduled"
            );
        }
    }

    fn defer(&self, awaiting: Ghid, postcard: Postcard) {
        debug!(awaiting = %awaiting, subscription = %postcard.subscription, "postcard deferred");
        self.deferred
            .write()
            .expect("lock poisoned")
            .entry(awaiting)
            .or_default()
            .push(postcard);
    }

    fn release_deferred(&self, ghid: &Ghid) {
        let released = self.deferred.write().expect("lock poisoned").remove(ghid);
        for postcard in released.into_iter().flatten() {
            self.deliver(postcard);
        }
    }

    async fn removal_postcards(&self, subscription: Ghid, removed: &Ghid) {
        let debindings = self.bookie.debind_status(removed).await;
        if debindings.is_empty() {
            warn!(ghid = %removed, "removal scheduled but no debinding is on record");
        }
        for debinding in debindings {
            self.deliver(Postcard {
                subscription,
                notification: debinding,
            });
        }
    }
}

#[async_trait]
impl Postman for BroadcastPostman {
    async fn schedule(&self, obj: &PrimitiveSummary, removed: bool) -> StoreResult<()> {
        if !removed {
            self.release_deferred(&obj.ghid());
        }

        match obj {
            PrimitiveSummary::DynamicBinding(binding) => {
                if removed {
                    self.removal_postcards(binding.ghid, &binding.ghid).await;
                } else {
                    let postcard = Postcard {
                        subscription: binding.ghid,
                        notification: binding.frame,
                    };
                    if self.librarian.contains(&binding.target).await? {
                        self.deliver(postcard);
                    } else {
                        self.defer(binding.target, postcard);
                    }
                }
            }
            PrimitiveSummary::Request(request) => {
                if removed {
                    self.removal_postcards(request.recipient, &request.ghid)
                        .await;
                } else {
                    self.deliver(Postcard {
                        subscription: request.recipient,
                        notification: request.ghid,
                    });
                }
            }
            // Identities, containers, static bindings, and debindings never
            // notify directly; removing a subscribed object notifies through
            // that object's own removal.
            PrimitiveSummary::Identity(_)
            | PrimitiveSummary::Container(_)
            | PrimitiveSummary::StaticBinding(_)
            | PrimitiveSummary::Debinding(_) => {}
        }
        Ok(())
    }

    fn subscribe(&self) -> PostcardStream {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookie::MemoryBookie;
    use crate::librarian::MemoryLibrarian;
    use hgx_types::{ContainerSummary, DebindingSummary, DynamicBindingSummary, RequestSummary};

    fn g(n: u8) -> Ghid {
        Ghid::from_hash([n; 32])
    }

    fn setup() -> (Arc<MemoryLibrarian>, Arc<MemoryBookie>, BroadcastPostman) {
        let lib = Arc::new(MemoryLibrarian::new());
        let bookie = Arc::new(MemoryBookie::new(lib.clone()));
        let postman = BroadcastPostman::new(lib.clone(), bookie.clone(), 16);
        (lib, bookie, postman)
    }

    fn frame(target: u8) -> PrimitiveSummary {
        DynamicBindingSummary {
            ghid: g(50),
            author: g(1),
            target: g(target),
            frame: g(60),
            history: vec![],
        }
        .into()
    }

    #[tokio::test]
    async fn frame_with_known_target_delivers() {
        let (lib, _bookie, postman) = setup();
        let mut rx = postman.subscribe();
        let container: PrimitiveSummary = ContainerSummary {
            ghid: g(10),
            author: g(1),
        }
        .into();
        lib.store(container, vec![0]).await.unwrap();

        postman.schedule(&frame(10), false).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            Postcard {
                subscription: g(50),
                notification: g(60)
            }
        );
    }

    #[tokio::test]
    async fn frame_deferred_until_container_arrives() {
        let (_lib, _bookie, postman) = setup();
        let mut rx = postman.subscribe();
        postman.schedule(&frame(10), false).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(postman.deferred_count(), 1);

        let container: PrimitiveSummary = ContainerSummary {
            ghid: g(10),
            author: g(1),
        }
        .into();
        postman.schedule(&container, false).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().notification, g(60));
        assert_eq!(postman.deferred_count(), 0);
    }

    #[tokio::test]
    async fn removed_frame_notifies_with_debinding() {
        let (lib, bookie, postman) = setup();
        let mut rx = postman.subscribe();
        lib.store(frame(10), vec![0]).await.unwrap();
        let debinding = DebindingSummary {
            ghid: g(70),
            author: g(1),
            target: g(50),
        };
        bookie.place_gdxx(&debinding).await.unwrap();

        postman.schedule(&frame(10), true).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            Postcard {
                subscription: g(50),
                notification: g(70)
            }
        );
    }

    #[tokio::test]
    async fn requests_notify_recipient() {
        let (_lib, _bookie, postman) = setup();
        let mut rx = postman.subscribe();
        let request: PrimitiveSummary = RequestSummary {
            ghid: g(40),
            recipient: g(2),
        }
        .into();
        postman.schedule(&request, false).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().subscription, g(2));
    }
}
