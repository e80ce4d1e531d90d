use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use hgx_gao::{Gao, GaoPayload};
use hgx_store::{Postcard, PostcardStream};
use hgx_types::Ghid;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Registry of live objects by address.
///
/// Postcards are routed to the registered object for their subscription.
/// Objects that turn out to be dead are dropped from the registry.
pub struct Oracle<T: GaoPayload> {
    objects: RwLock<HashMap<Ghid, Arc<Gao<T>>>>,
}

impl<T: GaoPayload> Default for Oracle<T> {
    fn default() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: GaoPayload> Oracle<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ghid: &Ghid) -> Option<Arc<Gao<T>>> {
        self.objects.read().expect("lock poisoned").get(ghid).cloned()
    }

    /// Register `gao` under `ghid`. If another task registered the same
    /// address first, that object is kept and returned instead.
    pub fn register(&self, ghid: Ghid, gao: Arc<Gao<T>>) -> Arc<Gao<T>> {
        self.objects
            .write()
            .expect("lock poisoned")
            .entry(ghid)
            .or_insert(gao)
            .clone()
    }

    pub fn forget(&self, ghid: &Ghid) -> Option<Arc<Gao<T>>> {
        self.objects.write().expect("lock poisoned").remove(ghid)
    }

    pub fn contains(&self, ghid: &Ghid) -> bool {
        self.objects.read().expect("lock poisoned").contains_key(ghid)
    }

    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply one postcard to the object it concerns.
    pub async fn deliver(&self, postcard: Postcard) {
        let Some(gao) = self.get(&postcard.subscription) else {
            debug!(
                subscription = %postcard.subscription,
                "postcard for an unregistered address"
            );
            return;
        };

        match gao.pull(postcard.notification).await {
            Ok(()) => {}
            Err(e) if e.is_dead() => {
                debug!(ghid = %postcard.subscription, "dead object dropped from registry");
                self.forget(&postcard.subscription);
            }
            Err(e) => {
                warn!(
                    ghid = %postcard.subscription,
                    notification = %postcard.notification,
                    error = %e,
                    "notification could not be applied"
                );
            }
        }
    }

    /// Deliver postcards until the postman goes away.
    pub async fn run_delivery(self: Arc<Self>, mut postcards: PostcardStream) {
        loop {
            match postcards.recv().await {
                Ok(postcard) => self.deliver(postcard).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "postcard stream lagged; notifications were lost");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("postcard stream closed; delivery stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hgx_gao::GaoContext;
    use hgx_golix::FirstParty;
    use hgx_persistence::{Collaborators, CoreConfig, PersistenceCore};
    use hgx_privateer::Privateer;

    async fn context() -> GaoContext {
        let config = CoreConfig::default();
        let core = Arc::new(PersistenceCore::new(
            &config,
            Collaborators::in_memory(&config, None),
        ));
        let identity = FirstParty::generate().unwrap();
        core.direct_ingest(&identity.identity().clone().into(), false)
            .await
            .unwrap();
        GaoContext {
            core,
            privateer: Arc::new(Privateer::new()),
            identity: Arc::new(identity),
            remotable: false,
        }
    }

    #[tokio::test]
    async fn first_registration_wins() {
        let ctx = context().await;
        let oracle = Oracle::<Vec<u8>>::new();
        let a = Arc::new(Gao::create(ctx.clone(), true, 3, b"a".to_vec()).await.unwrap());
        let ghid = a.ghid().await.unwrap();
        let b = Arc::new(Gao::load(ctx, ghid, 3).await.unwrap());

        let kept = oracle.register(ghid, a.clone());
        assert!(Arc::ptr_eq(&kept, &a));
        let kept = oracle.register(ghid, b);
        assert!(Arc::ptr_eq(&kept, &a));
        assert_eq!(oracle.len(), 1);
    }

    #[tokio::test]
    async fn unregistered_postcards_are_ignored() {
        let oracle = Oracle::<Vec<u8>>::new();
        let stray = Ghid::digest(b"stray");
        oracle
            .deliver(Postcard {
                subscription: stray,
                notification: stray,
            })
            .await;
        assert!(oracle.is_empty());
    }

    #[tokio::test]
    async fn dead_objects_are_forgotten() {
        let ctx = context().await;
        let oracle = Oracle::<Vec<u8>>::new();
        let gao = Arc::new(Gao::create(ctx, true, 3, b"a".to_vec()).await.unwrap());
        let ghid = gao.ghid().await.unwrap();
        oracle.register(ghid, gao.clone());

        gao.delete().await.unwrap();
        oracle
            .deliver(Postcard {
                subscription: ghid,
                notification: Ghid::digest(b"anything"),
            })
            .await;
        assert!(!oracle.contains(&ghid));
    }
}
