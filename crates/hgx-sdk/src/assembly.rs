use std::sync::Arc;

use hgx_gao::{Gao, GaoContext, GaoError};
use hgx_golix::FirstParty;
use hgx_persistence::{Collaborators, CoreConfig, PersistenceCore};
use hgx_privateer::Privateer;
use hgx_store::Librarian;
use hgx_types::{Ghid, PrimitiveSummary};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::SdkResult;
use crate::oracle::Oracle;

/// Objects handed out by [`HgxCore`]: raw byte payloads.
pub type Object = Gao<Vec<u8>>;

/// One fully wired Hypergolix node.
///
/// Owns the persistence pipeline and its collaborators, the secret store,
/// the local identity, and the object registry. Construction starts the
/// task that routes postman deliveries to registered objects; dropping the
/// core stops it.
pub struct HgxCore {
    config: CoreConfig,
    persistence: Arc<PersistenceCore>,
    privateer: Arc<Privateer>,
    identity: Arc<FirstParty>,
    oracle: Arc<Oracle<Vec<u8>>>,
    delivery: JoinHandle<()>,
}

impl HgxCore {
    /// Wire `identity` to the given collaborators and ingest its identity
    /// primitive.
    pub async fn assemble(
        config: CoreConfig,
        identity: FirstParty,
        collaborators: Collaborators,
    ) -> SdkResult<Self> {
        config.validate()?;
        let persistence = Arc::new(PersistenceCore::new(&config, collaborators));
        persistence
            .direct_ingest(&identity.identity().clone().into(), config.remotable)
            .await?;

        let oracle = Arc::new(Oracle::new());
        let postcards = persistence.postman().subscribe();
        let delivery = tokio::spawn(oracle.clone().run_delivery(postcards));

        info!(identity = %identity.ghid(), remotable = config.remotable, "hypergolix core assembled");
        Ok(Self {
            config,
            persistence,
            privateer: Arc::new(Privateer::new()),
            identity: Arc::new(identity),
            oracle,
            delivery,
        })
    }

    /// Assemble over in-memory collaborators, replicating into `upstream`
    /// when given.
    pub async fn in_memory(
        config: CoreConfig,
        identity: FirstParty,
        upstream: Option<Arc<dyn Librarian>>,
    ) -> SdkResult<Self> {
        let collaborators = Collaborators::in_memory(&config, upstream);
        Self::assemble(config, identity, collaborators).await
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn persistence(&self) -> &Arc<PersistenceCore> {
        &self.persistence
    }

    pub fn privateer(&self) -> &Arc<Privateer> {
        &self.privateer
    }

    pub fn identity(&self) -> &FirstParty {
        &self.identity
    }

    pub fn ghid(&self) -> Ghid {
        self.identity.ghid()
    }

    pub fn oracle(&self) -> &Arc<Oracle<Vec<u8>>> {
        &self.oracle
    }

    /// Handles for building objects outside the registry.
    pub fn context(&self) -> GaoContext {
        GaoContext {
            core: self.persistence.clone(),
            privateer: self.privateer.clone(),
            identity: self.identity.clone(),
            remotable: self.config.remotable,
        }
    }

    /// Ingest bytes received from elsewhere.
    pub async fn ingest(&self, packed: &[u8]) -> SdkResult<Option<PrimitiveSummary>> {
        Ok(self.persistence.ingest(packed, false).await?)
    }

    /// Create, push, and register a new object.
    pub async fn new_object(&self, dynamic: bool, state: Vec<u8>) -> SdkResult<Arc<Object>> {
        let gao = Gao::create(self.context(), dynamic, self.config.legroom(), state).await?;
        let ghid = gao.ghid().await.ok_or(GaoError::Unaddressed)?;
        debug!(ghid = %ghid, dynamic, "object created");
        self.track(ghid, Arc::new(gao)).await
    }

    /// The registered object at `ghid`, loading and registering it first if
    /// needed.
    pub async fn get_object(&self, ghid: Ghid) -> SdkResult<Arc<Object>> {
        if let Some(gao) = self.oracle.get(&ghid) {
            return Ok(gao);
        }
        let gao = Gao::load(self.context(), ghid, self.config.legroom()).await?;
        self.track(ghid, Arc::new(gao)).await
    }

    async fn track(&self, ghid: Ghid, gao: Arc<Object>) -> SdkResult<Arc<Object>> {
        let gao = self.oracle.register(ghid, gao);
        self.persistence.salmonator().register(&ghid).await?;
        Ok(gao)
    }
}

impl Drop for HgxCore {
    fn drop(&mut self) {
        self.delivery.abort();
    }
}

impl std::fmt::Debug for HgxCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HgxCore")
            .field("identity", &self.identity.ghid())
            .field("objects", &self.oracle.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hgx_crypto::Secret;
    use hgx_privateer::PrivateerError;
    use hgx_store::{MemoryLibrarian, Postcard};
    use hgx_types::{DynamicBindingSummary, PrimitiveKind};
    use tokio::sync::broadcast::error::TryRecvError;

    async fn node(legroom: usize, upstream: Option<Arc<dyn Librarian>>) -> HgxCore {
        let config = CoreConfig {
            default_legroom: legroom,
            ..CoreConfig::default()
        };
        HgxCore::in_memory(config, FirstParty::generate().unwrap(), upstream)
            .await
            .unwrap()
    }

    async fn current_frame(core: &HgxCore, ghid: Ghid) -> DynamicBindingSummary {
        match core.persistence().librarian().summarize(&ghid).await.unwrap() {
            PrimitiveSummary::DynamicBinding(frame) => frame,
            other => panic!("expected a dynamic binding, got a {}", other.kind()),
        }
    }

    // ---- 1. Object lifecycle ----

    #[tokio::test]
    async fn three_updates_cap_history_and_reload() {
        let core = node(3, None).await;
        let obj = core.new_object(true, b"v0".to_vec()).await.unwrap();
        for state in [b"v1", b"v2", b"v3"] {
            obj.update(state.to_vec()).await.unwrap();
        }
        assert_eq!(obj.frame_history().await.len(), 3);
        assert_eq!(obj.state().await, b"v3".to_vec());

        let ghid = obj.ghid().await.unwrap();
        core.oracle().forget(&ghid);
        let fresh = core.get_object(ghid).await.unwrap();
        assert!(!Arc::ptr_eq(&obj, &fresh));
        assert_eq!(fresh.state().await, b"v3".to_vec());
        assert!(core.oracle().contains(&ghid));
    }

    #[tokio::test]
    async fn get_object_returns_the_registered_instance() {
        let core = node(3, None).await;
        let obj = core.new_object(false, b"fixed".to_vec()).await.unwrap();
        let ghid = obj.ghid().await.unwrap();
        let again = core.get_object(ghid).await.unwrap();
        assert!(Arc::ptr_eq(&obj, &again));
        assert!(!again.is_dynamic().await);
        assert_eq!(again.state().await, b"fixed".to_vec());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = CoreConfig {
            parse_workers: 0,
            ..CoreConfig::default()
        };
        let result = HgxCore::in_memory(config, FirstParty::generate().unwrap(), None).await;
        assert!(matches!(result, Err(crate::SdkError::Persistence(_))));
    }

    // ---- 2. Delete ----

    #[tokio::test]
    async fn deleted_object_is_dead_and_debindable_by_others() {
        let core = node(3, None).await;
        let obj = core.new_object(true, b"v0".to_vec()).await.unwrap();
        let ghid = obj.ghid().await.unwrap();
        // The hold keeps the binding stored after its own debinding.
        obj.hold().await.unwrap();
        obj.delete().await.unwrap();

        assert!(obj.push().await.unwrap_err().is_dead());
        assert!(obj.pull(Ghid::digest(b"any")).await.unwrap_err().is_dead());

        let librarian = core.persistence().librarian();
        assert!(librarian.contains(&ghid).await.unwrap());
        assert_eq!(
            librarian.summarize(&ghid).await.unwrap().kind(),
            PrimitiveKind::Gobd
        );

        // Another party debinding the same, still known, address.
        let bob = FirstParty::generate().unwrap();
        let debinding = bob.make_debinding(ghid).unwrap();
        assert!(core
            .persistence()
            .enforcer()
            .validate_gdxx(&debinding.summarize())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn removal_postcard_drops_object_from_registry() {
        let core = node(3, None).await;
        let obj = core.new_object(true, b"v0".to_vec()).await.unwrap();
        let ghid = obj.ghid().await.unwrap();
        obj.delete().await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while core.oracle().contains(&ghid) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("dead object still registered");
    }

    // ---- 3. Idempotence ----

    #[tokio::test]
    async fn repeated_ingest_stores_and_notifies_once() {
        let core = node(3, None).await;
        let mut postcards = core.persistence().postman().subscribe();
        let container = core
            .identity()
            .make_container(&Secret::generate(), b"payload")
            .unwrap();
        let binding = core
            .identity()
            .make_binding_dyn(container.ghid, None, Vec::new())
            .unwrap();

        assert!(core.ingest(binding.packed()).await.unwrap().is_some());
        assert!(core.ingest(binding.packed()).await.unwrap().is_none());
        assert!(core.ingest(container.packed()).await.unwrap().is_some());
        assert!(core.ingest(container.packed()).await.unwrap().is_none());

        assert_eq!(
            postcards.recv().await.unwrap(),
            Postcard {
                subscription: binding.ghid,
                notification: binding.frame_ghid,
            }
        );
        assert!(matches!(postcards.try_recv(), Err(TryRecvError::Empty)));

        let stored = core
            .persistence()
            .librarian()
            .retrieve(&container.ghid)
            .await
            .unwrap();
        assert_eq!(stored, container.packed());
    }

    // ---- 4. Secrets ----

    #[tokio::test]
    async fn secret_staging_is_transactional() {
        let core = node(3, None).await;
        let privateer = core.privateer();
        let ghid = Ghid::digest(b"container");
        let (s1, s2) = (Secret::generate(), Secret::generate());

        privateer.stage(ghid, s1.clone()).unwrap();
        assert_eq!(
            privateer.stage(ghid, s2).unwrap_err(),
            PrivateerError::Conflict(ghid)
        );
        assert_eq!(privateer.get(&ghid).unwrap(), s1);

        privateer.commit(&ghid).unwrap();
        assert_eq!(privateer.get(&ghid).unwrap(), s1);
        privateer.stage(ghid, s1.clone()).unwrap();
        privateer.commit(&ghid).unwrap();
        assert_eq!(privateer.get(&ghid).unwrap(), s1);
    }

    // ---- 5. Replication and the ratchet ----

    #[tokio::test]
    async fn second_node_follows_updates_from_one_shared_secret() {
        let upstream: Arc<dyn Librarian> = Arc::new(MemoryLibrarian::new());
        let a = node(3, Some(upstream.clone())).await;
        let b = node(3, Some(upstream)).await;
        b.ingest(a.identity().identity().packed()).await.unwrap();

        let obj = a.new_object(true, b"v0".to_vec()).await.unwrap();
        let ghid = obj.ghid().await.unwrap();
        let first = current_frame(&a, ghid).await;
        b.privateer()
            .stage(first.target, a.privateer().get(&first.target).unwrap())
            .unwrap();
        b.privateer().commit(&first.target).unwrap();

        let reader = b.get_object(ghid).await.unwrap();
        assert_eq!(reader.state().await, b"v0".to_vec());

        obj.update(b"v1".to_vec()).await.unwrap();
        let second = current_frame(&a, ghid).await;
        b.persistence().attempt_pull(&ghid, false).await.unwrap();
        reader.pull(second.frame).await.unwrap();
        assert_eq!(reader.state().await, b"v1".to_vec());

        // Both nodes derived the next secret on their own.
        assert_eq!(
            b.privateer().get(&second.target).unwrap(),
            a.privateer().get(&second.target).unwrap()
        );

        // The delivery task applies the next update without an explicit pull.
        obj.update(b"v2".to_vec()).await.unwrap();
        b.persistence().attempt_pull(&ghid, false).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while reader.state().await != b"v2".to_vec() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("update never delivered");
    }

    #[tokio::test]
    async fn unknown_secret_cannot_load() {
        let upstream: Arc<dyn Librarian> = Arc::new(MemoryLibrarian::new());
        let a = node(3, Some(upstream.clone())).await;
        let b = node(3, Some(upstream)).await;
        b.ingest(a.identity().identity().packed()).await.unwrap();

        let obj = a.new_object(true, b"secret".to_vec()).await.unwrap();
        let ghid = obj.ghid().await.unwrap();
        let err = b.get_object(ghid).await.unwrap_err();
        assert!(matches!(
            err,
            crate::SdkError::Gao(GaoError::Ratchet { .. })
        ));
        assert!(!b.oracle().contains(&ghid));
    }
}
