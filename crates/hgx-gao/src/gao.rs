use std::sync::Arc;

use hgx_crypto::{ratchet, Secret};
use hgx_golix::{FirstParty, Geoc, Gobd, Primitive};
use hgx_persistence::{PersistenceCore, PersistenceError};
use hgx_privateer::Privateer;
use hgx_store::StoreError;
use hgx_types::{DebindingSummary, DynamicBindingSummary, Ghid, PrimitiveKind, PrimitiveSummary};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{GaoError, GaoResult};
use crate::healing::heal;
use crate::history::History;
use crate::payload::GaoPayload;

// ---------------------------------------------------------------------------
// GaoContext
// ---------------------------------------------------------------------------

/// Shared handles every GAO works through.
#[derive(Clone)]
pub struct GaoContext {
    pub core: Arc<PersistenceCore>,
    pub privateer: Arc<Privateer>,
    pub identity: Arc<FirstParty>,
    /// Whether primitives this object produces are replicated upstream.
    pub remotable: bool,
}

impl GaoContext {
    async fn ingest(&self, primitive: impl Into<Primitive>) -> GaoResult<()> {
        self.core
            .direct_ingest(&primitive.into(), self.remotable)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Gao
// ---------------------------------------------------------------------------

struct GaoState<T> {
    ghid: Option<Ghid>,
    dynamic: bool,
    author: Option<Ghid>,
    /// Fixes the dynamic address; repeated in every frame.
    nonce: Option<[u8; 32]>,
    history: History,
    alive: bool,
    state: T,
}

impl<T> GaoState<T> {
    fn addressed(&self) -> GaoResult<Ghid> {
        let ghid = self.ghid.ok_or(GaoError::Unaddressed)?;
        if self.alive {
            Ok(ghid)
        } else {
            Err(GaoError::DeadObject(ghid))
        }
    }
}

/// A Golix-aware object: application state kept in sync with the store.
///
/// Dynamic objects are chains of frames, each sealing the state under the
/// next secret of a ratchet. Static objects are a single bound container.
/// Every mutation holds the object's lock, so push, pull, and delete never
/// interleave.
pub struct Gao<T: GaoPayload> {
    ctx: GaoContext,
    inner: Mutex<GaoState<T>>,
}

impl<T: GaoPayload> Gao<T> {
    /// An object that does not exist in the store until [`Self::push`].
    pub fn new(ctx: GaoContext, dynamic: bool, legroom: usize, state: T) -> Self {
        Self {
            ctx,
            inner: Mutex::new(GaoState {
                ghid: None,
                dynamic,
                author: None,
                nonce: None,
                history: History::new(legroom),
                alive: true,
                state,
            }),
        }
    }

    /// Create and push a new object.
    pub async fn create(
        ctx: GaoContext,
        dynamic: bool,
        legroom: usize,
        state: T,
    ) -> GaoResult<Self> {
        let gao = Self::new(ctx, dynamic, legroom, state);
        gao.push().await?;
        Ok(gao)
    }

    /// Reconstruct an existing object from its address, asking upstream if
    /// the store does not hold it.
    pub async fn load(ctx: GaoContext, ghid: Ghid, legroom: usize) -> GaoResult<Self> {
        let librarian = ctx.core.librarian().clone();
        let summary = match librarian.summarize(&ghid).await {
            Ok(summary) => summary,
            Err(StoreError::NotFound(_)) => {
                ctx.core.attempt_pull(&ghid, true).await?;
                librarian.summarize(&ghid).await?
            }
            Err(e) => return Err(e.into()),
        };

        let dynamic = match &summary {
            PrimitiveSummary::DynamicBinding(_) => true,
            PrimitiveSummary::Container(_) => false,
            other => {
                return Err(GaoError::NotAnObject {
                    ghid,
                    kind: other.kind(),
                })
            }
        };

        let gao = Self::new(ctx, dynamic, legroom, T::default());
        {
            let mut st = gao.inner.lock().await;
            st.ghid = Some(ghid);
            if dynamic {
                let frame = Gobd::unpack(&librarian.retrieve(&ghid).await?)?;
                st.nonce = Some(frame.nonce);
            }
            gao.resync(&mut st).await?;
        }
        debug!(ghid = %ghid, dynamic, "object loaded");
        Ok(gao)
    }

    pub async fn ghid(&self) -> Option<Ghid> {
        self.inner.lock().await.ghid
    }

    pub async fn author(&self) -> Option<Ghid> {
        self.inner.lock().await.author
    }

    pub async fn is_dynamic(&self) -> bool {
        self.inner.lock().await.dynamic
    }

    pub async fn is_alive(&self) -> bool {
        self.inner.lock().await.alive
    }

    pub async fn state(&self) -> T {
        self.inner.lock().await.state.clone()
    }

    /// Replace local state. Nothing is persisted until [`Self::push`].
    pub async fn set_state(&self, state: T) {
        self.inner.lock().await.state = state;
    }

    /// Replace local state and push it.
    pub async fn update(&self, state: T) -> GaoResult<()> {
        let mut st = self.inner.lock().await;
        st.state = state;
        self.push_locked(&mut st).await
    }

    pub async fn legroom(&self) -> usize {
        self.inner.lock().await.history.legroom()
    }

    pub async fn set_legroom(&self, legroom: usize) {
        self.inner.lock().await.history.set_legroom(legroom);
    }

    /// Known frame addresses, newest first.
    pub async fn frame_history(&self) -> Vec<Ghid> {
        self.inner.lock().await.history.frames()
    }

    /// Persist the current state.
    ///
    /// The first push creates the object. Later pushes of a dynamic object
    /// add a frame; if that fails the object is restored from the store
    /// before the error is returned.
    pub async fn push(&self) -> GaoResult<()> {
        let mut st = self.inner.lock().await;
        self.push_locked(&mut st).await
    }

    /// Apply a notification that something new happened at this address.
    pub async fn pull(&self, notification: Ghid) -> GaoResult<()> {
        let mut st = self.inner.lock().await;
        let ghid = st.addressed()?;
        if !st.dynamic {
            return Err(GaoError::NotDynamic(ghid));
        }
        if st.history.contains(&notification) {
            debug!(ghid = %ghid, notification = %notification, "pull ignored; frame already applied");
            return Ok(());
        }

        match self.ctx.core.librarian().summarize(&notification).await? {
            PrimitiveSummary::Debinding(debinding) => {
                Self::apply_delete_locked(&mut st, &debinding)?;
                info!(ghid = %ghid, "pull completed; object deleted");
                Ok(())
            }
            PrimitiveSummary::DynamicBinding(binding) if binding.ghid == ghid => {
                self.resync(&mut st).await?;
                info!(ghid = %ghid, frame = %binding.frame, "pull completed with updates");
                Ok(())
            }
            _ => Err(GaoError::MismatchedNotification { ghid, notification }),
        }
    }

    /// Mark the object deleted because of `debinding`, which must target it.
    pub async fn apply_delete(&self, debinding: &DebindingSummary) -> GaoResult<()> {
        let mut st = self.inner.lock().await;
        st.addressed()?;
        Self::apply_delete_locked(&mut st, debinding)
    }

    /// Remove the object from the store and mark it dead.
    ///
    /// Dynamic objects debind their own address. Static objects debind
    /// every static binding this identity made to the container.
    pub async fn delete(&self) -> GaoResult<()> {
        let mut st = self.inner.lock().await;
        let ghid = st.addressed()?;
        let identity = self.ctx.identity.clone();

        if st.dynamic {
            self.ctx.ingest(identity.make_debinding(ghid)?).await?;
        } else {
            let librarian = self.ctx.core.librarian();
            for binding in self.ctx.core.bookie().bind_status(&ghid).await {
                match librarian.summarize(&binding).await {
                    Ok(PrimitiveSummary::StaticBinding(s)) if s.author == identity.ghid() => {
                        self.ctx.ingest(identity.make_debinding(s.ghid)?).await?;
                    }
                    Ok(_) | Err(StoreError::NotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        st.alive = false;
        info!(ghid = %ghid, "object deleted");
        Ok(())
    }

    /// Statically bind the current container of a dynamic object and return
    /// its address.
    pub async fn freeze(&self) -> GaoResult<Ghid> {
        let st = self.inner.lock().await;
        let ghid = st.addressed()?;
        if !st.dynamic {
            return Err(GaoError::NotDynamic(ghid));
        }
        let container = match st.history.newest_target() {
            Some(target) => target,
            None => self
                .ctx
                .core
                .librarian()
                .summarize(&ghid)
                .await?
                .target()
                .ok_or(GaoError::NotAnObject {
                    ghid,
                    kind: PrimitiveKind::Gobd,
                })?,
        };
        self.ctx
            .ingest(self.ctx.identity.make_binding_stat(container)?)
            .await?;
        debug!(ghid = %ghid, container = %container, "object frozen");
        Ok(container)
    }

    /// Statically bind the object's own address so it outlives its creator's
    /// other bindings.
    pub async fn hold(&self) -> GaoResult<()> {
        let st = self.inner.lock().await;
        let ghid = st.addressed()?;
        self.ctx
            .ingest(self.ctx.identity.make_binding_stat(ghid)?)
            .await
    }

    // -- locked internals --------------------------------------------------

    async fn push_locked(&self, st: &mut GaoState<T>) -> GaoResult<()> {
        let Some(ghid) = st.ghid else {
            return self.create_locked(st).await;
        };
        if !st.alive {
            return Err(GaoError::DeadObject(ghid));
        }
        if !st.dynamic {
            return Err(GaoError::StaticImmutable(ghid));
        }

        match self.update_locked(st, ghid).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(ghid = %ghid, error = %e, "push failed; restoring last stored state");
                if let Err(resync) = self.resync(st).await {
                    warn!(ghid = %ghid, error = %resync, "could not restore stored state");
                }
                Err(e)
            }
        }
    }

    async fn create_locked(&self, st: &mut GaoState<T>) -> GaoResult<()> {
        let identity = &self.ctx.identity;
        let secret = Secret::generate();
        let container = identity.make_container(&secret, &st.state.pack())?;
        self.ctx.privateer.stage(container.ghid, secret)?;

        let dynamic = st.dynamic;
        let created = async {
            if dynamic {
                let binding = identity.make_binding_dyn(container.ghid, None, Vec::new())?;
                let created = (binding.ghid, Some(binding.nonce), binding.frame_ghid);
                self.ctx.ingest(binding).await?;
                self.ctx.ingest(container.clone()).await?;
                Ok::<_, GaoError>(created)
            } else {
                let binding = identity.make_binding_stat(container.ghid)?;
                let created = (container.ghid, None, binding.ghid);
                self.ctx.ingest(binding).await?;
                self.ctx.ingest(container.clone()).await?;
                Ok(created)
            }
        }
        .await;

        match created {
            Ok((ghid, nonce, frame)) => {
                self.ctx.privateer.commit(&container.ghid)?;
                st.ghid = Some(ghid);
                st.author = Some(identity.ghid());
                st.nonce = nonce;
                st.history.push_front(frame, Some(container.ghid));
                info!(ghid = %ghid, dynamic = st.dynamic, "object created");
                Ok(())
            }
            Err(e) => {
                self.ctx.privateer.abandon(&container.ghid, true)?;
                Err(e)
            }
        }
    }

    async fn update_locked(&self, st: &mut GaoState<T>, ghid: Ghid) -> GaoResult<()> {
        let identity = &self.ctx.identity;
        let current_frame = st.history.newest_frame().unwrap_or(ghid);
        let current_target = st.history.newest_target().ok_or(GaoError::Ratchet {
            ghid,
            frame: current_frame,
        })?;
        let nonce = st.nonce.ok_or(GaoError::NotDynamic(ghid))?;
        // Frame addresses derive from the binder, so only the author can
        // extend the chain.
        if let Some(author) = st.author {
            if author != identity.ghid() {
                return Err(PersistenceError::InconsistentAuthor {
                    ghid,
                    expected: author,
                    found: identity.ghid(),
                }
                .into());
            }
        }

        let secret = ratchet(&self.ctx.privateer.get(&current_target)?, &current_target);
        let container = identity.make_container(&secret, &st.state.pack())?;
        self.ctx.privateer.stage(container.ghid, secret)?;

        let history = st.history.frames();
        let pushed = async {
            let binding = identity.make_binding_dyn(container.ghid, Some(nonce), history)?;
            let frame = binding.frame_ghid;
            self.ctx.ingest(binding).await?;
            self.ctx.ingest(container.clone()).await?;
            Ok::<_, GaoError>(frame)
        }
        .await;

        match pushed {
            Ok(frame) => {
                self.ctx.privateer.commit(&container.ghid)?;
                st.history.push_front(frame, Some(container.ghid));
                debug!(ghid = %ghid, frame = %frame, "frame pushed");
                Ok(())
            }
            Err(e) => {
                self.ctx.privateer.abandon(&container.ghid, true)?;
                Err(e)
            }
        }
    }

    /// Bring local state in line with whatever the store currently holds.
    async fn resync(&self, st: &mut GaoState<T>) -> GaoResult<()> {
        let ghid = st.ghid.ok_or(GaoError::Unaddressed)?;
        match self.ctx.core.librarian().summarize(&ghid).await? {
            PrimitiveSummary::DynamicBinding(binding) => self.apply_frame(st, &binding).await,
            PrimitiveSummary::Container(container) => {
                let secret = self.ctx.privateer.get(&ghid)?;
                st.state = self.open(&ghid, &secret).await?;
                st.dynamic = false;
                st.author = Some(container.author);
                Ok(())
            }
            other => Err(GaoError::NotAnObject {
                ghid,
                kind: other.kind(),
            }),
        }
    }

    /// Heal, decrypt, and unpack `binding`, then align local history to it.
    async fn apply_frame(
        &self,
        st: &mut GaoState<T>,
        binding: &DynamicBindingSummary,
    ) -> GaoResult<()> {
        let librarian = self.ctx.core.librarian();
        let secret = heal(&self.ctx.privateer, &**librarian, &st.history, binding).await?;
        let state = self.open(&binding.target, &secret).await?;

        self.ctx.privateer.stage(binding.target, secret)?;
        self.ctx.privateer.commit(&binding.target)?;

        st.state = state;
        st.dynamic = true;
        st.author = Some(binding.author);
        let alignment = st
            .history
            .align(binding.frame, binding.target, &binding.history);
        debug!(ghid = %binding.ghid, frame = %binding.frame, ?alignment, "frame applied");
        Ok(())
    }

    async fn open(&self, container: &Ghid, secret: &Secret) -> GaoResult<T> {
        let packed = self.ctx.core.librarian().retrieve(container).await?;
        let plaintext = Geoc::unpack(&packed)?.open(secret)?;
        T::unpack(&plaintext)
    }

    fn apply_delete_locked(st: &mut GaoState<T>, debinding: &DebindingSummary) -> GaoResult<()> {
        let ghid = st.addressed()?;
        if debinding.target != ghid {
            return Err(GaoError::MismatchedNotification {
                ghid,
                notification: debinding.ghid,
            });
        }
        st.alive = false;
        Ok(())
    }
}

impl<T: GaoPayload> std::fmt::Debug for Gao<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_lock() {
            Ok(st) => f
                .debug_struct("Gao")
                .field("ghid", &st.ghid)
                .field("dynamic", &st.dynamic)
                .field("alive", &st.alive)
                .field("frames", &st.history.len())
                .finish(),
            Err(_) => f.write_str("Gao(<locked>)"),
        }
    }
}
