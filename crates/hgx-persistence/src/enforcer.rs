use std::sync::Arc;

use hgx_store::{Librarian, StoreError};
use hgx_types::{
    ContainerSummary, DebindingSummary, DynamicBindingSummary, Ghid, IdentitySummary,
    PrimitiveKind, PrimitiveSummary, RequestSummary, StaticBindingSummary,
};
use tracing::{debug, warn};

use crate::error::{PersistenceError, PersistenceResult};

/// Protocol rules that depend on what the store already holds: legal
/// binding and debinding targets, and monotonic dynamic history.
///
/// Every check either passes or fails with the reason; redundancy is
/// decided elsewhere.
pub struct Enforcer {
    librarian: Arc<dyn Librarian>,
}

impl Enforcer {
    pub fn new(librarian: Arc<dyn Librarian>) -> Self {
        Self { librarian }
    }

    pub async fn validate_gidc(&self, _obj: &IdentitySummary) -> PersistenceResult<()> {
        Ok(())
    }

    pub async fn validate_geoc(&self, _obj: &ContainerSummary) -> PersistenceResult<()> {
        Ok(())
    }

    pub async fn validate_gobs(&self, obj: &StaticBindingSummary) -> PersistenceResult<()> {
        self.check_binding_target(obj.ghid, obj.target).await
    }

    pub async fn validate_gobd(&self, obj: &DynamicBindingSummary) -> PersistenceResult<()> {
        self.check_binding_target(obj.ghid, obj.target).await?;
        self.check_history(obj).await
    }

    pub async fn validate_gdxx(&self, obj: &DebindingSummary) -> PersistenceResult<()> {
        match self.librarian.summarize(&obj.target).await {
            Ok(target) => match target.kind() {
                PrimitiveKind::Gidc | PrimitiveKind::Geoc => {
                    Err(PersistenceError::InvalidTarget {
                        ghid: obj.ghid,
                        target: obj.target,
                        target_kind: target.kind(),
                    })
                }
                PrimitiveKind::Gobs
                | PrimitiveKind::Gobd
                | PrimitiveKind::Gdxx
                | PrimitiveKind::Garq => Ok(()),
            },
            Err(StoreError::NotFound(_)) => {
                warn!(
                    ghid = %obj.ghid,
                    target = %obj.target,
                    "debinding an unknown target; possible targeted attack"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn validate_garq(&self, _obj: &RequestSummary) -> PersistenceResult<()> {
        Ok(())
    }

    pub async fn validate(&self, obj: &PrimitiveSummary) -> PersistenceResult<()> {
        match obj {
            PrimitiveSummary::Identity(s) => self.validate_gidc(s).await,
            PrimitiveSummary::Container(s) => self.validate_geoc(s).await,
            PrimitiveSummary::StaticBinding(s) => self.validate_gobs(s).await,
            PrimitiveSummary::DynamicBinding(s) => self.validate_gobd(s).await,
            PrimitiveSummary::Debinding(s) => self.validate_gdxx(s).await,
            PrimitiveSummary::Request(s) => self.validate_garq(s).await,
        }
    }

    async fn check_binding_target(&self, ghid: Ghid, target: Ghid) -> PersistenceResult<()> {
        match self.librarian.summarize(&target).await {
            Ok(existing) => match existing.kind() {
                PrimitiveKind::Geoc | PrimitiveKind::Gobd => Ok(()),
                PrimitiveKind::Gidc
                | PrimitiveKind::Gobs
                | PrimitiveKind::Gdxx
                | PrimitiveKind::Garq => Err(PersistenceError::InvalidTarget {
                    ghid,
                    target,
                    target_kind: existing.kind(),
                }),
            },
            Err(StoreError::NotFound(_)) => {
                debug!(ghid = %ghid, target = %target, "binding an unknown target");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A new frame must list the currently stored frame in its history.
    async fn check_history(&self, obj: &DynamicBindingSummary) -> PersistenceResult<()> {
        match self.librarian.summarize(&obj.ghid).await {
            Ok(PrimitiveSummary::DynamicBinding(existing)) => {
                if existing.frame == obj.frame || obj.history.contains(&existing.frame) {
                    Ok(())
                } else {
                    Err(PersistenceError::IllegalDynamicFrame {
                        ghid: obj.ghid,
                        frame: obj.frame,
                        current: existing.frame,
                    })
                }
            }
            Ok(_) => Err(StoreError::Inconsistent(obj.ghid).into()),
            Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
