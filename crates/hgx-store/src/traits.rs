use std::collections::HashSet;

use async_trait::async_trait;
use hgx_types::{
    ContainerSummary, DebindingSummary, DynamicBindingSummary, Ghid, IdentitySummary,
    PrimitiveSummary, RequestSummary, StaticBindingSummary,
};
use tokio::sync::broadcast;

use crate::error::StoreResult;

/// Durable, address-keyed primitive storage.
///
/// Implementations must satisfy:
/// - Dynamic addresses resolve to their newest frame for `contains`,
///   `summarize`, and `retrieve`.
/// - Superseded frames remain summarizable by frame address, but their bytes
///   are dropped.
/// - `store` never replaces a primitive with an inconsistent one at the same
///   address.
#[async_trait]
pub trait Librarian: Send + Sync {
    /// Whether packed bytes are held for this address.
    async fn contains(&self, ghid: &Ghid) -> StoreResult<bool>;

    /// Summary of the primitive, failing with `NotFound` if unknown.
    async fn summarize(&self, ghid: &Ghid) -> StoreResult<PrimitiveSummary>;

    /// Exact packed bytes of the primitive.
    async fn retrieve(&self, ghid: &Ghid) -> StoreResult<Vec<u8>>;

    /// Start tracking a primitive.
    async fn store(&self, summary: PrimitiveSummary, packed: Vec<u8>) -> StoreResult<()>;

    /// Erase a primitive. Idempotent.
    async fn force_gc(&self, summary: &PrimitiveSummary) -> StoreResult<()>;
}

/// Authorship consistency rules.
#[async_trait]
pub trait Lawyer: Send + Sync {
    async fn validate_gidc(&self, _obj: &IdentitySummary) -> StoreResult<()> {
        Ok(())
    }

    async fn validate_geoc(&self, obj: &ContainerSummary) -> StoreResult<()>;

    async fn validate_gobs(&self, obj: &StaticBindingSummary) -> StoreResult<()>;

    async fn validate_gobd(&self, obj: &DynamicBindingSummary) -> StoreResult<()>;

    async fn validate_gdxx(&self, obj: &DebindingSummary) -> StoreResult<()>;

    async fn validate_garq(&self, obj: &RequestSummary) -> StoreResult<()>;

    async fn validate(&self, obj: &PrimitiveSummary) -> StoreResult<()> {
        match obj {
            PrimitiveSummary::Identity(s) => self.validate_gidc(s).await,
            PrimitiveSummary::Container(s) => self.validate_geoc(s).await,
            PrimitiveSummary::StaticBinding(s) => self.validate_gobs(s).await,
            PrimitiveSummary::DynamicBinding(s) => self.validate_gobd(s).await,
            PrimitiveSummary::Debinding(s) => self.validate_gdxx(s).await,
            PrimitiveSummary::Request(s) => self.validate_garq(s).await,
        }
    }
}

/// Binding-lifetime bookkeeping.
///
/// Tracks which addresses are bound, debound, or addressed by requests.
/// Never checks authorship.
#[async_trait]
pub trait Bookie: Send + Sync {
    async fn validate_gidc(&self, _obj: &IdentitySummary) -> StoreResult<()> {
        Ok(())
    }
    async fn validate_geoc(&self, obj: &ContainerSummary) -> StoreResult<()>;
    async fn validate_gobs(&self, obj: &StaticBindingSummary) -> StoreResult<()>;
    async fn validate_gobd(&self, obj: &DynamicBindingSummary) -> StoreResult<()>;
    async fn validate_gdxx(&self, obj: &DebindingSummary) -> StoreResult<()>;
    async fn validate_garq(&self, obj: &RequestSummary) -> StoreResult<()>;

    async fn place_gidc(&self, _obj: &IdentitySummary) -> StoreResult<()> {
        Ok(())
    }
    async fn place_geoc(&self, _obj: &ContainerSummary) -> StoreResult<()> {
        Ok(())
    }
    async fn place_gobs(&self, obj: &StaticBindingSummary) -> StoreResult<()>;
    async fn place_gobd(&self, obj: &DynamicBindingSummary) -> StoreResult<()>;
    async fn place_gdxx(&self, obj: &DebindingSummary) -> StoreResult<()>;
    async fn place_garq(&self, obj: &RequestSummary) -> StoreResult<()>;

    /// Addresses of every binding currently binding `ghid`.
    async fn bind_status(&self, ghid: &Ghid) -> HashSet<Ghid>;

    /// Addresses of every debinding, confirmed or staged, targeting `ghid`.
    async fn debind_status(&self, ghid: &Ghid) -> HashSet<Ghid>;

    /// Addresses of every request sent to `recipient`.
    async fn recipient_status(&self, recipient: &Ghid) -> HashSet<Ghid>;

    async fn is_bound(&self, ghid: &Ghid) -> bool;

    /// Whether a valid debinding targets `ghid`. Promotes staged debindings
    /// whose target has since become known.
    async fn is_debound(&self, ghid: &Ghid) -> StoreResult<bool>;

    /// Drop every record held for a collected primitive.
    async fn force_gc(&self, obj: &PrimitiveSummary);

    async fn validate(&self, obj: &PrimitiveSummary) -> StoreResult<()> {
        match obj {
            PrimitiveSummary::Identity(s) => self.validate_gidc(s).await,
            PrimitiveSummary::Container(s) => self.validate_geoc(s).await,
            PrimitiveSummary::StaticBinding(s) => self.validate_gobs(s).await,
            PrimitiveSummary::DynamicBinding(s) => self.validate_gobd(s).await,
            PrimitiveSummary::Debinding(s) => self.validate_gdxx(s).await,
            PrimitiveSummary::Request(s) => self.validate_garq(s).await,
        }
    }

    async fn place(&self, obj: &PrimitiveSummary) -> StoreResult<()> {
        match obj {
            PrimitiveSummary::Identity(s) => self.place_gidc(s).await,
            PrimitiveSummary::Container(s) => self.place_geoc(s).await,
            PrimitiveSummary::StaticBinding(s) => self.place_gobs(s).await,
            PrimitiveSummary::DynamicBinding(s) => self.place_gobd(s).await,
            PrimitiveSummary::Debinding(s) => self.place_gdxx(s).await,
            PrimitiveSummary::Request(s) => self.place_garq(s).await,
        }
    }
}

/// Garbage collection.
///
/// `prep` runs before the new primitive is stored and only stages
/// candidates; `collect` runs after the store write and erases whatever is
/// no longer needed.
#[async_trait]
pub trait Undertaker: Send + Sync {
    async fn prep_gobd(&self, obj: &DynamicBindingSummary) -> StoreResult<()>;
    async fn prep_gdxx(&self, obj: &DebindingSummary) -> StoreResult<()>;

    async fn prep(&self, obj: &PrimitiveSummary) -> StoreResult<()> {
        match obj {
            PrimitiveSummary::DynamicBinding(s) => self.prep_gobd(s).await,
            PrimitiveSummary::Debinding(s) => self.prep_gdxx(s).await,
            PrimitiveSummary::Identity(_)
            | PrimitiveSummary::Container(_)
            | PrimitiveSummary::StaticBinding(_)
            | PrimitiveSummary::Request(_) => Ok(()),
        }
    }

    /// Collect every staged candidate. Returns the summaries erased.
    async fn collect(&self) -> StoreResult<Vec<PrimitiveSummary>>;
}

/// One notification: something new happened at `notification` that the
/// holder of `subscription` cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Postcard {
    pub subscription: Ghid,
    pub notification: Ghid,
}

/// Receiver side of postman deliveries.
pub type PostcardStream = broadcast::Receiver<Postcard>;

/// Subscription notification scheduling.
#[async_trait]
pub trait Postman: Send + Sync {
    /// Schedule notifications caused by `obj` being stored, or erased when
    /// `removed` is set.
    async fn schedule(&self, obj: &PrimitiveSummary, removed: bool) -> StoreResult<()>;

    /// Receive every postcard scheduled from now on.
    fn subscribe(&self) -> PostcardStream;
}

/// Remote replication coordinator.
#[async_trait]
pub trait Salmonator: Send + Sync {
    /// Replicate a locally stored primitive upstream.
    async fn push(&self, ghid: &Ghid) -> StoreResult<()>;

    /// Fetch the upstream state of `ghid` as packed primitives, in an order
    /// that can be ingested front to back.
    async fn pull(&self, ghid: &Ghid) -> StoreResult<Vec<Vec<u8>>>;

    /// Ask remotes to notify us about `ghid`.
    async fn register(&self, ghid: &Ghid) -> StoreResult<()>;

    async fn deregister(&self, ghid: &Ghid) -> StoreResult<()>;
}
