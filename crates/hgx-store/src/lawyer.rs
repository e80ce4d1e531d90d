use std::sync::Arc;

use async_trait::async_trait;
use hgx_types::{
    ContainerSummary, DebindingSummary, DynamicBindingSummary, Ghid, PrimitiveSummary,
    RequestSummary, StaticBindingSummary,
};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{Librarian, Lawyer};

/// Authorship checks backed by the librarian.
///
/// - Every author must be a stored identity.
/// - Every frame of a dynamic binding must come from its first binder.
/// - A debinding must come from whoever authored (or received) its target.
pub struct MemoryLawyer {
    librarian: Arc<dyn Librarian>,
}

impl MemoryLawyer {
    pub fn new(librarian: Arc<dyn Librarian>) -> Self {
        Self { librarian }
    }

    async fn validate_author(&self, author: &Ghid) -> StoreResult<()> {
        match self.librarian.summarize(author).await {
            Ok(PrimitiveSummary::Identity(_)) => Ok(()),
            Ok(_) | Err(StoreError::NotFound(_)) => Err(StoreError::UnknownIdentity(*author)),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Lawyer for MemoryLawyer {
    async fn validate_geoc(&self, obj: &ContainerSummary) -> StoreResult<()> {
        self.validate_author(&obj.author).await
    }

    async fn validate_gobs(&self, obj: &StaticBindingSummary) -> StoreResult<()> {
        self.validate_author(&obj.author).await
    }

    async fn validate_gobd(&self, obj: &DynamicBindingSummary) -> StoreResult<()> {
        self.validate_author(&obj.author).await?;
        match self.librarian.summarize(&obj.ghid).await {
            Ok(existing) => match existing.author() {
                Some(expected) if expected != obj.author => Err(StoreError::InconsistentAuthor {
                    ghid: obj.ghid,
                    expected,
                    found: obj.author,
                }),
                _ => Ok(()),
            },
            Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn validate_gdxx(&self, obj: &DebindingSummary) -> StoreResult<()> {
        self.validate_author(&obj.author).await?;
        let target = match self.librarian.summarize(&obj.target).await {
            Ok(target) => target,
            Err(StoreError::NotFound(_)) => {
                debug!(ghid = %obj.ghid, target = %obj.target, "debinding target unknown to lawyer");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let expected = match &target {
            PrimitiveSummary::Request(request) => Some(request.recipient),
            other => other.author(),
        };
        match expected {
            Some(expected) if expected != obj.author => Err(StoreError::InconsistentAuthor {
                ghid: obj.ghid,
                expected,
                found: obj.author,
            }),
            _ => Ok(()),
        }
    }

    async fn validate_garq(&self, obj: &RequestSummary) -> StoreResult<()> {
        self.validate_author(&obj.recipient).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::librarian::MemoryLibrarian;
    use hgx_types::IdentitySummary;

    fn g(n: u8) -> Ghid {
        Ghid::from_hash([n; 32])
    }

    async fn setup() -> (Arc<MemoryLibrarian>, MemoryLawyer) {
        let lib = Arc::new(MemoryLibrarian::new());
        for id in [1u8, 2] {
            let identity: PrimitiveSummary = IdentitySummary {
                ghid: g(id),
                signature_key: [id; 32],
            }
            .into();
            lib.store(identity, vec![id]).await.unwrap();
        }
        let lawyer = MemoryLawyer::new(lib.clone());
        (lib, lawyer)
    }

    #[tokio::test]
    async fn unknown_author_rejected() {
        let (_lib, lawyer) = setup().await;
        let geoc = ContainerSummary {
            ghid: g(10),
            author: g(9),
        };
        assert_eq!(
            lawyer.validate_geoc(&geoc).await.unwrap_err(),
            StoreError::UnknownIdentity(g(9))
        );
    }

    #[tokio::test]
    async fn frames_must_keep_their_binder() {
        let (lib, lawyer) = setup().await;
        let first = DynamicBindingSummary {
            ghid: g(50),
            author: g(1),
            target: g(10),
            frame: g(60),
            history: vec![],
        };
        lawyer.validate_gobd(&first).await.unwrap();
        lib.store(first.clone().into(), vec![0]).await.unwrap();

        let hijack = DynamicBindingSummary {
            author: g(2),
            frame: g(61),
            history: vec![g(60)],
            ..first
        };
        assert!(matches!(
            lawyer.validate_gobd(&hijack).await,
            Err(StoreError::InconsistentAuthor { .. })
        ));
    }

    #[tokio::test]
    async fn debinding_must_match_target_author() {
        let (lib, lawyer) = setup().await;
        let binding: PrimitiveSummary = StaticBindingSummary {
            ghid: g(20),
            author: g(1),
            target: g(10),
        }
        .into();
        lib.store(binding, vec![0]).await.unwrap();

        let own = DebindingSummary {
            ghid: g(30),
            author: g(1),
            target: g(20),
        };
        lawyer.validate_gdxx(&own).await.unwrap();

        let foreign = DebindingSummary {
            author: g(2),
            ..own
        };
        assert!(lawyer.validate_gdxx(&foreign).await.is_err());
    }

    #[tokio::test]
    async fn request_recipient_must_be_known() {
        let (_lib, lawyer) = setup().await;
        let ok = RequestSummary {
            ghid: g(40),
            recipient: g(2),
        };
        lawyer.validate_garq(&ok).await.unwrap();
        let unknown = RequestSummary {
            recipient: g(3),
            ..ok
        };
        assert!(lawyer.validate_garq(&unknown).await.is_err());
    }
}
