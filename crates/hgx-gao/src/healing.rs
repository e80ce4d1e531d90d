//! Ratchet healing: recovering the secret of a frame whose predecessors
//! were never seen locally.

use hgx_crypto::{ratchet_forward, Secret};
use hgx_privateer::Privateer;
use hgx_store::{Librarian, StoreError};
use hgx_types::{DynamicBindingSummary, Ghid, PrimitiveSummary};
use tracing::debug;

use crate::error::{GaoError, GaoResult};
use crate::history::History;

/// Secret for the container targeted by `binding`.
///
/// Walks the frame's declared history back to the newest frame whose
/// container secret is held, then ratchets forward through every target in
/// between. Targets come from local history where recorded, otherwise from
/// the librarian's summary of the superseded frame.
pub async fn heal(
    privateer: &Privateer,
    librarian: &dyn Librarian,
    local: &History,
    binding: &DynamicBindingSummary,
) -> GaoResult<Secret> {
    if let Ok(secret) = privateer.get(&binding.target) {
        return Ok(secret);
    }

    let mut targets = Vec::new();
    for frame in &binding.history {
        let target = match local.target_of(frame) {
            Some(target) => target,
            None => frame_target(librarian, frame).await?.ok_or(GaoError::Ratchet {
                ghid: binding.ghid,
                frame: binding.frame,
            })?,
        };
        targets.push(target);

        if let Ok(anchor) = privateer.get(&target) {
            targets.reverse();
            debug!(
                ghid = %binding.ghid,
                frame = %binding.frame,
                steps = targets.len(),
                "ratchet healed"
            );
            return Ok(ratchet_forward(&anchor, &targets));
        }
    }

    Err(GaoError::Ratchet {
        ghid: binding.ghid,
        frame: binding.frame,
    })
}

async fn frame_target(librarian: &dyn Librarian, frame: &Ghid) -> GaoResult<Option<Ghid>> {
    match librarian.summarize(frame).await {
        Ok(PrimitiveSummary::DynamicBinding(summary)) => Ok(Some(summary.target)),
        Ok(_) | Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
