use std::collections::HashMap;
use std::sync::Mutex;

use hgx_crypto::Secret;
use hgx_types::Ghid;
use tracing::debug;

use crate::error::{PrivateerError, PrivateerResult};

#[derive(Default)]
struct Tiers {
    staging: HashMap<Ghid, Secret>,
    persistent: HashMap<Ghid, Secret>,
}

/// Address -> secret cache with stage/commit/abandon semantics.
///
/// The internal lock guards the two maps only. Callers serialize
/// multi-step transactions on the same address themselves.
pub struct Privateer {
    tiers: Mutex<Tiers>,
}

impl Privateer {
    pub fn new() -> Self {
        Self {
            tiers: Mutex::new(Tiers::default()),
        }
    }

    /// Secret for `ghid`, staged first, then committed.
    pub fn get(&self, ghid: &Ghid) -> PrivateerResult<Secret> {
        let tiers = self.tiers.lock().expect("lock poisoned");
        tiers
            .staging
            .get(ghid)
            .or_else(|| tiers.persistent.get(ghid))
            .cloned()
            .ok_or(PrivateerError::NotFound(*ghid))
    }

    /// Whether either tier holds `ghid`.
    pub fn contains(&self, ghid: &Ghid) -> bool {
        let tiers = self.tiers.lock().expect("lock poisoned");
        tiers.staging.contains_key(ghid) || tiers.persistent.contains_key(ghid)
    }

    /// Whether `ghid` is committed.
    pub fn is_committed(&self, ghid: &Ghid) -> bool {
        self.tiers
            .lock()
            .expect("lock poisoned")
            .persistent
            .contains_key(ghid)
    }

    /// Tentatively record a secret. Restaging the same secret is a no-op.
    ///
    /// A secret that differs from the one in either tier is a `Conflict`.
    pub fn stage(&self, ghid: Ghid, secret: Secret) -> PrivateerResult<()> {
        let mut tiers = self.tiers.lock().expect("lock poisoned");
        let existing = tiers
            .staging
            .get(&ghid)
            .or_else(|| tiers.persistent.get(&ghid));
        match existing {
            Some(existing) if *existing != secret => Err(PrivateerError::Conflict(ghid)),
            Some(_) => Ok(()),
            None => {
                tiers.staging.insert(ghid, secret);
                Ok(())
            }
        }
    }

    /// Remove and return the staged secret.
    pub fn unstage(&self, ghid: &Ghid) -> PrivateerResult<Secret> {
        self.tiers
            .lock()
            .expect("lock poisoned")
            .staging
            .remove(ghid)
            .ok_or(PrivateerError::NotFound(*ghid))
    }

    /// Promote the staged secret to the committed tier.
    ///
    /// Already-committed addresses only check that any restaged value
    /// matches; on mismatch the staged value is left in place.
    pub fn commit(&self, ghid: &Ghid) -> PrivateerResult<()> {
        let mut tiers = self.tiers.lock().expect("lock poisoned");
        let tiers = &mut *tiers;
        if let Some(committed) = tiers.persistent.get(ghid) {
            if let Some(staged) = tiers.staging.get(ghid) {
                if staged != committed {
                    return Err(PrivateerError::Conflict(*ghid));
                }
                tiers.staging.remove(ghid);
            }
            return Ok(());
        }

        let secret = tiers
            .staging
            .remove(ghid)
            .ok_or(PrivateerError::NotFound(*ghid))?;
        tiers.persistent.insert(*ghid, secret);
        debug!(ghid = %ghid, "secret committed");
        Ok(())
    }

    /// Remove `ghid` from both tiers.
    ///
    /// With `quiet` set a missing secret is ignored; otherwise it is
    /// `NotFound` when neither tier held it.
    pub fn abandon(&self, ghid: &Ghid, quiet: bool) -> PrivateerResult<()> {
        let mut tiers = self.tiers.lock().expect("lock poisoned");
        let staged = tiers.staging.remove(ghid).is_some();
        let committed = tiers.persistent.remove(ghid).is_some();
        if !staged && !committed {
            debug!(ghid = %ghid, "abandoning a secret that was never held");
            if !quiet {
                return Err(PrivateerError::NotFound(*ghid));
            }
        }
        Ok(())
    }
}

impl Default for Privateer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Privateer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tiers = self.tiers.lock().expect("lock poisoned");
        f.debug_struct("Privateer")
            .field("staged", &tiers.staging.len())
            .field("committed", &tiers.persistent.len())
            .finish()
    }
}
