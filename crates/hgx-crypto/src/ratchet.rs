//! Forward-only secret ratchet.
//!
//! Each dynamic frame's container is sealed under the secret derived from the
//! previous frame's secret and the previous frame's target:
//!
//! ```text
//! s[n+1] = ratchet(s[n], target[n])
//! ```
//!
//! Anyone holding `s[n]` and seeing the chain of targets can re-derive every
//! later secret; nobody can walk the chain backwards.

use hgx_types::Ghid;

use crate::cipher::{Secret, SECRET_LEN};

const RATCHET_DOMAIN: &[u8] = b"hgx-ratchet-v1";

/// Derive the secret that follows `prior`, whose container lives at
/// `current_target`.
pub fn ratchet(prior: &Secret, current_target: &Ghid) -> Secret {
    let mut hasher = blake3::Hasher::new_keyed(prior.key());
    hasher.update(RATCHET_DOMAIN);
    hasher.update(prior.nonce());
    hasher.update(current_target.as_bytes());

    let mut out = [0u8; SECRET_LEN];
    hasher.finalize_xof().fill(&mut out);
    let next = Secret::from_bytes(&out);
    zeroize::Zeroize::zeroize(&mut out);
    next
}

/// Ratchet `anchor` through a run of targets, oldest first.
///
/// `targets[0]` must be the target sealed under `anchor`; the result is the
/// secret for the container that follows `targets[targets.len() - 1]`.
pub fn ratchet_forward(anchor: &Secret, targets: &[Ghid]) -> Secret {
    targets
        .iter()
        .fold(anchor.clone(), |secret, target| ratchet(&secret, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(n: u8) -> Ghid {
        Ghid::from_hash([n; 32])
    }

    #[test]
    fn ratchet_changes_the_secret() {
        let root = Secret::generate();
        let next = ratchet(&root, &target(1));
        assert_ne!(root, next);
    }

    #[test]
    fn target_is_bound_into_the_derivation() {
        let root = Secret::generate();
        assert_ne!(ratchet(&root, &target(1)), ratchet(&root, &target(2)));
    }

    #[test]
    fn forward_matches_stepwise() {
        let root = Secret::generate();
        let stepwise = ratchet(&ratchet(&ratchet(&root, &target(1)), &target(2)), &target(3));
        let folded = ratchet_forward(&root, &[target(1), target(2), target(3)]);
        assert_eq!(stepwise, folded);
    }

    #[test]
    fn forward_over_nothing_is_identity() {
        let root = Secret::generate();
        assert_eq!(ratchet_forward(&root, &[]), root);
    }

    proptest::proptest! {
        #[test]
        fn ratchet_is_deterministic(key in proptest::array::uniform32(proptest::num::u8::ANY), tgt in proptest::array::uniform32(proptest::num::u8::ANY)) {
            let prior = Secret::from_parts(key, [7u8; 24]);
            let target = Ghid::from_hash(tgt);
            proptest::prop_assert_eq!(ratchet(&prior, &target), ratchet(&prior.clone(), &target));
        }
    }
}
