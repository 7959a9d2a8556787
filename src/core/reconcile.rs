//! Membership reconciliation.
//!
//! ```text
//! observed ──┐
//!            ├── diff() ──► to_attach = desired ∖ observed
//! desired ───┘              to_detach = observed ∖ desired
//! ```
//!
//! Comparison is by `cluster_id` only (exact, case-sensitive). A cluster
//! present on both sides is left alone even when its `name` differs.

use crate::core::types::{ClusterRef, MemberSet};

/// Attach/detach pair that moves an observed membership to a desired one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub to_attach: MemberSet,
    pub to_detach: MemberSet,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.to_attach.is_empty() && self.to_detach.is_empty()
    }

    pub fn attach_ids(&self) -> Vec<String> {
        self.to_attach.cluster_ids()
    }

    pub fn detach_ids(&self) -> Vec<String> {
        self.to_detach.cluster_ids()
    }
}

/// Compute the membership diff between `observed` and `desired`.
pub fn diff(observed: &MemberSet, desired: &MemberSet) -> MembershipDiff {
    let to_attach = difference(desired, observed);
    let to_detach = difference(observed, desired);
    MembershipDiff {
        to_attach,
        to_detach,
    }
}

fn difference(left: &MemberSet, right: &MemberSet) -> MemberSet {
    left.iter()
        .filter(|c| !right.contains(&c.cluster_id))
        .cloned()
        .collect::<MemberSet>()
}

/// Membership after applying only the attach half of `diff` to `observed`.
pub fn after_attach(observed: &MemberSet, diff: &MembershipDiff) -> Vec<ClusterRef> {
    observed
        .iter()
        .chain(diff.to_attach.iter())
        .cloned()
        .collect::<MemberSet>()
        .into_refs()
}
