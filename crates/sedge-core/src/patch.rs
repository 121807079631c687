//! Partial updates to a registration record.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::associated_uris::AssociatedUris;
use crate::binding::Binding;
use crate::subscription::Subscription;

/// A partial update to a record: bindings and subscriptions to overwrite or
/// remove, an optional wholesale replacement of the associated URIs, and
/// the notify-CSeq policy.
///
/// The associated URIs field is an `Option` so that "leave untouched" and
/// "replace with an empty set" stay distinguishable.
///
/// The two CSeq fields serve different callers. A client asks for
/// `increment_cseq` because it cannot know the current value without racing
/// other writers. A site replicating a committed change instead sends
/// `minimum_cseq`, so that a sibling whose counter has drifted ahead keeps
/// its higher value and the two sites converge upward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Bindings to add or replace, keyed by binding id.
    #[serde(default)]
    pub update_bindings: BTreeMap<String, Binding>,

    /// Binding ids to remove. Ids with no matching binding are ignored.
    #[serde(default)]
    pub remove_bindings: Vec<String>,

    /// Subscriptions to add or replace, keyed by to-tag.
    #[serde(default)]
    pub update_subscriptions: BTreeMap<String, Subscription>,

    /// Subscription ids to remove. Ids with no match are ignored.
    #[serde(default)]
    pub remove_subscriptions: Vec<String>,

    /// Replacement associated URIs, applied wholesale when present.
    #[serde(default)]
    pub associated_uris: Option<AssociatedUris>,

    /// Floor for the record's notify-CSeq after this patch. Zero means no
    /// floor.
    #[serde(default)]
    pub minimum_cseq: u32,

    /// Whether to increment the record's notify-CSeq.
    #[serde(default)]
    pub increment_cseq: bool,
}

impl Patch {
    /// Derive the patch a site replicates to its siblings after committing
    /// this patch locally: same content, but the increment is replaced by a
    /// floor at the locally observed post-apply CSeq.
    pub fn for_replication(&self, committed_cseq: u32) -> Self {
        let mut patch = self.clone();
        patch.increment_cseq = false;
        patch.minimum_cseq = committed_cseq;
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replication_patch_floors_instead_of_incrementing() {
        let mut patch = Patch::default();
        patch.increment_cseq = true;
        patch.remove_bindings.push("b1".to_string());

        let derived = patch.for_replication(6);
        assert!(!derived.increment_cseq);
        assert_eq!(derived.minimum_cseq, 6);
        assert_eq!(derived.remove_bindings, vec!["b1".to_string()]);
        // The original is untouched.
        assert!(patch.increment_cseq);
    }

    #[test]
    fn absent_and_empty_associated_uris_differ() {
        let untouched = Patch::default();
        assert!(untouched.associated_uris.is_none());

        let mut cleared = Patch::default();
        cleared.associated_uris = Some(AssociatedUris::default());
        assert!(cleared.associated_uris.is_some());
        assert_ne!(untouched, cleared);
    }
}
