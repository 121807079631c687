//! The registration record for one address of record.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::associated_uris::AssociatedUris;
use crate::binding::Binding;
use crate::patch::Patch;
use crate::subscription::Subscription;

fn initial_notify_cseq() -> u32 {
    1
}

/// Everything the registrar holds for one subscriber, keyed in the backing
/// store by the subscriber's default public identity.
///
/// Bindings and subscriptions are owned exclusively by the record; cloning
/// a record deep-copies both collections. The `cas` field belongs to the
/// store boundary: it is zero until the record has been written, and only
/// store code assigns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    bindings: BTreeMap<String, Binding>,

    #[serde(default)]
    subscriptions: BTreeMap<String, Subscription>,

    /// The subscriber's associated identity set.
    #[serde(rename = "associated-uris", default)]
    pub associated_uris: AssociatedUris,

    /// CSeq for event notifications on this record. Initialised to one when
    /// the record is first created and never decreased. The same CSeq is
    /// advertised on every active subscription; there is no requirement
    /// that the first NOTIFY of a dialog carries CSeq 1.
    #[serde(default = "initial_notify_cseq")]
    pub notify_cseq: u32,

    /// Timer broker id for this record's expiry timer. Empty until the
    /// broker first assigns one; only timer coordination may change it.
    #[serde(default)]
    pub timer_id: String,

    /// S-CSCF URI serving this registration. Set at creation and fixed for
    /// the lifetime of the registration.
    #[serde(rename = "scscf-uri", default)]
    pub scscf_uri: String,

    /// The subscriber's own SIP URI. Supplied by the store key, not the
    /// stored form.
    #[serde(skip)]
    pub uri: String,

    /// Store version of this record. Zero for a record that has never been
    /// written. Assigned only at the store boundary.
    #[serde(skip)]
    pub cas: u64,
}

impl Default for Record {
    fn default() -> Self {
        Self::new("")
    }
}

impl Record {
    /// Create an empty record for the given SIP URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            bindings: BTreeMap::new(),
            subscriptions: BTreeMap::new(),
            associated_uris: AssociatedUris::default(),
            notify_cseq: 1,
            timer_id: String::new(),
            scscf_uri: String::new(),
            uri: uri.into(),
            cas: 0,
        }
    }

    /// Retrieve a binding by id, creating a completely empty one (even the
    /// contact URI) if there is none.
    pub fn get_binding(&mut self, binding_id: &str) -> &mut Binding {
        let aor = self.uri.clone();
        self.bindings
            .entry(binding_id.to_string())
            .or_insert_with(|| Binding::new(aor))
    }

    /// Remove the binding with the given id, if any.
    pub fn remove_binding(&mut self, binding_id: &str) {
        self.bindings.remove(binding_id);
    }

    /// Retrieve a subscription by to-tag, creating an empty one if there is
    /// none.
    pub fn get_subscription(&mut self, to_tag: &str) -> &mut Subscription {
        self.subscriptions.entry(to_tag.to_string()).or_default()
    }

    /// Remove the subscription with the given to-tag, if any.
    pub fn remove_subscription(&mut self, to_tag: &str) {
        self.subscriptions.remove(to_tag);
    }

    /// Remove every subscription. A record with no bindings must not carry
    /// subscriptions at rest; the write path enforces this.
    pub fn clear_subscriptions(&mut self) {
        self.subscriptions.clear();
    }

    /// All bindings, keyed by binding id.
    pub fn bindings(&self) -> &BTreeMap<String, Binding> {
        &self.bindings
    }

    /// All subscriptions, keyed by to-tag.
    pub fn subscriptions(&self) -> &BTreeMap<String, Subscription> {
        &self.subscriptions
    }

    /// Number of bindings on the record.
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of subscriptions on the record.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the record holds no bindings. A record with no bindings is
    /// treated as absent by readers.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The earliest expiry over all bindings and subscriptions, or zero on
    /// an empty record. Live entries carry positive epoch times, so zero
    /// unambiguously means "nothing to expire".
    pub fn next_expires(&self) -> i64 {
        self.expiry_times().min().unwrap_or(0)
    }

    /// The latest expiry over all bindings and subscriptions, or zero on an
    /// empty record.
    pub fn last_expires(&self) -> i64 {
        self.expiry_times().max().unwrap_or(0)
    }

    fn expiry_times(&self) -> impl Iterator<Item = i64> + '_ {
        self.bindings
            .values()
            .map(|b| b.expires)
            .chain(self.subscriptions.values().map(|s| s.expires))
    }

    /// Remove subscriptions and associated URIs, and all bindings unless
    /// `clear_emergency` is false, in which case emergency registrations
    /// survive.
    pub fn clear(&mut self, clear_emergency: bool) {
        if clear_emergency {
            self.bindings.clear();
        } else {
            self.bindings.retain(|_, b| b.emergency_registration);
        }
        self.subscriptions.clear();
        self.associated_uris.clear();
    }

    /// Copy every site-agnostic field from `other` into this record: deep
    /// copies of its bindings and subscriptions, the associated URIs, the
    /// notify-CSeq, timer id, URI and S-CSCF URI. The `cas` is left alone,
    /// and entries present here but absent from `other` are preserved.
    /// Used when seeding a local site from a remote one.
    pub fn copy_from(&mut self, other: &Record) {
        for (id, binding) in &other.bindings {
            self.bindings.insert(id.clone(), binding.clone());
        }
        for (id, subscription) in &other.subscriptions {
            self.subscriptions.insert(id.clone(), subscription.clone());
        }
        self.associated_uris = other.associated_uris.clone();
        self.notify_cseq = other.notify_cseq;
        self.timer_id = other.timer_id.clone();
        self.uri = other.uri.clone();
        self.scscf_uri = other.scscf_uri.clone();
    }

    /// Apply a partial update: binding updates then removes, subscription
    /// updates then removes, associated-URI replacement, CSeq increment,
    /// CSeq floor — in that order. The timer id, S-CSCF URI and own URI are
    /// never touched by a patch.
    pub fn apply_patch(&mut self, patch: &Patch) {
        for (id, binding) in &patch.update_bindings {
            self.bindings.insert(id.clone(), binding.clone());
        }
        for id in &patch.remove_bindings {
            self.bindings.remove(id);
        }

        for (id, subscription) in &patch.update_subscriptions {
            self.subscriptions.insert(id.clone(), subscription.clone());
        }
        for id in &patch.remove_subscriptions {
            self.subscriptions.remove(id);
        }

        if let Some(uris) = &patch.associated_uris {
            self.associated_uris = uris.clone();
        }

        if patch.increment_cseq {
            self.notify_cseq += 1;
        }

        if patch.minimum_cseq > 0 && self.notify_cseq < patch.minimum_cseq {
            self.notify_cseq = patch.minimum_cseq;
        }
    }

    /// Project this record into a patch that, applied elsewhere, recreates
    /// its bindings, subscriptions and associated URIs, and floors the
    /// CSeq at this record's value. Used when a cross-site create has to be
    /// downgraded to an update. The reverse projection does not exist:
    /// a patch alone cannot reconstruct a record.
    pub fn to_patch(&self) -> Patch {
        Patch {
            update_bindings: self.bindings.clone(),
            remove_bindings: Vec::new(),
            update_subscriptions: self.subscriptions.clone(),
            remove_subscriptions: Vec::new(),
            associated_uris: Some(self.associated_uris.clone()),
            minimum_cseq: self.notify_cseq,
            increment_cseq: false,
        }
    }
}
