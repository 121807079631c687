//! Fixture builders shared by tests across the workspace.
//!
//! These construct plausibly populated bindings, subscriptions and records
//! without each test spelling out every field.

use crate::binding::Binding;
use crate::record::Record;
use crate::subscription::Subscription;

/// A binding for `uri` expiring at the given epoch time.
pub fn binding_expiring(uri: &str, expires: i64) -> Binding {
    let mut binding = Binding::new("sip:alice@example.com");
    binding.uri = uri.to_string();
    binding.cid = "gfYHoZGaFaRNxhlV0WIwoS".to_string();
    binding.cseq = 1;
    binding.expires = expires;
    binding.priority = 1000;
    binding
}

/// A subscription with the given to-tag expiring at the given epoch time.
pub fn subscription_expiring(to_tag: &str, expires: i64) -> Subscription {
    let mut subscription = Subscription::default();
    subscription.req_uri = "sip:alice@10.0.0.1".to_string();
    subscription.from_uri = "sip:watcher@example.com".to_string();
    subscription.from_tag = "from-tag".to_string();
    subscription.to_uri = "sip:alice@example.com".to_string();
    subscription.to_tag = to_tag.to_string();
    subscription.cid = "subscribe-cid".to_string();
    subscription.expires = expires;
    subscription
}

/// A record for `uri` holding one binding under id `b1` expiring at
/// `expires`.
pub fn record_with_binding(uri: &str, expires: i64) -> Record {
    let mut record = Record::new(uri);
    record.scscf_uri = "sip:scscf.example.com".to_string();
    record.associated_uris.add_uri(uri, false);
    *record.get_binding("b1") = binding_expiring("sip:alice@10.0.0.1:5060", expires);
    record
}
