//! A subscription to registration events for an address of record.

use serde::Deserialize;
use serde::Serialize;

/// One event-subscription dialog watching an address of record.
///
/// Subscriptions are keyed inside a record by the dialog's to-tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Contact URI of the subscription dialog, used as the request URI of
    /// outgoing NOTIFYs.
    pub req_uri: String,

    /// From URI of the subscription dialog.
    pub from_uri: String,

    /// From tag of the subscription dialog.
    pub from_tag: String,

    /// To URI of the subscription dialog.
    pub to_uri: String,

    /// To tag of the subscription dialog. Doubles as the subscription id.
    pub to_tag: String,

    /// Call-ID of the subscription dialog.
    pub cid: String,

    /// Whether the subscription has been refreshed since the last NOTIFY.
    /// In-memory state only; never persisted.
    #[serde(skip)]
    pub refreshed: bool,

    /// Record-Route URIs from the subscription dialog, in order.
    #[serde(rename = "routes", default)]
    pub route_uris: Vec<String>,

    /// Absolute expiry time, in seconds since the epoch.
    pub expires: i64,
}

impl Subscription {
    /// The id this subscription is keyed by.
    pub fn id(&self) -> &str {
        &self.to_tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refreshed_flag_not_serialized() {
        let mut s = Subscription::default();
        s.to_tag = "tag-1".to_string();
        s.refreshed = true;

        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("refreshed").is_none());

        let back: Subscription = serde_json::from_value(json).unwrap();
        assert!(!back.refreshed);
        assert_eq!(back.to_tag, "tag-1");
    }

    #[test]
    fn routes_key_round_trips() {
        let mut s = Subscription::default();
        s.route_uris = vec!["sip:edge-1".to_string(), "sip:edge-2".to_string()];

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["routes"][0], "sip:edge-1");

        let back: Subscription = serde_json::from_value(json).unwrap();
        assert_eq!(back.route_uris.len(), 2);
    }
}
