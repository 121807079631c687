//! The set of identities associated with a subscriber.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

/// The identity set of an implicit registration set: the associated URIs,
/// their barring state, and any mappings from distinct identities to the
/// wildcard identity they matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AssociatedUrisWire", into = "AssociatedUrisWire")]
pub struct AssociatedUris {
    /// Associated URIs, in the order the HSS listed them.
    uris: Vec<String>,
    /// URI -> barred. May contain entries for URIs that are not in the
    /// associated list (non-distinct identities with explicit barring).
    barring: BTreeMap<String, bool>,
    /// Distinct identity -> the wildcard identity it belongs to.
    wildcard_map: BTreeMap<String, String>,
}

impl AssociatedUris {
    /// Add a URI and its barring state to the set.
    pub fn add_uri(&mut self, uri: impl Into<String>, barred: bool) {
        let uri = uri.into();
        self.barring.insert(uri.clone(), barred);
        self.uris.push(uri);
    }

    /// Record the barring state of a URI without adding it to the list.
    pub fn add_barring_status(&mut self, uri: impl Into<String>, barred: bool) {
        self.barring.insert(uri.into(), barred);
    }

    /// Link a distinct identity to the wildcard it matched.
    pub fn add_wildcard_mapping(&mut self, wildcard: impl Into<String>, distinct: impl Into<String>) {
        self.wildcard_map.insert(distinct.into(), wildcard.into());
    }

    /// Whether the URI is in the associated list.
    pub fn contains_uri(&self, uri: &str) -> bool {
        self.uris.iter().any(|u| u == uri)
    }

    /// The default identity: the first unbarred URI, or for emergency
    /// processing only, the first URI regardless of barring.
    pub fn default_impu(&self, emergency: bool) -> Option<&str> {
        if let Some(uri) = self.uris.iter().find(|u| !self.barred(u)) {
            return Some(uri);
        }
        if emergency {
            return self.uris.first().map(String::as_str);
        }
        None
    }

    /// Whether the URI is barred, resolving through the wildcard map when
    /// the URI itself has no explicit barring entry. Unknown URIs are
    /// treated as unbarred.
    pub fn barred(&self, uri: &str) -> bool {
        let lookup = self.wildcard_map.get(uri).map(String::as_str).unwrap_or(uri);
        self.barring.get(lookup).copied().unwrap_or(false)
    }

    /// All associated URIs, in order.
    pub fn all_uris(&self) -> &[String] {
        &self.uris
    }

    /// The unbarred associated URIs, in order.
    pub fn unbarred_uris(&self) -> Vec<&str> {
        self.uris.iter().filter(|u| !self.barred(u)).map(String::as_str).collect()
    }

    /// The barred associated URIs, in order.
    pub fn barred_uris(&self) -> Vec<&str> {
        self.uris.iter().filter(|u| self.barred(u)).map(String::as_str).collect()
    }

    /// The distinct-to-wildcard mappings.
    pub fn wildcard_mappings(&self) -> &BTreeMap<String, String> {
        &self.wildcard_map
    }

    /// Remove every URI, barring entry and wildcard mapping.
    pub fn clear(&mut self) {
        self.uris.clear();
        self.barring.clear();
        self.wildcard_map.clear();
    }

    /// Whether the set holds no URIs.
    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

/// Stored form:
/// `{"uris": [{"uri": ..., "barring": ...}, ...],
///   "wildcard-mapping": {"distinct": ..., "wildcard": ...}}`
///
/// At most one wildcard pair is carried on the wire; the in-memory map may
/// hold more, and only the first survives a store round trip.
#[derive(Serialize, Deserialize)]
struct AssociatedUrisWire {
    #[serde(default)]
    uris: Vec<UriEntry>,
    #[serde(rename = "wildcard-mapping", default)]
    wildcard_mapping: WildcardMappingWire,
}

#[derive(Serialize, Deserialize)]
struct UriEntry {
    uri: String,
    barring: bool,
}

#[derive(Serialize, Deserialize, Default)]
struct WildcardMappingWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    distinct: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wildcard: Option<String>,
}

impl From<AssociatedUrisWire> for AssociatedUris {
    fn from(wire: AssociatedUrisWire) -> Self {
        let mut uris = AssociatedUris::default();
        for entry in wire.uris {
            uris.add_uri(entry.uri, entry.barring);
        }
        if let (Some(distinct), Some(wildcard)) = (wire.wildcard_mapping.distinct, wire.wildcard_mapping.wildcard) {
            uris.add_wildcard_mapping(wildcard, distinct);
        }
        uris
    }
}

impl From<AssociatedUris> for AssociatedUrisWire {
    fn from(uris: AssociatedUris) -> Self {
        let entries = uris
            .uris
            .iter()
            .map(|u| UriEntry {
                uri: u.clone(),
                barring: uris.barred(u),
            })
            .collect();

        let first = uris.wildcard_map.iter().next();
        AssociatedUrisWire {
            uris: entries,
            wildcard_mapping: WildcardMappingWire {
                distinct: first.map(|(d, _)| d.clone()),
                wildcard: first.map(|(_, w)| w.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_impu_prefers_unbarred() {
        let mut uris = AssociatedUris::default();
        uris.add_uri("sip:barred@example.com", true);
        uris.add_uri("sip:open@example.com", false);

        assert_eq!(uris.default_impu(false), Some("sip:open@example.com"));
    }

    #[test]
    fn default_impu_all_barred() {
        let mut uris = AssociatedUris::default();
        uris.add_uri("sip:barred@example.com", true);

        assert_eq!(uris.default_impu(false), None);
        assert_eq!(uris.default_impu(true), Some("sip:barred@example.com"));
    }

    #[test]
    fn barring_resolves_through_wildcard() {
        let mut uris = AssociatedUris::default();
        uris.add_uri("sip:!.*!@example.com", true);
        uris.add_wildcard_mapping("sip:!.*!@example.com", "sip:alice@example.com");

        assert!(uris.barred("sip:alice@example.com"));
        assert!(!uris.barred("sip:unknown@example.com"));
    }

    #[test]
    fn wire_round_trip() {
        let mut uris = AssociatedUris::default();
        uris.add_uri("sip:alice@example.com", false);
        uris.add_uri("sip:bob@example.com", true);
        uris.add_wildcard_mapping("sip:!.*!@example.com", "sip:carol@example.com");

        let json = serde_json::to_value(&uris).unwrap();
        assert_eq!(json["uris"][0]["uri"], "sip:alice@example.com");
        assert_eq!(json["uris"][1]["barring"], true);
        assert_eq!(json["wildcard-mapping"]["distinct"], "sip:carol@example.com");

        let back: AssociatedUris = serde_json::from_value(json).unwrap();
        assert_eq!(back, uris);
    }

    #[test]
    fn empty_wildcard_mapping_tolerated() {
        let back: AssociatedUris =
            serde_json::from_str(r#"{"uris": [], "wildcard-mapping": {}}"#).unwrap();
        assert!(back.is_empty());
    }
}
