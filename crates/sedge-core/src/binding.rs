//! A single registered contact endpoint.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

/// One registered contact for an address of record.
///
/// The binding id used to key bindings inside a record is supplied
/// externally and is often, but not always, the contact URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// The owning address of record, e.g. `sip:alice@example.com`. Not
    /// persisted; re-derived from the record key on load.
    #[serde(skip)]
    pub address_of_record: String,

    /// The registered contact URI, e.g.
    /// `sip:2125551212@192.168.0.1:55491;transport=TCP`.
    pub uri: String,

    /// The Call-ID of the registration. Per RFC 3261 this is the same for
    /// all registrations from a given UAC to this registrar.
    pub cid: String,

    /// CSeq of the REGISTER request that created or refreshed this binding.
    pub cseq: i32,

    /// Absolute expiry time, in seconds since the epoch.
    pub expires: i64,

    /// Contact q-value times 1000, used to prioritise bindings
    /// (highest first) per RFC 3261 s10.2.1.2.
    pub priority: i32,

    /// Any other Contact header parameters, e.g. `+sip.ice` -> ``.
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Path headers from the REGISTER, in order. The full header value,
    /// including display name and header parameters.
    #[serde(default)]
    pub path_headers: Vec<String>,

    /// The private identity this binding was registered with.
    #[serde(default)]
    pub private_id: String,

    /// Whether this is an emergency registration. Emergency bindings
    /// survive non-administrative clears.
    #[serde(rename = "emergency_reg", default)]
    pub emergency_registration: bool,
}

impl Binding {
    /// Create an empty binding owned by the given address of record.
    /// Everything else, including the contact URI, starts unset.
    pub fn new(address_of_record: impl Into<String>) -> Self {
        Self {
            address_of_record: address_of_record.into(),
            ..Self::default()
        }
    }
}
