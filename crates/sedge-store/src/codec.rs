//! Record serialization to and from the stored JSON form.
//!
//! The stored layout keeps stable keys (`bindings`, `subscriptions`,
//! `associated-uris`, `notify_cseq`, `timer_id`, `scscf-uri`); unknown
//! fields are ignored on read so that newer writers do not break older
//! readers. The record's own URI and its version are carried by the store
//! key and the store itself, never by the serialized form.

use sedge_core::Record;

/// Serialize a record to its stored JSON form.
pub fn serialize_record(record: &Record) -> Result<String, serde_json::Error> {
    serde_json::to_string(record)
}

/// Deserialize a record from its stored JSON form. `aor_id` is the store
/// key; it becomes the record's own URI and the owning address of record
/// of every binding.
pub fn deserialize_record(aor_id: &str, data: &str) -> Result<Record, serde_json::Error> {
    let mut record: Record = serde_json::from_str(data)?;
    record.uri = aor_id.to_string();

    let binding_ids: Vec<String> = record.bindings().keys().cloned().collect();
    for id in binding_ids {
        record.get_binding(&id).address_of_record = aor_id.to_string();
    }

    Ok(record)
}
