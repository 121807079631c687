//! [`AorStore`] implementation over a CAS key/value store.

use async_trait::async_trait;
use sedge_core::AorStore;
use sedge_core::AorStoreError;
use sedge_core::Record;
use tracing::debug;
use tracing::warn;

use crate::codec;
use crate::kv::CasKeyValueStore;
use crate::kv::KvError;

/// Stores records as JSON strings in a [`CasKeyValueStore`], translating
/// versions and failure modes between the two boundaries.
pub struct JsonAorStore<S> {
    store: S,
}

impl<S: CasKeyValueStore> JsonAorStore<S> {
    /// Wrap a key/value store.
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: CasKeyValueStore> AorStore for JsonAorStore<S> {
    async fn get_aor(&self, aor_id: &str) -> Result<Option<Record>, AorStoreError> {
        let entry = match self.store.get(aor_id).await {
            Ok(entry) => entry,
            Err(KvError::CasFailed { key }) => {
                // Reads are unconditional; a CAS failure here is a backend bug.
                return Err(AorStoreError::Backend {
                    key,
                    reason: "unexpected compare-and-swap failure on read".to_string(),
                });
            }
            Err(KvError::Backend { reason }) => {
                return Err(AorStoreError::Backend {
                    key: aor_id.to_string(),
                    reason,
                });
            }
        };

        let Some(entry) = entry else {
            debug!(aor_id, "no stored record");
            return Ok(None);
        };

        match codec::deserialize_record(aor_id, &entry.data) {
            Ok(mut record) => {
                record.cas = entry.cas;
                Ok(Some(record))
            }
            Err(source) => {
                // Malformed data is its own signal, distinct from a backend
                // failure, even though callers handle both the same way.
                warn!(aor_id, error = %source, "stored record failed to decode");
                Err(AorStoreError::Malformed {
                    key: aor_id.to_string(),
                    source,
                })
            }
        }
    }

    async fn set_aor(&self, aor_id: &str, record: &mut Record, expires_at: i64) -> Result<(), AorStoreError> {
        let data = codec::serialize_record(record).map_err(|source| AorStoreError::Malformed {
            key: aor_id.to_string(),
            source,
        })?;

        match self.store.set(aor_id, data, record.cas, expires_at).await {
            Ok(new_cas) => {
                debug!(aor_id, cas = new_cas, expires_at, "record written");
                record.cas = new_cas;
                Ok(())
            }
            Err(KvError::CasFailed { key }) => Err(AorStoreError::Contention { key }),
            Err(KvError::Backend { reason }) => Err(AorStoreError::Backend {
                key: aor_id.to_string(),
                reason,
            }),
        }
    }
}
