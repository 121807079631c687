//! Deterministic in-memory key/value store for tests and simulation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::kv::CasKeyValueStore;
use crate::kv::KvEntry;
use crate::kv::KvError;

/// A fault to inject into the store's next operation(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvFault {
    /// Every read and write reports a backend failure.
    Backend,
    /// Every conditional write reports a compare-and-swap conflict.
    Contention,
}

#[derive(Clone)]
struct StoredValue {
    data: String,
    cas: u64,
    expires_at: i64,
}

struct State {
    values: BTreeMap<String, StoredValue>,
    next_cas: u64,
    fault: Option<KvFault>,
}

/// In-memory [`CasKeyValueStore`] with predictable version numbering.
///
/// Mirrors the behavior of the production cache without network or disk
/// I/O: versions are issued from a single counter, `cas == 0` writes are
/// add-only, and mismatched versions fail with [`KvError::CasFailed`].
/// Expiry times are recorded (and inspectable) but entries are not
/// actively evicted; tests drive time explicitly.
pub struct DeterministicCasStore {
    state: Mutex<State>,
}

impl Default for DeterministicCasStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                values: BTreeMap::new(),
                next_cas: 0,
                fault: None,
            }),
        }
    }
}

impl DeterministicCasStore {
    /// Create a new store wrapped in an [`Arc`].
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Inject a fault into subsequent operations, or clear it with `None`.
    pub async fn set_fault(&self, fault: Option<KvFault>) {
        self.state.lock().await.fault = fault;
    }

    /// The recorded expiry time for `key`, if the key is present.
    pub async fn expires_at(&self, key: &str) -> Option<i64> {
        self.state.lock().await.values.get(key).map(|v| v.expires_at)
    }

    /// Number of keys held.
    pub async fn len(&self) -> usize {
        self.state.lock().await.values.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CasKeyValueStore for DeterministicCasStore {
    async fn get(&self, key: &str) -> Result<Option<KvEntry>, KvError> {
        let state = self.state.lock().await;
        if matches!(state.fault, Some(KvFault::Backend)) {
            return Err(KvError::Backend {
                reason: "injected backend fault".to_string(),
            });
        }

        Ok(state.values.get(key).map(|v| KvEntry {
            data: v.data.clone(),
            cas: v.cas,
        }))
    }

    async fn set(&self, key: &str, data: String, cas: u64, expires_at: i64) -> Result<u64, KvError> {
        let mut state = self.state.lock().await;
        match state.fault {
            Some(KvFault::Backend) => {
                return Err(KvError::Backend {
                    reason: "injected backend fault".to_string(),
                });
            }
            Some(KvFault::Contention) => {
                return Err(KvError::CasFailed { key: key.to_string() });
            }
            None => {}
        }

        let current = state.values.get(key).map(|v| v.cas).unwrap_or(0);
        if current != cas {
            return Err(KvError::CasFailed { key: key.to_string() });
        }

        state.next_cas += 1;
        let new_cas = state.next_cas;
        state.values.insert(key.to_string(), StoredValue {
            data,
            cas: new_cas,
            expires_at,
        });
        Ok(new_cas)
    }
}
