//! The raw compare-and-swap key/value boundary.

use std::sync::Arc;

use async_trait::async_trait;
use snafu::Snafu;

/// Errors from the raw key/value store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum KvError {
    /// The conditional write lost the compare-and-swap race.
    #[snafu(display("compare-and-swap failed on '{key}'"))]
    CasFailed {
        /// Key being written.
        key: String,
    },

    /// Transport or backend failure.
    #[snafu(display("key/value backend failure: {reason}"))]
    Backend {
        /// Description of the failure.
        reason: String,
    },
}

/// A stored value together with its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    /// The stored bytes, as a UTF-8 string.
    pub data: String,
    /// Version issued by the store for this value. Never zero.
    pub cas: u64,
}

/// A key/value store with per-key optimistic concurrency, in the style of
/// a memcached-class cache with CAS support.
///
/// Every successful `set` issues a fresh, monotonically increasing version
/// for the key. Writing with `cas == 0` means "add only if absent".
/// Entries are evicted once `expires_at` (epoch seconds) has passed.
#[async_trait]
pub trait CasKeyValueStore: Send + Sync {
    /// Read the entry stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<KvEntry>, KvError>;

    /// Conditionally write `data` under `key`. The write succeeds only if
    /// the stored version still equals `cas` (or the key is absent and
    /// `cas` is zero). Returns the newly issued version.
    async fn set(&self, key: &str, data: String, cas: u64, expires_at: i64) -> Result<u64, KvError>;
}

#[async_trait]
impl<T: CasKeyValueStore + ?Sized> CasKeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<KvEntry>, KvError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, data: String, cas: u64, expires_at: i64) -> Result<u64, KvError> {
        (**self).set(key, data, cas, expires_at).await
    }
}
