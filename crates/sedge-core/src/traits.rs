//! Service traits tying the record manager to its collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AorStoreError;
use crate::error::RegistrarError;
use crate::error::TimerServiceError;
use crate::patch::Patch;
use crate::record::Record;

/// The optimistic-concurrency backing store for registration records.
///
/// Writes are linearised per record by compare-and-swap on the record's
/// `cas`: a write either matches the stored version (and a fresh version is
/// issued) or fails with [`AorStoreError::Contention`]. A `cas` of zero
/// means "only if absent".
#[async_trait]
pub trait AorStore: Send + Sync {
    /// Fetch the record stored under `aor_id`, or `None` if the store has
    /// no entry. The returned record carries the store's current `cas`.
    async fn get_aor(&self, aor_id: &str) -> Result<Option<Record>, AorStoreError>;

    /// Write `record` under `aor_id`, keeping it until `expires_at`
    /// (seconds since the epoch). The write is conditional on
    /// `record.cas`; on success the fresh version is written back into
    /// `record.cas`.
    async fn set_aor(&self, aor_id: &str, record: &mut Record, expires_at: i64) -> Result<(), AorStoreError>;
}

#[async_trait]
impl<T: AorStore + ?Sized> AorStore for Arc<T> {
    async fn get_aor(&self, aor_id: &str) -> Result<Option<Record>, AorStoreError> {
        (**self).get_aor(aor_id).await
    }

    async fn set_aor(&self, aor_id: &str, record: &mut Record, expires_at: i64) -> Result<(), AorStoreError> {
        (**self).set_aor(aor_id, record, expires_at).await
    }
}

/// The capability one registration site exposes to its sibling sites (and
/// to its clients). In-process deployments and tests implement this
/// directly; production deployments put a network hop behind it.
#[async_trait]
pub trait RegistrarSite: Send + Sync {
    /// Identifier of this site, for logging.
    fn site_id(&self) -> &str;

    /// Fetch the record for a subscriber together with its version.
    async fn get(&self, aor_id: &str) -> Result<(Record, u64), RegistrarError>;

    /// Create the record for a subscriber. Fails with
    /// [`RegistrarError::AlreadyExists`] if the subscriber already has one.
    async fn put(&self, aor_id: &str, record: Record) -> Result<(), RegistrarError>;

    /// Apply a partial update and return the resulting record. Fails with
    /// [`RegistrarError::NotFound`] if the subscriber has no record.
    async fn patch(&self, aor_id: &str, patch: Patch) -> Result<Record, RegistrarError>;

    /// Sibling-originated delete: clear the record without a version
    /// check, retrying internally on contention. The caller does not act
    /// on the outcome.
    async fn delete_remote(&self, aor_id: &str) -> Result<(), RegistrarError>;
}

/// External one-shot timer broker. Each call carries the callback URI the
/// broker should invoke, the relative expiry, per-tag counts for the
/// broker's statistics, and an opaque payload returned verbatim when the
/// timer pops.
#[async_trait]
pub trait TimerService: Send + Sync {
    /// Create a timer; returns the broker-assigned timer id.
    async fn create(
        &self,
        callback_uri: &str,
        expiry_seconds: i64,
        tags: &BTreeMap<String, u32>,
        payload: &str,
    ) -> Result<String, TimerServiceError>;

    /// Update an existing timer; returns the (possibly re-assigned) timer
    /// id.
    async fn update(
        &self,
        timer_id: &str,
        callback_uri: &str,
        expiry_seconds: i64,
        tags: &BTreeMap<String, u32>,
        payload: &str,
    ) -> Result<String, TimerServiceError>;

    /// Delete a timer.
    async fn delete(&self, timer_id: &str) -> Result<(), TimerServiceError>;
}

/// Consumer of expiry notifications, registered with the local site after
/// construction. Pops are delivered on their own task, never inline on the
/// operation that detected the expiry.
#[async_trait]
pub trait TimerPopConsumer: Send + Sync {
    /// Handle the expiry of (part of) a subscriber's record. `trail_id`
    /// correlates the pop with the operation or callback that produced it.
    async fn handle_timer_pop(&self, aor_id: &str, trail_id: u64);
}
