//! Keeps the timer broker in step with a record's expiry state.

use std::collections::BTreeMap;
use std::sync::Arc;

use sedge_core::constants::MIN_TIMER_EXPIRY_SECONDS;
use sedge_core::constants::TAG_BIND;
use sedge_core::constants::TAG_REG;
use sedge_core::constants::TAG_SUB;
use sedge_core::Record;
use sedge_core::TimerService;
use tracing::debug;
use tracing::warn;

/// Drives the external timer broker after each successful local write.
/// Present only on the local site; sibling sites rely on the originating
/// site's timers.
///
/// Broker failures are logged and swallowed: a registration must never
/// fail because the timer broker is down. On failure the record keeps its
/// previous timer id, so a later write retries against the same timer.
pub struct TimerCoordinator {
    service: Arc<dyn TimerService>,
    callback_uri: String,
}

impl TimerCoordinator {
    /// Create a coordinator that calls `service` and points timers back at
    /// `callback_uri`.
    pub fn new(service: Arc<dyn TimerService>, callback_uri: impl Into<String>) -> Self {
        Self {
            service,
            callback_uri: callback_uri.into(),
        }
    }

    /// Bring the broker in line with `record` as written at `now`. On a
    /// successful exchange the broker's timer id is written into
    /// `record.timer_id`; persisting it is the caller's concern.
    pub async fn sync(&self, aor_id: &str, record: &mut Record, now: i64) {
        if record.is_empty() {
            // The record is going away; the store's TTL disposes of the
            // data, we just cancel the pending pop.
            if !record.timer_id.is_empty() {
                if let Err(e) = self.service.delete(&record.timer_id).await {
                    warn!(aor_id, timer_id = %record.timer_id, error = %e, "failed to delete broker timer");
                }
            }
            return;
        }

        let mut tags = BTreeMap::new();
        tags.insert(TAG_REG.to_string(), 1);
        tags.insert(TAG_BIND.to_string(), record.binding_count() as u32);
        tags.insert(TAG_SUB.to_string(), record.subscription_count() as u32);

        // A write can leave the earliest expiry already in the past; the
        // broker still needs a positive duration.
        let expiry = (record.next_expires() - now).max(MIN_TIMER_EXPIRY_SECONDS);

        let payload = serde_json::json!({ "aor_id": aor_id }).to_string();

        let result = if record.timer_id.is_empty() {
            self.service.create(&self.callback_uri, expiry, &tags, &payload).await
        } else {
            self.service
                .update(&record.timer_id, &self.callback_uri, expiry, &tags, &payload)
                .await
        };

        match result {
            Ok(timer_id) => {
                debug!(aor_id, timer_id = %timer_id, expiry, "broker timer synced");
                record.timer_id = timer_id;
            }
            Err(e) => {
                warn!(aor_id, error = %e, "broker timer sync failed; keeping previous timer id");
            }
        }
    }
}
