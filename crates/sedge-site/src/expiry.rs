//! Dispatches expiry notifications to the registered consumer.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use sedge_core::Record;
use sedge_core::TimerPopConsumer;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::warn;

/// Hands timer pops to the consumer registered with the local site.
///
/// Pops are always delivered on a freshly spawned task so a pop raised in
/// the middle of a write can never re-enter the site manager on the task
/// that is still executing the write.
#[derive(Default)]
pub struct ExpiryDispatcher {
    consumer: RwLock<Option<Arc<dyn TimerPopConsumer>>>,
    next_trail: AtomicU64,
}

impl ExpiryDispatcher {
    /// Create a dispatcher with no consumer registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the consumer. The consumer is late-bound: the site manager
    /// is constructed first and the consumer attached once it exists.
    pub async fn register(&self, consumer: Arc<dyn TimerPopConsumer>) {
        *self.consumer.write().await = Some(consumer);
    }

    /// Deliver a timer pop for `aor_id` on its own task. Returns the trail
    /// id assigned to the dispatch.
    pub async fn dispatch(&self, aor_id: &str) -> u64 {
        let trail_id = self.next_trail.fetch_add(1, Ordering::Relaxed) + 1;

        let Some(consumer) = self.consumer.read().await.clone() else {
            warn!(aor_id, trail_id, "no timer pop consumer registered; dropping pop");
            return trail_id;
        };

        let aor_id = aor_id.to_string();
        tokio::spawn(async move {
            consumer.handle_timer_pop(&aor_id, trail_id).await;
        });
        trail_id
    }

    /// Raise a synthetic pop if a write has left the record with at least
    /// one binding already past its expiry. Covers the window where a
    /// patch produces an elapsed binding the broker has not fired on yet.
    pub async fn dispatch_if_elapsed(&self, aor_id: &str, record: &Record, now: i64) {
        if record.binding_count() > 0 && record.next_expires() <= now {
            debug!(aor_id, next_expires = record.next_expires(), now, "write left elapsed entries; raising synthetic pop");
            self.dispatch(aor_id).await;
        }
    }
}
