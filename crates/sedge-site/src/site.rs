//! The per-site record manager.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use sedge_core::now_epoch_seconds;
use sedge_core::AorStore;
use sedge_core::AorStoreError;
use sedge_core::Patch;
use sedge_core::Record;
use sedge_core::RegistrarError;
use sedge_core::RegistrarResult;
use sedge_core::RegistrarSite;
use sedge_core::TimerPopConsumer;
use sedge_core::TimerService;
use tracing::debug;
use tracing::warn;

use crate::config::SiteConfig;
use crate::expiry::ExpiryDispatcher;
use crate::timers::TimerCoordinator;

/// One site's view of the replicated registration store.
///
/// The local site's manager holds the sibling managers of the other sites
/// and replicates committed changes to them best-effort; a sibling's
/// outcome never changes what the client sees. Sibling managers are
/// constructed with no siblings and no timer coordination of their own.
///
/// All operations run read-modify-write under the backing store's
/// compare-and-swap: at most one concurrent write per record version wins
/// and the losers retry against a fresh read, within a configurable retry
/// budget.
pub struct SiteManager {
    config: SiteConfig,
    store: Arc<dyn AorStore>,
    siblings: Vec<Arc<dyn RegistrarSite>>,
    timers: Option<TimerCoordinator>,
    expiry: ExpiryDispatcher,
}

impl SiteManager {
    /// Create the local site's manager. `siblings` are tried in order for
    /// reads of locally missing subscribers and receive every committed
    /// change; `timer_service` is driven after each successful write.
    pub fn local(
        config: SiteConfig,
        store: Arc<dyn AorStore>,
        siblings: Vec<Arc<dyn RegistrarSite>>,
        timer_service: Arc<dyn TimerService>,
    ) -> Arc<Self> {
        let timers = TimerCoordinator::new(timer_service, config.timer_callback_uri.clone());
        Arc::new(Self {
            config,
            store,
            siblings,
            timers: Some(timers),
            expiry: ExpiryDispatcher::new(),
        })
    }

    /// Create a sibling site's manager: no siblings, no timer
    /// coordination, just this site's store.
    pub fn remote(config: SiteConfig, store: Arc<dyn AorStore>) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            siblings: Vec::new(),
            timers: None,
            expiry: ExpiryDispatcher::new(),
        })
    }

    /// Register the consumer that receives timer pops. Late-bound: the
    /// consumer typically holds a reference back to this manager.
    pub async fn register_timer_pop_consumer(&self, consumer: Arc<dyn TimerPopConsumer>) {
        self.expiry.register(consumer).await;
    }

    /// Deliver a broker-originated timer pop to the registered consumer on
    /// its own task. Returns the trail id assigned to the dispatch.
    pub async fn dispatch_timer_pop(&self, aor_id: &str) -> u64 {
        self.expiry.dispatch(aor_id).await
    }

    /// Fetch the record for a subscriber, falling back to sibling sites
    /// when this site has nothing usable. A record promoted from a sibling
    /// is written locally first, so the returned version is always a local
    /// one.
    pub async fn handle_get(&self, aor_id: &str) -> RegistrarResult<(Record, u64)> {
        let mut attempts = 0;

        'retry: loop {
            match self.read_record(aor_id).await {
                Err(source) => {
                    return Err(RegistrarError::Store {
                        aor_id: aor_id.to_string(),
                        source,
                    });
                }
                Ok(Some(record)) => {
                    let version = record.cas;
                    return Ok((record, version));
                }
                Ok(None) => {
                    for sibling in &self.siblings {
                        debug!(site = %self.config.site_id, sibling = sibling.site_id(), aor_id, "trying sibling for missing record");

                        let mut record = match sibling.get(aor_id).await {
                            Ok((record, _version)) => record,
                            Err(e) => {
                                debug!(site = %self.config.site_id, sibling = sibling.site_id(), aor_id, error = %e, "sibling lookup failed");
                                continue;
                            }
                        };

                        // The sibling's version means nothing here; this is
                        // a local create.
                        record.cas = 0;

                        let now = now_epoch_seconds();
                        match self.write_record(aor_id, &mut record, now).await {
                            Ok(()) => {
                                let version = record.cas;
                                return Ok((record, version));
                            }
                            Err(e) if e.is_contention() => {
                                // Someone else wrote the record while we
                                // were promoting; start over from the local
                                // read.
                                attempts += 1;
                                if attempts >= self.config.max_cas_retries {
                                    return Err(RegistrarError::RetriesExhausted {
                                        aor_id: aor_id.to_string(),
                                        attempts,
                                    });
                                }
                                self.retry_backoff().await;
                                continue 'retry;
                            }
                            Err(source) => {
                                return Err(RegistrarError::Store {
                                    aor_id: aor_id.to_string(),
                                    source,
                                });
                            }
                        }
                    }

                    return Err(RegistrarError::NotFound {
                        aor_id: aor_id.to_string(),
                    });
                }
            }
        }
    }

    /// Create the record for a subscriber. Never reads first: the write is
    /// conditional on the record being absent.
    pub async fn handle_put(&self, aor_id: &str, mut record: Record) -> RegistrarResult<()> {
        let now = now_epoch_seconds();
        record.cas = 0;

        match self.write_record(aor_id, &mut record, now).await {
            Ok(()) => {
                self.replicate_put_cross_site(aor_id, &record).await;
                Ok(())
            }
            Err(e) if e.is_contention() => Err(RegistrarError::AlreadyExists {
                aor_id: aor_id.to_string(),
            }),
            Err(source) => Err(RegistrarError::Store {
                aor_id: aor_id.to_string(),
                source,
            }),
        }
    }

    /// Apply a partial update to a subscriber's record and return the
    /// result. Contended writes re-read and re-apply until they win or the
    /// retry budget runs out.
    pub async fn handle_patch(&self, aor_id: &str, patch: Patch) -> RegistrarResult<Record> {
        let mut attempts = 0;

        loop {
            let mut record = match self.read_record(aor_id).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    return Err(RegistrarError::NotFound {
                        aor_id: aor_id.to_string(),
                    });
                }
                Err(source) => {
                    return Err(RegistrarError::Store {
                        aor_id: aor_id.to_string(),
                        source,
                    });
                }
            };

            record.apply_patch(&patch);

            let now = now_epoch_seconds();
            match self.write_record(aor_id, &mut record, now).await {
                Ok(()) => {
                    // Siblings get a floor at the CSeq we just committed
                    // rather than another increment, so drifted counters
                    // converge upward instead of drifting further.
                    let replication = patch.for_replication(record.notify_cseq);
                    self.replicate_patch_cross_site(aor_id, &replication, &record).await;
                    return Ok(record);
                }
                Err(e) if e.is_contention() => {
                    attempts += 1;
                    if attempts >= self.config.max_cas_retries {
                        return Err(RegistrarError::RetriesExhausted {
                            aor_id: aor_id.to_string(),
                            attempts,
                        });
                    }
                    debug!(site = %self.config.site_id, aor_id, attempts, "patch write contended; retrying");
                    self.retry_backoff().await;
                }
                Err(source) => {
                    return Err(RegistrarError::Store {
                        aor_id: aor_id.to_string(),
                        source,
                    });
                }
            }
        }
    }

    /// Client-originated delete: clears the record if `version` still
    /// matches, then replicates the delete to the sibling sites.
    pub async fn handle_delete(&self, aor_id: &str, version: u64) -> RegistrarResult<()> {
        let mut record = match self.read_record(aor_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(RegistrarError::NotFound {
                    aor_id: aor_id.to_string(),
                });
            }
            Err(source) => {
                return Err(RegistrarError::Store {
                    aor_id: aor_id.to_string(),
                    source,
                });
            }
        };

        if record.cas != version {
            debug!(site = %self.config.site_id, aor_id, stored = record.cas, supplied = version, "delete version is stale");
            return Err(RegistrarError::VersionMismatch {
                aor_id: aor_id.to_string(),
            });
        }

        record.clear(true);

        let now = now_epoch_seconds();
        match self.write_record(aor_id, &mut record, now).await {
            Ok(()) => {
                self.replicate_delete_cross_site(aor_id).await;
                Ok(())
            }
            // The record moved under the client's feet; that is exactly a
            // stale version.
            Err(e) if e.is_contention() => Err(RegistrarError::VersionMismatch {
                aor_id: aor_id.to_string(),
            }),
            Err(source) => Err(RegistrarError::Store {
                aor_id: aor_id.to_string(),
                source,
            }),
        }
    }

    /// Sibling-originated delete: no version check, retried on contention
    /// until the record is cleared, gone, or the store fails hard.
    pub async fn handle_remote_delete(&self, aor_id: &str) -> RegistrarResult<()> {
        let mut attempts = 0;

        loop {
            let mut record = match self.read_record(aor_id).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    return Err(RegistrarError::NotFound {
                        aor_id: aor_id.to_string(),
                    });
                }
                Err(source) => {
                    return Err(RegistrarError::Store {
                        aor_id: aor_id.to_string(),
                        source,
                    });
                }
            };

            record.clear(true);

            let now = now_epoch_seconds();
            match self.write_record(aor_id, &mut record, now).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_contention() => {
                    attempts += 1;
                    if attempts >= self.config.max_cas_retries {
                        return Err(RegistrarError::RetriesExhausted {
                            aor_id: aor_id.to_string(),
                            attempts,
                        });
                    }
                    self.retry_backoff().await;
                }
                Err(source) => {
                    return Err(RegistrarError::Store {
                        aor_id: aor_id.to_string(),
                        source,
                    });
                }
            }
        }
    }

    /// Read the local record, treating a stored record with no bindings
    /// the same as absence.
    async fn read_record(&self, aor_id: &str) -> Result<Option<Record>, AorStoreError> {
        match self.store.get_aor(aor_id).await? {
            None => Ok(None),
            Some(record) if record.is_empty() => {
                // Not the same operational signal as true absence: the
                // data was cleared or expired in place.
                debug!(site = %self.config.site_id, aor_id, "stored record has no bindings; treating as absent");
                Ok(None)
            }
            Some(record) => Ok(Some(record)),
        }
    }

    /// Write a record back to the local store and run the post-write
    /// actions: broker timer sync and synthetic expiry detection.
    async fn write_record(&self, aor_id: &str, record: &mut Record, now: i64) -> Result<(), AorStoreError> {
        // Subscriptions cannot outlive the last binding.
        if record.is_empty() && record.subscription_count() > 0 {
            debug!(site = %self.config.site_id, aor_id, "clearing subscriptions on binding-less record");
            record.clear_subscriptions();
        }

        let expires_at = record.last_expires() + self.config.grace_seconds;
        self.store.set_aor(aor_id, record, expires_at).await?;

        if let Some(timers) = &self.timers {
            let previous_timer_id = record.timer_id.clone();
            timers.sync(aor_id, record, now).await;

            if record.timer_id != previous_timer_id {
                // Persist the fresh broker id straight away, best-effort.
                // If this loses a race the id rides along on the next
                // write instead, and a stale broker lookup just recreates
                // the timer.
                let mut carrier = record.clone();
                match self.store.set_aor(aor_id, &mut carrier, expires_at).await {
                    Ok(()) => record.cas = carrier.cas,
                    Err(e) => {
                        debug!(site = %self.config.site_id, aor_id, error = %e, "timer id not persisted; next write will carry it");
                    }
                }
            }
        }

        self.expiry.dispatch_if_elapsed(aor_id, record, now).await;
        Ok(())
    }

    async fn replicate_put_cross_site(&self, aor_id: &str, record: &Record) {
        for sibling in &self.siblings {
            match sibling.put(aor_id, record.clone()).await {
                Ok(()) => {}
                Err(RegistrarError::AlreadyExists { .. }) => {
                    // The sibling already has data for this subscriber, so
                    // downgrade the create to an update. Whatever happens
                    // to the update is final.
                    debug!(site = %self.config.site_id, sibling = sibling.site_id(), aor_id, "sibling has data; converting replicated create to update");
                    if let Err(e) = sibling.patch(aor_id, record.to_patch()).await {
                        warn!(site = %self.config.site_id, sibling = sibling.site_id(), aor_id, error = %e, "replicated update after create fallback failed");
                    }
                }
                Err(e) => {
                    warn!(site = %self.config.site_id, sibling = sibling.site_id(), aor_id, error = %e, "replicated create failed");
                }
            }
        }
    }

    async fn replicate_patch_cross_site(&self, aor_id: &str, patch: &Patch, record: &Record) {
        for sibling in &self.siblings {
            match sibling.patch(aor_id, patch.clone()).await {
                Ok(_) => {}
                Err(RegistrarError::NotFound { .. }) => {
                    // The sibling has no record to update, so promote the
                    // update to a create seeded from our committed state.
                    // Whatever happens to the create is final.
                    debug!(site = %self.config.site_id, sibling = sibling.site_id(), aor_id, "sibling has no data; converting replicated update to create");
                    let mut seed = Record::new(aor_id);
                    seed.copy_from(record);
                    if let Err(e) = sibling.put(aor_id, seed).await {
                        warn!(site = %self.config.site_id, sibling = sibling.site_id(), aor_id, error = %e, "replicated create after update fallback failed");
                    }
                }
                Err(e) => {
                    warn!(site = %self.config.site_id, sibling = sibling.site_id(), aor_id, error = %e, "replicated update failed");
                }
            }
        }
    }

    async fn replicate_delete_cross_site(&self, aor_id: &str) {
        for sibling in &self.siblings {
            if let Err(e) = sibling.delete_remote(aor_id).await {
                debug!(site = %self.config.site_id, sibling = sibling.site_id(), aor_id, error = %e, "replicated delete failed");
            }
        }
    }

    async fn retry_backoff(&self) {
        // The rng is created here so a non-Send type is never held across
        // the await.
        let jitter = rand::rng().random_range(0..=self.config.retry_delay_ms);
        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms + jitter)).await;
    }
}

#[async_trait]
impl RegistrarSite for SiteManager {
    fn site_id(&self) -> &str {
        &self.config.site_id
    }

    async fn get(&self, aor_id: &str) -> RegistrarResult<(Record, u64)> {
        self.handle_get(aor_id).await
    }

    async fn put(&self, aor_id: &str, record: Record) -> RegistrarResult<()> {
        self.handle_put(aor_id, record).await
    }

    async fn patch(&self, aor_id: &str, patch: Patch) -> RegistrarResult<Record> {
        self.handle_patch(aor_id, patch).await
    }

    async fn delete_remote(&self, aor_id: &str) -> RegistrarResult<()> {
        self.handle_remote_delete(aor_id).await
    }
}
