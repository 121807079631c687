//! Shared fixtures for the site manager integration tests.

#![allow(dead_code)] // Each test binary uses a subset of these.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use sedge_core::Patch;
use sedge_core::Record;
use sedge_core::RegistrarError;
use sedge_core::RegistrarResult;
use sedge_core::RegistrarSite;
use sedge_core::TimerPopConsumer;
use sedge_core::TimerService;
use sedge_core::TimerServiceError;
use sedge_site::SiteConfig;
use sedge_site::SiteManager;
use sedge_store::DeterministicCasStore;
use sedge_store::JsonAorStore;
use tokio::sync::mpsc;

pub const AOR: &str = "sip:alice@example.com";

/// A local site wired to the given siblings, with its raw store and
/// recording broker exposed for assertions.
pub struct TestSite {
    pub site: Arc<SiteManager>,
    pub kv: Arc<DeterministicCasStore>,
    pub store: Arc<JsonAorStore<Arc<DeterministicCasStore>>>,
    pub broker: Arc<RecordingBroker>,
}

pub fn local_site(siblings: Vec<Arc<dyn RegistrarSite>>) -> TestSite {
    local_site_with_config(SiteConfig::for_site("local"), siblings)
}

pub fn local_site_with_config(config: SiteConfig, siblings: Vec<Arc<dyn RegistrarSite>>) -> TestSite {
    let kv = DeterministicCasStore::new();
    let store = Arc::new(JsonAorStore::new(kv.clone()));
    let broker = Arc::new(RecordingBroker::default());
    let site = SiteManager::local(config, store.clone(), siblings, broker.clone());
    TestSite { site, kv, store, broker }
}

/// A sibling site with its own store and no siblings of its own.
pub struct SiblingSite {
    pub site: Arc<SiteManager>,
    pub kv: Arc<DeterministicCasStore>,
    pub store: Arc<JsonAorStore<Arc<DeterministicCasStore>>>,
}

pub fn sibling_site(id: &str) -> SiblingSite {
    let kv = DeterministicCasStore::new();
    let store = Arc::new(JsonAorStore::new(kv.clone()));
    let site = SiteManager::remote(SiteConfig::for_site(id), store.clone());
    SiblingSite { site, kv, store }
}

/// What a recording broker saw.
#[derive(Debug, Clone)]
pub enum BrokerCall {
    Create {
        callback_uri: String,
        expiry: i64,
        tags: BTreeMap<String, u32>,
        payload: String,
    },
    Update {
        timer_id: String,
        expiry: i64,
        tags: BTreeMap<String, u32>,
        payload: String,
    },
    Delete {
        timer_id: String,
    },
}

/// Timer broker double that records every call and hands out sequential
/// timer ids, or fails everything when `fail` is set.
#[derive(Default)]
pub struct RecordingBroker {
    pub calls: Mutex<Vec<BrokerCall>>,
    next_id: AtomicU64,
    pub fail: std::sync::atomic::AtomicBool,
}

impl RecordingBroker {
    pub fn calls(&self) -> Vec<BrokerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::Relaxed);
    }

    fn check(&self) -> Result<(), TimerServiceError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(TimerServiceError::Status { status: 503 });
        }
        Ok(())
    }
}

#[async_trait]
impl TimerService for RecordingBroker {
    async fn create(
        &self,
        callback_uri: &str,
        expiry_seconds: i64,
        tags: &BTreeMap<String, u32>,
        payload: &str,
    ) -> Result<String, TimerServiceError> {
        self.calls.lock().unwrap().push(BrokerCall::Create {
            callback_uri: callback_uri.to_string(),
            expiry: expiry_seconds,
            tags: tags.clone(),
            payload: payload.to_string(),
        });
        self.check()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!("timer-{id}"))
    }

    async fn update(
        &self,
        timer_id: &str,
        _callback_uri: &str,
        expiry_seconds: i64,
        tags: &BTreeMap<String, u32>,
        payload: &str,
    ) -> Result<String, TimerServiceError> {
        self.calls.lock().unwrap().push(BrokerCall::Update {
            timer_id: timer_id.to_string(),
            expiry: expiry_seconds,
            tags: tags.clone(),
            payload: payload.to_string(),
        });
        self.check()?;
        Ok(timer_id.to_string())
    }

    async fn delete(&self, timer_id: &str) -> Result<(), TimerServiceError> {
        self.calls.lock().unwrap().push(BrokerCall::Delete {
            timer_id: timer_id.to_string(),
        });
        self.check()?;
        Ok(())
    }
}

/// Wraps a real sibling and records what the local site sent it.
pub struct RecordingSite {
    inner: Arc<SiteManager>,
    pub puts: Mutex<Vec<(String, Record)>>,
    pub patches: Mutex<Vec<(String, Patch)>>,
    pub deletes: Mutex<Vec<String>>,
}

impl RecordingSite {
    pub fn new(inner: Arc<SiteManager>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            puts: Mutex::new(Vec::new()),
            patches: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl RegistrarSite for RecordingSite {
    fn site_id(&self) -> &str {
        self.inner.site_id()
    }

    async fn get(&self, aor_id: &str) -> RegistrarResult<(Record, u64)> {
        self.inner.get(aor_id).await
    }

    async fn put(&self, aor_id: &str, record: Record) -> RegistrarResult<()> {
        self.puts.lock().unwrap().push((aor_id.to_string(), record.clone()));
        self.inner.put(aor_id, record).await
    }

    async fn patch(&self, aor_id: &str, patch: Patch) -> RegistrarResult<Record> {
        self.patches.lock().unwrap().push((aor_id.to_string(), patch.clone()));
        self.inner.patch(aor_id, patch).await
    }

    async fn delete_remote(&self, aor_id: &str) -> RegistrarResult<()> {
        self.deletes.lock().unwrap().push(aor_id.to_string());
        self.inner.delete_remote(aor_id).await
    }
}

/// A sibling whose every operation fails with a store error.
#[derive(Default)]
pub struct FailingSite {
    pub calls: AtomicU64,
}

impl FailingSite {
    fn fail<T>(&self, aor_id: &str) -> RegistrarResult<T> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(RegistrarError::Store {
            aor_id: aor_id.to_string(),
            source: sedge_core::AorStoreError::Backend {
                key: aor_id.to_string(),
                reason: "synthetic sibling failure".to_string(),
            },
        })
    }
}

#[async_trait]
impl RegistrarSite for FailingSite {
    fn site_id(&self) -> &str {
        "failing"
    }

    async fn get(&self, aor_id: &str) -> RegistrarResult<(Record, u64)> {
        self.fail(aor_id)
    }

    async fn put(&self, aor_id: &str, _record: Record) -> RegistrarResult<()> {
        self.fail(aor_id)
    }

    async fn patch(&self, aor_id: &str, _patch: Patch) -> RegistrarResult<Record> {
        self.fail(aor_id)
    }

    async fn delete_remote(&self, aor_id: &str) -> RegistrarResult<()> {
        self.fail(aor_id)
    }
}

/// A sibling that rejects creates as duplicates and updates as missing,
/// whatever it is sent. Exercises the worst case of the create/update
/// fallback.
#[derive(Default)]
pub struct ContrarySite {
    pub puts: AtomicU64,
    pub patches: AtomicU64,
}

#[async_trait]
impl RegistrarSite for ContrarySite {
    fn site_id(&self) -> &str {
        "contrary"
    }

    async fn get(&self, aor_id: &str) -> RegistrarResult<(Record, u64)> {
        Err(RegistrarError::NotFound {
            aor_id: aor_id.to_string(),
        })
    }

    async fn put(&self, aor_id: &str, _record: Record) -> RegistrarResult<()> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        Err(RegistrarError::AlreadyExists {
            aor_id: aor_id.to_string(),
        })
    }

    async fn patch(&self, aor_id: &str, _patch: Patch) -> RegistrarResult<Record> {
        self.patches.fetch_add(1, Ordering::Relaxed);
        Err(RegistrarError::NotFound {
            aor_id: aor_id.to_string(),
        })
    }

    async fn delete_remote(&self, _aor_id: &str) -> RegistrarResult<()> {
        Ok(())
    }
}

tokio::task_local! {
    /// Set on the task driving a client operation in tests. A pop handed
    /// off to a fresh task cannot see it; a pop wrongly delivered inline
    /// on the operating task can.
    pub static OPERATING_TASK: ();
}

/// Pop consumer that forwards everything it receives onto a channel,
/// noting whether it was invoked inline on the operating task.
pub struct ChannelConsumer {
    tx: mpsc::UnboundedSender<PopDelivery>,
}

#[derive(Debug)]
pub struct PopDelivery {
    pub aor_id: String,
    pub trail_id: u64,
    pub inline_on_operating_task: bool,
}

impl ChannelConsumer {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PopDelivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl TimerPopConsumer for ChannelConsumer {
    async fn handle_timer_pop(&self, aor_id: &str, trail_id: u64) {
        let _ = self.tx.send(PopDelivery {
            aor_id: aor_id.to_string(),
            trail_id,
            inline_on_operating_task: OPERATING_TASK.try_with(|_| ()).is_ok(),
        });
    }
}
