/*
    memory_store.rs - In-process object store

    Reference implementation of the ObjectStore capability. Honours:
    - tag scoping (an object is discoverable under each of its channels)
    - schema filters (evaluated locally)
    - the `allowed` access-control list

    Discovery yields a snapshot of matching objects and then either completes
    (Snapshot mode) or keeps yielding objects as they are published (Live
    mode). Fault hooks let tests inject per-item discovery errors, rejected
    writes, and slow discovery passes.
*/

use super::errors::{StoreError, StoreResult};
use super::object::{Actor, ObjectDraft, Session, StoredObject};
use super::store::{DiscoveryStream, ObjectStore};
use crate::config::Config;
use crate::core_schema::SchemaFilter;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Whether a discovery pass ends after the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Yield the current matches, then complete
    #[default]
    Snapshot,
    /// Yield the current matches, then follow new publications forever
    Live,
}

impl DiscoveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMode::Snapshot => "snapshot",
            DiscoveryMode::Live => "live",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "snapshot" => Some(DiscoveryMode::Snapshot),
            "live" => Some(DiscoveryMode::Live),
            _ => None,
        }
    }
}

/// Configuration for the in-memory store's discovery behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Snapshot or live discovery
    pub mode: DiscoveryMode,

    /// Buffered publications per live stream before it reports a lag
    pub live_buffer: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            mode: DiscoveryMode::Snapshot,
            live_buffer: 256,
        }
    }
}

/// What a single discovery pass is looking for
struct Query {
    channels: Vec<String>,
    filter: SchemaFilter,
    reader: Actor,
}

impl Query {
    fn admits(&self, object: &StoredObject) -> bool {
        object.is_tagged_with(self.channels.as_slice())
            && self.filter.matches(object)
            && object.is_visible_to(&self.reader)
    }
}

/// In-memory object store
pub struct MemoryStore {
    mode: DiscoveryMode,
    objects: RwLock<Vec<StoredObject>>,
    live: broadcast::Sender<StoredObject>,
    discovery_faults: Mutex<Vec<StoreError>>,
    put_fault: Mutex<Option<StoreError>>,
    discovery_delay: Mutex<Option<Duration>>,
    discover_calls: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store with the given discovery behaviour
    pub fn new(config: DiscoveryConfig) -> Self {
        let (live, _rx) = broadcast::channel(config.live_buffer.max(1));
        MemoryStore {
            mode: config.mode,
            objects: RwLock::new(Vec::new()),
            live,
            discovery_faults: Mutex::new(Vec::new()),
            put_fault: Mutex::new(None),
            discovery_delay: Mutex::new(None),
            discover_calls: AtomicUsize::new(0),
        }
    }

    /// Create a store from the `discovery` section of `config`
    pub fn from_config(config: &Config) -> Self {
        debug!(
            mode = config.discovery.mode.as_str(),
            live_buffer = config.discovery.live_buffer,
            "Creating MemoryStore"
        );
        Self::new(config.discovery.clone())
    }

    /// Snapshot-mode store with default buffering
    pub fn snapshot() -> Self {
        Self::new(DiscoveryConfig::default())
    }

    /// Live-mode store with default buffering
    pub fn live() -> Self {
        Self::new(DiscoveryConfig {
            mode: DiscoveryMode::Live,
            ..DiscoveryConfig::default()
        })
    }

    pub fn mode(&self) -> DiscoveryMode {
        self.mode
    }

    /// Insert an already-formed object, bypassing `put`
    pub fn seed(&self, object: StoredObject) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(object.clone());
        let _ = self.live.send(object);
    }

    /// All stored objects in publication order
    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of discovery passes started so far
    pub fn discover_count(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }

    /// Yield `error` at the start of every subsequent discovery pass
    pub fn inject_discovery_error(&self, error: StoreError) {
        lock(&self.discovery_faults).push(error);
    }

    /// Make every subsequent `put` fail with `error` (or succeed again with `None`)
    pub fn fail_puts(&self, error: Option<StoreError>) {
        *lock(&self.put_fault) = error;
    }

    /// Delay the first item of every subsequent discovery pass
    pub fn set_discovery_delay(&self, delay: Option<Duration>) {
        *lock(&self.discovery_delay) = delay;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::snapshot()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn discover(&self, channels: &[String], filter: &SchemaFilter, session: &Session) -> DiscoveryStream {
        let pass = self.discover_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let query = Query {
            channels: channels.to_vec(),
            filter: filter.clone(),
            reader: session.actor.clone(),
        };

        // Subscribe before taking the snapshot so nothing published in between is lost.
        let live_rx = match self.mode {
            DiscoveryMode::Live => Some(self.live.subscribe()),
            DiscoveryMode::Snapshot => None,
        };

        let mut items: Vec<StoreResult<StoredObject>> =
            lock(&self.discovery_faults).iter().cloned().map(Err).collect();
        items.extend(
            self.objects
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|object| query.admits(object))
                .cloned()
                .map(Ok),
        );

        debug!(
            pass,
            channels = ?channels,
            kind = filter.kind(),
            reader = %session.actor,
            snapshot = items.len(),
            mode = self.mode.as_str(),
            "Starting discovery pass"
        );

        let delay = *lock(&self.discovery_delay);
        let pause = stream::once(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        })
        .filter_map(|()| futures::future::ready(None::<StoreResult<StoredObject>>));

        let live = match live_rx {
            Some(rx) => stream::unfold((rx, query), |(mut rx, query)| async move {
                loop {
                    match rx.recv().await {
                        Ok(object) if query.admits(&object) => return Some((Ok(object), (rx, query))),
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Live discovery fell behind");
                            let err = StoreError::Transport(format!("missed {} live objects", skipped));
                            return Some((Err(err), (rx, query)));
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            })
            .boxed(),
            None => stream::empty().boxed(),
        };

        Box::pin(pause.chain(stream::iter(items)).chain(live))
    }

    async fn put(&self, draft: ObjectDraft, session: &Session) -> StoreResult<StoredObject> {
        if let Some(err) = lock(&self.put_fault).clone() {
            warn!(actor = %session.actor, error = %err, "Rejecting write");
            return Err(err);
        }
        if !draft.value.is_object() {
            return Err(StoreError::Malformed("value must be a JSON object".to_string()));
        }

        let object = StoredObject {
            url: format!("tagchat:{}", Uuid::new_v4()),
            actor: session.actor.clone(),
            value: draft.value,
            channels: draft.channels,
            allowed: draft.allowed,
        };

        debug!(url = %object.url, actor = %object.actor, channels = ?object.channels, "Stored object");
        self.seed(object.clone());
        Ok(object)
    }
}
