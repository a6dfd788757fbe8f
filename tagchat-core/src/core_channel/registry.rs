//! Channel Registry
//!
//! Owns one background task per observed channel. Each task consumes the
//! channel's discovery streams, feeds a [`ChannelState`] and publishes a
//! fresh [`ChannelSnapshot`] through a `watch` channel whenever a derived
//! value changes.
//!
//! ```text
//! discover(name) ─┐
//! discover(member)├─► ChannelState ─► watch<ChannelSnapshot> ─► subscribers
//! discover(msg)  ─┘        ▲
//!                          └── AdminResolver::subscribe(channel)
//! ```
//!
//! Tasks start lazily on the first `subscribe` and stop once every receiver
//! is gone; `prune` then drops their entries.

use super::state::{ChannelConfig, ChannelSnapshot, ChannelState};
use crate::core_admin::AdminResolver;
use crate::core_schema::{chat_name_schema, member_update_schema, message_schema};
use crate::core_store::{Actor, ObjectStore, Session};
use crate::metrics::{record_counter, record_gauge};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct ChannelEntry {
    tx: Arc<watch::Sender<ChannelSnapshot>>,
    task: JoinHandle<()>,
    actor: Actor,
}

impl ChannelEntry {
    fn is_live(&self) -> bool {
        !self.task.is_finished() && self.tx.receiver_count() > 0
    }
}

/// Lazily started, self-retiring per-channel observers
pub struct ChannelRegistry {
    store: Arc<dyn ObjectStore>,
    admin: Arc<AdminResolver>,
    config: ChannelConfig,
    channels: Mutex<HashMap<String, ChannelEntry>>,
}

impl ChannelRegistry {
    pub fn new(store: Arc<dyn ObjectStore>, admin: Arc<AdminResolver>, config: ChannelConfig) -> Self {
        info!(trusted_names = config.trusted_names, "Creating ChannelRegistry");
        ChannelRegistry {
            store,
            admin,
            config,
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, ChannelEntry>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Observe `channel` as seen by `session`
    ///
    /// Starts the channel task on first use. Subscribing with a different
    /// session restarts the task for that session; existing receivers stay
    /// attached and see the restarted state.
    pub fn subscribe(&self, channel: &str, session: &Session) -> watch::Receiver<ChannelSnapshot> {
        let mut channels = self.channels();

        if let Some(entry) = channels.get_mut(channel) {
            if entry.actor == session.actor && !entry.task.is_finished() {
                return entry.tx.subscribe();
            }

            debug!(
                channel,
                previous = %entry.actor,
                actor = %session.actor,
                "Restarting channel task"
            );
            entry.task.abort();
            let rx = entry.tx.subscribe();
            entry.task = self.spawn_task(channel, session, Arc::clone(&entry.tx));
            entry.actor = session.actor.clone();
            return rx;
        }

        let (tx, rx) = watch::channel(ChannelSnapshot::empty(channel));
        let tx = Arc::new(tx);
        let task = self.spawn_task(channel, session, Arc::clone(&tx));
        channels.insert(
            channel.to_string(),
            ChannelEntry {
                tx,
                task,
                actor: session.actor.clone(),
            },
        );
        record_gauge("channels.observed", channels.len() as f64);
        info!(channel, actor = %session.actor, "Observing channel");
        rx
    }

    /// Latest snapshot of an observed channel
    pub fn snapshot(&self, channel: &str) -> Option<ChannelSnapshot> {
        self.channels().get(channel).map(|entry| entry.tx.borrow().clone())
    }

    /// Channels with a running task and at least one receiver
    pub fn active_channels(&self) -> Vec<String> {
        let mut active: Vec<String> = self
            .channels()
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(channel, _)| channel.clone())
            .collect();
        active.sort();
        active
    }

    /// Drop entries nobody observes any more; returns how many were removed
    pub fn prune(&self) -> usize {
        let mut channels = self.channels();
        let before = channels.len();
        channels.retain(|channel, entry| {
            if entry.is_live() {
                return true;
            }
            debug!(channel = %channel, "Pruning unobserved channel");
            entry.task.abort();
            false
        });
        record_gauge("channels.observed", channels.len() as f64);
        before - channels.len()
    }

    /// Stop every channel task
    pub fn shutdown(&self) {
        let mut channels = self.channels();
        for (_, entry) in channels.drain() {
            entry.task.abort();
        }
    }

    fn spawn_task(&self, channel: &str, session: &Session, tx: Arc<watch::Sender<ChannelSnapshot>>) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let admin = Arc::clone(&self.admin);
        let state = ChannelState::new(channel).with_trusted_names(self.config.trusted_names);
        let session = session.clone();
        tokio::spawn(drive_channel(store, admin, state, session, tx))
    }
}

impl Drop for ChannelRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn drive_channel(
    store: Arc<dyn ObjectStore>,
    admin: Arc<AdminResolver>,
    mut state: ChannelState,
    session: Session,
    tx: Arc<watch::Sender<ChannelSnapshot>>,
) {
    let channel = state.channel().to_string();
    let tags = [channel.clone()];
    let mut objects = stream::select_all([
        store.discover(&tags, &chat_name_schema(&channel), &session),
        store.discover(&tags, &member_update_schema(&channel), &session),
        store.discover(&tags, &message_schema(), &session),
    ]);

    let mut admin_rx = admin.subscribe(&channel);
    if admin.spawn_resolve(&channel, &session).is_some() {
        debug!(channel = %channel, actor = %session.actor, "Started admin resolution");
    }
    state.set_admin(admin_rx.borrow_and_update().clone());
    tx.send_replace(state.snapshot());

    let mut discovering = true;
    loop {
        tokio::select! {
            _ = tx.closed() => {
                debug!(channel = %channel, "No observers left, stopping channel task");
                break;
            }
            item = objects.next(), if discovering => match item {
                Some(Ok(object)) => {
                    if !state.ingest(&object) {
                        continue;
                    }
                    tx.send_replace(state.snapshot());
                    if state.admin() == Some("") && admin.spawn_resolve(&channel, &session).is_some() {
                        debug!(channel = %channel, "Retrying admin resolution after new objects");
                    }
                }
                Some(Err(e)) => {
                    warn!(channel = %channel, error = %e, "Skipping undeliverable object");
                    record_counter("discovery.items.skipped", 1);
                }
                None => {
                    debug!(channel = %channel, "Discovery complete");
                    discovering = false;
                }
            },
            changed = admin_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let resolved = admin_rx.borrow_and_update().clone();
                if state.set_admin(resolved) {
                    tx.send_replace(state.snapshot());
                }
            }
        }
    }
}
