//! Admin Resolution Engine
//!
//! Determines who owns a channel under the process-wide [`TrustModel`].
//!
//! # Provenance passes
//!
//! Under the provenance model the owner is the publisher of the earliest
//! timestamped object discovered on the channel. Finding it means exhausting
//! a discovery pass, so results are memoized per channel and at most one pass
//! per (channel, session) runs at a time:
//!
//! ```text
//! resolve(c, s) ──► cached non-empty admin? ──yes──► return it
//!                        │ no
//!                        ▼
//!                 pass in flight for (c, s)? ──yes──► return None (wait on subscribe)
//!                        │ no (or in flight for another session: supersede it)
//!                        ▼
//!                 run pass ──► still the current generation? ──► cache + notify
//! ```
//!
//! A pass started for a different session supersedes the one in flight. The
//! stale pass is aborted before the new one starts consuming discovery, and
//! its result is discarded, so a late stale result never overwrites the cache
//! and at most one pass drains a channel's stream at a time.

use super::trust::TrustModel;
use crate::core_schema::published_schema;
use crate::core_store::{Actor, ObjectStore, Session};
use crate::metrics::{record_counter, Timer};
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Admin resolution configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Trust model for the whole process
    pub trust_model: TrustModel,

    /// Stop a provenance pass after this long and keep the best result so far
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub resolution_timeout: Option<Duration>,
}

/// Result of trying to start a resolution
enum Claim {
    /// Answer available without discovery
    Ready(String),
    /// Same (channel, session) already being resolved
    Busy,
    /// Caller owns a new pass with this generation
    Started(u64, AbortRegistration),
}

struct InFlight {
    generation: u64,
    actor: Actor,
    abort: AbortHandle,
}

/// Per-channel resolution state
struct AdminSlot {
    /// `Some("")` means a pass completed without finding anyone
    cached: Option<String>,
    in_flight: Option<InFlight>,
    generation: u64,
    tx: watch::Sender<Option<String>>,
}

impl AdminSlot {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        AdminSlot {
            cached: None,
            in_flight: None,
            generation: 0,
            tx,
        }
    }
}

/// Clears the in-flight marker if a pass is dropped before finishing
struct PassGuard<'a> {
    resolver: &'a AdminResolver,
    channel: &'a str,
    generation: u64,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.resolver.slots();
        if let Some(slot) = slots.get_mut(self.channel) {
            if slot
                .in_flight
                .as_ref()
                .is_some_and(|in_flight| in_flight.generation == self.generation)
            {
                debug!(channel = %self.channel, generation = self.generation, "Admin resolution abandoned");
                slot.in_flight = None;
            }
        }
    }
}

/// Per-channel memoizing admin resolver
pub struct AdminResolver {
    model: TrustModel,
    store: Arc<dyn ObjectStore>,
    resolution_timeout: Option<Duration>,
    slots: Mutex<HashMap<String, AdminSlot>>,
}

impl AdminResolver {
    /// Create a resolver for `model` backed by `store`
    pub fn new(model: TrustModel, store: Arc<dyn ObjectStore>) -> Self {
        info!(model = %model, "Creating AdminResolver");
        AdminResolver {
            model,
            store,
            resolution_timeout: None,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AdminConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self::new(config.trust_model, store).with_resolution_timeout(config.resolution_timeout)
    }

    /// Bound provenance passes in time (best-effort results)
    pub fn with_resolution_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.resolution_timeout = timeout;
        self
    }

    pub fn model(&self) -> TrustModel {
        self.model
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, AdminSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the admin of `channel` as seen by `session`
    ///
    /// Returns `None` when the channel id is empty or when an identical
    /// resolution is already in flight; in that case the result arrives
    /// through [`AdminResolver::subscribe`].
    pub async fn resolve(&self, channel: &str, session: &Session) -> Option<String> {
        if channel.is_empty() {
            return None;
        }

        match self.claim(channel, session) {
            Claim::Ready(admin) => Some(admin),
            Claim::Busy => None,
            Claim::Started(generation, registration) => {
                self.run_pass(channel, session, generation, registration).await
            }
        }
    }

    /// Run a resolution as a background task
    ///
    /// Returns `None` when no pass was needed (cached, direct trust, or
    /// already in flight). The task yields `None` if a pass for another
    /// session supersedes it.
    pub fn spawn_resolve(self: &Arc<Self>, channel: &str, session: &Session) -> Option<JoinHandle<Option<String>>> {
        if channel.is_empty() {
            return None;
        }

        let (generation, registration) = match self.claim(channel, session) {
            Claim::Started(generation, registration) => (generation, registration),
            Claim::Ready(_) | Claim::Busy => return None,
        };

        let resolver = Arc::clone(self);
        let task_channel = channel.to_string();
        let task_session = session.clone();
        Some(tokio::spawn(async move {
            resolver
                .run_pass(&task_channel, &task_session, generation, registration)
                .await
        }))
    }

    /// Last resolved admin; `Some("")` means resolved with no admin found
    pub fn cached(&self, channel: &str) -> Option<String> {
        self.slots().get(channel).and_then(|slot| slot.cached.clone())
    }

    /// Whether a provenance pass is running for `channel`
    pub fn is_resolving(&self, channel: &str) -> bool {
        self.slots()
            .get(channel)
            .is_some_and(|slot| slot.in_flight.is_some())
    }

    /// Observe the cached admin of `channel`
    pub fn subscribe(&self, channel: &str) -> watch::Receiver<Option<String>> {
        self.slots()
            .entry(channel.to_string())
            .or_insert_with(AdminSlot::new)
            .tx
            .subscribe()
    }

    /// Forget the cached admin so the next call runs a fresh pass
    pub fn invalidate(&self, channel: &str) {
        if let Some(slot) = self.slots().get_mut(channel) {
            debug!(channel, "Invalidating cached admin");
            slot.cached = None;
        }
    }

    fn claim(&self, channel: &str, session: &Session) -> Claim {
        let mut slots = self.slots();
        let slot = slots.entry(channel.to_string()).or_insert_with(AdminSlot::new);

        if self.model == TrustModel::Direct {
            slot.cached = Some(session.actor.clone());
            slot.tx.send_replace(Some(session.actor.clone()));
            return Claim::Ready(session.actor.clone());
        }

        if let Some(admin) = slot.cached.as_ref().filter(|admin| !admin.is_empty()) {
            return Claim::Ready(admin.clone());
        }

        if let Some(in_flight) = slot.in_flight.as_ref() {
            if in_flight.actor == session.actor {
                debug!(channel, actor = %session.actor, "Admin resolution already in flight");
                record_counter("admin.resolutions.suppressed", 1);
                return Claim::Busy;
            }

            debug!(
                channel,
                stale = %in_flight.actor,
                actor = %session.actor,
                "Superseding in-flight admin resolution"
            );
            in_flight.abort.abort();
        }

        let (abort, registration) = AbortHandle::new_pair();
        slot.generation += 1;
        slot.in_flight = Some(InFlight {
            generation: slot.generation,
            actor: session.actor.clone(),
            abort,
        });
        record_counter("admin.resolutions.started", 1);
        Claim::Started(slot.generation, registration)
    }

    /// Drive one claimed pass to completion or until it is superseded
    async fn run_pass(
        &self,
        channel: &str,
        session: &Session,
        generation: u64,
        registration: AbortRegistration,
    ) -> Option<String> {
        let _guard = PassGuard {
            resolver: self,
            channel,
            generation,
        };
        let pass = Abortable::new(self.earliest_publisher(channel, session), registration);
        match pass.await {
            Ok(admin) => self.finish(channel, generation, admin),
            Err(_) => {
                debug!(channel, generation, actor = %session.actor, "Superseded admin resolution cancelled");
                record_counter("admin.resolutions.stale", 1);
                None
            }
        }
    }

    fn finish(&self, channel: &str, generation: u64, admin: String) -> Option<String> {
        let mut slots = self.slots();
        let slot = slots.get_mut(channel)?;

        if slot.generation != generation {
            debug!(channel, generation, current = slot.generation, "Discarding stale admin resolution");
            record_counter("admin.resolutions.stale", 1);
            return None;
        }

        slot.in_flight = None;
        slot.cached = Some(admin.clone());
        slot.tx.send_replace(Some(admin.clone()));
        info!(channel, admin = %admin, "Resolved channel admin");
        Some(admin)
    }

    /// Publisher of the earliest object on `channel`; empty if none found
    async fn earliest_publisher(&self, channel: &str, session: &Session) -> String {
        let timer = Timer::new("admin.resolution.duration_ms");
        let mut stream = self
            .store
            .discover(&[channel.to_string()], &published_schema(), session);
        let mut earliest: Option<(u64, Actor)> = None;
        let mut skipped: u64 = 0;

        let scan = async {
            while let Some(result) = stream.next().await {
                let object = match result {
                    Ok(object) => object,
                    Err(e) => {
                        warn!(channel, error = %e, "Skipping object during admin resolution");
                        skipped += 1;
                        continue;
                    }
                };
                let Some(published) = object.published() else {
                    skipped += 1;
                    continue;
                };

                // Equal timestamps: the smaller actor id wins.
                let candidate = (published, object.actor);
                if earliest.as_ref().map_or(true, |best| candidate < *best) {
                    earliest = Some(candidate);
                }
            }
        };

        match self.resolution_timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, scan).await.is_err() {
                    debug!(channel, ?limit, "Admin resolution timed out, keeping best-effort result");
                }
            }
            None => scan.await,
        }

        timer.stop();
        if skipped > 0 {
            record_counter("discovery.items.skipped", skipped);
        }
        earliest.map(|(_, actor)| actor).unwrap_or_default()
    }
}
