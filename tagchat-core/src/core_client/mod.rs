//! Chat Client
//!
//! Wires one session's view of the world together: the admin resolver, the
//! channel registry and the mutation gateway, all sharing one object store.
//!
//! Mutations read the current derived state of the channel (name, member
//! set) from the registry and hand it to the gateway, closing the loop
//!
//! ```text
//! discovery ─► ChannelSnapshot ─► ChatClient::{rename, invite, remove, send}
//!     ▲                                        │
//!     └──────────── ObjectStore::put ◄─────────┘
//! ```

use crate::config::Config;
use crate::core_admin::AdminResolver;
use crate::core_channel::{ChannelRegistry, ChannelSnapshot};
use crate::core_gateway::{Clock, GatewayResult, MutationGateway, WriteOutcome};
use crate::core_store::{ObjectStore, Session};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// One session's handle on the chat engine
pub struct ChatClient {
    session: Session,
    admin: Arc<AdminResolver>,
    gateway: MutationGateway,
    registry: ChannelRegistry,
}

impl ChatClient {
    /// Create a client acting as `session`
    ///
    /// # Arguments
    ///
    /// * `config` - Process configuration; the trust model is fixed from here
    /// * `store` - Shared object store
    /// * `session` - Identity used for discovery and writes
    pub fn new(config: &Config, store: Arc<dyn ObjectStore>, session: Session) -> Self {
        info!(
            actor = %session.actor,
            trust_model = %config.admin.trust_model,
            "Creating ChatClient"
        );

        let admin = Arc::new(AdminResolver::from_config(&config.admin, Arc::clone(&store)));
        let gateway = MutationGateway::new(Arc::clone(&store), config.gateway.clone());
        let registry = ChannelRegistry::new(store, Arc::clone(&admin), config.channel.clone());

        ChatClient {
            session,
            admin,
            gateway,
            registry,
        }
    }

    /// Replace the gateway's timestamp source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.gateway = self.gateway.with_clock(clock);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn admin(&self) -> &Arc<AdminResolver> {
        &self.admin
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Start observing `channel`
    pub fn open(&self, channel: &str) -> watch::Receiver<ChannelSnapshot> {
        self.registry.subscribe(channel, &self.session)
    }

    /// Latest derived state; empty if the channel is not observed
    pub fn current(&self, channel: &str) -> ChannelSnapshot {
        self.registry
            .snapshot(channel)
            .unwrap_or_else(|| ChannelSnapshot::empty(channel))
    }

    /// Rename `channel`
    pub async fn rename(&self, channel: &str, name: &str) -> GatewayResult<WriteOutcome> {
        let state = self.current(channel);
        let current_name = state.name.as_deref().unwrap_or_default();
        self.gateway
            .set_chat_name(name, current_name, &state.members, channel, &self.session)
            .await
    }

    /// Make this session a member of `channel`
    ///
    /// Publishes the creator's own Add event; a no-op once the session is
    /// already a member.
    pub async fn create(&self, channel: &str) -> GatewayResult<WriteOutcome> {
        let state = self.current(channel);
        self.gateway
            .create_channel(&state.members, channel, &self.session)
            .await
    }

    /// Add `member` to `channel`
    pub async fn invite(&self, channel: &str, member: &str) -> GatewayResult<WriteOutcome> {
        let state = self.current(channel);
        self.gateway
            .add_member(member, &state.members, channel, &self.session)
            .await
    }

    /// Remove `member` from `channel`
    pub async fn remove(&self, channel: &str, member: &str) -> GatewayResult<WriteOutcome> {
        let state = self.current(channel);
        self.gateway
            .remove_member(member, &state.members, channel, &self.session)
            .await
    }

    /// Send a message to the current members of `channel`
    pub async fn send(&self, channel: &str, content: &str) -> GatewayResult<WriteOutcome> {
        let state = self.current(channel);
        self.gateway
            .send_message(content, &state.members, channel, &self.session)
            .await
    }
}
