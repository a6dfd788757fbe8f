//! Mutation Gateway
//!
//! The only write path into a channel. Every operation validates its input
//! against the current derived state, builds a payload, checks the payload
//! against its own schema contract and hands it to the store.
//!
//! # Outcomes
//!
//! - Redundant or empty input: `Ok(WriteOutcome::Skipped(_))`, nothing is written
//! - Accepted input: `Ok(WriteOutcome::Published(object))`
//! - Store failure: `Err(GatewayError::Store(_))`, never retried
//!
//! Success only means the store accepted the object. It reaches derived
//! state later, through discovery.

use super::clock::{Clock, SystemClock};
use super::errors::{GatewayError, GatewayResult};
use crate::core_schema::{
    chat_name_schema, member_update_schema, message_schema, Activity, ChatMessage, ChatName, MemberUpdate,
    SchemaFilter,
};
use crate::core_store::{Actor, ObjectDraft, ObjectStore, Session, StoredObject};
use crate::metrics::record_counter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Refuse to publish an Add event whose target is the acting session
    pub forbid_self_add: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig { forbid_self_add: true }
    }
}

/// Why a mutation produced no write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingChannel,
    EmptyName,
    NameUnchanged,
    EmptyMember,
    AlreadyMember,
    SelfAdd,
    NotAMember,
    EmptyMessage,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingChannel => "missing_channel",
            SkipReason::EmptyName => "empty_name",
            SkipReason::NameUnchanged => "name_unchanged",
            SkipReason::EmptyMember => "empty_member",
            SkipReason::AlreadyMember => "already_member",
            SkipReason::SelfAdd => "self_add",
            SkipReason::NotAMember => "not_a_member",
            SkipReason::EmptyMessage => "empty_message",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a mutation that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The store accepted the object
    Published(StoredObject),
    /// Nothing to do
    Skipped(SkipReason),
}

impl WriteOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, WriteOutcome::Published(_))
    }

    pub fn object(&self) -> Option<&StoredObject> {
        match self {
            WriteOutcome::Published(object) => Some(object),
            WriteOutcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            WriteOutcome::Published(_) => None,
            WriteOutcome::Skipped(reason) => Some(*reason),
        }
    }
}

/// Validated draft ready for the store
struct Write {
    kind: &'static str,
    channels: Vec<String>,
    allowed: BTreeSet<Actor>,
}

/// Guarded write path for channel objects
pub struct MutationGateway {
    /// Object store the drafts are handed to
    store: Arc<dyn ObjectStore>,

    /// Source of `published` timestamps
    clock: Arc<dyn Clock>,

    config: GatewayConfig,
}

impl MutationGateway {
    /// Create a gateway stamping objects with the wall clock
    pub fn new(store: Arc<dyn ObjectStore>, config: GatewayConfig) -> Self {
        info!(forbid_self_add = config.forbid_self_add, "Creating MutationGateway");
        MutationGateway {
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the timestamp source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Publish a new display name for `channel`
    ///
    /// # Arguments
    ///
    /// * `name` - Proposed name
    /// * `current_name` - Name currently derived for the channel
    /// * `members` - Current member set; becomes the claim's readers
    /// * `channel` - Channel id
    /// * `session` - Acting identity
    pub async fn set_chat_name(
        &self,
        name: &str,
        current_name: &str,
        members: &BTreeSet<Actor>,
        channel: &str,
        session: &Session,
    ) -> GatewayResult<WriteOutcome> {
        if channel.is_empty() {
            return Ok(self.skip("set_chat_name", channel, SkipReason::MissingChannel));
        }
        if name.is_empty() {
            return Ok(self.skip("set_chat_name", channel, SkipReason::EmptyName));
        }
        if name == current_name {
            return Ok(self.skip("set_chat_name", channel, SkipReason::NameUnchanged));
        }

        let claim = ChatName {
            describes: channel.to_string(),
            name: name.to_string(),
            published: self.clock.now_millis(),
        };
        let write = Write {
            kind: "chat_name",
            channels: vec![channel.to_string()],
            allowed: members.clone(),
        };
        self.publish(write, &claim, &chat_name_schema(channel), session).await
    }

    /// Publish an Add event for `new_member`
    ///
    /// The event is tagged with both the channel and the new member so the
    /// invitee can discover it, and is readable by the members plus the
    /// invitee.
    pub async fn add_member(
        &self,
        new_member: &str,
        members: &BTreeSet<Actor>,
        channel: &str,
        session: &Session,
    ) -> GatewayResult<WriteOutcome> {
        if channel.is_empty() {
            return Ok(self.skip("add_member", channel, SkipReason::MissingChannel));
        }
        if new_member.is_empty() {
            return Ok(self.skip("add_member", channel, SkipReason::EmptyMember));
        }
        if members.contains(new_member) {
            return Ok(self.skip("add_member", channel, SkipReason::AlreadyMember));
        }
        if self.config.forbid_self_add && new_member == session.actor {
            return Ok(self.skip("add_member", channel, SkipReason::SelfAdd));
        }

        self.publish_add(new_member, members, channel, session).await
    }

    /// Publish the creator's own Add event for `channel`
    ///
    /// This is how the acting session becomes a member when
    /// `forbid_self_add` rules out adding itself through
    /// [`MutationGateway::add_member`].
    pub async fn create_channel(
        &self,
        members: &BTreeSet<Actor>,
        channel: &str,
        session: &Session,
    ) -> GatewayResult<WriteOutcome> {
        if channel.is_empty() {
            return Ok(self.skip("create_channel", channel, SkipReason::MissingChannel));
        }
        if members.contains(&session.actor) {
            return Ok(self.skip("create_channel", channel, SkipReason::AlreadyMember));
        }

        self.publish_add(&session.actor, members, channel, session).await
    }

    /// Publish a Remove event for `member`
    pub async fn remove_member(
        &self,
        member: &str,
        members: &BTreeSet<Actor>,
        channel: &str,
        session: &Session,
    ) -> GatewayResult<WriteOutcome> {
        if channel.is_empty() {
            return Ok(self.skip("remove_member", channel, SkipReason::MissingChannel));
        }
        if !members.contains(member) {
            return Ok(self.skip("remove_member", channel, SkipReason::NotAMember));
        }

        let event = self.member_update(Activity::Remove, member, channel);
        let write = Write {
            kind: "member_update",
            channels: vec![channel.to_string(), member.to_string()],
            allowed: members.clone(),
        };
        self.publish(write, &event, &member_update_schema(channel), session).await
    }

    /// Publish a message readable by exactly the current members
    pub async fn send_message(
        &self,
        content: &str,
        members: &BTreeSet<Actor>,
        channel: &str,
        session: &Session,
    ) -> GatewayResult<WriteOutcome> {
        if channel.is_empty() {
            return Ok(self.skip("send_message", channel, SkipReason::MissingChannel));
        }
        if content.is_empty() {
            return Ok(self.skip("send_message", channel, SkipReason::EmptyMessage));
        }

        let message = ChatMessage {
            content: content.to_string(),
            published: self.clock.now_millis(),
            to: members.clone(),
        };
        let write = Write {
            kind: "message",
            channels: vec![channel.to_string()],
            allowed: members.clone(),
        };
        self.publish(write, &message, &message_schema(), session).await
    }

    async fn publish_add(
        &self,
        target: &str,
        members: &BTreeSet<Actor>,
        channel: &str,
        session: &Session,
    ) -> GatewayResult<WriteOutcome> {
        let event = self.member_update(Activity::Add, target, channel);
        let mut allowed = members.clone();
        allowed.insert(target.to_string());
        let write = Write {
            kind: "member_update",
            channels: vec![channel.to_string(), target.to_string()],
            allowed,
        };
        self.publish(write, &event, &member_update_schema(channel), session).await
    }

    fn member_update(&self, activity: Activity, target: &str, channel: &str) -> MemberUpdate {
        MemberUpdate {
            activity,
            target: target.to_string(),
            object: channel.to_string(),
            published: self.clock.now_millis(),
        }
    }

    fn skip(&self, operation: &'static str, channel: &str, reason: SkipReason) -> WriteOutcome {
        debug!(operation, channel, reason = reason.as_str(), "Skipping mutation");
        record_counter("gateway.writes.skipped", 1);
        WriteOutcome::Skipped(reason)
    }

    async fn publish<T: Serialize>(
        &self,
        write: Write,
        payload: &T,
        contract: &SchemaFilter,
        session: &Session,
    ) -> GatewayResult<WriteOutcome> {
        let value = serde_json::to_value(payload)?;
        if !contract.matches_value(&value) {
            return Err(GatewayError::InvalidDraft {
                kind: write.kind,
                reason: format!("payload does not satisfy the {} contract", contract.kind()),
            });
        }

        let draft = ObjectDraft::new(value)
            .with_channels(write.channels)
            .with_allowed(write.allowed);
        let object = self.store.put(draft, session).await?;

        info!(
            kind = write.kind,
            url = %object.url,
            actor = %object.actor,
            channels = ?object.channels,
            "Published object"
        );
        record_counter("gateway.writes.published", 1);
        Ok(WriteOutcome::Published(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_schema::{classify, Envelope, ObjectKind};
    use crate::core_store::{MemoryStore, StoreError};
    use crate::test_utils::{members, ManualClock};

    fn gateway(store: &Arc<MemoryStore>) -> MutationGateway {
        MutationGateway::new(store.clone(), GatewayConfig::default()).with_clock(Arc::new(ManualClock::new(1_000)))
    }

    #[tokio::test]
    async fn test_no_ops_write_nothing() {
        let store = Arc::new(MemoryStore::snapshot());
        let gateway = gateway(&store);
        let alice = Session::new("alice");
        let current = members(&["alice", "bob"]);

        let outcomes = vec![
            gateway.add_member("", &current, "general", &alice).await.unwrap(),
            gateway.add_member("bob", &current, "general", &alice).await.unwrap(),
            gateway.remove_member("carol", &current, "general", &alice).await.unwrap(),
            gateway.set_chat_name("", "General", &current, "general", &alice).await.unwrap(),
            gateway.set_chat_name("General", "General", &current, "general", &alice).await.unwrap(),
            gateway.send_message("", &current, "general", &alice).await.unwrap(),
        ];

        let reasons: Vec<_> = outcomes.iter().filter_map(WriteOutcome::skip_reason).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::EmptyMember,
                SkipReason::AlreadyMember,
                SkipReason::NotAMember,
                SkipReason::EmptyName,
                SkipReason::NameUnchanged,
                SkipReason::EmptyMessage,
            ]
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_self_add_is_configurable() {
        let store = Arc::new(MemoryStore::snapshot());
        let alice = Session::new("alice");

        let strict = gateway(&store);
        let outcome = strict.add_member("alice", &BTreeSet::new(), "general", &alice).await.unwrap();
        assert_eq!(outcome.skip_reason(), Some(SkipReason::SelfAdd));
        assert!(store.is_empty());

        let lenient = MutationGateway::new(store.clone(), GatewayConfig { forbid_self_add: false });
        let outcome = lenient.add_member("alice", &BTreeSet::new(), "general", &alice).await.unwrap();
        assert!(outcome.is_published());
    }

    #[tokio::test]
    async fn test_create_channel_adds_creator_under_strict_config() {
        let store = Arc::new(MemoryStore::snapshot());
        let gateway = gateway(&store);
        let alice = Session::new("alice");
        assert!(gateway.config().forbid_self_add);

        let outcome = gateway.create_channel(&BTreeSet::new(), "general", &alice).await.unwrap();
        let object = outcome.object().unwrap();
        assert_eq!(object.channels, members(&["general", "alice"]));
        assert_eq!(object.allowed, Some(members(&["alice"])));
        assert_eq!(object.value["target"], "alice");

        let again = gateway.create_channel(&members(&["alice"]), "general", &alice).await.unwrap();
        assert_eq!(again.skip_reason(), Some(SkipReason::AlreadyMember));
        let missing = gateway.create_channel(&BTreeSet::new(), "", &alice).await.unwrap();
        assert_eq!(missing.skip_reason(), Some(SkipReason::MissingChannel));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_add_member_tags_and_audience() {
        let store = Arc::new(MemoryStore::snapshot());
        let gateway = gateway(&store);
        let current = members(&["alice"]);

        let outcome = gateway
            .add_member("bob", &current, "general", &Session::new("alice"))
            .await
            .unwrap();
        let object = outcome.object().unwrap();

        assert_eq!(object.actor, "alice");
        assert_eq!(object.channels, members(&["general", "bob"]));
        assert_eq!(object.allowed, Some(members(&["alice", "bob"])));

        match classify(object, "general") {
            Some(ObjectKind::MemberUpdate(Envelope { value, .. })) => {
                assert_eq!(value.activity, Activity::Add);
                assert_eq!(value.target, "bob");
                assert_eq!(value.published, 1_000);
            }
            other => panic!("expected member update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remove_member_restricted_to_members() {
        let store = Arc::new(MemoryStore::snapshot());
        let gateway = gateway(&store);
        let current = members(&["alice", "bob"]);

        let outcome = gateway
            .remove_member("bob", &current, "general", &Session::new("alice"))
            .await
            .unwrap();
        let object = outcome.object().unwrap();
        assert_eq!(object.allowed, Some(current));
        assert_eq!(object.value["activity"], "Remove");
    }

    #[tokio::test]
    async fn test_send_message_records_audience() {
        let store = Arc::new(MemoryStore::snapshot());
        let gateway = gateway(&store);
        let current = members(&["alice", "bob"]);

        let outcome = gateway
            .send_message("hello", &current, "general", &Session::new("alice"))
            .await
            .unwrap();
        let object = outcome.object().unwrap();

        assert_eq!(object.channels, members(&["general"]));
        let message: ChatMessage = serde_json::from_value(object.value.clone()).unwrap();
        assert_eq!(message.to, current);
        assert_eq!(message.published, 1_000);
    }

    #[tokio::test]
    async fn test_set_chat_name_publishes_claim() {
        let store = Arc::new(MemoryStore::snapshot());
        let gateway = gateway(&store);

        let outcome = gateway
            .set_chat_name("Lobby", "", &members(&["alice"]), "general", &Session::new("alice"))
            .await
            .unwrap();
        let object = outcome.object().unwrap();
        assert_eq!(object.value["describes"], "general");
        assert_eq!(object.value["name"], "Lobby");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(MemoryStore::snapshot());
        store.fail_puts(Some(StoreError::Rejected("offline".to_string())));
        let gateway = gateway(&store);

        let result = gateway
            .send_message("hello", &BTreeSet::new(), "general", &Session::new("alice"))
            .await;
        assert!(matches!(result, Err(GatewayError::Store(StoreError::Rejected(_)))));
    }

    #[tokio::test]
    async fn test_missing_channel_is_skipped() {
        let store = Arc::new(MemoryStore::snapshot());
        let gateway = gateway(&store);

        let outcome = gateway
            .send_message("hello", &BTreeSet::new(), "", &Session::new("alice"))
            .await
            .unwrap();
        assert_eq!(outcome.skip_reason(), Some(SkipReason::MissingChannel));
    }
}
