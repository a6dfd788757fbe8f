//! Test fixtures for creating common test objects
//!
//! Factory functions for discovered objects of each kind, helpers that
//! publish through a store, and a manually driven clock.

use crate::core_gateway::Clock;
use crate::core_schema::Activity;
use crate::core_store::{Actor, ObjectDraft, ObjectStore, Session, StoredObject};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Build a member set from names
pub fn members(names: &[&str]) -> BTreeSet<Actor> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Builder for discovered objects
pub struct TestObjectBuilder {
    url: String,
    actor: String,
    value: Value,
    channels: BTreeSet<String>,
    allowed: Option<BTreeSet<Actor>>,
}

impl TestObjectBuilder {
    pub fn new(url: impl Into<String>, actor: impl Into<String>, value: Value) -> Self {
        Self {
            url: url.into(),
            actor: actor.into(),
            value,
            channels: BTreeSet::new(),
            allowed: None,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channels.insert(channel.into());
        self
    }

    pub fn with_allowed(mut self, allowed: &[&str]) -> Self {
        self.allowed = Some(members(allowed));
        self
    }

    pub fn build(self) -> StoredObject {
        StoredObject {
            url: self.url,
            actor: self.actor,
            value: self.value,
            channels: self.channels,
            allowed: self.allowed,
        }
    }
}

fn chat_name_value(channel: &str, name: &str, published: u64) -> Value {
    json!({ "describes": channel, "name": name, "published": published })
}

fn member_update_value(activity: Activity, target: &str, channel: &str, published: u64) -> Value {
    json!({
        "activity": activity.as_str(),
        "target": target,
        "object": channel,
        "published": published
    })
}

fn message_value(content: &str, published: u64) -> Value {
    json!({ "content": content, "published": published, "to": [] })
}

/// Discovered name claim for `channel`
pub fn chat_name_object(url: &str, actor: &str, channel: &str, name: &str, published: u64) -> StoredObject {
    TestObjectBuilder::new(url, actor, chat_name_value(channel, name, published))
        .with_channel(channel)
        .build()
}

/// Discovered membership event, tagged like the gateway tags it
pub fn member_update_object(
    url: &str,
    actor: &str,
    activity: Activity,
    target: &str,
    channel: &str,
    published: u64,
) -> StoredObject {
    TestObjectBuilder::new(url, actor, member_update_value(activity, target, channel, published))
        .with_channel(channel)
        .with_channel(target)
        .build()
}

/// Discovered public message on `channel`
pub fn message_object(url: &str, actor: &str, channel: &str, content: &str, published: u64) -> StoredObject {
    TestObjectBuilder::new(url, actor, message_value(content, published))
        .with_channel(channel)
        .build()
}

/// Publish a name claim as `actor`
pub async fn publish_chat_name<S: ObjectStore + ?Sized>(
    store: &S,
    actor: &str,
    channel: &str,
    name: &str,
    published: u64,
) -> StoredObject {
    let draft = ObjectDraft::new(chat_name_value(channel, name, published)).with_channels([channel]);
    store
        .put(draft, &Session::new(actor))
        .await
        .expect("publishing a name claim")
}

/// Publish a membership event as `actor`
pub async fn publish_member_update<S: ObjectStore + ?Sized>(
    store: &S,
    actor: &str,
    activity: Activity,
    target: &str,
    channel: &str,
    published: u64,
) -> StoredObject {
    let draft = ObjectDraft::new(member_update_value(activity, target, channel, published))
        .with_channels([channel, target]);
    store
        .put(draft, &Session::new(actor))
        .await
        .expect("publishing a membership event")
}

/// Publish a public message as `actor`
pub async fn publish_message<S: ObjectStore + ?Sized>(
    store: &S,
    actor: &str,
    channel: &str,
    content: &str,
    published: u64,
) -> StoredObject {
    let draft = ObjectDraft::new(message_value(content, published)).with_channels([channel]);
    store
        .put(draft, &Session::new(actor))
        .await
        .expect("publishing a message")
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
