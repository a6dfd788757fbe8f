/*
    payload.rs - Typed views of the three channel object kinds

    Discovered objects carry an untyped JSON `value`. Once a value passes one
    of the schema contracts it is decoded into one of these payloads and
    wrapped in an Envelope that keeps the publishing actor and object url.
*/

use crate::core_store::{Actor, StoredObject};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Anything ordered by its publisher-supplied timestamp
pub trait HasPublished {
    fn published(&self) -> u64;
}

/// Claim that a channel should be displayed under `name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatName {
    pub describes: String,
    pub name: String,
    pub published: u64,
}

/// Membership change direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activity {
    Add,
    Remove,
}

impl Activity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Add => "Add",
            Activity::Remove => "Remove",
        }
    }
}

/// Add or remove `target` from the channel named by `object`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberUpdate {
    pub activity: Activity,
    pub target: Actor,
    pub object: String,
    pub published: u64,
}

/// Chat message; `to` is the audience at send time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub published: u64,
    #[serde(default)]
    pub to: BTreeSet<Actor>,
}

impl HasPublished for ChatName {
    fn published(&self) -> u64 {
        self.published
    }
}

impl HasPublished for MemberUpdate {
    fn published(&self) -> u64 {
        self.published
    }
}

impl HasPublished for ChatMessage {
    fn published(&self) -> u64 {
        self.published
    }
}

/// Decoded payload together with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub url: String,
    pub actor: Actor,
    pub value: T,
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decode the payload of a discovered object
    pub fn decode(object: &StoredObject) -> Result<Self, serde_json::Error> {
        Ok(Envelope {
            url: object.url.clone(),
            actor: object.actor.clone(),
            value: serde_json::from_value(object.value.clone())?,
        })
    }
}

impl<T: HasPublished> HasPublished for Envelope<T> {
    fn published(&self) -> u64 {
        self.value.published()
    }
}

impl<T: HasPublished> Envelope<T> {
    /// Total order key: timestamp, then actor, then url
    pub fn order_key(&self) -> (u64, &str, &str) {
        (self.value.published(), self.actor.as_str(), self.url.as_str())
    }
}

/// A discovered object sorted into one of the known kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    ChatName(Envelope<ChatName>),
    MemberUpdate(Envelope<MemberUpdate>),
    Message(Envelope<ChatMessage>),
}

impl ObjectKind {
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::ChatName(_) => "chat_name",
            ObjectKind::MemberUpdate(_) => "member_update",
            ObjectKind::Message(_) => "message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: serde_json::Value) -> StoredObject {
        StoredObject {
            url: "obj:1".to_string(),
            actor: "alice".to_string(),
            value,
            channels: BTreeSet::from(["c".to_string()]),
            allowed: None,
        }
    }

    #[test]
    fn test_decode_member_update() {
        let env: Envelope<MemberUpdate> = Envelope::decode(&object(json!({
            "activity": "Remove",
            "target": "bob",
            "object": "c",
            "published": 7
        })))
        .unwrap();

        assert_eq!(env.actor, "alice");
        assert_eq!(env.value.activity, Activity::Remove);
        assert_eq!(env.published(), 7);
    }

    #[test]
    fn test_message_without_audience_decodes_empty() {
        let env: Envelope<ChatMessage> =
            Envelope::decode(&object(json!({"content": "hi", "published": 3}))).unwrap();
        assert!(env.value.to.is_empty());
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let result: Result<Envelope<ChatName>, _> = Envelope::decode(&object(json!({"name": 1})));
        assert!(result.is_err());
    }

    #[test]
    fn test_order_key_breaks_ties_by_actor() {
        let a = Envelope { url: "u2".into(), actor: "a".into(), value: ChatMessage { content: String::new(), published: 5, to: BTreeSet::new() } };
        let b = Envelope { url: "u1".into(), actor: "b".into(), value: ChatMessage { content: String::new(), published: 5, to: BTreeSet::new() } };
        assert!(a.order_key() < b.order_key());
    }
}
