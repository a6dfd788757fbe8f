/*
    object.rs - Object model of the external store

    StoredObject: what discovery yields (immutable once published)
    ObjectDraft:  what a writer hands to `put`; the store fills in actor and url
    Session:      the caller identity supplied by the identity provider
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Identity string of a publisher or reader
pub type Actor = String;

/// Object as returned by discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Store-assigned unique locator
    pub url: String,

    /// Publisher identity
    pub actor: Actor,

    /// Schema-shaped payload
    pub value: Value,

    /// Tags under which the object is discoverable
    pub channels: BTreeSet<String>,

    /// Readers permitted to see the object; `None` or empty means public
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<BTreeSet<Actor>>,
}

impl StoredObject {
    /// Publisher-supplied timestamp, if the payload carries one
    pub fn published(&self) -> Option<u64> {
        self.value.get("published").and_then(Value::as_u64)
    }

    /// Whether `reader` may see this object
    pub fn is_visible_to(&self, reader: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(allowed) if allowed.is_empty() => true,
            Some(allowed) => self.actor == reader || allowed.contains(reader),
        }
    }

    /// Whether the object is tagged with any of `channels`
    pub fn is_tagged_with<S: AsRef<str>>(&self, channels: &[S]) -> bool {
        channels.iter().any(|c| self.channels.contains(c.as_ref()))
    }
}

/// Object handed to the store for publication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDraft {
    pub value: Value,
    pub channels: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<BTreeSet<Actor>>,
}

impl ObjectDraft {
    /// Create a public, untagged draft
    pub fn new(value: Value) -> Self {
        ObjectDraft {
            value,
            channels: BTreeSet::new(),
            allowed: None,
        }
    }

    /// Tag the draft for discovery under `channels`
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels.extend(channels.into_iter().map(Into::into));
        self
    }

    /// Restrict readers to `allowed`
    pub fn with_allowed<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(allowed.into_iter().map(Into::into).collect());
        self
    }
}

/// Caller identity for discovery and writes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    pub actor: Actor,
}

impl Session {
    pub fn new(actor: impl Into<Actor>) -> Self {
        Session { actor: actor.into() }
    }
}
