/*
    state.rs - Derived state of one channel

    Holds everything discovered for a channel and derives:
    - the current name (last-write-wins over name claims)
    - the member set (MemberLog)
    - the newest-first message history (Timeline)
    - the admin, as last reported by the AdminResolver

    Name selection follows last-write-wins: the claim with the greatest
    `published` wins, equal timestamps go to the greater actor id, then the
    greater url.
*/

use crate::core_membership::MemberLog;
use crate::core_schema::{classify, ChatMessage, ChatName, Envelope, ObjectKind};
use crate::core_store::{Actor, StoredObject};
use crate::core_timeline::Timeline;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::trace;

/// Channel state configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Only accept name claims published by the channel admin
    pub trusted_names: bool,
}

/// Pick the current name among `claims`
///
/// With `trusted` set, only claims published by that actor count.
pub fn current_name<'a, I>(claims: I, trusted: Option<&str>) -> Option<String>
where
    I: IntoIterator<Item = &'a Envelope<ChatName>>,
{
    claims
        .into_iter()
        .filter(|claim| trusted.map_or(true, |actor| claim.actor == actor))
        .max_by(|a, b| a.order_key().cmp(&b.order_key()))
        .map(|claim| claim.value.name.clone())
}

/// Point-in-time view of a channel's derived state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSnapshot {
    pub channel: String,
    /// `None` until a usable name claim is discovered
    pub name: Option<String>,
    pub members: BTreeSet<Actor>,
    /// `Some("")` when resolution found no admin
    pub admin: Option<String>,
    /// Newest first
    pub messages: Vec<Envelope<ChatMessage>>,
}

impl ChannelSnapshot {
    /// Snapshot of a channel nothing is known about yet
    pub fn empty(channel: impl Into<String>) -> Self {
        ChannelSnapshot {
            channel: channel.into(),
            ..Default::default()
        }
    }

    pub fn is_member(&self, actor: &str) -> bool {
        self.members.contains(actor)
    }

    /// Whether `actor` is the resolved, non-empty admin
    pub fn is_admin(&self, actor: &str) -> bool {
        self.admin.as_deref().is_some_and(|admin| !admin.is_empty() && admin == actor)
    }
}

/// Accumulated discovery results of one channel
#[derive(Debug, Clone)]
pub struct ChannelState {
    channel: String,
    names: Vec<Envelope<ChatName>>,
    seen_names: HashSet<String>,
    members: MemberLog,
    timeline: Timeline,
    admin: Option<String>,
    trusted_names: bool,
}

impl ChannelState {
    pub fn new(channel: impl Into<String>) -> Self {
        ChannelState {
            channel: channel.into(),
            names: Vec::new(),
            seen_names: HashSet::new(),
            members: MemberLog::new(),
            timeline: Timeline::new(),
            admin: None,
            trusted_names: false,
        }
    }

    /// Restrict name claims to the resolved admin
    pub fn with_trusted_names(mut self, trusted_names: bool) -> Self {
        self.trusted_names = trusted_names;
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Route a discovered object to its reducer
    ///
    /// Returns true if any derived value changed. Objects matching no
    /// contract for this channel are ignored.
    pub fn ingest(&mut self, object: &StoredObject) -> bool {
        match classify(object, &self.channel) {
            Some(ObjectKind::ChatName(claim)) => self.insert_name(claim),
            Some(ObjectKind::MemberUpdate(event)) => self.members.insert(event),
            Some(ObjectKind::Message(message)) => self.timeline.insert(message),
            None => {
                trace!(channel = %self.channel, url = %object.url, "Ignoring unclassified object");
                false
            }
        }
    }

    fn insert_name(&mut self, claim: Envelope<ChatName>) -> bool {
        if !self.seen_names.insert(claim.url.clone()) {
            return false;
        }
        let before = self.name();
        self.names.push(claim);
        self.name() != before
    }

    /// Current display name
    pub fn name(&self) -> Option<String> {
        if !self.trusted_names {
            return current_name(&self.names, None);
        }
        match self.admin.as_deref() {
            Some(admin) if !admin.is_empty() => current_name(&self.names, Some(admin)),
            _ => None,
        }
    }

    pub fn members(&self) -> &BTreeSet<Actor> {
        self.members.members()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn admin(&self) -> Option<&str> {
        self.admin.as_deref()
    }

    /// Record the resolver's latest answer; returns true if it changed
    pub fn set_admin(&mut self, admin: Option<String>) -> bool {
        if self.admin == admin {
            return false;
        }
        self.admin = admin;
        true
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            channel: self.channel.clone(),
            name: self.name(),
            members: self.members().clone(),
            admin: self.admin.clone(),
            messages: self.timeline.entries().to_vec(),
        }
    }
}
