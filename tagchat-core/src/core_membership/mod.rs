/*
    core_membership - Membership reducer

    The member set of a channel is the fold of every discovered Add/Remove
    event, applied in ascending `published` order starting from the empty set.

    Events with equal timestamps are ordered by publishing actor, then by
    object url, so the fold never depends on discovery arrival order.

    Discovery only ever grows within a session, so MemberLog keeps the full
    event set and refolds it on every insertion rather than patching the
    previous result.
*/

use crate::core_schema::{Activity, Envelope, MemberUpdate};
use crate::core_store::Actor;
use std::collections::{BTreeSet, HashSet};
use tracing::trace;

/// Fold membership events into the current member set
pub fn fold_members<'a, I>(events: I) -> BTreeSet<Actor>
where
    I: IntoIterator<Item = &'a Envelope<MemberUpdate>>,
{
    let mut ordered: Vec<&Envelope<MemberUpdate>> = events.into_iter().collect();
    ordered.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

    ordered.into_iter().fold(BTreeSet::new(), |mut members, event| {
        match event.value.activity {
            Activity::Add => {
                members.insert(event.value.target.clone());
            }
            Activity::Remove => {
                members.remove(&event.value.target);
            }
        }
        members
    })
}

/// Accumulated membership events of one channel with the derived member set
#[derive(Debug, Clone, Default)]
pub struct MemberLog {
    events: Vec<Envelope<MemberUpdate>>,
    seen: HashSet<String>,
    members: BTreeSet<Actor>,
}

impl MemberLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a discovered event; returns true if the member set changed
    pub fn insert(&mut self, event: Envelope<MemberUpdate>) -> bool {
        if !self.seen.insert(event.url.clone()) {
            return false;
        }

        trace!(
            url = %event.url,
            activity = event.value.activity.as_str(),
            target = %event.value.target,
            published = event.value.published,
            "Folding membership event"
        );
        self.events.push(event);

        let members = fold_members(&self.events);
        if members == self.members {
            return false;
        }
        self.members = members;
        true
    }

    pub fn members(&self) -> &BTreeSet<Actor> {
        &self.members
    }

    pub fn contains(&self, actor: &str) -> bool {
        self.members.contains(actor)
    }

    pub fn events(&self) -> &[Envelope<MemberUpdate>] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(url: &str, actor: &str, activity: Activity, target: &str, published: u64) -> Envelope<MemberUpdate> {
        Envelope {
            url: url.to_string(),
            actor: actor.to_string(),
            value: MemberUpdate {
                activity,
                target: target.to_string(),
                object: "general".to_string(),
                published,
            },
        }
    }

    fn set(members: &[&str]) -> BTreeSet<Actor> {
        members.iter().map(|m| m.to_string()).collect()
    }

    #[test]
    fn test_fold_applies_in_published_order() {
        let events = vec![
            event("u2", "alice", Activity::Remove, "bob", 20),
            event("u1", "alice", Activity::Add, "bob", 10),
            event("u3", "alice", Activity::Add, "carol", 30),
        ];
        assert_eq!(fold_members(&events), set(&["carol"]));
    }

    #[test]
    fn test_readd_after_remove() {
        let events = vec![
            event("u1", "alice", Activity::Add, "bob", 10),
            event("u2", "alice", Activity::Remove, "bob", 20),
            event("u3", "alice", Activity::Add, "bob", 30),
        ];
        assert_eq!(fold_members(&events), set(&["bob"]));
    }

    #[test]
    fn test_remove_of_non_member_is_harmless() {
        let events = vec![event("u1", "alice", Activity::Remove, "bob", 10)];
        assert!(fold_members(&events).is_empty());
    }

    #[test]
    fn test_equal_timestamps_break_ties_by_actor() {
        // "alice" sorts before "zed", so zed's Remove is applied last.
        let forward = vec![
            event("u1", "alice", Activity::Add, "bob", 10),
            event("u2", "zed", Activity::Remove, "bob", 10),
        ];
        let backward: Vec<_> = forward.iter().rev().cloned().collect();

        assert!(fold_members(&forward).is_empty());
        assert_eq!(fold_members(&forward), fold_members(&backward));
    }

    #[test]
    fn test_member_log_reports_changes() {
        let mut log = MemberLog::new();
        assert!(log.insert(event("u1", "alice", Activity::Add, "bob", 10)));
        assert!(!log.insert(event("u1", "alice", Activity::Add, "bob", 10)));
        assert!(!log.insert(event("u2", "alice", Activity::Add, "bob", 5)));
        assert!(log.contains("bob"));
        assert_eq!(log.events().len(), 2);
    }

    #[test]
    fn test_member_log_late_arrival_refolds() {
        let mut log = MemberLog::new();
        log.insert(event("u2", "alice", Activity::Remove, "bob", 20));
        assert!(log.members().is_empty());

        // The earlier Add arrives late; the Remove still wins.
        assert!(!log.insert(event("u1", "alice", Activity::Add, "bob", 10)));
        assert!(log.members().is_empty());
    }
}
