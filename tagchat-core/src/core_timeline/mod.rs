//! Timeline reducer
//!
//! Turns an unordered set of discovered messages into a newest-first
//! sequence and clusters adjacent runs. The free functions are pure and
//! reusable for any timestamped item; [`Timeline`] accumulates discovered
//! messages and re-sorts the full set whenever it grows.

use crate::core_schema::{ChatMessage, Envelope, HasPublished};
use std::collections::HashSet;

/// Stable sort, newest first
///
/// Items with equal timestamps keep their relative input order.
pub fn sort_by_published<T: HasPublished>(mut items: Vec<T>) -> Vec<T> {
    items.sort_by(|a, b| b.published().cmp(&a.published()));
    items
}

/// Partition `items` into maximal adjacent runs
///
/// Scans left to right. An item joins the current group when
/// `is_group_member(group, item)` holds, otherwise it starts a new group.
/// Groups are never empty and input order is preserved.
pub fn group_adjacent_by<T, I, F>(items: I, mut is_group_member: F) -> Vec<Vec<T>>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&[T], &T) -> bool,
{
    let mut grouped: Vec<Vec<T>> = Vec::new();

    for item in items {
        match grouped.last_mut() {
            Some(group) if is_group_member(group, &item) => group.push(item),
            _ => grouped.push(vec![item]),
        }
    }

    grouped
}

/// Accumulated, newest-first message history of one channel
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Vec<Envelope<ChatMessage>>,
    seen: HashSet<String>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a discovered message; returns false for an already-seen url
    pub fn insert(&mut self, message: Envelope<ChatMessage>) -> bool {
        if !self.seen.insert(message.url.clone()) {
            return false;
        }
        self.entries.push(message);
        // Full re-sort: arrival order says nothing about publish order.
        self.entries.sort_by(|a, b| {
            b.published()
                .cmp(&a.published())
                .then_with(|| a.actor.cmp(&b.actor))
                .then_with(|| a.url.cmp(&b.url))
        });
        true
    }

    pub fn entries(&self) -> &[Envelope<ChatMessage>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consecutive messages by the same sender
    ///
    /// With `max_gap` set, a run also breaks when two neighbouring messages
    /// are more than `max_gap` milliseconds apart.
    pub fn grouped_by_sender(&self, max_gap: Option<u64>) -> Vec<Vec<&Envelope<ChatMessage>>> {
        group_adjacent_by(self.entries.iter(), |group, message| {
            let same_sender = group[0].actor == message.actor;
            let close_enough = match (max_gap, group.last()) {
                (Some(gap), Some(last)) => last.published().saturating_sub(message.published()) <= gap,
                _ => true,
            };
            same_sender && close_enough
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        published: u64,
        tag: &'static str,
    }

    impl HasPublished for Item {
        fn published(&self) -> u64 {
            self.published
        }
    }

    fn item(published: u64, tag: &'static str) -> Item {
        Item { published, tag }
    }

    fn message(url: &str, actor: &str, published: u64) -> Envelope<ChatMessage> {
        Envelope {
            url: url.to_string(),
            actor: actor.to_string(),
            value: ChatMessage {
                content: format!("{} says hi", actor),
                published,
                to: BTreeSet::new(),
            },
        }
    }

    #[test]
    fn test_sort_newest_first() {
        let sorted = sort_by_published(vec![item(1, "a"), item(3, "b"), item(2, "c")]);
        let published: Vec<u64> = sorted.iter().map(|i| i.published).collect();
        assert_eq!(published, vec![3, 2, 1]);
    }

    #[test]
    fn test_sort_keeps_tie_order() {
        let sorted = sort_by_published(vec![item(5, "first"), item(9, "top"), item(5, "second")]);
        let tags: Vec<&str> = sorted.iter().map(|i| i.tag).collect();
        assert_eq!(tags, vec!["top", "first", "second"]);
    }

    #[test]
    fn test_group_against_first_element() {
        let grouped = group_adjacent_by(vec!["a", "a", "b", "a"], |group, x| group[0] == *x);
        assert_eq!(grouped, vec![vec!["a", "a"], vec!["b"], vec!["a"]]);
    }

    #[test]
    fn test_group_empty_input() {
        let grouped: Vec<Vec<u8>> = group_adjacent_by(Vec::new(), |_, _| true);
        assert!(grouped.is_empty());
    }

    #[test]
    fn test_group_is_total_partition() {
        let input = vec![1, 2, 2, 3, 3, 3, 1];
        let grouped = group_adjacent_by(input.clone(), |group, x| group[0] == *x);
        let flattened: Vec<i32> = grouped.iter().flatten().copied().collect();
        assert_eq!(flattened, input);
        assert!(grouped.iter().all(|g| !g.is_empty()));
    }

    #[test]
    fn test_timeline_sorts_out_of_order_arrivals() {
        let mut timeline = Timeline::new();
        timeline.insert(message("u1", "alice", 10));
        timeline.insert(message("u3", "bob", 30));
        timeline.insert(message("u2", "alice", 20));

        let published: Vec<u64> = timeline.entries().iter().map(|m| m.published()).collect();
        assert_eq!(published, vec![30, 20, 10]);
    }

    #[test]
    fn test_timeline_ignores_duplicates() {
        let mut timeline = Timeline::new();
        assert!(timeline.insert(message("u1", "alice", 10)));
        assert!(!timeline.insert(message("u1", "alice", 10)));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_timeline_tie_break_independent_of_arrival() {
        let mut forward = Timeline::new();
        forward.insert(message("u1", "bob", 10));
        forward.insert(message("u2", "alice", 10));

        let mut backward = Timeline::new();
        backward.insert(message("u2", "alice", 10));
        backward.insert(message("u1", "bob", 10));

        assert_eq!(forward.entries(), backward.entries());
        assert_eq!(forward.entries()[0].actor, "alice");
    }

    #[test]
    fn test_grouped_by_sender_with_gap() {
        let mut timeline = Timeline::new();
        timeline.insert(message("u1", "alice", 100));
        timeline.insert(message("u2", "alice", 90));
        timeline.insert(message("u3", "alice", 10));
        timeline.insert(message("u4", "bob", 5));

        let runs: Vec<usize> = timeline.grouped_by_sender(None).iter().map(Vec::len).collect();
        assert_eq!(runs, vec![3, 1]);

        let runs: Vec<usize> = timeline.grouped_by_sender(Some(30)).iter().map(Vec::len).collect();
        assert_eq!(runs, vec![2, 1, 1]);
    }
}
