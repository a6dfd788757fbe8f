/*
    Reducer Property Tests

    Discovery gives no ordering guarantee, so every derived value must be a
    function of the discovered set alone:
    - the membership fold is invariant under permutation
    - the timeline is newest first and stable for equal timestamps
    - grouping partitions its input without reordering it
    - channel state converges in every arrival order
*/

use proptest::prelude::*;
use tagchat_core::core_channel::ChannelState;
use tagchat_core::core_membership::fold_members;
use tagchat_core::core_schema::{Activity, Envelope, HasPublished, MemberUpdate};
use tagchat_core::core_timeline::{group_adjacent_by, sort_by_published};
use tagchat_core::test_utils::{
    arrival_orders, chat_name_object, member_update_object, message_object, shuffled,
};

#[derive(Debug, Clone, PartialEq)]
struct Stamped {
    id: usize,
    published: u64,
}

impl HasPublished for Stamped {
    fn published(&self) -> u64 {
        self.published
    }
}

fn member_event(index: usize, actor: u8, add: bool, target: u8, published: u64) -> Envelope<MemberUpdate> {
    Envelope {
        url: format!("m{}", index),
        actor: format!("actor-{}", actor),
        value: MemberUpdate {
            activity: if add { Activity::Add } else { Activity::Remove },
            target: format!("user-{}", target),
            object: "general".to_string(),
            published,
        },
    }
}

fn member_events() -> impl Strategy<Value = Vec<Envelope<MemberUpdate>>> {
    prop::collection::vec((0u8..3, any::<bool>(), 0u8..4, 0u64..6), 0..24).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (actor, add, target, published))| member_event(i, actor, add, target, published))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_fold_ignores_arrival_order(events in member_events(), seed in any::<u64>()) {
        let reordered = shuffled(&events, seed);
        prop_assert_eq!(fold_members(&events), fold_members(&reordered));
    }

    #[test]
    fn prop_fold_members_were_added(events in member_events()) {
        for member in fold_members(&events) {
            prop_assert!(events
                .iter()
                .any(|e| e.value.activity == Activity::Add && e.value.target == member));
        }
    }

    #[test]
    fn prop_sort_is_descending_and_stable(stamps in prop::collection::vec(0u64..8, 0..40)) {
        let items: Vec<Stamped> = stamps
            .iter()
            .enumerate()
            .map(|(id, &published)| Stamped { id, published })
            .collect();

        let sorted = sort_by_published(items.clone());
        prop_assert_eq!(sorted.len(), items.len());
        for pair in sorted.windows(2) {
            prop_assert!(pair[0].published >= pair[1].published);
            if pair[0].published == pair[1].published {
                prop_assert!(pair[0].id < pair[1].id);
            }
        }
    }

    #[test]
    fn prop_grouping_partitions_input(values in prop::collection::vec(0u8..4, 0..40)) {
        let groups = group_adjacent_by(values.clone(), |group: &[u8], item| group[0] == *item);

        prop_assert!(groups.iter().all(|g| !g.is_empty()));
        let flattened: Vec<u8> = groups.iter().flatten().copied().collect();
        prop_assert_eq!(flattened, values);
        for pair in groups.windows(2) {
            prop_assert_ne!(pair[0][0], pair[1][0]);
        }
    }
}

#[test]
fn test_channel_state_converges_in_every_arrival_order() {
    let objects = vec![
        member_update_object("m1", "alice", Activity::Add, "alice", "general", 10),
        member_update_object("m2", "alice", Activity::Add, "bob", "general", 20),
        member_update_object("m3", "alice", Activity::Add, "carol", "general", 30),
        member_update_object("m4", "alice", Activity::Remove, "bob", "general", 40),
        member_update_object("m5", "carol", Activity::Add, "bob", "general", 40),
        chat_name_object("n1", "alice", "general", "X", 100),
        chat_name_object("n2", "carol", "general", "Y", 200),
        message_object("c1", "alice", "general", "first", 50),
        message_object("c2", "bob", "general", "second", 60),
        message_object("c3", "carol", "general", "third", 70),
    ];

    let snapshots: Vec<_> = arrival_orders(&objects, 16)
        .into_iter()
        .map(|order| {
            let mut state = ChannelState::new("general");
            for object in &order {
                state.ingest(object);
            }
            state.snapshot()
        })
        .collect();

    let expected = &snapshots[0];
    assert_eq!(expected.name.as_deref(), Some("Y"));
    // Equal timestamps at 40 order by actor: alice removes bob, then carol re-adds him.
    assert!(expected.is_member("bob"));
    assert_eq!(expected.members.len(), 3);
    let contents: Vec<&str> = expected.messages.iter().map(|m| m.value.content.as_str()).collect();
    assert_eq!(contents, ["third", "second", "first"]);

    for snapshot in &snapshots[1..] {
        assert_eq!(snapshot, expected);
    }
}
