// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::msg_ref::MessageIndex;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use yare::parameterized;

/// Channel history used throughout: m1..m4 at t=1000..4000.
fn history() -> MessageIndex {
    let mut index = MessageIndex::new();
    for i in 1..=4 {
        index.insert(i * 1000, format!("m{i}"));
    }
    index
}

fn tracker() -> ReceiptTracker<MessageIndex> {
    ReceiptTracker::new(history())
}

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

fn m(i: i64) -> MsgRef {
    MsgRef::new(i * 1000, format!("m{i}"))
}

fn read(user: &str, ms: i64) -> MessageReadEvent {
    MessageReadEvent {
        user: User::new(user),
        read_at: at(ms),
        last_read_message_id: None,
    }
}

fn delivered(user: &str, ms: i64) -> MessageDeliveredEvent {
    MessageDeliveredEvent {
        user: User::new(user),
        delivered_at: at(ms),
        last_delivered_message_id: None,
    }
}

fn unread(user: &str, ms: Option<i64>) -> MarkUnreadEvent {
    MarkUnreadEvent {
        user: User::new(user),
        last_read_at: ms.map(at),
        last_read_message_id: None,
    }
}

fn ids(users: Vec<&User>) -> Vec<String> {
    let mut ids: Vec<String> = users.into_iter().map(|u| u.id.clone()).collect();
    ids.sort();
    ids
}

fn progress<'a>(t: &'a ReceiptTracker<MessageIndex>, user: &str) -> &'a UserProgress {
    t.get_user_progress(user).unwrap()
}

#[test]
fn read_bumps_delivered_forward() {
    let mut t = tracker();
    assert!(t.on_message_delivered(&delivered("alice", 1000)));
    assert!(t.on_message_read(&read("alice", 2000)));

    let p = progress(&t, "alice");
    assert_eq!(p.last_read_ref, m(2));
    assert_eq!(p.last_delivered_ref, m(2));
}

#[test]
fn late_delivery_does_not_regress_behind_read() {
    let mut t = tracker();
    t.on_message_read(&read("alice", 3000));
    assert!(!t.on_message_delivered(&delivered("alice", 2000)));

    let p = progress(&t, "alice");
    assert_eq!(p.last_read_ref, m(3));
    assert_eq!(p.last_delivered_ref, m(3));
}

#[test]
fn older_or_duplicate_read_is_ignored() {
    let mut t = tracker();
    assert!(t.on_message_read(&read("alice", 3000)));
    assert!(!t.on_message_read(&read("alice", 3000)));
    assert!(!t.on_message_read(&read("alice", 1000)));
    assert_eq!(progress(&t, "alice").last_read_ref, m(3));
}

#[test]
fn delivery_ahead_of_read_leaves_read_alone() {
    let mut t = tracker();
    t.on_message_read(&read("alice", 1000));
    assert!(t.on_message_delivered(&delivered("alice", 4000)));

    let p = progress(&t, "alice");
    assert_eq!(p.last_read_ref, m(1));
    assert_eq!(p.last_delivered_ref, m(4));
}

#[test]
fn known_message_id_skips_the_locator() {
    let mut t = ReceiptTracker::new(|_: i64| -> Option<MsgRef> { None });
    let event = MessageReadEvent {
        last_read_message_id: Some("remote-only".into()),
        ..read("alice", 9000)
    };
    assert!(t.on_message_read(&event));
    assert_eq!(
        t.get_user_progress("alice").unwrap().last_read_ref,
        MsgRef::new(9000, "remote-only")
    );
}

#[parameterized(
    on_read = { Event::MessageRead(read("ghost", 1500)) },
    on_delivered = { Event::MessageDelivered(delivered("ghost", 1500)) },
    on_mark_unread = { Event::NotificationMarkUnread(unread("ghost", Some(1500))) },
)]
fn unresolvable_events_change_nothing(event: Event) {
    let mut t = tracker();
    assert!(!t.handle_event(&event));
    assert!(t.is_empty());
    assert!(t.get_user_progress("ghost").is_none());
}

#[test]
fn unresolvable_event_preserves_existing_state() {
    let mut t = tracker();
    t.on_message_read(&read("alice", 2000));
    let before = progress(&t, "alice").clone();

    assert!(!t.on_message_read(&read("alice", 3500)));
    assert!(!t.on_message_delivered(&delivered("alice", 3500)));
    assert_eq!(progress(&t, "alice"), &before);
}

#[test]
fn mark_unread_moves_read_backward() {
    let mut t = tracker();
    t.on_message_read(&read("alice", 4000));
    assert!(t.on_notification_mark_unread(&unread("alice", Some(2000))));

    let p = progress(&t, "alice");
    assert_eq!(p.last_read_ref, m(2));
    assert_eq!(p.last_delivered_ref, m(4));
}

#[test]
fn mark_unread_ahead_of_delivered_raises_delivered() {
    let mut t = tracker();
    assert!(t.on_notification_mark_unread(&unread("alice", Some(3000))));

    let p = progress(&t, "alice");
    assert_eq!(p.last_read_ref, m(3));
    assert_eq!(p.last_delivered_ref, m(3));
    assert_eq!(ids(t.delivered_for_message(&m(3))), vec!["alice"]);
    assert!(t.delivered_not_read_for_message(&m(3)).is_empty());

    t.on_message_delivered(&delivered("bob", 2000));
    assert!(t.on_notification_mark_unread(&unread("bob", Some(4000))));
    assert_eq!(progress(&t, "bob").last_delivered_ref, m(4));
}

#[test]
fn mark_unread_without_position_resets_to_min() {
    let mut t = tracker();
    t.on_message_read(&read("alice", 3000));
    assert!(t.on_notification_mark_unread(&unread("alice", None)));

    let p = progress(&t, "alice");
    assert!(p.last_read_ref.is_min());
    assert_eq!(p.last_delivered_ref, m(3));
    assert!(t.users_whose_last_read_is(&m(3)).is_empty());
    assert!(!t.has_user_read(&m(1), "alice"));
}

#[test]
fn mark_unread_to_current_position_is_noop() {
    let mut t = tracker();
    t.on_message_read(&read("alice", 2000));
    assert!(!t.on_notification_mark_unread(&unread("alice", Some(2000))));
    assert!(!t.on_notification_mark_unread(&unread("bob", None)));
    assert!(t.get_user_progress("bob").is_none());
}

#[test]
fn ingest_initial_resolves_and_clamps() {
    let mut t = tracker();
    t.on_message_read(&read("stale", 1000));

    t.ingest_initial(&[
        ReadResponse {
            user: User::new("alice"),
            last_read: at(3000),
            last_delivered_at: Some(at(1000)),
        },
        ReadResponse {
            user: User::new("bob"),
            last_read: at(1000),
            last_delivered_at: Some(at(4000)),
        },
        ReadResponse {
            user: User::new("carol"),
            last_read: at(1234),
            last_delivered_at: None,
        },
    ]);

    assert_eq!(t.len(), 3);
    assert!(t.get_user_progress("stale").is_none());

    let alice = progress(&t, "alice");
    assert_eq!(alice.last_read_ref, m(3));
    assert_eq!(alice.last_delivered_ref, m(3));

    let bob = progress(&t, "bob");
    assert_eq!(bob.last_read_ref, m(1));
    assert_eq!(bob.last_delivered_ref, m(4));

    let carol = progress(&t, "carol");
    assert!(carol.last_read_ref.is_min());
    assert!(carol.last_delivered_ref.is_min());
}

#[test]
fn readers_and_delivered_queries() {
    let mut t = tracker();
    t.on_message_read(&read("alice", 3000));
    t.on_message_read(&read("bob", 1000));
    t.on_message_delivered(&delivered("bob", 4000));
    t.on_message_delivered(&delivered("carol", 2000));

    assert_eq!(ids(t.readers_for_message(&m(2))), ["alice"]);
    assert_eq!(ids(t.readers_for_message(&m(1))), ["alice", "bob"]);
    assert_eq!(ids(t.delivered_for_message(&m(2))), ["alice", "bob", "carol"]);
    assert_eq!(ids(t.delivered_for_message(&m(4))), ["bob"]);
    assert_eq!(ids(t.delivered_not_read_for_message(&m(2))), ["bob", "carol"]);
    assert!(t.delivered_not_read_for_message(&m(3)).iter().all(|u| u.id != "alice"));
}

#[test]
fn point_lookups() {
    let mut t = tracker();
    t.on_message_read(&read("alice", 2000));
    t.on_message_delivered(&delivered("alice", 3000));

    assert!(t.has_user_read(&m(1), "alice"));
    assert!(t.has_user_read(&m(2), "alice"));
    assert!(!t.has_user_read(&m(3), "alice"));
    assert!(t.has_user_delivered(&m(3), "alice"));
    assert!(!t.has_user_delivered(&m(4), "alice"));
    assert!(!t.has_user_read(&m(1), "nobody"));
}

#[test]
fn exact_match_requires_same_id() {
    let mut index = history();
    index.insert(5000, "m5");
    let mut t = ReceiptTracker::new(index);

    t.on_message_read(&read("alice", 5000));
    t.on_message_read(&MessageReadEvent {
        last_read_message_id: Some("m5-collision".into()),
        ..read("bob", 5000)
    });

    let m5 = MsgRef::new(5000, "m5");
    assert_eq!(ids(t.users_whose_last_read_is(&m5)), ["alice"]);
    assert_eq!(ids(t.users_whose_last_delivered_is(&m5)), ["alice"]);
    assert_eq!(ids(t.readers_for_message(&m5)), ["alice", "bob"]);
}

#[test]
fn exact_match_with_empty_id_is_empty() {
    let mut t = tracker();
    t.on_message_read(&read("alice", 1000));
    assert!(t.users_whose_last_read_is(&MsgRef::new(1000, "")).is_empty());
    assert!(t.users_whose_last_delivered_is(&MsgRef::MIN).is_empty());
}

#[test]
fn groups_follow_arrival_order() {
    let mut t = tracker();
    t.on_message_read(&read("carol", 2000));
    t.on_message_read(&read("alice", 2000));
    t.on_message_read(&read("bob", 3000));
    t.on_message_delivered(&delivered("dave", 1000));

    let groups = t.group_users_by_last_read_message();
    let m2: Vec<&str> = groups["m2"].iter().map(|u| u.id.as_str()).collect();
    assert_eq!(m2, ["carol", "alice"]);
    assert_eq!(groups["m3"].len(), 1);
    assert!(!groups.contains_key(""));
    assert_eq!(groups.len(), 2);

    let delivered = t.group_users_by_last_delivered_message();
    assert_eq!(delivered["m1"][0].id, "dave");
    assert_eq!(delivered["m2"].len(), 2);
}

#[test]
fn advancing_moves_user_between_groups() {
    let mut t = tracker();
    t.on_message_read(&read("alice", 1000));
    t.on_message_read(&read("alice", 2000));

    assert!(t.users_whose_last_read_is(&m(1)).is_empty());
    assert_eq!(ids(t.users_whose_last_read_is(&m(2))), ["alice"]);
    let groups = t.group_users_by_last_read_message();
    assert_eq!(groups.len(), 1);
    assert_eq!(t.readers_for_message(&m(1)).len(), 1);
}

#[test]
fn handle_event_ignores_connection_events() {
    let mut t = tracker();
    assert!(!t.handle_event(&Event::connection_changed(true)));
    assert!(t.handle_event(&Event::MessageRead(read("alice", 1000))));
}

#[test]
fn reset_forgets_everyone() {
    let mut t = tracker();
    t.on_message_read(&read("alice", 1000));
    t.reset();
    assert!(t.is_empty());
    assert!(t.readers_for_message(&m(1)).is_empty());
}

#[derive(Debug, Clone)]
enum Op {
    Read(usize, i64),
    Delivered(usize, i64),
    Unread(usize, Option<i64>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // Timestamps include unknown ones (x500) to exercise the discard path.
    let ts = (1i64..=9).prop_map(|n| n * 500);
    prop_oneof![
        (0usize..3, ts.clone()).prop_map(|(u, t)| Op::Read(u, t)),
        (0usize..3, ts.clone()).prop_map(|(u, t)| Op::Delivered(u, t)),
        (0usize..3, proptest::option::of(ts)).prop_map(|(u, t)| Op::Unread(u, t)),
    ]
}

const USERS: [&str; 3] = ["alice", "bob", "carol"];

proptest! {
    #[test]
    fn delivered_never_precedes_read_nor_regresses(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let mut t = tracker();
        for op in ops {
            let before: HashMap<String, UserProgress> = USERS
                .iter()
                .filter_map(|u| t.get_user_progress(u).map(|p| (u.to_string(), p.clone())))
                .collect();

            let is_unread = matches!(op, Op::Unread(..));
            match op {
                Op::Read(u, ts) => { t.on_message_read(&read(USERS[u], ts)); }
                Op::Delivered(u, ts) => { t.on_message_delivered(&delivered(USERS[u], ts)); }
                Op::Unread(u, ts) => { t.on_notification_mark_unread(&unread(USERS[u], ts)); }
            }

            for user in USERS {
                let Some(now) = t.get_user_progress(user) else { continue };
                if let Some(prev) = before.get(user) {
                    prop_assert!(!now.last_delivered_ref.is_before(&prev.last_delivered_ref));
                    if !is_unread {
                        prop_assert!(!now.last_read_ref.is_before(&prev.last_read_ref));
                    }
                }
                prop_assert!(!now.last_delivered_ref.is_before(&now.last_read_ref));
            }
        }
    }

    #[test]
    fn readers_match_a_full_scan(ops in proptest::collection::vec(op_strategy(), 1..40), position in 1i64..=4) {
        let mut t = tracker();
        for op in ops {
            match op {
                Op::Read(u, ts) => { t.on_message_read(&read(USERS[u], ts)); }
                Op::Delivered(u, ts) => { t.on_message_delivered(&delivered(USERS[u], ts)); }
                Op::Unread(u, ts) => { t.on_notification_mark_unread(&unread(USERS[u], ts)); }
            }
        }
        let target = m(position);
        let mut expected: Vec<String> = USERS
            .iter()
            .filter(|u| t.get_user_progress(u).is_some_and(|p| p.last_read_ref.timestamp_ms >= target.timestamp_ms))
            .map(|u| u.to_string())
            .collect();
        expected.sort();
        prop_assert_eq!(ids(t.readers_for_message(&target)), expected);
    }
}
