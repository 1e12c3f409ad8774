use crate::testing::StubProfile;
use crate::{GroupConsumer, GroupError, GroupProducer, Grouping};
use std::sync::Arc;
use std::thread::scope;

fn profile(n: u32) -> Box<dyn crate::Profile> {
    StubProfile::new(n, n.to_string()).boxed()
}

#[test]
fn creating_twice_fails() {
    let grouping = Grouping::new();
    grouping.create_group(1).unwrap();
    assert_eq!(grouping.create_group(1), Err(GroupError::AlreadyExists(1)));
}

#[test]
fn operations_on_unknown_group_fail() {
    let grouping = Grouping::new();
    assert_eq!(grouping.insert(profile(0), 3), Err(GroupError::NotFound(3)));
    assert_eq!(grouping.mark_final(3), Err(GroupError::NotFound(3)));
    assert_eq!(grouping.delete_group(3), Err(GroupError::NotFound(3)));
    assert!(matches!(grouping.next(3), Err(GroupError::NotFound(3))));
    assert!(!grouping.has_next(3));
    assert!(!grouping.is_final(3));
}

#[test]
fn next_on_empty_group_fails() {
    let grouping = Grouping::new();
    grouping.create_group(1).unwrap();
    assert!(matches!(grouping.next(1), Err(GroupError::Empty(1))));
}

#[test]
fn delete_requires_empty_then_final() {
    let grouping = Grouping::new();
    grouping.create_group(1).unwrap();
    grouping.insert(profile(0), 1).unwrap();

    assert_eq!(grouping.delete_group(1), Err(GroupError::NotEmpty(1)));
    grouping.next(1).unwrap();
    assert_eq!(grouping.delete_group(1), Err(GroupError::NotFinal(1)));

    grouping.mark_final(1).unwrap();
    assert!(grouping.is_final(1));
    grouping.delete_group(1).unwrap();
    assert!(!grouping.contains(1));

    // The id is free again.
    grouping.create_group(1).unwrap();
    assert!(!grouping.is_final(1));
}

#[test]
fn final_group_keeps_pending_events_consumable() {
    let grouping = Grouping::new();
    grouping.create_group(1).unwrap();
    grouping.insert(profile(7), 1).unwrap();
    grouping.mark_final(1).unwrap();

    assert!(grouping.has_next(1));
    assert_eq!(grouping.next(1).unwrap().id(), 7);
    assert!(!grouping.has_next(1));
}

#[test]
fn consumes_in_insertion_order() {
    let grouping = Grouping::new();
    grouping.create_group(1).unwrap();
    for n in 0..100 {
        grouping.insert(profile(n), 1).unwrap();
    }
    let drained: Vec<_> = (0..100).map(|_| grouping.next(1).unwrap().id()).collect();
    assert_eq!(drained, (0..100).collect::<Vec<_>>());
}

#[test]
fn concurrent_producers_preserve_per_group_order() {
    let grouping = Grouping::new();
    for g in 0..8 {
        grouping.create_group(g).unwrap();
    }
    scope(|s| {
        for g in 0..8 {
            let grouping = &grouping;
            s.spawn(move || {
                for n in 0..500 {
                    grouping.insert(profile(n), g).unwrap();
                }
            });
        }
    });
    for g in 0..8 {
        assert_eq!(grouping.pending(g), Some(500));
        let drained: Vec<_> = (0..500).map(|_| grouping.next(g).unwrap().id()).collect();
        assert_eq!(drained, (0..500).collect::<Vec<_>>());
    }
}

#[test]
fn consumer_handle_delegates_to_shared_registry() {
    let grouping = Arc::new(Grouping::new());
    let mut consumer = Arc::clone(&grouping);
    grouping.create_group(4).unwrap();
    grouping.insert(profile(1), 4).unwrap();
    grouping.mark_final(4).unwrap();

    assert!(GroupConsumer::has_next(&mut consumer, 4));
    assert_eq!(GroupConsumer::next(&mut consumer, 4).unwrap().id(), 1);
    assert!(GroupConsumer::is_final(&consumer, 4));
    GroupConsumer::delete_group(&mut consumer, 4).unwrap();
    assert!(grouping.is_empty());
}
