//! Message queue ordering under concurrent use

use proptest::prelude::*;
use riffsmith_generation::message_queue;
use std::thread;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn concurrent_fifo_without_loss(items in prop::collection::vec(any::<u32>(), 0..2000)) {
        let (mut producer, mut consumer) = message_queue();
        let expected = items.clone();

        let writer = thread::spawn(move || {
            for item in items {
                producer.push(item);
            }
        });

        let mut received = Vec::with_capacity(expected.len());
        while received.len() < expected.len() {
            match consumer.try_pop() {
                Some(item) => received.push(item),
                None => thread::yield_now(),
            }
        }
        writer.join().unwrap();

        prop_assert_eq!(received, expected);
        prop_assert!(consumer.try_pop().is_none());
    }
}

#[test]
fn interleaved_push_and_pop() {
    let (mut producer, mut consumer) = message_queue();
    producer.push("a");
    producer.push("b");
    assert_eq!(consumer.try_pop(), Some("a"));
    producer.push("c");
    assert_eq!(consumer.try_pop(), Some("b"));
    assert_eq!(consumer.try_pop(), Some("c"));
    assert_eq!(consumer.try_pop(), None);
}
