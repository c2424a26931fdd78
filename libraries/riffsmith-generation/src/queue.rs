//! Single-producer, single-consumer message queue
//!
//! Carries scheduler messages from the supervisor thread to whichever thread
//! owns the consumer. Both halves take `&mut self` and neither is `Clone`, so
//! a second producer or consumer cannot exist without moving the first.
//!
//! ```compile_fail
//! let (producer, _consumer) = riffsmith_generation::message_queue::<u32>();
//! let _second = producer.clone();
//! ```

use crossbeam_queue::SegQueue;
use std::fmt;
use std::sync::Arc;

/// Create a connected producer/consumer pair
pub fn message_queue<T>() -> (Producer<T>, Consumer<T>) {
    let shared = Arc::new(SegQueue::new());
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

/// Sending half
pub struct Producer<T> {
    shared: Arc<SegQueue<T>>,
}

impl<T> Producer<T> {
    /// Append a message (lock-free, never blocks)
    pub fn push(&mut self, item: T) {
        self.shared.push(item);
    }

    /// Whether the consumer side has been dropped
    pub fn is_disconnected(&self) -> bool {
        Arc::strong_count(&self.shared) == 1
    }
}

/// Receiving half
pub struct Consumer<T> {
    shared: Arc<SegQueue<T>>,
}

impl<T> Consumer<T> {
    /// Pop the oldest message, `None` when empty
    pub fn try_pop(&mut self) -> Option<T> {
        self.shared.pop()
    }

    /// Drain everything currently queued, oldest first
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.shared.pop())
    }

    /// Approximate: the producer may push concurrently
    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }

    /// Approximate: the producer may push concurrently
    pub fn len(&self) -> usize {
        self.shared.len()
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("pending", &self.shared.len())
            .finish()
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("pending", &self.shared.len())
            .finish()
    }
}
