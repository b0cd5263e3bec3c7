//! The single-consumer message queue.
//!
//! All producers (transition actions, the timer service, interface handlers,
//! worker threads) push onto one FIFO; the device run loop is the only
//! consumer. Pushes may come from any thread; the consumer blocks in
//! [`MessageQueue::await_message`] until something arrives.

use crate::message::Message;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Instant;
use tokio::sync::Notify;

/// Thread-safe FIFO of [`Message`]s with a blocking (async) take.
///
/// Ordering guarantee: messages pushed by one thread are dequeued in push
/// order. Interleaving across threads is unspecified. [`MessageQueue::resend`]
/// inserts at the head so the next dispatch re-delivers the message ahead of
/// anything pushed to the tail.
pub struct MessageQueue {
    inner: Mutex<VecDeque<Message>>,
    notify: Notify,
    started: Instant,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            started: Instant::now(),
        }
    }

    /// Milliseconds since this queue was created. Used to stamp messages.
    pub fn now_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }

    /// Append a message to the tail and wake the consumer.
    ///
    /// The message's timestamp is stamped here, so enqueue order and
    /// timestamp order agree for any single producer.
    pub fn push(&self, mut message: Message) {
        message.timestamp_ms = self.now_ms();
        self.inner.lock().push_back(message);
        self.notify.notify_one();
    }

    /// Insert a message at the head so it is dispatched next.
    ///
    /// Used to re-deliver the message currently being processed after a state
    /// change; the original timestamp is kept.
    pub fn resend(&self, message: Message) {
        self.inner.lock().push_front(message);
        self.notify.notify_one();
    }

    /// Remove and return the head, waiting until the queue is non-empty.
    pub async fn await_message(&self) -> Message {
        loop {
            // Arm the notification before checking, so a push between the
            // check and the await cannot be lost.
            let notified = self.notify.notified();
            if let Some(message) = self.inner.lock().pop_front() {
                return message;
            }
            notified.await;
        }
    }

    /// Remove and return the head if one is already queued.
    pub fn try_take(&self) -> Option<Message> {
        self.inner.lock().pop_front()
    }

    /// Remove the first queued message matching `(interface, name)` for which
    /// the predicate holds. Returns whether a removal occurred.
    pub fn remove_message(
        &self,
        interface: &str,
        name: &str,
        predicate: impl Fn(&Message) -> bool,
    ) -> bool {
        let mut queue = self.inner.lock();
        let position = queue.iter().position(|m| {
            m.interface_name() == interface && m.message_name() == name && predicate(m)
        });
        match position {
            Some(index) => {
                let _ = queue.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}
