//! One-shot timer service.
//!
//! Timers are delivered as `Timer.Timeout` messages through the message
//! queue, so timer handling is serialized with everything else the receiving
//! component does. Each timer is a detached tokio task that sleeps for the
//! requested duration and then, under the service lock, checks whether the
//! timer was cancelled in the meantime.
//!
//! Cancellation has three observable outcomes:
//!
//! 1. The timer has not fired: its entry is flagged and the sleep task drops
//!    it without enqueuing anything.
//! 2. The timer fired but the `Timeout` is still queued: the message is
//!    scrubbed from the queue and the receiver never sees it.
//! 3. The consumer already dequeued the `Timeout`: cancellation is a no-op
//!    and the receiver must tolerate the stale delivery (components keep the
//!    active timer id and ignore timeouts that do not match).

use crate::message::{ComponentHandle, Message, MessagePayload};
use crate::queue::MessageQueue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Name of the reserved timer interface.
pub const TIMER_INTERFACE: &str = "Timer";

/// Identifier of a scheduled timeout.
///
/// Drawn from a single counter, strictly increasing for the lifetime of the
/// service and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timer expiry message, addressed to the component that scheduled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    pub timer_id: TimerId,
}

impl MessagePayload for Timeout {
    const INTERFACE: &'static str = TIMER_INTERFACE;
    const NAME: &'static str = "Timeout";
}

struct TimerEntry {
    target: ComponentHandle,
    cancelled: bool,
}

#[derive(Default)]
struct TimerTable {
    next_id: u64,
    entries: HashMap<u64, TimerEntry>,
}

/// Schedules one-shot [`Timeout`] deliveries for components.
///
/// Owned by the device; components hold a shared reference. Requires a tokio
/// runtime: each `set_timeout` spawns a detached sleep task.
pub struct TimerService {
    queue: Arc<MessageQueue>,
    inner: Mutex<TimerTable>,
}

impl TimerService {
    pub fn new(queue: Arc<MessageQueue>) -> Self {
        Self {
            queue,
            inner: Mutex::new(TimerTable::default()),
        }
    }

    /// Schedule a `Timeout` for `target` after `duration`.
    pub fn set_timeout(
        self: &Arc<Self>,
        duration: Duration,
        target: ComponentHandle,
    ) -> TimerId {
        let id = {
            let mut table = self.inner.lock();
            let id = table.next_id;
            table.next_id += 1;
            table.entries.insert(
                id,
                TimerEntry {
                    target,
                    cancelled: false,
                },
            );
            id
        };

        trace!(timer_id = id, duration_ms = duration.as_millis() as u64, "timer set");
        let service = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            service.fire(id);
        });

        TimerId(id)
    }

    /// Cancel a scheduled timeout.
    ///
    /// If the timer has already fired, the queued `Timeout` is scrubbed from
    /// the message queue (best effort). Cancelling an unknown id is a no-op.
    pub fn cancel_timeout(&self, id: TimerId) {
        {
            let mut table = self.inner.lock();
            if let Some(entry) = table.entries.get_mut(&id.0) {
                entry.cancelled = true;
                trace!(timer_id = id.0, "timer cancelled before firing");
                return;
            }
        }

        // Already fired: the Timeout may still be in the queue.
        let scrubbed = self.queue.remove_message(TIMER_INTERFACE, Timeout::NAME, |m| {
            m.payload::<Timeout>().is_some_and(|t| t.timer_id == id)
        });
        trace!(timer_id = id.0, scrubbed, "timer cancelled after firing");
    }

    /// Number of timers scheduled but not yet fired or cancelled-and-reaped.
    pub fn active_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    fn fire(&self, id: u64) {
        let mut table = self.inner.lock();
        if let Some(entry) = table.entries.remove(&id) {
            if !entry.cancelled {
                let mut message = Message::new(Timeout { timer_id: TimerId(id) });
                message.receiver = Some(entry.target);
                self.queue.push(message);
                trace!(timer_id = id, "timer fired");
            }
        }
    }
}
