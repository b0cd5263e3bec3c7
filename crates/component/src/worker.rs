//! Worker handlers: one-shot blocking work off the device loop.
//!
//! Transition actions must not block; a worker handler is the sanctioned
//! escape hatch. `start` dispatches the user's blocking body to the
//! runtime's blocking pool via `tokio::task::spawn_blocking`; when the body
//! returns without having been cancelled, the `finished` hook runs and a
//! single typed "finished" message is enqueued toward the worker's
//! functional peer.
//!
//! Cancellation is cooperative: [`WorkerControl::cancel`] cancels the run's
//! [`CancellationToken`], waits for the task to exit, and then scrubs any
//! already-enqueued finished message from the queue. The worker body is
//! responsible for polling the token.

use crate::base::{BaseComponent, Outbox};
use crate::component::{Component, ComponentKind};
use crate::handler::HandlerContext;
use machina_core::{ComponentHandle, ConfigError, Logger, Message, MessagePayload, MessageQueue};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;

pub use tokio_util::sync::CancellationToken;

/// Blocking work run on the blocking pool.
pub trait Worker: Send + 'static {
    /// Message enqueued when the work completes without cancellation.
    type Done: MessagePayload;

    /// Optional initialization, run in the device init phase.
    fn initialize(&mut self, _ctx: &HandlerContext<'_>) -> Result<(), ConfigError> {
        Ok(())
    }

    /// The blocking body. Long-running work must poll `cancel` and return
    /// early when it is cancelled.
    fn run(&mut self, cancel: &CancellationToken);

    /// Hook run after `run` returns uncancelled, before the finished message
    /// is built.
    fn finished(&mut self) {}

    /// Build the finished message.
    fn finished_message(&mut self) -> Self::Done;
}

/// One dispatched run: its task handle plus the token that cancels it.
struct RunningTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Shared control surface for a worker: this is what application components
/// hold (via settings) to start and cancel the work.
pub struct WorkerControl<W: Worker> {
    handle: ComponentHandle,
    queue: Arc<MessageQueue>,
    logger: Logger,
    worker: Mutex<W>,
    task: Mutex<Option<RunningTask>>,
    outbox: OnceLock<Outbox>,
}

impl<W: Worker> WorkerControl<W> {
    pub fn new(
        handle: ComponentHandle,
        queue: Arc<MessageQueue>,
        logger: Logger,
        worker: W,
    ) -> Self {
        Self {
            handle,
            queue,
            logger,
            worker: Mutex::new(worker),
            task: Mutex::new(None),
            outbox: OnceLock::new(),
        }
    }

    /// Dispatch the worker body to the blocking pool.
    ///
    /// Refused (with an error log, returning `false`) while a previous run
    /// is still in progress or before the device initialized the component.
    /// A run that finished naturally is replaced and the worker may run
    /// again. Must be called from within the runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        let Some(outbox) = self.outbox.get().cloned() else {
            self.logger
                .error(self.handle.name(), "worker started before initialization");
            return false;
        };

        let mut slot = self.task.lock();
        if let Some(task) = slot.as_ref() {
            if !task.handle.is_finished() {
                self.logger.error(self.handle.name(), "worker already started");
                return false;
            }
        }

        // Each run gets a fresh token so a cancelled run does not poison
        // the next one.
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let control = Arc::clone(self);
        let handle = tokio::task::spawn_blocking(move || {
            let mut worker = control.worker.lock();
            worker.run(&token);
            if token.is_cancelled() {
                return;
            }
            worker.finished();
            let done = worker.finished_message();
            drop(worker);
            outbox.send(done);
        });
        *slot = Some(RunningTask { handle, cancel });
        true
    }

    /// Request cancellation, wait for the task to exit, and scrub any
    /// already-enqueued finished message from the queue.
    pub fn cancel(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            // The body runs on the blocking pool, which makes progress
            // independently of the caller's thread.
            while !task.handle.is_finished() {
                std::thread::sleep(Duration::from_millis(1));
            }
        }

        self.queue
            .remove_message(W::Done::INTERFACE, W::Done::NAME, |m: &Message| {
                m.sender.as_ref() == Some(&self.handle)
            });
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Access the worker state while no run is in progress.
    pub fn with_worker<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.worker.lock())
    }

    fn attach(&self, outbox: Outbox) {
        // Re-initialization is not part of the lifecycle; first wins.
        let _ = self.outbox.set(outbox);
    }
}

/// Device-side wrapper owning a worker's component identity.
pub struct WorkerHandler<W: Worker> {
    base: BaseComponent,
    control: Arc<WorkerControl<W>>,
}

impl<W: Worker> WorkerHandler<W> {
    pub fn new(base: BaseComponent, control: Arc<WorkerControl<W>>) -> Self {
        Self { base, control }
    }

    pub fn control(&self) -> &Arc<WorkerControl<W>> {
        &self.control
    }
}

impl<W: Worker> Component for WorkerHandler<W> {
    fn base(&self) -> &BaseComponent {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseComponent {
        &mut self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Handler
    }

    fn setup(&mut self) -> Result<(), ConfigError> {
        self.control.attach(self.base.outbox());
        let ctx = HandlerContext::new(&self.base);
        self.control.worker.lock().initialize(&ctx)
    }

    fn process(&mut self, message: Message) {
        self.base.log_error(&format!(
            "worker handlers do not dispatch messages; dropped \"{}:{}\"",
            message.interface_name(),
            message.message_name()
        ));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<W: Worker> Drop for WorkerHandler<W> {
    fn drop(&mut self) {
        self.control.cancel();
    }
}
