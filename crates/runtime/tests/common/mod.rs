//! Shared fixtures for the runtime integration tests.

use machina_core::{LogRecord, Logger, MessagePayload};
use parking_lot::Mutex;
use std::sync::Arc;

/// One observed transition event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub component: String,
    pub state: String,
    pub interface: String,
    pub message: String,
    pub next_state: String,
}

/// Captures engine log events through the hook points.
#[derive(Default, Clone)]
pub struct LogCapture {
    pub errors: Arc<Mutex<Vec<String>>>,
    pub fatals: Arc<Mutex<Vec<String>>>,
    pub transitions: Arc<Mutex<Vec<TransitionEvent>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a logger feeding this capture.
    pub fn logger(&self) -> Logger {
        let errors = self.errors.clone();
        let fatals = self.fatals.clone();
        let transitions = self.transitions.clone();
        Logger::new()
            .with_error_hook(Arc::new(move |record: &LogRecord<'_>| {
                errors.lock().push(record.text.to_owned());
            }))
            .with_fatal_hook(Arc::new(move |record: &LogRecord<'_>| {
                fatals.lock().push(record.text.to_owned());
            }))
            .with_transition_hook(Arc::new(move |record: &LogRecord<'_>| {
                let t = record.transition.expect("transition fields");
                transitions.lock().push(TransitionEvent {
                    component: record.component.to_owned(),
                    state: t.state.to_owned(),
                    interface: t.interface.to_owned(),
                    message: t.message.to_owned(),
                    next_state: t.next_state.to_owned(),
                });
            }))
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }
}

/// Messages used by the engine-level scenarios.
pub mod control {
    use super::MessagePayload;

    #[derive(Debug, Clone, Copy)]
    pub struct Go {
        pub code: u32,
    }

    impl MessagePayload for Go {
        const INTERFACE: &'static str = "Control";
        const NAME: &'static str = "Go";
    }

    #[derive(Debug, Clone, Copy)]
    pub struct Data {
        pub value: u32,
    }

    impl MessagePayload for Data {
        const INTERFACE: &'static str = "Control";
        const NAME: &'static str = "Data";
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
