//! Logging hooks.
//!
//! The engine always emits structured `tracing` events. On top of that, a
//! [`Logger`] carries optional per-level hooks so embedders (and tests) can
//! observe exactly the events the engine reports: errors, warnings, info,
//! debug, fatal configuration failures, and state transitions.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Severity of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    /// Configuration failure; the device refuses to start.
    Fatal,
    /// A state-machine transition was taken.
    Transition,
}

/// Structured fields of a transition event.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRecord<'a> {
    pub state: &'a str,
    pub interface: &'a str,
    pub message: &'a str,
    pub next_state: &'a str,
}

/// One log event as seen by a hook.
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    pub level: LogLevel,
    /// Name of the component the event concerns.
    pub component: &'a str,
    pub text: &'a str,
    /// Set for `LogLevel::Transition` records.
    pub transition: Option<TransitionRecord<'a>>,
}

/// Observer callback for one log level.
pub type LogHook = Arc<dyn Fn(&LogRecord<'_>) + Send + Sync>;

/// Per-level hook registry, cloned into every component.
///
/// Hooks are optional; `tracing` emission is unconditional.
#[derive(Clone, Default)]
pub struct Logger {
    debug: Option<LogHook>,
    info: Option<LogHook>,
    warning: Option<LogHook>,
    error: Option<LogHook>,
    fatal: Option<LogHook>,
    transition: Option<LogHook>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug_hook(mut self, hook: LogHook) -> Self {
        self.debug = Some(hook);
        self
    }

    pub fn with_info_hook(mut self, hook: LogHook) -> Self {
        self.info = Some(hook);
        self
    }

    pub fn with_warning_hook(mut self, hook: LogHook) -> Self {
        self.warning = Some(hook);
        self
    }

    pub fn with_error_hook(mut self, hook: LogHook) -> Self {
        self.error = Some(hook);
        self
    }

    pub fn with_fatal_hook(mut self, hook: LogHook) -> Self {
        self.fatal = Some(hook);
        self
    }

    pub fn with_transition_hook(mut self, hook: LogHook) -> Self {
        self.transition = Some(hook);
        self
    }

    pub fn debug(&self, component: &str, text: &str) {
        debug!(component, "{text}");
        self.emit(&self.debug, LogLevel::Debug, component, text, None);
    }

    pub fn info(&self, component: &str, text: &str) {
        info!(component, "{text}");
        self.emit(&self.info, LogLevel::Info, component, text, None);
    }

    pub fn warning(&self, component: &str, text: &str) {
        warn!(component, "{text}");
        self.emit(&self.warning, LogLevel::Warning, component, text, None);
    }

    pub fn error(&self, component: &str, text: &str) {
        error!(component, "{text}");
        self.emit(&self.error, LogLevel::Error, component, text, None);
    }

    pub fn fatal(&self, component: &str, text: &str) {
        error!(component, fatal = true, "{text}");
        self.emit(&self.fatal, LogLevel::Fatal, component, text, None);
    }

    pub fn transition(&self, component: &str, record: TransitionRecord<'_>) {
        debug!(
            component,
            state = record.state,
            interface = record.interface,
            message = record.message,
            next_state = record.next_state,
            "state transition"
        );
        if let Some(hook) = &self.transition {
            let text = format!(
                "{} + {}:{} -> {}",
                record.state, record.interface, record.message, record.next_state
            );
            hook(&LogRecord {
                level: LogLevel::Transition,
                component,
                text: &text,
                transition: Some(record),
            });
        }
    }

    fn emit(
        &self,
        hook: &Option<LogHook>,
        level: LogLevel,
        component: &str,
        text: &str,
        transition: Option<TransitionRecord<'_>>,
    ) {
        if let Some(hook) = hook {
            hook(&LogRecord {
                level,
                component,
                text,
                transition,
            });
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("debug", &self.debug.is_some())
            .field("info", &self.info.is_some())
            .field("warning", &self.warning.is_some())
            .field("error", &self.error.is_some())
            .field("fatal", &self.fatal.is_some())
            .field("transition", &self.transition.is_some())
            .finish()
    }
}
