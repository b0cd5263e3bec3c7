//! Core types for the machina component runtime.
//!
//! This crate provides the foundational pieces every machina application is
//! built from:
//!
//! - [`Message`]: the envelope that travels through the runtime, carrying a
//!   typed payload plus routing metadata
//! - [`MessageQueue`]: the single-consumer FIFO connecting all producers to
//!   the device run loop
//! - [`TimerService`]: one-shot timers delivered back as `Timer.Timeout`
//!   messages
//! - [`Settings`]: the dynamically-typed configuration map handed to every
//!   component
//! - [`Logger`]: structured tracing emission plus optional per-level hooks
//!
//! # Architecture
//!
//! The runtime is built on a simple single-consumer model:
//!
//! ```text
//! producers (components, timers, handlers, workers) → queue → device loop
//! ```
//!
//! Every functional-component transition runs on the device loop, one message
//! at a time, so component state needs no locking. Producers may push from
//! any thread.

mod error;
mod logging;
mod message;
mod queue;
mod settings;
mod timer;

pub mod logical;

pub use error::ConfigError;
pub use logging::{LogHook, LogLevel, LogRecord, Logger, TransitionRecord};
pub use message::{ComponentHandle, ComponentId, Message, MessagePayload};
pub use queue::MessageQueue;
pub use settings::{FromSetting, SettingValue, Settings, SettingsError};
pub use timer::{TimerId, TimerService, Timeout, TIMER_INTERFACE};
