//! The object-safe seam between components and the device.

use crate::base::BaseComponent;
use machina_core::{ConfigError, Message};
use std::any::Any;

/// How the device treats a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// A state machine; receives messages through the run loop.
    Functional,
    /// An interface handler; produces messages but never dispatches.
    Handler,
}

/// A device-owned component.
///
/// The device drives the lifecycle: wiring through `base_mut`, then
/// [`Component::setup`] in insertion order (framework initialization followed
/// by the user hook), then message dispatch to functional components via
/// [`Component::process`].
pub trait Component: Send + Any {
    fn base(&self) -> &BaseComponent;

    fn base_mut(&mut self) -> &mut BaseComponent;

    fn kind(&self) -> ComponentKind;

    /// Framework initialization plus the user `initialize` hook.
    ///
    /// Errors are configuration failures; the device logs them as fatal and
    /// refuses to start.
    fn setup(&mut self) -> Result<(), ConfigError>;

    /// Dispatch one message. Only called on functional components.
    fn process(&mut self, message: Message);

    /// Current state, for functional components.
    fn current_state(&self) -> Option<&'static str> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
