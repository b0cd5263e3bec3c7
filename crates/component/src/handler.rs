//! Asynchronous interface handlers.
//!
//! A handler adapts external I/O (sockets, serial ports, hardware) to the
//! message queue. It is a component (it has a name, settings, and wired
//! interfaces) but it is *not* a state machine: the device never dispatches
//! messages to it. Instead, a handler typically owns background threads that
//! translate inbound I/O into messages pushed through an [`Outbox`], and it
//! exposes an imperative API that functional components call directly
//! (handlers are shared as `Arc`s, usually passed through the settings map).

use crate::base::{BaseComponent, Outbox};
use crate::component::{Component, ComponentKind};
use machina_core::{ComponentHandle, ConfigError, FromSetting, Message};
use std::any::Any;
use std::sync::Arc;

/// Initialization-time view of the owning component, for handlers and
/// workers.
pub struct HandlerContext<'a> {
    base: &'a BaseComponent,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(base: &'a BaseComponent) -> Self {
        Self { base }
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn handle(&self) -> &ComponentHandle {
        self.base.handle()
    }

    /// Snapshot of the wired interfaces, usable from any thread. Wiring is
    /// complete by the time initialization runs, so the snapshot is final.
    pub fn outbox(&self) -> Outbox {
        self.base.outbox()
    }

    /// Extract and coerce a setting; missing or mistyped keys are fatal.
    pub fn setting<T: FromSetting>(&self, key: &str) -> Result<T, ConfigError> {
        self.base.setting(key)
    }

    pub fn log_error(&self, text: &str) {
        self.base.log_error(text);
    }

    pub fn log_info(&self, text: &str) {
        self.base.log_info(text);
    }

    pub fn log_debug(&self, text: &str) {
        self.base.log_debug(text);
    }
}

/// Application logic of an asynchronous interface handler.
///
/// `initialize` runs in the same initialization phase as functional
/// components; this is where the handler captures its [`Outbox`] and starts
/// whatever background machinery it needs. Handlers are shared across
/// threads, so state they mutate after initialization needs interior
/// mutability.
pub trait AsyncHandler: Send + Sync + 'static {
    fn initialize(&self, ctx: &HandlerContext<'_>) -> Result<(), ConfigError>;
}

/// Device-side wrapper owning a handler's component identity.
pub struct AsyncInterfaceHandler<H: AsyncHandler> {
    base: BaseComponent,
    logic: Arc<H>,
}

impl<H: AsyncHandler> AsyncInterfaceHandler<H> {
    pub fn new(base: BaseComponent, logic: Arc<H>) -> Self {
        Self { base, logic }
    }

    pub fn logic(&self) -> &Arc<H> {
        &self.logic
    }
}

impl<H: AsyncHandler> Component for AsyncInterfaceHandler<H> {
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
        let ctx = HandlerContext::new(&self.base);
        self.logic.initialize(&ctx)
    }

    fn process(&mut self, message: Message) {
        self.base.log_error(&format!(
            "interface handlers do not dispatch messages; dropped \"{}:{}\"",
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
