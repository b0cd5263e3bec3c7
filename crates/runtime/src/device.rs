//! Component ownership, wiring, and the dispatch loop.

use machina_component::{
    AsyncHandler, AsyncInterfaceHandler, BaseComponent, Behavior, Component, ComponentKind,
    FunctionalComponent, StateName, Worker, WorkerControl, WorkerHandler,
};
use machina_core::{
    ComponentHandle, ComponentId, ConfigError, Logger, Message, MessageQueue, Settings,
    TimerService,
};
use std::sync::Arc;
use tracing::info;

/// Builder for a [`Device`].
pub struct DeviceBuilder {
    logger: Logger,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self {
            logger: Logger::new(),
        }
    }

    /// Install the logger cloned into every component. Hooks registered on
    /// it observe all engine log events.
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> Device {
        let queue = Arc::new(MessageQueue::new());
        let timers = Arc::new(TimerService::new(Arc::clone(&queue)));
        Device {
            queue,
            timers,
            logger: self.logger,
            components: Vec::new(),
        }
    }
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The top-level container: queue, timer service, and all components.
pub struct Device {
    queue: Arc<MessageQueue>,
    timers: Arc<TimerService>,
    logger: Logger,
    components: Vec<Box<dyn Component>>,
}

impl Device {
    pub fn new() -> Self {
        DeviceBuilder::new().build()
    }

    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::new()
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    pub fn timers(&self) -> &Arc<TimerService> {
        &self.timers
    }

    /// Create a functional component running `B`.
    pub fn create_component<B: Behavior + Default>(
        &mut self,
        name: &str,
        settings: Settings,
    ) -> ComponentHandle {
        let (handle, base) = self.new_base(name, settings);
        let component = FunctionalComponent::new(base, Arc::clone(&self.timers), B::default());
        self.components.push(Box::new(component));
        handle
    }

    /// Create an asynchronous interface handler.
    ///
    /// Returns the shared logic so the application can wire it into other
    /// components' settings and drive its imperative API.
    pub fn create_handler<H: AsyncHandler + Default>(
        &mut self,
        name: &str,
        settings: Settings,
    ) -> (ComponentHandle, Arc<H>) {
        let (handle, base) = self.new_base(name, settings);
        let logic = Arc::new(H::default());
        let component = AsyncInterfaceHandler::new(base, Arc::clone(&logic));
        self.components.push(Box::new(component));
        (handle, logic)
    }

    /// Create a worker handler.
    ///
    /// Returns the shared control used to start and cancel the work.
    pub fn create_worker<W: Worker + Default>(
        &mut self,
        name: &str,
        settings: Settings,
    ) -> (ComponentHandle, Arc<WorkerControl<W>>) {
        let (handle, base) = self.new_base(name, settings);
        let control = Arc::new(WorkerControl::new(
            handle.clone(),
            Arc::clone(&self.queue),
            self.logger.clone(),
            W::default(),
        ));
        let component = WorkerHandler::new(base, Arc::clone(&control));
        self.components.push(Box::new(component));
        (handle, control)
    }

    /// Wire `interface` between two components.
    ///
    /// Each side records the peer only if the peer is functional: handlers
    /// never dispatch, so a connection entry pointing at one would only
    /// produce undeliverable messages. Handlers do get entries for their
    /// functional peers, which is what lets them enqueue inbound messages.
    pub fn connect_interface(
        &mut self,
        interface: &'static str,
        first: &ComponentHandle,
        second: &ComponentHandle,
    ) {
        let Some(first_kind) = self.kind_of(first) else {
            self.logger.error(
                first.name(),
                &format!("cannot wire \"{interface}\": unknown component"),
            );
            return;
        };
        let Some(second_kind) = self.kind_of(second) else {
            self.logger.error(
                second.name(),
                &format!("cannot wire \"{interface}\": unknown component"),
            );
            return;
        };

        if second_kind == ComponentKind::Functional {
            self.components[first.id().0]
                .base_mut()
                .connect_interface(interface, second.clone());
        }
        if first_kind == ComponentKind::Functional {
            self.components[second.id().0]
                .base_mut()
                .connect_interface(interface, first.clone());
        }
    }

    /// Run framework initialization plus the user hook on every component,
    /// in creation order. The first configuration error is reported through
    /// the fatal hook and returned; the device must not be run afterwards.
    pub fn initialize_components(&mut self) -> Result<(), ConfigError> {
        for component in &mut self.components {
            let name = component.base().name().to_owned();
            if let Err(error) = component.setup() {
                self.logger.fatal(&name, &error.to_string());
                return Err(error);
            }
        }
        info!(components = self.components.len(), "device initialized");
        Ok(())
    }

    /// Dispatch messages forever. This is the single consumer of the queue.
    pub async fn run(&mut self) {
        loop {
            self.dispatch_next().await;
        }
    }

    /// Wait for one message and dispatch it.
    pub async fn dispatch_next(&mut self) {
        let message = self.queue.await_message().await;
        self.dispatch(message);
    }

    /// Dispatch all messages that are already queued, without waiting.
    pub fn drain(&mut self) {
        while let Some(message) = self.queue.try_take() {
            self.dispatch(message);
        }
    }

    /// Current state of a functional component.
    pub fn current_state(&self, handle: &ComponentHandle) -> Option<StateName> {
        self.components.get(handle.id().0)?.current_state()
    }

    /// Typed view of a functional component's behavior.
    pub fn behavior<B: Behavior>(&self, handle: &ComponentHandle) -> Option<&B> {
        self.components
            .get(handle.id().0)?
            .as_any()
            .downcast_ref::<FunctionalComponent<B>>()
            .map(FunctionalComponent::behavior)
    }

    /// Mutable typed view of a functional component's behavior.
    pub fn behavior_mut<B: Behavior>(&mut self, handle: &ComponentHandle) -> Option<&mut B> {
        self.components
            .get_mut(handle.id().0)?
            .as_any_mut()
            .downcast_mut::<FunctionalComponent<B>>()
            .map(FunctionalComponent::behavior_mut)
    }

    fn new_base(&mut self, name: &str, settings: Settings) -> (ComponentHandle, BaseComponent) {
        let handle = ComponentHandle::new(ComponentId(self.components.len()), name);
        let base = BaseComponent::new(
            handle.clone(),
            settings,
            Arc::clone(&self.queue),
            self.logger.clone(),
        );
        (handle, base)
    }

    fn kind_of(&self, handle: &ComponentHandle) -> Option<ComponentKind> {
        self.components.get(handle.id().0).map(|c| c.kind())
    }

    fn dispatch(&mut self, message: Message) {
        let receiver = message.receiver.clone();
        let component = receiver
            .as_ref()
            .and_then(|r| self.components.get_mut(r.id().0));
        match component {
            Some(component) if component.kind() == ComponentKind::Functional => {
                component.process(message);
            }
            _ => self.report_undeliverable(&message),
        }
    }

    /// A message without a dispatchable receiver is reported through its
    /// sender's error hook and dropped.
    fn report_undeliverable(&self, message: &Message) {
        let text = format!(
            "message \"{}\" on interface \"{}\" has no dispatchable receiver",
            message.message_name(),
            message.interface_name()
        );
        let source = message
            .sender
            .as_ref()
            .map_or("device", ComponentHandle::name);
        self.logger.error(source, &text);
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("components", &self.components.len())
            .field("queued", &self.queue.len())
            .finish()
    }
}
