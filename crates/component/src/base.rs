//! Shared component plumbing: identity, settings, connections, routing.

use machina_core::{
    ComponentHandle, ConfigError, FromSetting, Logger, Message, MessagePayload, MessageQueue,
    Settings, TransitionRecord,
};
use std::collections::HashMap;
use std::sync::Arc;

/// State shared by every component kind: name and id, the immutable settings
/// map, the interface-connection registry, and the handles needed to route
/// outgoing messages.
///
/// Connections are written only while the device wires the application, before
/// initialization; afterwards the registry is read-only, which is what allows
/// [`BaseComponent::outbox`] to hand snapshots to background threads.
pub struct BaseComponent {
    handle: ComponentHandle,
    settings: Settings,
    interfaces: HashMap<&'static str, Vec<ComponentHandle>>,
    queue: Arc<MessageQueue>,
    logger: Logger,
}

impl BaseComponent {
    pub fn new(
        handle: ComponentHandle,
        settings: Settings,
        queue: Arc<MessageQueue>,
        logger: Logger,
    ) -> Self {
        Self {
            handle,
            settings,
            interfaces: HashMap::new(),
            queue,
            logger,
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn handle(&self) -> &ComponentHandle {
        &self.handle
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Append `peer` to the interface's peer list.
    ///
    /// A `(interface, peer)` pair may appear at most once; a duplicate
    /// request is reported through the error hook and refused.
    pub fn connect_interface(&mut self, interface: &'static str, peer: ComponentHandle) {
        let peers = self.interfaces.entry(interface).or_default();
        if peers.contains(&peer) {
            self.logger.error(
                self.handle.name(),
                &format!(
                    "interface \"{interface}\" is already connected to component \"{}\"",
                    peer.name()
                ),
            );
            return;
        }
        peers.push(peer);
    }

    /// Peers connected on `interface`, in connection order.
    pub fn peers(&self, interface: &str) -> Option<&[ComponentHandle]> {
        self.interfaces.get(interface).map(Vec::as_slice)
    }

    /// Route a message to the peer at `index` on the payload's interface.
    ///
    /// An unconnected interface or an out-of-range index is reported through
    /// the error hook and the message is dropped.
    pub fn send<M: MessagePayload>(&self, payload: M, index: usize) {
        route_message(
            &self.interfaces,
            &self.handle,
            &self.queue,
            &self.logger,
            payload,
            index,
        );
    }

    /// Extract and coerce a setting, reporting a fatal log event on a
    /// missing key or a type mismatch.
    pub fn setting<T: FromSetting>(&self, key: &str) -> Result<T, ConfigError> {
        match self.settings.get::<T>(key) {
            Ok(value) => Ok(value),
            Err(source) => {
                self.logger.fatal(self.handle.name(), &source.to_string());
                Err(ConfigError::Setting {
                    component: self.handle.name().to_owned(),
                    source,
                })
            }
        }
    }

    /// Snapshot of this component's routing state, usable from any thread.
    ///
    /// Only meaningful once wiring is complete.
    pub fn outbox(&self) -> Outbox {
        Outbox {
            sender: self.handle.clone(),
            interfaces: self.interfaces.clone(),
            queue: Arc::clone(&self.queue),
            logger: self.logger.clone(),
        }
    }

    pub fn log_error(&self, text: &str) {
        self.logger.error(self.handle.name(), text);
    }

    pub fn log_warning(&self, text: &str) {
        self.logger.warning(self.handle.name(), text);
    }

    pub fn log_info(&self, text: &str) {
        self.logger.info(self.handle.name(), text);
    }

    pub fn log_debug(&self, text: &str) {
        self.logger.debug(self.handle.name(), text);
    }

    pub fn log_fatal(&self, text: &str) {
        self.logger.fatal(self.handle.name(), text);
    }

    pub(crate) fn log_transition(&self, record: TransitionRecord<'_>) {
        self.logger.transition(self.handle.name(), record);
    }
}

impl std::fmt::Debug for BaseComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseComponent")
            .field("handle", &self.handle)
            .field("interfaces", &self.interfaces)
            .finish()
    }
}

/// A cloneable, thread-safe sending endpoint.
///
/// Interface handlers and workers capture one at initialization time and use
/// it to push messages from their own threads. Routing behaves exactly like
/// [`BaseComponent::send`].
#[derive(Clone)]
pub struct Outbox {
    sender: ComponentHandle,
    interfaces: HashMap<&'static str, Vec<ComponentHandle>>,
    queue: Arc<MessageQueue>,
    logger: Logger,
}

impl Outbox {
    /// Send to the first peer on the payload's interface.
    pub fn send<M: MessagePayload>(&self, payload: M) {
        self.send_indexed(payload, 0);
    }

    /// Send to the peer at `index` on the payload's interface.
    pub fn send_indexed<M: MessagePayload>(&self, payload: M, index: usize) {
        route_message(
            &self.interfaces,
            &self.sender,
            &self.queue,
            &self.logger,
            payload,
            index,
        );
    }

    pub fn sender(&self) -> &ComponentHandle {
        &self.sender
    }
}

fn route_message<M: MessagePayload>(
    interfaces: &HashMap<&'static str, Vec<ComponentHandle>>,
    sender: &ComponentHandle,
    queue: &MessageQueue,
    logger: &Logger,
    payload: M,
    index: usize,
) {
    let Some(peers) = interfaces.get(M::INTERFACE) else {
        logger.error(
            sender.name(),
            &format!(
                "cannot send \"{}\": interface \"{}\" is not connected",
                M::NAME,
                M::INTERFACE
            ),
        );
        return;
    };
    if index >= peers.len() {
        logger.error(
            sender.name(),
            &format!(
                "cannot send \"{}\" on interface \"{}\" at index {index}: only {} peer(s) connected",
                M::NAME,
                M::INTERFACE,
                peers.len()
            ),
        );
        return;
    }

    let mut message = Message::new(payload);
    message.sender = Some(sender.clone());
    message.receiver = Some(peers[index].clone());
    message.interface_index = index;
    queue.push(message);
}
