//! Message and component-reference types.
//!
//! A message is a typed payload wrapped in a routing envelope. Payload types
//! are plain structs; the pair of associated constants on [`MessagePayload`]
//! identifies the interface and the message kind, and transition registration
//! uses those constants so that action bodies receive the payload as its
//! concrete type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Index of a component inside its owning device.
///
/// Identifiers are assigned in creation order and never reused; components
/// live for the lifetime of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub usize);

/// Cheap, cloneable reference to a component: its device-assigned id plus its
/// name for diagnostics.
///
/// Handles are what messages carry in their `sender`/`receiver` fields and
/// what interface registries store. Equality is by id.
#[derive(Clone)]
pub struct ComponentHandle {
    id: ComponentId,
    name: Arc<str>,
}

impl ComponentHandle {
    /// Create a handle. Normally only the device does this.
    pub fn new(id: ComponentId, name: &str) -> Self {
        Self {
            id,
            name: Arc::from(name),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for ComponentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentHandle {}

impl std::hash::Hash for ComponentHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id.0)
    }
}

/// A message payload: the data carried on one interface under one name.
///
/// The associated constants identify the `(interface, message)` pair in
/// transition tables and queue scans; the static type of the payload is what
/// transition actions receive.
///
/// ```
/// use machina_core::MessagePayload;
///
/// #[derive(Debug, Clone)]
/// struct ConnectReq {
///     server_id: u32,
/// }
///
/// impl MessagePayload for ConnectReq {
///     const INTERFACE: &'static str = "Transceiving";
///     const NAME: &'static str = "ConnectReq";
/// }
/// ```
pub trait MessagePayload: Any + Clone + Send + 'static {
    /// Name of the interface this message belongs to.
    const INTERFACE: &'static str;
    /// Name of the message within its interface.
    const NAME: &'static str;
}

/// Object-safe view of a payload held inside an envelope.
trait DynPayload: Any + Send {
    fn as_any(&self) -> &dyn Any;
    fn clone_box(&self) -> Box<dyn DynPayload>;
}

impl<M: MessagePayload> DynPayload for M {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn DynPayload> {
        Box::new(self.clone())
    }
}

/// The envelope that travels through the queue.
///
/// Carries the payload plus routing metadata. `sender` is stamped by the
/// sending component; `receiver` and `interface_index` are resolved at send
/// time from the sender's interface registry; `timestamp_ms` is stamped by
/// the queue at push. Synthetic engine-internal messages (choice-point
/// verdicts, timeouts before routing) leave `sender` unset.
pub struct Message {
    payload: Box<dyn DynPayload>,
    interface_name: &'static str,
    message_name: &'static str,
    /// Component that sent the message, if any.
    pub sender: Option<ComponentHandle>,
    /// Component the message is addressed to, resolved at send time.
    pub receiver: Option<ComponentHandle>,
    /// Monotonic milliseconds since the queue started, stamped at push.
    pub timestamp_ms: i64,
    /// Which peer on a multi-peer interface the message was sent to.
    pub interface_index: usize,
}

impl Message {
    /// Wrap a payload in a fresh envelope with no routing metadata.
    pub fn new<M: MessagePayload>(payload: M) -> Self {
        Self {
            payload: Box::new(payload),
            interface_name: M::INTERFACE,
            message_name: M::NAME,
            sender: None,
            receiver: None,
            timestamp_ms: 0,
            interface_index: 0,
        }
    }

    pub fn interface_name(&self) -> &'static str {
        self.interface_name
    }

    pub fn message_name(&self) -> &'static str {
        self.message_name
    }

    /// Typed view of the payload. Returns `None` when `M` does not match the
    /// payload actually carried.
    pub fn payload<M: MessagePayload>(&self) -> Option<&M> {
        self.payload.as_any().downcast_ref::<M>()
    }
}

impl Clone for Message {
    fn clone(&self) -> Self {
        Self {
            payload: self.payload.clone_box(),
            interface_name: self.interface_name,
            message_name: self.message_name,
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            timestamp_ms: self.timestamp_ms,
            interface_index: self.interface_index,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("interface", &self.interface_name)
            .field("name", &self.message_name)
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("timestamp_ms", &self.timestamp_ms)
            .field("interface_index", &self.interface_index)
            .finish()
    }
}
