//! Component model for the machina runtime.
//!
//! Applications are composed of two component families:
//!
//! - **Functional components** ([`FunctionalComponent`]) are state machines.
//!   They receive messages through the device run loop, one at a time, and
//!   advance a transition table. Application logic implements [`Behavior`].
//! - **Interface handlers** ([`AsyncInterfaceHandler`], [`WorkerHandler`])
//!   adapt the outside world. They never dispatch through the state-machine
//!   engine; they push messages into the queue from their own threads and
//!   expose imperative APIs that functional components drive directly.
//!
//! Both families share a [`BaseComponent`]: identity, settings, the
//! interface-connection registry, and message routing.

mod base;
mod component;
mod functional;
mod handler;
mod worker;

pub use base::{BaseComponent, Outbox};
pub use component::{Component, ComponentKind};
pub use functional::{
    Behavior, ChoicePointTable, ComponentContext, FunctionalComponent, StateName,
    TransitionTable, HISTORY_STATE, WILDCARD_STATE,
};
pub use handler::{AsyncHandler, AsyncInterfaceHandler, HandlerContext};
pub use worker::{CancellationToken, Worker, WorkerControl, WorkerHandler};
