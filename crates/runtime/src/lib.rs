//! The machina device: the top-level container of an application.
//!
//! A device owns the message queue, the timer service, and every component.
//! Applications build one like this:
//!
//! 1. create components ([`Device::create_component`],
//!    [`Device::create_handler`], [`Device::create_worker`])
//! 2. wire interfaces ([`Device::connect_interface`])
//! 3. initialize ([`Device::initialize_components`])
//! 4. run the dispatch loop ([`Device::run`])
//!
//! The run loop is the single consumer of the queue: it dequeues one message
//! at a time and dispatches it to the receiving functional component, so no
//! two transitions ever run concurrently and component state needs no
//! locking.

mod device;

pub use device::{Device, DeviceBuilder};
