//! The reserved `Logical` interface.
//!
//! Choice-point evaluation synthesizes one of these two messages to drive the
//! follow-up transition; applications register choice-point outcomes against
//! them and never send them directly.

use crate::message::MessagePayload;

/// Affirmative choice-point verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Yes;

impl MessagePayload for Yes {
    const INTERFACE: &'static str = "Logical";
    const NAME: &'static str = "Yes";
}

/// Negative choice-point verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct No;

impl MessagePayload for No {
    const INTERFACE: &'static str = "Logical";
    const NAME: &'static str = "No";
}
