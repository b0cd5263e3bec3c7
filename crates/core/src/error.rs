//! Configuration errors.
//!
//! These are the failures that keep a device from starting: they are
//! reported through the fatal log hook during component initialization and
//! propagated out of `initialize_components`. Runtime delivery problems
//! (dispatch misses, sends to unconnected interfaces, duplicate wiring) are
//! deliberately *not* errors in this sense; they are logged and the engine
//! carries on.

use crate::settings::SettingsError;
use thiserror::Error;

/// A component configuration failure detected during initialization.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("component \"{component}\" declares no states")]
    NoStates { component: String },

    #[error("component \"{component}\": state \"{state}\" is not declared")]
    UnknownState {
        component: String,
        state: &'static str,
    },

    #[error("component \"{component}\": next state \"{state}\" is not declared")]
    UnknownNextState {
        component: String,
        state: &'static str,
    },

    #[error(
        "component \"{component}\": transition {interface}:{message} on state \"{state}\" is already registered"
    )]
    DuplicateTransition {
        component: String,
        state: &'static str,
        interface: &'static str,
        message: &'static str,
    },

    #[error("component \"{component}\": choice point \"{name}\" is already registered")]
    DuplicateChoicePoint {
        component: String,
        name: &'static str,
    },

    #[error("component \"{component}\" registers no transitions")]
    EmptyTransitionTable { component: String },

    #[error("component \"{component}\": {source}")]
    Setting {
        component: String,
        #[source]
        source: SettingsError,
    },
}
