//! The functional component: a table-driven state machine.
//!
//! A functional component advances by consuming one message at a time. Each
//! message is matched against the transition table keyed on
//! `(state, interface, message)`; the matched entry runs an action and moves
//! the machine to its next state. Two tokens are reserved: a begin state of
//! [`WILDCARD_STATE`] matches any current state when no specific entry
//! exists, and a next state of [`HISTORY_STATE`] restores the state the
//! component was in when the current external message started processing.
//!
//! Choice points are pseudo-states: after a transition lands on one, its
//! evaluator runs and the resulting `Logical.Yes`/`Logical.No` message
//! immediately drives the next transition, chaining until a real state is
//! reached.

use crate::base::BaseComponent;
use crate::component::{Component, ComponentKind};
use machina_core::{
    logical, ComponentHandle, ConfigError, FromSetting, Message, MessagePayload, TimerId,
    TimerService, TransitionRecord, TIMER_INTERFACE,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// State names are compile-time identifiers.
pub type StateName = &'static str;

/// Begin-state token matching any current state.
pub const WILDCARD_STATE: StateName = "*";

/// Next-state token restoring the history state.
pub const HISTORY_STATE: StateName = "H";

/// Placeholder before framework initialization runs.
const UNINITIALIZED: StateName = "NONE";

/// Application logic of a functional component.
///
/// The framework calls the table-building hooks once, in order: `states`,
/// `choice_points`, `transitions`, then the user `initialize` hook. Actions
/// receive the behavior itself mutably plus a [`ComponentContext`] for
/// framework operations.
pub trait Behavior: Send + Sized + 'static {
    /// Declared states; the first is the initial state. Must be non-empty.
    fn states(&self) -> Vec<StateName>;

    /// Register choice points. Each registered name also becomes a state.
    fn choice_points(&self, _table: &mut ChoicePointTable<Self>) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Register transitions. The table must end up non-empty.
    fn transitions(&self, table: &mut TransitionTable<Self>) -> Result<(), ConfigError>;

    /// User initialization, run after the tables are populated. Typically
    /// binds settings and may schedule timers or send initial messages.
    fn initialize(&mut self, _ctx: &mut ComponentContext<'_>) -> Result<(), ConfigError> {
        Ok(())
    }
}

type Action<B> = Box<dyn Fn(&mut B, &mut ComponentContext<'_>, &Message) + Send>;

struct Transition<B> {
    action: Action<B>,
    next_state: StateName,
}

/// The `(state, interface, message) → (action, next state)` table.
pub struct TransitionTable<B> {
    component: String,
    states: Vec<StateName>,
    entries: HashMap<StateName, HashMap<&'static str, HashMap<&'static str, Transition<B>>>>,
}

impl<B: Behavior> TransitionTable<B> {
    fn new(component: &str, states: Vec<StateName>) -> Self {
        Self {
            component: component.to_owned(),
            states,
            entries: HashMap::new(),
        }
    }

    /// Register a transition for message type `M`.
    ///
    /// `state` must be a declared state or [`WILDCARD_STATE`]; `next_state`
    /// must be a declared state or [`HISTORY_STATE`]; each
    /// `(state, interface, message)` triple may be registered once.
    pub fn add<M: MessagePayload>(
        &mut self,
        state: StateName,
        next_state: StateName,
        action: impl Fn(&mut B, &mut ComponentContext<'_>, &M) + Send + 'static,
    ) -> Result<(), ConfigError> {
        if state != WILDCARD_STATE && !self.states.contains(&state) {
            return Err(ConfigError::UnknownState {
                component: self.component.clone(),
                state,
            });
        }
        if next_state != HISTORY_STATE && !self.states.contains(&next_state) {
            return Err(ConfigError::UnknownNextState {
                component: self.component.clone(),
                state: next_state,
            });
        }

        let messages = self
            .entries
            .entry(state)
            .or_default()
            .entry(M::INTERFACE)
            .or_default();
        if messages.contains_key(M::NAME) {
            return Err(ConfigError::DuplicateTransition {
                component: self.component.clone(),
                state,
                interface: M::INTERFACE,
                message: M::NAME,
            });
        }

        let action: Action<B> = Box::new(move |behavior, ctx, message| {
            match message.payload::<M>() {
                Some(payload) => action(behavior, ctx, payload),
                // Dispatch matched the registered tags, so the payload type
                // matches unless a foreign payload reuses them.
                None => ctx.log_error(&format!(
                    "payload of \"{}:{}\" does not match its registered type",
                    M::INTERFACE,
                    M::NAME
                )),
            }
        });
        messages.insert(M::NAME, Transition { action, next_state });
        Ok(())
    }

    /// Register the same transition under several begin states.
    pub fn add_for_states<M: MessagePayload>(
        &mut self,
        states: &[StateName],
        next_state: StateName,
        action: impl Fn(&mut B, &mut ComponentContext<'_>, &M) + Clone + Send + 'static,
    ) -> Result<(), ConfigError> {
        for &state in states {
            self.add::<M>(state, next_state, action.clone())?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of registered `(state, interface, message)` triples.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(|interfaces| interfaces.values())
            .map(HashMap::len)
            .sum()
    }

    /// Iterate the registered `(state, interface, message, next_state)`
    /// tuples, in no particular order.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (StateName, &'static str, &'static str, StateName)> + '_ {
        self.entries.iter().flat_map(|(state, interfaces)| {
            interfaces.iter().flat_map(move |(interface, messages)| {
                messages
                    .iter()
                    .map(move |(message, t)| (*state, *interface, *message, t.next_state))
            })
        })
    }

    fn lookup(&self, state: &str, interface: &str, message: &str) -> Option<&Transition<B>> {
        self.entries.get(state)?.get(interface)?.get(message)
    }

    fn miss_reason(&self, state: &str, interface: &str, message: &str) -> String {
        match self.entries.get(state) {
            None => format!("no transitions are registered for state \"{state}\""),
            Some(interfaces) => match interfaces.get(interface) {
                None => format!(
                    "messages on interface \"{interface}\" are not handled in state \"{state}\""
                ),
                Some(_) => format!(
                    "message \"{message}\" on interface \"{interface}\" is not handled in state \"{state}\""
                ),
            },
        }
    }
}

type Evaluator<B> = Box<dyn Fn(&B) -> bool + Send>;

/// The `choice point → evaluator` table.
pub struct ChoicePointTable<B> {
    component: String,
    names: Vec<StateName>,
    evaluators: HashMap<StateName, Evaluator<B>>,
}

impl<B: Behavior> ChoicePointTable<B> {
    fn new(component: &str) -> Self {
        Self {
            component: component.to_owned(),
            names: Vec::new(),
            evaluators: HashMap::new(),
        }
    }

    /// Register a choice point. The name also becomes a state, so transitions
    /// may target it and must leave it on `Logical.Yes`/`Logical.No`.
    pub fn add(
        &mut self,
        name: StateName,
        evaluator: impl Fn(&B) -> bool + Send + 'static,
    ) -> Result<(), ConfigError> {
        if self.evaluators.contains_key(name) {
            return Err(ConfigError::DuplicateChoicePoint {
                component: self.component.clone(),
                name,
            });
        }
        self.names.push(name);
        self.evaluators.insert(name, Box::new(evaluator));
        Ok(())
    }

    fn names(&self) -> &[StateName] {
        &self.names
    }

    fn evaluate(&self, state: &str, behavior: &B) -> Option<bool> {
        self.evaluators.get(state).map(|eval| eval(behavior))
    }
}

/// Framework operations available to actions and to the `initialize` hook.
pub struct ComponentContext<'a> {
    base: &'a mut BaseComponent,
    timers: &'a Arc<TimerService>,
    envelope: Option<&'a Message>,
}

impl<'a> ComponentContext<'a> {
    fn new(
        base: &'a mut BaseComponent,
        timers: &'a Arc<TimerService>,
        envelope: Option<&'a Message>,
    ) -> Self {
        Self {
            base,
            timers,
            envelope,
        }
    }

    pub fn name(&self) -> &str {
        self.base.name()
    }

    pub fn handle(&self) -> &ComponentHandle {
        self.base.handle()
    }

    /// Send to the first peer on the payload's interface.
    pub fn send<M: MessagePayload>(&mut self, payload: M) {
        self.base.send(payload, 0);
    }

    /// Send to the peer at `index` on the payload's interface.
    pub fn send_indexed<M: MessagePayload>(&mut self, payload: M, index: usize) {
        self.base.send(payload, index);
    }

    /// Schedule a `Timer.Timeout` back to this component.
    pub fn set_timeout(&mut self, duration: Duration) -> TimerId {
        self.timers
            .set_timeout(duration, self.base.handle().clone())
    }

    pub fn cancel_timeout(&mut self, id: TimerId) {
        self.timers.cancel_timeout(id);
    }

    /// Push the message currently being processed to the front of the queue
    /// so the next dispatch re-delivers it. Only meaningful inside a
    /// transition action.
    pub fn resend_last_received_message(&mut self) {
        match self.envelope {
            Some(message) => self.base.queue().resend(message.clone()),
            None => self
                .base
                .log_error("resend requested outside message processing"),
        }
    }

    /// Typed view of the external message currently being processed.
    ///
    /// Inside choice-point follow-up actions this is still the external
    /// message that started the chain, not the synthetic verdict.
    pub fn last_received<M: MessagePayload>(&self) -> Option<&M> {
        self.envelope?.payload::<M>()
    }

    /// Extract and coerce a setting; missing or mistyped keys are fatal.
    pub fn setting<T: FromSetting>(&self, key: &str) -> Result<T, ConfigError> {
        self.base.setting(key)
    }

    pub fn log_error(&self, text: &str) {
        self.base.log_error(text);
    }

    pub fn log_warning(&self, text: &str) {
        self.base.log_warning(text);
    }

    pub fn log_info(&self, text: &str) {
        self.base.log_info(text);
    }

    pub fn log_debug(&self, text: &str) {
        self.base.log_debug(text);
    }
}

/// A state machine bound to its behavior, tables, and runtime services.
pub struct FunctionalComponent<B: Behavior> {
    base: BaseComponent,
    timers: Arc<TimerService>,
    behavior: B,
    states: Vec<StateName>,
    current_state: StateName,
    history_state: StateName,
    transitions: TransitionTable<B>,
    choice_points: ChoicePointTable<B>,
    last_received: Option<Message>,
}

impl<B: Behavior> FunctionalComponent<B> {
    pub fn new(base: BaseComponent, timers: Arc<TimerService>, behavior: B) -> Self {
        let component = base.name().to_owned();
        Self {
            base,
            timers,
            behavior,
            states: Vec::new(),
            current_state: UNINITIALIZED,
            history_state: UNINITIALIZED,
            transitions: TransitionTable::new(&component, Vec::new()),
            choice_points: ChoicePointTable::new(&component),
            last_received: None,
        }
    }

    pub fn current_state(&self) -> StateName {
        self.current_state
    }

    pub fn history_state(&self) -> StateName {
        self.history_state
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    /// Typed view of the most recently processed external message.
    pub fn last_received<M: MessagePayload>(&self) -> Option<&M> {
        self.last_received.as_ref()?.payload::<M>()
    }

    /// Framework initialization: build the state list, the choice-point
    /// table, and the transition table, then run the user hook.
    fn framework_init(&mut self) -> Result<(), ConfigError> {
        let states = self.behavior.states();
        if states.is_empty() {
            return Err(ConfigError::NoStates {
                component: self.base.name().to_owned(),
            });
        }
        self.states = states;
        self.current_state = self.states[0];
        self.history_state = self.current_state;

        // Timeouts this component schedules arrive back to itself.
        let own = self.base.handle().clone();
        self.base.connect_interface(TIMER_INTERFACE, own);

        let mut choice_points = ChoicePointTable::new(self.base.name());
        self.behavior.choice_points(&mut choice_points)?;
        self.states.extend_from_slice(choice_points.names());
        self.choice_points = choice_points;

        let mut transitions = TransitionTable::new(self.base.name(), self.states.clone());
        self.behavior.transitions(&mut transitions)?;
        if transitions.is_empty() {
            return Err(ConfigError::EmptyTransitionTable {
                component: self.base.name().to_owned(),
            });
        }
        self.transitions = transitions;

        let mut ctx = ComponentContext::new(&mut self.base, &self.timers, None);
        self.behavior.initialize(&mut ctx)
    }

    /// Dispatch one external message: snapshot the history state, perform
    /// the transition, then resolve any choice-point chain.
    pub fn process_message(&mut self, message: Message) {
        self.history_state = self.current_state;
        let external = message;

        if self.perform_transition(&external, &external) {
            while let Some(verdict) = self.choice_points.evaluate(self.current_state, &self.behavior)
            {
                let synthetic = if verdict {
                    Message::new(logical::Yes)
                } else {
                    Message::new(logical::No)
                };
                if !self.perform_transition(&synthetic, &external) {
                    break;
                }
            }
        }

        self.last_received = Some(external);
    }

    /// Look up and run one transition for `dispatch`. `external` is the
    /// message that started processing, kept available to actions for resend
    /// and typed inspection.
    ///
    /// Returns whether a transition was found; on a miss the state machine
    /// is left unchanged and the miss is reported through the error hook.
    fn perform_transition(&mut self, dispatch: &Message, external: &Message) -> bool {
        let interface = dispatch.interface_name();
        let name = dispatch.message_name();

        let transition = self
            .transitions
            .lookup(self.current_state, interface, name)
            .or_else(|| self.transitions.lookup(WILDCARD_STATE, interface, name));
        let Some(transition) = transition else {
            let reason = self.transitions.miss_reason(self.current_state, interface, name);
            self.base.log_error(&reason);
            return false;
        };

        let next_state = if transition.next_state == HISTORY_STATE {
            self.history_state
        } else {
            transition.next_state
        };

        self.base.log_transition(TransitionRecord {
            state: self.current_state,
            interface,
            message: name,
            next_state,
        });

        let mut ctx = ComponentContext::new(&mut self.base, &self.timers, Some(external));
        (transition.action)(&mut self.behavior, &mut ctx, dispatch);

        self.current_state = next_state;
        true
    }
}

impl<B: Behavior> Component for FunctionalComponent<B> {
    fn base(&self) -> &BaseComponent {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseComponent {
        &mut self.base
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Functional
    }

    fn setup(&mut self) -> Result<(), ConfigError> {
        self.framework_init()
    }

    fn process(&mut self, message: Message) {
        self.process_message(message);
    }

    fn current_state(&self) -> Option<&'static str> {
        Some(self.current_state)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<B: Behavior> std::fmt::Debug for FunctionalComponent<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionalComponent")
            .field("name", &self.base.name())
            .field("current_state", &self.current_state)
            .field("history_state", &self.history_state)
            .field("states", &self.states)
            .finish()
    }
}
