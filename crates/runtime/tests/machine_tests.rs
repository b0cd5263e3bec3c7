//! Engine-level scenarios driven through a full device: timers, choice
//! points, history state, cancellation races, and delivery errors.

#[allow(dead_code)]
mod common;

use common::{control, init_tracing, LogCapture};
use machina_component::{
    AsyncHandler, Behavior, ChoicePointTable, ComponentContext, HandlerContext, StateName,
    TransitionTable, HISTORY_STATE,
};
use machina_core::{
    logical, ConfigError, Message, MessagePayload, Settings, TimerId, Timeout,
};
use machina_runtime::Device;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy)]
struct FooBar;

impl MessagePayload for FooBar {
    const INTERFACE: &'static str = "Foo";
    const NAME: &'static str = "Bar";
}

/// Drive the device until `cond` holds. Callers bound it with `timeout`.
async fn run_until(device: &mut Device, mut cond: impl FnMut(&Device) -> bool) {
    while !cond(device) {
        device.dispatch_next().await;
    }
}

fn inject<M: MessagePayload>(device: &Device, payload: M, receiver: &machina_core::ComponentHandle) {
    let mut message = Message::new(payload);
    message.receiver = Some(receiver.clone());
    device.queue().push(message);
}

// ═══════════════════════════════════════════════════════════════════════
// Timeout loop
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Ticker {
    period: Duration,
    ticks: Vec<TimerId>,
    timer: Option<TimerId>,
}

impl Behavior for Ticker {
    fn states(&self) -> Vec<StateName> {
        vec!["S"]
    }

    fn transitions(&self, table: &mut TransitionTable<Self>) -> Result<(), ConfigError> {
        table.add::<Timeout>("S", "S", |b, ctx, m| {
            b.ticks.push(m.timer_id);
            b.timer = Some(ctx.set_timeout(b.period));
        })
    }

    fn initialize(&mut self, ctx: &mut ComponentContext<'_>) -> Result<(), ConfigError> {
        self.period = ctx.setting("period")?;
        self.timer = Some(ctx.set_timeout(self.period));
        Ok(())
    }
}

#[tokio::test]
async fn timeout_loop_ticks_with_increasing_ids() {
    init_tracing();
    let mut device = Device::new();
    let ticker = device.create_component::<Ticker>(
        "ticker",
        Settings::new().with("period", Duration::from_millis(15)),
    );
    device.initialize_components().unwrap();

    let _ = timeout(Duration::from_millis(300), device.run()).await;

    let ticks = &device.behavior::<Ticker>(&ticker).unwrap().ticks;
    assert!(ticks.len() >= 4, "expected at least 4 ticks, got {}", ticks.len());
    assert!(
        ticks.windows(2).all(|pair| pair[0] < pair[1]),
        "timer ids must be strictly increasing: {ticks:?}"
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Choice-point resolution
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Chooser {
    server_id: u32,
}

impl Behavior for Chooser {
    fn states(&self) -> Vec<StateName> {
        vec!["A", "B", "C"]
    }

    fn choice_points(&self, table: &mut ChoicePointTable<Self>) -> Result<(), ConfigError> {
        table.add("CP", |b| (1..=3).contains(&b.server_id))
    }

    fn transitions(&self, table: &mut TransitionTable<Self>) -> Result<(), ConfigError> {
        table.add::<control::Go>("A", "CP", |b, _ctx, m| b.server_id = m.code)?;
        table.add::<logical::Yes>("CP", "B", |_b, _ctx, _m| {})?;
        table.add::<logical::No>("CP", "C", |_b, _ctx, _m| {})?;
        Ok(())
    }
}

#[tokio::test]
async fn choice_point_resolves_on_the_evaluator_verdict() {
    init_tracing();
    let capture = LogCapture::new();
    let mut device = Device::builder().logger(capture.logger()).build();
    let chooser = device.create_component::<Chooser>("chooser", Settings::new());
    device.initialize_components().unwrap();

    inject(&device, control::Go { code: 2 }, &chooser);
    device.dispatch_next().await;
    assert_eq!(device.current_state(&chooser), Some("B"));

    let cp_to_b = capture
        .transitions
        .lock()
        .iter()
        .filter(|t| t.state == "CP" && t.next_state == "B")
        .count();
    assert_eq!(cp_to_b, 1);

    // Unknown server id takes the negative branch on a fresh machine.
    let mut device = Device::new();
    let chooser = device.create_component::<Chooser>("chooser", Settings::new());
    device.initialize_components().unwrap();

    inject(&device, control::Go { code: 99 }, &chooser);
    device.dispatch_next().await;
    assert_eq!(device.current_state(&chooser), Some("C"));
}

// ═══════════════════════════════════════════════════════════════════════
// History state
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct HistoryProbe {
    code: u32,
}

impl Behavior for HistoryProbe {
    fn states(&self) -> Vec<StateName> {
        vec!["Working", "Waiting"]
    }

    fn choice_points(&self, table: &mut ChoicePointTable<Self>) -> Result<(), ConfigError> {
        table.add("Ready?", |b| b.code != 0)
    }

    fn transitions(&self, table: &mut TransitionTable<Self>) -> Result<(), ConfigError> {
        table.add_for_states::<control::Go>(&["Working", "Waiting"], "Ready?", |b, _ctx, m| {
            b.code = m.code;
        })?;
        table.add::<logical::Yes>("Ready?", HISTORY_STATE, |_b, _ctx, _m| {})?;
        table.add::<logical::No>("Ready?", "Waiting", |_b, _ctx, _m| {})?;
        Ok(())
    }
}

#[tokio::test]
async fn history_state_restores_the_pre_choice_point_state() {
    init_tracing();
    let mut device = Device::new();
    let probe = device.create_component::<HistoryProbe>("probe", Settings::new());
    device.initialize_components().unwrap();

    // Positive verdict returns to the state the message arrived in.
    inject(&device, control::Go { code: 1 }, &probe);
    device.dispatch_next().await;
    assert_eq!(device.current_state(&probe), Some("Working"));

    // Negative verdict parks the machine.
    inject(&device, control::Go { code: 0 }, &probe);
    device.dispatch_next().await;
    assert_eq!(device.current_state(&probe), Some("Waiting"));

    // The same "H" transition now restores Waiting instead of Working.
    inject(&device, control::Go { code: 1 }, &probe);
    device.dispatch_next().await;
    assert_eq!(device.current_state(&probe), Some("Waiting"));
}

// ═══════════════════════════════════════════════════════════════════════
// Timer cancellation races
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct TimerHolder {
    delay: Duration,
    timer: Option<TimerId>,
    ticks: Vec<TimerId>,
}

impl Behavior for TimerHolder {
    fn states(&self) -> Vec<StateName> {
        vec!["S"]
    }

    fn transitions(&self, table: &mut TransitionTable<Self>) -> Result<(), ConfigError> {
        table.add::<Timeout>("S", "S", |b, _ctx, m| {
            // Stale timeouts (cancelled too late) are ignored.
            if b.timer == Some(m.timer_id) {
                b.ticks.push(m.timer_id);
            }
        })
    }

    fn initialize(&mut self, ctx: &mut ComponentContext<'_>) -> Result<(), ConfigError> {
        self.delay = ctx.setting("delay")?;
        self.timer = Some(ctx.set_timeout(self.delay));
        Ok(())
    }
}

#[tokio::test]
async fn cancel_before_firing_means_no_delivery() {
    init_tracing();
    let mut device = Device::new();
    let holder = device.create_component::<TimerHolder>(
        "holder",
        Settings::new().with("delay", Duration::from_millis(100)),
    );
    device.initialize_components().unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let timer = device.behavior::<TimerHolder>(&holder).unwrap().timer.unwrap();
    device.timers().cancel_timeout(timer);

    let _ = timeout(Duration::from_millis(200), device.run()).await;

    assert!(device.behavior::<TimerHolder>(&holder).unwrap().ticks.is_empty());
    assert!(device.queue().is_empty());
}

#[tokio::test]
async fn cancel_after_firing_scrubs_the_queued_timeout() {
    init_tracing();
    let mut device = Device::new();
    let holder = device.create_component::<TimerHolder>(
        "holder",
        Settings::new().with("delay", Duration::from_millis(1)),
    );
    device.initialize_components().unwrap();

    // Hold the device loop so the fired Timeout stays queued.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(device.queue().len(), 1);

    let timer = device.behavior::<TimerHolder>(&holder).unwrap().timer.unwrap();
    device.timers().cancel_timeout(timer);
    assert!(device.queue().is_empty());

    let _ = timeout(Duration::from_millis(50), device.run()).await;
    assert!(device.behavior::<TimerHolder>(&holder).unwrap().ticks.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════
// Delivery errors
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct BadSender;

impl Behavior for BadSender {
    fn states(&self) -> Vec<StateName> {
        vec!["S"]
    }

    fn transitions(&self, table: &mut TransitionTable<Self>) -> Result<(), ConfigError> {
        table.add::<control::Go>("S", "S", |_b, _ctx, _m| {})
    }

    fn initialize(&mut self, ctx: &mut ComponentContext<'_>) -> Result<(), ConfigError> {
        ctx.send(FooBar);
        Ok(())
    }
}

#[tokio::test]
async fn send_to_unconnected_interface_is_logged_and_dropped() {
    init_tracing();
    let capture = LogCapture::new();
    let mut device = Device::builder().logger(capture.logger()).build();
    device.create_component::<BadSender>("bad-sender", Settings::new());
    device.initialize_components().unwrap();

    assert_eq!(capture.error_count(), 1);
    assert!(device.queue().is_empty());
}

#[derive(Default)]
struct NullHandler;

impl AsyncHandler for NullHandler {
    fn initialize(&self, _ctx: &HandlerContext<'_>) -> Result<(), ConfigError> {
        Ok(())
    }
}

#[tokio::test]
async fn message_addressed_to_a_handler_is_undeliverable() {
    init_tracing();
    let capture = LogCapture::new();
    let mut device = Device::builder().logger(capture.logger()).build();
    let (handler, _logic) = device.create_handler::<NullHandler>("null", Settings::new());
    device.initialize_components().unwrap();

    inject(&device, control::Go { code: 0 }, &handler);
    device.dispatch_next().await;

    assert_eq!(capture.error_count(), 1);
    assert!(capture.errors.lock()[0].contains("no dispatchable receiver"));
}

#[tokio::test]
async fn functional_component_cannot_address_a_handler() {
    // Wiring records a peer only if the peer dispatches, so the functional
    // side sees the interface as unconnected.
    init_tracing();
    let capture = LogCapture::new();
    let mut device = Device::builder().logger(capture.logger()).build();
    let sender = device.create_component::<BadSender>("sender", Settings::new());
    let (handler, _logic) = device.create_handler::<NullHandler>("sink", Settings::new());
    device.connect_interface("Foo", &sender, &handler);
    device.initialize_components().unwrap();

    // BadSender::initialize already tried to send Foo.Bar.
    assert_eq!(capture.error_count(), 1);
    assert!(device.queue().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════
// Resend ordering
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Resender {
    values: Vec<u32>,
}

impl Behavior for Resender {
    fn states(&self) -> Vec<StateName> {
        vec!["First", "Second"]
    }

    fn transitions(&self, table: &mut TransitionTable<Self>) -> Result<(), ConfigError> {
        table.add::<control::Data>("First", "Second", |_b, ctx, _m| {
            ctx.resend_last_received_message();
        })?;
        table.add::<control::Data>("Second", "Second", |b, _ctx, m| {
            b.values.push(m.value);
        })?;
        Ok(())
    }
}

#[tokio::test]
async fn resent_message_is_dispatched_before_tail_messages() {
    init_tracing();
    let mut device = Device::new();
    let resender = device.create_component::<Resender>("resender", Settings::new());
    device.initialize_components().unwrap();

    inject(&device, control::Data { value: 1 }, &resender);
    inject(&device, control::Data { value: 2 }, &resender);

    timeout(
        Duration::from_secs(1),
        run_until(&mut device, |d| {
            d.behavior::<Resender>(&resender).unwrap().values.len() == 2
        }),
    )
    .await
    .expect("both deliveries should arrive");

    // The deferred message is re-delivered before the tail push.
    assert_eq!(device.behavior::<Resender>(&resender).unwrap().values, vec![1, 2]);
}

// ═══════════════════════════════════════════════════════════════════════
// Initialization failures
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Stateless;

impl Behavior for Stateless {
    fn states(&self) -> Vec<StateName> {
        vec![]
    }

    fn transitions(&self, _table: &mut TransitionTable<Self>) -> Result<(), ConfigError> {
        Ok(())
    }
}

#[tokio::test]
async fn empty_state_list_keeps_the_device_from_starting() {
    init_tracing();
    let capture = LogCapture::new();
    let mut device = Device::builder().logger(capture.logger()).build();
    device.create_component::<Stateless>("stateless", Settings::new());

    let result = device.initialize_components();
    assert!(matches!(result, Err(ConfigError::NoStates { .. })));
    assert_eq!(capture.fatals.lock().len(), 1);
}

#[tokio::test]
async fn missing_setting_keeps_the_device_from_starting() {
    init_tracing();
    let capture = LogCapture::new();
    let mut device = Device::builder().logger(capture.logger()).build();
    device.create_component::<Ticker>("ticker", Settings::new());

    let result = device.initialize_components();
    assert!(matches!(result, Err(ConfigError::Setting { .. })));
    assert!(!capture.fatals.lock().is_empty());
}
