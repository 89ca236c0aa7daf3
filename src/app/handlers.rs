//! Handler set: the named operations a command can invoke.
//!
//! Every handler takes the [`HandlerEnv`] and the command's argument map
//! and posts its own result(s).  Handlers never fail outward: invalid
//! input and peripheral errors become a `success: false` result carrying
//! `{"err": msg}`, and validation always finishes before the first side
//! effect.
//!
//! ```text
//!   synchronous   validate ─▶ act ─▶ post result
//!   scheduled     validate ─▶ record state ─▶ post "scheduled" ─▶ spawn task
//!                                                                   │
//!                                              post final result ◀──┘
//! ```

use std::io;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};
use serde_json::{Map, Value, json};

use super::context::{MultiReadArgs, PinEntry, SharedContext, TimerEntry};
use super::lock;
use super::ports::{
    ADC_VALID_PINS, AdcSource, BoardPort, Led, PinMode, Pull, PwmConfig, SharedBoard,
};
use super::results::ResultSink;
use crate::drivers::task;
use crate::error::RegistryError;
use crate::rpc::literal::to_literal;
use crate::rpc::record::{Args, DEBUG_METHOD, ResultRecord};

/// Version string reported by `version`.
pub const VERSION: &str = "0.2";

/// Tag under which `adc_read_multi` posts its sample arrays.
pub const MULTI_RESULTS_METHOD: &str = "adc_read_multi_results";

/// Method tag used by the submission gate for its own failures.
pub const GATE_METHOD: &str = "cmd";

pub const LED_MAX_MS: u64 = 60_000;
pub const ADC_MAX_SAMPLES: u64 = 1000;
pub const ADC_MAX_SAMPLE_MS: u64 = 1000;
pub const ADC_MAX_FREQ: u64 = 10_000;
pub const PWM_MAX_FREQ: u64 = 10_000;

const ORIGIN: &str = "handlers";
const BLINK_MS: u32 = 100;

// ───────────────────────────────────────────────────────────────
// Handler environment
// ───────────────────────────────────────────────────────────────

/// A delay that handlers can use inline and hand to spawned tasks.
pub trait TaskDelay: DelayNs + Clone + Send + 'static {}

impl<T: DelayNs + Clone + Send + 'static> TaskDelay for T {}

/// Everything a handler may touch during a dispatch step.
pub struct HandlerEnv<B, D> {
    pub board: SharedBoard<B>,
    pub ctx: SharedContext,
    pub sink: ResultSink,
    pub delay: D,
    task_stack_kb: usize,
    tasks: Vec<JoinHandle<()>>,
}

impl<B: BoardPort, D: TaskDelay> HandlerEnv<B, D> {
    pub fn new(board: SharedBoard<B>, sink: ResultSink, delay: D, task_stack_kb: usize) -> Self {
        Self {
            board,
            ctx: SharedContext::new(),
            sink,
            delay,
            task_stack_kb,
            tasks: Vec::new(),
        }
    }

    /// Start a handler task and keep its handle for [`join_tasks`](Self::join_tasks).
    pub fn spawn(&mut self, name: &str, f: impl FnOnce() + Send + 'static) -> io::Result<()> {
        self.tasks.retain(|h| !h.is_finished());
        let handle = task::spawn(name, self.task_stack_kb, f)?;
        self.tasks.push(handle);
        Ok(())
    }

    /// Spawned tasks that have not exited yet.
    pub fn active_tasks(&self) -> usize {
        self.tasks.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every spawned task to exit.
    ///
    /// Toggle tasks only exit once their flag is cleared, so callers stop
    /// them first.
    pub fn join_tasks(&mut self) {
        for handle in self.tasks.drain(..) {
            if handle.join().is_err() {
                warn!("RPC: a handler task panicked");
            }
        }
    }

    /// Stop every task and return all peripherals to their default state.
    pub fn quiesce(&mut self) {
        let running: Vec<String> = self.ctx.running_names().map(str::to_owned).collect();
        self.ctx.stop_all();
        {
            let mut board = lock(&self.board);
            for led in Led::ALL {
                board.set_led(led, true);
            }
            for entry in self.ctx.timers.values() {
                board.stop_pwm(entry.timer);
            }
            for entry in self.ctx.pins.values() {
                board.release_pin(&entry.pin);
            }
            for led in Led::ALL {
                board.set_led(led, false);
            }
        }
        self.ctx.clear();
        info!("RPC: board quiesced, stopped tasks: {:?}", running);
    }

    fn reply(&self, method: &str, outcome: Result<Value, String>) {
        match outcome {
            Ok(value) => self.sink.ok(method, value),
            Err(msg) => self.sink.err(method, msg),
        };
    }
}

// ───────────────────────────────────────────────────────────────
// Registry
// ───────────────────────────────────────────────────────────────

pub type Handler<B, D> = fn(&mut HandlerEnv<B, D>, &Args);

/// Method name → handler, resolved by exact name.
pub struct HandlerSet<B, D> {
    entries: Vec<(&'static str, Handler<B, D>)>,
}

impl<B, D> HandlerSet<B, D> {
    pub const fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a handler.  Names must be unique and must not collide with
    /// the diagnostic or gate tags.
    pub fn register(
        &mut self,
        name: &'static str,
        handler: Handler<B, D>,
    ) -> Result<(), RegistryError> {
        if name.is_empty() || name == DEBUG_METHOD || name == GATE_METHOD {
            return Err(RegistryError::Reserved(name));
        }
        if self.contains(name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.entries.push((name, handler));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Handler<B, D>> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, h)| *h)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| *n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<B: BoardPort, D: TaskDelay> HandlerSet<B, D> {
    /// The board's built-in handlers.
    pub fn standard() -> Self {
        Self {
            entries: standard_entries::<B, D>().to_vec(),
        }
    }
}

impl<B: BoardPort, D: TaskDelay> Default for HandlerSet<B, D> {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_entries<B: BoardPort, D: TaskDelay>()
-> [(&'static str, Handler<B, D>); 13] {
    [
        ("reset", reset::<B, D> as Handler<B, D>),
        ("unique_id", unique_id::<B, D>),
        ("debug", debug::<B, D>),
        ("version", version::<B, D>),
        ("led", led::<B, D>),
        ("led_toggle", led_toggle::<B, D>),
        ("init_gpio", init_gpio::<B, D>),
        ("get_gpio", get_gpio::<B, D>),
        ("set_gpio", set_gpio::<B, D>),
        ("adc_read", adc_read::<B, D>),
        ("adc_read_multi", adc_read_multi::<B, D>),
        ("pwm", pwm::<B, D>),
        ("long_running_example", long_running_example::<B, D>),
    ]
}

// ───────────────────────────────────────────────────────────────
// Argument helpers
// ───────────────────────────────────────────────────────────────

/// How a value reads inside an error message.
fn shown(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "None".into(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => to_literal(other),
    }
}

fn as_whole(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && (0.0..=u64::MAX as f64).contains(f))
            .map(|f| f as u64)
    })
}

/// Whole number argument inside `range`; missing or null means `default`.
fn ranged(
    args: &Args,
    key: &str,
    default: u64,
    range: RangeInclusive<u64>,
    msg: impl FnOnce() -> String,
) -> Result<u64, String> {
    let value = match args.get(key) {
        None | Some(Value::Null) => Some(default),
        Some(v) => as_whole(v),
    };
    value.filter(|v| range.contains(v)).ok_or_else(msg)
}

/// Truthy flag: a bool, or a number where zero is false.
fn flag(args: &Args, key: &str, default: bool) -> Result<bool, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Some(_) => Err(format!("{key} must be a bool")),
    }
}

fn text<'a>(args: &'a Args, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("{key} must be a non-empty string"))
}

fn led_arg(value: Option<&Value>) -> Result<Led, String> {
    value
        .and_then(Value::as_i64)
        .and_then(Led::from_id)
        .ok_or_else(|| format!("unknown led {}", shown(value)))
}

fn to_sample(raw: f64) -> u16 {
    raw.round().clamp(0.0, f64::from(u16::MAX)) as u16
}

// ───────────────────────────────────────────────────────────────
// Identity and housekeeping
// ───────────────────────────────────────────────────────────────

fn reset<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, _args: &Args) {
    env.quiesce();
    env.sink.ok("reset", json!({}));
}

fn unique_id<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, _args: &Args) {
    use core::fmt::Write as _;

    let id = lock(&env.board).unique_id();
    let hex = id.iter().rev().fold(String::with_capacity(id.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    });
    env.sink.ok("unique_id", json!({ "value": hex }));
}

fn debug<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, args: &Args) {
    let outcome = flag(args, "enable", false).map(|enable| {
        env.sink.set_debug(enable);
        info!("RPC: device debug {}", if enable { "on" } else { "off" });
        json!({ "value": enable })
    });
    env.reply("debug", outcome);
}

fn version<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, _args: &Args) {
    env.sink.diagnostic(ORIGIN, "version", "reporting version");
    let uname = lock(&env.board).uname();
    let outcome = serde_json::to_value(uname)
        .map(|uname| json!({ "version": VERSION, "uname": uname }))
        .map_err(|e| e.to_string());
    env.reply("version", outcome);
}

// ───────────────────────────────────────────────────────────────
// LEDs
// ───────────────────────────────────────────────────────────────

fn led<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, args: &Args) {
    const MALFORMED: &str = "set must be a list of [led, enable] pairs";

    let parse = || -> Result<Vec<(Led, bool)>, String> {
        let pairs = match args.get("set") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(pairs)) => pairs,
            Some(_) => return Err(MALFORMED.into()),
        };
        pairs
            .iter()
            .map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([id, on]) => {
                    let led = led_arg(Some(id))?;
                    let on = match on {
                        Value::Bool(b) => *b,
                        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                        _ => return Err(MALFORMED.into()),
                    };
                    Ok((led, on))
                }
                _ => Err(MALFORMED.into()),
            })
            .collect()
    };

    let outcome = parse().map(|pairs| {
        let mut board = lock(&env.board);
        for (led, on) in pairs {
            board.set_led(led, on);
        }
        json!({})
    });
    env.reply("led", outcome);
}

#[derive(Debug, Clone, Copy)]
struct Toggle {
    led: Led,
    on_ms: u32,
    off_ms: u32,
    once: bool,
}

impl Toggle {
    fn parse(args: &Args) -> Result<Self, String> {
        let led = led_arg(args.get("led"))?;
        let range = |key: &str| {
            ranged(args, key, 500, 0..=LED_MAX_MS, || {
                format!("{key} not within range supported, 0 <= ms <= {LED_MAX_MS}")
            })
        };
        Ok(Self {
            led,
            on_ms: range("on_ms")? as u32,
            off_ms: range("off_ms")? as u32,
            once: flag(args, "once", false)?,
        })
    }
}

fn led_toggle<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, args: &Args) {
    const METHOD: &str = "led_toggle";

    let toggle = match Toggle::parse(args) {
        Ok(t) => t,
        Err(msg) => {
            env.sink.err(METHOD, msg);
            return;
        }
    };
    let name = format!("led{}", toggle.led.id());

    if toggle.on_ms == 0 {
        env.ctx.stop(&name);
        env.sink.ok(METHOD, json!({ "value": true }));
        return;
    }
    if env.ctx.is_running(&name) {
        debug!("RPC: {} already toggling", name);
        env.sink.ok(METHOD, json!({ "value": true }));
        return;
    }

    env.sink.ok(METHOD, json!({ "value": true }));
    let running = env.ctx.start_flag(&name);
    let board = Arc::clone(&env.board);
    let delay = env.delay.clone();
    if let Err(e) = env.spawn(&name, move || toggle_task(&board, delay, &running, toggle)) {
        env.ctx.stop(&name);
        env.sink
            .update(ResultRecord::err(METHOD, format!("could not start {name}: {e}")));
    }
}

fn toggle_task<B: BoardPort, D: DelayNs>(
    board: &SharedBoard<B>,
    mut delay: D,
    running: &AtomicBool,
    toggle: Toggle,
) {
    while running.load(Ordering::Acquire) {
        lock(board).set_led(toggle.led, true);
        delay.delay_ms(toggle.on_ms);
        if toggle.off_ms > 0 {
            lock(board).set_led(toggle.led, false);
            delay.delay_ms(toggle.off_ms);
        }
        if toggle.once {
            break;
        }
    }
    running.store(false, Ordering::Release);
    lock(board).set_led(toggle.led, false);
    debug!("TASK[led{}]: exit", toggle.led.id());
}

// ───────────────────────────────────────────────────────────────
// GPIO
// ───────────────────────────────────────────────────────────────

fn init_gpio<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, args: &Args) {
    let outcome = configure_gpio(env, args);
    env.reply("init_gpio", outcome);
}

fn configure_gpio<B: BoardPort, D: TaskDelay>(
    env: &mut HandlerEnv<B, D>,
    args: &Args,
) -> Result<Value, String> {
    let name = text(args, "name")?;
    let pin = text(args, "pin")?;
    let mode = args
        .get("mode")
        .and_then(Value::as_str)
        .and_then(PinMode::from_token)
        .ok_or("invalid mode")?;
    let pull = match args.get("pull") {
        None | Some(Value::Null) => Pull::None,
        Some(v) => v.as_str().and_then(Pull::from_token).ok_or("invalid pull")?,
    };

    let mut board = lock(&env.board);
    if let Some(prev) = env.ctx.pins.get(name) {
        if prev.pin != pin {
            board.release_pin(&prev.pin);
        }
    }
    board.configure_pin(pin, mode, pull).map_err(|e| e.to_string())?;
    let entry = PinEntry {
        pin: pin.to_owned(),
        mode,
        pull,
    };
    let action = match env.ctx.pins.insert(name.to_owned(), entry) {
        Some(_) => "updating previously created",
        None => "creating",
    };
    Ok(json!({ "action": action }))
}

fn get_gpio<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, args: &Args) {
    let name = shown(args.get("pin"));
    let outcome = match env.ctx.pins.get(&name) {
        None => Err(format!("{name} has not been initialized")),
        Some(entry) => lock(&env.board)
            .read_pin(&entry.pin)
            .map(|high| json!({ "value": u8::from(high) }))
            .map_err(|e| e.to_string()),
    };
    env.reply("get_gpio", outcome);
}

fn set_gpio<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, args: &Args) {
    let name = shown(args.get("name"));
    let outcome = match env.ctx.pins.get(&name) {
        None => Err(format!("{name} has not been initialized")),
        Some(entry) => flag(args, "value", true).and_then(|high| {
            lock(&env.board)
                .write_pin(&entry.pin, high)
                .map(|()| json!({}))
                .map_err(|e| e.to_string())
        }),
    };
    env.reply("set_gpio", outcome);
}

// ───────────────────────────────────────────────────────────────
// ADC
// ───────────────────────────────────────────────────────────────

fn adc_read<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, args: &Args) {
    let outcome = sample_adc(env, args);
    env.reply("adc_read", outcome);
}

fn sample_adc<B: BoardPort, D: TaskDelay>(
    env: &mut HandlerEnv<B, D>,
    args: &Args,
) -> Result<Value, String> {
    let source = args
        .get("pin")
        .and_then(Value::as_str)
        .and_then(AdcSource::parse)
        .ok_or_else(|| format!("{} pin is not valid", shown(args.get("pin"))))?;
    let samples = ranged(args, "samples", 1, 1..=ADC_MAX_SAMPLES, || {
        format!("samples not within range supported, 0 < s <= {ADC_MAX_SAMPLES}")
    })? as u32;
    let sample_ms = ranged(args, "sample_ms", 1, 0..=ADC_MAX_SAMPLE_MS, || {
        format!("sample_ms not within range supported, 0 <= ms <= {ADC_MAX_SAMPLE_MS}")
    })? as u32;

    let mut sum = 0.0;
    for _ in 0..samples {
        sum += lock(&env.board)
            .read_adc(&source)
            .map_err(|e| e.to_string())?;
        if sample_ms > 0 {
            env.delay.delay_ms(sample_ms);
        }
    }
    env.sink.diagnostic(
        ORIGIN,
        "adc_read",
        &format!("{samples} sample(s) from {}", source.name()),
    );
    Ok(json!({ "value": sum / f64::from(samples), "samples": samples }))
}

impl MultiReadArgs {
    fn parse(args: &Args) -> Result<Self, String> {
        let freq_hz = ranged(args, "freq", 100, 1..=ADC_MAX_FREQ, || {
            format!("freq not within range supported, 0 < f <= {ADC_MAX_FREQ}")
        })? as u32;
        let samples = ranged(args, "samples", 100, 1..=ADC_MAX_SAMPLES, || {
            format!("samples not within range supported, 0 < s <= {ADC_MAX_SAMPLES}")
        })? as u32;
        let Some(Value::Array(list)) = args.get("pins") else {
            return Err("pins must be a list".into());
        };
        let pins = list
            .iter()
            .map(|p| match p.as_str() {
                Some(name) if ADC_VALID_PINS.contains(&name) => Ok(AdcSource::Pin(name.to_owned())),
                _ => Err(format!("{} pin is not valid", shown(Some(p)))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            pins,
            samples,
            freq_hz,
        })
    }
}

fn adc_read_multi<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, args: &Args) {
    const METHOD: &str = "adc_read_multi";

    let run = match MultiReadArgs::parse(args) {
        Ok(run) => run,
        Err(msg) => {
            env.sink.err(METHOD, msg);
            return;
        }
    };
    if env.ctx.is_running(METHOD) {
        env.sink.err(METHOD, "adc_read_multi already running");
        return;
    }

    env.ctx.multi_read = Some(run.clone());
    env.sink.ok(METHOD, json!({ "value": "scheduled" }));

    let running = env.ctx.start_flag(METHOD);
    let board = Arc::clone(&env.board);
    let sink = env.sink.clone();
    let delay = env.delay.clone();
    let task = move || multi_read_task(&board, delay, &running, &sink, &run);
    if let Err(e) = env.spawn(METHOD, task) {
        env.ctx.stop(METHOD);
        env.sink
            .update(ResultRecord::err(METHOD, format!("could not start {METHOD}: {e}")));
    }
}

fn multi_read_task<B: BoardPort, D: DelayNs>(
    board: &SharedBoard<B>,
    mut delay: D,
    running: &AtomicBool,
    sink: &ResultSink,
    run: &MultiReadArgs,
) {
    let period_us = 1_000_000 / run.freq_hz;
    let mut channels: Vec<Vec<u16>> =
        vec![Vec::with_capacity(run.samples as usize); run.pins.len()];

    for _ in 0..run.samples {
        if !running.load(Ordering::Acquire) {
            sink.err(MULTI_RESULTS_METHOD, "adc_read_multi stopped before completion");
            return;
        }
        {
            let mut board = lock(board);
            for (pin, samples) in run.pins.iter().zip(channels.iter_mut()) {
                match board.read_adc(pin) {
                    Ok(raw) => samples.push(to_sample(raw)),
                    Err(e) => {
                        running.store(false, Ordering::Release);
                        sink.err(MULTI_RESULTS_METHOD, e.to_string());
                        return;
                    }
                }
            }
        }
        delay.delay_us(period_us);
    }
    running.store(false, Ordering::Release);

    let mut value = Map::new();
    value.insert("samples".into(), json!(run.samples));
    value.insert("freq".into(), json!(run.freq_hz));
    for (pin, samples) in run.pins.iter().zip(channels) {
        value.insert(pin.name().to_owned(), json!(samples));
    }
    sink.ok(MULTI_RESULTS_METHOD, Value::Object(value));
    debug!("TASK[adc_read_multi]: {} samples posted", run.samples);
}

// ───────────────────────────────────────────────────────────────
// PWM
// ───────────────────────────────────────────────────────────────

fn pwm<B: BoardPort, D: TaskDelay>(env: &mut HandlerEnv<B, D>, args: &Args) {
    let outcome = drive_pwm(env, args);
    env.reply("pwm", outcome);
}

fn drive_pwm<B: BoardPort, D: TaskDelay>(
    env: &mut HandlerEnv<B, D>,
    args: &Args,
) -> Result<Value, String> {
    if !flag(args, "enable", true)? {
        let name = shown(args.get("name"));
        let entry = env
            .ctx
            .timers
            .remove(&name)
            .ok_or_else(|| format!("{name} timer is not valid"))?;
        lock(&env.board).stop_pwm(entry.timer);
        return Ok(json!({ "value": format!("{name} disabled") }));
    }

    let name = text(args, "name")?;
    let pin_name = shown(args.get("pin"));
    let pin = env
        .ctx
        .pins
        .get(&pin_name)
        .ok_or_else(|| format!("{pin_name} pin is not valid"))?
        .pin
        .clone();
    let freq_hz = ranged(args, "freq", 0, 1..=PWM_MAX_FREQ, || {
        format!("freq not within range supported, 0 < f <= {PWM_MAX_FREQ}")
    })? as u32;
    let duty_percent = ranged(args, "duty_cycle", 50, 0..=100, || {
        "duty_cycle not within range supported, 0 <= d <= 100".into()
    })? as u8;
    let timer = ranged(args, "timer", 0, 0..=u64::from(u8::MAX), || {
        "timer must be an integer in 0..=255".into()
    })? as u8;
    let channel = ranged(args, "channel", 1, 0..=u64::from(u8::MAX), || {
        "channel must be an integer in 0..=255".into()
    })? as u8;

    let config = PwmConfig {
        pin,
        timer,
        channel,
        freq_hz,
        duty_percent,
    };
    let mut board = lock(&env.board);
    board.start_pwm(&config).map_err(|e| e.to_string())?;
    let entry = TimerEntry {
        timer,
        channel,
        pin: pin_name,
    };
    if let Some(prev) = env.ctx.timers.insert(name.to_owned(), entry) {
        if prev.timer != timer {
            board.stop_pwm(prev.timer);
        }
    }
    Ok(json!({ "value": "scheduled" }))
}

// ───────────────────────────────────────────────────────────────
// Long-running example
// ───────────────────────────────────────────────────────────────

fn long_running_example<B: BoardPort, D: TaskDelay>(
    env: &mut HandlerEnv<B, D>,
    args: &Args,
) {
    const METHOD: &str = "long_running_example";

    let total_ms = match args.get("delay_s").and_then(Value::as_f64) {
        Some(s) if s > 0.0 && s.is_finite() => (s * 1000.0).round() as u64,
        _ => {
            env.sink.err(METHOD, "delay_s invalid");
            return;
        }
    };

    env.sink.ok(METHOD, json!({ "value": "scheduled" }));
    let running = env.ctx.start_flag(METHOD);
    let board = Arc::clone(&env.board);
    let sink = env.sink.clone();
    let delay = env.delay.clone();
    let task = move || long_running_task(&board, delay, &running, &sink, total_ms);
    if let Err(e) = env.spawn(METHOD, task) {
        env.ctx.stop(METHOD);
        env.sink
            .update(ResultRecord::err(METHOD, format!("could not start {METHOD}: {e}")));
    }
}

/// Blink green once a second until `total_ms` has elapsed.
fn long_running_task<B: BoardPort, D: DelayNs>(
    board: &SharedBoard<B>,
    mut delay: D,
    running: &AtomicBool,
    sink: &ResultSink,
    total_ms: u64,
) {
    const METHOD: &str = "long_running_example";

    let mut remaining = total_ms;
    while remaining > 0 {
        if !running.load(Ordering::Acquire) {
            sink.err(METHOD, "long_running_example stopped before completion");
            return;
        }
        let step = remaining.min(1000);
        delay.delay_ms(step as u32);
        remaining -= step;

        lock(board).set_led(Led::Green, true);
        delay.delay_ms(BLINK_MS);
        lock(board).set_led(Led::Green, false);
    }
    running.store(false, Ordering::Release);
    sink.ok(METHOD, json!({ "value": "completed" }));
}
