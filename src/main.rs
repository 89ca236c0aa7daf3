//! boardlink-sim: exercise the host API against a simulated board.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  boardlink-sim                                           │
//! │                                                          │
//! │  Client ──▶ LoopbackTransport ──▶ Console                │
//! │                                      │                   │
//! │  ─────────────── text boundary ──────┼────────────────   │
//! │                                      ▼                   │
//! │            Dispatcher thread ──▶ handlers ──▶ SimBoard   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Test groups mirror the bench tool used against real boards:
//!
//! ```text
//! boardlink-sim --all
//! boardlink-sim misc -t 100 -t 400
//! boardlink-sim -v --debug adc --all
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use boardlink::adapters::loopback::{LoopbackTransport, SimDevice};
use boardlink::adapters::sim_board::SimBoard;
use boardlink::app::ports::{Led, PinMode, Pull};
use boardlink::config::{ClientConfig, ServerConfig};
use boardlink::drivers::delay::StdDelay;
use boardlink::host::PwmRequest;
use boardlink::rpc::record::ResultRecord;
use boardlink::{Client, IntoOutcome};

type SimClient = Client<LoopbackTransport>;

// ── Command line ──────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "boardlink-sim", version)]
#[command(about = "Run the boardlink test groups against a simulated board")]
struct Cli {
    /// JSON file with `server` and `client` sections
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run every test of every group
    #[arg(short, long)]
    all: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Enable `_debug` diagnostics on the device
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    group: Option<Group>,
}

#[derive(Subcommand, Debug)]
enum Group {
    /// 100 raw server.cmd, 101 wrapper API, 102 once
    LedToggle(Tests),
    /// 100 adc_read, 200 adc_read_multi
    Adc(Tests),
    /// 100 PWM on Y1
    Pwm(Tests),
    /// 100 unique id, 200 version, 300 reset, 400 long running,
    /// 500 GPIO Y1 push-pull, 501 GPIO X12 input pull-up
    Misc(Tests),
}

impl Group {
    fn name(&self) -> &'static str {
        match self {
            Self::LedToggle(_) => "led_toggle",
            Self::Adc(_) => "adc",
            Self::Pwm(_) => "pwm",
            Self::Misc(_) => "misc",
        }
    }

    fn tests(&self) -> &Tests {
        match self {
            Self::LedToggle(t) | Self::Adc(t) | Self::Pwm(t) | Self::Misc(t) => t,
        }
    }
}

#[derive(Args, Debug, Default, Clone)]
struct Tests {
    /// Run every test in this group
    #[arg(short, long)]
    all: bool,

    /// Test number to run (repeatable)
    #[arg(short = 't', long = "test", value_name = "ID")]
    tests: Vec<u16>,
}

impl Tests {
    fn wants(&self, id: u16) -> bool {
        self.all || self.tests.contains(&id)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SimConfig {
    server: ServerConfig,
    client: ClientConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: SimConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    config.client.validate()?;
    Ok(config)
}

// ── Reporting ─────────────────────────────────────────────────

/// Log one call's outcome; returns its success flag.
fn report(label: &str, outcome: impl IntoOutcome) -> bool {
    let (ok, value) = outcome.into_outcome();
    if ok {
        info!("{}: {} {}", label, ok, value);
    } else {
        error!("{}: {} {}", label, ok, value);
    }
    ok
}

fn inner_value(record: &ResultRecord) -> Option<&Value> {
    record.value.get("value")
}

// ── Test groups ───────────────────────────────────────────────

fn test_led_toggle(client: &SimClient, tests: &Tests) -> Result<bool> {
    let mut passed = true;
    info!("test_led_toggle:");

    if tests.wants(100) {
        info!("T100: toggle red LED with raw server.cmd");
        let module = &client.config().server_module;
        let start = format!(
            "{module}.server.cmd({{'method': 'led_toggle', 'args': {{'led': {}}}}})",
            Led::Red.id()
        );
        passed &= report("T100 cmd", client.server_cmd(&[start], false, false));

        let fetch = [format!("{module}.server.ret(method='led_toggle')")];
        let mut confirmed = false;
        for _ in 0..5 {
            thread::sleep(Duration::from_millis(500));
            let reply = client.server_cmd(&fetch, false, false)?;
            info!("T100 ret: {}", reply);
            confirmed = reply.as_array().is_some_and(|records| {
                records.iter().any(|r| {
                    r["method"] == "led_toggle" && r["value"]["value"] == Value::Bool(true)
                })
            });
            if confirmed {
                break;
            }
        }
        passed &= confirmed;

        let stop = format!(
            "{module}.server.cmd({{'method': 'led_toggle', 'args': {{'led': {}, 'on_ms': 0}}}})",
            Led::Red.id()
        );
        passed &= report("T100 stop", client.server_cmd(&[stop], false, false));
    }

    if tests.wants(101) {
        info!("T101: toggle green LED with wrapper API");
        passed &= report("T101", client.led_toggle(Led::Green, 200, 500, false));
        thread::sleep(Duration::from_secs(2));
        passed &= report("T101 stop", client.led_toggle(Led::Green, 0, 500, false));
    }

    if tests.wants(102) {
        info!("T102: yellow LED on for 1.5 s, once");
        passed &= report("T102", client.led_toggle(Led::Yellow, 1500, 500, true));
    }

    Ok(passed)
}

fn test_adc(client: &SimClient, tests: &Tests) -> Result<bool> {
    let mut passed = true;
    info!("test_adc:");

    if tests.wants(100) {
        info!("T100: reading ADC");
        passed &= report("T100", client.adc_read("VREF", 1, 1));
    }

    if tests.wants(200) {
        info!("T200: reading ADC (multi)");
        passed &= report("T200", client.adc_read_multi(&["X19", "X20"], 100, 100));
        let mut collected = client.adc_read_multi_results();
        for _ in 0..10 {
            if collected.is_ok() {
                break;
            }
            thread::sleep(Duration::from_millis(500));
            collected = client.adc_read_multi_results();
        }
        passed &= report("T200 results", collected);
    }

    Ok(passed)
}

fn test_pwm(client: &SimClient, tests: &Tests) -> Result<bool> {
    let mut passed = true;
    info!("test_pwm:");

    if tests.wants(100) {
        info!("T100: PWM on Y1");
        passed &= report(
            "T100 gpio",
            client.init_gpio("foo", "Y1", PinMode::OutputPushPull, Pull::None),
        );
        let req = PwmRequest {
            timer: 8,
            channel: 1,
            freq_hz: 1000,
            ..PwmRequest::new("foo", "foo")
        };
        passed &= report("T100 pwm", client.pwm(&req));
    }

    Ok(passed)
}

fn test_misc(client: &SimClient, tests: &Tests) -> Result<bool> {
    let mut passed = true;
    info!("test_misc:");

    if tests.wants(100) {
        info!("T100: reading unique id");
        passed &= report("T100", client.unique_id());
    }
    if tests.wants(200) {
        info!("T200: reading version and uname");
        passed &= report("T200", client.version());
    }
    if tests.wants(300) {
        info!("T300: resetting");
        passed &= report("T300", client.reset());
    }
    if tests.wants(400) {
        info!("T400: long running example");
        let scheduled = report("T400", client.long_running_example(5.0));
        passed &= scheduled;
        while scheduled {
            thread::sleep(Duration::from_secs(1));
            let Ok(records) = client.get_server_method("long_running_example", false) else {
                continue;
            };
            let first = records.first();
            info!("T400 polling: {:?}", first.map(ResultRecord::to_value));
            if let Some(record) = first.filter(|r| inner_value(r).is_some_and(|v| v == "completed")) {
                passed &= record.success;
                break;
            }
            if first.is_some_and(|r| !r.success) {
                passed = false;
                break;
            }
        }
    }
    if tests.wants(500) {
        info!("T500: init GPIO Y1");
        passed &= report(
            "T500",
            client.init_gpio("foo", "Y1", PinMode::OutputPushPull, Pull::None),
        );
    }
    if tests.wants(501) {
        info!("T501: init GPIO X12");
        passed &= report(
            "T501",
            client.init_gpio("X12", "X12", PinMode::Input, Pull::Up),
        );
    }

    Ok(passed)
}

// ── Main ──────────────────────────────────────────────────────

type GroupFn = fn(&SimClient, &Tests) -> Result<bool>;

/// Groups in the order they run.
const GROUPS: [(&str, GroupFn); 4] = [
    ("led_toggle", test_led_toggle),
    ("adc", test_adc),
    ("pwm", test_pwm),
    ("misc", test_misc),
];

fn run(cli: &Cli, client: &SimClient) -> Result<()> {
    client.start_server().context("unable to start server")?;

    if cli.debug {
        info!("Debug: enabling...");
        if !report("debug", client.debug(true)) {
            bail!("failed to set debug mode");
        }
    }

    let everything = Tests {
        all: true,
        tests: Vec::new(),
    };
    let mut ran = false;
    for (name, test) in GROUPS {
        let tests = match &cli.group {
            _ if cli.all => everything.clone(),
            Some(group) if group.name() == name => group.tests().clone(),
            _ => continue,
        };
        if !tests.all && tests.tests.is_empty() {
            error!("no tests were specified for {}", name);
            bail!("no tests were specified");
        }
        ran = true;
        if !test(client, &tests)? {
            bail!("failed testing {}", name);
        }
    }
    if !ran {
        bail!("nothing to run: pick a group or pass --all");
    }

    info!("all tests passed");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(cli.config.as_ref())?;
    info!("boardlink-sim v{}", env!("CARGO_PKG_VERSION"));

    let device = SimDevice::boot(SimBoard::new(), StdDelay, config.server)
        .context("booting simulated device")?;
    let client = Client::with_config(device.transport(&config.client.server_module), config.client);

    let outcome = run(&cli, &client);
    if let Err(e) = client.close() {
        error!("close: {}", e);
    }
    device.shutdown();
    outcome
}
