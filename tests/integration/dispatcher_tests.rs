//! Device server against the recording mock board.

use boardlink::app::handlers::{HandlerEnv, HandlerSet};
use boardlink::app::ports::{Led, PinMode, Pull};
use boardlink::app::server::Dispatcher;
use boardlink::config::ServerConfig;
use boardlink::drivers::delay::NoDelay;
use boardlink::error::RegistryError;
use boardlink::rpc::record::{Args, ResultRecord, Tagged};
use serde_json::{Value, json};

use crate::mock_board::{BoardCall, CallLog, MockBoard};

fn boot(board: MockBoard) -> (Dispatcher<MockBoard, NoDelay>, CallLog) {
    let log = board.log();
    let d = Dispatcher::new(board, NoDelay, ServerConfig::default());
    (d, log)
}

fn calls(log: &CallLog) -> Vec<BoardCall> {
    log.lock().unwrap().clone()
}

/// Submit one command, run it, and take its result.
fn call(d: &mut Dispatcher<MockBoard, NoDelay>, method: &str, args: Value) -> ResultRecord {
    let h = d.handle();
    assert!(h.cmd(&json!({ "method": method, "args": args })));
    d.run_pending();
    let mut rs = h.ret(Some(method), false);
    assert_eq!(rs.len(), 1, "expected one result for {method}");
    rs.remove(0)
}

#[test]
fn boot_quiesces_leds_without_posting() {
    let (d, log) = boot(MockBoard::new());
    let calls = calls(&log);
    assert_eq!(calls.len(), 8);
    assert!(calls[..4].iter().all(|c| matches!(c, BoardCall::SetLed(_, true))));
    assert!(calls[4..].iter().all(|c| matches!(c, BoardCall::SetLed(_, false))));
    assert!(d.results().is_empty());
}

#[test]
fn scenario_reset_posts_exactly_one_success() {
    let (mut d, _log) = boot(MockBoard::new());
    let h = d.handle();
    h.cmd(&json!({"method": "reset", "args": {}}));
    d.run_pending();
    let all = h.ret(None, true);
    assert_eq!(all, [ResultRecord::ok("reset", json!({}))]);
}

#[test]
fn reset_releases_pins_and_timers() {
    let (mut d, log) = boot(MockBoard::new());
    call(
        &mut d,
        "init_gpio",
        json!({"name": "fan", "pin": "Y1", "mode": "out_pp"}),
    );
    let pwm = call(
        &mut d,
        "pwm",
        json!({"name": "fan_pwm", "pin": "fan", "timer": 8, "channel": 1, "freq": 1000}),
    );
    assert_eq!(pwm.value, json!({"value": "scheduled"}));
    log.lock().unwrap().clear();

    assert!(call(&mut d, "reset", json!({})).success);
    let calls = calls(&log);
    assert!(calls.contains(&BoardCall::StopPwm(8)));
    assert!(calls.contains(&BoardCall::Release("Y1".into())));
    assert!(d.context().is_empty());

    let r = call(&mut d, "get_gpio", json!({"pin": "fan"}));
    assert_eq!(r.err_message(), Some("fan has not been initialized"));
}

#[test]
fn scenario_invalid_toggle_target_has_no_effect() {
    let (mut d, log) = boot(MockBoard::new());
    log.lock().unwrap().clear();

    let r = call(&mut d, "led_toggle", json!({"led": 9, "on_ms": 100}));
    assert!(!r.success);
    assert!(r.err_message().unwrap().contains("unknown"));
    assert_eq!(d.active_tasks(), 0);
    assert!(d.context().is_empty());
    assert!(calls(&log).is_empty());
}

#[test]
fn scenario_mean_of_four_readings() {
    let (mut d, _log) = boot(MockBoard::new().with_adc(&[10.0, 20.0, 30.0, 40.0, 99.0]));
    let r = call(
        &mut d,
        "adc_read",
        json!({"pin": "X2", "samples": 4, "sample_ms": 0}),
    );
    assert!(r.success);
    assert_eq!(r.value, json!({"value": 25.0, "samples": 4}));
}

#[test]
fn adc_read_rejects_unknown_pin_and_sample_counts() {
    let (mut d, _log) = boot(MockBoard::new());
    let r = call(&mut d, "adc_read", json!({"pin": "X1"}));
    assert_eq!(r.err_message(), Some("X1 pin is not valid"));
    let r = call(&mut d, "adc_read", json!({"pin": "VREF", "samples": 0}));
    assert!(!r.success);
    let r = call(&mut d, "adc_read", json!({"pin": "VREF", "samples": 1001}));
    assert!(!r.success);
}

#[test]
fn led_validates_all_pairs_before_switching() {
    let (mut d, log) = boot(MockBoard::new());
    log.lock().unwrap().clear();

    let r = call(&mut d, "led", json!({"set": [[1, true], [5, true]]}));
    assert_eq!(r.err_message(), Some("unknown led 5"));
    assert!(calls(&log).is_empty());

    assert!(call(&mut d, "led", json!({"set": [[1, true], [4, false]]})).success);
    assert_eq!(
        calls(&log),
        [
            BoardCall::SetLed(Led::Red, true),
            BoardCall::SetLed(Led::Blue, false)
        ]
    );
}

#[test]
fn gpio_round_trip_through_registered_name() {
    let (mut d, log) = boot(MockBoard::new());
    let r = call(
        &mut d,
        "init_gpio",
        json!({"name": "relay", "pin": "X9", "mode": "out_od", "pull": "up"}),
    );
    assert_eq!(r.value, json!({"action": "creating"}));
    assert!(calls(&log).contains(&BoardCall::Configure(
        "X9".into(),
        PinMode::OutputOpenDrain,
        Pull::Up
    )));

    assert!(call(&mut d, "set_gpio", json!({"name": "relay", "value": true})).success);
    let r = call(&mut d, "get_gpio", json!({"pin": "relay"}));
    assert_eq!(r.value, json!({"value": 1}));

    let r = call(
        &mut d,
        "init_gpio",
        json!({"name": "relay", "pin": "X9", "mode": "in"}),
    );
    assert_eq!(r.value, json!({"action": "updating previously created"}));
}

#[test]
fn board_errors_become_failed_results() {
    let (mut d, _log) = boot(MockBoard::new());
    let r = call(
        &mut d,
        "init_gpio",
        json!({"name": "ghost", "pin": "Z1", "mode": "in"}),
    );
    assert_eq!(r.err_message(), Some("Z1 is not a pin on this board"));
    assert!(d.context().pins.is_empty());
}

#[test]
fn pwm_disable_unknown_timer_fails() {
    let (mut d, _log) = boot(MockBoard::new());
    let r = call(&mut d, "pwm", json!({"name": "nope", "enable": false}));
    assert_eq!(r.err_message(), Some("nope timer is not valid"));
}

#[test]
fn debug_flag_enables_diagnostics() {
    let (mut d, _log) = boot(MockBoard::new());
    let h = d.handle();

    h.cmd(&json!({"method": "version", "args": {}}));
    d.run_pending();
    assert!(h.peek(None, true).iter().all(|r| !r.is_diagnostic()));
    h.ret(None, true);

    assert_eq!(
        call(&mut d, "debug", json!({"enable": true})).value,
        json!({"value": true})
    );
    h.cmd(&json!({"method": "version", "args": {}}));
    d.run_pending();
    let rs = h.ret(Some("version"), true);
    assert_eq!(rs.len(), 2);
    assert!(rs[0].is_diagnostic());
    assert_eq!(rs[0].value, "handlers:version: reporting version");
    assert_eq!(rs[1].value["version"], "0.2");
    assert_eq!(rs[1].value["uname"]["machine"], "MockBoard");
}

#[test]
fn unique_id_is_reversed_hex() {
    let (mut d, _log) = boot(MockBoard::new());
    let r = call(&mut d, "unique_id", json!({}));
    assert_eq!(r.value, json!({"value": "efbeadde"}));
}

#[test]
fn result_queue_evicts_oldest_on_overflow() {
    let (mut d, _log) = boot(MockBoard::new());
    let h = d.handle();
    for _ in 0..12 {
        h.cmd(&json!({"method": "led", "args": {"set": [[1, true]]}}));
        d.run_pending();
    }
    h.cmd(&json!({"method": "unique_id", "args": {}}));
    d.run_pending();

    let all = h.peek(None, true);
    assert_eq!(all.len(), 10);
    assert_eq!(all.last().unwrap().method, "unique_id");
}

#[test]
fn gate_failures_never_reach_the_dispatcher() {
    let (mut d, _log) = boot(MockBoard::new());
    let h = d.handle();
    assert!(!h.cmd(&json!("reset")));
    assert!(!h.cmd(&json!({"method": "reset", "args": [1]})));
    assert!(!h.cmd(&json!({"method": "_debug"})));
    assert_eq!(d.run_pending(), 0);
    let msgs: Vec<_> = h
        .ret(Some("cmd"), true)
        .iter()
        .filter_map(|r| r.err_message().map(str::to_owned))
        .collect();
    assert_eq!(
        msgs,
        [
            "cmd must be a dict",
            "cmd args must be a dict",
            "'_debug' invalid method"
        ]
    );
}

#[test]
fn custom_registry_rejects_duplicates_and_reserved_names() {
    fn ping(env: &mut HandlerEnv<MockBoard, NoDelay>, _: &Args) {
        env.sink.ok("ping", json!("pong"));
    }
    let mut set = HandlerSet::empty();
    set.register("ping", ping).unwrap();
    assert_eq!(
        set.register("ping", ping),
        Err(RegistryError::Duplicate("ping"))
    );
    assert_eq!(
        set.register("_debug", ping),
        Err(RegistryError::Reserved("_debug"))
    );

    let mut d = Dispatcher::with_handlers(MockBoard::new(), NoDelay, set, ServerConfig::default());
    let h = d.handle();
    assert!(h.cmd(&json!({"method": "ping"})));
    assert!(!h.cmd(&json!({"method": "reset"})));
    d.run_pending();
    assert_eq!(h.ret(Some("ping"), false)[0].value, "pong");
}
