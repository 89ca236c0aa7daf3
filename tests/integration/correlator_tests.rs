//! Host correlator against a scripted transport.

use std::thread;

use boardlink::config::ClientConfig;
use boardlink::error::{RpcError, TransportError};
use boardlink::rpc::record::Args;
use boardlink::{Client, IntoOutcome};
use serde_json::{Value, json};

use crate::mock_transport::ScriptedTransport;

const RESET_OK: &str = "[{'method': 'reset', 'value': {}, 'success': True}]";
const DIAG: &str = "[{'method': '_debug', 'value': 'handlers:reset: busy', 'success': True}]";

fn client(t: ScriptedTransport) -> Client<ScriptedTransport> {
    let config = ClientConfig {
        poll_interval_ms: 0,
        ..ClientConfig::default()
    };
    Client::with_config(t, config)
}

#[test]
fn match_on_first_poll() {
    let c = client(ScriptedTransport::new().reply("").reply(RESET_OK));
    let record = c.invoke("reset", Args::new()).unwrap();
    assert!(record.success);
    assert_eq!(record.method, "reset");
    assert_eq!(c.into_inner().polls(), 1);
}

#[test]
fn three_diagnostics_then_match_within_default_budget() {
    let c = client(
        ScriptedTransport::new()
            .reply("")
            .reply(DIAG)
            .reply(DIAG)
            .reply(DIAG)
            .reply(RESET_OK),
    );
    assert!(c.invoke("reset", Args::new()).unwrap().success);
}

#[test]
fn diagnostics_do_not_consume_the_budget() {
    // Four empty polls leave one attempt; the diagnostic-only polls in
    // between must not spend it.
    let c = client(
        ScriptedTransport::new()
            .reply("")
            .reply("[]")
            .reply("[]")
            .reply("[]")
            .reply("[]")
            .reply(DIAG)
            .reply(DIAG)
            .reply(DIAG)
            .reply(RESET_OK),
    );
    assert!(c.invoke("reset", Args::new()).is_ok());
    assert_eq!(c.into_inner().polls(), 8);
}

#[test]
fn exhausted_budget_is_a_timeout() {
    let c = client(ScriptedTransport::new());
    let err = c.invoke("reset", Args::new()).unwrap_err();
    assert_eq!(
        err,
        RpcError::Timeout {
            method: "reset".into()
        }
    );
    assert_eq!(
        err.into_outcome(),
        (
            false,
            Value::String("failed to verify method reset was executed".into())
        )
    );
}

#[test]
fn budget_follows_config() {
    let config = ClientConfig {
        poll_interval_ms: 0,
        retries: 2,
        ..ClientConfig::default()
    };
    let c = Client::with_config(ScriptedTransport::new(), config);
    assert!(c.invoke("reset", Args::new()).is_err());
    assert_eq!(c.into_inner().polls(), 2);
}

#[test]
fn malformed_reply_yields_false_and_empty_result() {
    let c = client(
        ScriptedTransport::new()
            .reply("")
            .reply("[{'method': 'reset', 'value': {}, 'success': Tru"),
    );
    let outcome = c.invoke("reset", Args::new()).into_outcome();
    assert_eq!(outcome, (false, json!([])));
}

#[test]
fn reply_that_is_not_a_record_list_is_a_decode_error() {
    let c = client(ScriptedTransport::new().reply("").reply("{'value': 3}"));
    assert!(matches!(
        c.invoke("reset", Args::new()),
        Err(RpcError::Decode(_))
    ));
}

#[test]
fn two_matches_is_a_consistency_error() {
    let twice = "[{'method': 'reset', 'value': {}, 'success': True}, \
                 {'method': 'reset', 'value': {}, 'success': True}]";
    let c = client(ScriptedTransport::new().reply("").reply(twice));
    assert_eq!(
        c.invoke("reset", Args::new()),
        Err(RpcError::Consistency {
            method: "reset".into(),
            count: 2
        })
    );
}

#[test]
fn diagnostics_beside_the_match_are_not_counted() {
    let mixed = "[{'method': '_debug', 'value': 'x', 'success': True}, \
                 {'method': 'reset', 'value': {}, 'success': True}]";
    let c = client(ScriptedTransport::new().reply("").reply(mixed));
    assert!(c.invoke("reset", Args::new()).is_ok());
}

#[test]
fn submit_failure_is_not_retried() {
    let c = client(ScriptedTransport::new().fail(TransportError::Interrupted));
    assert_eq!(
        c.invoke("reset", Args::new()),
        Err(RpcError::Transport(TransportError::Interrupted))
    );
    let t = c.into_inner();
    assert_eq!(t.sent.len(), 1);
    assert_eq!(t.polls(), 0);
}

#[test]
fn poll_failure_is_not_retried() {
    let c = client(
        ScriptedTransport::new()
            .reply("")
            .fail(TransportError::Io("read timeout".into())),
    );
    let (ok, value) = c.invoke("reset", Args::new()).into_outcome();
    assert!(!ok);
    assert_eq!(value, Value::String("transport I/O: read timeout".into()));
    assert_eq!(c.into_inner().polls(), 1);
}

#[test]
fn device_side_failure_is_a_record_not_an_error() {
    let c = client(ScriptedTransport::new().reply("").reply(
        "[{'method': 'led_toggle', 'value': {'err': 'unknown led 7'}, 'success': False}]",
    ));
    let record = c.invoke("led_toggle", Args::new()).unwrap();
    assert!(!record.success);
    assert_eq!(record.err_message(), Some("unknown led 7"));
    let (ok, value) = Ok::<_, RpcError>(record).into_outcome();
    assert!(!ok);
    assert_eq!(value["value"]["err"], "unknown led 7");
}

#[test]
fn arguments_are_sent_as_literals() {
    let c = client(ScriptedTransport::new().echoing());
    c.invoke("init_gpio", serde_json::from_value(json!({"name": "it's", "pull": null})).unwrap())
        .unwrap();
    let t = c.into_inner();
    assert_eq!(
        t.sent[0],
        "boardlink_main.server.cmd({'method': 'init_gpio', 'args': {'name': 'it\\'s', 'pull': None}})"
    );
}

#[test]
fn get_server_method_reports_missing_method() {
    let c = client(ScriptedTransport::new());
    let err = c.get_server_method("adc_read_multi_results", false).unwrap_err();
    assert_eq!(err.to_string(), "failed to find method adc_read_multi_results");
}

#[test]
fn get_server_method_with_all_returns_every_match() {
    let two = "[{'method': 'note', 'value': 1, 'success': True}, \
               {'method': 'note', 'value': 2, 'success': True}]";
    let c = client(ScriptedTransport::new().reply(two));
    let rs = c.get_server_method("note", true).unwrap();
    assert_eq!(rs.len(), 2);
    assert_eq!(
        c.into_inner().sent,
        ["boardlink_main.server.ret(method='note', all=True)"]
    );
}

#[test]
fn session_guard_keeps_submit_and_polls_together() {
    let c = client(ScriptedTransport::new().echoing());
    let methods = ["reset", "version", "unique_id", "debug"];
    thread::scope(|s| {
        for m in methods {
            let c = &c;
            s.spawn(move || c.invoke(m, Args::new()).unwrap());
        }
    });

    let sent = c.into_inner().sent;
    assert_eq!(sent.len(), methods.len() * 2);
    for pair in sent.chunks(2) {
        let method = pair[0]
            .split_once("'method': '")
            .and_then(|(_, rest)| rest.split_once('\''))
            .map(|(m, _)| m)
            .unwrap();
        assert_eq!(
            pair[1],
            format!("boardlink_main.server.ret(method='{method}', all=False)")
        );
    }
}

#[test]
fn close_leaves_raw_mode() {
    let c = client(ScriptedTransport::new());
    c.start_server().unwrap();
    c.close().unwrap();
    let t = c.into_inner();
    assert!(!t.raw);
    assert_eq!(t.enters, 1);
}

// ── peek_server_method ────────────────────────────────────────

#[test]
fn peek_with_method_filter_returns_the_match() {
    let c = client(ScriptedTransport::new().reply(RESET_OK));
    let rs = c.peek_server_method(Some("reset"), false).unwrap();
    assert_eq!(rs.len(), 1);
    assert_eq!(rs[0].method, "reset");
    assert_eq!(
        c.into_inner().sent,
        ["boardlink_main.server.peek(method='reset', all=False)"]
    );
}

#[test]
fn peek_with_all_returns_every_match() {
    let two = "[{'method': 'note', 'value': 1, 'success': True}, \
               {'method': 'note', 'value': 2, 'success': True}]";
    let c = client(ScriptedTransport::new().reply(two));
    let rs = c.peek_server_method(Some("note"), true).unwrap();
    assert_eq!(rs.len(), 2);
    assert_eq!(
        c.into_inner().sent,
        ["boardlink_main.server.peek(method='note', all=True)"]
    );
}

#[test]
fn peek_exhaustion_is_not_found() {
    let c = client(ScriptedTransport::new());
    assert_eq!(
        c.peek_server_method(Some("note"), false),
        Err(RpcError::NotFound {
            method: "note".into()
        })
    );
    assert_eq!(c.into_inner().polls(), 5);
}

#[test]
fn peek_past_a_standing_diagnostic_spends_the_budget() {
    // A peek never removes the diagnostic, so every fetch sees it again.
    let mut t = ScriptedTransport::new();
    for _ in 0..20 {
        t = t.reply(DIAG);
    }
    let c = client(t);
    assert_eq!(
        c.peek_server_method(Some("adc_read_multi_results"), false),
        Err(RpcError::NotFound {
            method: "adc_read_multi_results".into()
        })
    );
    assert_eq!(c.into_inner().polls(), 5);
}

#[test]
fn peek_finds_a_match_beside_a_diagnostic() {
    let mixed = "[{'method': '_debug', 'value': 'x', 'success': True}, \
                 {'method': 'reset', 'value': {}, 'success': True}]";
    let c = client(ScriptedTransport::new().reply(mixed));
    let rs = c.peek_server_method(Some("reset"), false).unwrap();
    assert_eq!(rs, [boardlink::rpc::record::ResultRecord::ok("reset", json!({}))]);
}

#[test]
fn zero_retries_still_polls_once() {
    let config = ClientConfig {
        poll_interval_ms: 0,
        retries: 0,
        ..ClientConfig::default()
    };
    let c = Client::with_config(ScriptedTransport::new().reply("").reply(RESET_OK), config);
    assert_eq!(c.config().retries, 1);
    assert!(c.invoke("reset", Args::new()).unwrap().success);
}
