//! Text console over a live dispatcher.

use boardlink::app::console::Console;
use boardlink::app::server::Dispatcher;
use boardlink::config::ServerConfig;
use boardlink::drivers::delay::NoDelay;
use boardlink::rpc::literal::decode_records;
use boardlink::rpc::record::ResultRecord;
use serde_json::json;

use crate::mock_board::MockBoard;

fn started() -> (Dispatcher<MockBoard, NoDelay>, Console) {
    let d = Dispatcher::new(MockBoard::new(), NoDelay, ServerConfig::default());
    let mut c = Console::new(d.handle(), "boardlink_main");
    c.exec("import boardlink_main").unwrap();
    (d, c)
}

#[test]
fn failed_results_print_with_apostrophes_intact() {
    let (mut d, mut c) = started();
    c.exec("boardlink_main.server.cmd({'method': 'get_gpio', 'args': {'pin': \"o'clock\"}})")
        .unwrap();
    d.run_pending();

    let out = c.exec("boardlink_main.server.ret(method='get_gpio', all=False)").unwrap();
    assert!(out.contains("'success': False"));
    let records = decode_records(&out).unwrap();
    assert_eq!(
        records[0].err_message(),
        Some("o'clock has not been initialized")
    );
}

#[test]
fn printed_records_keep_wire_key_order() {
    let (mut d, mut c) = started();
    c.exec("boardlink_main.server.cmd({'method': 'reset', 'args': {}})").unwrap();
    d.run_pending();
    let out = c.exec("boardlink_main.server.peek()").unwrap();
    assert_eq!(
        out,
        "[{'method': 'reset', 'value': {}, 'success': True}]\n"
    );
}

#[test]
fn gate_rejection_is_visible_under_cmd() {
    let (_d, mut c) = started();
    c.exec("boardlink_main.server.cmd({'args': {}})").unwrap();
    let out = c.exec("boardlink_main.server.ret(method='cmd')").unwrap();
    let records = decode_records(&out).unwrap();
    assert_eq!(
        records,
        [ResultRecord::err("cmd", "cmd dict must have method key")]
    );
}

#[test]
fn all_flag_must_be_boolean() {
    let (_d, mut c) = started();
    let err = c
        .exec("boardlink_main.server.peek(method=None, all='{}')")
        .unwrap_err();
    assert!(err.starts_with("TypeError"));
}

#[test]
fn statements_before_an_error_take_effect() {
    let (_d, mut c) = started();
    let err = c
        .exec(
            "boardlink_main.server.update({'method': 'note', 'value': 1, 'success': True})\n\
             boardlink_main.server.explode()",
        )
        .unwrap_err();
    assert!(err.starts_with("AttributeError"));
    let out = c.exec("boardlink_main.server.ret('note')").unwrap();
    assert_eq!(
        decode_records(&out).unwrap(),
        [ResultRecord::ok("note", json!(1))]
    );
}

#[test]
fn update_requires_a_result_mapping() {
    let (_d, mut c) = started();
    let err = c
        .exec("boardlink_main.server.update({'method': 'note'})")
        .unwrap_err();
    assert!(err.starts_with("TypeError"));
}

#[test]
fn other_module_names_are_unsupported() {
    let (_d, mut c) = started();
    assert!(c.exec("other.server.ret()").unwrap_err().starts_with("SyntaxError"));
}
