//! Fuzz target: `Console::exec`
//!
//! Runs arbitrary code text against a started console backed by the
//! simulated board, then drains whatever the dispatcher queued. Neither
//! the console nor the handlers may panic, and the result queue stays
//! within its capacity.
//!
//! cargo fuzz run fuzz_console

#![no_main]

use boardlink::adapters::sim_board::SimBoard;
use boardlink::app::console::Console;
use boardlink::app::server::Dispatcher;
use boardlink::config::{QUEUE_CAPACITY, ServerConfig};
use boardlink::drivers::delay::NoDelay;
use libfuzzer_sys::fuzz_target;

const MODULE: &str = "boardlink_main";

fuzz_target!(|data: &[u8]| {
    let Ok(code) = std::str::from_utf8(data) else {
        return;
    };

    let mut dispatcher = Dispatcher::new(SimBoard::new(), NoDelay, ServerConfig::default());
    let mut console = Console::new(dispatcher.handle(), MODULE);
    if console.exec(&format!("import {MODULE}")).is_err() {
        return;
    }

    let _ = console.exec(code);
    let _ = console.exec(&format!("{MODULE}.server.cmd({code})"));
    dispatcher.run_pending();
    dispatcher.shutdown();

    let pending = dispatcher.handle().peek(None, true);
    assert!(pending.len() <= QUEUE_CAPACITY);
});
