//! Named thread spawning for dispatcher and handler tasks.
//!
//! Every concurrent piece of the device server (the dispatcher loop, LED
//! toggles, long-running handlers, multi-channel ADC runs) is a plain
//! `std::thread` with an explicit name and stack size, so a stack trace or
//! a thread listing names the handler that owns it.
//!
//! Unlike `std::thread::spawn`, failure to create a thread is returned to
//! the caller.  Scheduled handlers turn it into a failed result instead of
//! panicking the dispatcher.

use std::io;
use std::thread::{Builder, JoinHandle};

use log::info;

/// Smallest stack handed to the OS, whatever the configuration says.
pub const MIN_STACK_KB: usize = 16;

/// Spawn `f` on a new thread called `name`.
pub fn spawn(
    name: &str,
    stack_kb: usize,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    let stack_kb = stack_kb.max(MIN_STACK_KB);
    info!("TASK[{}]: spawning (stack={}KB)", name, stack_kb);

    Builder::new()
        .name(name.into())
        .stack_size(stack_kb * 1024)
        .spawn(f)
}
