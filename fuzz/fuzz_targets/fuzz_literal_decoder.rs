//! Fuzz target: `literal::decode` / `literal::decode_records`
//!
//! Feeds arbitrary text through the literal decoder. It must never panic,
//! and anything it accepts must print back to text it accepts again.
//!
//! cargo fuzz run fuzz_literal_decoder

#![no_main]

use boardlink::rpc::literal::{decode, decode_records, to_literal};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(value) = decode(text) {
        let printed = to_literal(&value);
        assert!(decode(&printed).is_ok(), "printed literal must decode: {printed}");
    }

    // Record lists go through the same path plus a shape check.
    let _ = decode_records(text);
});
