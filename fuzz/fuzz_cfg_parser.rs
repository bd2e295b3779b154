//! Fuzz target for the balancer config parsers.
//!
//! Run with: cargo +nightly fuzz run fuzz_cfg_parser
//!
//! Exercises `parse_text()` and `parse_json()` with arbitrary byte
//! sequences to find panics, hangs, or memory issues in the line-oriented
//! parsing pipeline.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Only that it doesn't panic; the result itself is irrelevant
        let _ = helmsman_config::parse_text(s);
        let _ = helmsman_config::parse_json(s);
    }
});
