//! Fuzz target for the admin response decoders.
//!
//! Run with: cargo +nightly fuzz run fuzz_admin_decode
//!
//! Feeds arbitrary buffers through every decoding strategy, including the
//! auto-detection path that classifies single-line responses as peer
//! errors.

#![no_main]

use helmsman_core::admin::{Decoder, decode::decode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        for decoder in [
            Decoder::Auto,
            Decoder::Raw,
            Decoder::Lines,
            Decoder::Fields,
            Decoder::Table,
            Decoder::Weight,
        ] {
            let _ = decode(&decoder, s, "fuzz");
        }
    }
});
