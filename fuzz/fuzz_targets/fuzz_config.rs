//! Fuzz target for config file parsing.
//!
//! Tests that arbitrary TOML is either rejected with an error or yields a
//! config that passes validation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pq_core::ProbeConfig;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(config) = ProbeConfig::from_toml_str(text, Path::new("fuzz.toml")) {
            let _ = config.validate();
        }
    }
});
