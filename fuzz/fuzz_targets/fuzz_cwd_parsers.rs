//! Fuzz target for pwdx and lsof working directory parsing.
//!
//! Any path that comes back must be absolute.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pq_common::{Lookup, ProcessId};
use pq_core::parsers;

#[derive(Arbitrary, Debug)]
struct Input {
    lines: Vec<String>,
    pid: u32,
}

fuzz_target!(|input: Input| {
    let Some(pid) = ProcessId::new(input.pid) else {
        return;
    };
    for result in [
        parsers::parse_pwdx(&input.lines, pid),
        parsers::parse_lsof_cwd(&input.lines, pid),
    ] {
        if let Lookup::Found(path) = result {
            assert!(path.is_absolute());
        }
    }
});
