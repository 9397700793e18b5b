//! Fuzz target for the name lookup parsers.
//!
//! Feeds arbitrary lines to every parser behind a by-name lookup and checks
//! that none of them panic or report a zero PID.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pq_common::Lookup;
use pq_core::parsers;

#[derive(Arbitrary, Debug)]
struct Input {
    lines: Vec<String>,
    name: String,
}

fuzz_target!(|input: Input| {
    let lines = &input.lines;
    for result in [
        parsers::parse_pid_list(lines),
        parsers::parse_pidof(lines),
        parsers::parse_ps_linux(lines),
        parsers::parse_ps_bsd(lines, &input.name),
        parsers::parse_lsof_commands(lines, &input.name),
    ] {
        if let Lookup::Found(pid) = result {
            assert!(pid.as_u32() > 0);
        }
    }
    let _ = parsers::parse_process_listing(lines, &input.name);
    let _ = parsers::parse_jail_id(lines);
});
