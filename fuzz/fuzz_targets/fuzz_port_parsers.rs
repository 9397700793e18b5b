//! Fuzz target for netstat, sockstat, and lsof listener parsing.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pq_common::Port;
use pq_core::parsers;

#[derive(Arbitrary, Debug)]
struct Input {
    lines: Vec<String>,
    port: u16,
}

fuzz_target!(|input: Input| {
    let port = Port(input.port);
    let _ = parsers::parse_netstat(&input.lines, port);
    let _ = parsers::parse_sockstat(&input.lines, port);
    let _ = parsers::parse_lsof_listen(&input.lines, port);
});
