//! Fuzz target: raw response bytes
//!
//! Feeds arbitrary bytes to the response parser, once as a single block and
//! once byte by byte. The parser must never panic, and both feeds must yield
//! the same callbacks.

#![no_main]

use h1stream::{ResponseHandler, ResponseParser, TimestampNs};
use http::StatusCode;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Default, PartialEq)]
struct Calls(Vec<(u8, u64)>);

impl ResponseHandler for Calls {
    fn status_line_found(&mut self, status: StatusCode) {
        self.0.push((0, status.as_u16() as u64));
    }

    fn append_body(&mut self, body: &[u8]) {
        self.0.push((1, body.len() as u64));
    }

    fn finished_message(&mut self, bytes_received: u64, _end_time: Option<TimestampNs>) {
        self.0.push((2, bytes_received));
    }
}

fuzz_target!(|data: &[u8]| {
    let mut block = Calls::default();
    let mut parser = ResponseParser::new();
    let consumed = parser.add_block(data, &mut block);
    assert!(consumed <= data.len());
    if !parser.is_sink() {
        assert_eq!(consumed, data.len());
    }
    parser.end_of_stream(&mut block);
    assert!(parser.is_sink());

    let mut bytewise = Calls::default();
    let mut parser = ResponseParser::new();
    for &b in data {
        parser.add(Some(b), &mut bytewise);
    }
    parser.add(None, &mut bytewise);

    assert_eq!(block, bytewise);
});
