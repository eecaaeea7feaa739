//! Fuzz target: structured response sequences
//!
//! Generates well-formed HTTP/1.x responses with random framing, header
//! noise and fragmentation using the Arbitrary trait. Every response must be
//! recognized and every byte attributed to exactly one message.

#![no_main]

use arbitrary::Arbitrary;
use h1stream::{ResponseHandler, ResponseParser, TimestampNs};
use http::StatusCode;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Framing {
    Length,
    Chunked(Vec<u8>),
    NoBody,
}

#[derive(Debug, Arbitrary)]
struct FuzzResponse {
    status:  u16,
    framing: Framing,
    /// Extra header values; kept short and free of line terminators
    headers: Vec<String>,
    body:    Vec<u8>,
}

impl FuzzResponse {
    fn status(&self) -> u16 {
        match self.framing {
            Framing::NoBody => 204,
            // Keep clear of 1xx, 204 and 304, which never carry a body
            _ => 200 + self.status % 300 / 100 * 100 + self.status % 4,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} Fuzz\r\n", self.status()).into_bytes();
        for (i, value) in self.headers.iter().take(8).enumerate() {
            let value: String = value
                .chars()
                .filter(|c| !matches!(c, '\r' | '\n'))
                .take(64)
                .collect();
            out.extend_from_slice(format!("X-Fuzz-{i}: {value}\r\n").as_bytes());
        }
        match &self.framing {
            Framing::Length => {
                out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", self.body.len()).as_bytes());
                out.extend_from_slice(&self.body);
            },
            Framing::Chunked(splits) => {
                out.extend_from_slice(b"Transfer-Encoding: chunked\r\n\r\n");
                let mut rest = self.body.as_slice();
                let mut splits = splits.iter();
                while !rest.is_empty() {
                    let size = (*splits.next().unwrap_or(&255) as usize).max(1).min(rest.len());
                    out.extend_from_slice(format!("{size:x}\r\n").as_bytes());
                    out.extend_from_slice(&rest[..size]);
                    out.extend_from_slice(b"\r\n");
                    rest = &rest[size..];
                }
                out.extend_from_slice(b"0\r\n\r\n");
            },
            Framing::NoBody => out.extend_from_slice(b"\r\n"),
        }
        out
    }
}

#[derive(Debug, Arbitrary)]
struct Input {
    responses: Vec<FuzzResponse>,
    fragments: Vec<u8>,
}

#[derive(Default)]
struct Counter {
    statuses: Vec<u16>,
    finished: Vec<u64>,
}

impl ResponseHandler for Counter {
    fn status_line_found(&mut self, status: StatusCode) {
        self.statuses.push(status.as_u16());
    }

    fn append_body(&mut self, _body: &[u8]) {}

    fn finished_message(&mut self, bytes_received: u64, _end_time: Option<TimestampNs>) {
        self.finished.push(bytes_received);
    }
}

fuzz_target!(|input: Input| {
    let messages: Vec<Vec<u8>> = input.responses.iter().take(16).map(|r| r.to_bytes()).collect();
    let data = messages.concat();

    let mut parser = ResponseParser::new();
    let mut counter = Counter::default();
    let mut sizes = input.fragments.iter().cycle();
    let mut rest = data.as_slice();
    while !rest.is_empty() {
        let size = sizes.next().map_or(rest.len(), |&s| (s as usize).max(1)).min(rest.len());
        parser.add_block(&rest[..size], &mut counter);
        rest = &rest[size..];
    }

    assert!(!parser.is_sink(), "well-formed input disabled the parser");
    assert_eq!(counter.statuses.len(), messages.len());
    let expected: Vec<u64> = messages.iter().map(|m| m.len() as u64).collect();
    assert_eq!(counter.finished, expected);
});
