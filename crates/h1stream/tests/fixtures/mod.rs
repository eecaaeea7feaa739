#![allow(dead_code)]
//! HTTP/1.x response building helpers for tests
//!
//! These functions construct raw response bytes so tests can control framing
//! and fragmentation precisely.

use h1stream::{ResponseHandler, TimestampNs};
use http::{Method, StatusCode};

/// Build a response framed by `Content-Length`
pub fn content_length_response(status: u16, reason: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

/// Build a chunked response, one chunk per element of `chunks`
pub fn chunked_response(status: u16, reason: &str, chunks: &[&[u8]]) -> Vec<u8> {
    let mut out =
        format!("HTTP/1.1 {status} {reason}\r\nTransfer-Encoding: chunked\r\n\r\n").into_bytes();
    for chunk in chunks {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

/// Build a response whose body runs until the connection closes
pub fn close_delimited_response(status: u16, reason: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.0 {status} {reason}\r\nConnection: close\r\n\r\n").into_bytes();
    out.extend_from_slice(body);
    out
}

/// Deterministic fragment sizes in `1..=max`, so split points vary without a
/// random number generator
pub fn fragment_sizes(seed: u64, max: usize) -> impl Iterator<Item = usize> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    std::iter::from_fn(move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        Some((state >> 33) as usize % max + 1)
    })
}

/// Split `data` into consecutive fragments using [`fragment_sizes`]
pub fn fragment(data: &[u8], seed: u64, max: usize) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut pos = 0;
    let mut sizes = fragment_sizes(seed, max);
    while pos < data.len() {
        let size = sizes.next().unwrap_or(1).min(data.len() - pos);
        out.push(&data[pos..pos + size]);
        pos += size;
    }
    out
}

/// Semantic callback observed by [`Recorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Status(u16),
    Body(Vec<u8>),
    Finished(u64),
}

/// Handler that records every callback in order
#[derive(Debug, Default)]
pub struct Recorder {
    pub events:  Vec<Event>,
    pub methods: Vec<Method>,
}

impl Recorder {
    /// Answer `request_method` with these methods, one per response
    pub fn with_methods(methods: &[Method]) -> Self {
        Self {
            events:  Vec::new(),
            methods: methods.iter().rev().cloned().collect(),
        }
    }

    pub fn statuses(&self) -> Vec<u16> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Status(code) => Some(*code),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Finished(bytes) => Some(*bytes),
                _ => None,
            })
            .collect()
    }
}

impl ResponseHandler for Recorder {
    fn status_line_found(&mut self, status: StatusCode) {
        self.events.push(Event::Status(status.as_u16()));
    }

    fn append_body(&mut self, body: &[u8]) {
        self.events.push(Event::Body(body.to_vec()));
    }

    fn finished_message(&mut self, bytes_received: u64, _end_time: Option<TimestampNs>) {
        self.events.push(Event::Finished(bytes_received));
        self.methods.pop();
    }

    fn request_method(&mut self) -> Option<Method> {
        self.methods.last().cloned()
    }
}
