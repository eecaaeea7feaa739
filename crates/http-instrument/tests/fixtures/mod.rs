#![allow(dead_code)]
//! Raw HTTP/1.x message builders and stream doubles for tests

use std::io::{self, Read};

/// Build a request head, with a `Content-Length` body when `body` is given
pub fn request(method: &str, path: &str, host: &str, body: Option<&[u8]>) -> Vec<u8> {
    let mut out = format!("{method} {path} HTTP/1.1\r\nHost: {host}\r\n").into_bytes();
    match body {
        Some(body) => {
            out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
            out.extend_from_slice(body);
        },
        None => out.extend_from_slice(b"\r\n"),
    }
    out
}

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

/// Inner reader replaying `data` in reads of varying size, so message
/// boundaries fall at arbitrary points
pub struct Fragmented {
    data:  Vec<u8>,
    pos:   usize,
    state: u64,
    max:   usize,
}

impl Fragmented {
    pub fn new(data: Vec<u8>, seed: u64, max: usize) -> Self {
        Self {
            data,
            pos: 0,
            state: seed.wrapping_mul(6364136223846793005).wrapping_add(1),
            max,
        }
    }

    fn next_size(&mut self) -> usize {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 33) as usize % self.max + 1
    }
}

impl Read for Fragmented {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self
            .next_size()
            .min(buf.len())
            .min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
