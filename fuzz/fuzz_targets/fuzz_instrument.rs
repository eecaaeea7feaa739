//! Fuzz target: instrumented streams
//!
//! Pushes arbitrary request and response bytes through the reader and writer
//! decorations with random read and write sizes. Instrumentation must never
//! panic into the caller nor alter a single byte.

#![no_main]

use std::io::{self, Read, Write};
use std::sync::Arc;

use arbitrary::Arbitrary;
use http_instrument::{ConnectionId, EventCollector, MonitoredConnection, TransactionsCache};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    outbound: Vec<u8>,
    inbound:  Vec<u8>,
    step:     u8,
    port:     u16,
}

struct Stepped<'a> {
    data: &'a [u8],
    step: usize,
}

impl Read for Stepped<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.step.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fuzz_target!(|input: Input| {
    let step = (input.step as usize).max(1);
    let cache = Arc::new(TransactionsCache::new());
    let conn = Arc::new(MonitoredConnection::new(ConnectionId(1), input.port, cache));
    let events = Arc::new(EventCollector::new());
    let (mut reader, mut writer) = conn.split(
        Stepped {
            data: &input.inbound,
            step,
        },
        Vec::new(),
        events.clone(),
    );

    for chunk in input.outbound.chunks(step) {
        writer.write_all(chunk).unwrap();
    }
    assert_eq!(writer.get_ref(), &input.outbound);

    let mut seen = Vec::new();
    reader.read_to_end(&mut seen).unwrap();
    assert_eq!(seen, input.inbound);

    for event in events.drain() {
        assert!(event.transaction().is_finalized());
    }
});
