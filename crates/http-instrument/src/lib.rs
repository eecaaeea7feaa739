//! Passive HTTP/1.x transaction instrumentation
//!
//! Decorates the two halves of a client connection so that every
//! request/response exchange flowing through them produces a
//! [`TransactionState`] record (status, response start and end, bytes sent
//! and received, connect and TLS handshake timing) without altering the
//! bytes the application reads or writes.
//!
//! - [`ParsingWriter`] scans outbound bytes for request heads and enqueues
//!   a shell per request in the shared [`TransactionsCache`].
//! - [`ParsingReader`] feeds inbound bytes to an [`h1stream`] response
//!   parser; its [`ResponseTracker`] completes each shell and publishes it
//!   to the stream's [`StreamListener`]s.
//!
//! # Usage
//!
//! ```
//! use std::io::{Cursor, Read, Write};
//! use std::sync::Arc;
//!
//! use http_instrument::{
//!     ConnectionId, EventCollector, MonitoredConnection, TransactionsCache,
//! };
//!
//! let cache = Arc::new(TransactionsCache::new());
//! let conn = Arc::new(MonitoredConnection::new(ConnectionId(1), 80, cache));
//! let events = Arc::new(EventCollector::new());
//!
//! let response = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".to_vec();
//! let (mut reader, mut writer) =
//!     conn.split(Cursor::new(response), Vec::new(), events.clone());
//!
//! writer.write_all(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
//! let mut body = Vec::new();
//! reader.read_to_end(&mut body).unwrap();
//!
//! let events = events.drain();
//! let record = events[0].transaction();
//! assert_eq!(record.status().map(|s| s.as_u16()), Some(200));
//! assert_eq!(record.host(), Some("example.com"));
//! ```

mod cache;
mod config;
mod connection;
mod event;
mod reader;
mod tracker;
mod transaction;
mod writer;

#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}
pub(crate) use trace_warn;

#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}
pub(crate) use trace_debug;

#[cfg(feature = "tracing")]
macro_rules! trace_error {
    ($($arg:tt)*) => { ::tracing::error!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_error {
    ($($arg:tt)*) => {};
}
pub(crate) use trace_error;

pub use cache::{ConnectionHandle, ConnectionId, MAX_REUSED_SNAPSHOTS, TransactionsCache};
pub use config::InstrumentConfig;
pub use connection::MonitoredConnection;
pub use event::{EventCollector, StreamEvent, StreamFault, StreamListener, StreamListeners};
pub use h1stream::{ParserLimits, TimestampNs};
pub use reader::ParsingReader;
pub use tracker::ResponseTracker;
pub use transaction::{Scheme, TcpData, TransactionState};
pub use writer::{ParsingWriter, RequestState};

#[cfg(test)]
mod tests;
