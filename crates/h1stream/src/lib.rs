//! Streaming HTTP/1.x response parser
//!
//! Turns the raw bytes of an HTTP/1.x connection's inbound direction into
//! semantic events (status line recognized, error body, message finished)
//! without buffering whole messages and without ever failing the caller.
//! Connections carrying several responses in sequence are handled: after a
//! message ends, the parser starts over at a status line.
//!
//! # Usage
//!
//! ```
//! use h1stream::{ResponseHandler, ResponseParser, TimestampNs};
//! use http::StatusCode;
//!
//! #[derive(Default)]
//! struct Printer;
//!
//! impl ResponseHandler for Printer {
//!     fn status_line_found(&mut self, status: StatusCode) {
//!         println!("status {status}");
//!     }
//!     fn append_body(&mut self, _body: &[u8]) {}
//!     fn finished_message(&mut self, bytes: u64, _end: Option<TimestampNs>) {
//!         println!("{bytes} bytes");
//!     }
//! }
//!
//! let mut parser = ResponseParser::new();
//! let mut printer = Printer;
//! parser.add_block(b"HTTP/1.1 204 No Content\r\n", &mut printer);
//! parser.add_block(b"\r\n", &mut printer);
//! ```

mod buffer;
mod parse;
mod parser;
mod state;
mod traits;

#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}
pub(crate) use trace_debug;

pub use buffer::LineBuffer;
pub use parse::{HeaderField, parse_chunk_size, parse_header_line, parse_status_line};
pub use parser::ResponseParser;
pub use state::{
    LineLimits, ParseError, ParseErrorKind, ParserLimits, ParserState, ResponseHead, TimestampNs,
};
pub use traits::ResponseHandler;
