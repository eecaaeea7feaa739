//! Callbacks a response parser delivers to the owner of the stream

use http::{Method, StatusCode};

use crate::state::TimestampNs;

/// Receiver of the semantic events a [`ResponseParser`](crate::ResponseParser)
/// recognizes in the byte stream.
///
/// The parser never holds on to its handler: it is passed into every feed
/// call, so the owner of the stream can keep the parser and the transaction
/// state side by side.
pub trait ResponseHandler {
    /// A status line was recognized; a new response has started.
    fn status_line_found(&mut self, status: StatusCode);

    /// Body bytes of a response with status >= 400, delivered once per
    /// message just before [`finished_message`](Self::finished_message).
    fn append_body(&mut self, body: &[u8]);

    /// The response ended after `bytes_received` bytes (status line, headers
    /// and body). `end_time` overrides the completion time when the parser
    /// knows better than "now".
    fn finished_message(&mut self, bytes_received: u64, end_time: Option<TimestampNs>);

    /// Method of the request this response answers, if known. Responses to
    /// `HEAD` carry no body.
    fn request_method(&mut self) -> Option<Method> {
        None
    }

    /// When the last response bytes were read from the stream. Used as the
    /// completion time of close-delimited bodies, whose end is only noticed at
    /// end of stream.
    fn last_data_time(&self) -> Option<TimestampNs> {
        None
    }
}
