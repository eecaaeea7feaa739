use http::Method;

use crate::buffer::LineBuffer;
use crate::parse::{self, HeaderField};
use crate::state::{
    ParseError, ParseErrorKind, ParserLimits, ParserState, ResponseHead, TimestampNs,
};
use crate::traits::ResponseHandler;
use crate::trace_debug;

/// Incremental HTTP/1.x response parser for one byte stream.
///
/// Bytes are fed as they are read, one at a time or in fragments of any
/// size; lines may be split across fragments arbitrarily. The parser owns the
/// current [`ParserState`] and a single [`LineBuffer`] that is reset, never
/// reallocated, at the start of each line. Recognized events are delivered
/// to the [`ResponseHandler`] passed into each call.
///
/// Any malformed input moves the parser to [`ParserState::Sink`] for good:
/// from then on every byte is ignored. Nothing is ever returned as an error
/// to the caller feeding the bytes.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    state:                 ParserState,
    line:                  LineBuffer,
    /// The current header line overflowed and is being skipped
    line_truncated:        bool,
    /// Bytes of the current message seen so far, carried across states
    characters_in_message: u64,
    /// Body bytes retained for an error response
    error_body:            Vec<u8>,
    last_error:            Option<ParseError>,
    limits:                ParserLimits,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    /// Create a parser with default limits, awaiting a status line.
    pub fn new() -> Self {
        Self::with_limits(ParserLimits::default())
    }

    /// Create a parser with custom limits, awaiting a status line.
    pub fn with_limits(limits: ParserLimits) -> Self {
        Self {
            state: ParserState::StatusLine,
            line: LineBuffer::with_capacity(limits.status_line.initial),
            line_truncated: false,
            characters_in_message: 0,
            error_body: Vec::new(),
            last_error: None,
            limits,
        }
    }

    /// The active state.
    pub fn state(&self) -> &ParserState {
        &self.state
    }

    /// Returns true once parsing is permanently disabled for this stream.
    pub fn is_sink(&self) -> bool {
        self.state.is_sink()
    }

    /// Bytes of the in-flight message consumed so far.
    pub fn characters_in_message(&self) -> u64 {
        self.characters_in_message
    }

    /// The partially accumulated line.
    pub fn line(&self) -> &LineBuffer {
        &self.line
    }

    /// Why parsing was disabled, if it was disabled by bad input.
    pub fn last_error(&self) -> Option<&ParseError> {
        self.last_error.as_ref()
    }

    pub fn limits(&self) -> &ParserLimits {
        &self.limits
    }

    /// Feed a single unit; `None` marks the end of the stream.
    ///
    /// Returns true if the unit caused a transition (a line was completed, a
    /// body ended, or the parser reached its terminal state).
    pub fn add<H>(&mut self, unit: Option<u8>, handler: &mut H) -> bool
    where
        H: ResponseHandler + ?Sized,
    {
        let Some(byte) = unit else {
            self.reached_eof(handler);
            return true;
        };
        match self.state {
            ParserState::Sink => false,
            ParserState::FixedBody { .. }
            | ParserState::ChunkData { .. }
            | ParserState::CloseDelimited(_) => self.consume_body(&[byte], handler).1,
            _ => self.add_line_byte(byte, handler),
        }
    }

    /// Feed a contiguous fragment.
    ///
    /// Whatever state is current after each transition picks up the rest of
    /// the fragment. Stops early once the parser reaches its sink. Returns the
    /// number of bytes consumed.
    pub fn add_block<H>(&mut self, data: &[u8], handler: &mut H) -> usize
    where
        H: ResponseHandler + ?Sized,
    {
        let mut consumed = 0;
        while consumed < data.len() {
            let n = self.consume_run(&data[consumed..], handler);
            if n == 0 {
                break;
            }
            consumed += n;
        }
        consumed
    }

    /// Signal the end of the stream. Finishes a close-delimited body, then
    /// parks the parser in its sink.
    pub fn end_of_stream<H>(&mut self, handler: &mut H)
    where
        H: ResponseHandler + ?Sized,
    {
        self.add(None, handler);
    }

    /// Stop parsing without finishing anything in flight. Idempotent.
    pub fn close(&mut self) {
        if !self.state.is_sink() {
            trace_debug!("response parser closed in {} state", self.state.name());
        }
        self.state = ParserState::Sink;
    }

    /// Consume bytes with the current state until it transitions. Returns 0
    /// in the sink.
    fn consume_run<H>(&mut self, data: &[u8], handler: &mut H) -> usize
    where
        H: ResponseHandler + ?Sized,
    {
        match self.state {
            ParserState::Sink => 0,
            ParserState::FixedBody { .. }
            | ParserState::ChunkData { .. }
            | ParserState::CloseDelimited(_) => self.consume_body(data, handler).0,
            _ => {
                for (i, &byte) in data.iter().enumerate() {
                    if self.add_line_byte(byte, handler) {
                        return i + 1;
                    }
                }
                data.len()
            },
        }
    }

    fn add_line_byte<H>(&mut self, byte: u8, handler: &mut H) -> bool
    where
        H: ResponseHandler + ?Sized,
    {
        self.characters_in_message += 1;

        if byte == b'\n' {
            let next = match self.parse_line(handler) {
                Ok(next) => next,
                Err(err) => self.fail(err),
            };
            self.transition(next);
            return true;
        }

        let max = self.state.line_limits(&self.limits).map_or(0, |l| l.max);
        if self.line.len() < max {
            self.line.push(byte);
            return false;
        }

        match self.next_after_buffer_full() {
            Some(next) => {
                self.transition(next);
                true
            },
            None => false,
        }
    }

    /// Interpret the completed line according to the current state and pick
    /// the next state.
    fn parse_line<H>(&mut self, handler: &mut H) -> Result<ParserState, ParseError>
    where
        H: ResponseHandler + ?Sized,
    {
        let truncated = std::mem::take(&mut self.line_truncated);
        let line = self.line.as_bytes();

        match self.state.clone() {
            ParserState::StatusLine => {
                let status = parse::parse_status_line(line)?;
                self.error_body.clear();
                handler.status_line_found(status);
                Ok(ParserState::Headers(ResponseHead::new(status)))
            },
            ParserState::Headers(mut head) => {
                if parse::strip_cr(line).is_empty() {
                    return Ok(self.end_of_head(head, handler));
                }
                if !truncated {
                    match parse::parse_header_line(line)? {
                        HeaderField::ContentLength(n) => head.content_length = Some(n),
                        HeaderField::Chunked => head.chunked = true,
                        HeaderField::Other => {},
                    }
                }
                Ok(ParserState::Headers(head))
            },
            ParserState::ChunkSize(head) => match parse::parse_chunk_size(line)? {
                0 => Ok(ParserState::Trailers(head)),
                remaining => Ok(ParserState::ChunkData { head, remaining }),
            },
            ParserState::ChunkEnd(head) => {
                if parse::strip_cr(line).is_empty() {
                    Ok(ParserState::ChunkSize(head))
                } else {
                    Err(ParseErrorKind::MissingChunkTerminator.into())
                }
            },
            ParserState::Trailers(head) => {
                if parse::strip_cr(line).is_empty() {
                    Ok(self.finish(handler, None))
                } else {
                    Ok(ParserState::Trailers(head))
                }
            },
            // Body states and the sink never complete lines.
            state => Ok(state),
        }
    }

    /// Decide how the body is framed once the blank line after the headers
    /// has been seen.
    fn end_of_head<H>(&mut self, head: ResponseHead, handler: &mut H) -> ParserState
    where
        H: ResponseHandler + ?Sized,
    {
        if head.status_forbids_body() || handler.request_method() == Some(Method::HEAD) {
            return self.finish(handler, None);
        }
        if head.chunked {
            return ParserState::ChunkSize(head);
        }
        match head.content_length {
            Some(0) => self.finish(handler, None),
            Some(remaining) => ParserState::FixedBody { head, remaining },
            None => ParserState::CloseDelimited(head),
        }
    }

    /// Count (and possibly capture) body bytes. Returns the bytes consumed and
    /// whether the state transitioned.
    fn consume_body<H>(&mut self, data: &[u8], handler: &mut H) -> (usize, bool)
    where
        H: ResponseHandler + ?Sized,
    {
        match self.state {
            ParserState::FixedBody { head, remaining } => {
                let n = remaining.min(data.len() as u64) as usize;
                self.count_body(&head, &data[..n]);
                if n as u64 == remaining {
                    let next = self.finish(handler, None);
                    self.transition(next);
                    (n, true)
                } else {
                    self.state = ParserState::FixedBody {
                        head,
                        remaining: remaining - n as u64,
                    };
                    (n, false)
                }
            },
            ParserState::ChunkData { head, remaining } => {
                let n = remaining.min(data.len() as u64) as usize;
                self.count_body(&head, &data[..n]);
                if n as u64 == remaining {
                    self.transition(ParserState::ChunkEnd(head));
                    (n, true)
                } else {
                    self.state = ParserState::ChunkData {
                        head,
                        remaining: remaining - n as u64,
                    };
                    (n, false)
                }
            },
            ParserState::CloseDelimited(head) => {
                self.count_body(&head, data);
                (data.len(), false)
            },
            _ => (0, false),
        }
    }

    fn count_body(&mut self, head: &ResponseHead, bytes: &[u8]) {
        self.characters_in_message += bytes.len() as u64;
        if head.is_error() {
            let room = self.limits.error_body.saturating_sub(self.error_body.len());
            let keep = room.min(bytes.len());
            self.error_body.extend_from_slice(&bytes[..keep]);
        }
    }

    /// Report the end of the current message and start over with a status
    /// line.
    fn finish<H>(&mut self, handler: &mut H, end_time: Option<TimestampNs>) -> ParserState
    where
        H: ResponseHandler + ?Sized,
    {
        if !self.error_body.is_empty() {
            handler.append_body(&self.error_body);
            self.error_body.clear();
        }
        handler.finished_message(self.characters_in_message, end_time);
        self.characters_in_message = 0;
        ParserState::StatusLine
    }

    /// State to move to when the line buffer is full and no terminator has
    /// arrived. None keeps the current state.
    fn next_after_buffer_full(&mut self) -> Option<ParserState> {
        match self.state {
            ParserState::StatusLine => {
                Some(self.fail(ParseErrorKind::StatusLineTooLong.into()))
            },
            ParserState::ChunkSize(_) | ParserState::ChunkEnd(_) => {
                Some(self.fail(ParseErrorKind::ChunkLineTooLong.into()))
            },
            // Header and trailer lines are truncated; the rest of the line is
            // dropped until its terminator.
            ParserState::Headers(_) | ParserState::Trailers(_) => {
                self.line_truncated = true;
                None
            },
            _ => None,
        }
    }

    fn fail(&mut self, err: ParseError) -> ParserState {
        let err = err.at(self.characters_in_message);
        trace_debug!(
            "response parsing disabled in {} state: {}",
            self.state.name(),
            err
        );
        self.last_error = Some(err);
        ParserState::Sink
    }

    fn reached_eof<H>(&mut self, handler: &mut H)
    where
        H: ResponseHandler + ?Sized,
    {
        if let ParserState::CloseDelimited(_) = self.state {
            let end_time = handler.last_data_time();
            self.finish(handler, end_time);
        }
        self.state = ParserState::Sink;
    }

    fn transition(&mut self, next: ParserState) {
        if let Some(limits) = next.line_limits(&self.limits) {
            self.line.reset();
            self.line.reserve(limits.initial);
        }
        self.line_truncated = false;
        self.state = next;
    }
}
