use std::time::{SystemTime, UNIX_EPOCH};

use http::StatusCode;

/// Newtype for nanosecond-precision wall-clock timestamps (nanoseconds since
/// the Unix epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampNs(pub u64);

impl TimestampNs {
    /// Current wall-clock time. A clock set before the epoch reads as zero.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        Self(nanos)
    }

    /// Returns `self - other`, clamped to zero on underflow.
    pub fn saturating_sub(self, other: TimestampNs) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl std::fmt::Display for TimestampNs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl From<u64> for TimestampNs {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<TimestampNs> for u64 {
    fn from(v: TimestampNs) -> Self {
        v.0
    }
}

/// Initial and maximum size of the line buffer for one kind of line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineLimits {
    /// Capacity hint applied when a line of this kind starts
    pub initial: usize,
    /// Longest line accepted before the buffer counts as full
    pub max:     usize,
}

impl LineLimits {
    pub const fn new(initial: usize, max: usize) -> Self {
        Self { initial, max }
    }
}

/// Configurable limits for response parsing.
///
/// These bound the memory a single instrumented stream can hold on to,
/// whatever the peer sends.
#[derive(Debug, Clone)]
pub struct ParserLimits {
    /// Status line. Overflow disables parsing for the stream.
    pub status_line: LineLimits,
    /// Header and trailer lines. Overflow truncates the line and parsing
    /// continues with the next one.
    pub header_line: LineLimits,
    /// Chunk-size lines and the terminator after chunk data. Overflow disables
    /// parsing for the stream.
    pub chunk_line:  LineLimits,
    /// Maximum number of body bytes retained for responses with status >= 400
    /// (0 disables capture)
    pub error_body:  usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            status_line: LineLimits::new(64, 8192),
            header_line: LineLimits::new(128, 8192),
            chunk_line:  LineLimits::new(16, 1024),
            error_body:  8192,
        }
    }
}

/// Framing facts gathered from a response head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    pub status:         StatusCode,
    pub content_length: Option<u64>,
    pub chunked:        bool,
}

impl ResponseHead {
    pub(crate) fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_length: None,
            chunked: false,
        }
    }

    /// 1xx, 204 and 304 responses never carry a body (RFC 7230 §3.3.3).
    pub fn status_forbids_body(&self) -> bool {
        self.status.is_informational()
            || self.status == StatusCode::NO_CONTENT
            || self.status == StatusCode::NOT_MODIFIED
    }

    /// Body bytes of this response are retained for diagnostics.
    pub fn is_error(&self) -> bool {
        self.status.as_u16() >= 400
    }
}

/// The active state of a response parser.
///
/// Each variant owns the data it needs; a transition replaces the whole
/// value. Line-oriented variants accumulate into the parser's line buffer,
/// body variants count bytes without buffering them.
///
/// Transitions:
///   StatusLine → Headers → (StatusLine | FixedBody | ChunkSize | CloseDelimited)
///   ChunkSize → (ChunkData → ChunkEnd → ChunkSize | Trailers → StatusLine)
///   any → Sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserState {
    /// Awaiting `<protocol> <status-code> <reason>`
    StatusLine,
    /// Reading header lines until the blank line
    Headers(ResponseHead),
    /// Counting down a `Content-Length` body
    FixedBody { head: ResponseHead, remaining: u64 },
    /// Awaiting a chunk-size line
    ChunkSize(ResponseHead),
    /// Counting down the data of one chunk
    ChunkData { head: ResponseHead, remaining: u64 },
    /// Awaiting the line terminator that follows chunk data
    ChunkEnd(ResponseHead),
    /// Reading trailer lines after the last chunk
    Trailers(ResponseHead),
    /// Body runs until end of stream
    CloseDelimited(ResponseHead),
    /// Terminal state: all further input is discarded
    Sink,
}

impl ParserState {
    /// Returns true for the terminal state.
    pub fn is_sink(&self) -> bool {
        matches!(self, Self::Sink)
    }

    /// Head of the response being parsed, once its status line was seen.
    pub fn head(&self) -> Option<&ResponseHead> {
        match self {
            Self::Headers(head)
            | Self::ChunkSize(head)
            | Self::ChunkEnd(head)
            | Self::Trailers(head)
            | Self::CloseDelimited(head)
            | Self::FixedBody { head, .. }
            | Self::ChunkData { head, .. } => Some(head),
            Self::StatusLine | Self::Sink => None,
        }
    }

    /// Line buffer limits for line-oriented states, None for body states and
    /// the sink.
    pub(crate) fn line_limits(&self, limits: &ParserLimits) -> Option<LineLimits> {
        match self {
            Self::StatusLine => Some(limits.status_line),
            Self::Headers(_) | Self::Trailers(_) => Some(limits.header_line),
            Self::ChunkSize(_) | Self::ChunkEnd(_) => Some(limits.chunk_line),
            Self::FixedBody { .. }
            | Self::ChunkData { .. }
            | Self::CloseDelimited(_)
            | Self::Sink => None,
        }
    }

    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusLine => "status-line",
            Self::Headers(_) => "headers",
            Self::FixedBody { .. } => "fixed-body",
            Self::ChunkSize(_) => "chunk-size",
            Self::ChunkData { .. } => "chunk-data",
            Self::ChunkEnd(_) => "chunk-end",
            Self::Trailers(_) => "trailers",
            Self::CloseDelimited(_) => "close-delimited",
            Self::Sink => "sink",
        }
    }
}

/// Classification of parse errors (public API)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Status line does not start with an `HTTP/` protocol token
    InvalidProtocol,
    /// Status line has no status code
    MissingStatusCode,
    /// Status code is not three digits in 100..=999
    InvalidStatusCode,
    /// Status line exceeded its maximum buffer size without a terminator
    StatusLineTooLong,
    /// `Content-Length` value is not a decimal integer
    InvalidContentLength,
    /// Chunk-size line is not a hexadecimal integer
    InvalidChunkSize,
    /// Chunk-size line exceeded its maximum buffer size
    ChunkLineTooLong,
    /// Chunk data was not followed by an empty line
    MissingChunkTerminator,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidProtocol => write!(f, "status line does not start with HTTP/"),
            Self::MissingStatusCode => write!(f, "status line has no status code"),
            Self::InvalidStatusCode => write!(f, "invalid status code"),
            Self::StatusLineTooLong => write!(f, "status line exceeds maximum size"),
            Self::InvalidContentLength => write!(f, "invalid Content-Length value"),
            Self::InvalidChunkSize => write!(f, "invalid chunk size"),
            Self::ChunkLineTooLong => write!(f, "chunk-size line exceeds maximum size"),
            Self::MissingChunkTerminator => {
                write!(f, "chunk data not followed by a line terminator")
            },
        }
    }
}

/// Parse error with the position in the message where it was detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// What went wrong
    pub kind:   ParseErrorKind,
    /// Bytes of the current message consumed when the error was detected
    pub offset: Option<u64>,
}

impl ParseError {
    /// Create an error without position information.
    pub fn new(kind: ParseErrorKind) -> Self {
        Self { kind, offset: None }
    }

    /// Attach the message offset at which the error was detected.
    pub fn at(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl From<ParseErrorKind> for ParseError {
    fn from(kind: ParseErrorKind) -> Self {
        Self::new(kind)
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(offset) = self.offset {
            write!(f, "[byte {offset}] {}", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl std::error::Error for ParseError {}
