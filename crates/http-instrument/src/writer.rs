//! Request-side stream decoration

use std::io::{self, Write};
use std::sync::Arc;

use bytes::BytesMut;
use h1stream::TimestampNs;
use http::{Method, Uri};
use http::header::{CONTENT_LENGTH, HOST, TRANSFER_ENCODING};

use crate::connection::MonitoredConnection;
use crate::event::{StreamEvent, StreamFault, StreamListener, StreamListeners};

/// Where the writer is within the outbound byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Accumulating a request head
    Head,
    /// Skipping a body framed by `Content-Length`
    Body { remaining: u64 },
    /// Request observation stopped for this stream
    Disabled,
}

/// How the body of a parsed request is framed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestBody {
    Length(u64),
    Chunked,
}

/// The parts of a request head a shell is built from
#[derive(Debug)]
struct RequestHead {
    len:    usize,
    method: Method,
    uri:    Option<Uri>,
    host:   Option<String>,
    body:   RequestBody,
}

/// Parse a complete request head at the start of `buf`. `Ok(None)` means
/// more bytes are needed.
fn parse_request_head(buf: &[u8]) -> Result<Option<RequestHead>, httparse::Error> {
    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut headers);

    let len = match req.parse(buf)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    let method = req
        .method
        .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
        .ok_or(httparse::Error::Token)?;
    let uri = req.path.and_then(|p| p.parse::<Uri>().ok());

    let mut host = None;
    let mut body = RequestBody::Length(0);
    for h in req.headers.iter() {
        if h.name.eq_ignore_ascii_case(HOST.as_str()) {
            host = std::str::from_utf8(h.value).ok().map(|v| v.trim().to_string());
        } else if h.name.eq_ignore_ascii_case(TRANSFER_ENCODING.as_str()) {
            if String::from_utf8_lossy(h.value)
                .to_ascii_lowercase()
                .contains("chunked")
            {
                body = RequestBody::Chunked;
            }
        } else if h.name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str())
            && body != RequestBody::Chunked
        {
            let n = std::str::from_utf8(h.value)
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .ok_or(httparse::Error::HeaderValue)?;
            body = RequestBody::Length(n);
        }
    }

    Ok(Some(RequestHead {
        len,
        method,
        uri,
        host,
        body,
    }))
}

/// Decorates the outbound half of a connection.
///
/// Every write is forwarded to the inner stream unchanged. The bytes the
/// inner stream accepted are scanned for request heads; each one becomes a
/// shell carrying the request line, host and connection metadata, enqueued
/// in the connection's cache for the response side to pick up. Bodies framed
/// by `Content-Length` are skipped so pipelined requests are all seen. A
/// chunked body, an unparseable head, or a head larger than the configured
/// maximum stops observation for the rest of the stream.
#[derive(Debug)]
pub struct ParsingWriter<W> {
    inner:      W,
    connection: Arc<MonitoredConnection>,
    state:      RequestState,
    head:       BytesMut,
    /// When the first byte of the current head was written
    started:    Option<TimestampNs>,
    listeners:  StreamListeners,
}

impl<W> ParsingWriter<W> {
    pub fn new(inner: W, connection: Arc<MonitoredConnection>) -> Self {
        Self {
            inner,
            connection,
            state: RequestState::Head,
            head: BytesMut::new(),
            started: None,
            listeners: StreamListeners::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn StreamListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&mut self, listener: &Arc<dyn StreamListener>) -> bool {
        self.listeners.remove(listener)
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Writing through this reference bypasses instrumentation.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Scan bytes the inner stream accepted.
    fn observe(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            match self.state {
                RequestState::Disabled => return,
                RequestState::Body { remaining } => {
                    let n = remaining.min(data.len() as u64);
                    data = &data[n as usize..];
                    self.state = if n == remaining {
                        RequestState::Head
                    } else {
                        RequestState::Body {
                            remaining: remaining - n,
                        }
                    };
                },
                RequestState::Head => {
                    let used = self.observe_head(data);
                    data = &data[used..];
                },
            }
        }
    }

    /// Append to the head buffer and try to complete the head. Returns how
    /// many bytes of `data` belong to the head.
    fn observe_head(&mut self, data: &[u8]) -> usize {
        let before = self.head.len();
        if before == 0 {
            self.started = Some(TimestampNs::now());
        }
        // One byte past the limit is enough to tell the head is too large
        let room = (self.connection.config().max_request_head + 1).saturating_sub(before);
        let take = room.min(data.len());
        self.head.extend_from_slice(&data[..take]);

        match parse_request_head(&self.head) {
            Ok(Some(head)) => {
                let used = head.len - before;
                self.head.clear();
                self.request_found(head);
                used
            },
            Ok(None) if self.head.len() > self.connection.config().max_request_head => {
                self.disable("request head exceeds limit");
                data.len()
            },
            Ok(None) => take,
            Err(_e) => {
                self.disable("malformed request head");
                data.len()
            },
        }
    }

    fn request_found(&mut self, head: RequestHead) {
        let mut shell = self.connection.create_shell();
        shell.set_request(
            head.method,
            head.uri,
            head.host,
            self.started.take().unwrap_or_else(TimestampNs::now),
        );

        match head.body {
            RequestBody::Length(n) => {
                shell.set_bytes_sent(head.len as u64 + n);
                self.state = if n == 0 {
                    RequestState::Head
                } else {
                    RequestState::Body { remaining: n }
                };
            },
            RequestBody::Chunked => {
                shell.set_bytes_sent(head.len as u64);
                self.disable("chunked request body");
            },
        }

        self.connection.cache().enqueue(self.connection.id(), shell);
    }

    fn disable(&mut self, _reason: &str) {
        crate::trace_debug!(
            "{}: request observation stopped: {_reason}",
            self.connection.id()
        );
        self.state = RequestState::Disabled;
        self.head = BytesMut::new();
        self.started = None;
    }

    fn observe_error(&mut self, err: &io::Error) {
        if matches!(
            err.kind(),
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
        ) {
            return;
        }
        let fault = StreamFault::from(err);
        crate::trace_warn!("{}: stream error: {fault}", self.connection.id());
        let mut record = self.connection.create_shell();
        record.set_error(fault.to_string());
        self.listeners.notify(&StreamEvent::error(record, fault));
    }
}

impl<W: Write> Write for ParsingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.write(buf) {
            Ok(n) => {
                self.observe(&buf[..n]);
                Ok(n)
            },
            Err(err) => {
                self.observe_error(&err);
                Err(err)
            },
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().inspect_err(|err| self.observe_error(err))
    }
}
