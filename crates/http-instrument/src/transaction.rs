//! Per-exchange transaction record and connect timing

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use h1stream::TimestampNs;
use http::{Method, StatusCode, Uri};

/// URL scheme of an instrumented connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    /// Scheme conventionally served on `port`
    pub fn for_port(port: u16) -> Self {
        if port == 443 { Self::Https } else { Self::Http }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connect timing of one physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpData {
    pub connect_start: TimestampNs,
    pub connect_end:   TimestampNs,
}

impl TcpData {
    /// Run a connect operation and capture its start and end times.
    ///
    /// ```
    /// use http_instrument::TcpData;
    ///
    /// let (result, timing) = TcpData::measure(|| Ok::<_, std::io::Error>(42));
    /// assert_eq!(result.unwrap(), 42);
    /// assert!(timing.connect_end >= timing.connect_start);
    /// ```
    pub fn measure<T>(connect: impl FnOnce() -> T) -> (T, Self) {
        let connect_start = TimestampNs::now();
        let result = connect();
        let connect_end = TimestampNs::now();
        (
            result,
            Self {
                connect_start,
                connect_end,
            },
        )
    }

    /// Connect duration in nanoseconds
    pub fn duration_ns(&self) -> u64 {
        self.connect_end.saturating_sub(self.connect_start)
    }
}

/// Accumulated metadata of one logical request/response exchange.
///
/// A record starts life as a shell holding request-side data, gains its
/// status and response start when the status line is seen, and is finalized
/// by [`end_transaction`](Self::end_transaction) once the response ends.
/// Every setter is a no-op on a finalized record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionState {
    scheme:            Scheme,
    port:              Option<u16>,
    tls_handshake:     Option<Duration>,
    tcp_connect_start: Option<TimestampNs>,
    tcp_connect_end:   Option<TimestampNs>,

    method:        Option<Method>,
    uri:           Option<Uri>,
    host:          Option<String>,
    request_start: Option<TimestampNs>,
    bytes_sent:    u64,

    status:         Option<StatusCode>,
    response_start: Option<TimestampNs>,
    response_end:   Option<TimestampNs>,
    bytes_received: u64,
    socket_reuse:   bool,
    error:          Option<String>,
    error_body:     Option<Bytes>,
    finalized:      bool,
}

impl TransactionState {
    pub fn new(scheme: Scheme) -> Self {
        Self {
            scheme,
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_tls_handshake(mut self, duration: Option<Duration>) -> Self {
        self.tls_handshake = duration;
        self
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn tls_handshake(&self) -> Option<Duration> {
        self.tls_handshake
    }

    pub fn tcp_connect_start(&self) -> Option<TimestampNs> {
        self.tcp_connect_start
    }

    pub fn tcp_connect_end(&self) -> Option<TimestampNs> {
        self.tcp_connect_end
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn uri(&self) -> Option<&Uri> {
        self.uri.as_ref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn request_start(&self) -> Option<TimestampNs> {
        self.request_start
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn response_start(&self) -> Option<TimestampNs> {
        self.response_start
    }

    pub fn response_end(&self) -> Option<TimestampNs> {
        self.response_end
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn socket_reuse(&self) -> bool {
        self.socket_reuse
    }

    /// Description of the I/O fault that interrupted this exchange
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Captured body of an error response (status >= 400)
    pub fn error_body(&self) -> Option<&Bytes> {
        self.error_body.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Time from the first request byte to the end of the response
    pub fn duration_ns(&self) -> Option<u64> {
        let start = self.request_start.or(self.response_start)?;
        Some(self.response_end?.saturating_sub(start))
    }

    /// Record the request line and host of the exchange.
    pub fn set_request(
        &mut self,
        method: Method,
        uri: Option<Uri>,
        host: Option<String>,
        started: TimestampNs,
    ) {
        if self.finalized {
            return;
        }
        self.method = Some(method);
        self.uri = uri;
        self.host = host;
        self.request_start = Some(started);
    }

    pub fn set_bytes_sent(&mut self, bytes: u64) {
        if !self.finalized {
            self.bytes_sent = bytes;
        }
    }

    /// Copy the request-side fields of a pending shell into this record.
    pub fn merge_request(&mut self, shell: &TransactionState) {
        if self.finalized {
            return;
        }
        self.method = shell.method.clone();
        self.uri = shell.uri.clone();
        self.host = shell.host.clone();
        self.request_start = shell.request_start;
        self.bytes_sent = shell.bytes_sent;
    }

    /// Record the status line. Only the first call on a record has an
    /// effect; returns whether it did.
    pub fn set_status(&mut self, status: StatusCode, at: TimestampNs) -> bool {
        if self.finalized || self.status.is_some() {
            return false;
        }
        self.status = Some(status);
        self.response_start = Some(at);
        true
    }

    pub fn set_tcp_data(&mut self, tcp: &TcpData) {
        if self.finalized {
            return;
        }
        self.tcp_connect_start = Some(tcp.connect_start);
        self.tcp_connect_end = Some(tcp.connect_end);
    }

    pub fn set_bytes_received(&mut self, bytes: u64) {
        if !self.finalized {
            self.bytes_received = bytes;
        }
    }

    pub fn set_socket_reuse(&mut self, reused: bool) {
        if !self.finalized {
            self.socket_reuse = reused;
        }
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        if !self.finalized {
            self.error = Some(error.into());
        }
    }

    pub fn set_error_body(&mut self, body: Bytes) {
        if !self.finalized {
            self.error_body = Some(body);
        }
    }

    /// Finalize the record with its response end time, `now` unless
    /// `end_time` is given. Returns false if the record was already final.
    pub fn end_transaction(&mut self, end_time: Option<TimestampNs>) -> bool {
        if self.finalized {
            return false;
        }
        self.response_end = Some(end_time.unwrap_or_else(TimestampNs::now));
        self.finalized = true;
        true
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{method} ")?,
            None => f.write_str("? ")?,
        }
        match (&self.host, &self.uri) {
            (Some(host), Some(uri)) => write!(f, "{}://{host}{uri}", self.scheme)?,
            (None, Some(uri)) => write!(f, "{uri}")?,
            _ => write!(f, "{}://?", self.scheme)?,
        }
        match self.status {
            Some(status) => write!(f, " -> {}", status.as_u16())?,
            None => f.write_str(" -> ?")?,
        }
        write!(f, " ({} bytes)", self.bytes_received)?;
        if let Some(ns) = self.duration_ns() {
            write!(f, " in {:.2}ms", ns as f64 / 1_000_000.0)?;
        }
        if self.socket_reuse {
            f.write_str(" [reused]")?;
        }
        Ok(())
    }
}
