//! Per-connection metadata shared by an instrumented reader and writer

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{ConnectionHandle, ConnectionId, TransactionsCache};
use crate::config::InstrumentConfig;
use crate::event::StreamListener;
use crate::reader::ParsingReader;
use crate::transaction::{Scheme, TcpData, TransactionState};
use crate::writer::ParsingWriter;

/// A logical connection whose streams are being instrumented.
///
/// Build one per connection, measure the connect and TLS handshake through
/// it, then wrap it in an `Arc` and decorate the connection's streams with
/// [`reader`](Self::reader) and [`writer`](Self::writer).
#[derive(Debug, Clone)]
pub struct MonitoredConnection {
    id:            ConnectionId,
    handle:        Option<ConnectionHandle>,
    scheme:        Scheme,
    port:          u16,
    tls_handshake: Option<Duration>,
    cache:         Arc<TransactionsCache>,
    config:        Arc<InstrumentConfig>,
}

impl MonitoredConnection {
    /// The scheme defaults to https on port 443 and http elsewhere.
    pub fn new(id: ConnectionId, port: u16, cache: Arc<TransactionsCache>) -> Self {
        Self {
            id,
            handle: None,
            scheme: Scheme::for_port(port),
            port,
            tls_handshake: None,
            cache,
            config: Arc::new(InstrumentConfig::default()),
        }
    }

    pub fn with_handle(mut self, handle: ConnectionHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_config(mut self, config: Arc<InstrumentConfig>) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn handle(&self) -> Option<ConnectionHandle> {
        self.handle
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn tls_handshake(&self) -> Option<Duration> {
        self.tls_handshake
    }

    pub fn cache(&self) -> &TransactionsCache {
        &self.cache
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    /// Run the TLS handshake and keep its duration for the connection's
    /// records. The duration is recorded whether or not the handshake
    /// succeeds.
    pub fn measure_handshake<T>(&mut self, handshake: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = handshake();
        let elapsed = started.elapsed();
        crate::trace_debug!("{}: TLS handshake took {elapsed:?}", self.id);
        self.tls_handshake = Some(elapsed);
        result
    }

    pub fn set_tls_handshake(&mut self, duration: Duration) {
        self.tls_handshake = Some(duration);
    }

    /// Store connect timing for the connection's handle, where the first
    /// secure response on it will pick it up.
    pub fn record_connect(&self, data: TcpData) {
        match self.handle {
            Some(handle) => self.cache.set_tcp_data(handle, data),
            None => {
                crate::trace_debug!("{}: no handle, connect timing dropped", self.id);
            },
        }
    }

    /// A fresh shell carrying this connection's metadata
    pub fn create_shell(&self) -> TransactionState {
        TransactionState::new(self.scheme)
            .with_port(self.port)
            .with_tls_handshake(self.tls_handshake)
    }

    /// A record for a later exchange on the connection; the handshake
    /// belongs to the first one only.
    pub fn reused_shell(&self) -> TransactionState {
        TransactionState::new(self.scheme).with_port(self.port)
    }

    /// Decorate the connection's inbound stream.
    pub fn reader<R>(self: &Arc<Self>, inner: R) -> ParsingReader<R> {
        ParsingReader::new(inner, Arc::clone(self))
    }

    /// Decorate the connection's outbound stream.
    pub fn writer<W>(self: &Arc<Self>, inner: W) -> ParsingWriter<W> {
        ParsingWriter::new(inner, Arc::clone(self))
    }

    /// Decorate both streams and register `listener` on each.
    pub fn split<R, W>(
        self: &Arc<Self>,
        reader: R,
        writer: W,
        listener: Arc<dyn StreamListener>,
    ) -> (ParsingReader<R>, ParsingWriter<W>) {
        let mut reader = self.reader(reader);
        let mut writer = self.writer(writer);
        reader.add_listener(Arc::clone(&listener));
        writer.add_listener(listener);
        (reader, writer)
    }
}
