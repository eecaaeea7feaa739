//! Transaction bookkeeping driven by response parser callbacks

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use h1stream::{ResponseHandler, TimestampNs};
use http::{Method, StatusCode};

use crate::connection::MonitoredConnection;
use crate::event::{StreamEvent, StreamFault, StreamListeners};
use crate::transaction::{Scheme, TransactionState};

/// Owner of the in-flight transaction of one inbound stream.
///
/// Receives the parser's callbacks, fills in the current
/// [`TransactionState`], correlates it with the request shells and connect
/// timing held in the connection's [`TransactionsCache`], and publishes
/// each finished record to the stream's listeners.
///
/// [`TransactionsCache`]: crate::TransactionsCache
#[derive(Debug)]
pub struct ResponseTracker {
    connection:    Arc<MonitoredConnection>,
    transaction:   Option<TransactionState>,
    /// Responses finished on this stream
    read_count:    u64,
    last_data:     Option<TimestampNs>,
    /// The message being parsed is an interim (1xx) response
    interim:       bool,
    /// When the first interim response of the exchange began
    interim_start: Option<TimestampNs>,
    /// Bytes of interim responses carried into the final one
    interim_bytes: u64,
    listeners:     StreamListeners,
}

impl ResponseTracker {
    pub fn new(connection: Arc<MonitoredConnection>) -> Self {
        Self {
            connection,
            transaction: None,
            read_count: 0,
            last_data: None,
            interim: false,
            interim_start: None,
            interim_bytes: 0,
            listeners: StreamListeners::new(),
        }
    }

    pub fn connection(&self) -> &MonitoredConnection {
        &self.connection
    }

    /// Number of responses finished so far
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// The in-flight record, if one has been started
    pub fn current(&self) -> Option<&TransactionState> {
        self.transaction.as_ref()
    }

    pub fn listeners(&self) -> &StreamListeners {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut StreamListeners {
        &mut self.listeners
    }

    /// The in-flight record, taking the next pending shell from the cache
    /// on first access.
    pub fn transaction_state(&mut self) -> &mut TransactionState {
        let record = match self.transaction.take() {
            Some(record) => record,
            None => self.next_shell(),
        };
        self.transaction.insert(record)
    }

    fn next_shell(&self) -> TransactionState {
        let connection = &self.connection;
        connection
            .cache()
            .dequeue(connection.id())
            .unwrap_or_else(|| {
                crate::trace_warn!("{}: no pending shell for response", connection.id());
                connection.create_shell()
            })
    }

    /// A record for a later response on the connection, carrying the request
    /// fields of `shell` or of the next pending shell.
    fn reused_record(&self, shell: Option<TransactionState>) -> TransactionState {
        let connection = &self.connection;
        let mut record = connection.reused_shell();
        if let Some(shell) = shell.or_else(|| connection.cache().dequeue(connection.id())) {
            record.merge_request(&shell);
        }
        record.set_socket_reuse(true);
        record
    }

    /// Forget whatever the cache still holds for this connection: request
    /// shells that will never be answered and reused-record snapshots.
    pub fn release(&mut self) {
        let _unanswered = self.connection.cache().remove_connection(self.connection.id());
        crate::trace_debug!(
            "{}: released, {} request(s) unanswered",
            self.connection.id(),
            _unanswered.len()
        );
    }

    /// Note that response bytes were read at `at`.
    pub fn record_read(&mut self, at: TimestampNs) {
        self.last_data = Some(at);
    }

    /// Whether the in-flight record was interrupted by an I/O fault
    pub fn has_error(&self) -> bool {
        self.transaction
            .as_ref()
            .is_some_and(|t| t.error().is_some())
    }

    /// Publish an I/O fault with whatever the in-flight record holds.
    pub fn stream_error(&mut self, err: &io::Error) {
        let fault = StreamFault::from(err);
        crate::trace_warn!("{}: stream error: {fault}", self.connection.id());
        let record = self.transaction_state();
        record.set_error(fault.to_string());
        let event = StreamEvent::error(record.clone(), fault);
        self.listeners.notify(&event);
    }

    /// Connect timing for the first exchange of a secure connection
    fn merge_tcp_data(&self, record: &mut TransactionState) {
        let Some(handle) = self.connection.handle() else {
            crate::trace_warn!("{}: no handle to look up connect timing", self.connection.id());
            return;
        };
        match self.connection.cache().get_tcp_data(handle) {
            Some(tcp) => record.set_tcp_data(&tcp),
            None => {
                crate::trace_warn!("{}: no connect timing cached for {handle}", self.connection.id());
            },
        }
    }
}

impl ResponseHandler for ResponseTracker {
    fn status_line_found(&mut self, status: StatusCode) {
        let start = *self.interim_start.get_or_insert_with(TimestampNs::now);
        // A record still without a status belongs to this exchange: it
        // followed an interim response or a transient read fault.
        let in_flight = self.transaction.take().filter(|t| t.status().is_none());
        let record = match in_flight {
            Some(record) if self.read_count == 0 => record,
            in_flight if self.read_count >= 1 => self.reused_record(in_flight),
            _ => self.next_shell(),
        };
        let record = self.transaction.insert(record);

        if is_interim(status) {
            crate::trace_debug!("{}: interim response {status}", self.connection.id());
            self.interim = true;
            return;
        }
        record.set_status(status, start);
        self.interim_start = None;
    }

    fn append_body(&mut self, body: &[u8]) {
        let record = self.transaction_state();
        if record.status().is_some_and(|s| s.as_u16() >= 400) {
            crate::trace_debug!("error response body: {}", String::from_utf8_lossy(body));
            record.set_error_body(Bytes::copy_from_slice(body));
        }
    }

    fn finished_message(&mut self, bytes_received: u64, end_time: Option<TimestampNs>) {
        if std::mem::take(&mut self.interim) {
            self.interim_bytes += bytes_received;
            return;
        }
        let Some(mut record) = self.transaction.take() else {
            return;
        };
        self.read_count += 1;
        if self.read_count == 1 && record.scheme() == Scheme::Https {
            self.merge_tcp_data(&mut record);
        }
        if self.read_count > 1 {
            record.set_socket_reuse(true);
        }
        record.set_bytes_received(std::mem::take(&mut self.interim_bytes) + bytes_received);
        record.end_transaction(end_time);
        if self.read_count > 1 {
            self.connection
                .cache()
                .publish_reused(self.connection.id(), record.clone());
        }
        crate::trace_debug!("{}: {record}", self.connection.id());
        self.listeners.notify(&StreamEvent::complete(record));
    }

    fn request_method(&mut self) -> Option<Method> {
        self.transaction_state().method().cloned()
    }

    fn last_data_time(&self) -> Option<TimestampNs> {
        self.last_data
    }
}

impl Drop for ResponseTracker {
    fn drop(&mut self) {
        self.release();
    }
}

/// A 1xx response other than `101 Switching Protocols`, which ends HTTP on
/// the connection.
fn is_interim(status: StatusCode) -> bool {
    status.is_informational() && status != StatusCode::SWITCHING_PROTOCOLS
}
