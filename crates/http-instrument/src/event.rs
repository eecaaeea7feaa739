//! Completion and failure events for instrumented streams

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::transaction::TransactionState;

/// An I/O fault observed on an instrumented stream.
///
/// The original error is handed back to the caller unchanged; listeners get
/// this owned description of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFault {
    pub kind:    io::ErrorKind,
    pub message: String,
}

impl From<&io::Error> for StreamFault {
    fn from(err: &io::Error) -> Self {
        Self {
            kind:    err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for StreamFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StreamFault {}

/// A finished transaction, or the state of one interrupted by an I/O fault
#[derive(Debug, Clone)]
pub struct StreamEvent {
    transaction: TransactionState,
    fault:       Option<StreamFault>,
}

impl StreamEvent {
    pub fn complete(transaction: TransactionState) -> Self {
        Self {
            transaction,
            fault: None,
        }
    }

    pub fn error(transaction: TransactionState, fault: StreamFault) -> Self {
        Self {
            transaction,
            fault: Some(fault),
        }
    }

    pub fn transaction(&self) -> &TransactionState {
        &self.transaction
    }

    pub fn into_transaction(self) -> TransactionState {
        self.transaction
    }

    pub fn fault(&self) -> Option<&StreamFault> {
        self.fault.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.fault.is_some()
    }
}

/// Subscriber to the events of instrumented streams.
///
/// Callbacks run synchronously on the thread that drives the stream.
pub trait StreamListener: Send + Sync {
    fn stream_complete(&self, event: &StreamEvent);

    fn stream_error(&self, event: &StreamEvent);
}

/// The listeners registered on one stream
#[derive(Clone, Default)]
pub struct StreamListeners {
    listeners: Vec<Arc<dyn StreamListener>>,
}

impl StreamListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Arc<dyn StreamListener>) {
        self.listeners.push(listener);
    }

    /// Unregister a listener previously added, compared by identity. Returns
    /// whether it was registered.
    pub fn remove(&mut self, listener: &Arc<dyn StreamListener>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `event` to every listener, as a completion or an error
    /// depending on the event.
    pub fn notify(&self, event: &StreamEvent) {
        for listener in &self.listeners {
            if event.is_error() {
                listener.stream_error(event);
            } else {
                listener.stream_complete(event);
            }
        }
    }
}

impl fmt::Debug for StreamListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Listener collecting every event it receives, in order.
///
/// Useful as a sink for reporting pipelines that drain events in batches.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: std::sync::Mutex<Vec<StreamEvent>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the events collected so far.
    pub fn drain(&self) -> Vec<StreamEvent> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *events)
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, event: &StreamEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}

impl StreamListener for EventCollector {
    fn stream_complete(&self, event: &StreamEvent) {
        self.push(event);
    }

    fn stream_error(&self, event: &StreamEvent) {
        self.push(event);
    }
}
