//! Cross-stream correlation of request shells and connect timing

use std::collections::VecDeque;
use std::fmt;

use dashmap::DashMap;

use crate::transaction::{TcpData, TransactionState};

/// Reused-record snapshots kept per connection; older ones are dropped.
pub const MAX_REUSED_SNAPSHOTS: usize = 32;

/// Identity of a logical connection: the pair of instrumented streams that
/// carries one sequence of exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Low-level handle of a physical connection (file descriptor or socket
/// handle). Several logical connections can share one handle when TLS is
/// layered over an instrumented socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(pub u64);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

impl From<u64> for ConnectionHandle {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Shared store stitching request-side shells and connect timing into the
/// records completed on the response side.
///
/// Each map is a `DashMap`, so different connections only contend on a
/// shard lock and operations on one connection's queue are linearizable.
/// Nothing here blocks waiting for an entry: lookups return `None` when
/// absent. Construct one per process (or per test) and share it with `Arc`.
#[derive(Debug, Default)]
pub struct TransactionsCache {
    /// Shells enqueued by request writers, oldest first
    pending:  DashMap<ConnectionId, VecDeque<TransactionState>>,
    /// Connect timing by physical connection
    tcp_data: DashMap<ConnectionHandle, TcpData>,
    /// Snapshots of records completed on reused connections
    reused:   DashMap<ConnectionId, VecDeque<TransactionState>>,
}

impl TransactionsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pending shell to the connection's queue.
    pub fn enqueue(&self, id: ConnectionId, shell: TransactionState) {
        let mut queue = self.pending.entry(id).or_default();
        queue.push_back(shell);
        crate::trace_debug!("{id}: enqueued shell, {} pending", queue.len());
    }

    /// Take the oldest pending shell for the connection.
    pub fn dequeue(&self, id: ConnectionId) -> Option<TransactionState> {
        let shell = self.pending.get_mut(&id)?.pop_front();
        // Drop the queue once drained, unless a writer refilled it meanwhile
        self.pending.remove_if(&id, |_, queue| queue.is_empty());
        shell
    }

    /// Number of shells waiting for the connection's responses
    pub fn pending_len(&self, id: ConnectionId) -> usize {
        self.pending.get(&id).map_or(0, |queue| queue.len())
    }

    /// Store the connect timing of a physical connection, replacing any
    /// earlier value.
    pub fn set_tcp_data(&self, handle: ConnectionHandle, data: TcpData) {
        self.tcp_data.insert(handle, data);
    }

    pub fn get_tcp_data(&self, handle: ConnectionHandle) -> Option<TcpData> {
        self.tcp_data.get(&handle).map(|entry| *entry)
    }

    pub fn remove_tcp_data(&self, handle: ConnectionHandle) -> Option<TcpData> {
        self.tcp_data.remove(&handle).map(|(_, data)| data)
    }

    /// Publish a snapshot of a record completed on a reused connection, for
    /// the request side to merge. Only the latest [`MAX_REUSED_SNAPSHOTS`]
    /// are kept.
    pub fn publish_reused(&self, id: ConnectionId, record: TransactionState) {
        let mut queue = self.reused.entry(id).or_default();
        if queue.len() == MAX_REUSED_SNAPSHOTS {
            queue.pop_front();
        }
        queue.push_back(record);
    }

    /// Number of reused-record snapshots held for the connection
    pub fn reused_len(&self, id: ConnectionId) -> usize {
        self.reused.get(&id).map_or(0, |queue| queue.len())
    }

    /// Take the oldest snapshot published for the connection.
    pub fn take_reused(&self, id: ConnectionId) -> Option<TransactionState> {
        let record = self.reused.get_mut(&id)?.pop_front();
        self.reused.remove_if(&id, |_, queue| queue.is_empty());
        record
    }

    /// Forget everything queued for a logical connection. Returns the shells
    /// that were never answered.
    pub fn remove_connection(&self, id: ConnectionId) -> Vec<TransactionState> {
        self.reused.remove(&id);
        self.pending
            .remove(&id)
            .map(|(_, queue)| queue.into())
            .unwrap_or_default()
    }

    /// Total number of pending shells across connections
    pub fn len(&self) -> usize {
        self.pending.iter().map(|entry| entry.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
