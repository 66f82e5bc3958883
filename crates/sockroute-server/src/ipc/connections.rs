use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::ipc::types::{ConnectionId, Outbound};

/// One connection's outbound queue sender.
///
/// The queue is drained by a single writer task, so frames queued for the
/// same connection are written one after another, never interleaved.
#[derive(Clone, Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub tx: mpsc::UnboundedSender<Outbound>,
}

/// Connection registry: `connection_id -> Connection`.
///
/// Ids start at 1 and are never reused for the lifetime of a server.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
    seq: AtomicU64,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    /// Allocate an id and register the connection's outbound queue.
    pub fn insert(&self, tx: mpsc::UnboundedSender<Outbound>) -> ConnectionId {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        self.connections.insert(id, Connection { id, tx });
        id
    }

    pub fn remove(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id).map(|(_, conn)| conn)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.get(&id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }
}
