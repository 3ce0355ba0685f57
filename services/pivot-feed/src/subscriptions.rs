//! Subscription registry: per-connection write-once filter queries
//!
//! Each transport connection registers once with an outbound push sender,
//! then moves through a two-state machine: Unsubscribed → Subscribed,
//! terminal until disconnect. The first successfully parsed query wins for
//! the connection's lifetime; later subscribe attempts are ignored. This
//! write-once contract is deliberate, not an accident to repair.
//!
//! Query assignment is a single check-and-set under the registry lock, so
//! two near-simultaneous subscribe messages cannot both succeed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::TickerSnapshot;
use crate::query::SubscriptionQuery;

/// Unique identifier for one transport connection.
///
/// Uses UUID v7 so connection IDs sort by connect time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new ConnectionId with the current timestamp.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound push channel for one connection. The transport owns the
/// receiving end; a closed receiver turns pushes into no-ops.
pub type PushSender = mpsc::UnboundedSender<TickerSnapshot>;

/// One open connection: a push channel plus at most one query.
#[derive(Debug)]
pub struct ClientConnection {
    id: ConnectionId,
    sender: PushSender,
    /// Write-once; `None` until the first valid subscribe.
    query: Option<SubscriptionQuery>,
}

impl ClientConnection {
    fn new(id: ConnectionId, sender: PushSender) -> Self {
        Self {
            id,
            sender,
            query: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_subscribed(&self) -> bool {
        self.query.is_some()
    }

    pub fn query(&self) -> Option<&SubscriptionQuery> {
        self.query.as_ref()
    }
}

/// Outcome of a subscribe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// Query accepted; the connection is now Subscribed.
    Subscribed,
    /// The connection already holds a query; this attempt was ignored.
    AlreadySubscribed,
    /// No such connection is registered.
    UnknownConnection,
}

/// Tracks all connections and their write-once queries.
///
/// Uses a BTreeMap for deterministic iteration order.
pub struct SubscriptionRegistry {
    connections: Mutex<BTreeMap<ConnectionId, ClientConnection>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a newly connected client.
    ///
    /// A duplicate register for a live connection is ignored; the original
    /// channel keeps serving it.
    pub fn register(&self, id: ConnectionId, sender: PushSender) {
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if connections.contains_key(&id) {
            warn!(%id, "Duplicate connection register ignored");
            return;
        }
        connections.insert(id, ClientConnection::new(id, sender));
        info!(%id, connections = connections.len(), "Connection registered");
    }

    /// Remove a connection. Idempotent; returns whether it was present.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = connections.remove(&id).is_some();
        if removed {
            info!(%id, connections = connections.len(), "Connection removed");
        }
        removed
    }

    /// Atomically assign a query to a connection if it has none yet.
    pub fn subscribe(&self, id: ConnectionId, query: SubscriptionQuery) -> SubscribeOutcome {
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match connections.get_mut(&id) {
            None => SubscribeOutcome::UnknownConnection,
            Some(connection) => {
                if connection.query.is_some() {
                    debug!(%id, "Subscribe ignored; query is write-once");
                    SubscribeOutcome::AlreadySubscribed
                } else {
                    connection.query = Some(query);
                    info!(%id, "Connection subscribed");
                    SubscribeOutcome::Subscribed
                }
            }
        }
    }

    /// Query and push channel for one subscribed connection.
    pub fn subscribed_connection(
        &self,
        id: ConnectionId,
    ) -> Option<(SubscriptionQuery, PushSender)> {
        let connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let connection = connections.get(&id)?;
        let query = connection.query.clone()?;
        Some((query, connection.sender.clone()))
    }

    /// All currently subscribed connections with their queries and
    /// push channels.
    pub fn subscribed(&self) -> Vec<(ConnectionId, SubscriptionQuery, PushSender)> {
        let connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        connections
            .values()
            .filter_map(|connection| {
                let query = connection.query.clone()?;
                Some((connection.id, query, connection.sender.clone()))
            })
            .collect()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        let connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        connections.len()
    }

    /// Number of connections that hold a query.
    pub fn subscribed_count(&self) -> usize {
        let connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        connections
            .values()
            .filter(|connection| connection.is_subscribed())
            .count()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
