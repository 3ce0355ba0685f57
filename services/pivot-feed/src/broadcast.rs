//! Broadcaster: fan-out of filtered snapshots to subscribers
//!
//! Consumes the store's update notifications and, for each update, pushes
//! exactly one filtered snapshot to every currently subscribed connection —
//! whether or not that connection's view actually changed. Each push is
//! filtered independently against the snapshot carried by the notification,
//! so all connections observe the same post-update state and no connection
//! can block or contaminate another's payload.
//!
//! The broadcaster also owns the subscribe boundary: raw payloads from the
//! transport are schema-validated here before they reach the registry, and
//! a successful first subscribe is answered immediately with one snapshot.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::events::{StoreUpdate, TickerSnapshot};
use crate::query::SubscribeRequest;
use crate::store::TickerStore;
use crate::subscriptions::{ConnectionId, SubscribeOutcome, SubscriptionRegistry};

/// Errors surfaced to the transport at the subscribe boundary.
///
/// Both are recoverable: the connection stays Unsubscribed and may retry.
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("malformed subscribe payload: {0}")]
    MalformedPayload(String),

    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}

/// Fans out store updates to subscribed connections.
///
/// Holds the store and registry by explicit injection; there is no ambient
/// global state.
pub struct Broadcaster {
    store: Arc<TickerStore>,
    registry: Arc<SubscriptionRegistry>,
}

impl Broadcaster {
    pub fn new(store: Arc<TickerStore>, registry: Arc<SubscriptionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Handle a raw subscribe payload from the transport.
    ///
    /// Malformed payloads are rejected before reaching the registry; the
    /// connection stays Unsubscribed. The first accepted query triggers an
    /// immediate snapshot push; repeat subscribes are ignored.
    pub fn handle_subscribe(&self, id: ConnectionId, raw: &str) -> Result<(), SubscribeError> {
        let request = SubscribeRequest::parse(raw).map_err(|err| {
            warn!(%id, error = %err, "Dropping malformed subscribe payload");
            SubscribeError::MalformedPayload(err.to_string())
        })?;

        match self.registry.subscribe(id, request.into_query()) {
            SubscribeOutcome::Subscribed => {
                self.push_current_snapshot(id);
                Ok(())
            }
            SubscribeOutcome::AlreadySubscribed => {
                // First query wins; nothing to do.
                Ok(())
            }
            SubscribeOutcome::UnknownConnection => {
                warn!(%id, "Subscribe for unregistered connection");
                Err(SubscribeError::UnknownConnection(id))
            }
        }
    }

    /// Handle a transport disconnect. Idempotent.
    pub fn handle_disconnect(&self, id: ConnectionId) {
        self.registry.disconnect(id);
    }

    /// Push the store's current state to one subscribed connection.
    fn push_current_snapshot(&self, id: ConnectionId) {
        // The connection may have disconnected between subscribe and here;
        // that makes this a no-op, same as any push to a gone connection.
        if let Some((query, sender)) = self.registry.subscribed_connection(id) {
            let snapshot = TickerSnapshot {
                revision: self.store.revision(),
                tickers: query.apply(&self.store.snapshot()),
            };
            if sender.send(snapshot).is_err() {
                debug!(%id, "Initial push skipped; connection is gone");
            }
        }
    }

    /// Fan one update out: exactly one push per subscribed connection, each
    /// filtered from the update's own snapshot.
    pub fn broadcast_update(&self, update: &StoreUpdate) {
        let connections = self.registry.subscribed();
        debug!(
            revision = update.revision,
            symbol = %update.symbol,
            connections = connections.len(),
            "Fanning out store update"
        );

        for (id, query, sender) in connections {
            let snapshot = TickerSnapshot {
                revision: update.revision,
                tickers: query.apply(&update.snapshot),
            };
            if sender.send(snapshot).is_err() {
                // Pruning happens at the disconnect event, not here.
                debug!(%id, revision = update.revision, "Push skipped; connection is gone");
            }
        }
    }

    /// Consume update notifications until the store is dropped.
    ///
    /// The receiver comes from `TickerStore::subscribe_updates`, registered
    /// exactly once at startup before any update of interest.
    pub async fn run(&self, mut updates: broadcast::Receiver<StoreUpdate>) {
        info!("Broadcaster started");
        loop {
            match updates.recv().await {
                Ok(update) => self.broadcast_update(&update),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Broadcaster lagged behind store updates");
                }
                Err(RecvError::Closed) => {
                    info!("Store update feed closed; broadcaster stopping");
                    break;
                }
            }
        }
    }
}
