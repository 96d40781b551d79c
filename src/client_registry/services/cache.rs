//! Keyed, memoised connection cache.
//!
//! Each identifier maps to at most one slot. A slot is either a shared
//! in-flight attempt or a connected client. The map lock is only held for
//! synchronous edits; attempts run outside it, so slow connects for one
//! server never block callers of another.

use super::{ClientRegistryError, ReleaseFailure};
use crate::client_registry::{
    domain::{ConnectionState, ServerId},
    ports::{ClientTransport, McpClient},
};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Final outcome of one connect attempt, shared by every waiter.
pub(super) type AttemptOutcome<C> = Result<Arc<C>, ClientRegistryError>;

/// Single-assignment handle to an in-flight connect attempt.
pub(super) type SharedAttempt<C> = Shared<BoxFuture<'static, AttemptOutcome<C>>>;

/// A connected client together with the transport it was built on.
pub(super) struct Connection<C> {
    pub(super) client: Arc<C>,
    pub(super) transport: Arc<dyn ClientTransport>,
    pub(super) connected_at: DateTime<Utc>,
}

impl<C: McpClient> Connection<C> {
    /// Closes the client, then its transport, collecting every failure.
    pub(super) async fn release(self, server_id: &ServerId) -> Vec<ReleaseFailure> {
        let mut failures = Vec::new();
        if let Err(source) = self.client.close().await {
            failures.push(ReleaseFailure::Client {
                server_id: server_id.clone(),
                source,
            });
        }
        if let Err(source) = self.transport.close().await {
            failures.push(ReleaseFailure::Transport {
                server_id: server_id.clone(),
                source,
            });
        }
        failures
    }
}

enum Slot<C> {
    Connecting {
        generation: u64,
        attempt: SharedAttempt<C>,
    },
    Connected(Connection<C>),
}

struct CacheState<C> {
    closed: bool,
    next_generation: u64,
    slots: HashMap<ServerId, Slot<C>>,
    late_failures: Vec<ReleaseFailure>,
}

/// What a caller found (or started) for an identifier.
pub(super) enum Lookup<C> {
    /// A cached client.
    Connected(Arc<C>),
    /// An attempt to await; possibly one this caller just started.
    Connecting(SharedAttempt<C>),
}

/// Result of recording an attempt's outcome.
pub(super) enum Settled<C> {
    /// The client is now cached.
    Stored(Arc<C>),
    /// The cache no longer expects this attempt; the caller must release it.
    Rejected(Connection<C>),
    /// The attempt failed and its slot was cleared for a later retry.
    Failed(ClientRegistryError),
}

/// Everything the cache held when it was closed.
pub(super) struct Drained<C> {
    pub(super) pending: Vec<(ServerId, SharedAttempt<C>)>,
    pub(super) connected: Vec<(ServerId, Connection<C>)>,
}

pub(super) struct ConnectionCache<C> {
    state: Mutex<CacheState<C>>,
}

impl<C> ConnectionCache<C> {
    pub(super) fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                closed: false,
                next_generation: 0,
                slots: HashMap::new(),
                late_failures: Vec::new(),
            }),
        }
    }

    /// Returns the cached client or pending attempt for `server_id`, calling
    /// `start` to create the attempt when the slot is empty.
    ///
    /// `start` runs under the map lock and must not block.
    pub(super) fn lookup_or_start(
        &self,
        server_id: &ServerId,
        start: impl FnOnce(u64) -> SharedAttempt<C>,
    ) -> Result<Lookup<C>, ClientRegistryError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ClientRegistryError::Closed);
        }

        match state.slots.get(server_id) {
            Some(Slot::Connected(connection)) => {
                return Ok(Lookup::Connected(Arc::clone(&connection.client)));
            }
            Some(Slot::Connecting { attempt, .. }) => {
                return Ok(Lookup::Connecting(attempt.clone()));
            }
            None => {}
        }

        let generation = state.next_generation;
        state.next_generation = generation.wrapping_add(1);
        let attempt = start(generation);
        state.slots.insert(
            server_id.clone(),
            Slot::Connecting {
                generation,
                attempt: attempt.clone(),
            },
        );
        Ok(Lookup::Connecting(attempt))
    }

    /// Records the outcome of the attempt identified by `generation`.
    pub(super) fn settle(
        &self,
        server_id: &ServerId,
        generation: u64,
        outcome: Result<Connection<C>, ClientRegistryError>,
    ) -> Settled<C> {
        let mut state = self.state.lock();
        let is_current = matches!(
            state.slots.get(server_id),
            Some(Slot::Connecting { generation: current, .. }) if *current == generation
        );

        match outcome {
            Ok(connection) if is_current && !state.closed => {
                let client = Arc::clone(&connection.client);
                state
                    .slots
                    .insert(server_id.clone(), Slot::Connected(connection));
                Settled::Stored(client)
            }
            Ok(connection) => Settled::Rejected(connection),
            Err(err) => {
                if is_current {
                    state.slots.remove(server_id);
                }
                Settled::Failed(err)
            }
        }
    }

    /// Marks the cache closed and takes every slot.
    ///
    /// Returns `None` when the cache was already closed.
    pub(super) fn close(&self) -> Option<Drained<C>> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        state.closed = true;

        let mut drained = Drained {
            pending: Vec::new(),
            connected: Vec::new(),
        };
        for (server_id, slot) in state.slots.drain() {
            match slot {
                Slot::Connecting { attempt, .. } => drained.pending.push((server_id, attempt)),
                Slot::Connected(connection) => drained.connected.push((server_id, connection)),
            }
        }
        drained.pending.sort_by(|left, right| left.0.cmp(&right.0));
        drained.connected.sort_by(|left, right| left.0.cmp(&right.0));
        Some(drained)
    }

    /// Keeps release failures of attempts rejected after close, for
    /// [`take_release_failures`](Self::take_release_failures).
    pub(super) fn record_release_failures(&self, failures: Vec<ReleaseFailure>) {
        if !failures.is_empty() {
            self.state.lock().late_failures.extend(failures);
        }
    }

    pub(super) fn take_release_failures(&self) -> Vec<ReleaseFailure> {
        std::mem::take(&mut self.state.lock().late_failures)
    }

    pub(super) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Returns the state of every occupied slot.
    pub(super) fn snapshot(&self) -> HashMap<ServerId, ConnectionState> {
        self.state
            .lock()
            .slots
            .iter()
            .map(|(server_id, slot)| {
                let state = match slot {
                    Slot::Connecting { .. } => ConnectionState::Connecting,
                    Slot::Connected(connection) => ConnectionState::Connected {
                        since: connection.connected_at,
                    },
                };
                (server_id.clone(), state)
            })
            .collect()
    }
}
