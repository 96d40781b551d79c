//! In-memory client adapter for registry tests.

use crate::client_registry::{
    domain::{ClientIdentity, ServerDescriptor, ServerId},
    ports::{ClientBuilder, ClientTransport, McpClient, McpClientError, McpClientResult},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// In-memory client builder.
///
/// Clients connect without touching the network. The builder records how
/// often each server's clients were built, connected and closed, and lets
/// tests hold connects open, fail them, or fail teardown.
#[derive(Debug, Clone)]
pub struct InMemoryClientBuilder {
    state: Arc<InMemoryClientState>,
}

#[derive(Debug)]
struct InMemoryClientState {
    counters: Mutex<HashMap<ServerId, CallCounters>>,
    connect_failures: Mutex<HashMap<ServerId, usize>>,
    close_failures: Mutex<HashSet<ServerId>>,
    build_failures: Mutex<HashSet<ServerId>>,
    ignore_cancellation: AtomicBool,
    gate: watch::Sender<bool>,
}

#[derive(Debug, Default, Clone, Copy)]
struct CallCounters {
    builds: usize,
    connects: usize,
    closes: usize,
}

impl Default for InMemoryClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryClientBuilder {
    /// Creates a builder whose clients connect immediately.
    #[must_use]
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Arc::new(InMemoryClientState {
                counters: Mutex::new(HashMap::new()),
                connect_failures: Mutex::new(HashMap::new()),
                close_failures: Mutex::new(HashSet::new()),
                build_failures: Mutex::new(HashSet::new()),
                ignore_cancellation: AtomicBool::new(false),
                gate,
            }),
        }
    }

    /// Makes every subsequent connect wait until
    /// [`release_connections`](Self::release_connections) is called.
    pub fn hold_connections(&self) {
        self.state.gate.send_replace(false);
    }

    /// Lets held and future connects proceed.
    pub fn release_connections(&self) {
        self.state.gate.send_replace(true);
    }

    /// Makes connects wait for the gate even after their cancellation token
    /// fires, like a server that finishes its handshake regardless.
    pub fn ignore_cancellation(&self) {
        self.state.ignore_cancellation.store(true, Ordering::Release);
    }

    /// Makes the next `count` connects for `server_id` fail.
    pub fn fail_next_connects(&self, server_id: &ServerId, count: usize) {
        self.state
            .connect_failures
            .lock()
            .insert(server_id.clone(), count);
    }

    /// Makes closing any client for `server_id` fail.
    pub fn fail_close(&self, server_id: &ServerId) {
        self.state.close_failures.lock().insert(server_id.clone());
    }

    /// Makes building a client for `server_id` fail.
    pub fn fail_build(&self, server_id: &ServerId) {
        self.state.build_failures.lock().insert(server_id.clone());
    }

    /// Returns how many clients were built for `server_id`.
    #[must_use]
    pub fn builds(&self, server_id: &ServerId) -> usize {
        self.state.counters(server_id).builds
    }

    /// Returns how many connect calls were made for `server_id`.
    #[must_use]
    pub fn connects(&self, server_id: &ServerId) -> usize {
        self.state.counters(server_id).connects
    }

    /// Returns how many close calls were made for `server_id`.
    #[must_use]
    pub fn closes(&self, server_id: &ServerId) -> usize {
        self.state.counters(server_id).closes
    }
}

impl InMemoryClientState {
    fn counters(&self, server_id: &ServerId) -> CallCounters {
        self.counters
            .lock()
            .get(server_id)
            .copied()
            .unwrap_or_default()
    }

    fn record(&self, server_id: &ServerId, update: impl FnOnce(&mut CallCounters)) {
        update(self.counters.lock().entry(server_id.clone()).or_default());
    }

    fn take_connect_failure(&self, server_id: &ServerId) -> bool {
        let mut failures = self.connect_failures.lock();
        match failures.get_mut(server_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

impl ClientBuilder for InMemoryClientBuilder {
    type Client = InMemoryMcpClient;

    fn build(
        &self,
        descriptor: &ServerDescriptor,
        transport: Arc<dyn ClientTransport>,
        identity: &ClientIdentity,
    ) -> McpClientResult<Self::Client> {
        let server_id = descriptor.id().clone();
        self.state.record(&server_id, |counters| counters.builds += 1);
        if self.state.build_failures.lock().contains(&server_id) {
            return Err(McpClientError::runtime(io::Error::other(format!(
                "client for {server_id} could not be built"
            ))));
        }

        Ok(InMemoryMcpClient {
            server_id,
            identity: identity.clone(),
            transport,
            connected: AtomicBool::new(false),
            state: Arc::clone(&self.state),
        })
    }
}

/// Client produced by [`InMemoryClientBuilder`].
pub struct InMemoryMcpClient {
    server_id: ServerId,
    identity: ClientIdentity,
    transport: Arc<dyn ClientTransport>,
    connected: AtomicBool,
    state: Arc<InMemoryClientState>,
}

impl fmt::Debug for InMemoryMcpClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("InMemoryMcpClient")
            .field("server_id", &self.server_id)
            .field("identity", &self.identity)
            .field("location", &self.transport.location())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl InMemoryMcpClient {
    /// Returns the server this client talks to.
    #[must_use]
    pub const fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    /// Returns the identity the client announces.
    #[must_use]
    pub const fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Returns the transport the client was bound to.
    #[must_use]
    pub fn transport(&self) -> &dyn ClientTransport {
        self.transport.as_ref()
    }

    /// Returns whether the last connect succeeded and no close followed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

#[async_trait]
impl McpClient for InMemoryMcpClient {
    async fn connect(&self, cancellation: CancellationToken) -> McpClientResult<()> {
        self.state.record(&self.server_id, |counters| counters.connects += 1);

        let mut gate = self.state.gate.subscribe();
        let opened = async move { gate.wait_for(|open| *open).await.map(|_| ()) };
        if self.state.ignore_cancellation.load(Ordering::Acquire) {
            opened.await.map_err(McpClientError::runtime)?;
        } else {
            tokio::select! {
                () = cancellation.cancelled() => return Err(McpClientError::Cancelled),
                result = opened => result.map_err(McpClientError::runtime)?,
            }
        }

        if self.state.take_connect_failure(&self.server_id) {
            return Err(McpClientError::runtime(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{} refused the connection", self.server_id),
            )));
        }

        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn close(&self) -> McpClientResult<()> {
        self.state.record(&self.server_id, |counters| counters.closes += 1);
        self.connected.store(false, Ordering::Release);

        if self.state.close_failures.lock().contains(&self.server_id) {
            return Err(McpClientError::runtime(io::Error::other(format!(
                "{} did not acknowledge shutdown",
                self.server_id
            ))));
        }
        Ok(())
    }
}
