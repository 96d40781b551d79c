//! MCP client registry service.

use super::{
    ClientRegistryError, ClientRegistryResult,
    cache::{AttemptOutcome, Connection, ConnectionCache, Lookup, SharedAttempt, Settled},
    selector,
    validation::index_descriptors,
};
use crate::client_registry::{
    adapters::DefaultTransportBuilder,
    domain::{ClientIdentity, ConnectionState, RegistryConfig, ServerDescriptor, ServerId},
    ports::{ClientBuilder, ClientTransport, McpClient, TransportBuilder},
};
use futures::FutureExt;
use futures::future::join_all;
use mockable::{Clock, DefaultClock};
use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, info_span, warn};

/// Registry of lazily connected MCP clients, one per server descriptor.
///
/// Descriptors are validated once, when the registry is built. The first
/// [`acquire`](Self::acquire) for an identifier builds the transport and the
/// client and connects it; every later call returns the same client
/// instance. Concurrent first calls share a single connect attempt. A failed
/// attempt is not cached, so the next call retries from scratch.
///
/// Cloning the registry is cheap and every clone shares the same cache.
pub struct ClientRegistry<B, T = DefaultTransportBuilder>
where
    B: ClientBuilder,
    T: TransportBuilder + 'static,
{
    inner: Arc<RegistryInner<B, T>>,
}

impl<B, T> Clone for ClientRegistry<B, T>
where
    B: ClientBuilder,
    T: TransportBuilder + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct RegistryInner<B, T>
where
    B: ClientBuilder,
    T: TransportBuilder + 'static,
{
    descriptors: BTreeMap<ServerId, Arc<ServerDescriptor>>,
    identity: ClientIdentity,
    transport_builder: Arc<T>,
    client_builder: Arc<B>,
    cache: ConnectionCache<B::Client>,
    shutdown: CancellationToken,
    clock: Arc<dyn Clock + Send + Sync>,
    span: Span,
}

/// Builder for [`ClientRegistry`].
#[must_use]
pub struct ClientRegistryBuilder<B, T = DefaultTransportBuilder>
where
    B: ClientBuilder,
    T: TransportBuilder + 'static,
{
    identity: ClientIdentity,
    client_builder: Arc<B>,
    transport_builder: Arc<T>,
    servers: Vec<ServerDescriptor>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    span: Option<Span>,
}

impl<B> ClientRegistry<B, DefaultTransportBuilder>
where
    B: ClientBuilder,
{
    /// Starts building a registry that announces `identity` and builds
    /// clients with `client_builder`.
    pub fn builder(
        identity: ClientIdentity,
        client_builder: Arc<B>,
    ) -> ClientRegistryBuilder<B, DefaultTransportBuilder> {
        ClientRegistryBuilder {
            identity,
            client_builder,
            transport_builder: Arc::new(DefaultTransportBuilder::new()),
            servers: Vec::new(),
            clock: None,
            span: None,
        }
    }

    /// Builds a registry from a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ClientRegistryError::DuplicateServerId`] when two servers
    /// share an identifier.
    pub fn from_config(
        config: RegistryConfig,
        client_builder: Arc<B>,
    ) -> ClientRegistryResult<Self> {
        Self::builder(config.client_info, client_builder)
            .servers(config.servers)
            .build()
    }

    /// Builds a registry from a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ClientRegistryError::Config`] when the document cannot be
    /// parsed, or [`ClientRegistryError::DuplicateServerId`] when two servers
    /// share an identifier.
    pub fn from_json(document: &str, client_builder: Arc<B>) -> ClientRegistryResult<Self> {
        Self::from_config(RegistryConfig::from_json(document)?, client_builder)
    }
}

impl<B, T> ClientRegistryBuilder<B, T>
where
    B: ClientBuilder,
    T: TransportBuilder + 'static,
{
    /// Adds server descriptors.
    pub fn servers(mut self, descriptors: impl IntoIterator<Item = ServerDescriptor>) -> Self {
        self.servers.extend(descriptors);
        self
    }

    /// Adds one server descriptor.
    pub fn server(mut self, descriptor: ServerDescriptor) -> Self {
        self.servers.push(descriptor);
        self
    }

    /// Replaces the transport builder.
    pub fn transport_builder<U>(self, transport_builder: Arc<U>) -> ClientRegistryBuilder<B, U>
    where
        U: TransportBuilder + 'static,
    {
        ClientRegistryBuilder {
            identity: self.identity,
            client_builder: self.client_builder,
            transport_builder,
            servers: self.servers,
            clock: self.clock,
            span: self.span,
        }
    }

    /// Replaces the clock used to timestamp connections.
    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the span registry events and connect attempts are recorded under.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Validates the descriptors and builds the registry.
    ///
    /// No transport or client is created here.
    ///
    /// # Errors
    ///
    /// Returns [`ClientRegistryError::DuplicateServerId`] when two
    /// descriptors share an identifier.
    pub fn build(self) -> ClientRegistryResult<ClientRegistry<B, T>> {
        let descriptors = index_descriptors(self.servers)?;
        let span = self
            .span
            .unwrap_or_else(|| info_span!("mcp_client_registry"));
        span.in_scope(|| {
            debug!(servers = descriptors.len(), "MCP client registry created");
        });

        Ok(ClientRegistry {
            inner: Arc::new(RegistryInner {
                descriptors,
                identity: self.identity,
                transport_builder: self.transport_builder,
                client_builder: self.client_builder,
                cache: ConnectionCache::new(),
                shutdown: CancellationToken::new(),
                clock: self.clock.unwrap_or_else(|| Arc::new(DefaultClock)),
                span,
            }),
        })
    }
}

impl<B, T> ClientRegistry<B, T>
where
    B: ClientBuilder,
    T: TransportBuilder + 'static,
{
    /// Returns a connected client for `server_id`, connecting it on first use.
    ///
    /// `cancellation` only stops this caller from waiting; an attempt shared
    /// with other callers keeps running.
    ///
    /// # Errors
    ///
    /// Returns [`ClientRegistryError::ServerNotFound`] for unregistered
    /// identifiers, [`ClientRegistryError::Closed`] after shutdown,
    /// [`ClientRegistryError::Cancelled`] when `cancellation` fires first, and
    /// transport, option or client errors from the connect attempt.
    pub async fn acquire(
        &self,
        server_id: &str,
        cancellation: &CancellationToken,
    ) -> ClientRegistryResult<Arc<B::Client>> {
        let descriptor = self.inner.find_descriptor(server_id)?;
        let lookup = self.inner.cache.lookup_or_start(descriptor.id(), |generation| {
            RegistryInner::start_attempt(
                Arc::clone(&self.inner),
                Arc::clone(&descriptor),
                generation,
            )
        })?;

        let attempt = match lookup {
            Lookup::Connected(client) => {
                debug!(
                    parent: &self.inner.span,
                    server_id = %descriptor.id(),
                    "reusing cached MCP client"
                );
                return Ok(client);
            }
            Lookup::Connecting(attempt) => attempt,
        };

        tokio::select! {
            biased;
            () = cancellation.cancelled() => {
                debug!(
                    parent: &self.inner.span,
                    server_id = %descriptor.id(),
                    "caller stopped waiting for MCP client"
                );
                Err(ClientRegistryError::Cancelled(descriptor.id().clone()))
            }
            outcome = attempt => outcome,
        }
    }

    /// Acquires every registered server concurrently.
    ///
    /// Each identifier maps to its own outcome; one failure never hides the
    /// others.
    pub async fn acquire_all(
        &self,
        cancellation: &CancellationToken,
    ) -> BTreeMap<ServerId, ClientRegistryResult<Arc<B::Client>>> {
        let attempts = self.inner.descriptors.keys().map(|server_id| async move {
            let outcome = self.acquire(server_id.as_str(), cancellation).await;
            (server_id.clone(), outcome)
        });
        join_all(attempts).await.into_iter().collect()
    }

    /// Builds the transport for `descriptor` without caching or connecting
    /// it.
    ///
    /// # Errors
    ///
    /// Returns the same transport selection errors as
    /// [`build_transport`](super::build_transport).
    pub fn build_transport(
        &self,
        descriptor: &ServerDescriptor,
    ) -> ClientRegistryResult<Arc<dyn ClientTransport>> {
        selector::build_transport(descriptor, self.inner.transport_builder.as_ref())
    }

    /// Returns the identity announced to servers.
    #[must_use]
    pub fn identity(&self) -> &ClientIdentity {
        &self.inner.identity
    }

    /// Returns registered identifiers in sorted order.
    pub fn server_ids(&self) -> impl Iterator<Item = &ServerId> {
        self.inner.descriptors.keys()
    }

    /// Returns the descriptor registered under `server_id`.
    #[must_use]
    pub fn descriptor(&self, server_id: &str) -> Option<&ServerDescriptor> {
        self.inner.descriptors.get(server_id).map(|descriptor| &**descriptor)
    }

    /// Returns the connection state of every registered server.
    #[must_use]
    pub fn connection_states(&self) -> BTreeMap<ServerId, ConnectionState> {
        let mut occupied = self.inner.cache.snapshot();
        self.inner
            .descriptors
            .keys()
            .map(|server_id| {
                let state = occupied.remove(server_id).unwrap_or(ConnectionState::Idle);
                (server_id.clone(), state)
            })
            .collect()
    }

    /// Returns whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.cache.is_closed()
    }

    /// Closes the registry and releases every client it produced.
    ///
    /// In-flight attempts are cancelled and awaited. Every connected client
    /// is closed, then its transport; one failure does not stop the others.
    /// Later calls return `Ok(())` without doing anything.
    ///
    /// # Errors
    ///
    /// Returns [`ClientRegistryError::Shutdown`] listing every client or
    /// transport that failed to close, including those of attempts that
    /// connected after shutdown began.
    pub async fn shutdown(&self) -> ClientRegistryResult<()> {
        let span = &self.inner.span;
        let Some(drained) = self.inner.cache.close() else {
            debug!(parent: span, "MCP client registry already closed");
            return Ok(());
        };

        info!(
            parent: span,
            pending = drained.pending.len(),
            connected = drained.connected.len(),
            "shutting down MCP client registry"
        );
        self.inner.shutdown.cancel();

        for (server_id, attempt) in drained.pending {
            if let Err(err) = attempt.await {
                debug!(
                    parent: span,
                    server_id = %server_id,
                    error = %err,
                    "in-flight connect attempt ended"
                );
            }
        }

        let releases = drained
            .connected
            .into_iter()
            .map(|(server_id, connection)| async move { connection.release(&server_id).await });
        let mut failures: Vec<_> = join_all(releases).await.into_iter().flatten().collect();
        failures.extend(self.inner.cache.take_release_failures());

        for failure in &failures {
            warn!(
                parent: span,
                server_id = %failure.server_id(),
                error = %failure,
                "failed to release MCP client resource"
            );
        }

        if failures.is_empty() {
            info!(parent: span, "MCP client registry shut down");
            Ok(())
        } else {
            Err(ClientRegistryError::Shutdown(failures))
        }
    }

    /// Runs `body` with the registry and shuts the registry down afterwards,
    /// whether or not `body` succeeded.
    ///
    /// If `body` panics or the returned future is dropped early, in-flight
    /// connects are cancelled.
    ///
    /// # Errors
    ///
    /// Returns the error from `body` when it fails; otherwise returns the
    /// shutdown error, if any.
    pub async fn scope<F, Fut, R, E>(self, body: F) -> Result<R, E>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<ClientRegistryError>,
    {
        let _guard = ShutdownGuard(self.inner.shutdown.clone());
        let outcome = body(self.clone()).await;
        let shutdown = self.shutdown().await;
        match (outcome, shutdown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(E::from(err)),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(shutdown_err)) => {
                warn!(
                    parent: &self.inner.span,
                    error = %shutdown_err,
                    "MCP client registry shutdown failed after scope error"
                );
                Err(err)
            }
        }
    }
}

impl<B, T> RegistryInner<B, T>
where
    B: ClientBuilder,
    T: TransportBuilder + 'static,
{
    fn find_descriptor(&self, server_id: &str) -> ClientRegistryResult<Arc<ServerDescriptor>> {
        self.descriptors
            .get(server_id)
            .cloned()
            .ok_or_else(|| ClientRegistryError::ServerNotFound(server_id.to_owned()))
    }

    /// Spawns the shared attempt so it outlives any single caller.
    fn start_attempt(
        inner: Arc<Self>,
        descriptor: Arc<ServerDescriptor>,
        generation: u64,
    ) -> SharedAttempt<B::Client> {
        let span = inner.span.clone();
        let task = tokio::spawn(
            Self::run_attempt(Arc::clone(&inner), Arc::clone(&descriptor), generation)
                .instrument(span),
        );
        task.map(move |joined| {
            joined.unwrap_or_else(|err| {
                let server_id = descriptor.id();
                let aborted = ClientRegistryError::AttemptAborted {
                    server_id: server_id.clone(),
                    reason: err.to_string(),
                };
                // The task never settled; free its slot.
                match inner.cache.settle(server_id, generation, Err(aborted)) {
                    Settled::Failed(failure) => Err(failure),
                    Settled::Stored(_) | Settled::Rejected(_) => Err(ClientRegistryError::Closed),
                }
            })
        })
        .boxed()
        .shared()
    }

    async fn run_attempt(
        inner: Arc<Self>,
        descriptor: Arc<ServerDescriptor>,
        generation: u64,
    ) -> AttemptOutcome<B::Client> {
        let server_id = descriptor.id();
        debug!(server_id = %server_id, generation, "starting MCP client connect attempt");

        let outcome = AssertUnwindSafe(inner.establish(&descriptor))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(ClientRegistryError::AttemptAborted {
                    server_id: server_id.clone(),
                    reason: panic_reason(payload.as_ref()),
                })
            });

        match inner.cache.settle(server_id, generation, outcome) {
            Settled::Stored(client) => {
                info!(server_id = %server_id, "MCP client connected");
                Ok(client)
            }
            Settled::Rejected(connection) => {
                info!(server_id = %server_id, "registry closed during connect, releasing MCP client");
                let failures = connection.release(server_id).await;
                for failure in &failures {
                    warn!(server_id = %server_id, error = %failure, "failed to release MCP client resource");
                }
                inner.cache.record_release_failures(failures);
                Err(ClientRegistryError::Closed)
            }
            Settled::Failed(err) => {
                warn!(server_id = %server_id, error = %err, "MCP client connect attempt failed");
                Err(err)
            }
        }
    }

    /// Builds the transport and client and connects them. Partially built
    /// resources are released before an error is returned.
    async fn establish(
        &self,
        descriptor: &ServerDescriptor,
    ) -> ClientRegistryResult<Connection<B::Client>> {
        let server_id = descriptor.id();
        let transport = selector::build_transport(descriptor, self.transport_builder.as_ref())?;

        let client = match self
            .client_builder
            .build(descriptor, Arc::clone(&transport), &self.identity)
        {
            Ok(client) => client,
            Err(source) => {
                close_transport(server_id, transport.as_ref()).await;
                return Err(ClientRegistryError::Client {
                    server_id: server_id.clone(),
                    source,
                });
            }
        };

        if let Err(source) = client.connect(self.shutdown.child_token()).await {
            if let Err(err) = client.close().await {
                debug!(server_id = %server_id, error = %err, "closing unconnected MCP client failed");
            }
            close_transport(server_id, transport.as_ref()).await;

            if self.shutdown.is_cancelled() {
                return Err(ClientRegistryError::Closed);
            }
            return Err(ClientRegistryError::Client {
                server_id: server_id.clone(),
                source,
            });
        }

        Ok(Connection {
            client: Arc::new(client),
            transport,
            connected_at: self.clock.utc(),
        })
    }
}

/// Cancels in-flight connects when dropped, so a `scope` body that panics
/// or is dropped early still stops pending attempts.
struct ShutdownGuard(CancellationToken);

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "connect attempt panicked".to_owned())
}

async fn close_transport(server_id: &ServerId, transport: &dyn ClientTransport) {
    if let Err(err) = transport.close().await {
        debug!(server_id = %server_id, error = %err, "closing unused MCP transport failed");
    }
}
