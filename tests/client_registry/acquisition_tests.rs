//! Tests for client acquisition and error reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mcp_client_registry::client_registry::{
    adapters::{InMemoryClientBuilder, InMemoryMcpClient},
    domain::{ClientIdentity, ConnectionState, ServerDescriptor},
    ports::{ClientBuilder, ClientTransport, McpClientResult},
    services::{ClientRegistry, ClientRegistryError, ClientRegistryErrorKind},
};
use rstest::{fixture, rstest};
use tokio_util::sync::CancellationToken;

use super::helpers::{
    TestContext, build_context, identity, server_id, sse_server, stdio_server,
};

#[fixture]
fn context() -> TestContext {
    build_context([stdio_server("everything"), sse_server("search")])
        .expect("registry should build")
}

#[rstest]
fn duplicate_identifiers_fail_construction() {
    let result = build_context([
        stdio_server("everything"),
        sse_server("search"),
        sse_server("everything"),
    ]);

    let err = result.err().expect("duplicate identifiers should be rejected");
    assert_eq!(err.kind(), ClientRegistryErrorKind::Configuration);
    assert!(matches!(
        err,
        ClientRegistryError::DuplicateServerId(ref id) if id.as_str() == "everything"
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sequential_acquires_return_the_same_instance(context: TestContext) {
    let token = CancellationToken::new();

    let first = context
        .registry
        .acquire("everything", &token)
        .await
        .expect("first acquire should succeed");
    let second = context
        .registry
        .acquire("everything", &token)
        .await
        .expect("second acquire should succeed");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(context.builder.builds(&server_id("everything")), 1);
    assert_eq!(context.builder.connects(&server_id("everything")), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn client_is_bound_to_identity_and_transport(context: TestContext) {
    let client = context
        .registry
        .acquire("search", &CancellationToken::new())
        .await
        .expect("acquire should succeed");

    assert_eq!(client.server_id().as_str(), "search");
    assert_eq!(client.identity().name(), "integration-tests");
    assert_eq!(client.transport().location(), "http://localhost:3001/sse");
    assert!(client.is_connected());
}

#[rstest]
#[case("missing")]
#[case("Everything")]
#[case("")]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_identifier_is_a_configuration_error(
    context: TestContext,
    #[case] requested: &str,
) {
    let result = context
        .registry
        .acquire(requested, &CancellationToken::new())
        .await;

    let err = result.err().expect("unknown identifier should be rejected");
    assert_eq!(err.kind(), ClientRegistryErrorKind::Configuration);
    assert!(matches!(err, ClientRegistryError::ServerNotFound(ref id) if id == requested));
    assert_eq!(context.builder.builds(&server_id("everything")), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unsupported_transport_only_fails_its_own_descriptor() {
    let context = build_context([
        stdio_server("everything"),
        ServerDescriptor::new(server_id("legacy"), "Legacy", "websocket")
            .with_location("ws://localhost:9000"),
    ])
    .expect("unknown transport types are accepted at construction");
    let token = CancellationToken::new();

    let result = context.registry.acquire("legacy", &token).await;
    let err = result.err().expect("unsupported transport should be rejected");
    assert_eq!(err.kind(), ClientRegistryErrorKind::Configuration);
    assert!(matches!(
        err,
        ClientRegistryError::UnsupportedTransportType { ref transport_type, .. }
            if transport_type == "websocket"
    ));
    assert_eq!(context.builder.builds(&server_id("legacy")), 0);

    context
        .registry
        .acquire("everything", &token)
        .await
        .expect("valid descriptor should still connect");
}

#[rstest]
#[case("connectionTimeout")]
#[case("maxReconnectAttempts")]
#[case("reconnectDelay")]
#[tokio::test(flavor = "multi_thread")]
async fn malformed_numeric_option_fails_lazily(#[case] key: &str) {
    let context = build_context([
        sse_server("broken").with_option(key, "not-a-number"),
        sse_server("search"),
    ])
    .expect("option values are not parsed at construction");
    let token = CancellationToken::new();

    let result = context.registry.acquire("broken", &token).await;
    let err = result.err().expect("malformed option should be rejected");
    assert_eq!(err.kind(), ClientRegistryErrorKind::Format);
    assert!(matches!(
        err,
        ClientRegistryError::InvalidOption { ref source, .. } if source.key() == key
    ));

    context
        .registry
        .acquire("search", &token)
        .await
        .expect("other descriptors remain usable");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn transient_connect_failure_is_retried_on_next_acquire(context: TestContext) {
    let everything = server_id("everything");
    context.builder.fail_next_connects(&everything, 1);
    let token = CancellationToken::new();

    let first = context.registry.acquire("everything", &token).await;
    assert_eq!(
        first.err().map(|err| err.kind()),
        Some(ClientRegistryErrorKind::Connection)
    );

    let client = context
        .registry
        .acquire("everything", &token)
        .await
        .expect("retry should succeed");
    assert!(client.is_connected());
    assert_eq!(context.builder.builds(&everything), 2);
    assert_eq!(context.builder.closes(&everything), 1);
    let transports = context.transports.built_for(&everything);
    assert_eq!(transports.len(), 2);
    assert!(transports.first().is_some_and(|failed| failed.is_closed()));
    assert!(transports.last().is_some_and(|live| !live.is_closed()));
}

/// Client builder whose first build panics.
struct PanicsOnceClientBuilder {
    panicked: AtomicBool,
    inner: InMemoryClientBuilder,
}

impl ClientBuilder for PanicsOnceClientBuilder {
    type Client = InMemoryMcpClient;

    fn build(
        &self,
        descriptor: &ServerDescriptor,
        transport: Arc<dyn ClientTransport>,
        identity: &ClientIdentity,
    ) -> McpClientResult<Self::Client> {
        assert!(
            self.panicked.swap(true, Ordering::SeqCst),
            "client builder crashed"
        );
        self.inner.build(descriptor, transport, identity)
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn panicking_attempt_does_not_poison_its_slot() {
    let inner = InMemoryClientBuilder::new();
    let builder = Arc::new(PanicsOnceClientBuilder {
        panicked: AtomicBool::new(false),
        inner: inner.clone(),
    });
    let registry = ClientRegistry::builder(identity(), builder)
        .server(stdio_server("everything"))
        .build()
        .expect("registry should build");
    let token = CancellationToken::new();

    let first = registry.acquire("everything", &token).await;
    assert!(matches!(
        first,
        Err(ClientRegistryError::AttemptAborted { ref reason, .. })
            if reason.contains("client builder crashed")
    ));
    assert_eq!(
        registry.connection_states().get("everything"),
        Some(&ConnectionState::Idle)
    );

    let client = registry
        .acquire("everything", &token)
        .await
        .expect("retry should succeed");
    assert!(client.is_connected());
    assert_eq!(inner.builds(&server_id("everything")), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn client_build_failure_is_a_connection_error(context: TestContext) {
    context.builder.fail_build(&server_id("search"));

    let result = context
        .registry
        .acquire("search", &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ClientRegistryError::Client { .. })));
    assert_eq!(context.builder.connects(&server_id("search")), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn acquire_all_reports_each_server(context: TestContext) {
    context.builder.fail_next_connects(&server_id("search"), 1);

    let outcomes = context
        .registry
        .acquire_all(&CancellationToken::new())
        .await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.get("everything").is_some_and(Result::is_ok));
    assert!(outcomes.get("search").is_some_and(Result::is_err));
}
