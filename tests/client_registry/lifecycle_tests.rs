//! Tests for registry shutdown, scoping and configuration loading.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use mcp_client_registry::client_registry::{
    adapters::InMemoryClientBuilder,
    domain::ConnectionState,
    ports::ClientTransport,
    services::{ClientRegistry, ClientRegistryError, ClientRegistryErrorKind, ReleaseFailure},
};
use mockable::Clock;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

use super::helpers::{
    TestRegistry, build_context, identity, server_id, sse_server, stdio_server, wait_until,
};

/// Clock frozen at a single instant.
struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_closes_every_connected_client() {
    let context = build_context([stdio_server("everything"), sse_server("search")])
        .expect("registry should build");
    let outcomes = context
        .registry
        .acquire_all(&CancellationToken::new())
        .await;
    assert!(outcomes.values().all(Result::is_ok));

    context.registry.shutdown().await.expect("shutdown should succeed");

    assert!(context.registry.is_closed());
    for (_, client) in outcomes {
        assert!(!client.expect("client should exist").is_connected());
    }
    assert_eq!(context.builder.closes(&server_id("everything")), 1);
    assert_eq!(context.builder.closes(&server_id("search")), 1);
    let transports = context.transports.all();
    assert_eq!(transports.len(), 2);
    assert!(transports.iter().all(|transport| transport.is_closed()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_reports_failures_and_releases_the_rest() {
    let context = build_context([stdio_server("everything"), sse_server("search")])
        .expect("registry should build");
    context.builder.fail_close(&server_id("search"));
    let _clients = context
        .registry
        .acquire_all(&CancellationToken::new())
        .await;

    let err = context
        .registry
        .shutdown()
        .await
        .err()
        .expect("close failure should be reported");

    assert_eq!(err.kind(), ClientRegistryErrorKind::Lifecycle);
    let ClientRegistryError::Shutdown(failures) = err else {
        panic!("expected a shutdown error");
    };
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures.first(),
        Some(ReleaseFailure::Client { server_id, .. }) if server_id.as_str() == "search"
    ));
    assert_eq!(context.builder.closes(&server_id("everything")), 1);
    assert!(
        context
            .transports
            .all()
            .iter()
            .all(|transport| transport.is_closed())
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_is_idempotent_and_blocks_new_acquires() {
    let context = build_context([stdio_server("everything")]).expect("registry should build");
    context
        .registry
        .acquire("everything", &CancellationToken::new())
        .await
        .expect("acquire should succeed");

    context.registry.shutdown().await.expect("first shutdown should succeed");
    context.registry.shutdown().await.expect("second shutdown is a no-op");

    let err = context
        .registry
        .acquire("everything", &CancellationToken::new())
        .await
        .err()
        .expect("acquire after shutdown should fail");
    assert!(matches!(err, ClientRegistryError::Closed));
    assert_eq!(err.kind(), ClientRegistryErrorKind::Lifecycle);
    assert_eq!(context.builder.builds(&server_id("everything")), 1);
    assert_eq!(context.builder.closes(&server_id("everything")), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_cancels_in_flight_attempts() {
    let context = build_context([stdio_server("everything")]).expect("registry should build");
    let everything = server_id("everything");
    context.builder.hold_connections();

    let waiting = {
        let registry = context.registry.clone();
        tokio::spawn(async move {
            registry
                .acquire("everything", &CancellationToken::new())
                .await
        })
    };
    wait_until(|| context.builder.connects(&everything) == 1).await;

    context.registry.shutdown().await.expect("shutdown should succeed");

    let outcome = waiting.await.expect("task should not panic");
    assert!(matches!(outcome, Err(ClientRegistryError::Closed)));
    assert_eq!(context.builder.closes(&everything), 1);
    assert!(
        context
            .transports
            .built_for(&everything)
            .iter()
            .all(|transport| transport.is_closed())
    );
}

#[rstest]
#[case::clean_release(false)]
#[case::failed_release(true)]
#[tokio::test(flavor = "multi_thread")]
async fn connect_finishing_after_shutdown_is_released(#[case] close_fails: bool) {
    let context = build_context([stdio_server("everything")]).expect("registry should build");
    let everything = server_id("everything");
    context.builder.ignore_cancellation();
    context.builder.hold_connections();
    if close_fails {
        context.builder.fail_close(&everything);
    }

    let waiting = {
        let registry = context.registry.clone();
        tokio::spawn(async move {
            registry
                .acquire("everything", &CancellationToken::new())
                .await
        })
    };
    wait_until(|| context.builder.connects(&everything) == 1).await;

    let shutting_down = {
        let registry = context.registry.clone();
        tokio::spawn(async move { registry.shutdown().await })
    };
    wait_until(|| context.registry.is_closed()).await;
    context.builder.release_connections();

    let shutdown = shutting_down.await.expect("task should not panic");
    let outcome = waiting.await.expect("task should not panic");

    assert!(matches!(outcome, Err(ClientRegistryError::Closed)));
    assert_eq!(context.builder.closes(&everything), 1);
    let transports = context.transports.built_for(&everything);
    assert_eq!(transports.len(), 1);
    assert!(transports.iter().all(|transport| transport.is_closed()));
    if close_fails {
        let Err(ClientRegistryError::Shutdown(failures)) = shutdown else {
            panic!("late release failure should be reported by shutdown");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures.first().map(|failure| failure.server_id().as_str()),
            Some("everything")
        );
    } else {
        shutdown.expect("shutdown should succeed");
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn panicking_scope_body_cancels_in_flight_connects() {
    let context = build_context([stdio_server("everything")]).expect("registry should build");
    let everything = server_id("everything");
    context.builder.hold_connections();

    let scoped = {
        let registry = context.registry.clone();
        let builder = Arc::clone(&context.builder);
        let everything = everything.clone();
        tokio::spawn(async move {
            let outcome: Result<(), ClientRegistryError> = registry
                .scope(|registry: TestRegistry| async move {
                    let pending = tokio::spawn(async move {
                        registry
                            .acquire("everything", &CancellationToken::new())
                            .await
                    });
                    wait_until(|| builder.connects(&everything) == 1).await;
                    drop(pending);
                    panic!("scope body failed")
                })
                .await;
            outcome
        })
    };

    assert!(scoped.await.is_err_and(|err| err.is_panic()));
    wait_until(|| context.builder.closes(&everything) == 1).await;
    wait_until(|| {
        context.registry.connection_states().get("everything")
            == Some(&ConnectionState::Idle)
    })
    .await;
    assert!(
        context
            .transports
            .built_for(&everything)
            .iter()
            .all(|transport| transport.is_closed())
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn scope_shuts_down_after_successful_body() {
    let context = build_context([stdio_server("everything")]).expect("registry should build");

    let connected = context
        .registry
        .clone()
        .scope(|registry: TestRegistry| async move {
            let client = registry
                .acquire("everything", &CancellationToken::new())
                .await?;
            Ok::<_, ClientRegistryError>(client.is_connected())
        })
        .await
        .expect("scope should succeed");

    assert!(connected);
    assert!(context.registry.is_closed());
    assert_eq!(context.builder.closes(&server_id("everything")), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn scope_returns_body_error_after_shutdown() {
    let context = build_context([stdio_server("everything")]).expect("registry should build");

    let err = context
        .registry
        .clone()
        .scope(|registry: TestRegistry| async move {
            registry
                .acquire("everything", &CancellationToken::new())
                .await?;
            registry.acquire("missing", &CancellationToken::new()).await
        })
        .await
        .err()
        .expect("body error should surface");

    assert!(matches!(err, ClientRegistryError::ServerNotFound(_)));
    assert!(context.registry.is_closed());
    assert_eq!(context.builder.closes(&server_id("everything")), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn connection_state_carries_clock_timestamp() {
    let instant = Utc
        .with_ymd_and_hms(2026, 3, 14, 9, 26, 53)
        .single()
        .expect("valid timestamp");
    let registry = ClientRegistry::builder(identity(), Arc::new(InMemoryClientBuilder::new()))
        .server(stdio_server("everything"))
        .server(sse_server("search"))
        .clock(Arc::new(FixedClock(instant)))
        .build()
        .expect("registry should build");

    registry
        .acquire("everything", &CancellationToken::new())
        .await
        .expect("acquire should succeed");

    let states = registry.connection_states();
    assert_eq!(
        states.get("everything"),
        Some(&ConnectionState::Connected { since: instant })
    );
    assert_eq!(states.get("search"), Some(&ConnectionState::Idle));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn registry_loads_from_json_configuration() {
    let builder = Arc::new(InMemoryClientBuilder::new());
    let registry = ClientRegistry::<InMemoryClientBuilder>::from_json(
        r#"{
            "clientInfo": { "name": "assistant", "version": "2.0.0" },
            "servers": [
                { "id": "everything", "name": "Everything", "transportType": "stdio",
                  "location": "npx", "transportOptions": { "arguments": "-y server-everything" } },
                { "id": "search", "name": "Search", "transportType": "sse",
                  "location": "https://search.example/sse" }
            ]
        }"#,
        Arc::clone(&builder),
    )
    .expect("configuration should load");

    assert_eq!(registry.identity().version(), "2.0.0");
    let ids: Vec<_> = registry.server_ids().map(|id| id.as_str().to_owned()).collect();
    assert_eq!(ids, ["everything", "search"]);
    assert_eq!(
        registry.descriptor("search").and_then(|descriptor| descriptor.location()),
        Some("https://search.example/sse")
    );

    let client = registry
        .acquire("everything", &CancellationToken::new())
        .await
        .expect("acquire should succeed");
    let stdio = client
        .transport()
        .config()
        .as_stdio()
        .expect("STDIO settings expected");
    assert_eq!(stdio.arguments(), ["-y", "server-everything"]);
}

#[rstest]
#[case::malformed_document("{ not json", ClientRegistryErrorKind::Configuration)]
#[case::duplicate_ids(
    r#"{
        "clientInfo": { "name": "assistant", "version": "2.0.0" },
        "servers": [
            { "id": "a", "name": "A", "transportType": "stdio", "location": "a" },
            { "id": "a", "name": "B", "transportType": "stdio", "location": "b" }
        ]
    }"#,
    ClientRegistryErrorKind::Configuration
)]
fn invalid_configuration_is_rejected(
    #[case] document: &str,
    #[case] expected: ClientRegistryErrorKind,
) {
    let result = ClientRegistry::<InMemoryClientBuilder>::from_json(document, Arc::new(InMemoryClientBuilder::new()));

    assert_eq!(result.err().map(|err| err.kind()), Some(expected));
}
