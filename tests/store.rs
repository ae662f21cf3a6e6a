//! Packument store behaviour with retry policies attached

mod helper;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use helper::{ImmediateRetry, ManualRetry, StubTransport, packument_body};
use packument_resolver::config::{CORGI_DOC, FULL_DOC};
use packument_resolver::registry::retry::{BackoffRetry, RetryPolicy};
use packument_resolver::registry::store::PackumentStore;
use packument_resolver::registry::transport::RegistryResponse;
use packument_resolver::version::error::RegistryError;

const URL: &str = "https://registry.npmjs.org/left-pad";

fn body() -> String {
    packument_body("left-pad", &["1.0.0", "1.3.0"], "1.3.0")
}

#[tokio::test]
async fn resumed_fetch_returns_retried_outcome() {
    let transport = Arc::new(StubTransport::new().respond(503, "").respond(200, &body()));
    let retry = Arc::new(ImmediateRetry::new(3));
    let store = PackumentStore::new(transport.clone(), Some(retry.clone() as Arc<dyn RetryPolicy>));

    let packument = store.fetch(URL, "left-pad", false).await.unwrap();

    assert_eq!(packument.name, "left-pad");
    assert_eq!(transport.call_count(), 2);
    assert_eq!(retry.attempts(), vec![1]);
}

#[tokio::test]
async fn attempt_counter_increments_across_retries() {
    let transport = Arc::new(
        StubTransport::new()
            .respond(500, "")
            .respond(502, "")
            .respond(200, &body()),
    );
    let retry = Arc::new(ImmediateRetry::new(5));
    let store = PackumentStore::new(transport.clone(), Some(retry.clone() as Arc<dyn RetryPolicy>));

    store.fetch(URL, "left-pad", false).await.unwrap();

    assert_eq!(retry.attempts(), vec![1, 2]);
}

#[tokio::test]
async fn dropped_resume_fails_with_last_error_and_evicts() {
    let transport = Arc::new(StubTransport::new().respond(500, "").respond(503, ""));
    let retry = Arc::new(ImmediateRetry::new(1));
    let store = PackumentStore::new(transport.clone(), Some(retry.clone() as Arc<dyn RetryPolicy>));

    let err = store.fetch(URL, "left-pad", false).await.unwrap_err();

    assert_eq!(err.to_string(), "Invalid response: Unexpected status: 503");
    assert_eq!(transport.call_count(), 2);
    assert!(store.is_empty());
}

#[tokio::test]
async fn joined_callers_observe_the_retried_outcome() {
    let transport = Arc::new(StubTransport::new().respond(503, "").respond(200, &body()));
    let retry = Arc::new(ManualRetry::new());
    let store = PackumentStore::new(transport.clone(), Some(retry.clone() as Arc<dyn RetryPolicy>));

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.fetch(URL, "left-pad", false).await }
    });
    retry.wait_pending().await;

    let second = tokio::spawn({
        let store = store.clone();
        async move { store.fetch(URL, "left-pad", false).await }
    });
    tokio::task::yield_now().await;
    retry.resume_all();

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn joined_callers_observe_giving_up() {
    let transport = Arc::new(StubTransport::new().respond(503, ""));
    let retry = Arc::new(ManualRetry::new());
    let store = PackumentStore::new(transport.clone(), Some(retry.clone() as Arc<dyn RetryPolicy>));

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.fetch(URL, "left-pad", false).await }
    });
    retry.wait_pending().await;
    retry.give_up_all();

    let err = first.await.unwrap().unwrap_err();
    assert!(matches!(err, RegistryError::InvalidResponse(_)));
    assert_eq!(transport.call_count(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn overlapping_fetches_issue_one_request() {
    let transport = Arc::new(
        StubTransport::new()
            .respond(200, &body())
            .with_delay(Duration::from_millis(20)),
    );
    let store = PackumentStore::new(transport.clone(), None);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.fetch(URL, "left-pad", false).await })
        })
        .collect();
    let results = join_all(handles).await;

    assert_eq!(transport.call_count(), 1);
    for result in results {
        assert_eq!(result.unwrap().unwrap().name, "left-pad");
    }
}

#[tokio::test]
async fn not_found_upgrades_once_then_fails() {
    let transport = Arc::new(StubTransport::new().respond(404, "").respond(404, ""));
    let store = PackumentStore::new(transport.clone(), None);

    let err = store.fetch(URL, "left-pad", false).await.unwrap_err();

    assert!(matches!(err, RegistryError::NotFound(ref name) if name == "left-pad"));
    let accepts: Vec<String> = transport.calls().into_iter().map(|(_, a)| a).collect();
    assert_eq!(accepts, vec![CORGI_DOC.to_string(), FULL_DOC.to_string()]);
    assert!(store.is_empty());
}

#[tokio::test]
async fn backoff_retry_honours_retry_after() {
    let transport = Arc::new(
        StubTransport::new()
            .respond_with(RegistryResponse::new(429, "").with_header("retry-after", "0"))
            .respond(200, &body()),
    );
    let retry = BackoffRetry::new(2, Duration::from_millis(1), Duration::from_millis(5));
    let store = PackumentStore::new(transport.clone(), Some(Arc::new(retry)));

    let packument = store.fetch(URL, "left-pad", true).await.unwrap();

    assert_eq!(packument.name, "left-pad");
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn backoff_retry_never_retries_not_found() {
    let transport = Arc::new(StubTransport::new().respond(404, ""));
    let retry = BackoffRetry::new(3, Duration::from_millis(1), Duration::from_millis(5));
    let store = PackumentStore::new(transport.clone(), Some(Arc::new(retry)));

    let err = store.fetch(URL, "left-pad", true).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(transport.call_count(), 1);
}
