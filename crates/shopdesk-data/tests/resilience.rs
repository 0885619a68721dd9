//! Timeout and retry behaviour as seen through the services.

mod common;

use std::time::Duration;

use common::*;
use shopdesk_data::{ApiError, DataError, ErrorCode, ProductFilter};
use shopdesk_store::{RetryClass, StoreError};

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let h = harness();
    h.store.fail_next(StoreError::Network("Failed to fetch".into()));
    h.store.fail_next(StoreError::Backend("TypeError: network request failed".into()));

    let products = h.layer.products().list(&ProductFilter::default()).await.unwrap();
    assert!(products.is_empty());
    assert_eq!(h.store.calls().select, 3);
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() {
    let h = harness();
    for _ in 0..4 {
        h.store.fail_next(StoreError::Aborted("AbortError".into()));
    }

    let err = h.layer.users().list().await.unwrap_err();
    assert_eq!(err.retry_class(), RetryClass::Transient);
    assert_eq!(h.store.calls().select, 4);

    let api: ApiError = err.into();
    assert_eq!(api.code, ErrorCode::NetworkError);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_is_not_retried_or_cached() {
    let h = harness();
    h.store.fail_next(StoreError::Backend("permission denied for table products".into()));

    let err = h.layer.products().list(&ProductFilter::default()).await.unwrap_err();
    assert!(matches!(err, DataError::Store(StoreError::Backend(_))));
    assert_eq!(h.store.calls().select, 1);
    assert!(!h.layer.cache().contains("products").await);

    h.layer.products().list(&ProductFilter::default()).await.unwrap();
    assert_eq!(h.store.calls().select, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_request_propagates_immediately() {
    let h = harness();
    h.store.fail_next(StoreError::Cancelled);

    let err = h.layer.sales().list().await.unwrap_err();
    assert_eq!(err.retry_class(), RetryClass::Cancelled);
    assert_eq!(h.store.calls().select, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out_with_message() {
    let h = harness();
    h.store.set_latency(Duration::from_secs(20));

    let err = h.layer.purchases().list().await.unwrap_err();
    match &err {
        DataError::Timeout(message) => assert_eq!(message, "Timed out loading purchases"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.store.calls().select, 1);

    let api: ApiError = err.into();
    assert_eq!(api.code, ErrorCode::Timeout);
}
