use std::sync::Arc;
use std::time::Duration;

use bridge::{
    client::{CircuitBreaker, CircuitBreakerConfig},
    error::ApiError,
    kv::{self, KvStore, MemoryKvStore},
    types::{CircuitState, CircuitStatus},
};
use chrono::Utc;
use proptest::prelude::*;

fn config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        enabled: true,
        failure_threshold: 5,
        timeout: Duration::from_secs(300),
        state_ttl: Duration::from_secs(24 * 60 * 60),
        key: "test:circuit".to_string(),
    }
}

fn network_error() -> ApiError {
    ApiError::Connection("connection refused".to_string())
}

fn breaker(store: &Arc<MemoryKvStore>, config: CircuitBreakerConfig) -> CircuitBreaker {
    let store: Arc<dyn KvStore> = store.clone();
    CircuitBreaker::new(store, config)
}

#[tokio::test]
async fn opens_after_threshold_consecutive_failures() {
    let store = Arc::new(MemoryKvStore::new());
    let breaker = breaker(&store, config());

    for _ in 0..4 {
        breaker.record_failure(&network_error()).await.expect("record");
    }
    assert!(breaker.can_execute().await.is_ok());
    assert_eq!(breaker.state().await.expect("state").state, CircuitStatus::Closed);

    breaker.record_failure(&network_error()).await.expect("record");
    let state = breaker.state().await.expect("state");
    assert_eq!(state.state, CircuitStatus::Open);
    assert_eq!(state.failure_count, 5);
    assert_eq!(state.last_error.as_deref(), Some("connection failed: connection refused"));

    let opened_at = state.opened_at.expect("opened_at stamped");
    match breaker.can_execute().await {
        Err(ApiError::CircuitOpen { retry_at }) => {
            assert_eq!(retry_at, opened_at + chrono::Duration::seconds(300));
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
}

#[tokio::test]
async fn success_resets_failure_count() {
    let store = Arc::new(MemoryKvStore::new());
    let breaker = breaker(&store, config());

    for _ in 0..4 {
        breaker.record_failure(&network_error()).await.expect("record");
    }
    breaker.record_success().await.expect("record");
    breaker.record_failure(&network_error()).await.expect("record");

    let state = breaker.state().await.expect("state");
    assert_eq!(state.state, CircuitStatus::Closed);
    assert_eq!(state.failure_count, 1);
}

#[tokio::test]
async fn failures_while_open_keep_original_open_time() {
    let store = Arc::new(MemoryKvStore::new());
    let breaker = breaker(&store, config());

    for _ in 0..5 {
        breaker.record_failure(&network_error()).await.expect("record");
    }
    let opened_at = breaker.state().await.expect("state").opened_at;

    breaker.record_failure(&network_error()).await.expect("record");
    let state = breaker.state().await.expect("state");
    assert_eq!(state.opened_at, opened_at);
    assert_eq!(state.failure_count, 6);
}

#[tokio::test]
async fn open_circuit_allows_probe_after_timeout() {
    let store = Arc::new(MemoryKvStore::new());
    let config = config();
    let breaker = breaker(&store, config.clone());

    let stale = CircuitState {
        state: CircuitStatus::Open,
        failure_count: 5,
        last_failure_at: Some(Utc::now() - chrono::Duration::seconds(301)),
        opened_at: Some(Utc::now() - chrono::Duration::seconds(301)),
        last_error: Some("server error 503: down".to_string()),
    };
    kv::set_json(store.as_ref(), &config.key, &stale, None)
        .await
        .expect("seed state");

    breaker.can_execute().await.expect("probe allowed");
    assert_eq!(breaker.state().await.expect("state").state, CircuitStatus::HalfOpen);

    breaker.record_success().await.expect("record");
    let state = breaker.state().await.expect("state");
    assert_eq!(state.state, CircuitStatus::Closed);
    assert_eq!(state.failure_count, 0);
}

#[tokio::test]
async fn failed_probe_reopens_circuit() {
    let store = Arc::new(MemoryKvStore::new());
    let config = config();
    let breaker = breaker(&store, config.clone());

    let half_open = CircuitState {
        state: CircuitStatus::HalfOpen,
        failure_count: 5,
        opened_at: Some(Utc::now() - chrono::Duration::seconds(400)),
        ..CircuitState::default()
    };
    kv::set_json(store.as_ref(), &config.key, &half_open, None)
        .await
        .expect("seed state");

    breaker.record_failure(&network_error()).await.expect("record");

    let state = breaker.state().await.expect("state");
    assert_eq!(state.state, CircuitStatus::Open);
    let reopened = state.opened_at.expect("opened_at");
    assert!(Utc::now() - reopened < chrono::Duration::seconds(5));
    assert!(matches!(
        breaker.can_execute().await,
        Err(ApiError::CircuitOpen { .. })
    ));
}

#[tokio::test]
async fn state_is_shared_through_the_store() {
    let store = Arc::new(MemoryKvStore::new());
    let first = breaker(&store, config());
    let second = breaker(&store, config());

    for _ in 0..5 {
        first.record_failure(&network_error()).await.expect("record");
    }

    assert!(matches!(
        second.can_execute().await,
        Err(ApiError::CircuitOpen { .. })
    ));

    second.force_reset().await.expect("reset");
    assert!(first.can_execute().await.is_ok());
    assert_eq!(first.state().await.expect("state"), CircuitState::default());
}

#[tokio::test]
async fn disabled_breaker_never_blocks() {
    let store = Arc::new(MemoryKvStore::new());
    let breaker = breaker(
        &store,
        CircuitBreakerConfig {
            enabled: false,
            ..config()
        },
    );

    for _ in 0..10 {
        breaker.record_failure(&network_error()).await.expect("record");
    }

    assert!(breaker.can_execute().await.is_ok());
    assert!(store.is_empty());
    let metrics = breaker.metrics().await.expect("metrics");
    assert!(!metrics.enabled);
    assert!(metrics.can_execute);
}

#[tokio::test]
async fn metrics_report_next_retry_time_when_open() {
    let store = Arc::new(MemoryKvStore::new());
    let breaker = breaker(&store, config());

    for _ in 0..5 {
        breaker.record_failure(&network_error()).await.expect("record");
    }

    let metrics = breaker.metrics().await.expect("metrics");
    assert_eq!(metrics.state, CircuitStatus::Open);
    assert_eq!(metrics.failure_count, 5);
    assert_eq!(metrics.failure_threshold, 5);
    assert!(!metrics.can_execute);
    assert!(metrics.next_retry_time.expect("retry time") > Utc::now());
}

proptest! {
    #[test]
    fn circuit_opens_exactly_at_threshold(threshold in 1u32..8, failures in 0u32..16) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        let (state, allowed) = runtime.block_on(async {
            let store = Arc::new(MemoryKvStore::new());
            let breaker = breaker(&store, CircuitBreakerConfig {
                failure_threshold: threshold,
                ..config()
            });
            for _ in 0..failures {
                breaker.record_failure(&network_error()).await.expect("record");
            }
            let allowed = breaker.can_execute().await.is_ok();
            (breaker.state().await.expect("state"), allowed)
        });

        let should_open = failures >= threshold;
        prop_assert_eq!(state.state == CircuitStatus::Open, should_open);
        prop_assert_eq!(allowed, !should_open);
        prop_assert_eq!(state.failure_count, failures);
    }
}
