//! Wrapper Chain Tests
//!
//! Kill-on-cancel and normalization layers over the fake transport.

use quarry_common::PollSettings;
use quarry_core::testing::{FakeTransport, Request};
use quarry_core::wrappers::{CachingService, KillOnCancelService, NormalizingService};
use quarry_core::{MemoryStorage, QuarryError, QueryService, QueryState, RemoteQueryService};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn remote(transport: &Arc<FakeTransport>) -> Box<dyn QueryService> {
    Box::new(RemoteQueryService::new(transport.clone()).with_poll_settings(PollSettings {
        initial_delay_ms: 1,
        max_delay_ms: 2,
    }))
}

#[tokio::test]
async fn cancelled_wait_stops_the_query() {
    let transport = Arc::new(FakeTransport::new().with_states(vec![QueryState::Running]));
    let service = KillOnCancelService::new(remote(&transport));

    let query = service.submit("SELECT 1", false).await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = query.join(&cancel).await.unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(transport.count("StopQueryExecution"), 1);
    assert_eq!(
        transport.request_log().last(),
        Some(&Request::StopQueryExecution {
            execution_id: "query-1".to_string()
        })
    );
}

#[tokio::test]
async fn cancel_during_polling_stops_the_query() {
    let transport = Arc::new(FakeTransport::new().with_states(vec![QueryState::Running]));
    let service = KillOnCancelService::new(remote(&transport));
    let query = service.submit("SELECT 1", false).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = query.join(&cancel).await.unwrap_err();
    assert!(matches!(
        err,
        QuarryError::Interrupted { ref execution_id } if execution_id == "query-1"
    ));
    assert!(transport.count("GetQueryExecution") >= 1);
    assert_eq!(transport.count("StopQueryExecution"), 1);

    // The stopped query is now reported as cancelled.
    let info = query.get_info().await.unwrap();
    assert_eq!(info.state, QueryState::Cancelled);
}

#[tokio::test]
async fn failed_stop_still_reports_interruption() {
    let transport = Arc::new(
        FakeTransport::new()
            .with_states(vec![QueryState::Running])
            .with_failing_stop(),
    );
    let service = KillOnCancelService::new(remote(&transport));
    let query = service.submit("SELECT 1", false).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = query.join(&cancel).await.unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(transport.count("StopQueryExecution"), 1);
}

#[tokio::test]
async fn without_the_wrapper_nothing_is_stopped() {
    let transport = Arc::new(FakeTransport::new().with_states(vec![QueryState::Running]));
    let service = remote(&transport);

    let query = service.submit("SELECT 1", false).await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(query.join(&cancel).await.unwrap_err().is_interrupted());
    assert_eq!(transport.count("StopQueryExecution"), 0);
}

#[tokio::test]
async fn failures_are_not_killed() {
    let transport = Arc::new(
        FakeTransport::new()
            .with_states(vec![QueryState::Failed])
            .with_state_reason("line 1:8: Column 'x' cannot be resolved"),
    );
    let service = KillOnCancelService::new(remote(&transport));

    let query = service.submit("SELECT x", false).await.unwrap();
    let err = query.join(&CancellationToken::new()).await.unwrap_err();

    match err {
        QuarryError::QueryFailed { state, reason, .. } => {
            assert_eq!(state, QueryState::Failed);
            assert_eq!(reason.as_deref(), Some("line 1:8: Column 'x' cannot be resolved"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(transport.count("StopQueryExecution"), 0);
}

#[tokio::test]
async fn reattached_handles_are_wrapped_too() {
    let transport = Arc::new(FakeTransport::new().with_states(vec![QueryState::Queued]));
    let service = KillOnCancelService::new(remote(&transport));

    let query = service.get_query("query-42").await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(query.join(&cancel).await.unwrap_err().is_interrupted());
    assert_eq!(transport.count("StopQueryExecution"), 1);
}

#[tokio::test]
async fn normalized_sql_shares_cache_entry() {
    let transport = Arc::new(FakeTransport::new());
    let service = NormalizingService::new(Box::new(CachingService::new(
        remote(&transport),
        Arc::new(MemoryStorage::new()),
        false,
    )));

    let a = service.submit("SELECT  1\n", false).await.unwrap();
    let b = service.submit("\tSELECT 1", false).await.unwrap();

    assert_eq!(a.execution_id(), b.execution_id());
    assert_eq!(
        transport.request_log()[0],
        Request::StartQueryExecution {
            sql: "SELECT 1".to_string(),
            database: None
        }
    );
}
