//! Remote Adapter Tests
//!
//! Paging, header handling, failures and decoding over the fake transport.

use quarry_common::PollSettings;
use quarry_core::testing::FakeTransport;
use quarry_core::{
    QuarryError, QueryService, QueryServiceExt, QueryState, RemoteQueryService, Value,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn service(transport: &Arc<FakeTransport>) -> RemoteQueryService {
    RemoteQueryService::new(transport.clone()).with_poll_settings(PollSettings {
        initial_delay_ms: 1,
        max_delay_ms: 1,
    })
}

fn numbers(count: usize) -> Vec<Vec<Option<String>>> {
    (0..count).map(|i| vec![Some(i.to_string())]).collect()
}

#[tokio::test]
async fn results_span_pages() {
    let rows: Vec<String> = (0..25).map(|i| i.to_string()).collect();
    let transport = Arc::new(
        FakeTransport::new()
            .with_results(
                &[("v", "integer")],
                rows.iter().map(|v| vec![Some(v.as_str())]).collect(),
            )
            .with_page_size(10),
    );

    let results = service(&transport)
        .execute("SELECT v FROM t", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(results.data(), numbers(25).as_slice());
    // 26 rows including the echoed header.
    assert_eq!(transport.count("GetQueryResults"), 3);
}

#[tokio::test]
async fn header_row_dropped_only_when_echoed() {
    for echo in [true, false] {
        let transport = Arc::new(
            FakeTransport::new()
                .with_results(&[("id", "integer")], vec![vec![Some("1")]])
                .with_header_echo(echo),
        );
        let results = service(&transport)
            .execute("SELECT 1 id", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.data(), &[vec![Some("1".to_string())]]);
    }
}

#[tokio::test]
async fn data_row_equal_to_names_is_dropped() {
    let transport = Arc::new(
        FakeTransport::new()
            .with_results(&[("partition", "varchar")], vec![vec![Some("partition")]])
            .with_header_echo(false),
    );
    let results = service(&transport)
        .execute("SHOW PARTITIONS t", &CancellationToken::new())
        .await
        .unwrap();
    // Without an echo there is no way to tell; the first row is dropped.
    assert!(results.is_empty());
}

#[tokio::test]
async fn empty_results() {
    let transport = Arc::new(
        FakeTransport::new().with_results(&[("id", "integer"), ("name", "varchar")], vec![]),
    );
    let results = service(&transport)
        .execute("SELECT * FROM t WHERE id < 0", &CancellationToken::new())
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(results.column_names(), &["id".to_string(), "name".to_string()]);
}

#[tokio::test]
async fn submit_does_not_wait() {
    let transport = Arc::new(FakeTransport::new().with_states(vec![QueryState::Running]));
    let query = service(&transport).submit("SELECT 1", false).await.unwrap();

    assert_eq!(query.execution_id(), "query-1");
    assert_eq!(transport.request_names(), vec!["StartQueryExecution"]);
}

#[tokio::test]
async fn join_polls_until_terminal() {
    let transport = Arc::new(FakeTransport::new().with_states(vec![
        QueryState::Queued,
        QueryState::Running,
        QueryState::Running,
        QueryState::Succeeded,
    ]));
    let query = service(&transport).submit("SELECT 1", false).await.unwrap();

    let info = query.join(&CancellationToken::new()).await.unwrap().unwrap();
    assert_eq!(info.state, QueryState::Succeeded);
    assert_eq!(info.sql, "SELECT 1");
    assert_eq!(transport.count("GetQueryExecution"), 4);
}

#[tokio::test]
async fn failure_surfaces_on_implicit_join() {
    let transport = Arc::new(
        FakeTransport::new()
            .with_states(vec![QueryState::Running, QueryState::Failed])
            .with_state_reason("SYNTAX_ERROR"),
    );
    let query = service(&transport).submit("SELEC 1", false).await.unwrap();

    let err = query.get_results(false).await.unwrap_err();
    assert!(matches!(
        err,
        QuarryError::QueryFailed { state: QueryState::Failed, .. }
    ));
    assert_eq!(err.to_string(), "query failed: SYNTAX_ERROR");
    assert_eq!(transport.count("GetQueryResults"), 0);
}

#[tokio::test]
async fn cancelled_query_without_reason() {
    let transport = Arc::new(FakeTransport::new().with_states(vec![QueryState::Cancelled]));
    let err = service(&transport)
        .execute("SELECT 1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "query cancelled");
}

#[tokio::test]
async fn submission_defaults_are_forwarded() {
    let transport = Arc::new(FakeTransport::new());
    let service = service(&transport)
        .with_database("sales")
        .with_workgroup("analysts")
        .with_output_location("s3://bucket/out/")
        .with_region("eu-west-1");
    let query = service.submit("SELECT 1", false).await.unwrap();

    let request = transport.start_requests().remove(0);
    assert_eq!(request.workgroup.as_deref(), Some("analysts"));
    assert_eq!(request.region.as_deref(), Some("eu-west-1"));

    let info = query.get_info().await.unwrap();
    assert_eq!(info.database.as_deref(), Some("sales"));
    assert_eq!(info.output_location.as_deref(), Some("s3://bucket/out/"));
    assert_eq!(service.database(), Some("sales"));
    assert_eq!(service.workgroup(), Some("analysts"));
    assert_eq!(service.region(), Some("eu-west-1"));
}

#[tokio::test]
async fn various_types_decode() {
    let transport = Arc::new(FakeTransport::new().with_results(
        &[
            ("_col0", "varchar"),
            ("unknown_null", "unknown"),
            ("boolean_true", "boolean"),
            ("boolean_false", "boolean"),
            ("boolean_null", "boolean"),
            ("tinyint_value", "tinyint"),
            ("smallint_value", "smallint"),
            ("integer_value", "integer"),
            ("bigint_value", "bigint"),
            ("integer_null", "integer"),
            ("real_value", "real"),
            ("double_value", "double"),
            ("double_null", "double"),
            ("double_nan", "double"),
            ("double_plus_infinity", "double"),
            ("double_minus_infinity", "double"),
            ("char_value", "char(1)"),
            ("char_null", "char(1)"),
            ("varchar_value", "varchar"),
            ("varchar_null", "varchar"),
            ("array_value", "array(varchar)"),
            ("array_null", "array(varchar)"),
            ("map_value", "map(varchar, varchar)"),
            ("map_null", "map(varchar, varchar)"),
        ],
        vec![vec![
            Some("anonymous"),
            None,
            Some("true"),
            Some("false"),
            None,
            Some("1"),
            Some("2"),
            Some("3"),
            Some("4"),
            None,
            Some("0.1"),
            Some("0.2"),
            None,
            Some("NaN"),
            Some("Infinity"),
            Some("-Infinity"),
            Some("a"),
            None,
            Some("b"),
            None,
            Some("[item1, item2]"),
            None,
            Some("{k=v}"),
            None,
        ]],
    ));

    let results = service(&transport)
        .execute("SELECT ...", &CancellationToken::new())
        .await
        .unwrap();
    let row = results.decode_all().unwrap().remove(0);

    assert_eq!(row.get("_col0"), Some(&Value::from("anonymous")));
    assert_eq!(row.get("unknown_null"), Some(&Value::Null));
    assert_eq!(row.get("boolean_true"), Some(&Value::Boolean(true)));
    assert_eq!(row.get("boolean_false"), Some(&Value::Boolean(false)));
    assert_eq!(row.get("boolean_null"), Some(&Value::Null));
    assert_eq!(row.get("tinyint_value"), Some(&Value::Integer(1)));
    assert_eq!(row.get("smallint_value"), Some(&Value::Integer(2)));
    assert_eq!(row.get("integer_value"), Some(&Value::Integer(3)));
    assert_eq!(row.get("bigint_value"), Some(&Value::Integer(4)));
    assert_eq!(row.get("integer_null"), Some(&Value::Null));
    assert_eq!(row.get("real_value"), Some(&Value::Float(0.1)));
    assert_eq!(row.get("double_value"), Some(&Value::Float(0.2)));
    assert_eq!(row.get("double_null"), Some(&Value::Null));
    assert!(row.get("double_nan").and_then(Value::as_f64).unwrap().is_nan());
    assert_eq!(row.get("double_plus_infinity"), Some(&Value::Float(f64::INFINITY)));
    assert_eq!(row.get("double_minus_infinity"), Some(&Value::Float(f64::NEG_INFINITY)));
    assert_eq!(row.get("char_value"), Some(&Value::from("a")));
    assert_eq!(row.get("char_null"), Some(&Value::Null));
    assert_eq!(row.get("varchar_value"), Some(&Value::from("b")));
    assert_eq!(row.get("varchar_null"), Some(&Value::Null));
    assert_eq!(
        row.get("array_value"),
        Some(&Value::Array(vec![Value::from("item1"), Value::from("item2")]))
    );
    assert_eq!(row.get("array_null"), Some(&Value::Null));
    assert_eq!(
        row.get("map_value"),
        Some(&Value::Map(vec![(Value::from("k"), Value::from("v"))]))
    );
    assert_eq!(row.get("map_null"), Some(&Value::Null));
}
