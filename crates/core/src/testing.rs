//! In-memory [`QueryTransport`] for tests and local experiments.

use crate::error::{QuarryError, Result};
use crate::info::{QueryInfo, QueryState};
use crate::remote::{ColumnInfo, QueryTransport, ResultPage, StartQueryRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// One call received by [`FakeTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    StartQueryExecution { sql: String, database: Option<String> },
    GetQueryExecution { execution_id: String },
    GetQueryResults { execution_id: String, next_token: Option<String> },
    StopQueryExecution { execution_id: String },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::StartQueryExecution { .. } => "StartQueryExecution",
            Request::GetQueryExecution { .. } => "GetQueryExecution",
            Request::GetQueryResults { .. } => "GetQueryResults",
            Request::StopQueryExecution { .. } => "StopQueryExecution",
        }
    }
}

struct Execution {
    sql: String,
    database: Option<String>,
    output_location: Option<String>,
    polls: usize,
    stopped: bool,
}

struct FakeState {
    requests: Vec<Request>,
    start_requests: Vec<StartQueryRequest>,
    next_id: u64,
    executions: HashMap<String, Execution>,
}

/// Scripted stand-in for the remote service.
///
/// Execution ids are `query-1`, `query-2`, ... Each status request for an
/// execution advances through the scripted states and then repeats the last
/// one. Stopping a query moves it to CANCELLED.
pub struct FakeTransport {
    column_names: Vec<String>,
    column_types: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    page_size: usize,
    echo_header: bool,
    states: Vec<QueryState>,
    state_reason: Option<String>,
    fail_stop: bool,
    state: Mutex<FakeState>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTransport {
    /// Answers every query with the single row of `SELECT 1`.
    pub fn new() -> Self {
        Self {
            column_names: vec!["_col0".to_string()],
            column_types: vec!["integer".to_string()],
            rows: vec![vec![Some("1".to_string())]],
            page_size: 1000,
            echo_header: true,
            states: vec![QueryState::Succeeded],
            state_reason: None,
            fail_stop: false,
            state: Mutex::new(FakeState {
                requests: Vec::new(),
                start_requests: Vec::new(),
                next_id: 1,
                executions: HashMap::new(),
            }),
        }
    }

    pub fn with_results(
        mut self,
        columns: &[(&str, &str)],
        rows: Vec<Vec<Option<&str>>>,
    ) -> Self {
        self.column_names = columns.iter().map(|(name, _)| name.to_string()).collect();
        self.column_types = columns.iter().map(|(_, tag)| tag.to_string()).collect();
        self.rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.map(str::to_string)).collect())
            .collect();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Whether the first result row repeats the column names.
    pub fn with_header_echo(mut self, echo_header: bool) -> Self {
        self.echo_header = echo_header;
        self
    }

    pub fn with_states(mut self, states: Vec<QueryState>) -> Self {
        if !states.is_empty() {
            self.states = states;
        }
        self
    }

    pub fn with_state_reason(mut self, reason: impl Into<String>) -> Self {
        self.state_reason = Some(reason.into());
        self
    }

    /// Make `stop_query_execution` fail after logging the request.
    pub fn with_failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn request_log(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Names of the requests received so far, in order.
    pub fn request_names(&self) -> Vec<&'static str> {
        self.lock().requests.iter().map(Request::name).collect()
    }

    /// Full submission requests, in order.
    pub fn start_requests(&self) -> Vec<StartQueryRequest> {
        self.lock().start_requests.clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|request| request.name() == name)
            .count()
    }

    pub fn clear_log(&self) {
        self.lock().requests.clear();
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn all_rows(&self) -> Vec<Vec<Option<String>>> {
        let mut rows = Vec::with_capacity(self.rows.len() + 1);
        if self.echo_header {
            rows.push(self.column_names.iter().cloned().map(Some).collect());
        }
        rows.extend(self.rows.iter().cloned());
        rows
    }
}

#[async_trait]
impl QueryTransport for FakeTransport {
    async fn start_query_execution(&self, request: StartQueryRequest) -> Result<String> {
        let mut state = self.lock();
        state.requests.push(Request::StartQueryExecution {
            sql: request.sql.clone(),
            database: request.database.clone(),
        });
        state.start_requests.push(request.clone());
        let execution_id = format!("query-{}", state.next_id);
        state.next_id += 1;
        state.executions.insert(
            execution_id.clone(),
            Execution {
                sql: request.sql,
                database: request.database,
                output_location: request.output_location,
                polls: 0,
                stopped: false,
            },
        );
        Ok(execution_id)
    }

    async fn get_query_execution(&self, execution_id: &str) -> Result<QueryInfo> {
        let mut state = self.lock();
        state.requests.push(Request::GetQueryExecution {
            execution_id: execution_id.to_string(),
        });

        // Ids from an earlier process are still known to the real service.
        let execution = state
            .executions
            .entry(execution_id.to_string())
            .or_insert_with(|| Execution {
                sql: String::new(),
                database: None,
                output_location: None,
                polls: 0,
                stopped: false,
            });

        let query_state = if execution.stopped {
            QueryState::Cancelled
        } else {
            let index = execution.polls.min(self.states.len() - 1);
            execution.polls += 1;
            self.states[index]
        };
        let state_reason = match query_state {
            QueryState::Failed | QueryState::Cancelled => self.state_reason.clone(),
            _ => None,
        };

        Ok(QueryInfo {
            execution_id: execution_id.to_string(),
            sql: execution.sql.clone(),
            database: execution.database.clone(),
            output_location: execution.output_location.clone(),
            state: query_state,
            state_reason,
            scanned_bytes: 0,
            execution_time: Duration::from_millis(execution.polls as u64),
        })
    }

    async fn get_query_results(
        &self,
        execution_id: &str,
        next_token: Option<String>,
    ) -> Result<ResultPage> {
        self.lock().requests.push(Request::GetQueryResults {
            execution_id: execution_id.to_string(),
            next_token: next_token.clone(),
        });

        let start = match &next_token {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                QuarryError::Transport(anyhow::anyhow!("invalid pagination token {:?}", token))
            })?,
        };
        let rows = self.all_rows();
        let end = (start + self.page_size).min(rows.len());
        let next_token = (end < rows.len()).then(|| end.to_string());

        Ok(ResultPage {
            columns: self
                .column_names
                .iter()
                .zip(&self.column_types)
                .map(|(name, type_tag)| ColumnInfo {
                    name: name.clone(),
                    type_tag: type_tag.clone(),
                })
                .collect(),
            rows: rows.get(start..end).map(<[_]>::to_vec).unwrap_or_default(),
            next_token,
        })
    }

    async fn stop_query_execution(&self, execution_id: &str) -> Result<()> {
        let mut state = self.lock();
        state.requests.push(Request::StopQueryExecution {
            execution_id: execution_id.to_string(),
        });
        if self.fail_stop {
            return Err(QuarryError::Transport(anyhow::anyhow!(
                "stop rejected for {}",
                execution_id
            )));
        }
        if let Some(execution) = state.executions.get_mut(execution_id) {
            execution.stopped = true;
        }
        Ok(())
    }
}
