//! Adapter from the wire-level transport to the query contract.
//!
//! [`QueryTransport`] is the seam to whatever SDK talks to the remote
//! service. [`RemoteQueryService`] turns it into a [`QueryService`]: it
//! carries the submission defaults, polls status while waiting and pages
//! through results.

use crate::error::{QuarryError, Result};
use crate::info::QueryInfo;
use crate::results::QueryResults;
use crate::service::{QueryHandle, QueryService};
use async_trait::async_trait;
use quarry_common::poll::next_poll_delay;
use quarry_common::{ClientConfig, PollSettings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartQueryRequest {
    pub sql: String,
    pub database: Option<String>,
    pub workgroup: Option<String>,
    pub output_location: Option<String>,
    /// Region the transport should route the execution to, if not its own default.
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: String,
}

/// One page of a result set. `next_token` is `None` on the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPage {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Option<String>>>,
    pub next_token: Option<String>,
}

/// Wire-level operations of the remote service.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Returns the new execution id.
    async fn start_query_execution(&self, request: StartQueryRequest) -> Result<String>;

    async fn get_query_execution(&self, execution_id: &str) -> Result<QueryInfo>;

    async fn get_query_results(
        &self,
        execution_id: &str,
        next_token: Option<String>,
    ) -> Result<ResultPage>;

    async fn stop_query_execution(&self, execution_id: &str) -> Result<()>;
}

/// Innermost layer of every chain.
pub struct RemoteQueryService {
    transport: Arc<dyn QueryTransport>,
    database: Option<String>,
    workgroup: Option<String>,
    output_location: Option<String>,
    region: Option<String>,
    poll: PollSettings,
}

impl RemoteQueryService {
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        Self {
            transport,
            database: None,
            workgroup: None,
            output_location: None,
            region: None,
            poll: PollSettings::default(),
        }
    }

    pub fn from_config(transport: Arc<dyn QueryTransport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            database: config.database.clone(),
            workgroup: config.workgroup.clone(),
            output_location: config.output_location.clone(),
            region: config.region.clone(),
            poll: config.poll,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_workgroup(mut self, workgroup: impl Into<String>) -> Self {
        self.workgroup = Some(workgroup.into());
        self
    }

    pub fn with_output_location(mut self, output_location: impl Into<String>) -> Self {
        self.output_location = Some(output_location.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn output_location(&self) -> Option<&str> {
        self.output_location.as_deref()
    }

    pub fn workgroup(&self) -> Option<&str> {
        self.workgroup.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    fn handle(&self, execution_id: String) -> RemoteQueryHandle {
        RemoteQueryHandle {
            transport: Arc::clone(&self.transport),
            execution_id,
            poll: self.poll,
        }
    }
}

#[async_trait]
impl QueryService for RemoteQueryService {
    fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    async fn submit(&self, sql: &str, _ignore_cache: bool) -> Result<Box<dyn QueryHandle>> {
        let request = StartQueryRequest {
            sql: sql.to_string(),
            database: self.database.clone(),
            workgroup: self.workgroup.clone(),
            output_location: self.output_location.clone(),
            region: self.region.clone(),
        };
        let execution_id = self.transport.start_query_execution(request).await?;
        info!(execution_id = %execution_id, "Query submitted");
        Ok(Box::new(self.handle(execution_id)))
    }

    async fn get_query(&self, execution_id: &str) -> Result<Box<dyn QueryHandle>> {
        Ok(Box::new(self.handle(execution_id.to_string())))
    }
}

pub struct RemoteQueryHandle {
    transport: Arc<dyn QueryTransport>,
    execution_id: String,
    poll: PollSettings,
}

#[async_trait]
impl QueryHandle for RemoteQueryHandle {
    fn execution_id(&self) -> &str {
        &self.execution_id
    }

    async fn get_info(&self) -> Result<QueryInfo> {
        self.transport.get_query_execution(&self.execution_id).await
    }

    async fn get_results(&self, _ignore_cache: bool) -> Result<QueryResults> {
        // Implicit join: nobody can interrupt it, remote failures surface here.
        self.join(&CancellationToken::new()).await?;

        let first_page = self
            .transport
            .get_query_results(&self.execution_id, None)
            .await?;
        let column_names: Vec<String> =
            first_page.columns.iter().map(|c| c.name.clone()).collect();
        let column_types: Vec<String> =
            first_page.columns.iter().map(|c| c.type_tag.clone()).collect();

        let mut data = first_page.rows;
        let mut next_token = first_page.next_token;
        let mut pages = 1usize;
        while let Some(token) = next_token {
            let page = self
                .transport
                .get_query_results(&self.execution_id, Some(token))
                .await?;
            data.extend(page.rows);
            next_token = page.next_token;
            pages += 1;
        }

        // The service echoes column names as the first row for most queries,
        // but not all (e.g. SHOW PARTITIONS). Drop it only on an exact match.
        if data.first().is_some_and(|row| is_header_row(row, &column_names)) {
            data.remove(0);
        }

        debug!(
            execution_id = %self.execution_id,
            pages,
            rows = data.len(),
            "Fetched query results"
        );
        QueryResults::new(column_names, column_types, data)
    }

    async fn kill(&self) -> Result<()> {
        self.transport
            .stop_query_execution(&self.execution_id)
            .await?;
        info!(execution_id = %self.execution_id, "Query stop requested");
        Ok(())
    }

    async fn join(&self, cancel: &CancellationToken) -> Result<Option<QueryInfo>> {
        let mut attempt = 0u32;
        loop {
            let info = self.get_info().await?;
            if info.finished() {
                info.check()?;
                return Ok(Some(info));
            }
            let delay = next_poll_delay(attempt, &self.poll);
            debug!(
                execution_id = %self.execution_id,
                state = %info.state,
                delay_ms = delay.as_millis() as u64,
                "Query not finished yet"
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(QuarryError::Interrupted {
                        execution_id: self.execution_id.clone(),
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt = attempt.saturating_add(1);
        }
    }
}

fn is_header_row(row: &[Option<String>], column_names: &[String]) -> bool {
    row.len() == column_names.len()
        && row
            .iter()
            .zip(column_names)
            .all(|(cell, name)| cell.as_deref() == Some(name.as_str()))
}
