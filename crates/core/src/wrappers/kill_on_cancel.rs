use crate::error::Result;
use crate::info::QueryInfo;
use crate::results::QueryResults;
use crate::service::{QueryHandle, QueryService};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Stops queries whose wait was cancelled, so nothing keeps running
/// unattended after the caller gives up.
pub struct KillOnCancelService {
    inner: Box<dyn QueryService>,
}

impl KillOnCancelService {
    pub fn new(inner: Box<dyn QueryService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl QueryService for KillOnCancelService {
    fn database(&self) -> Option<&str> {
        self.inner.database()
    }

    async fn submit(&self, sql: &str, ignore_cache: bool) -> Result<Box<dyn QueryHandle>> {
        let query = self.inner.submit(sql, ignore_cache).await?;
        Ok(Box::new(KillOnCancelHandle::new(query)))
    }

    async fn get_query(&self, execution_id: &str) -> Result<Box<dyn QueryHandle>> {
        let query = self.inner.get_query(execution_id).await?;
        Ok(Box::new(KillOnCancelHandle::new(query)))
    }
}

pub struct KillOnCancelHandle {
    inner: Box<dyn QueryHandle>,
}

impl KillOnCancelHandle {
    pub fn new(inner: Box<dyn QueryHandle>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl QueryHandle for KillOnCancelHandle {
    fn execution_id(&self) -> &str {
        self.inner.execution_id()
    }

    async fn get_info(&self) -> Result<QueryInfo> {
        self.inner.get_info().await
    }

    async fn get_results(&self, ignore_cache: bool) -> Result<QueryResults> {
        self.inner.get_results(ignore_cache).await
    }

    async fn kill(&self) -> Result<()> {
        self.inner.kill().await
    }

    async fn join(&self, cancel: &CancellationToken) -> Result<Option<QueryInfo>> {
        match self.inner.join(cancel).await {
            Err(e) if e.is_interrupted() => {
                // One attempt, not tied to the token that already fired.
                warn!(
                    execution_id = %self.inner.execution_id(),
                    "Wait interrupted, stopping query"
                );
                if let Err(kill_err) = self.inner.kill().await {
                    warn!(
                        execution_id = %self.inner.execution_id(),
                        error = %kill_err,
                        "Failed to stop interrupted query"
                    );
                }
                Err(e)
            }
            other => other,
        }
    }
}
