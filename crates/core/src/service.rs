//! The remote query contract.
//!
//! A [`QueryService`] submits SQL and re-attaches to past executions. Each
//! execution is represented by a [`QueryHandle`]. Every layer in this crate,
//! the remote adapter and all wrappers alike, implements both traits, so
//! layers stack in any order.
//!
//! ```text
//!  caller
//!    │ submit(sql)
//!    ▼
//!  KillOnCancelService ──► NormalizingService ──► CachingService ──► RemoteQueryService
//!    ▲                                                                     │
//!    └──────────── handle wrapped again on the way out ◄──────────────────┘
//! ```

use crate::error::Result;
use crate::info::QueryInfo;
use crate::results::QueryResults;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait QueryService: Send + Sync {
    /// Database used for unqualified table names, if configured.
    fn database(&self) -> Option<&str>;

    /// Submit a query. `ignore_cache` forces a fresh execution in caching
    /// layers; the new execution id is still written back to the cache.
    async fn submit(&self, sql: &str, ignore_cache: bool) -> Result<Box<dyn QueryHandle>>;

    /// Re-attach to an execution by id. Never contacts the service by itself.
    async fn get_query(&self, execution_id: &str) -> Result<Box<dyn QueryHandle>>;
}

#[async_trait]
pub trait QueryHandle: Send + Sync {
    fn execution_id(&self) -> &str;

    /// Current status and statistics.
    async fn get_info(&self) -> Result<QueryInfo>;

    /// Fetch the complete result set, waiting for the query if needed.
    /// `ignore_cache` forces a remote fetch in caching layers.
    async fn get_results(&self, ignore_cache: bool) -> Result<QueryResults>;

    /// Ask the service to stop the query.
    async fn kill(&self) -> Result<()>;

    /// Wait until the query reaches a terminal state.
    ///
    /// Returns the final [`QueryInfo`], or `None` when a layer could prove
    /// completion without asking the service. Fails with
    /// [`QueryFailed`](crate::QuarryError::QueryFailed) if the query did not
    /// succeed, and with [`Interrupted`](crate::QuarryError::Interrupted) if
    /// `cancel` fires first.
    async fn join(&self, cancel: &CancellationToken) -> Result<Option<QueryInfo>>;
}

/// Convenience operations available on every service.
#[async_trait]
pub trait QueryServiceExt: QueryService {
    /// Submit, wait for completion and fetch results.
    async fn execute(&self, sql: &str, cancel: &CancellationToken) -> Result<QueryResults> {
        self.execute_with(sql, false, cancel).await
    }

    async fn execute_with(
        &self,
        sql: &str,
        ignore_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<QueryResults> {
        let query = self.submit(sql, ignore_cache).await?;
        query.join(cancel).await?;
        query.get_results(ignore_cache).await
    }
}

impl<T: QueryService + ?Sized> QueryServiceExt for T {}
