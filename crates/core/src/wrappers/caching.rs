//! Two cache tiers over any [`Storage`]:
//!
//! * execution ids, keyed by database and SQL, so resubmitting the same query
//!   re-attaches to the earlier execution instead of running it again;
//! * optionally, full result sets keyed by execution id. A handle whose
//!   results are cached is known to be finished, so it can be joined and read
//!   without talking to the service at all.

use crate::cache_key::{execution_cache_key, results_cache_key};
use crate::codec;
use crate::error::{QuarryError, Result};
use crate::info::QueryInfo;
use crate::results::QueryResults;
use crate::service::{QueryHandle, QueryService};
use crate::storage::Storage;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct CachingService {
    inner: Box<dyn QueryService>,
    storage: Arc<dyn Storage>,
    cache_results: bool,
}

impl CachingService {
    pub fn new(
        inner: Box<dyn QueryService>,
        storage: Arc<dyn Storage>,
        cache_results: bool,
    ) -> Self {
        Self {
            inner,
            storage,
            cache_results,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn cache_results(&self) -> bool {
        self.cache_results
    }

    async fn load_execution_id(&self, key: &str) -> Result<Option<String>> {
        let key_owned = key.to_string();
        let loaded = with_storage(&self.storage, move |storage| storage.get(&key_owned)).await?;
        match loaded {
            Ok(execution_id) => {
                info!(
                    target: "cache",
                    storage = %self.storage.uri(),
                    key = %key,
                    execution_id = %execution_id,
                    "Loaded execution id from cache"
                );
                Ok(Some(execution_id))
            }
            Err(e) if e.is_not_found() => {
                debug!(target: "cache", storage = %self.storage.uri(), key = %key, "Cache miss");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn save_execution_id(&self, key: &str, execution_id: &str) -> Result<()> {
        let (key_owned, id_owned) = (key.to_string(), execution_id.to_string());
        with_storage(&self.storage, move |storage| storage.set(&key_owned, &id_owned)).await??;
        info!(
            target: "cache",
            storage = %self.storage.uri(),
            key = %key,
            execution_id = %execution_id,
            "Saved execution id to cache"
        );
        Ok(())
    }

    fn wrap(&self, query: Box<dyn QueryHandle>) -> Box<dyn QueryHandle> {
        if self.cache_results {
            Box::new(CachingQueryHandle::new(query, Arc::clone(&self.storage)))
        } else {
            query
        }
    }
}

#[async_trait]
impl QueryService for CachingService {
    fn database(&self) -> Option<&str> {
        self.inner.database()
    }

    async fn submit(&self, sql: &str, ignore_cache: bool) -> Result<Box<dyn QueryHandle>> {
        let key = execution_cache_key(self.database(), sql);

        if !ignore_cache {
            if let Some(execution_id) = self.load_execution_id(&key).await? {
                return self.get_query(&execution_id).await;
            }
        }

        let query = self.inner.submit(sql, ignore_cache).await?;
        self.save_execution_id(&key, query.execution_id()).await?;
        Ok(self.wrap(query))
    }

    async fn get_query(&self, execution_id: &str) -> Result<Box<dyn QueryHandle>> {
        let query = self.inner.get_query(execution_id).await?;
        Ok(self.wrap(query))
    }
}

/// Handle that keeps fetched results in storage.
pub struct CachingQueryHandle {
    inner: Box<dyn QueryHandle>,
    storage: Arc<dyn Storage>,
}

impl CachingQueryHandle {
    pub fn new(inner: Box<dyn QueryHandle>, storage: Arc<dyn Storage>) -> Self {
        Self { inner, storage }
    }

    async fn load_results(&self, key: &str) -> Result<Option<QueryResults>> {
        let key_owned = key.to_string();
        let loaded = with_storage(&self.storage, move |storage| {
            let reader = storage.reader(&key_owned)?;
            codec::read_results(reader, &key_owned)
        })
        .await?;

        match loaded {
            Ok(results) => {
                info!(
                    target: "cache",
                    storage = %self.storage.uri(),
                    key = %key,
                    rows = results.len(),
                    "Loaded results from cache"
                );
                Ok(Some(results))
            }
            Err(e) if e.is_not_found() => {
                debug!(target: "cache", storage = %self.storage.uri(), key = %key, "Cache miss");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn save_results(&self, key: &str, results: QueryResults) -> Result<QueryResults> {
        let key_owned = key.to_string();
        let results = with_storage(&self.storage, move |storage| {
            let mut writer = storage.writer(&key_owned)?;
            codec::write_results(&results, &mut writer)
                .map_err(|e| QuarryError::storage(storage.uri(), e.into()))?;
            writer.finish()?;
            Ok::<_, QuarryError>(results)
        })
        .await??;

        info!(
            target: "cache",
            storage = %self.storage.uri(),
            key = %key,
            rows = results.len(),
            "Saved results to cache"
        );
        Ok(results)
    }
}

#[async_trait]
impl QueryHandle for CachingQueryHandle {
    fn execution_id(&self) -> &str {
        self.inner.execution_id()
    }

    async fn get_info(&self) -> Result<QueryInfo> {
        self.inner.get_info().await
    }

    async fn get_results(&self, ignore_cache: bool) -> Result<QueryResults> {
        let key = results_cache_key(self.execution_id());

        if !ignore_cache {
            if let Some(results) = self.load_results(&key).await? {
                return Ok(results);
            }
        }

        let results = self.inner.get_results(ignore_cache).await?;
        self.save_results(&key, results).await
    }

    async fn kill(&self) -> Result<()> {
        self.inner.kill().await
    }

    async fn join(&self, cancel: &CancellationToken) -> Result<Option<QueryInfo>> {
        let key = results_cache_key(self.execution_id());
        if with_storage(&self.storage, move |storage| storage.has(&key)).await?? {
            debug!(
                target: "cache",
                execution_id = %self.execution_id(),
                "Results cached, query already finished"
            );
            return Ok(None);
        }
        self.inner.join(cancel).await
    }
}

/// Run a storage call on the blocking pool.
async fn with_storage<T, F>(storage: &Arc<dyn Storage>, f: F) -> Result<T>
where
    F: FnOnce(&dyn Storage) -> T + Send + 'static,
    T: Send + 'static,
{
    let storage = Arc::clone(storage);
    Ok(tokio::task::spawn_blocking(move || f(storage.as_ref())).await?)
}
