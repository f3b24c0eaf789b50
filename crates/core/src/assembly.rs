//! Builds the standard wrapper chain from configuration.

use crate::error::Result;
use crate::remote::{QueryTransport, RemoteQueryService};
use crate::service::QueryService;
use crate::storage::storage_from_uri;
use crate::wrappers::{CachingService, KillOnCancelService, NormalizingService};
use quarry_common::ClientConfig;
use std::sync::Arc;
use tracing::info;

/// Assemble a [`QueryService`] over `transport`.
///
/// Layers, innermost first:
///
/// 1. the remote adapter,
/// 2. execution-id cache in `cache_remote`, if set,
/// 3. execution-id and results cache in `cache_local`, if set,
/// 4. SQL normalization, if enabled,
/// 5. kill-on-cancel, if enabled.
///
/// Normalization sits outside both caches so keys are computed from the
/// canonical SQL.
pub fn setup(
    config: &ClientConfig,
    transport: Arc<dyn QueryTransport>,
) -> Result<Box<dyn QueryService>> {
    let mut service: Box<dyn QueryService> =
        Box::new(RemoteQueryService::from_config(transport, config));

    if let Some(uri) = &config.cache_remote {
        let storage = storage_from_uri(uri)?;
        info!(storage = %storage.uri(), "Caching execution ids");
        service = Box::new(CachingService::new(service, storage, false));
    }

    if let Some(uri) = &config.cache_local {
        let storage = storage_from_uri(uri)?;
        info!(storage = %storage.uri(), "Caching execution ids and results");
        service = Box::new(CachingService::new(service, storage, true));
    }

    if config.normalize {
        service = Box::new(NormalizingService::new(service));
    }

    if config.kill_on_interrupt {
        service = Box::new(KillOnCancelService::new(service));
    }

    Ok(service)
}
