//! Quarry Core: client layer for asynchronous SQL query services.
//!
//! A remote service accepts SQL, runs it in the background and hands out an
//! execution id. This crate wraps such a service in composable layers that
//! cache execution ids and results, canonicalize SQL text and stop queries
//! whose wait was cancelled.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   submit / get_query    ┌──────────────┐
//! │    caller    │ ──────────────────────► │ wrapper chain│
//! └──────────────┘                         └──────┬───────┘
//!                                                 │
//!                                    ┌────────────┴────────────┐
//!                                    │ RemoteQueryService      │
//!                                    │  └─ dyn QueryTransport  │
//!                                    └─────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use quarry_core::testing::FakeTransport;
//! use quarry_core::{setup, QueryServiceExt};
//! use quarry_common::ClientConfig;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> quarry_core::Result<()> {
//! let service = setup(&ClientConfig::default(), Arc::new(FakeTransport::new()))?;
//! let results = service.execute("SELECT 1", &CancellationToken::new()).await?;
//! for row in results.rows() {
//!     println!("{:?}", row?.values());
//! }
//! # Ok(())
//! # }
//! ```

pub mod assembly;
pub mod cache_key;
pub mod codec;
pub mod decode;
pub mod error;
pub mod info;
pub mod remote;
pub mod results;
pub mod service;
pub mod storage;
pub mod testing;
pub mod types;
pub mod wrappers;

pub use assembly::setup;
pub use decode::Value;
pub use error::{QuarryError, Result};
pub use info::{QueryInfo, QueryState};
pub use remote::{QueryTransport, RemoteQueryService};
pub use results::{QueryResults, Row, Rows};
pub use service::{QueryHandle, QueryService, QueryServiceExt};
pub use storage::{storage_from_uri, FileSystemStorage, MemoryStorage, Storage, StorageWriter};
pub use types::DataType;
pub use tokio_util::sync::CancellationToken;
