//! Decorators over the query contract.
//!
//! Each wrapper owns the layer it wraps, delegates every call it does not
//! care about, and re-wraps the handles it returns so later calls on the
//! handle pass through the same chain.

pub mod caching;
pub mod kill_on_cancel;
pub mod normalize;

pub use caching::{CachingQueryHandle, CachingService};
pub use kill_on_cancel::{KillOnCancelHandle, KillOnCancelService};
pub use normalize::{normalize_sql, NormalizingService};
