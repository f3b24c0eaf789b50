//! Storage keys used by the caching layers.

use sha2::{Digest, Sha256};

pub const QUERY_KEY_PREFIX: &str = "query-";
pub const RESULTS_KEY_PREFIX: &str = "results-";

/// Key of the execution-id entry for `sql` submitted against `database`.
///
/// The pair is URL-encoded in a fixed field order and hashed, so the key is
/// stable across processes and safe for any storage backend.
pub fn execution_cache_key(database: Option<&str>, sql: &str) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    if let Some(database) = database {
        serializer.append_pair("database", database);
    }
    serializer.append_pair("sql", sql);
    let encoded = serializer.finish();

    let digest = Sha256::digest(encoded.as_bytes());
    format!("{}{:x}", QUERY_KEY_PREFIX, digest)
}

pub fn results_cache_key(execution_id: &str) -> String {
    format!("{}{}", RESULTS_KEY_PREFIX, execution_id)
}
