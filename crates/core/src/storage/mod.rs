//! Key-value storage used as the cache backend.
//!
//! Keys are flat strings. Values are written either whole ([`Storage::set`])
//! or streamed through a [`StorageWriter`] that publishes its data on
//! [`StorageWriter::finish`].
//!
//! | URI | Backend |
//! |-----|---------|
//! | `memory:` | [`MemoryStorage`] |
//! | `file:///var/cache/quarry` or `/var/cache/quarry` | [`FileSystemStorage`] |

use crate::error::{QuarryError, Result};
use std::io::{Read, Write};
use std::sync::Arc;

mod file;
mod memory;

pub use file::FileSystemStorage;
pub use memory::MemoryStorage;

pub trait Storage: Send + Sync {
    /// URI identifying this storage, for logging.
    fn uri(&self) -> String;

    fn has(&self, key: &str) -> Result<bool>;

    /// Fails with [`QuarryError::NotFound`] when the key is absent.
    fn get(&self, key: &str) -> Result<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Fails with [`QuarryError::NotFound`] when the key is absent.
    fn reader(&self, key: &str) -> Result<Box<dyn Read + Send>>;

    fn writer(&self, key: &str) -> Result<Box<dyn StorageWriter>>;
}

/// Streaming sink for one storage value.
///
/// Nothing becomes visible under the key until `finish` succeeds. Dropping a
/// writer without finishing discards the data.
pub trait StorageWriter: Write + Send {
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Open the storage named by `uri`.
pub fn storage_from_uri(uri: &str) -> Result<Arc<dyn Storage>> {
    if uri == "memory:" || uri == "memory://" {
        return Ok(Arc::new(MemoryStorage::new()));
    }
    if !uri.contains(':') {
        return Ok(Arc::new(FileSystemStorage::new(uri)));
    }
    let parsed =
        url::Url::parse(uri).map_err(|_| QuarryError::UnsupportedStorage(uri.to_string()))?;
    match parsed.scheme() {
        "file" => {
            let path = parsed
                .to_file_path()
                .map_err(|_| QuarryError::UnsupportedStorage(uri.to_string()))?;
            Ok(Arc::new(FileSystemStorage::new(path)))
        }
        _ => Err(QuarryError::UnsupportedStorage(uri.to_string())),
    }
}
