use super::{Storage, StorageWriter};
use crate::error::{QuarryError, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

type Entries = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// Process-local storage. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Entries,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.entries).keys().cloned().collect();
        keys.sort();
        keys
    }
}

// A poisoned lock only means another writer panicked mid-insert; the map
// itself is still consistent.
fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Storage for MemoryStorage {
    fn uri(&self) -> String {
        "memory:".to_string()
    }

    fn has(&self, key: &str) -> Result<bool> {
        Ok(lock(&self.entries).contains_key(key))
    }

    fn get(&self, key: &str) -> Result<String> {
        let entries = lock(&self.entries);
        let bytes = entries.get(key).ok_or_else(|| QuarryError::NotFound {
            key: key.to_string(),
        })?;
        String::from_utf8(bytes.clone()).map_err(|e| QuarryError::CorruptCache {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value.as_bytes().to_vec());
        Ok(())
    }

    fn reader(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        let entries = lock(&self.entries);
        let bytes = entries.get(key).ok_or_else(|| QuarryError::NotFound {
            key: key.to_string(),
        })?;
        Ok(Box::new(Cursor::new(bytes.clone())))
    }

    fn writer(&self, key: &str) -> Result<Box<dyn StorageWriter>> {
        Ok(Box::new(MemoryWriter {
            entries: Arc::clone(&self.entries),
            key: key.to_string(),
            buffer: Vec::new(),
        }))
    }
}

struct MemoryWriter {
    entries: Entries,
    key: String,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageWriter for MemoryWriter {
    fn finish(self: Box<Self>) -> Result<()> {
        let MemoryWriter {
            entries,
            key,
            buffer,
        } = *self;
        lock(&entries).insert(key, buffer);
        Ok(())
    }
}
