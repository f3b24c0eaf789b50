use super::{Storage, StorageWriter};
use crate::error::{QuarryError, Result};
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One file per key under a base directory.
///
/// The directory is created on first write. Values are written to a
/// temporary file and renamed into place, so readers never observe a
/// partially written value.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    directory: PathBuf,
}

impl FileSystemStorage {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        if !valid {
            return Err(QuarryError::storage(
                self.uri(),
                std::io::Error::new(ErrorKind::InvalidInput, format!("invalid key: {:?}", key)),
            ));
        }
        Ok(self.directory.join(key))
    }

    fn map_io(&self, key: &str, err: std::io::Error) -> QuarryError {
        if err.kind() == ErrorKind::NotFound {
            QuarryError::NotFound {
                key: key.to_string(),
            }
        } else {
            QuarryError::storage(self.uri(), err)
        }
    }
}

impl Storage for FileSystemStorage {
    fn uri(&self) -> String {
        format!("file://{}", self.directory.display())
    }

    fn has(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        path.try_exists()
            .map_err(|e| QuarryError::storage(self.uri(), e))
    }

    fn get(&self, key: &str) -> Result<String> {
        let path = self.path_for(key)?;
        std::fs::read_to_string(&path).map_err(|e| self.map_io(key, e))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut writer = self.writer(key)?;
        writer
            .write_all(value.as_bytes())
            .map_err(|e| QuarryError::storage(self.uri(), e))?;
        writer.finish()
    }

    fn reader(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        let path = self.path_for(key)?;
        let file = File::open(&path).map_err(|e| self.map_io(key, e))?;
        Ok(Box::new(std::io::BufReader::new(file)))
    }

    fn writer(&self, key: &str) -> Result<Box<dyn StorageWriter>> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.directory)
            .map_err(|e| QuarryError::storage(self.uri(), e))?;

        let tmp_path = self.directory.join(format!(
            ".{}.{}.{}.tmp",
            key,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let file = File::create(&tmp_path).map_err(|e| QuarryError::storage(self.uri(), e))?;

        Ok(Box::new(FileWriter {
            uri: self.uri(),
            inner: Some(BufWriter::new(file)),
            tmp_path,
            path,
        }))
    }
}

struct FileWriter {
    uri: String,
    inner: Option<BufWriter<File>>,
    tmp_path: PathBuf,
    path: PathBuf,
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.write(buf),
            None => Err(std::io::Error::other("writer already finished")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl StorageWriter for FileWriter {
    fn finish(mut self: Box<Self>) -> Result<()> {
        let FileWriter {
            uri,
            inner,
            tmp_path,
            path,
        } = &mut *self;
        let writer = match inner.as_mut() {
            Some(writer) => writer,
            None => return Ok(()),
        };
        writer
            .flush()
            .and_then(|_| writer.get_ref().sync_all())
            .and_then(|_| std::fs::rename(&*tmp_path, &*path))
            .map_err(|e| QuarryError::storage(uri.as_str(), e))?;
        // Renamed into place, nothing left for Drop to clean up.
        *inner = None;
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        // Unfinished or failed writes must not leave the temporary file behind.
        if self.inner.take().is_some() {
            if let Err(e) = std::fs::remove_file(&self.tmp_path) {
                tracing::warn!(
                    target: "cache",
                    path = ?self.tmp_path,
                    error = %e,
                    "Failed to clean up temp file"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(dir.path().join("cache"));

        assert!(!storage.has("query-abc").unwrap());
        assert!(storage.get("query-abc").unwrap_err().is_not_found());
        assert!(matches!(
            storage.reader("query-abc"),
            Err(QuarryError::NotFound { .. })
        ));

        storage.set("query-abc", "exec-1").unwrap();
        assert!(storage.has("query-abc").unwrap());
        assert_eq!(storage.get("query-abc").unwrap(), "exec-1");
    }

    #[test]
    fn test_streaming_write_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(dir.path());

        let mut writer = storage.writer("results-1").unwrap();
        writer.write_all(b"\"a\"\n").unwrap();
        assert!(!storage.has("results-1").unwrap());
        writer.finish().unwrap();
        assert!(storage.has("results-1").unwrap());

        let mut content = String::new();
        storage
            .reader("results-1")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "\"a\"\n");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_abandoned_writer_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(dir.path());
        {
            let mut writer = storage.writer("results-2").unwrap();
            writer.write_all(b"partial").unwrap();
        }
        assert!(!storage.has("results-2").unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_publish_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(dir.path());
        // A directory in the way makes the final rename fail.
        std::fs::create_dir(dir.path().join("results-3")).unwrap();

        let mut writer = storage.writer("results-3").unwrap();
        writer.write_all(b"\"a\"\n").unwrap();
        assert!(matches!(writer.finish(), Err(QuarryError::Storage { .. })));

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["results-3".to_string()]);
    }

    #[test]
    fn test_rejects_unsafe_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(dir.path());
        for key in ["", "../escape", ".hidden", "a/b", "a b"] {
            assert!(
                matches!(storage.set(key, "x"), Err(QuarryError::Storage { .. })),
                "key {:?} should be rejected",
                key
            );
        }
    }
}
