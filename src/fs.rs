//! File-system key-value backend.
//!
//! Each key maps to one file: `acme/prod/db/v1.0.0` is stored at
//! `{root}/acme/prod/db/v1.0.0.entry`. Inserts write a temporary file and
//! hard-link it into place, so insert-if-absent is atomic and readers never
//! observe a partially written entry.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use walkdir::WalkDir;

use crate::backend::{KeyValue, KvBackend};
use crate::error::{BackendError, BackendResult};
use crate::identity::KEY_SEPARATOR;

const ENTRY_EXTENSION: &str = "entry";
const TEMP_EXTENSION: &str = "tmp";

/// Durable backend rooted at a directory
#[derive(Clone)]
pub struct FsBackend {
    root: Arc<PathBuf>,
    temp_counter: Arc<AtomicU64>,
}

impl FsBackend {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn open(root: impl AsRef<Path>) -> BackendResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| BackendError::io(format!("creating {}", root.display()), e))?;
        Ok(Self {
            root: Arc::new(root),
            temp_counter: Arc::new(AtomicU64::new(0)),
        })
    }

    fn components(key: &str) -> BackendResult<Vec<&str>> {
        let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
        let safe = parts.iter().all(|part| {
            !part.is_empty()
                && *part != "."
                && *part != ".."
                && !part.contains('\\')
                && matches!(Path::new(part).components().next(), Some(Component::Normal(_)))
        });
        if safe {
            Ok(parts)
        } else {
            Err(BackendError::InvalidKey {
                key: key.to_string(),
            })
        }
    }

    fn entry_path(&self, key: &str) -> BackendResult<PathBuf> {
        let parts = Self::components(key)?;
        let mut path = self.root.to_path_buf();
        let (last, dirs) = parts.split_last().ok_or_else(|| BackendError::InvalidKey {
            key: key.to_string(),
        })?;
        for dir in dirs {
            path.push(dir);
        }
        path.push(format!("{last}.{ENTRY_EXTENSION}"));
        Ok(path)
    }

    fn key_for(root: &Path, path: &Path) -> Option<String> {
        if path.extension()? != ENTRY_EXTENSION {
            return None;
        }
        let relative = path.strip_prefix(root).ok()?.with_extension("");
        let mut key = String::new();
        for component in relative.components() {
            let Component::Normal(part) = component else {
                return None;
            };
            if !key.is_empty() {
                key.push(KEY_SEPARATOR);
            }
            key.push_str(part.to_str()?);
        }
        Some(key)
    }

    fn temp_path(&self, target: &Path) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        target.with_file_name(format!(".{name}.{}.{n}.{TEMP_EXTENSION}", std::process::id()))
    }
}

#[async_trait]
impl KvBackend for FsBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>> {
        let path = self.entry_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::io(format!("reading {}", path.display()), e)),
        }
    }

    async fn put_if_absent(&self, key: &str, value: Bytes) -> BackendResult<()> {
        let path = self.entry_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BackendError::io(format!("creating {}", parent.display()), e))?;
        }

        let temp = self.temp_path(&path);
        let mut file = fs::File::create(&temp)
            .await
            .map_err(|e| BackendError::io(format!("creating {}", temp.display()), e))?;
        let written = async {
            file.write_all(&value).await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        if let Err(e) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(BackendError::io(format!("writing {}", temp.display()), e));
        }

        let linked = fs::hard_link(&temp, &path).await;
        let _ = fs::remove_file(&temp).await;
        match linked {
            Ok(()) => {
                debug!(key, path = %path.display(), "entry written");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(BackendError::Conflict {
                key: key.to_string(),
            }),
            Err(e) => Err(BackendError::io(format!("linking {}", path.display()), e)),
        }
    }

    async fn delete(&self, key: &str) -> BackendResult<bool> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackendError::io(format!("removing {}", path.display()), e)),
        }
    }

    /// Scans run on the blocking pool. If the caller stops waiting (the
    /// store's per-call timeout), the walk notices on its next entry and stops.
    async fn scan_prefix(&self, prefix: &str) -> BackendResult<Vec<KeyValue>> {
        // Walk only the deepest directory the prefix fully names.
        let mut start = self.root.to_path_buf();
        if let Some((dirs, _)) = prefix.rsplit_once(KEY_SEPARATOR) {
            for dir in Self::components(dirs)? {
                start.push(dir);
            }
        }

        let root = Arc::clone(&self.root);
        let prefix = prefix.to_string();
        let guard = CancelOnDrop::default();
        let cancelled = Arc::clone(&guard.0);
        let scanned = tokio::task::spawn_blocking(move || walk_entries(&root, &start, &prefix, &cancelled))
            .await
            .map_err(|e| BackendError::unavailable(format!("scan task failed: {e}")))??;
        drop(guard);

        Ok(scanned)
    }
}

/// Raises its flag when the owning scan future is dropped
#[derive(Default)]
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

fn walk_entries(root: &Path, start: &Path, prefix: &str, cancelled: &AtomicBool) -> BackendResult<Vec<KeyValue>> {
    let mut pairs = Vec::new();
    if !start.is_dir() {
        return Ok(pairs);
    }
    for entry in WalkDir::new(start).sort_by_file_name() {
        if cancelled.load(Ordering::Relaxed) {
            debug!(start = %start.display(), "scan abandoned");
            return Err(BackendError::unavailable(format!("scan of {} cancelled", start.display())));
        }
        let entry = entry.map_err(|e| BackendError::Unavailable {
            message: format!("scanning {}", start.display()),
            source: Some(Arc::new(e)),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(key) = FsBackend::key_for(root, entry.path()) else {
            continue;
        };
        if !key.starts_with(prefix) {
            continue;
        }
        match std::fs::read(entry.path()) {
            Ok(data) => pairs.push(KeyValue::new(key, data)),
            // Deleted between listing and reading.
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(BackendError::io(format!("reading {}", entry.path().display()), e)),
        }
    }
    pairs.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_round_trip_and_layout() {
        let dir = tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        backend
            .put_if_absent("acme/prod/db/v1.0.0", Bytes::from("{}"))
            .await
            .unwrap();

        assert!(dir.path().join("acme/prod/db/v1.0.0.entry").is_file());
        assert_eq!(
            backend.get("acme/prod/db/v1.0.0").await.unwrap(),
            Some(Bytes::from("{}"))
        );
        assert_eq!(backend.get("acme/prod/db/v9.0.0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_if_absent_conflict() {
        let dir = tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        backend.put_if_absent("a/b/c/v1.0.0", Bytes::from("1")).await.unwrap();
        let err = backend
            .put_if_absent("a/b/c/v1.0.0", Bytes::from("2"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict { .. }));
        assert_eq!(backend.get("a/b/c/v1.0.0").await.unwrap(), Some(Bytes::from("1")));
    }

    #[tokio::test]
    async fn test_scan_skips_siblings_and_temp_files() {
        let dir = tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        for key in ["a/b/app/v2.0.0", "a/b/app/v1.0.0", "a/b/app-x/v1.0.0"] {
            backend.put_if_absent(key, Bytes::from(key.to_string())).await.unwrap();
        }
        std::fs::write(dir.path().join("a/b/app/.stray.tmp"), "junk").unwrap();

        let keys: Vec<String> = backend
            .scan_prefix("a/b/app/")
            .await
            .unwrap()
            .into_iter()
            .map(|kv| kv.key)
            .collect();
        assert_eq!(keys, vec!["a/b/app/v1.0.0", "a/b/app/v2.0.0"]);
        assert!(backend.scan_prefix("a/b/none/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_walk_stops() {
        let dir = tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        backend.put_if_absent("a/b/c/v1.0.0", Bytes::from("1")).await.unwrap();

        let start = dir.path().join("a/b/c");
        let live = walk_entries(dir.path(), &start, "a/b/c/", &AtomicBool::new(false)).unwrap();
        assert_eq!(live.len(), 1);

        let err = walk_entries(dir.path(), &start, "a/b/c/", &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, BackendError::Unavailable { .. }));
    }

    #[test]
    fn test_guard_raises_flag_on_drop() {
        let guard = CancelOnDrop::default();
        let flag = Arc::clone(&guard.0);
        assert!(!flag.load(Ordering::Relaxed));
        drop(guard);
        assert!(flag.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_delete_and_path_traversal() {
        let dir = tempdir().unwrap();
        let backend = FsBackend::open(dir.path()).await.unwrap();
        backend.put_if_absent("a/b/c/v1.0.0", Bytes::from("1")).await.unwrap();
        assert!(backend.delete("a/b/c/v1.0.0").await.unwrap());
        assert!(!backend.delete("a/b/c/v1.0.0").await.unwrap());

        let err = backend.get("a/../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidKey { .. }));
    }
}
