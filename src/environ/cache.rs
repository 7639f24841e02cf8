// src/environ/cache.rs
//
// Content-addressed build cache index: maps a (command, requirements)
// digest to a previously built image/conda-env reference, so repeated
// `build_or_reuse` calls for the same task across runs skip the rebuild.
// Index I/O uses create-new-as-mutex advisory locking plus
// write-temp-then-rename so concurrent callers across processes never
// observe a partially written index.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub digest: String,
    pub tag: String,
    pub image_reference: String,
    pub built_at_unix: u64,
    pub sbom_path: Option<String>,
    pub sif_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheIndex {
    pub entries: HashMap<String, CacheEntry>,
}

pub struct Cache {
    path: PathBuf,
    lock_path: PathBuf,
    index: Mutex<CacheIndex>,
}

impl Cache {
    pub fn open(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir).with_context(|| format!("creating cache dir {cache_dir:?}"))?;
        let path = cache_dir.join("index.json");
        let lock_path = cache_dir.join("index.lock");
        let index = if path.exists() {
            let data = std::fs::read_to_string(&path).with_context(|| format!("reading cache index {path:?}"))?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            CacheIndex::default()
        };
        Ok(Self { path, lock_path, index: Mutex::new(index) })
    }

    pub async fn lookup(&self, digest: &str) -> Option<CacheEntry> {
        self.index.lock().await.entries.get(digest).cloned()
    }

    /// Inserts or replaces an entry and persists the whole index under an
    /// advisory file lock (create_new as mutex across processes) plus the
    /// in-process tokio mutex (for same-process concurrent callers).
    pub async fn insert(&self, entry: CacheEntry) -> Result<()> {
        let _guard = FileLock::acquire(&self.lock_path)?;
        let mut index = self.index.lock().await;
        index.entries.insert(entry.digest.clone(), entry);
        self.persist(&index)?;
        Ok(())
    }

    pub async fn prune_older_than(&self, max_age_secs: u64) -> Result<usize> {
        let _guard = FileLock::acquire(&self.lock_path)?;
        let mut index = self.index.lock().await;
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let before = index.entries.len();
        index.entries.retain(|_, e| now.saturating_sub(e.built_at_unix) < max_age_secs);
        let removed = before - index.entries.len();
        if removed > 0 {
            self.persist(&index)?;
        }
        Ok(removed)
    }

    fn persist(&self, index: &CacheIndex) -> Result<()> {
        let json = serde_json::to_string_pretty(index).context("serializing cache index")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing temp cache index {tmp:?}"))?;
        std::fs::rename(&tmp, &self.path).with_context(|| format!("renaming cache index into place {:?}", self.path))?;
        Ok(())
    }
}

/// Advisory cross-process lock via exclusive file creation. Dropped
/// (removed) when the guard goes out of scope.
struct FileLock {
    path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        use std::fs::OpenOptions;
        // Best-effort: if a stale lock file is left over from a crashed
        // process, a single retry after a short spin is enough for our
        // single-host use case; we don't implement lock timeouts beyond that.
        for _ in 0..50 {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => return Ok(Self { path: path.to_path_buf() }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                }
                Err(e) => return Err(e).with_context(|| format!("acquiring lock file {path:?}")),
            }
        }
        anyhow::bail!("timed out acquiring cache lock {path:?}")
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_lookup_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path()).unwrap();
        cache
            .insert(CacheEntry {
                digest: "abc123".into(),
                tag: "wf2wf/env:abc123".into(),
                image_reference: "python:3.11".into(),
                built_at_unix: 0,
                sbom_path: None,
                sif_path: None,
            })
            .await
            .unwrap();
        let found = cache.lookup("abc123").await.unwrap();
        assert_eq!(found.image_reference, "python:3.11");
    }

    #[tokio::test]
    async fn prune_removes_entries_older_than_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path()).unwrap();
        cache
            .insert(CacheEntry { digest: "old".into(), tag: "wf2wf/env:old".into(), image_reference: "x".into(), built_at_unix: 0, sbom_path: None, sif_path: None })
            .await
            .unwrap();
        let removed = cache.prune_older_than(1).await.unwrap();
        assert_eq!(removed, 1);
        assert!(cache.lookup("old").await.is_none());
    }
}
