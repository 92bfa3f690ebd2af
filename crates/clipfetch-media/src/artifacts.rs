//! Artifact discovery and deferred cleanup.
//!
//! Every produced file is named with its job id as prefix. The store maps a
//! finished job back to its file, hands files out by name, and deletes them
//! after a grace delay. Timers are owned by the store so shutdown is
//! deterministic.

use chrono::Utc;
use metrics::counter;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use clipfetch_models::{Artifact, JobId};

use crate::error::{MediaError, MediaResult};

/// Suffixes of in-progress files written by the tool.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp", ".tmp"];

/// Counter of artifacts deleted by the store, labelled by trigger.
pub const ARTIFACTS_DELETED_TOTAL: &str = "clipfetch_artifacts_deleted_total";

/// What to do with pending artifacts on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupMode {
    /// Delete every pending artifact now.
    Flush,
    /// Cancel the timers and leave the files in place.
    Skip,
}

#[derive(Debug)]
struct PendingCleanup {
    ticket: u64,
    handle: AbortHandle,
}

type PendingMap = Arc<Mutex<HashMap<PathBuf, PendingCleanup>>>;

/// Owns the output directory and the cleanup timers for its files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    pending: PendingMap,
    next_ticket: Arc<AtomicU64>,
}

impl ArtifactStore {
    /// Create a store for `output_dir`.
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Allocate a fresh job id.
    pub fn allocate(&self) -> JobId {
        JobId::new()
    }

    /// Find the artifact produced for `job_id`.
    ///
    /// A path reported by the tool wins when it names an existing file in the
    /// output directory with the job prefix. Otherwise the directory is
    /// scanned for finished files starting with the job id.
    pub async fn claim(&self, job_id: &JobId, reported: Option<&Path>) -> MediaResult<Artifact> {
        if let Some(name) = reported.and_then(|p| p.file_name()).and_then(|n| n.to_str()) {
            if name.starts_with(job_id.as_str()) && !is_partial(name) {
                let candidate = self.output_dir.join(name);
                if let Some(artifact) = artifact_at(&candidate, name).await {
                    debug!(job_id = %job_id, file = %name, "Claimed reported artifact");
                    return Ok(artifact);
                }
            }
            debug!(job_id = %job_id, reported = %name, "Reported path unusable, scanning");
        }

        let mut matches = self
            .list_files()
            .await?
            .into_iter()
            .filter(|(name, _)| name.starts_with(job_id.as_str()) && !is_partial(name))
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        matches.sort();

        if matches.len() > 1 {
            warn!(
                job_id = %job_id,
                count = matches.len(),
                files = ?matches,
                "Multiple artifacts match job, using the first"
            );
        }

        let name = matches
            .into_iter()
            .next()
            .ok_or_else(|| MediaError::ArtifactNotFound(job_id.to_string()))?;

        artifact_at(&self.output_dir.join(&name), &name)
            .await
            .ok_or_else(|| MediaError::ArtifactNotFound(job_id.to_string()))
    }

    /// Resolve a file name handed out earlier.
    pub async fn locate(&self, file_name: &str) -> MediaResult<Artifact> {
        if !is_plain_file_name(file_name) {
            return Err(MediaError::ArtifactNotFound(file_name.to_string()));
        }

        artifact_at(&self.output_dir.join(file_name), file_name)
            .await
            .ok_or_else(|| MediaError::ArtifactNotFound(file_name.to_string()))
    }

    /// Delete `artifact` after `delay`.
    ///
    /// Scheduling the same path again replaces the pending timer. Deletion
    /// failures are logged only.
    pub async fn schedule_cleanup(&self, artifact: &Artifact, delay: Duration) {
        let path = artifact.path.clone();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);

        let mut map = self.pending.lock().await;

        let task_path = path.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            remove_artifact(&task_path, "timer").await;

            let mut map = pending.lock().await;
            if map.get(&task_path).is_some_and(|p| p.ticket == ticket) {
                map.remove(&task_path);
            }
        })
        .abort_handle();

        if let Some(previous) = map.insert(path.clone(), PendingCleanup { ticket, handle }) {
            previous.handle.abort();
            debug!(path = %path.display(), "Replaced pending cleanup");
        }

        debug!(path = %path.display(), delay_secs = delay.as_secs(), "Scheduled cleanup");
    }

    /// Number of artifacts awaiting deletion.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Stop every pending timer. Returns how many were pending.
    pub async fn shutdown(&self, mode: CleanupMode) -> usize {
        let drained: Vec<(PathBuf, PendingCleanup)> = self.pending.lock().await.drain().collect();
        let count = drained.len();

        for (path, cleanup) in drained {
            cleanup.handle.abort();
            if mode == CleanupMode::Flush {
                remove_artifact(&path, "shutdown").await;
            }
        }

        info!(count, mode = ?mode, "Artifact store shut down");
        count
    }

    /// Delete files in the output directory older than `max_age`.
    ///
    /// Reclaims leftovers of failed or abandoned jobs. Returns the number of
    /// files removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> MediaResult<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for (name, modified) in self.list_files().await? {
            let age = now.duration_since(modified).unwrap_or_default();
            if age < max_age {
                continue;
            }

            let path = self.output_dir.join(&name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(file = %name, age_secs = age.as_secs(), "Removed stale artifact");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(file = %name, "Failed to remove stale artifact: {}", e),
            }
        }

        if removed > 0 {
            info!(removed, "Swept stale artifacts");
        }

        Ok(removed)
    }

    /// Regular files in the output directory with their modification time.
    async fn list_files(&self) -> MediaResult<Vec<(String, SystemTime)>> {
        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                files.push((name.to_string(), modified));
            }
        }

        Ok(files)
    }
}

async fn artifact_at(path: &Path, name: &str) -> Option<Artifact> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }

    Some(Artifact {
        path: path.to_path_buf(),
        file_name: name.to_string(),
        created_at: Utc::now(),
        size_bytes: metadata.len(),
    })
}

async fn remove_artifact(path: &Path, trigger: &'static str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            counter!(ARTIFACTS_DELETED_TOTAL, "trigger" => trigger).increment(1);
            info!(path = %path.display(), trigger, "Deleted artifact");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Artifact already gone")
        }
        Err(e) => warn!(path = %path.display(), "Failed to delete artifact: {}", e),
    }
}

fn is_partial(name: &str) -> bool {
    PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) || name.contains(".part-Frag")
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"data").unwrap();
        path
    }

    #[tokio::test]
    async fn test_claim_without_match() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        touch(dir.path(), "someone-else.mp4");

        let result = store.claim(&JobId::from_string("abc"), None).await;
        assert!(matches!(result, Err(MediaError::ArtifactNotFound(_))));
    }

    #[tokio::test]
    async fn test_claim_missing_directory() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("missing"));

        let result = store.claim(&JobId::from_string("abc"), None).await;
        assert!(matches!(result, Err(MediaError::ArtifactNotFound(_))));
    }

    #[tokio::test]
    async fn test_claim_single_match_ignores_partials() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = touch(dir.path(), "abc.mp4");
        touch(dir.path(), "abc.mp4.part");
        touch(dir.path(), "abc.f137.mp4.ytdl");

        let artifact = store.claim(&JobId::from_string("abc"), None).await.unwrap();
        assert_eq!(artifact.path, path);
        assert_eq!(artifact.file_name, "abc.mp4");
        assert_eq!(artifact.size_bytes, 4);
    }

    #[tokio::test]
    async fn test_claim_prefers_reported_path() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        touch(dir.path(), "abc.f137.mp4");
        let merged = touch(dir.path(), "abc.mp4");

        let artifact = store
            .claim(&JobId::from_string("abc"), Some(&merged))
            .await
            .unwrap();
        assert_eq!(artifact.file_name, "abc.mp4");

        // Reported file without the prefix falls back to scanning
        let artifact = store
            .claim(&JobId::from_string("abc"), Some(Path::new("/elsewhere/x.mp4")))
            .await
            .unwrap();
        assert_eq!(artifact.file_name, "abc.f137.mp4");
    }

    #[tokio::test]
    async fn test_locate_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        touch(dir.path(), "abc.mp4");

        assert!(store.locate("abc.mp4").await.is_ok());
        assert!(store.locate("../abc.mp4").await.is_err());
        assert!(store.locate("sub/abc.mp4").await.is_err());
        assert!(store.locate("").await.is_err());
        assert!(store.locate("missing.mp4").await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_deletes_after_delay() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = touch(dir.path(), "abc.mp4");
        let artifact = store.locate("abc.mp4").await.unwrap();

        store.schedule_cleanup(&artifact, Duration::from_millis(50)).await;
        assert_eq!(store.pending_count().await, 1);
        assert!(path.exists());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!path.exists());
        assert_eq!(store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_reschedule_replaces_timer() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = touch(dir.path(), "abc.mp4");
        let artifact = store.locate("abc.mp4").await.unwrap();

        store.schedule_cleanup(&artifact, Duration::from_millis(50)).await;
        store.schedule_cleanup(&artifact, Duration::from_secs(60)).await;
        assert_eq!(store.pending_count().await, 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(path.exists());

        assert_eq!(store.shutdown(CleanupMode::Skip).await, 1);
        assert!(path.exists());
        assert_eq!(store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_flush_deletes_now() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let a = touch(dir.path(), "a.mp4");
        let b = touch(dir.path(), "b.webm");

        for name in ["a.mp4", "b.webm"] {
            let artifact = store.locate(name).await.unwrap();
            store.schedule_cleanup(&artifact, Duration::from_secs(60)).await;
        }

        assert_eq!(store.shutdown(CleanupMode::Flush).await, 2);
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn test_deleted_artifacts_counted_by_trigger() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async {
                let dir = TempDir::new().unwrap();
                let store = ArtifactStore::new(dir.path());
                touch(dir.path(), "a.mp4");
                touch(dir.path(), "b.mp4");

                let a = store.locate("a.mp4").await.unwrap();
                store.schedule_cleanup(&a, Duration::from_millis(20)).await;
                let b = store.locate("b.mp4").await.unwrap();
                store.schedule_cleanup(&b, Duration::from_secs(60)).await;

                tokio::time::sleep(Duration::from_millis(200)).await;
                store.shutdown(CleanupMode::Flush).await;
            })
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"clipfetch_artifacts_deleted_total{trigger="timer"} 1"#));
        assert!(rendered.contains(r#"clipfetch_artifacts_deleted_total{trigger="shutdown"} 1"#));
    }

    #[tokio::test]
    async fn test_sweep_stale() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = touch(dir.path(), "leftover.mp4.part");

        assert_eq!(store.sweep_stale(Duration::from_secs(3600)).await.unwrap(), 0);
        assert!(path.exists());

        assert_eq!(store.sweep_stale(Duration::ZERO).await.unwrap(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_allocate_unique() {
        let store = ArtifactStore::new("/tmp");
        assert_ne!(store.allocate(), store.allocate());
    }
}
