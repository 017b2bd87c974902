use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::core::error::{SyncError, SyncResult};

/// A `.jar` present in the mods directory at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Snapshot of the jars in a mods directory.
///
/// Never stored: recomputed on every scan, so anything another process does
/// to the directory between scan and write goes unnoticed.
#[derive(Debug, Clone, Default)]
pub struct LocalInstallState {
    files: Vec<LocalFile>,
}

impl LocalInstallState {
    /// List the jars in `dir`. A missing directory is an empty state.
    pub async fn scan(dir: &Path) -> SyncResult<Self> {
        let mut files = Vec::new();

        if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
            return Ok(Self { files });
        }

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| SyncError::io(dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::io(dir, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_jar(&name) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Skipping unreadable {:?}: {}", entry.path(), e);
                    continue;
                }
            };
            files.push(LocalFile {
                name,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { files })
    }

    /// Build a state from known files without touching the disk.
    pub fn from_files(files: Vec<LocalFile>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[LocalFile] {
        &self.files
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Case-insensitive lookup by file name.
    pub fn get(&self, name: &str) -> Option<&LocalFile> {
        self.files.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

pub fn is_jar(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".jar")
}

/// Create `dir` if needed and prove it is writable with a create-delete probe.
pub async fn ensure_writable(dir: &Path) -> SyncResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| SyncError::DirectoryNotWritable {
            path: dir.to_path_buf(),
            source,
        })?;

    let probe = dir.join(format!(".write_test-{}", Uuid::new_v4()));
    tokio::fs::write(&probe, b"test")
        .await
        .map_err(|source| SyncError::DirectoryNotWritable {
            path: dir.to_path_buf(),
            source,
        })?;
    tokio::fs::remove_file(&probe)
        .await
        .map_err(|source| SyncError::DirectoryNotWritable {
            path: dir.to_path_buf(),
            source,
        })?;

    Ok(())
}

/// Remove a single jar from `dir`.
pub async fn remove_jar(dir: &Path, name: &str) -> SyncResult<()> {
    let path = dir.join(name);
    tokio::fs::remove_file(&path)
        .await
        .map_err(|e| SyncError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_directory_scans_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let state = LocalInstallState::scan(&tmp.path().join("nope")).await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn scan_lists_only_jars_with_sizes() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("b-mod.JAR"), vec![0u8; 7]).await.unwrap();
        tokio::fs::write(tmp.path().join("a-mod.jar"), vec![0u8; 3]).await.unwrap();
        tokio::fs::write(tmp.path().join("notes.txt"), b"x").await.unwrap();
        tokio::fs::create_dir(tmp.path().join("dir.jar")).await.unwrap();

        let state = LocalInstallState::scan(tmp.path()).await.unwrap();
        let names: Vec<_> = state.names().collect();
        assert_eq!(names, vec!["a-mod.jar", "b-mod.JAR"]);
        assert_eq!(state.get("B-MOD.jar").map(|f| f.size), Some(7));
        assert!(state.get("a-mod.jar").unwrap().modified.is_some());
    }

    #[tokio::test]
    async fn probe_leaves_no_trace() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("mods");
        ensure_writable(&dir).await.unwrap();
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn probe_fails_when_path_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("mods");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let err = ensure_writable(&blocker).await.unwrap_err();
        assert!(err.is_filesystem());
    }
}
