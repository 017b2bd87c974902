use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::local::{LocalFile, LocalInstallState};
use super::model::{ModEntry, RemoteArtifact};
use super::sink::LogSink;

static VERSION_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-_]?v?\d+.*$").expect("valid regex"));

/// `"examplemod-1.2.3.jar"` -> `"examplemod"`.
pub fn base_token(file_name: &str) -> String {
    let lower = file_name.to_lowercase();
    let stem = lower.strip_suffix(".jar").unwrap_or(&lower);
    VERSION_SUFFIX.replace(stem, "").into_owned()
}

/// Base token of the entry's pinned file, or of its display name when the
/// file name strips down to almost nothing (`"v2.jar"`).
pub fn entry_base_token(entry: &ModEntry) -> String {
    let from_file = entry
        .file_name
        .as_deref()
        .map(base_token)
        .unwrap_or_default();
    if from_file.chars().count() >= 3 {
        from_file
    } else {
        base_token(&entry.name)
    }
}

/// Same base token, or the name continues the base with a separator.
pub fn shares_base(file_name: &str, base: &str) -> bool {
    if base.is_empty() {
        return false;
    }
    let lower = file_name.to_lowercase();
    base_token(file_name) == base
        || lower.starts_with(&format!("{base}-"))
        || lower.starts_with(&format!("{base}_"))
}

/// What the remote side had to say about an entry this pass.
#[derive(Debug, Clone)]
pub enum RemoteCheck {
    Resolved(RemoteArtifact),
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ArtifactState {
    Current,
    NeedsRedownload { reason: String },
    Missing,
}

/// Per-entry verdict. `stale_copies` is orthogonal to `state`: a current or
/// missing entry may still have superseded files lying around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StalenessReport {
    pub state: ArtifactState,
    /// Local file standing in for the entry, if any.
    pub local_file: Option<String>,
    pub stale_copies: Vec<String>,
    /// The remote could not be checked, so `stale_copies` may hold the only
    /// usable build of the entry.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unverified: bool,
}

impl StalenessReport {
    pub fn current(local_file: impl Into<String>) -> Self {
        Self {
            state: ArtifactState::Current,
            local_file: Some(local_file.into()),
            stale_copies: Vec::new(),
            unverified: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            state: ArtifactState::Missing,
            local_file: None,
            stale_copies: Vec::new(),
            unverified: false,
        }
    }

    pub fn is_current(&self) -> bool {
        self.state == ArtifactState::Current
    }

    pub fn needs_download(&self) -> bool {
        !self.is_current()
    }
}

/// Local jars that look like older builds of `entry`, excluding every name in `keep`.
pub fn find_stale_copies(entry: &ModEntry, local: &LocalInstallState, keep: &[&str]) -> Vec<String> {
    let base = entry_base_token(entry);
    local
        .names()
        .filter(|name| !keep.iter().any(|k| k.eq_ignore_ascii_case(name)))
        .filter(|name| shares_base(name, &base))
        .map(str::to_string)
        .collect()
}

/// Compare the local copy of a pinned entry against what the remote serves.
///
/// Name and size decide; timestamps only get logged.
pub fn evaluate(
    entry: &ModEntry,
    local: &LocalInstallState,
    remote: &RemoteCheck,
    log: &dyn LogSink,
) -> StalenessReport {
    let pinned = entry.file_name.as_deref().unwrap_or_default();
    let remote_name = match remote {
        RemoteCheck::Resolved(artifact) => Some(artifact.file_name.as_str()),
        RemoteCheck::Unavailable(_) => None,
    };

    let local_file: Option<&LocalFile> = local.get(pinned).or_else(|| {
        remote_name
            .filter(|name| !name.eq_ignore_ascii_case(pinned))
            .and_then(|name| local.get(name))
    });

    let mut keep = vec![pinned];
    if let Some(file) = local_file {
        keep.push(file.name.as_str());
    }
    let stale_copies = find_stale_copies(entry, local, &keep);
    let unverified = matches!(remote, RemoteCheck::Unavailable(_));

    let Some(file) = local_file else {
        log.log(&format!("No local file found for {}", entry.name));
        return StalenessReport {
            state: ArtifactState::Missing,
            local_file: None,
            stale_copies,
            unverified,
        };
    };

    let state = match remote {
        RemoteCheck::Unavailable(reason) => {
            log.log(&format!(
                "Could not check {} against the release ({}); keeping {}",
                entry.name, reason, file.name
            ));
            ArtifactState::Current
        }
        RemoteCheck::Resolved(artifact) => {
            log.log(&format!("Comparing {}:", entry.name));
            log.log(&format!("  Local file: {} ({} bytes)", file.name, file.size));
            log.log(&format!(
                "  Remote file: {} ({} bytes)",
                artifact.file_name,
                artifact
                    .size
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "?".into())
            ));
            if let Some(modified) = file.modified {
                log.log(&format!("  Local modified: {}", modified.to_rfc3339()));
            }
            if let Some(published) = artifact.published_at {
                log.log(&format!("  Remote updated: {}", published.to_rfc3339()));
            }
            compare(file, artifact)
        }
    };

    if let ArtifactState::NeedsRedownload { reason } = &state {
        log.log(&format!("Needs redownload: {} ({})", entry.name, reason));
    }

    StalenessReport {
        state,
        local_file: Some(file.name.clone()),
        stale_copies,
        unverified,
    }
}

fn compare(file: &LocalFile, artifact: &RemoteArtifact) -> ArtifactState {
    if file.name != artifact.file_name {
        return ArtifactState::NeedsRedownload {
            reason: format!(
                "File name changed (local: {}, remote: {})",
                file.name, artifact.file_name
            ),
        };
    }
    match artifact.size {
        Some(size) if size != file.size => ArtifactState::NeedsRedownload {
            reason: format!("Size mismatch (local: {}, remote: {})", file.size, size),
        },
        _ => ArtifactState::Current,
    }
}

/// Delete superseded copies. One failed removal never blocks the rest.
pub async fn remove_stale_copies(dir: &Path, copies: &[String], log: &dyn LogSink) -> usize {
    let mut removed = 0;
    for name in copies {
        match super::local::remove_jar(dir, name).await {
            Ok(()) => {
                removed += 1;
                log.log(&format!("Removed old version: {name}"));
            }
            Err(e) => log.log(&format!("Failed to remove old version {name}: {e}")),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mods::sink::{MemorySink, NullSink};

    fn file(name: &str, size: u64) -> LocalFile {
        LocalFile {
            name: name.into(),
            size,
            modified: None,
        }
    }

    fn artifact(name: &str, size: u64) -> RemoteArtifact {
        RemoteArtifact {
            url: format!("https://example.invalid/{name}"),
            file_name: name.into(),
            size: Some(size),
            published_at: None,
            version: "v2".into(),
            game_version: "1.20.1".into(),
            checksum: None,
        }
    }

    #[test]
    fn base_token_drops_version_suffix() {
        assert_eq!(base_token("examplemod-1.2.3.jar"), "examplemod");
        assert_eq!(base_token("examplemod-1.2.4+build5.jar"), "examplemod");
        assert_eq!(base_token("ExampleMod_v2.JAR"), "examplemod");
    }

    #[test]
    fn short_tokens_fall_back_to_display_name() {
        let entry = ModEntry::new("Cool Mod", "me/cool").with_file_name("v2.jar");
        assert_eq!(entry_base_token(&entry), "cool mod");
    }

    #[test]
    fn scenario_d_name_change_needs_redownload() {
        let entry = ModEntry::new("Mod", "me/mod").with_file_name("mod-v1.jar");
        let local = LocalInstallState::from_files(vec![file("mod-v1.jar", 100)]);
        let report = evaluate(
            &entry,
            &local,
            &RemoteCheck::Resolved(artifact("mod-v2.jar", 150)),
            &NullSink,
        );

        match report.state {
            ArtifactState::NeedsRedownload { reason } => assert!(reason.contains("name changed")),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(report.local_file.as_deref(), Some("mod-v1.jar"));
        assert!(report.stale_copies.is_empty());
    }

    #[test]
    fn size_mismatch_needs_redownload() {
        let entry = ModEntry::new("Mod", "me/mod").with_file_name("mod-v1.jar");
        let local = LocalInstallState::from_files(vec![file("mod-v1.jar", 90)]);
        let report = evaluate(
            &entry,
            &local,
            &RemoteCheck::Resolved(artifact("mod-v1.jar", 100)),
            &NullSink,
        );
        assert!(matches!(report.state, ArtifactState::NeedsRedownload { ref reason } if reason.contains("Size")));
    }

    #[test]
    fn current_file_with_old_copies() {
        let entry = ModEntry::new("Mod", "me/mod").with_file_name("mod-v2.jar");
        let local = LocalInstallState::from_files(
            vec![
                file("mod-v1.jar", 80),
                file("mod-v2.jar", 150),
                file("mod_0.9.jar", 70),
                file("modmenu-7.jar", 10),
                file("other-1.0.jar", 5),
            ],
        );
        let report = evaluate(
            &entry,
            &local,
            &RemoteCheck::Resolved(artifact("mod-v2.jar", 150)),
            &NullSink,
        );

        assert!(report.is_current());
        assert_eq!(report.stale_copies, vec!["mod-v1.jar", "mod_0.9.jar"]);
    }

    #[test]
    fn unreachable_remote_keeps_present_file() {
        let entry = ModEntry::new("Mod", "me/mod").with_file_name("mod-v1.jar");
        let local = LocalInstallState::from_files(vec![file("mod-v1.jar", 100)]);
        let log = MemorySink::new();
        let report = evaluate(
            &entry,
            &local,
            &RemoteCheck::Unavailable("HTTP 503".into()),
            &log,
        );
        assert!(report.is_current());
        assert!(log.contains("HTTP 503"));
    }

    #[test]
    fn missing_with_stale_copies() {
        let entry = ModEntry::new("Mod", "me/mod").with_file_name("mod-v3.jar");
        let local = LocalInstallState::from_files(vec![file("mod-v1.jar", 100)]);
        let report = evaluate(
            &entry,
            &local,
            &RemoteCheck::Resolved(artifact("mod-v3.jar", 200)),
            &NullSink,
        );
        assert_eq!(report.state, ArtifactState::Missing);
        assert_eq!(report.stale_copies, vec!["mod-v1.jar"]);
    }

    #[test]
    fn unreachable_remote_marks_old_copies_unverified() {
        let entry = ModEntry::new("Mod", "me/mod").with_file_name("mod-v2.jar");
        let local = LocalInstallState::from_files(vec![file("mod-v1.jar", 100)]);
        let report = evaluate(
            &entry,
            &local,
            &RemoteCheck::Unavailable("HTTP 503".into()),
            &NullSink,
        );
        assert_eq!(report.state, ArtifactState::Missing);
        assert_eq!(report.stale_copies, vec!["mod-v1.jar"]);
        assert!(report.unverified);

        let checked = evaluate(
            &entry,
            &local,
            &RemoteCheck::Resolved(artifact("mod-v2.jar", 100)),
            &NullSink,
        );
        assert!(!checked.unverified);
    }

    #[tokio::test]
    async fn removal_continues_past_failures() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("mod-v1.jar"), b"old").unwrap();
        let log = MemorySink::new();
        let removed = remove_stale_copies(
            tmp.path(),
            &["ghost-v0.jar".to_string(), "mod-v1.jar".to_string()],
            &log,
        )
        .await;

        assert_eq!(removed, 1);
        assert!(!tmp.path().join("mod-v1.jar").exists());
        assert!(log.contains("Failed to remove old version ghost-v0.jar"));
    }
}
