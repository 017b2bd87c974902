// ─── Remote catalogs ───
// One capability trait, one adapter per source kind. Matching, fetching and
// the version-fallback search are shared here instead of living per source.

pub mod curseforge;
pub mod github;
pub mod modrinth;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::config::{ConfigStore, SyncSettings};
use super::local::{ensure_writable, LocalInstallState};
use super::matcher;
use super::model::{DownloadOutcome, ModEntry, RemoteArtifact, SourceKind};
use super::sink::{LogSink, Sinks};
use super::staleness::StalenessReport;
use crate::core::downloader::{artifact_path, ArtifactFetcher};
use crate::core::error::{SyncError, SyncResult};
use crate::core::version::search_order;

pub use curseforge::CurseForgeSource;
pub use github::GithubSource;
pub use modrinth::ModrinthSource;

/// An entry together with its verdict from one scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScannedEntry {
    pub entry: ModEntry,
    pub report: StalenessReport,
}

/// Result of `scan_installed`, in configuration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub entries: Vec<ScannedEntry>,
}

impl ScanReport {
    pub fn installed(&self) -> Vec<ModEntry> {
        self.entries
            .iter()
            .filter(|s| s.report.is_current())
            .map(|s| s.entry.clone())
            .collect()
    }

    /// Missing entries and entries whose local copy must be replaced.
    pub fn missing(&self) -> Vec<ModEntry> {
        self.entries
            .iter()
            .filter(|s| s.report.needs_download())
            .map(|s| s.entry.clone())
            .collect()
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn store(&self) -> &ConfigStore;

    fn fetcher(&self) -> &ArtifactFetcher;

    /// Resolve one entry to a downloadable artifact for `game_version`.
    async fn resolve_artifact(
        &self,
        entry: &ModEntry,
        game_version: &str,
        log: &dyn LogSink,
    ) -> SyncResult<RemoteArtifact>;

    /// Why this source cannot download anything right now, if it cannot.
    fn unavailable_reason(&self) -> Option<String> {
        None
    }

    /// Called after a successful fetch, before the outcome is reported.
    async fn on_downloaded(
        &self,
        _entry: &ModEntry,
        _game_version: &str,
        _artifact: &RemoteArtifact,
        _log: &dyn LogSink,
    ) {
    }

    /// Called by a reconciliation pass for every entry its scan found current.
    /// Plain scans never call it, so overrides may write.
    async fn on_confirmed(
        &self,
        _entry: &ModEntry,
        _game_version: &str,
        _report: &StalenessReport,
        _log: &dyn LogSink,
    ) {
    }

    /// Static lookup; an unconfigured version yields no entries.
    async fn list_entries(&self, game_version: &str) -> Vec<ModEntry> {
        self.store().entries(game_version, self.kind()).await
    }

    /// Identity-matcher verdict. Sources that can compare against the remote
    /// override this.
    async fn assess(
        &self,
        entry: &ModEntry,
        _game_version: &str,
        local: &LocalInstallState,
        _log: &dyn LogSink,
    ) -> StalenessReport {
        match matcher::find_match(local.names(), entry) {
            Some(found) => StalenessReport::current(found),
            None => StalenessReport::missing(),
        }
    }

    async fn scan_installed(
        &self,
        entries: &[ModEntry],
        game_version: &str,
        dir: &Path,
        log: &dyn LogSink,
    ) -> ScanReport {
        let local = match LocalInstallState::scan(dir).await {
            Ok(local) => local,
            Err(e) => {
                log.log(&format!("Could not read mods directory: {e}"));
                LocalInstallState::default()
            }
        };

        if local.is_empty() {
            log.log(&format!("No {} mods installed yet in {:?}", self.kind(), dir));
        } else {
            log.log(&format!("Found {} JAR files in mods directory", local.files().len()));
        }

        let mut report = ScanReport::default();
        for entry in entries {
            let verdict = self.assess(entry, game_version, &local, log).await;
            if verdict.is_current() {
                log.log(&format!("Already installed: {}", entry.name));
            }
            report.entries.push(ScannedEntry {
                entry: entry.clone(),
                report: verdict,
            });
        }
        report
    }

    /// Never fails: every error ends up as `DownloadOutcome::Failed`.
    async fn download_entry(
        &self,
        entry: &ModEntry,
        game_version: &str,
        dir: &Path,
        sinks: Sinks<'_>,
    ) -> DownloadOutcome {
        sinks.log(format!("Checking {} ({})...", entry.name, entry.id));

        if let Ok(local) = LocalInstallState::scan(dir).await {
            if let Some(found) = matcher::find_match(local.names(), entry) {
                sinks.log(format!("{} already installed ({found}), skipping.", entry.name));
                return DownloadOutcome::Skipped;
            }
        }

        if let Some(reason) = self.unavailable_reason() {
            sinks.log(format!("Skipping {} - {}", entry.name, reason));
            return DownloadOutcome::Failed { reason };
        }

        match fetch_resolved(self, entry, game_version, dir, sinks).await {
            Ok(outcome) => outcome,
            Err(e) => {
                sinks.log(format!("Failed to download {}: {}", entry.name, e));
                DownloadOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

async fn fetch_resolved<S>(
    source: &S,
    entry: &ModEntry,
    game_version: &str,
    dir: &Path,
    sinks: Sinks<'_>,
) -> SyncResult<DownloadOutcome>
where
    S: CatalogSource + ?Sized,
{
    let artifact = source.resolve_artifact(entry, game_version, sinks.log).await?;
    if artifact.game_version != game_version {
        sinks.log(format!(
            "Selected {} for {} using fallback Minecraft {}",
            artifact.file_name, entry.name, artifact.game_version
        ));
    }

    ensure_writable(dir).await?;
    let dest = artifact_path(dir, &artifact.file_name)?;

    sinks.log(format!("Downloading {} ({})...", entry.name, artifact.file_name));
    source
        .fetcher()
        .fetch(&artifact.url, &dest, artifact.checksum.as_ref(), |p| {
            sinks.file(&entry.name, p.percent, p.bytes_done, p.bytes_total)
        })
        .await?;
    sinks.log(format!("Downloaded {} ({})", entry.name, artifact.file_name));

    source
        .on_downloaded(entry, game_version, &artifact, sinks.log)
        .await;

    Ok(DownloadOutcome::Downloaded {
        file_name: artifact.file_name,
        version: artifact.version,
    })
}

/// Try `game_version`, then each compatible predecessor, until `query` finds
/// something.
///
/// Per-version errors are logged and skipped. If every query failed the last
/// error is returned so the reason keeps its status code; otherwise the
/// search ends in `NotFound`.
pub async fn search_with_fallback<F, Fut>(
    entry: &ModEntry,
    game_version: &str,
    log: &dyn LogSink,
    mut query: F,
) -> SyncResult<RemoteArtifact>
where
    F: FnMut(String) -> Fut + Send,
    Fut: Future<Output = SyncResult<Option<RemoteArtifact>>> + Send,
{
    let mut last_error = None;
    let mut answered = false;

    for (attempt, version) in search_order(game_version).into_iter().enumerate() {
        if attempt > 0 {
            log.log(&format!("Trying fallback version: {version}"));
        }

        match query(version.clone()).await {
            Ok(Some(artifact)) => {
                debug!("Resolved {} at {} -> {}", entry.name, version, artifact.file_name);
                return Ok(artifact);
            }
            Ok(None) => {
                answered = true;
                debug!("No {} build for {}", entry.name, version);
            }
            Err(e) => {
                log.log(&format!("Error fetching {} for {}: {}", entry.name, version, e));
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if !answered => Err(e),
        _ => Err(SyncError::NotFound(format!(
            "{} for Minecraft {} or its fallback versions",
            entry.name, game_version
        ))),
    }
}

/// Dispatcher without `Box<dyn>`: one variant per source kind.
pub enum Catalog {
    CurseForge(CurseForgeSource),
    Github(GithubSource),
    Modrinth(ModrinthSource),
}

impl Catalog {
    pub fn new(
        kind: SourceKind,
        store: Arc<ConfigStore>,
        settings: &SyncSettings,
    ) -> SyncResult<Self> {
        Ok(match kind {
            SourceKind::CurseForge => Self::CurseForge(CurseForgeSource::new(store, settings)?),
            SourceKind::Github => Self::Github(GithubSource::new(store, settings)?),
            SourceKind::Modrinth => Self::Modrinth(ModrinthSource::new(store, settings)?),
        })
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Catalog::CurseForge(s) => s.kind(),
            Catalog::Github(s) => s.kind(),
            Catalog::Modrinth(s) => s.kind(),
        }
    }

    pub async fn reconcile(
        &self,
        game_version: &str,
        dir: &Path,
        sinks: Sinks<'_>,
    ) -> super::model::ReconciliationResult {
        match self {
            Catalog::CurseForge(s) => super::reconcile::reconcile(s, game_version, dir, sinks).await,
            Catalog::Github(s) => super::reconcile::reconcile(s, game_version, dir, sinks).await,
            Catalog::Modrinth(s) => super::reconcile::reconcile(s, game_version, dir, sinks).await,
        }
    }

    pub async fn scan(&self, game_version: &str, dir: &Path, log: &dyn LogSink) -> ScanReport {
        match self {
            Catalog::CurseForge(s) => scan_configured(s, game_version, dir, log).await,
            Catalog::Github(s) => scan_configured(s, game_version, dir, log).await,
            Catalog::Modrinth(s) => scan_configured(s, game_version, dir, log).await,
        }
    }
}

async fn scan_configured<S: CatalogSource>(
    source: &S,
    game_version: &str,
    dir: &Path,
    log: &dyn LogSink,
) -> ScanReport {
    let entries = source.list_entries(game_version).await;
    source.scan_installed(&entries, game_version, dir, log).await
}
