use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::CatalogSource;
use crate::core::downloader::ArtifactFetcher;
use crate::core::error::{SyncError, SyncResult};
use crate::core::http::{build_api_client, get_json};
use crate::core::mods::config::{ConfigStore, SyncSettings};
use crate::core::mods::local::{is_jar, LocalInstallState};
use crate::core::mods::model::{ModEntry, RemoteArtifact, SourceKind};
use crate::core::mods::sink::LogSink;
use crate::core::mods::staleness::{self, entry_base_token, shares_base, RemoteCheck, StalenessReport};

#[derive(Debug, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    pub size: u64,
    pub browser_download_url: String,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Exact pinned name first, then the first `.jar` sharing the pinned base token.
pub fn find_asset<'a>(release: &'a GithubRelease, entry: &ModEntry) -> Option<&'a GithubAsset> {
    let pinned = entry.file_name.as_deref().unwrap_or_default();
    if let Some(exact) = release.assets.iter().find(|a| a.name == pinned) {
        return Some(exact);
    }

    let base = entry_base_token(entry);
    release
        .assets
        .iter()
        .find(|a| is_jar(&a.name) && shares_base(&a.name, &base))
}

/// Generic release-asset source: entries pin a file name inside
/// `owner/repo` releases. Upstream renames are detected and written back to
/// the configuration.
pub struct GithubSource {
    store: Arc<ConfigStore>,
    client: Client,
    fetcher: ArtifactFetcher,
    base_url: String,
    token: Option<String>,
}

impl GithubSource {
    pub fn new(store: Arc<ConfigStore>, settings: &SyncSettings) -> SyncResult<Self> {
        Ok(Self {
            store,
            client: build_api_client(settings)?,
            fetcher: ArtifactFetcher::from_settings(settings)?,
            base_url: settings.endpoints.github.trim_end_matches('/').to_string(),
            token: settings.github_token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    async fn fetch_release(&self, entry: &ModEntry, log: &dyn LogSink) -> SyncResult<GithubRelease> {
        let url = match entry.pinned_version() {
            Some(tag) => {
                log.log(&format!("Fetching GitHub release info for tag '{tag}'..."));
                format!("{}/repos/{}/releases/tags/{}", self.base_url, entry.id, tag)
            }
            None => {
                log.log("Fetching latest GitHub release info...");
                format!("{}/repos/{}/releases/latest", self.base_url, entry.id)
            }
        };

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        get_json(request, &url).await
    }

    async fn persist_rename(
        &self,
        entry: &ModEntry,
        game_version: &str,
        new_name: &str,
        log: &dyn LogSink,
    ) {
        let Some(old_name) = entry.file_name.as_deref() else {
            return;
        };
        if old_name == new_name {
            return;
        }

        if let Err(e) = self
            .store
            .update_file_name(game_version, SourceKind::Github, &entry.name, old_name, new_name, log)
            .await
        {
            log.log(&format!("Error updating mod config: {e}"));
        }
    }
}

#[async_trait]
impl CatalogSource for GithubSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Github
    }

    fn store(&self) -> &ConfigStore {
        &self.store
    }

    fn fetcher(&self) -> &ArtifactFetcher {
        &self.fetcher
    }

    /// Releases are not keyed by game version, so no fallback search applies.
    async fn resolve_artifact(
        &self,
        entry: &ModEntry,
        game_version: &str,
        log: &dyn LogSink,
    ) -> SyncResult<RemoteArtifact> {
        let release = self.fetch_release(entry, log).await?;

        let Some(asset) = find_asset(&release, entry) else {
            let available: Vec<&str> = release.assets.iter().map(|a| a.name.as_str()).collect();
            log.log(&format!("Available files: {}", available.join(", ")));
            return Err(SyncError::NotFound(format!(
                "no file matching {} in GitHub release {}",
                entry.file_name.as_deref().unwrap_or(&entry.name),
                release.tag_name
            )));
        };

        if entry.file_name.as_deref() != Some(asset.name.as_str()) {
            log.log(&format!("Found alternative file on GitHub: {}", asset.name));
        }

        Ok(RemoteArtifact {
            url: asset.browser_download_url.clone(),
            file_name: asset.name.clone(),
            size: Some(asset.size),
            published_at: asset.updated_at.or(release.published_at),
            version: release.tag_name.clone(),
            game_version: game_version.to_string(),
            checksum: None,
        })
    }

    async fn assess(
        &self,
        entry: &ModEntry,
        game_version: &str,
        local: &LocalInstallState,
        log: &dyn LogSink,
    ) -> StalenessReport {
        if local.is_empty() {
            return StalenessReport::missing();
        }

        let remote = match self.resolve_artifact(entry, game_version, log).await {
            Ok(artifact) => RemoteCheck::Resolved(artifact),
            Err(e) => RemoteCheck::Unavailable(e.to_string()),
        };
        staleness::evaluate(entry, local, &remote, log)
    }

    /// Already holding the renamed artifact: only the pin is out of date.
    async fn on_confirmed(
        &self,
        entry: &ModEntry,
        game_version: &str,
        report: &StalenessReport,
        log: &dyn LogSink,
    ) {
        if let Some(current) = report.local_file.as_deref() {
            self.persist_rename(entry, game_version, current, log).await;
        }
    }

    async fn on_downloaded(
        &self,
        entry: &ModEntry,
        game_version: &str,
        artifact: &RemoteArtifact,
        log: &dyn LogSink,
    ) {
        self.persist_rename(entry, game_version, &artifact.file_name, log)
            .await;
    }
}
