use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{search_with_fallback, CatalogSource};
use crate::core::downloader::ArtifactFetcher;
use crate::core::error::SyncResult;
use crate::core::http::{build_api_client, get_json};
use crate::core::mods::config::{ConfigStore, SyncSettings};
use crate::core::mods::model::{Checksum, LoaderType, ModEntry, RemoteArtifact, SourceKind};
use crate::core::mods::sink::LogSink;

#[derive(Debug, Deserialize)]
pub struct ModrinthVersion {
    pub id: String,
    pub version_number: String,
    pub date_published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<ModrinthFile>,
}

#[derive(Debug, Deserialize)]
pub struct ModrinthFile {
    pub url: String,
    pub filename: String,
    pub size: Option<u64>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub hashes: ModrinthHashes,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModrinthHashes {
    pub sha1: Option<String>,
    pub sha512: Option<String>,
}

impl ModrinthHashes {
    fn strongest(&self) -> Option<Checksum> {
        self.sha512
            .clone()
            .map(Checksum::Sha512)
            .or_else(|| self.sha1.clone().map(Checksum::Sha1))
    }
}

/// Versioned-release catalog: one version listing per project id.
pub struct ModrinthSource {
    store: Arc<ConfigStore>,
    client: Client,
    fetcher: ArtifactFetcher,
    base_url: String,
    loader: LoaderType,
}

impl ModrinthSource {
    pub fn new(store: Arc<ConfigStore>, settings: &SyncSettings) -> SyncResult<Self> {
        Ok(Self {
            store,
            client: build_api_client(settings)?,
            fetcher: ArtifactFetcher::from_settings(settings)?,
            base_url: settings.endpoints.modrinth.trim_end_matches('/').to_string(),
            loader: settings.loader,
        })
    }

    async fn fetch_versions(
        &self,
        project_id: &str,
        game_version: &str,
    ) -> SyncResult<Vec<ModrinthVersion>> {
        let url = format!("{}/project/{}/version", self.base_url, project_id);
        let request = self.client.get(&url).query(&[
            ("game_versions", format!("[\"{game_version}\"]")),
            ("loaders", format!("[\"{}\"]", self.loader.modrinth_slug())),
        ]);
        get_json(request, &url).await
    }

    async fn query_version(
        &self,
        entry: &ModEntry,
        game_version: String,
    ) -> SyncResult<Option<RemoteArtifact>> {
        let versions = self.fetch_versions(&entry.id, &game_version).await?;
        Ok(pick_version(versions, entry.pinned_version())
            .and_then(|version| to_artifact(version, game_version)))
    }
}

/// Newest first as listed, or the release matching a pin.
fn pick_version(versions: Vec<ModrinthVersion>, pin: Option<&str>) -> Option<ModrinthVersion> {
    match pin {
        Some(pin) => versions
            .into_iter()
            .find(|v| v.version_number == pin || v.id == pin),
        None => versions.into_iter().next(),
    }
}

fn to_artifact(version: ModrinthVersion, game_version: String) -> Option<RemoteArtifact> {
    let ModrinthVersion {
        version_number,
        date_published,
        files,
        ..
    } = version;

    let primary = files.iter().position(|f| f.primary).unwrap_or(0);
    let file = files.into_iter().nth(primary)?;

    Some(RemoteArtifact {
        checksum: file.hashes.strongest(),
        url: file.url,
        file_name: file.filename,
        size: file.size,
        published_at: date_published,
        version: version_number,
        game_version,
    })
}

#[async_trait]
impl CatalogSource for ModrinthSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Modrinth
    }

    fn store(&self) -> &ConfigStore {
        &self.store
    }

    fn fetcher(&self) -> &ArtifactFetcher {
        &self.fetcher
    }

    async fn resolve_artifact(
        &self,
        entry: &ModEntry,
        game_version: &str,
        log: &dyn LogSink,
    ) -> SyncResult<RemoteArtifact> {
        log.log(&format!("Fetching versions for {} (MC {})...", entry.name, game_version));
        search_with_fallback(entry, game_version, log, |v| self.query_version(entry, v)).await
    }
}
