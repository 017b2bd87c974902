use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::{search_with_fallback, CatalogSource};
use crate::core::downloader::ArtifactFetcher;
use crate::core::error::{SyncError, SyncResult};
use crate::core::http::{build_api_client, get_json};
use crate::core::mods::config::{ConfigStore, SyncSettings};
use crate::core::mods::model::{Checksum, LoaderType, ModEntry, RemoteArtifact, SourceKind};
use crate::core::mods::sink::{format_mb, LogSink};

/// Prefix of the placeholder key shipped in sample configurations.
const PLACEHOLDER_KEY_PREFIX: &str = "$2a$10$bL4bIL5p";
const MIN_KEY_LEN: usize = 21;

const HASH_ALGO_SHA1: u8 = 1;
const HASH_ALGO_MD5: u8 = 2;

#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[serde(default)]
    data: Vec<CurseForgeFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeFile {
    pub id: u64,
    #[serde(default)]
    pub display_name: String,
    pub file_name: String,
    pub file_date: Option<DateTime<Utc>>,
    pub file_length: Option<u64>,
    pub download_url: Option<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub hashes: Vec<CurseForgeHash>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurseForgeHash {
    pub value: String,
    pub algo: u8,
}

impl CurseForgeFile {
    fn supports(&self, game_version: &str, loader: LoaderType) -> bool {
        self.game_versions.iter().any(|v| v == game_version)
            && self
                .game_versions
                .iter()
                .any(|v| v.eq_ignore_ascii_case(loader.curseforge_tag()))
    }

    fn checksum(&self) -> Option<Checksum> {
        let by_algo = |algo: u8| self.hashes.iter().find(|h| h.algo == algo);
        by_algo(HASH_ALGO_SHA1)
            .map(|h| Checksum::Sha1(h.value.clone()))
            .or_else(|| by_algo(HASH_ALGO_MD5).map(|h| Checksum::Md5(h.value.clone())))
    }
}

/// A key that is absent, too short or the shipped placeholder cannot work.
pub fn is_usable_key(key: Option<&str>) -> bool {
    key.map(str::trim).is_some_and(|k| {
        k.len() >= MIN_KEY_LEN && !k.starts_with(PLACEHOLDER_KEY_PREFIX)
    })
}

/// Curated-project catalog. Needs an API key; without one it still scans
/// but every download fails with "API key required".
pub struct CurseForgeSource {
    store: Arc<ConfigStore>,
    client: Client,
    fetcher: ArtifactFetcher,
    base_url: String,
    loader: LoaderType,
    api_key: Option<String>,
}

impl CurseForgeSource {
    pub fn new(store: Arc<ConfigStore>, settings: &SyncSettings) -> SyncResult<Self> {
        let api_key = settings
            .curseforge_api_key
            .clone()
            .filter(|k| is_usable_key(Some(k.as_str())));
        if api_key.is_none() {
            warn!("CurseForge API key not configured; CurseForge downloads are disabled");
        }

        Ok(Self {
            store,
            client: build_api_client(settings)?,
            fetcher: ArtifactFetcher::from_settings(settings)?,
            base_url: settings.endpoints.curseforge.trim_end_matches('/').to_string(),
            loader: settings.loader,
            api_key,
        })
    }

    async fn fetch_files(&self, project_id: &str, game_version: &str) -> SyncResult<Vec<CurseForgeFile>> {
        let url = format!("{}/mods/{}/files", self.base_url, project_id);
        let mut request = self.client.get(&url).query(&[
            ("gameVersion", game_version.to_string()),
            ("modLoaderType", self.loader.curseforge_id().to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response: FilesResponse = get_json(request, &url).await?;
        Ok(response
            .data
            .into_iter()
            .filter(|f| f.supports(game_version, self.loader))
            .collect())
    }

    async fn query_version(
        &self,
        entry: &ModEntry,
        game_version: String,
        log: &dyn LogSink,
    ) -> SyncResult<Option<RemoteArtifact>> {
        let files = self.fetch_files(&entry.id, &game_version).await?;
        let Some(file) = pick_file(files, entry.pinned_version()) else {
            return Ok(None);
        };

        log.log(&format!(
            "Selected file: {} ({}) for MC {}",
            file.file_name,
            if file.display_name.is_empty() { "unnamed" } else { file.display_name.as_str() },
            game_version
        ));

        let checksum = file.checksum();
        let url = file.download_url.ok_or_else(|| {
            SyncError::NotFound(format!("no download URL for {} ({})", entry.name, file.file_name))
        })?;
        if let Some(len) = file.file_length {
            log.log(&format!("Download file: {} ({})", file.file_name, format_mb(len)));
        }

        Ok(Some(RemoteArtifact {
            url,
            file_name: file.file_name,
            size: file.file_length,
            published_at: file.file_date,
            version: file.id.to_string(),
            game_version,
            checksum,
        }))
    }
}

/// Newest by `fileDate`, or the file a pin names.
///
/// A pin equal to the id, display name or file name wins; otherwise the newest
/// file whose display name contains the pin ("15.2" finds "JEI 15.2.0.27").
fn pick_file(mut files: Vec<CurseForgeFile>, pin: Option<&str>) -> Option<CurseForgeFile> {
    files.sort_by(|a, b| b.file_date.cmp(&a.file_date));
    let Some(pin) = pin else {
        return files.into_iter().next();
    };

    let index = files
        .iter()
        .position(|f| f.id.to_string() == pin || f.display_name == pin || f.file_name == pin)
        .or_else(|| files.iter().position(|f| f.display_name.contains(pin)))?;
    Some(files.swap_remove(index))
}

#[async_trait]
impl CatalogSource for CurseForgeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::CurseForge
    }

    fn store(&self) -> &ConfigStore {
        &self.store
    }

    fn fetcher(&self) -> &ArtifactFetcher {
        &self.fetcher
    }

    fn unavailable_reason(&self) -> Option<String> {
        self.api_key
            .is_none()
            .then(|| "API key required".to_string())
    }

    async fn resolve_artifact(
        &self,
        entry: &ModEntry,
        game_version: &str,
        log: &dyn LogSink,
    ) -> SyncResult<RemoteArtifact> {
        log.log(&format!("Fetching files for {} (MC {})...", entry.name, game_version));
        search_with_fallback(entry, game_version, log, |v| self.query_version(entry, v, log)).await
    }
}
