use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::model::{LoaderType, ModEntry, SourceKind};
use super::sink::LogSink;
use crate::core::error::{SyncError, SyncResult};
use crate::core::http::APP_USER_AGENT;

const APP_DIR_NAME: &str = "ModSync";
const CONFIG_FILE: &str = "mods-config.json";
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub const CURSEFORGE_KEY_ENV: &str = "CURSEFORGE_API_KEY";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Base URLs of the three catalogs. Overridable for mirrors and tests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoints {
    pub modrinth: String,
    pub curseforge: String,
    pub github: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            modrinth: "https://api.modrinth.com/v2".into(),
            curseforge: "https://api.curseforge.com/v1".into(),
            github: "https://api.github.com".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    pub loader: LoaderType,
    pub user_agent: String,
    /// Metadata requests.
    pub api_timeout_secs: u64,
    /// Whole artifact transfer, redirects included.
    pub download_timeout_secs: u64,
    pub max_redirects: usize,
    pub endpoints: Endpoints,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curseforge_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            loader: LoaderType::Fabric,
            user_agent: APP_USER_AGENT.into(),
            api_timeout_secs: 10,
            download_timeout_secs: 30,
            max_redirects: 10,
            endpoints: Endpoints::default(),
            curseforge_api_key: None,
            github_token: None,
        }
    }
}

/// Entries declared for one game version, per source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionMods {
    pub curseforge: Vec<ModEntry>,
    pub github: Vec<ModEntry>,
    pub modrinth: Vec<ModEntry>,
}

impl VersionMods {
    pub fn entries(&self, source: SourceKind) -> &[ModEntry] {
        match source {
            SourceKind::CurseForge => &self.curseforge,
            SourceKind::Github => &self.github,
            SourceKind::Modrinth => &self.modrinth,
        }
    }

    fn entries_mut(&mut self, source: SourceKind) -> &mut Vec<ModEntry> {
        match source {
            SourceKind::CurseForge => &mut self.curseforge,
            SourceKind::Github => &mut self.github,
            SourceKind::Modrinth => &mut self.modrinth,
        }
    }
}

/// The whole `mods-config.json` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModsConfig {
    #[serde(default = "current_schema")]
    pub schema_version: u32,
    #[serde(default)]
    pub settings: SyncSettings,
    #[serde(default)]
    pub versions: BTreeMap<String, VersionMods>,
}

fn current_schema() -> u32 {
    CURRENT_SCHEMA_VERSION
}

impl Default for ModsConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            settings: SyncSettings::default(),
            versions: BTreeMap::new(),
        }
    }
}

impl ModsConfig {
    /// Reject documents the sources could not act on.
    pub fn validate(&self) -> SyncResult<()> {
        if self.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(SyncError::Config(format!(
                "schema version {} is newer than supported {}",
                self.schema_version, CURRENT_SCHEMA_VERSION
            )));
        }

        let mut errors = Vec::new();
        for (game_version, mods) in &self.versions {
            for source in SourceKind::ORDER {
                for entry in mods.entries(source) {
                    if let Err(reason) = validate_entry(entry, source) {
                        errors.push(format!("{game_version}/{source}/{}: {reason}", entry.name));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Config(errors.join("; ")))
        }
    }

    pub fn entries(&self, game_version: &str, source: SourceKind) -> Vec<ModEntry> {
        self.versions
            .get(game_version)
            .map(|m| m.entries(source).to_vec())
            .unwrap_or_default()
    }

    /// Pull credentials from the environment when the file leaves them unset.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(CURSEFORGE_KEY_ENV) {
            if !key.trim().is_empty() {
                self.settings.curseforge_api_key = Some(key);
            }
        }
        if let Ok(token) = std::env::var(GITHUB_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.settings.github_token = Some(token);
            }
        }
    }
}

fn validate_entry(entry: &ModEntry, source: SourceKind) -> Result<(), String> {
    if entry.name.trim().is_empty() {
        return Err("missing name".into());
    }
    if entry.id.trim().is_empty() {
        return Err(format!("{source} source requires 'id'"));
    }

    match source {
        SourceKind::CurseForge => {
            entry
                .id
                .parse::<u64>()
                .map_err(|_| format!("CurseForge project id '{}' is not numeric", entry.id))?;
        }
        SourceKind::Github => {
            let valid_repo = entry
                .id
                .split_once('/')
                .is_some_and(|(owner, repo)| {
                    !owner.is_empty() && !repo.is_empty() && !repo.contains('/')
                });
            if !valid_repo {
                return Err(format!("GitHub id '{}' must be 'owner/repo'", entry.id));
            }
            if entry.file_name.as_deref().map_or(true, |f| f.trim().is_empty()) {
                return Err("GitHub source requires 'fileName'".into());
            }
        }
        SourceKind::Modrinth => {}
    }

    Ok(())
}

/// Configuration loaded once per process and shared by reference.
///
/// The only mutation is [`ConfigStore::update_file_name`], which persists
/// immediately when the store is file-backed.
pub struct ConfigStore {
    path: Option<PathBuf>,
    config: RwLock<ModsConfig>,
    /// Credentials as written in the file; environment overrides never get persisted.
    file_credentials: (Option<String>, Option<String>),
}

impl ConfigStore {
    /// Default location: `<data dir>/ModSync/mods-config.json`.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE)
    }

    pub async fn load(path: &Path) -> SyncResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::io(path, e))?;
        let mut config: ModsConfig = serde_json::from_str(&raw)?;
        let file_credentials = (
            config.settings.curseforge_api_key.clone(),
            config.settings.github_token.clone(),
        );
        config.apply_env_overrides();
        config.validate()?;

        info!(
            "Loaded mods configuration from {:?} ({} game versions)",
            path,
            config.versions.len()
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            config: RwLock::new(config),
            file_credentials,
        })
    }

    /// A store with no backing file; renames only live in memory.
    pub fn in_memory(config: ModsConfig) -> SyncResult<Self> {
        config.validate()?;
        let file_credentials = (
            config.settings.curseforge_api_key.clone(),
            config.settings.github_token.clone(),
        );
        Ok(Self {
            path: None,
            config: RwLock::new(config),
            file_credentials,
        })
    }

    pub async fn snapshot(&self) -> ModsConfig {
        self.config.read().await.clone()
    }

    pub async fn settings(&self) -> SyncSettings {
        self.config.read().await.settings.clone()
    }

    pub async fn entries(&self, game_version: &str, source: SourceKind) -> Vec<ModEntry> {
        self.config.read().await.entries(game_version, source)
    }

    /// Point an entry at the artifact name upstream now publishes.
    ///
    /// Returns `false` when no entry named `entry_name` pins `old_file_name`
    /// for this version and source.
    pub async fn update_file_name(
        &self,
        game_version: &str,
        source: SourceKind,
        entry_name: &str,
        old_file_name: &str,
        new_file_name: &str,
        log: &dyn LogSink,
    ) -> SyncResult<bool> {
        let snapshot = {
            let mut config = self.config.write().await;
            let Some(mods) = config.versions.get_mut(game_version) else {
                return Ok(false);
            };
            let Some(entry) = mods.entries_mut(source).iter_mut().find(|e| {
                e.name == entry_name && e.file_name.as_deref() == Some(old_file_name)
            }) else {
                return Ok(false);
            };
            entry.file_name = Some(new_file_name.to_string());
            let mut snapshot = config.clone();
            snapshot.settings.curseforge_api_key = self.file_credentials.0.clone();
            snapshot.settings.github_token = self.file_credentials.1.clone();
            snapshot
        };

        let message = format!(
            "Updated config: {entry_name} file name changed from {old_file_name} to {new_file_name}"
        );
        info!(game_version, %source, "{}", message);
        log.log(&message);

        if let Some(path) = &self.path {
            persist(path, &snapshot).await?;
            log.log("Configuration file updated successfully");
        }

        Ok(true)
    }
}

async fn persist(path: &Path, config: &ModsConfig) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, json).await.map_err(|e| {
        warn!("Could not persist mods configuration to {:?}: {}", path, e);
        SyncError::io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mods::sink::MemorySink;

    fn sample() -> ModsConfig {
        serde_json::from_value(serde_json::json!({
            "schemaVersion": 1,
            "settings": { "loader": "fabric", "maxRedirects": 5 },
            "versions": {
                "1.20.1": {
                    "modrinth": [{ "name": "Fabric API", "id": "P7dR8mSH" }],
                    "curseforge": [{ "name": "JEI", "id": "325471" }],
                    "github": [{ "name": "Custom", "id": "owner/repo", "fileName": "custom-v1.jar" }]
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn parses_camel_case_document_with_defaults() {
        let config = sample();
        assert_eq!(config.settings.max_redirects, 5);
        assert_eq!(config.settings.download_timeout_secs, 30);
        assert_eq!(config.entries("1.20.1", SourceKind::Github)[0].version, "latest");
        assert!(config.entries("1.12.2", SourceKind::Modrinth).is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn github_entries_need_file_name_and_repo() {
        let mut config = sample();
        config.versions.get_mut("1.20.1").unwrap().github[0].file_name = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fileName"));

        let mut config = sample();
        config.versions.get_mut("1.20.1").unwrap().github[0].id = "just-a-repo".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn curseforge_ids_must_be_numeric() {
        let mut config = sample();
        config.versions.get_mut("1.20.1").unwrap().curseforge[0].id = "jei".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let mut config = sample();
        config.schema_version = CURRENT_SCHEMA_VERSION + 1;
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[tokio::test]
    async fn rename_is_persisted_and_audited() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mods-config.json");
        tokio::fs::write(&path, serde_json::to_string(&sample()).unwrap())
            .await
            .unwrap();

        let store = ConfigStore::load(&path).await.unwrap();
        let log = MemorySink::new();
        let changed = store
            .update_file_name("1.20.1", SourceKind::Github, "Custom", "custom-v1.jar", "custom-v2.jar", &log)
            .await
            .unwrap();

        assert!(changed);
        assert!(log.contains("custom-v1.jar to custom-v2.jar"));

        let reloaded = ConfigStore::load(&path).await.unwrap();
        let entries = reloaded.entries("1.20.1", SourceKind::Github).await;
        assert_eq!(entries[0].file_name.as_deref(), Some("custom-v2.jar"));
    }

    #[tokio::test]
    async fn rename_of_unknown_entry_is_a_no_op() {
        let store = ConfigStore::in_memory(sample()).unwrap();
        let changed = store
            .update_file_name("1.20.1", SourceKind::Github, "Other", "x.jar", "y.jar", &MemorySink::new())
            .await
            .unwrap();
        assert!(!changed);
    }
}
