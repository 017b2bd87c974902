use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const LATEST: &str = "latest";

/// Supported mod loaders — strongly typed, no magic strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoaderType {
    #[default]
    Fabric,
    Quilt,
    Forge,
    NeoForge,
}

impl LoaderType {
    /// Loader slug understood by the Modrinth `loaders` filter.
    pub fn modrinth_slug(&self) -> &'static str {
        match self {
            LoaderType::Fabric => "fabric",
            LoaderType::Quilt => "quilt",
            LoaderType::Forge => "forge",
            LoaderType::NeoForge => "neoforge",
        }
    }

    /// Tag CurseForge lists next to game versions in `gameVersions`.
    pub fn curseforge_tag(&self) -> &'static str {
        match self {
            LoaderType::Fabric => "Fabric",
            LoaderType::Quilt => "Quilt",
            LoaderType::Forge => "Forge",
            LoaderType::NeoForge => "NeoForge",
        }
    }

    /// CurseForge `modLoaderType` enum value.
    pub fn curseforge_id(&self) -> u8 {
        match self {
            LoaderType::Forge => 1,
            LoaderType::Fabric => 4,
            LoaderType::Quilt => 5,
            LoaderType::NeoForge => 6,
        }
    }
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.modrinth_slug())
    }
}

/// The three remote catalogs a mod can come from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Curated-project API (CurseForge).
    CurseForge,
    /// Generic release-asset API (GitHub releases).
    Github,
    /// Versioned-release API (Modrinth).
    Modrinth,
}

impl SourceKind {
    /// Orchestration order. Earlier sources install files that later sources'
    /// identity matchers then see as already present.
    pub const ORDER: [SourceKind; 3] = [
        SourceKind::CurseForge,
        SourceKind::Github,
        SourceKind::Modrinth,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::CurseForge => "CurseForge",
            SourceKind::Github => "GitHub",
            SourceKind::Modrinth => "Modrinth",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "curseforge" => Ok(SourceKind::CurseForge),
            "github" => Ok(SourceKind::Github),
            "modrinth" => Ok(SourceKind::Modrinth),
            other => Err(format!("unknown source '{other}'")),
        }
    }
}

/// A declaration that a mod must exist for a game version under one source.
///
/// `id` is opaque to everything but the owning source: a Modrinth project id,
/// a numeric CurseForge project id, or `owner/repo` for GitHub releases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModEntry {
    pub name: String,
    pub id: String,
    /// Pinned artifact name. Required for GitHub, absent for the catalogs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default = "default_version_pin")]
    pub version: String,
    /// Parsed and validated, never consulted by the reconciliation engine.
    #[serde(default)]
    pub required: bool,
}

fn default_version_pin() -> String {
    LATEST.to_string()
}

impl ModEntry {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            file_name: None,
            version: default_version_pin(),
            required: false,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Version pin, or `None` when the entry follows the latest release.
    pub fn pinned_version(&self) -> Option<&str> {
        let v = self.version.trim();
        if v.is_empty() || v.eq_ignore_ascii_case(LATEST) {
            None
        } else {
            Some(v)
        }
    }
}

/// Checksum published by a catalog next to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", content = "value", rename_all = "lowercase")]
pub enum Checksum {
    Sha1(String),
    Sha512(String),
    Md5(String),
}

impl Checksum {
    pub fn algorithm(&self) -> &'static str {
        match self {
            Checksum::Sha1(_) => "SHA-1",
            Checksum::Sha512(_) => "SHA-512",
            Checksum::Md5(_) => "MD5",
        }
    }

    pub fn expected(&self) -> &str {
        match self {
            Checksum::Sha1(v) | Checksum::Sha512(v) | Checksum::Md5(v) => v,
        }
    }
}

/// Resolved download candidate. Produced fresh per resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArtifact {
    pub url: String,
    pub file_name: String,
    pub size: Option<u64>,
    pub published_at: Option<DateTime<Utc>>,
    /// Source-reported label: Modrinth version number, CurseForge file id, GitHub tag.
    pub version: String,
    /// Game version the artifact was found under (differs on fallback).
    pub game_version: String,
    pub checksum: Option<Checksum>,
}

/// Per-entry result of `download_entry`. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Downloaded { file_name: String, version: String },
    Skipped,
    Failed { reason: String },
}

/// Summary of one (source, game version, directory) pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub success: bool,
    pub installed_count: usize,
    pub missing_count: usize,
    pub downloaded_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub cleaned_count: usize,
    pub redownloaded_count: usize,
    pub installed: Vec<ModEntry>,
    pub missing: Vec<ModEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReconciliationResult {
    /// Nothing configured for this version: a successful no-op.
    pub fn empty() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// The pass could not run at all (e.g. the directory is not writable).
    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: SourceKind,
    pub result: ReconciliationResult,
}

/// Aggregate over all sources, consumed by the launch step.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub game_version: String,
    pub sources: Vec<SourceReport>,
}

impl SyncSummary {
    pub fn total_downloaded(&self) -> usize {
        self.sources.iter().map(|s| s.result.downloaded_count).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.sources.iter().map(|s| s.result.failed_count).sum()
    }

    pub fn total_cleaned(&self) -> usize {
        self.sources.iter().map(|s| s.result.cleaned_count).sum()
    }

    pub fn total_redownloaded(&self) -> usize {
        self.sources.iter().map(|s| s.result.redownloaded_count).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.sources
            .iter()
            .all(|s| s.result.success && s.result.failed_count == 0)
    }

    pub fn get(&self, source: SourceKind) -> Option<&ReconciliationResult> {
        self.sources
            .iter()
            .find(|s| s.source == source)
            .map(|s| &s.result)
    }
}
