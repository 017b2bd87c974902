use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the mod synchronisation core.
/// Every fallible operation returns `Result<T, SyncError>`.
#[derive(Debug, Error)]
pub enum SyncError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Directory not writable: {path:?}: {source}")]
    DirectoryNotWritable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Refusing to write artifact with unsafe file name {0:?}")]
    InvalidFileName(String),

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Too many redirects (limit {limit}) starting at {url}")]
    TooManyRedirects { url: String, limit: usize },

    // ── Metadata ────────────────────────────────────────
    #[error("Failed to parse response from {url}: {source}")]
    Parse {
        url: String,
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No compatible artifact found: {0}")]
    NotFound(String),

    // ── Integrity ───────────────────────────────────────
    #[error("{algorithm} mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        algorithm: &'static str,
        expected: String,
        actual: String,
    },

    // ── Configuration ───────────────────────────────────
    #[error("Invalid mods configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Wraps an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    /// Filesystem failures abort a whole source pass; everything else is per entry.
    pub fn is_filesystem(&self) -> bool {
        matches!(
            self,
            SyncError::Io { .. } | SyncError::DirectoryNotWritable { .. }
        )
    }
}

impl From<std::io::Error> for SyncError {
    fn from(source: std::io::Error) -> Self {
        SyncError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// Results are handed to a launch step and UI summaries as plain strings.
impl serde::Serialize for SyncError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
