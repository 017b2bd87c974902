// ─── ModSync Core ───
// Multi-source mod acquisition and reconciliation for a Minecraft launcher.
//
// Architecture:
//   core/
//     error.rs    — SyncError + SyncResult
//     http.rs     — Shared reqwest clients, JSON GET helper
//     version/    — Game-version fallback table
//     downloader/ — Streaming artifact fetcher with checksum validation
//     mods/       — Matcher, catalogs, staleness, reconciliation, orchestration

pub mod downloader;
pub mod error;
pub mod http;
pub mod mods;
pub mod version;
