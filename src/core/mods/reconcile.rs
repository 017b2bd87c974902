use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{info, warn};

use super::catalog::CatalogSource;
use super::local::{ensure_writable, remove_jar};
use super::model::{DownloadOutcome, ReconciliationResult};
use super::sink::Sinks;
use super::staleness::{remove_stale_copies, ArtifactState};

/// One pass for one source: scan, clean, then download what is missing in
/// configuration order.
///
/// Per-entry failures are counted and the pass continues. Only a directory
/// that cannot be written aborts it.
pub async fn reconcile<S>(
    source: &S,
    game_version: &str,
    dir: &Path,
    sinks: Sinks<'_>,
) -> ReconciliationResult
where
    S: CatalogSource + ?Sized,
{
    let kind = source.kind();
    sinks.log(format!("Target directory: {}", dir.display()));

    if let Err(e) = ensure_writable(dir).await {
        warn!(%kind, "Mods directory {:?} is not usable: {}", dir, e);
        sinks.log(format!("Directory setup failed: {e}"));
        return ReconciliationResult::aborted(e.to_string());
    }
    sinks.log("Directory is writable");

    let entries = source.list_entries(game_version).await;
    if entries.is_empty() {
        sinks.log(format!("No {kind} mods configured for Minecraft {game_version}"));
        return ReconciliationResult::empty();
    }

    sinks.log(format!("Scanning {kind} mods for Minecraft {game_version}..."));
    sinks.log(format!(
        "Required mods: {}",
        entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(", ")
    ));

    let scan = source
        .scan_installed(&entries, game_version, dir, sinks.log)
        .await;
    let installed = scan.installed();
    let missing = scan.missing();

    let mut result = ReconciliationResult {
        success: true,
        installed_count: installed.len(),
        missing_count: missing.len(),
        skipped_count: installed.len(),
        installed,
        missing,
        ..ReconciliationResult::default()
    };

    for scanned in scan.entries.iter().filter(|s| s.report.is_current()) {
        source
            .on_confirmed(&scanned.entry, game_version, &scanned.report, sinks.log)
            .await;
    }

    // Old copies of an entry the remote could not vouch for stay until a
    // replacement has landed.
    let mut deferred: HashMap<String, Vec<String>> = HashMap::new();
    for scanned in &scan.entries {
        let copies = &scanned.report.stale_copies;
        if copies.is_empty() {
            continue;
        }
        if scanned.report.unverified && scanned.report.needs_download() {
            sinks.log(format!(
                "Keeping {} old version(s) of {} until a replacement is downloaded: {}",
                copies.len(),
                scanned.entry.name,
                copies.join(", ")
            ));
            deferred.insert(scanned.entry.name.clone(), copies.clone());
            continue;
        }
        sinks.log(format!(
            "Found {} old version(s) of {}: {}",
            copies.len(),
            scanned.entry.name,
            copies.join(", ")
        ));
        result.cleaned_count += remove_stale_copies(dir, copies, sinks.log).await;
    }

    let mut replacing = HashSet::new();
    for scanned in &scan.entries {
        let ArtifactState::NeedsRedownload { reason } = &scanned.report.state else {
            continue;
        };
        replacing.insert(scanned.entry.name.clone());
        if let Some(local) = &scanned.report.local_file {
            match remove_jar(dir, local).await {
                Ok(()) => sinks.log(format!("Removed outdated {local} ({reason})")),
                Err(e) => sinks.log(format!("Failed to remove outdated {local}: {e}")),
            }
        }
    }

    if result.missing.is_empty() {
        sinks.log(format!("All {kind} mods are up to date! No downloads needed."));
    } else {
        let names: Vec<&str> = result.missing.iter().map(|e| e.name.as_str()).collect();
        sinks.log(format!(
            "Need to download from {kind} ({}): {}",
            names.len(),
            names.join(", ")
        ));
    }

    let total = result.missing.len();
    for (index, entry) in result.missing.iter().enumerate() {
        let label = format!("Downloading {kind} mods ({}/{})", index + 1, total);
        sinks.batch(&label, index + 1, total);

        match source.download_entry(entry, game_version, dir, sinks).await {
            DownloadOutcome::Downloaded { file_name, .. } => {
                result.downloaded_count += 1;
                if replacing.contains(&entry.name) {
                    result.redownloaded_count += 1;
                }
                if let Some(mut copies) = deferred.remove(&entry.name) {
                    copies.retain(|c| !c.eq_ignore_ascii_case(&file_name));
                    result.cleaned_count += remove_stale_copies(dir, &copies, sinks.log).await;
                }
            }
            DownloadOutcome::Skipped => result.skipped_count += 1,
            DownloadOutcome::Failed { .. } => {
                result.failed_count += 1;
                // A directory that stopped accepting writes fails every
                // remaining entry the same way.
                if let Err(e) = ensure_writable(dir).await {
                    if e.is_filesystem() {
                        sinks.log(format!("Directory setup failed: {e}"));
                        result.failed_count += total - index - 1;
                        result.success = false;
                        result.error = Some(e.to_string());
                        break;
                    }
                }
            }
        }
    }

    let summary = format!(
        "{kind} summary: {} installed, {} missing, {} downloaded, {} skipped, {} failed, {} cleaned, {} redownloaded",
        result.installed_count,
        result.missing_count,
        result.downloaded_count,
        result.skipped_count,
        result.failed_count,
        result.cleaned_count,
        result.redownloaded_count
    );
    info!(%kind, game_version, "{}", summary);
    sinks.log(summary);

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mods::catalog::{GithubSource, ModrinthSource};
    use crate::core::mods::config::{ConfigStore, ModsConfig, SyncSettings, VersionMods};
    use crate::core::mods::model::{ModEntry, SourceKind};
    use crate::core::mods::sink::{MemorySink, ProgressSink};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<String>>,
    }

    impl ProgressSink for Recorder {
        fn batch(&self, label: &str, _current: usize, _total: usize) {
            self.batches.lock().unwrap().push(label.to_string());
        }
        fn file(&self, _entry: &str, _percent: u8, _done: u64, _total: u64) {}
    }

    fn store_with(mods: VersionMods) -> Arc<ConfigStore> {
        let mut config = ModsConfig::default();
        config.versions.insert("1.20.1".into(), mods);
        Arc::new(ConfigStore::in_memory(config).unwrap())
    }

    fn settings(server: &MockServer) -> SyncSettings {
        let mut settings = SyncSettings::default();
        settings.endpoints.modrinth = server.uri();
        settings.endpoints.github = server.uri();
        settings
    }

    fn modrinth_version(server: &MockServer, file: &str) -> serde_json::Value {
        json!([{
            "id": "x",
            "version_number": "1.0",
            "files": [{
                "url": format!("{}/cdn/{}", server.uri(), file),
                "filename": file,
                "size": 3,
                "primary": true
            }]
        }])
    }

    #[tokio::test]
    async fn scenario_a_empty_directory_reports_all_missing() {
        let server = MockServer::start().await;
        let store = store_with(VersionMods {
            modrinth: vec![ModEntry::new("Fabric API", "P7dR8mSH")],
            ..VersionMods::default()
        });
        let source = ModrinthSource::new(store, &settings(&server)).unwrap();
        let tmp = tempfile::tempdir().unwrap();

        let entries = source.list_entries("1.20.1").await;
        let scan = source
            .scan_installed(&entries, "1.20.1", tmp.path(), &MemorySink::new())
            .await;
        assert!(scan.installed().is_empty());
        assert_eq!(scan.missing()[0].name, "Fabric API");
    }

    #[tokio::test]
    async fn unconfigured_version_is_a_successful_no_op() {
        let server = MockServer::start().await;
        let source = ModrinthSource::new(store_with(VersionMods::default()), &settings(&server)).unwrap();
        let tmp = tempfile::tempdir().unwrap();

        let result = reconcile(&source, "1.12.2", tmp.path(), Sinks::new(&MemorySink::new())).await;
        assert!(result.success);
        assert_eq!(result.missing_count, 0);
    }

    #[tokio::test]
    async fn unwritable_directory_aborts_this_source_only() {
        let server = MockServer::start().await;
        let store = store_with(VersionMods {
            modrinth: vec![ModEntry::new("Fabric API", "P7dR8mSH")],
            ..VersionMods::default()
        });
        let source = ModrinthSource::new(store, &settings(&server)).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("mods");
        std::fs::write(&blocker, b"file in the way").unwrap();

        let result = reconcile(&source, "1.20.1", &blocker, Sinks::new(&MemorySink::new())).await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn downloads_in_order_continue_past_failures_and_are_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/project/gvQqBUqZ/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(modrinth_version(&server, "lithium-fabric-0.11.jar")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/project/broken/version"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/lithium-fabric-0.11.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with(VersionMods {
            modrinth: vec![
                ModEntry::new("Broken Mod", "broken"),
                ModEntry::new("Lithium", "gvQqBUqZ"),
            ],
            ..VersionMods::default()
        });
        let source = ModrinthSource::new(store, &settings(&server)).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let log = MemorySink::new();
        let progress = Recorder::default();

        let first = reconcile(&source, "1.20.1", tmp.path(), Sinks::new(&log).with_progress(&progress)).await;
        assert!(first.success);
        assert_eq!(first.missing_count, 2);
        assert_eq!(first.failed_count, 1);
        assert_eq!(first.downloaded_count, 1);
        assert_eq!(
            *progress.batches.lock().unwrap(),
            vec!["Downloading Modrinth mods (1/2)", "Downloading Modrinth mods (2/2)"]
        );
        assert!(log.contains("Modrinth summary: 0 installed, 2 missing, 1 downloaded"));

        let second = reconcile(&source, "1.20.1", tmp.path(), Sinks::new(&log)).await;
        assert_eq!(second.installed_count, 1);
        assert_eq!(second.downloaded_count, 0);
        assert_eq!(second.redownloaded_count, 0);
        assert_eq!(second.cleaned_count, 0);
    }

    #[tokio::test]
    async fn scenario_d_renamed_release_asset_replaces_local_copy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/mod/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tag_name": "v2",
                "assets": [{
                    "name": "mod-v2.jar",
                    "size": 150,
                    "browser_download_url": format!("{}/download/mod-v2.jar", server.uri())
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/download/mod-v2.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 150]))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_with(VersionMods {
            github: vec![ModEntry::new("Mod", "owner/mod").with_file_name("mod-v1.jar")],
            ..VersionMods::default()
        });
        let source = GithubSource::new(store.clone(), &settings(&server)).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("mod-v1.jar"), vec![1u8; 100]).unwrap();
        std::fs::write(tmp.path().join("mod-v0.jar"), vec![0u8; 90]).unwrap();
        let log = MemorySink::new();

        let first = reconcile(&source, "1.20.1", tmp.path(), Sinks::new(&log)).await;
        assert!(log.contains("File name changed (local: mod-v1.jar, remote: mod-v2.jar)"));
        assert_eq!(first.redownloaded_count, 1);
        assert_eq!(first.cleaned_count, 1);

        assert_eq!(jars_in(tmp.path()), vec!["mod-v2.jar"]);

        let pinned = store.entries("1.20.1", SourceKind::Github).await;
        assert_eq!(pinned[0].file_name.as_deref(), Some("mod-v2.jar"));

        let second = reconcile(&source, "1.20.1", tmp.path(), Sinks::new(&log)).await;
        assert_eq!(second.installed_count, 1);
        assert_eq!(second.downloaded_count + second.redownloaded_count + second.cleaned_count, 0);
    }

    fn jars_in(dir: &Path) -> Vec<String> {
        let mut jars: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        jars.sort();
        jars
    }

    fn pinned_v2() -> Arc<ConfigStore> {
        store_with(VersionMods {
            github: vec![ModEntry::new("Mod", "owner/mod").with_file_name("mod-v2.jar")],
            ..VersionMods::default()
        })
    }

    #[tokio::test]
    async fn unreachable_release_keeps_the_only_old_copy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = GithubSource::new(pinned_v2(), &settings(&server)).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("mod-v1.jar"), vec![1u8; 100]).unwrap();
        let log = MemorySink::new();

        let result = reconcile(&source, "1.20.1", tmp.path(), Sinks::new(&log)).await;
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.cleaned_count, 0);
        assert_eq!(jars_in(tmp.path()), vec!["mod-v1.jar"]);
        assert!(log.contains("Keeping 1 old version(s) of Mod"));
    }

    #[tokio::test]
    async fn old_copy_is_removed_once_the_replacement_lands() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/mod/releases/latest"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/owner/mod/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tag_name": "v2",
                "assets": [{
                    "name": "mod-v2.jar",
                    "size": 4,
                    "browser_download_url": format!("{}/download/mod-v2.jar", server.uri())
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/download/mod-v2.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"v2!!".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let source = GithubSource::new(pinned_v2(), &settings(&server)).unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("mod-v1.jar"), vec![1u8; 100]).unwrap();

        let result = reconcile(&source, "1.20.1", tmp.path(), Sinks::new(&MemorySink::new())).await;
        assert_eq!(result.downloaded_count, 1);
        assert_eq!(result.cleaned_count, 1);
        assert_eq!(jars_in(tmp.path()), vec!["mod-v2.jar"]);
    }
}
