use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{error, info};

use super::catalog::Catalog;
use super::config::ConfigStore;
use super::model::{ReconciliationResult, SourceKind, SourceReport, SyncSummary};
use super::sink::Sinks;
use crate::core::error::SyncResult;

/// Runs every source against the same directory, one after the other.
///
/// Order is CurseForge, GitHub, Modrinth so files installed by an earlier
/// source are already on disk when a later source's matcher scans.
pub struct MultiSourceOrchestrator {
    catalogs: Vec<Catalog>,
}

impl MultiSourceOrchestrator {
    pub async fn from_store(store: Arc<ConfigStore>) -> SyncResult<Self> {
        Self::for_sources(store, &SourceKind::ORDER).await
    }

    /// Only `sources`, still in the fixed order.
    pub async fn for_sources(store: Arc<ConfigStore>, sources: &[SourceKind]) -> SyncResult<Self> {
        let settings = store.settings().await;
        let catalogs = SourceKind::ORDER
            .iter()
            .filter(|kind| sources.contains(*kind))
            .map(|kind| Catalog::new(*kind, store.clone(), &settings))
            .collect::<SyncResult<Vec<_>>>()?;
        Ok(Self { catalogs })
    }

    pub fn sources(&self) -> Vec<SourceKind> {
        self.catalogs.iter().map(Catalog::kind).collect()
    }

    pub fn catalogs(&self) -> &[Catalog] {
        &self.catalogs
    }

    /// Never fails. A source that panics shows up as an aborted result.
    pub async fn run(&self, game_version: &str, dir: &Path, sinks: Sinks<'_>) -> SyncSummary {
        info!("Synchronising mods for Minecraft {} into {:?}", game_version, dir);
        let mut summary = SyncSummary {
            game_version: game_version.to_string(),
            sources: Vec::with_capacity(self.catalogs.len()),
        };

        for catalog in &self.catalogs {
            let kind = catalog.kind();
            sinks.log(format!("--- {kind} mods ---"));
            let result = guarded(kind, catalog.reconcile(game_version, dir, sinks), sinks).await;
            summary.sources.push(SourceReport {
                source: kind,
                result,
            });
        }

        sinks.log(format!(
            "Mod sync finished for Minecraft {}: {} downloaded, {} failed, {} cleaned, {} redownloaded",
            game_version,
            summary.total_downloaded(),
            summary.total_failed(),
            summary.total_cleaned(),
            summary.total_redownloaded()
        ));
        summary
    }
}

async fn guarded<F>(kind: SourceKind, pass: F, sinks: Sinks<'_>) -> ReconciliationResult
where
    F: Future<Output = ReconciliationResult>,
{
    match AssertUnwindSafe(pass).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(%kind, "Reconciliation panicked: {}", message);
            sinks.log(format!("Error processing {kind} mods: {message}"));
            ReconciliationResult::aborted(format!("{kind} reconciliation panicked: {message}"))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
