pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::error::{SyncError, SyncResult};
pub use crate::core::mods::{
    ConfigStore, ModEntry, MultiSourceOrchestrator, ReconciliationResult, Sinks, SourceKind,
    SyncSummary,
};

/// Initialize structured logging. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,modsync_lib=debug")),
        )
        .try_init();
}
