pub mod catalog;
pub mod config;
pub mod local;
pub mod matcher;
pub mod model;
pub mod orchestrator;
pub mod reconcile;
pub mod sink;
pub mod staleness;

pub use catalog::{Catalog, CatalogSource, ScanReport};
pub use config::{ConfigStore, ModsConfig, SyncSettings};
pub use model::{
    DownloadOutcome, LoaderType, ModEntry, ReconciliationResult, RemoteArtifact, SourceKind,
    SyncSummary,
};
pub use orchestrator::MultiSourceOrchestrator;
pub use reconcile::reconcile;
pub use sink::{ChannelSink, LogSink, NullSink, ProgressSink, Sinks, SyncEvent, TracingSink};
