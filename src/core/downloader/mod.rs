pub mod checksum;
pub mod client;

pub use client::{artifact_path, ArtifactFetcher, FetchProgress, FetchReport};
