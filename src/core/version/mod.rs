pub mod compat;

pub use compat::{fallback_versions, search_order};
