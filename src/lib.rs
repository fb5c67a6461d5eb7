// gunsmith - weapon build generation and evaluation engine
//
// This is the library crate containing the engine and its data structures.
// The binary crate (main.rs) provides the command-line entry point.

pub mod cache;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use cache::SlotCache;
pub use config::ConfigManager;
pub use metrics::EngineMetrics;
pub use models::{
    BuildConfig, EngineConfig, GeneratedBuild, QuestBuildRequirements, QuestBuildResult,
    TierRating,
};
pub use services::{BuildEngine, BuildError, Cancellation, CatalogProvider, StaticCatalog};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
