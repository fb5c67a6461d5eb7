//! Services module - the build generation and evaluation engine.
//!
//! The services turn catalog data into builds. They never talk to a user interface and
//! never persist anything; every request is answered from its explicit inputs plus the
//! shared slot cache.
//!
//! # Components
//!
//! - [`SlotCompatibilityResolver`]: Fetches and caches weapon slots, answers compatibility
//!   queries and validates manual slot assignments ([`BuildValidation`])
//!
//! - [`BudgetBuildGenerator`]: Picks a weapon for a budget and fills its slots with
//!   affordable, loyalty-legal modules
//!
//! - [`QuestRequirementOptimizer`]: Starts from a weapon's factory configuration and
//!   greedily swaps or adds modules until quest stat thresholds are met
//!
//! - [`TierEvaluator`]: Pure scoring of final stats, completeness and cost into a
//!   [`TierRating`](crate::models::TierRating)
//!
//! - [`BuildEngine`]: Wires the above to one [`CatalogProvider`]
//!
//! # Design Philosophy
//!
//! - **Injected randomness**: every random choice draws from a caller-supplied `Rng`, so a
//!   seeded `StdRng` reproduces a build exactly
//! - **Cancellable**: catalog fetches race a [`Cancellation`] signal and the optimizer checks
//!   it between passes
//! - **Async only at the edge**: providers are async, scoring and optimization are not
//!
//! # Usage Example
//!
//! ```ignore
//! use gunsmith::models::{BuildConfig, EngineConfig};
//! use gunsmith::services::{BuildEngine, Cancellation, StaticCatalog};
//! use rand::SeedableRng;
//!
//! let catalog = StaticCatalog::load("catalog.json".into())?;
//! let engine = BuildEngine::new(Arc::new(catalog), &EngineConfig::default());
//!
//! let config = BuildConfig::with_budget(300_000).trader_level("Prapor", 2);
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//! let build = engine.random_build(&config, &mut rng, &Cancellation::none()).await?;
//! println!("{} ({})", build.weapon.name, build.tier);
//! ```

pub mod cancel;
pub mod catalog;
pub mod compatibility;
pub mod engine;
pub mod error;
pub mod generator;
pub mod optimizer;
pub mod tier;

pub use cancel::Cancellation;
pub use catalog::{CatalogProvider, CatalogSnapshot, QuestDataProvider, StaticCatalog};
pub use compatibility::{
    BuildValidation, SlotCompatibilityResolver, ValidationIssue, validate_assignment,
};
pub use engine::BuildEngine;
pub use error::{BuildError, CatalogError};
pub use generator::{BudgetBuildGenerator, SlotClassifier};
pub use optimizer::QuestRequirementOptimizer;
pub use tier::{BaseStats, ScoreBreakdown, TierEvaluator, TierInputs};
