//! Data models for the build engine.
//!
//! This module contains the plain data structures passed between the engine's services:
//! - [`catalog`]: weapons, slots, modules and vendor offers as supplied by a catalog provider
//! - [`build`]: generation constraints ([`BuildConfig`]) and the resulting [`GeneratedBuild`]
//! - [`quest`]: quest stat requirements and the [`QuestBuildResult`] of the optimizer
//! - [`tier`]: the [`TierRating`] letter grade and its presentation lookup
//! - [`config`]: engine tuning loaded from `gunsmith.yaml` ([`EngineConfig`])
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: everything derives `Serialize`/`Deserialize` so the presentation layer
//!   can consume results as plain data
//! - **Ephemeral**: builds are constructed per request and handed off, never mutated in place
//!   by the engine afterwards

pub mod build;
pub mod catalog;
pub mod config;
pub mod quest;
pub mod tier;

pub use build::{
    BuildConfig, BuildPriority, BuildStats, Completeness, GeneratedBuild, InstalledModule,
    PurchaseSource,
};
pub use catalog::{
    FLEA_MARKET, Module, ModuleId, ModuleStats, Slot, SlotId, VendorOffer, Weapon, WeaponDetails,
    WeaponId, WeaponStats, cheapest_offer,
};
pub use config::{
    CacheSettings, EngineConfig, GeneratorSettings, LoggingSettings, OptimizerSettings,
    PriceBandTier,
};
pub use quest::{
    AttributeRequirement, BUILD_WEAPON_OBJECTIVE, Comparator, ObjectiveAttribute, ObjectiveItem,
    QuestBuildRequirements, QuestBuildResult, QuestModule, QuestObjective, QuestRequirement,
    QuestStat, QuestStats, RequirementCheck, RequirementParseError,
};
pub use tier::{TierDescription, TierRating};
