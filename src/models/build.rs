use super::catalog::{FLEA_MARKET, Module, SlotId, Weapon};
use super::tier::TierRating;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Stat the generator favours when narrowing its candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPriority {
    #[default]
    Balanced,
    Ergonomics,
    LowRecoil,
}

impl FromStr for BuildPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "balanced" => Ok(BuildPriority::Balanced),
            "ergonomics" | "ergo" => Ok(BuildPriority::Ergonomics),
            "low_recoil" | "recoil" => Ok(BuildPriority::LowRecoil),
            other => Err(format!("unknown build priority: {}", other)),
        }
    }
}

/// Constraints for one generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Total budget. `None` means unlimited.
    pub budget: Option<u64>,
    #[serde(default)]
    pub trader_levels: HashMap<String, u8>,
    #[serde(default)]
    pub use_flea_only: bool,
    #[serde(default)]
    pub weapon_type: Option<String>,
    #[serde(default)]
    pub priority: BuildPriority,
}

impl BuildConfig {
    pub fn with_budget(budget: u64) -> Self {
        Self {
            budget: Some(budget),
            ..Self::default()
        }
    }

    /// Set a trader's loyalty level, clamped to 0-4.
    pub fn trader_level(mut self, trader: impl Into<String>, level: u8) -> Self {
        self.trader_levels.insert(trader.into(), level.min(4));
        self
    }

    /// Every known trader at the same level.
    pub fn all_traders(mut self, traders: &[&str], level: u8) -> Self {
        for trader in traders {
            self.trader_levels.insert(trader.to_string(), level.min(4));
        }
        self
    }
}

/// Where an item was bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurchaseSource {
    Trader { name: String, loyalty_level: u8 },
    FleaMarket,
}

impl PurchaseSource {
    pub fn vendor_name(&self) -> &str {
        match self {
            PurchaseSource::Trader { name, .. } => name,
            PurchaseSource::FleaMarket => FLEA_MARKET,
        }
    }

    pub fn is_flea(&self) -> bool {
        matches!(self, PurchaseSource::FleaMarket)
    }
}

impl fmt::Display for PurchaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurchaseSource::Trader {
                name,
                loyalty_level,
            } => write!(f, "{} LL{}", name, loyalty_level),
            PurchaseSource::FleaMarket => f.write_str(FLEA_MARKET),
        }
    }
}

/// A module placed in a slot together with how it was paid for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledModule {
    pub module: Module,
    pub source: PurchaseSource,
    pub price: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildStats {
    pub ergonomics: f64,
    pub recoil_vertical: f64,
    pub recoil_horizontal: f64,
}

/// Key-module and required-slot coverage of a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completeness {
    pub has_all_required_slots: bool,
    pub has_sight: bool,
    pub has_stock: bool,
    pub has_grip: bool,
}

/// A weapon with one module per filled slot, priced and rated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedBuild {
    pub weapon: Weapon,
    pub weapon_source: PurchaseSource,
    pub weapon_price: u64,
    pub modules: IndexMap<SlotId, InstalledModule>,
    pub total_cost: u64,
    /// Budget left after purchase. `None` when the budget was unlimited.
    pub remaining_budget: Option<u64>,
    pub stats: BuildStats,
    pub completeness: Completeness,
    pub tier: TierRating,
    pub availability_sources: BTreeSet<String>,
}

impl GeneratedBuild {
    pub fn modules_cost(&self) -> u64 {
        self.modules.values().map(|m| m.price).sum()
    }

    pub fn uses_flea(&self) -> bool {
        self.weapon_source.is_flea() || self.modules.values().any(|m| m.source.is_flea())
    }
}
