use super::quest::QuestStat;
use serde::{Deserialize, Serialize};

/// Engine configuration from gunsmith.yaml
///
/// Every section falls back to its defaults when omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub generator: GeneratorSettings,

    #[serde(default)]
    pub optimizer: OptimizerSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Minimum share of the budget a weapon must cost, for budgets below `below`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBandTier {
    pub below: u64,
    pub min_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    /// Upper bound of the weapon price as a share of the budget.
    #[serde(default = "default_max_weapon_share")]
    pub max_weapon_share: f64,

    /// Ascending budget tiers for the lower bound of the price band.
    #[serde(default = "default_price_band_tiers")]
    pub price_band_tiers: Vec<PriceBandTier>,

    /// Lower bound share for budgets above every tier.
    #[serde(default = "default_top_min_share")]
    pub top_min_share: f64,

    /// Number of most expensive weapons considered when the band is empty.
    #[serde(default = "default_fallback_pool")]
    pub fallback_pool: usize,

    /// Fraction of in-band weapons (most expensive first) eligible for the pick.
    #[serde(default = "default_top_fraction")]
    pub top_fraction: f64,

    #[serde(default = "default_optional_skip_probability")]
    pub optional_skip_probability: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            max_weapon_share: default_max_weapon_share(),
            price_band_tiers: default_price_band_tiers(),
            top_min_share: default_top_min_share(),
            fallback_pool: default_fallback_pool(),
            top_fraction: default_top_fraction(),
            optional_skip_probability: default_optional_skip_probability(),
        }
    }
}

impl GeneratorSettings {
    /// Lower bound share of the weapon price band for `budget`.
    pub fn min_share_for(&self, budget: u64) -> f64 {
        self.price_band_tiers
            .iter()
            .find(|tier| budget < tier.below)
            .map(|tier| tier.min_share)
            .unwrap_or(self.top_min_share)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Stats actively improved, in priority order.
    #[serde(default = "default_optimized_stats")]
    pub optimized_stats: Vec<QuestStat>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_compensation_limit")]
    pub compensation_limit: usize,

    #[serde(default = "default_magazine_capacity")]
    pub default_magazine_capacity: u32,

    #[serde(default = "default_magazine_base_score")]
    pub magazine_base_score: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            optimized_stats: default_optimized_stats(),
            max_attempts: default_max_attempts(),
            compensation_limit: default_compensation_limit(),
            default_magazine_capacity: default_magazine_capacity(),
            magazine_base_score: default_magazine_base_score(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Seconds a cached weapon stays valid. 0 disables expiry.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default = "default_log_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub console: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            prefix: default_log_prefix(),
            debug: false,
            console: false,
        }
    }
}

fn default_max_weapon_share() -> f64 {
    0.50
}

fn default_price_band_tiers() -> Vec<PriceBandTier> {
    vec![
        PriceBandTier {
            below: 200_000,
            min_share: 0.25,
        },
        PriceBandTier {
            below: 500_000,
            min_share: 0.28,
        },
        PriceBandTier {
            below: 1_000_000,
            min_share: 0.32,
        },
    ]
}

fn default_top_min_share() -> f64 {
    0.35
}

fn default_fallback_pool() -> usize {
    5
}

fn default_top_fraction() -> f64 {
    1.0 / 3.0
}

fn default_optional_skip_probability() -> f64 {
    0.30
}

fn default_optimized_stats() -> Vec<QuestStat> {
    vec![
        QuestStat::Ergonomics,
        QuestStat::Recoil,
        QuestStat::MagazineCapacity,
    ]
}

fn default_max_attempts() -> usize {
    5
}

fn default_compensation_limit() -> usize {
    3
}

fn default_magazine_capacity() -> u32 {
    30
}

fn default_magazine_base_score() -> f64 {
    50.0
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_prefix() -> String {
    "gunsmith".to_string()
}
