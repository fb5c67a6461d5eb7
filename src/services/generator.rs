use super::cancel::Cancellation;
use super::catalog::CatalogProvider;
use super::compatibility::SlotCompatibilityResolver;
use super::error::{BuildError, CatalogError};
use super::tier::{BaseStats, TierEvaluator, TierInputs};
use crate::metrics::EngineMetrics;
use crate::models::{
    BuildConfig, BuildPriority, BuildStats, Completeness, GeneratedBuild, GeneratorSettings,
    InstalledModule, Module, PurchaseSource, Slot, SlotId, Weapon, WeaponDetails, WeaponId,
    cheapest_offer,
};
use indexmap::IndexMap;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// Classifies filled slots into the key module groups scored by the tier evaluator
#[derive(Debug, Clone)]
pub struct SlotClassifier {
    sight_pattern: Regex,
    stock_pattern: Regex,
    grip_pattern: Regex,
}

impl SlotClassifier {
    pub fn new() -> Self {
        Self {
            sight_pattern: Regex::new(r"(?i)sight|scope").expect("Invalid sight regex"),
            stock_pattern: Regex::new(r"(?i)stock").expect("Invalid stock regex"),
            grip_pattern: Regex::new(r"(?i)grip|pistol").expect("Invalid grip regex"),
        }
    }

    /// Completeness of `modules` installed on `details`
    pub fn completeness<V>(
        &self,
        details: &WeaponDetails,
        modules: &IndexMap<SlotId, V>,
    ) -> Completeness {
        let filled: Vec<&Slot> = details
            .slots
            .iter()
            .filter(|slot| modules.contains_key(&slot.id))
            .collect();
        let any_match = |pattern: &Regex| {
            filled
                .iter()
                .any(|slot| pattern.is_match(&slot.name) || pattern.is_match(slot.id.as_str()))
        };

        Completeness {
            has_all_required_slots: details
                .required_slots()
                .all(|slot| modules.contains_key(&slot.id)),
            has_sight: any_match(&self.sight_pattern),
            has_stock: any_match(&self.stock_pattern),
            has_grip: any_match(&self.grip_pattern),
        }
    }
}

impl Default for SlotClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates random builds that respect a budget and trader loyalty levels
pub struct BudgetBuildGenerator {
    catalog: Arc<dyn CatalogProvider>,
    resolver: Arc<SlotCompatibilityResolver>,
    settings: GeneratorSettings,
    classifier: SlotClassifier,
    metrics: Arc<EngineMetrics>,
}

impl BudgetBuildGenerator {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        resolver: Arc<SlotCompatibilityResolver>,
        settings: GeneratorSettings,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            settings,
            classifier: SlotClassifier::new(),
            metrics,
        }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Pick a weapon for the budget and fill its slots
    ///
    /// # Errors
    /// - `BudgetInfeasible` if no weapon fits the budget
    /// - `DataUnavailable` if the catalog cannot be read
    /// - `Cancelled` if `cancel` fires during a catalog fetch
    pub async fn generate_random_build<R>(
        &self,
        config: &BuildConfig,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<GeneratedBuild, BuildError>
    where
        R: Rng + ?Sized,
    {
        let start = Instant::now();
        let result = self.random_build(config, rng, cancel).await;
        self.finish(result, start)
    }

    /// Fill the slots of a fixed weapon
    ///
    /// # Errors
    /// - `WeaponOverBudget` if the weapon alone exceeds the budget
    /// - `Unpriced` if the weapon has no price
    /// - `DataUnavailable` if the weapon is unknown
    pub async fn generate_build_for_weapon<R>(
        &self,
        weapon_id: &WeaponId,
        config: &BuildConfig,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<GeneratedBuild, BuildError>
    where
        R: Rng + ?Sized,
    {
        let start = Instant::now();
        let result = match self.resolver.fetch_details(weapon_id, cancel).await {
            Ok(details) => self.assemble(&details, config, rng),
            Err(e) => Err(e),
        };
        self.finish(result, start)
    }

    async fn random_build<R>(
        &self,
        config: &BuildConfig,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<GeneratedBuild, BuildError>
    where
        R: Rng + ?Sized,
    {
        let weapons = cancel.run(self.catalog.all_weapons()).await??;
        let candidates: Vec<Weapon> = weapons
            .into_iter()
            .filter(|weapon| weapon.matches_category(config.weapon_type.as_deref()))
            .collect();
        tracing::debug!(
            "{} weapons match category {:?}",
            candidates.len(),
            config.weapon_type
        );

        let weapon_id = self.select_weapon(&candidates, config.budget, rng)?.id.clone();
        let details = self.resolver.fetch_details(&weapon_id, cancel).await?;
        self.assemble(&details, config, rng)
    }

    fn finish(
        &self,
        result: Result<GeneratedBuild, BuildError>,
        start: Instant,
    ) -> Result<GeneratedBuild, BuildError> {
        self.metrics.record_build_time(start.elapsed());
        match &result {
            Ok(build) => {
                self.metrics.record_build_generated();
                tracing::info!(
                    "Generated {} build on {} with {} modules for {} (tier {})",
                    build.weapon.name,
                    build.weapon_source,
                    build.modules.len(),
                    build.total_cost,
                    build.tier
                );
            }
            Err(e) => {
                self.metrics.record_build_failed();
                tracing::info!("Build generation failed: {}", e);
            }
        }
        result
    }

    /// Choose a weapon from `weapons` for `budget`
    ///
    /// In-band weapons are priced within `[min_share * budget, max_share * budget]`; the
    /// pick is uniform over the most expensive fraction of them. Without in-band
    /// weapons the pick is uniform over the few most expensive weapons under the cap.
    pub fn select_weapon<'a, R>(
        &self,
        weapons: &'a [Weapon],
        budget: Option<u64>,
        rng: &mut R,
    ) -> Result<&'a Weapon, BuildError>
    where
        R: Rng + ?Sized,
    {
        let mut priced: Vec<(&Weapon, u64)> = weapons
            .iter()
            .filter_map(|weapon| weapon.price.map(|price| (weapon, price)))
            .collect();
        priced.sort_by(|a, b| b.1.cmp(&a.1));

        let Some(budget) = budget else {
            let pool = top_fraction(&priced, self.settings.top_fraction);
            return pool
                .choose(rng)
                .map(|(weapon, _)| *weapon)
                .ok_or_else(|| CatalogError::NotFound("Priced weapon".to_string()).into());
        };

        let max_price = budget as f64 * self.settings.max_weapon_share;
        let min_price = budget as f64 * self.settings.min_share_for(budget);
        let in_band: Vec<(&Weapon, u64)> = priced
            .iter()
            .copied()
            .filter(|(_, price)| (*price as f64) >= min_price && (*price as f64) <= max_price)
            .collect();

        let picked = if in_band.is_empty() {
            let fallback: Vec<(&Weapon, u64)> = priced
                .iter()
                .copied()
                .filter(|(_, price)| (*price as f64) <= max_price)
                .take(self.settings.fallback_pool)
                .collect();
            tracing::debug!(
                "No weapon in band {:.0}-{:.0}, falling back to {} cheaper weapons",
                min_price,
                max_price,
                fallback.len()
            );
            fallback.choose(rng).copied()
        } else {
            top_fraction(&in_band, self.settings.top_fraction)
                .choose(rng)
                .copied()
        };

        match picked {
            Some((weapon, price)) => {
                tracing::debug!("Selected weapon {} at {}", weapon.name, price);
                Ok(weapon)
            }
            None => Err(BuildError::BudgetInfeasible { budget }),
        }
    }

    /// Fill the slots of `details` within `config`
    pub fn assemble<R>(
        &self,
        details: &WeaponDetails,
        config: &BuildConfig,
        rng: &mut R,
    ) -> Result<GeneratedBuild, BuildError>
    where
        R: Rng + ?Sized,
    {
        let weapon = &details.weapon;
        let (weapon_source, weapon_price) = weapon_purchase(weapon, config)?;
        let remaining = match config.budget {
            Some(budget) if weapon_price > budget => {
                return Err(BuildError::WeaponOverBudget {
                    weapon: weapon.id.clone(),
                    price: weapon_price,
                    budget,
                });
            }
            Some(budget) => Some(budget - weapon_price),
            None => None,
        };

        let mut modules: IndexMap<SlotId, InstalledModule> = IndexMap::new();
        let mut spent: u64 = 0;

        for slot in details.required_slots() {
            let available = remaining.map(|r| r.saturating_sub(spent));
            match self.pick_module(slot, available, config, rng) {
                Some(installed) => {
                    spent += installed.price;
                    modules.insert(slot.id.clone(), installed);
                }
                None => {
                    self.metrics.record_slot_unfilled();
                    tracing::warn!(
                        "Required slot {} on {} left empty, nothing affordable",
                        slot.name,
                        weapon.name
                    );
                }
            }
        }

        let mut optional: Vec<&Slot> = details.optional_slots().collect();
        optional.shuffle(rng);
        let skip_probability = self.settings.optional_skip_probability.clamp(0.0, 1.0);

        for slot in optional {
            if remaining.is_some_and(|r| spent >= r) {
                tracing::debug!("Budget exhausted after {} modules", modules.len());
                break;
            }
            if rng.random_bool(skip_probability) {
                tracing::debug!("Skipping optional slot {}", slot.name);
                continue;
            }
            let available = remaining.map(|r| r.saturating_sub(spent));
            if let Some(installed) = self.pick_module(slot, available, config, rng) {
                spent += installed.price;
                modules.insert(slot.id.clone(), installed);
            }
        }

        let stats = build_stats(weapon, &modules);
        let completeness = self.classifier.completeness(details, &modules);
        let total_cost = weapon_price + spent;
        let tier = TierEvaluator::evaluate(&TierInputs::from_build(
            &stats,
            total_cost,
            completeness,
            Some(BaseStats::from(&weapon.stats)),
        ));

        let mut availability_sources = BTreeSet::new();
        availability_sources.insert(weapon_source.vendor_name().to_string());
        for installed in modules.values() {
            availability_sources.insert(installed.source.vendor_name().to_string());
        }

        Ok(GeneratedBuild {
            weapon: weapon.clone(),
            weapon_source,
            weapon_price,
            modules,
            total_cost,
            remaining_budget: config.budget.map(|budget| budget - total_cost),
            stats,
            completeness,
            tier,
            availability_sources,
        })
    }

    /// Pick a module for `slot` costing at most `available` (`None` = unlimited)
    ///
    /// Loyalty-legal trader offers win; the flea market is used only when no legal
    /// offer is affordable or the config asks for flea-only purchases.
    pub fn pick_module<R>(
        &self,
        slot: &Slot,
        available: Option<u64>,
        config: &BuildConfig,
        rng: &mut R,
    ) -> Option<InstalledModule>
    where
        R: Rng + ?Sized,
    {
        let affordable = |price: u64| available.is_none_or(|limit| price <= limit);

        let mut eligible: Vec<InstalledModule> = Vec::new();
        if !config.use_flea_only {
            eligible = slot
                .compatible_modules()
                .filter_map(|module| {
                    let offer = module.cheapest_unlocked_offer(&config.trader_levels)?;
                    affordable(offer.price).then(|| InstalledModule {
                        module: module.clone(),
                        source: PurchaseSource::Trader {
                            name: offer.trader.clone(),
                            loyalty_level: offer.min_loyalty_level,
                        },
                        price: offer.price,
                    })
                })
                .collect();
        }

        let from_flea = eligible.is_empty();
        if from_flea {
            eligible = slot
                .compatible_modules()
                .filter_map(|module| {
                    let price = module.flea_price?;
                    affordable(price).then(|| InstalledModule {
                        module: module.clone(),
                        source: PurchaseSource::FleaMarket,
                        price,
                    })
                })
                .collect();
        }

        let eligible = narrow_by_priority(eligible, config.priority);
        let picked = eligible.choose(rng).cloned()?;

        if from_flea && !config.use_flea_only {
            self.metrics.record_flea_fallback();
            tracing::warn!(
                "No unlocked trader offer for slot {}, buying {} on the flea market",
                slot.name,
                picked.module.name
            );
        } else {
            tracing::debug!(
                "Slot {}: {} from {} for {}",
                slot.name,
                picked.module.name,
                picked.source,
                picked.price
            );
        }
        Some(picked)
    }
}

/// Where the weapon is bought and what is paid for it
///
/// A loyalty-unlocked trader offer is used when it costs no more than the reference
/// price; otherwise the weapon comes from the flea market at the reference price.
fn weapon_purchase(
    weapon: &Weapon,
    config: &BuildConfig,
) -> Result<(PurchaseSource, u64), BuildError> {
    let reference = weapon
        .price
        .ok_or_else(|| BuildError::Unpriced(weapon.id.clone()))?;
    if config.use_flea_only {
        return Ok((PurchaseSource::FleaMarket, reference));
    }

    let offer = cheapest_offer(&weapon.offers, |offer| {
        offer.is_unlocked(&config.trader_levels)
    })
    .filter(|offer| offer.price <= reference);
    Ok(match offer {
        Some(offer) => (
            PurchaseSource::Trader {
                name: offer.trader.clone(),
                loyalty_level: offer.min_loyalty_level,
            },
            offer.price,
        ),
        None => (PurchaseSource::FleaMarket, reference),
    })
}

fn top_fraction<T>(sorted: &[T], fraction: f64) -> &[T] {
    if sorted.is_empty() {
        return sorted;
    }
    let count = ((sorted.len() as f64) * fraction).ceil() as usize;
    &sorted[..count.clamp(1, sorted.len())]
}

/// Keep candidates whose priority stat is at least as good as the median
fn narrow_by_priority(
    candidates: Vec<InstalledModule>,
    priority: BuildPriority,
) -> Vec<InstalledModule> {
    // Higher key is better
    let key: fn(&Module) -> f64 = match priority {
        BuildPriority::Balanced => return candidates,
        BuildPriority::Ergonomics => |module| module.stats.ergonomics,
        BuildPriority::LowRecoil => |module| -module.stats.recoil_modifier,
    };
    if candidates.len() < 2 {
        return candidates;
    }

    let mut values: Vec<f64> = candidates.iter().map(|c| key(&c.module)).collect();
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };

    candidates
        .into_iter()
        .filter(|c| key(&c.module) >= median)
        .collect()
}

fn build_stats(weapon: &Weapon, modules: &IndexMap<SlotId, InstalledModule>) -> BuildStats {
    let ergonomics_delta: f64 = modules.values().map(|m| m.module.stats.ergonomics).sum();
    let recoil_delta: f64 = modules
        .values()
        .map(|m| m.module.stats.recoil_modifier)
        .sum();

    BuildStats {
        ergonomics: weapon.stats.ergonomics + ergonomics_delta,
        recoil_vertical: weapon.stats.recoil_vertical + recoil_delta,
        recoil_horizontal: weapon.stats.recoil_horizontal + recoil_delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SlotCache;
    use crate::models::{ModuleId, ModuleStats, VendorOffer, WeaponStats};
    use crate::services::catalog::StaticCatalog;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn weapon(id: &str, price: u64) -> Weapon {
        Weapon {
            id: WeaponId::new(id),
            name: id.to_uppercase(),
            category: Some("Assault rifle".to_string()),
            stats: WeaponStats {
                ergonomics: 40.0,
                recoil_vertical: 100.0,
                recoil_horizontal: 250.0,
                ..Default::default()
            },
            price: Some(price),
            offers: Vec::new(),
        }
    }

    fn module(id: &str, ergonomics: f64, flea: Option<u64>, offers: Vec<VendorOffer>) -> Module {
        Module {
            id: ModuleId::new(id),
            name: id.to_string(),
            flea_price: flea,
            stats: ModuleStats {
                ergonomics,
                recoil_modifier: -ergonomics / 2.0,
                capacity: None,
            },
            offers,
        }
    }

    fn offer(trader: &str, level: u8, price: u64) -> VendorOffer {
        VendorOffer {
            trader: trader.to_string(),
            min_loyalty_level: level,
            price,
        }
    }

    fn slot(id: &str, name: &str, required: bool, items: Vec<Module>) -> Slot {
        Slot {
            id: SlotId::new(id),
            name: name.to_string(),
            required,
            allowed_items: items,
            excluded_items: HashSet::new(),
        }
    }

    fn generator() -> BudgetBuildGenerator {
        let catalog: Arc<dyn CatalogProvider> = Arc::new(StaticCatalog::new());
        let metrics = Arc::new(EngineMetrics::new());
        let resolver = Arc::new(SlotCompatibilityResolver::new(
            catalog.clone(),
            SlotCache::new(),
            metrics.clone(),
        ));
        BudgetBuildGenerator::new(catalog, resolver, GeneratorSettings::default(), metrics)
    }

    #[test]
    fn test_select_weapon_stays_in_band() {
        let generator = generator();
        let weapons = vec![
            weapon("cheap", 20_000),
            weapon("mid", 40_000),
            weapon("upper", 90_000),
            weapon("pricey", 150_000),
        ];
        let mut rng = StdRng::seed_from_u64(7);

        // budget 200k: band 56k..=100k
        for _ in 0..20 {
            let picked = generator.select_weapon(&weapons, Some(200_000), &mut rng).unwrap();
            assert_eq!(picked.id, WeaponId::new("upper"));
        }
    }

    #[test]
    fn test_select_weapon_falls_back_below_band() {
        let generator = generator();
        let weapons = vec![weapon("cheap", 20_000), weapon("pricey", 150_000)];
        let mut rng = StdRng::seed_from_u64(1);

        let picked = generator.select_weapon(&weapons, Some(200_000), &mut rng).unwrap();
        assert_eq!(picked.id, WeaponId::new("cheap"));
    }

    #[test]
    fn test_select_weapon_infeasible() {
        let generator = generator();
        let weapons = vec![weapon("pricey", 150_000)];
        let mut rng = StdRng::seed_from_u64(1);

        let result = generator.select_weapon(&weapons, Some(100_000), &mut rng);
        assert!(matches!(
            result,
            Err(BuildError::BudgetInfeasible { budget: 100_000 })
        ));
    }

    #[test]
    fn test_select_weapon_unlimited_prefers_expensive() {
        let generator = generator();
        let weapons = vec![
            weapon("a", 10_000),
            weapon("b", 20_000),
            weapon("c", 30_000),
        ];
        let mut rng = StdRng::seed_from_u64(3);

        let picked = generator.select_weapon(&weapons, None, &mut rng).unwrap();
        assert_eq!(picked.id, WeaponId::new("c"));
    }

    #[test]
    fn test_pick_module_prefers_unlocked_offers() {
        let generator = generator();
        let config = BuildConfig::with_budget(1_000_000).trader_level("Prapor", 1);
        let slot = slot(
            "mod_grip",
            "Pistol Grip",
            false,
            vec![
                module("locked", 10.0, Some(5_000), vec![offer("Prapor", 3, 2_000)]),
                module("legal", 5.0, Some(9_000), vec![offer("Prapor", 1, 4_000)]),
            ],
        );
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..10 {
            let picked = generator
                .pick_module(&slot, Some(10_000), &config, &mut rng)
                .unwrap();
            assert_eq!(picked.module.id, ModuleId::new("legal"));
            assert_eq!(picked.price, 4_000);
            assert!(!picked.source.is_flea());
        }
    }

    #[test]
    fn test_pick_module_flea_fallback() {
        let generator = generator();
        let config = BuildConfig::with_budget(1_000_000);
        let slot = slot(
            "mod_grip",
            "Pistol Grip",
            false,
            vec![module("locked", 10.0, Some(5_000), vec![offer("Prapor", 3, 2_000)])],
        );
        let mut rng = StdRng::seed_from_u64(11);

        let picked = generator
            .pick_module(&slot, Some(10_000), &config, &mut rng)
            .unwrap();
        assert_eq!(picked.source, PurchaseSource::FleaMarket);
        assert_eq!(picked.price, 5_000);

        assert!(
            generator
                .pick_module(&slot, Some(4_000), &config, &mut rng)
                .is_none()
        );
    }

    #[test]
    fn test_narrow_by_priority() {
        let candidates: Vec<InstalledModule> = [1.0, 2.0, 8.0, 9.0]
            .into_iter()
            .enumerate()
            .map(|(i, ergo)| InstalledModule {
                module: module(&format!("m{}", i), ergo, Some(100), Vec::new()),
                source: PurchaseSource::FleaMarket,
                price: 100,
            })
            .collect();

        let balanced = narrow_by_priority(candidates.clone(), BuildPriority::Balanced);
        assert_eq!(balanced.len(), 4);

        let ergo = narrow_by_priority(candidates.clone(), BuildPriority::Ergonomics);
        let ids: Vec<&str> = ergo.iter().map(|c| c.module.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);

        // recoil modifier is -ergo/2, so low recoil favours the same modules
        let recoil = narrow_by_priority(candidates, BuildPriority::LowRecoil);
        assert_eq!(recoil.len(), 2);
    }

    #[test]
    fn test_weapon_purchase_pays_the_named_source() {
        let mut rifle = weapon("rifle", 40_000);
        rifle.offers = vec![offer("Prapor", 1, 38_000), offer("Skier", 1, 45_000)];

        let config = BuildConfig::default().trader_level("Prapor", 1);
        let (source, price) = weapon_purchase(&rifle, &config).unwrap();
        assert_eq!(
            source,
            PurchaseSource::Trader {
                name: "Prapor".to_string(),
                loyalty_level: 1,
            }
        );
        assert_eq!(price, 38_000);

        // Only the offer above the reference price is unlocked
        let config = BuildConfig::default().trader_level("Skier", 1);
        let (source, price) = weapon_purchase(&rifle, &config).unwrap();
        assert_eq!(source, PurchaseSource::FleaMarket);
        assert_eq!(price, 40_000);

        let flea_only = BuildConfig {
            use_flea_only: true,
            ..BuildConfig::default().trader_level("Prapor", 1)
        };
        assert_eq!(
            weapon_purchase(&rifle, &flea_only).unwrap(),
            (PurchaseSource::FleaMarket, 40_000)
        );

        rifle.price = None;
        assert!(matches!(
            weapon_purchase(&rifle, &config),
            Err(BuildError::Unpriced(_))
        ));
    }

    #[test]
    fn test_completeness_matches_slot_names() {
        let classifier = SlotClassifier::new();
        let details = WeaponDetails {
            weapon: weapon("m4", 50_000),
            slots: vec![
                slot("mod_pistol_grip", "Pistol Grip", true, Vec::new()),
                slot("mod_stock", "Stock", false, Vec::new()),
                slot("mod_scope", "Scope", false, Vec::new()),
            ],
            default_preset: Vec::new(),
        };

        let mut modules: IndexMap<SlotId, ()> = IndexMap::new();
        modules.insert(SlotId::new("mod_stock"), ());
        let completeness = classifier.completeness(&details, &modules);
        assert!(!completeness.has_all_required_slots);
        assert!(completeness.has_stock);
        assert!(!completeness.has_grip);
        assert!(!completeness.has_sight);

        modules.insert(SlotId::new("mod_pistol_grip"), ());
        modules.insert(SlotId::new("mod_scope"), ());
        let completeness = classifier.completeness(&details, &modules);
        assert!(completeness.has_all_required_slots);
        assert!(completeness.has_grip);
        assert!(completeness.has_sight);
    }
}
