use super::cancel::Cancellation;
use super::compatibility::SlotCompatibilityResolver;
use super::error::BuildError;
use crate::metrics::EngineMetrics;
use crate::models::{
    Comparator, FLEA_MARKET, Module, ModuleId, OptimizerSettings, QuestBuildRequirements,
    QuestBuildResult, QuestModule, QuestRequirement, QuestStat, QuestStats, RequirementCheck,
    SlotId, WeaponDetails,
};
use indexmap::IndexMap;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// A module sitting in a slot of the workbench
#[derive(Debug, Clone, Copy)]
struct Placed<'a> {
    module: &'a Module,
    factory: bool,
}

/// Mutable build state the optimizer works on
struct Workbench<'a> {
    details: &'a WeaponDetails,
    installed: IndexMap<SlotId, Placed<'a>>,
    /// Preset items no slot accepts. They count towards stats but are never replaced.
    fixed: Vec<&'a Module>,
    default_capacity: u32,
}

impl<'a> Workbench<'a> {
    /// Factory configuration: each preset item goes into the first free slot accepting it
    fn factory(details: &'a WeaponDetails, default_capacity: u32) -> Self {
        let mut bench = Self {
            details,
            installed: IndexMap::new(),
            fixed: Vec::new(),
            default_capacity,
        };

        for item in &details.default_preset {
            if item.id.as_str() == details.weapon.id.as_str() {
                continue;
            }
            let free_slot = details
                .slots
                .iter()
                .find(|slot| !bench.installed.contains_key(&slot.id) && slot.accepts(&item.id));
            match free_slot {
                Some(slot) => {
                    bench.installed.insert(
                        slot.id.clone(),
                        Placed {
                            module: item,
                            factory: true,
                        },
                    );
                }
                None => bench.fixed.push(item),
            }
        }
        bench
    }

    /// Start from `assignment` instead of the factory slots, keeping the fixed parts
    fn from_assignment(
        details: &'a WeaponDetails,
        assignment: &IndexMap<SlotId, ModuleId>,
        default_capacity: u32,
    ) -> Self {
        let mut bench = Self::factory(details, default_capacity);
        let factory_slots = std::mem::take(&mut bench.installed);

        for (slot_id, module_id) in assignment {
            let module = details.slot(slot_id.as_str()).and_then(|slot| {
                slot.compatible_modules()
                    .find(|module| &module.id == module_id)
                    .map(|module| (slot, module))
            });
            let Some((slot, module)) = module else {
                tracing::warn!(
                    "Ignoring {} in slot {}: not compatible with {}",
                    module_id,
                    slot_id,
                    details.weapon.name
                );
                continue;
            };
            let factory = factory_slots
                .get(&slot.id)
                .is_some_and(|placed| placed.module.id == module.id);
            bench.installed.insert(slot.id.clone(), Placed { module, factory });
        }
        bench
    }

    fn modules(&self) -> impl Iterator<Item = &'a Module> + '_ {
        self.installed
            .values()
            .map(|placed| placed.module)
            .chain(self.fixed.iter().copied())
    }

    fn stats(&self) -> QuestStats {
        let weapon = &self.details.weapon.stats;
        let ergonomics: f64 = self.modules().map(|m| m.stats.ergonomics).sum();
        let recoil: f64 = self.modules().map(|m| m.stats.recoil_modifier).sum();
        let magazine_capacity = self
            .modules()
            .filter_map(|m| m.stats.capacity)
            .max()
            .unwrap_or(self.default_capacity);

        QuestStats {
            ergonomics: weapon.ergonomics + ergonomics,
            recoil: weapon.recoil_vertical + recoil,
            magazine_capacity: f64::from(magazine_capacity),
            durability: QuestStats::PLACEHOLDER_DURABILITY,
            weight: 0.0,
            accuracy: 0.0,
            effective_distance: 0.0,
        }
    }

    fn install(&mut self, slot: &SlotId, module: &'a Module) -> Option<Placed<'a>> {
        self.installed.insert(
            slot.clone(),
            Placed {
                module,
                factory: false,
            },
        )
    }

    /// Undo an [`install`](Self::install) given what it returned
    fn revert(&mut self, slot: &SlotId, previous: Option<Placed<'a>>) {
        match previous {
            Some(placed) => {
                self.installed.insert(slot.clone(), placed);
            }
            None => {
                self.installed.shift_remove(slot);
            }
        }
    }
}

/// Candidate module for one slot, ranked by score
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    slot: &'a SlotId,
    module: &'a Module,
    score: f64,
}

/// Greedily swaps and adds modules until quest stat requirements are met
pub struct QuestRequirementOptimizer {
    resolver: Arc<SlotCompatibilityResolver>,
    settings: OptimizerSettings,
    metrics: Arc<EngineMetrics>,
}

impl QuestRequirementOptimizer {
    pub fn new(
        resolver: Arc<SlotCompatibilityResolver>,
        settings: OptimizerSettings,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            resolver,
            settings,
            metrics,
        }
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    /// Build the requirement's weapon from its factory configuration
    ///
    /// Partial satisfaction is returned as `Ok` with `meets_requirements = false`.
    ///
    /// # Errors
    /// - `DataUnavailable` if the weapon cannot be fetched
    /// - `Cancelled` if `cancel` fires
    pub async fn generate_quest_build<R>(
        &self,
        requirements: &QuestBuildRequirements,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<QuestBuildResult, BuildError>
    where
        R: Rng + ?Sized,
    {
        let details = match self
            .resolver
            .fetch_details(&requirements.weapon_id, cancel)
            .await
        {
            Ok(details) => details,
            Err(e) => {
                self.metrics.record_build_failed();
                tracing::warn!(
                    "Quest build for {} aborted: {}",
                    requirements.weapon_id,
                    e
                );
                return Err(e);
            }
        };
        self.optimize(&details, requirements, rng, cancel)
    }

    /// Optimize starting from the factory configuration of `details`
    pub fn optimize<R>(
        &self,
        details: &WeaponDetails,
        requirements: &QuestBuildRequirements,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<QuestBuildResult, BuildError>
    where
        R: Rng + ?Sized,
    {
        let bench = Workbench::factory(details, self.settings.default_magazine_capacity);
        self.run(bench, requirements, rng, cancel)
    }

    /// Optimize starting from an existing slot assignment
    ///
    /// Assignments the weapon does not accept are dropped. Factory items no slot
    /// accepts stay installed.
    pub fn optimize_assignment<R>(
        &self,
        details: &WeaponDetails,
        assignment: &IndexMap<SlotId, ModuleId>,
        requirements: &QuestBuildRequirements,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<QuestBuildResult, BuildError>
    where
        R: Rng + ?Sized,
    {
        let bench = Workbench::from_assignment(
            details,
            assignment,
            self.settings.default_magazine_capacity,
        );
        self.run(bench, requirements, rng, cancel)
    }

    fn run<R>(
        &self,
        mut bench: Workbench<'_>,
        requirements: &QuestBuildRequirements,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<QuestBuildResult, BuildError>
    where
        R: Rng + ?Sized,
    {
        let start = Instant::now();
        let outcome = self.improve_all(&mut bench, requirements, rng, cancel);
        self.metrics.record_build_time(start.elapsed());
        if let Err(e) = outcome {
            self.metrics.record_build_failed();
            return Err(e);
        }

        let result = self.finish(&bench, requirements);
        self.metrics.record_quest_build(result.meets_requirements);
        if result.meets_requirements {
            tracing::info!(
                "Quest build for {} meets all {} requirements ({} modules, {})",
                result.weapon.name,
                result.checks.len(),
                result.modules.len(),
                result.total_cost
            );
        } else {
            let unmet: Vec<String> = result
                .unmet()
                .map(|check| format!("{} (actual {})", check.requirement, check.actual))
                .collect();
            tracing::info!(
                "Quest build for {} leaves requirements unmet: {}",
                result.weapon.name,
                unmet.join(", ")
            );
        }
        Ok(result)
    }

    fn improve_all<R>(
        &self,
        bench: &mut Workbench<'_>,
        requirements: &QuestBuildRequirements,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<(), BuildError>
    where
        R: Rng + ?Sized,
    {
        let baseline = bench.stats();
        if requirements.requirements.iter().all(|r| r.is_met(&baseline)) {
            tracing::debug!("Factory configuration already meets every requirement");
            return Ok(());
        }

        let mut used: HashSet<SlotId> = HashSet::new();
        let mut heavy_magazine = false;
        for stat in &self.settings.optimized_stats {
            cancel.check()?;
            for requirement in requirements.requirements.iter().filter(|r| r.stat == *stat) {
                if requirement.is_met(&bench.stats()) {
                    continue;
                }
                heavy_magazine |= self.improve(bench, requirement, &mut used, rng);
            }
        }

        cancel.check()?;
        if heavy_magazine {
            self.compensate(bench, requirements, &mut used, rng);
        }
        Ok(())
    }

    /// One greedy improvement pass for a single unmet requirement
    ///
    /// Returns true if the pass installed a magazine that lowered ergonomics.
    fn improve<'a, R>(
        &self,
        bench: &mut Workbench<'a>,
        requirement: &QuestRequirement,
        used: &mut HashSet<SlotId>,
        rng: &mut R,
    ) -> bool
    where
        R: Rng + ?Sized,
    {
        let current = bench.stats();
        let details = bench.details;
        let mut candidates: Vec<Candidate<'a>> = details
            .slots
            .iter()
            .filter(|slot| !used.contains(&slot.id))
            .flat_map(|slot| {
                let installed = bench.installed.get(&slot.id).map(|placed| &placed.module.id);
                slot.compatible_modules()
                    .filter(move |module| Some(&module.id) != installed)
                    .map(move |module| (&slot.id, module))
            })
            .filter_map(|(slot, module)| {
                self.score(requirement, module, &current)
                    .map(|score| Candidate { slot, module, score })
            })
            .collect();

        if candidates.is_empty() {
            tracing::debug!("No candidates improve {}", requirement);
            return false;
        }
        rank(&mut candidates, rng);

        let mut heavy_magazine = false;
        let mut attempts = 0;
        for candidate in candidates {
            if attempts >= self.settings.max_attempts {
                break;
            }
            if used.contains(candidate.slot) {
                continue;
            }
            attempts += 1;

            let stats_before = bench.stats();
            let previous = bench.install(candidate.slot, candidate.module);
            let stats_after = bench.stats();
            let before = stats_before.get(requirement.stat);
            let after = stats_after.get(requirement.stat);
            if !moves_toward(requirement, before, after) {
                bench.revert(candidate.slot, previous);
                continue;
            }

            used.insert(candidate.slot.clone());
            if requirement.stat == QuestStat::MagazineCapacity
                && candidate.module.is_magazine()
                && candidate.module.stats.ergonomics < 0.0
                && stats_after.ergonomics < stats_before.ergonomics
            {
                heavy_magazine = true;
            }
            tracing::debug!(
                "Installed {} in {} for {}: {} -> {}",
                candidate.module.name,
                candidate.slot,
                requirement.stat,
                before,
                after
            );
            if requirement.is_met(&stats_after) {
                break;
            }
        }
        heavy_magazine
    }

    /// Recover ergonomics lost to a heavy magazine from still unused slots
    ///
    /// Only runs while every unmet ergonomics requirement wants more ergonomics, and
    /// keeps an install only if it moves all of them toward their thresholds.
    fn compensate<'a, R>(
        &self,
        bench: &mut Workbench<'a>,
        requirements: &QuestBuildRequirements,
        used: &mut HashSet<SlotId>,
        rng: &mut R,
    ) where
        R: Rng + ?Sized,
    {
        let stats = bench.stats();
        let pending = unmet_ergonomics(requirements, &stats);
        if pending.is_empty() || !pending.iter().all(|r| needs_more(r, stats.ergonomics)) {
            tracing::debug!("Heavy magazine installed, no ergonomics shortfall to compensate");
            return;
        }

        let details = bench.details;
        let mut candidates: Vec<Candidate<'a>> = details
            .slots
            .iter()
            .filter(|slot| !used.contains(&slot.id))
            .flat_map(|slot| slot.compatible_modules().map(move |module| (&slot.id, module)))
            .filter(|(_, module)| module.stats.ergonomics > 0.0)
            .map(|(slot, module)| Candidate {
                slot,
                module,
                score: module.stats.ergonomics,
            })
            .collect();
        rank(&mut candidates, rng);

        let mut installed = 0;
        for candidate in candidates {
            let pending = unmet_ergonomics(requirements, &bench.stats());
            if installed >= self.settings.compensation_limit || pending.is_empty() {
                break;
            }
            if used.contains(candidate.slot) {
                continue;
            }

            let before = bench.stats().ergonomics;
            let previous = bench.install(candidate.slot, candidate.module);
            let after = bench.stats().ergonomics;
            if !pending.iter().all(|r| moves_toward(r, before, after)) {
                bench.revert(candidate.slot, previous);
                continue;
            }
            used.insert(candidate.slot.clone());
            installed += 1;
            tracing::debug!(
                "Compensating with {} in {} (+{} ergonomics)",
                candidate.module.name,
                candidate.slot,
                candidate.module.stats.ergonomics
            );
        }

        if !unmet_ergonomics(requirements, &bench.stats()).is_empty() {
            tracing::warn!(
                "Ergonomics still below requirement after {} compensating modules",
                installed
            );
        }
    }

    /// Improvement score of `module` for `requirement`, `None` if it cannot help
    fn score(
        &self,
        requirement: &QuestRequirement,
        module: &Module,
        current: &QuestStats,
    ) -> Option<f64> {
        match requirement.stat {
            QuestStat::Ergonomics => {
                (module.stats.ergonomics > 0.0).then_some(module.stats.ergonomics)
            }
            QuestStat::Recoil => {
                (module.stats.recoil_modifier < 0.0).then_some(module.stats.recoil_modifier.abs())
            }
            QuestStat::MagazineCapacity => {
                let capacity = f64::from(module.stats.capacity?);
                (capacity >= requirement.threshold && capacity > current.magazine_capacity).then(
                    || {
                        self.settings.magazine_base_score
                            + module.stats.ergonomics
                            + 0.001 * (capacity - requirement.threshold)
                    },
                )
            }
            QuestStat::Durability
            | QuestStat::Weight
            | QuestStat::Accuracy
            | QuestStat::EffectiveDistance => None,
        }
    }

    fn finish(
        &self,
        bench: &Workbench<'_>,
        requirements: &QuestBuildRequirements,
    ) -> QuestBuildResult {
        let details = bench.details;
        let stats = bench.stats();

        let mut modules = IndexMap::new();
        for slot in &details.slots {
            if let Some(placed) = bench.installed.get(&slot.id) {
                modules.insert(slot.id.clone(), quest_module(placed));
            }
        }

        let weapon_price = details.weapon.price.unwrap_or_else(|| {
            tracing::warn!("Weapon {} has no price, counting it as 0", details.weapon.name);
            0
        });
        let total_cost = weapon_price + modules.values().map(|m: &QuestModule| m.price).sum::<u64>();

        let checks: Vec<RequirementCheck> = requirements
            .requirements
            .iter()
            .map(|requirement| RequirementCheck {
                requirement: requirement.clone(),
                actual: stats.get(requirement.stat),
                met: requirement.is_met(&stats),
            })
            .collect();

        QuestBuildResult {
            weapon: details.weapon.clone(),
            modules,
            stats,
            total_cost,
            meets_requirements: checks.iter().all(|check| check.met),
            checks,
        }
    }
}

fn quest_module(placed: &Placed<'_>) -> QuestModule {
    let module = placed.module;
    let (vendor, price) = match module.cheapest_trader_offer() {
        Some(offer) => (offer.trader.clone(), offer.price),
        None => (FLEA_MARKET.to_string(), module.flea_price.unwrap_or(0)),
    };
    QuestModule {
        module_id: module.id.clone(),
        name: module.name.clone(),
        vendor,
        price,
        factory: placed.factory,
    }
}

/// Order by score descending with equal scores in random order
fn rank<R>(candidates: &mut [Candidate<'_>], rng: &mut R)
where
    R: Rng + ?Sized,
{
    candidates.shuffle(rng);
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

fn unmet_ergonomics<'r>(
    requirements: &'r QuestBuildRequirements,
    stats: &QuestStats,
) -> Vec<&'r QuestRequirement> {
    requirements
        .requirements
        .iter()
        .filter(|r| r.stat == QuestStat::Ergonomics && !r.is_met(stats))
        .collect()
}

/// True if `requirement` can only be met by raising the stat from `actual`
fn needs_more(requirement: &QuestRequirement, actual: f64) -> bool {
    match requirement.comparator {
        Comparator::GreaterOrEqual | Comparator::Greater => true,
        Comparator::Equal => actual < requirement.threshold,
        Comparator::LessOrEqual | Comparator::Less => false,
    }
}

/// True if moving the stat from `before` to `after` gets closer to satisfying `requirement`
fn moves_toward(requirement: &QuestRequirement, before: f64, after: f64) -> bool {
    match requirement.comparator {
        Comparator::GreaterOrEqual | Comparator::Greater => after > before,
        Comparator::LessOrEqual | Comparator::Less => after < before,
        Comparator::Equal => {
            (after - requirement.threshold).abs() < (before - requirement.threshold).abs()
        }
    }
}
