use super::cancel::Cancellation;
use super::catalog::{CatalogProvider, QuestDataProvider};
use super::compatibility::{BuildValidation, SlotCompatibilityResolver};
use super::error::BuildError;
use super::generator::BudgetBuildGenerator;
use super::optimizer::QuestRequirementOptimizer;
use crate::cache::SlotCache;
use crate::metrics::EngineMetrics;
use crate::models::{
    BUILD_WEAPON_OBJECTIVE, BuildConfig, EngineConfig, GeneratedBuild, ModuleId,
    QuestBuildRequirements, QuestBuildResult, SlotId, WeaponId,
};
use indexmap::IndexMap;
use rand::Rng;
use std::sync::Arc;

/// Entry point wiring the resolver, generator and optimizer to one catalog
///
/// All three share a single slot cache and one [`EngineMetrics`] instance.
pub struct BuildEngine {
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
    resolver: Arc<SlotCompatibilityResolver>,
    generator: BudgetBuildGenerator,
    optimizer: QuestRequirementOptimizer,
}

impl BuildEngine {
    pub fn new(catalog: Arc<dyn CatalogProvider>, config: &EngineConfig) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let cache = SlotCache::from_ttl_secs(config.cache.ttl_secs);
        let resolver = Arc::new(SlotCompatibilityResolver::new(
            catalog.clone(),
            cache,
            metrics.clone(),
        ));
        let generator = BudgetBuildGenerator::new(
            catalog,
            resolver.clone(),
            config.generator.clone(),
            metrics.clone(),
        );
        let optimizer = QuestRequirementOptimizer::new(
            resolver.clone(),
            config.optimizer.clone(),
            metrics.clone(),
        );

        tracing::debug!(
            "Build engine ready (cache ttl {:?})",
            resolver.cache().ttl()
        );

        Self {
            config: config.clone(),
            metrics,
            resolver,
            generator,
            optimizer,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn resolver(&self) -> &SlotCompatibilityResolver {
        &self.resolver
    }

    pub fn generator(&self) -> &BudgetBuildGenerator {
        &self.generator
    }

    pub fn optimizer(&self) -> &QuestRequirementOptimizer {
        &self.optimizer
    }

    pub async fn random_build<R>(
        &self,
        config: &BuildConfig,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<GeneratedBuild, BuildError>
    where
        R: Rng + ?Sized,
    {
        self.generator
            .generate_random_build(config, rng, cancel)
            .await
    }

    pub async fn build_for_weapon<R>(
        &self,
        weapon_id: &WeaponId,
        config: &BuildConfig,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<GeneratedBuild, BuildError>
    where
        R: Rng + ?Sized,
    {
        self.generator
            .generate_build_for_weapon(weapon_id, config, rng, cancel)
            .await
    }

    pub async fn quest_build<R>(
        &self,
        requirements: &QuestBuildRequirements,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<QuestBuildResult, BuildError>
    where
        R: Rng + ?Sized,
    {
        self.optimizer
            .generate_quest_build(requirements, rng, cancel)
            .await
    }

    /// Run the optimizer for every `buildWeapon` objective of a quest
    ///
    /// Objectives of any other type are skipped.
    pub async fn quest_builds<Q, R>(
        &self,
        provider: &Q,
        quest_id: &str,
        rng: &mut R,
        cancel: &Cancellation,
    ) -> Result<Vec<QuestBuildResult>, BuildError>
    where
        Q: QuestDataProvider + ?Sized,
        R: Rng + ?Sized,
    {
        let objectives = cancel.run(provider.build_objectives(quest_id)).await??;

        let mut results = Vec::with_capacity(objectives.len());
        for objective in &objectives {
            if objective.objective_type != BUILD_WEAPON_OBJECTIVE {
                tracing::debug!(
                    "Skipping {} objective of quest {}",
                    objective.objective_type,
                    quest_id
                );
                continue;
            }
            let requirements = QuestBuildRequirements::from_objective(objective)?;
            results.push(self.quest_build(&requirements, rng, cancel).await?);
        }

        tracing::info!(
            "Quest {} produced {} build(s)",
            quest_id,
            results.len()
        );
        Ok(results)
    }

    pub async fn validate_build(
        &self,
        weapon_id: &WeaponId,
        assignment: &IndexMap<SlotId, ModuleId>,
    ) -> Result<BuildValidation, BuildError> {
        self.resolver.validate_build(weapon_id, assignment).await
    }
}
