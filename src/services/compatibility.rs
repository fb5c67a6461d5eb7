use super::cancel::Cancellation;
use super::catalog::CatalogProvider;
use super::error::{BuildError, CatalogError};
use crate::cache::SlotCache;
use crate::metrics::EngineMetrics;
use crate::models::{Module, ModuleId, Slot, SlotId, WeaponDetails, WeaponId};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// A single problem found by [`SlotCompatibilityResolver::validate_build`]
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationIssue {
    #[error("Required slot {name} ({slot}) is empty")]
    MissingRequiredSlot { slot: SlotId, name: String },

    #[error("Module {module} is not compatible with slot {slot}")]
    IncompatibleModule { slot: SlotId, module: ModuleId },

    #[error("Weapon has no slot {0}")]
    UnknownSlot(SlotId),
}

/// Result of validating a manual slot assignment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildValidation {
    pub issues: Vec<ValidationIssue>,
}

impl BuildValidation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// One message per issue
    pub fn errors(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

/// Check `assignment` against the slots of `details` without touching any state
///
/// Assignment keys match a slot id or display name, ignoring case. Reports one issue
/// per empty required slot and one per assignment that names an unknown slot or a
/// module outside the slot's allowed-minus-excluded set.
pub fn validate_assignment(
    details: &WeaponDetails,
    assignment: &IndexMap<SlotId, ModuleId>,
) -> BuildValidation {
    let mut filled: HashSet<&SlotId> = HashSet::new();
    let mut assignment_issues = Vec::new();

    for (key, module_id) in assignment {
        let Some(slot) = details.slot(key.as_str()) else {
            assignment_issues.push(ValidationIssue::UnknownSlot(key.clone()));
            continue;
        };
        filled.insert(&slot.id);
        if !slot.accepts(module_id) {
            assignment_issues.push(ValidationIssue::IncompatibleModule {
                slot: slot.id.clone(),
                module: module_id.clone(),
            });
        }
    }

    let mut issues: Vec<ValidationIssue> = details
        .required_slots()
        .filter(|slot| !filled.contains(&slot.id))
        .map(|slot| ValidationIssue::MissingRequiredSlot {
            slot: slot.id.clone(),
            name: slot.name.clone(),
        })
        .collect();
    issues.extend(assignment_issues);

    BuildValidation { issues }
}

/// Resolves weapon slots and module compatibility on top of a [`CatalogProvider`]
///
/// Weapon details are fetched once per weapon id and kept in a shared
/// [`SlotCache`]; every query below is answered from the cached details.
pub struct SlotCompatibilityResolver {
    catalog: Arc<dyn CatalogProvider>,
    cache: SlotCache,
    metrics: Arc<EngineMetrics>,
}

impl SlotCompatibilityResolver {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        cache: SlotCache,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            catalog,
            cache,
            metrics,
        }
    }

    /// Fetch weapon details, serving from the cache when possible
    ///
    /// # Errors
    /// - `DataUnavailable` if the provider fails or does not know the weapon
    /// - `Cancelled` if `cancel` fires while the provider is pending
    pub async fn fetch_details(
        &self,
        weapon_id: &WeaponId,
        cancel: &Cancellation,
    ) -> Result<Arc<WeaponDetails>, BuildError> {
        if let Some(details) = self.cache.get(weapon_id) {
            self.metrics.record_cache_hit();
            return Ok(details);
        }
        self.metrics.record_cache_miss();

        let details = cancel
            .run(self.catalog.weapon_details(weapon_id))
            .await?
            .map_err(|e| {
                tracing::warn!("Catalog lookup for weapon {} failed: {}", weapon_id, e);
                e
            })?
            .ok_or_else(|| CatalogError::NotFound(format!("Weapon {}", weapon_id)))?;

        tracing::debug!(
            "Cached weapon {} with {} slots",
            weapon_id,
            details.slots.len()
        );
        Ok(self.cache.insert(details))
    }

    /// Fetch weapon details without a cancellation signal
    pub async fn weapon_details(
        &self,
        weapon_id: &WeaponId,
    ) -> Result<Arc<WeaponDetails>, BuildError> {
        self.fetch_details(weapon_id, &Cancellation::none()).await
    }

    /// Modification slots of a weapon; empty if it has none
    pub async fn weapon_slots(&self, weapon_id: &WeaponId) -> Result<Vec<Slot>, BuildError> {
        Ok(self.weapon_details(weapon_id).await?.slots.clone())
    }

    /// True iff the module is allowed and not excluded in the slot
    ///
    /// `slot` matches a slot id or display name; unknown slots accept nothing.
    pub async fn is_module_compatible(
        &self,
        weapon_id: &WeaponId,
        slot: &str,
        module_id: &ModuleId,
    ) -> Result<bool, BuildError> {
        let details = self.weapon_details(weapon_id).await?;
        Ok(details
            .slot(slot)
            .is_some_and(|slot| slot.accepts(module_id)))
    }

    /// Allowed minus excluded modules of a slot; empty for unknown slots
    pub async fn compatible_modules(
        &self,
        weapon_id: &WeaponId,
        slot: &str,
    ) -> Result<Vec<Module>, BuildError> {
        let details = self.weapon_details(weapon_id).await?;
        Ok(details
            .slot(slot)
            .map(|slot| slot.compatible_modules().cloned().collect())
            .unwrap_or_default())
    }

    pub async fn required_slots(&self, weapon_id: &WeaponId) -> Result<Vec<SlotId>, BuildError> {
        let details = self.weapon_details(weapon_id).await?;
        Ok(details.required_slots().map(|slot| slot.id.clone()).collect())
    }

    /// Validate a manual slot assignment. See [`validate_assignment`].
    pub async fn validate_build(
        &self,
        weapon_id: &WeaponId,
        assignment: &IndexMap<SlotId, ModuleId>,
    ) -> Result<BuildValidation, BuildError> {
        let details = self.weapon_details(weapon_id).await?;
        let validation = validate_assignment(&details, assignment);
        if !validation.is_valid() {
            tracing::debug!(
                "Assignment for {} has {} issues",
                weapon_id,
                validation.issues.len()
            );
        }
        Ok(validation)
    }

    /// Drop one weapon from the cache so the next query refetches it
    pub fn invalidate(&self, weapon_id: &WeaponId) -> bool {
        self.cache.invalidate(weapon_id)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &SlotCache {
        &self.cache
    }
}
