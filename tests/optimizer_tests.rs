//! Integration tests for QuestRequirementOptimizer and quest objective handling
//!
//! These tests verify that the optimizer:
//! - Starts from the factory configuration
//! - Picks the module that best serves each unmet requirement
//! - Compensates ergonomics lost to a heavy magazine
//! - Stops after the configured number of attempts and compensating modules
//! - Reports partial satisfaction instead of failing

mod common;

use common::{engine, fixture_path, rng};
use gunsmith::models::{
    AttributeRequirement, BUILD_WEAPON_OBJECTIVE, EngineConfig, FLEA_MARKET, ModuleId,
    ObjectiveAttribute, ObjectiveItem, QuestBuildRequirements, QuestBuildResult, QuestObjective,
    SlotId, WeaponId,
};
use gunsmith::services::{BuildEngine, BuildError, Cancellation, CatalogError, StaticCatalog};
use indexmap::IndexMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn requirements(weapon: &str, reqs: &[&str]) -> QuestBuildRequirements {
    QuestBuildRequirements::new(weapon, reqs.iter().map(|r| r.parse().unwrap()).collect())
}

fn module_in(result: &QuestBuildResult, slot: &str) -> Option<ModuleId> {
    result
        .modules
        .get(&SlotId::new(slot))
        .map(|m| m.module_id.clone())
}

#[tokio::test]
async fn test_factory_configuration_is_baseline() {
    let (engine, _catalog) = engine();
    let reqs = requirements("ak74", &["ergonomics>=10"]);

    let result = engine
        .quest_build(&reqs, &mut rng(1), &Cancellation::none())
        .await
        .unwrap();

    assert!(result.meets_requirements);
    assert_eq!(result.stats.ergonomics, 42.0);
    assert_eq!(result.stats.magazine_capacity, 30.0);
    assert_eq!(module_in(&result, "mod_magazine"), Some(ModuleId::new("mag_30")));
    assert_eq!(
        module_in(&result, "mod_pistol_grip"),
        Some(ModuleId::new("grip_factory"))
    );
    assert!(result.modules.values().all(|m| m.factory));
    // Dust cover fits no slot and is not listed
    assert_eq!(result.modules.len(), 2);
}

#[tokio::test]
async fn test_grip_lifts_ergonomics_to_requirement() {
    let (engine, _catalog) = engine();
    let reqs = requirements("ak74", &["ergonomics>=55"]);

    let result = engine
        .quest_build(&reqs, &mut rng(7), &Cancellation::none())
        .await
        .unwrap();

    assert!(result.meets_requirements);
    assert_eq!(result.stats.ergonomics, 57.0);
    assert_eq!(
        module_in(&result, "mod_pistol_grip"),
        Some(ModuleId::new("grip_plus15"))
    );
    let grip = &result.modules[&SlotId::new("mod_pistol_grip")];
    assert!(!grip.factory);
    assert_eq!(grip.vendor, "Prapor");
    assert_eq!(grip.price, 3_000);
}

#[tokio::test]
async fn test_prefers_magazine_least_damaging_to_ergonomics() {
    let (engine, _catalog) = engine();
    let reqs = requirements("ak74", &["magazineCapacity>=60"]);

    for seed in 0..10 {
        let result = engine
            .quest_build(&reqs, &mut rng(seed), &Cancellation::none())
            .await
            .unwrap();

        assert!(result.meets_requirements);
        assert_eq!(module_in(&result, "mod_magazine"), Some(ModuleId::new("mag_60")));
        assert_eq!(result.stats.magazine_capacity, 60.0);
        assert_eq!(result.stats.ergonomics, 39.0);
    }
}

#[tokio::test]
async fn test_compensates_for_heavy_magazine() {
    let (engine, _catalog) = engine();
    let reqs = requirements("ak74", &["ergonomics>=55", "magazineCapacity>=60"]);

    let result = engine
        .quest_build(&reqs, &mut rng(11), &Cancellation::none())
        .await
        .unwrap();

    assert!(result.meets_requirements);
    assert_eq!(module_in(&result, "mod_magazine"), Some(ModuleId::new("mag_60")));
    assert_eq!(
        module_in(&result, "mod_pistol_grip"),
        Some(ModuleId::new("grip_plus15"))
    );
    assert_eq!(module_in(&result, "mod_handguard"), Some(ModuleId::new("hg_ergo")));
    assert_eq!(result.stats.ergonomics, 60.0);

    // weapon + grip + magazine + handguard
    assert_eq!(result.total_cost, 40_000 + 3_000 + 9_000 + 5_000);
}

fn added_modules(result: &QuestBuildResult) -> usize {
    result.modules.values().filter(|m| !m.factory).count()
}

#[tokio::test]
async fn test_greedy_pass_stops_after_max_attempts() {
    let (engine, _catalog) = engine();
    // Six +2 ergonomics parts on a 30 ergonomics rifle
    let reqs = requirements("sks", &["ergonomics>=60"]);

    for seed in 0..5 {
        let result = engine
            .quest_build(&reqs, &mut rng(seed), &Cancellation::none())
            .await
            .unwrap();

        assert!(!result.meets_requirements);
        assert_eq!(engine.optimizer().settings().max_attempts, 5);
        assert_eq!(added_modules(&result), 5);
        assert_eq!(result.stats.ergonomics, 40.0);
        assert_eq!(
            module_in(&result, "mod_magazine"),
            Some(ModuleId::new("sks_mag_10"))
        );
    }
}

#[tokio::test]
async fn test_compensation_stops_at_limit() {
    let (engine, _catalog) = engine();
    // The drum takes ergonomics from 30 to 20; three +2 parts only recover 6
    let reqs = requirements("sks", &["ergonomics>=28", "magazineCapacity>=70"]);

    for seed in 0..5 {
        let result = engine
            .quest_build(&reqs, &mut rng(seed), &Cancellation::none())
            .await
            .unwrap();

        assert!(!result.meets_requirements);
        assert_eq!(
            module_in(&result, "mod_magazine"),
            Some(ModuleId::new("sks_drum_75"))
        );
        assert_eq!(result.stats.magazine_capacity, 75.0);
        assert_eq!(result.stats.ergonomics, 26.0);
        // drum + compensation_limit parts
        assert_eq!(engine.optimizer().settings().compensation_limit, 3);
        assert_eq!(added_modules(&result), 4);
        assert!(!result.checks[0].met);
        assert!(result.checks[1].met);
    }
}

#[tokio::test]
async fn test_partial_satisfaction_is_not_an_error() {
    let (engine, _catalog) = engine();
    let reqs = requirements("ak74", &["ergonomics>=70", "magazineCapacity>=60"]);

    let result = engine
        .quest_build(&reqs, &mut rng(5), &Cancellation::none())
        .await
        .unwrap();

    assert!(!result.meets_requirements);
    assert_eq!(result.checks.len(), 2);
    assert!(!result.checks[0].met);
    assert!(result.checks[1].met);
    assert_eq!(result.unmet().count(), 1);
    assert!(result.stats.ergonomics < 70.0);
    assert_eq!(result.stats.magazine_capacity, 60.0);

    let metrics = engine.metrics();
    assert_eq!(metrics.quest_builds.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.quest_builds_satisfied.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_excluded_module_never_used() {
    let (engine, _catalog) = engine();
    // The excluded handguard would be the best ergonomics pick
    let reqs = requirements("ak74", &["ergonomics>=80"]);

    let result = engine
        .quest_build(&reqs, &mut rng(2), &Cancellation::none())
        .await
        .unwrap();

    assert!(
        result
            .modules
            .values()
            .all(|m| m.module_id != ModuleId::new("hg_banned"))
    );
}

#[tokio::test]
async fn test_flea_only_module_priced_at_flea() {
    let (engine, _catalog) = engine();
    let reqs = requirements("ak74", &["magazineCapacity>=90"]);

    let result = engine
        .quest_build(&reqs, &mut rng(3), &Cancellation::none())
        .await
        .unwrap();

    let magazine = &result.modules[&SlotId::new("mod_magazine")];
    assert_eq!(magazine.module_id, ModuleId::new("mag_95"));
    assert_eq!(magazine.vendor, FLEA_MARKET);
    assert_eq!(magazine.price, 20_000);
}

#[tokio::test]
async fn test_rerun_on_satisfying_build_changes_nothing() {
    let (engine, _catalog) = engine();
    let reqs = requirements("ak74", &["ergonomics>=55", "magazineCapacity>=60"]);
    let details = engine
        .resolver()
        .weapon_details(&WeaponId::new("ak74"))
        .await
        .unwrap();

    let first = engine
        .optimizer()
        .optimize(&details, &reqs, &mut rng(21), &Cancellation::none())
        .unwrap();
    assert!(first.meets_requirements);

    let assignment: IndexMap<SlotId, ModuleId> = first
        .modules
        .iter()
        .map(|(slot, module)| (slot.clone(), module.module_id.clone()))
        .collect();
    let second = engine
        .optimizer()
        .optimize_assignment(&details, &assignment, &reqs, &mut rng(99), &Cancellation::none())
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unknown_weapon_is_data_unavailable() {
    let (engine, _catalog) = engine();
    let reqs = requirements("missing_rifle", &["ergonomics>=10"]);

    let result = engine
        .quest_build(&reqs, &mut rng(1), &Cancellation::none())
        .await;
    assert!(matches!(
        result,
        Err(BuildError::DataUnavailable(CatalogError::NotFound(_)))
    ));
}

#[tokio::test]
async fn test_quest_objectives_drive_builds() {
    let (engine, catalog) = engine();

    let results = engine
        .quest_builds(catalog.as_ref(), "gunsmith_1", &mut rng(4), &Cancellation::none())
        .await
        .unwrap();

    // The visit objective is ignored
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.weapon.id, WeaponId::new("ak74"));
    assert_eq!(result.checks.len(), 2);
    assert!(result.meets_requirements);

    let missing = engine
        .quest_builds(catalog.as_ref(), "no_such_quest", &mut rng(4), &Cancellation::none())
        .await;
    assert!(matches!(missing, Err(BuildError::DataUnavailable(_))));
}

#[tokio::test]
async fn test_inserted_quest_drives_builds() {
    let mut catalog = StaticCatalog::load(&fixture_path()).unwrap();
    catalog.insert_quest(
        "sks_drum",
        vec![QuestObjective {
            objective_type: BUILD_WEAPON_OBJECTIVE.to_string(),
            item: ObjectiveItem {
                id: WeaponId::new("sks"),
                name: "SKS 7.62x39".to_string(),
            },
            attributes: vec![ObjectiveAttribute {
                name: "magazineCapacity".to_string(),
                requirement: AttributeRequirement {
                    compare_method: ">=".to_string(),
                    value: 70.0,
                },
            }],
        }],
    );
    let catalog = Arc::new(catalog);
    let engine = BuildEngine::new(catalog.clone(), &EngineConfig::default());

    let results = engine
        .quest_builds(catalog.as_ref(), "sks_drum", &mut rng(6), &Cancellation::none())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(result.meets_requirements);
    assert_eq!(
        module_in(result, "mod_magazine"),
        Some(ModuleId::new("sks_drum_75"))
    );
    // No ergonomics requirement, so nothing compensates for the drum
    assert_eq!(result.stats.ergonomics, 20.0);
    assert_eq!(added_modules(result), 1);
}
