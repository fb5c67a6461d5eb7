//! Shared fixtures for the integration tests

#![allow(dead_code)]

use camino::Utf8PathBuf;
use gunsmith::models::EngineConfig;
use gunsmith::{BuildEngine, StaticCatalog};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

pub const ALL_TRADERS: [&str; 4] = ["Prapor", "Skier", "Mechanic", "Peacekeeper"];

pub fn fixture_path() -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("catalog.json")
}

pub fn load_catalog() -> Arc<StaticCatalog> {
    Arc::new(StaticCatalog::load(&fixture_path()).expect("fixture catalog should load"))
}

pub fn engine() -> (BuildEngine, Arc<StaticCatalog>) {
    let catalog = load_catalog();
    let engine = BuildEngine::new(catalog.clone(), &EngineConfig::default());
    (engine, catalog)
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
