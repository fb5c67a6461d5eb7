//! Catalog and quest data providers.
//!
//! The engine only consumes catalog data through [`CatalogProvider`] and quest
//! objectives through [`QuestDataProvider`]. [`StaticCatalog`] implements both from a
//! JSON snapshot shaped like the upstream item API (`avg24hPrice`, `buyFor`,
//! `properties.slots[].filters`, ...), see [`CatalogSnapshot`].

use super::error::CatalogError;
use crate::models::quest::BUILD_WEAPON_OBJECTIVE;
use crate::models::{
    FLEA_MARKET, Module, ModuleId, ModuleStats, QuestObjective, Slot, SlotId, VendorOffer, Weapon,
    WeaponDetails, WeaponId, WeaponStats,
};
use async_trait::async_trait;
use camino::Utf8Path;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

/// Requirement type carrying the minimum trader loyalty level of an offer.
const LOYALTY_REQUIREMENT: &str = "loyaltyLevel";

/// Source of weapon, slot and module data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Full details of one weapon, `None` if the catalog does not know it.
    async fn weapon_details(
        &self,
        weapon_id: &WeaponId,
    ) -> Result<Option<WeaponDetails>, CatalogError>;

    /// Every weapon in the catalog. Category filtering is left to the caller.
    async fn all_weapons(&self) -> Result<Vec<Weapon>, CatalogError>;
}

/// Source of quest objectives.
#[async_trait]
pub trait QuestDataProvider: Send + Sync {
    /// The `buildWeapon` objectives of a quest. Unknown quests yield `NotFound`.
    async fn build_objectives(&self, quest_id: &str) -> Result<Vec<QuestObjective>, CatalogError>;
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Top-level catalog snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub weapons: Vec<WireWeapon>,
    #[serde(default)]
    pub quests: Vec<WireQuest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireWeapon {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub avg24h_price: Option<u64>,
    #[serde(default)]
    pub buy_for: Vec<WireOffer>,
    #[serde(default)]
    pub properties: WireWeaponProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireWeaponProperties {
    #[serde(default)]
    pub ergonomics: Option<f64>,
    #[serde(default)]
    pub recoil_vertical: Option<f64>,
    #[serde(default)]
    pub recoil_horizontal: Option<f64>,
    #[serde(default)]
    pub caliber: Option<String>,
    #[serde(default)]
    pub fire_rate: Option<u32>,
    #[serde(default)]
    pub slots: Vec<WireSlot>,
    #[serde(default)]
    pub default_preset: Option<WirePreset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSlot {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub name_id: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub filters: WireFilters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFilters {
    #[serde(default)]
    pub allowed_items: Vec<WireItem>,
    #[serde(default)]
    pub excluded_items: Vec<WireItemRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePreset {
    #[serde(default)]
    pub contains_items: Vec<WireItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireItemRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avg24h_price: Option<u64>,
    #[serde(default)]
    pub properties: Option<WireItemProperties>,
    #[serde(default)]
    pub buy_for: Vec<WireOffer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireItemProperties {
    #[serde(default)]
    pub ergonomics: Option<f64>,
    #[serde(default)]
    pub recoil_modifier: Option<f64>,
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireOffer {
    pub vendor: WireVendor,
    #[serde(rename = "priceRUB", alias = "price")]
    pub price_rub: u64,
    #[serde(default)]
    pub requirements: Vec<WireRequirement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireVendor {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequirement {
    #[serde(rename = "type")]
    pub requirement_type: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireQuest {
    pub id: String,
    pub name: String,
    /// Raw objectives; only `buildWeapon` ones are parsed.
    #[serde(default)]
    pub objectives: Vec<serde_json::Value>,
}

/// Split `buyFor` into trader offers and the flea price.
fn split_offers(buy_for: &[WireOffer]) -> (Vec<VendorOffer>, Option<u64>) {
    let mut offers = Vec::new();
    let mut flea = None;

    for offer in buy_for {
        if offer.vendor.name.eq_ignore_ascii_case(FLEA_MARKET) {
            flea = Some(flea.map_or(offer.price_rub, |p: u64| p.min(offer.price_rub)));
            continue;
        }

        let min_loyalty_level = offer
            .requirements
            .iter()
            .find(|r| r.requirement_type == LOYALTY_REQUIREMENT)
            .map(|r| r.value.clamp(0, 4) as u8)
            .unwrap_or(1);

        offers.push(VendorOffer {
            trader: offer.vendor.name.clone(),
            min_loyalty_level,
            price: offer.price_rub,
        });
    }

    (offers, flea)
}

impl From<&WireItem> for Module {
    fn from(item: &WireItem) -> Self {
        let (offers, flea) = split_offers(&item.buy_for);
        let properties = item.properties.clone().unwrap_or_default();

        Module {
            id: ModuleId::new(&item.id),
            name: item.name.clone(),
            flea_price: flea.or(item.avg24h_price),
            stats: ModuleStats {
                ergonomics: properties.ergonomics.unwrap_or(0.0),
                recoil_modifier: properties.recoil_modifier.unwrap_or(0.0),
                capacity: properties.capacity,
            },
            offers,
        }
    }
}

impl From<&WireSlot> for Slot {
    fn from(slot: &WireSlot) -> Self {
        Slot {
            id: SlotId::new(&slot.name_id),
            name: slot.name.clone(),
            required: slot.required,
            allowed_items: slot.filters.allowed_items.iter().map(Module::from).collect(),
            excluded_items: slot
                .filters
                .excluded_items
                .iter()
                .map(|item| ModuleId::new(&item.id))
                .collect(),
        }
    }
}

impl From<&WireWeapon> for WeaponDetails {
    fn from(wire: &WireWeapon) -> Self {
        let (offers, flea) = split_offers(&wire.buy_for);
        let properties = &wire.properties;
        let cheapest_trader = offers.iter().map(|o| o.price).min();

        let weapon = Weapon {
            id: WeaponId::new(&wire.id),
            name: wire.name.clone(),
            category: wire.category.clone(),
            stats: WeaponStats {
                ergonomics: properties.ergonomics.unwrap_or(0.0),
                recoil_vertical: properties.recoil_vertical.unwrap_or(0.0),
                recoil_horizontal: properties.recoil_horizontal.unwrap_or(0.0),
                caliber: properties.caliber.clone(),
                fire_rate: properties.fire_rate,
            },
            price: wire.avg24h_price.or(cheapest_trader).or(flea),
            offers,
        };

        WeaponDetails {
            weapon,
            slots: properties.slots.iter().map(Slot::from).collect(),
            default_preset: properties
                .default_preset
                .as_ref()
                .map(|preset| preset.contains_items.iter().map(Module::from).collect())
                .unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Static provider
// ---------------------------------------------------------------------------

/// In-memory catalog, typically loaded from a JSON snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    weapons: IndexMap<WeaponId, WeaponDetails>,
    quests: HashMap<String, Vec<QuestObjective>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_details(details: impl IntoIterator<Item = WeaponDetails>) -> Self {
        let mut catalog = Self::new();
        for weapon in details {
            catalog.insert_weapon(weapon);
        }
        catalog
    }

    pub fn from_snapshot(snapshot: &CatalogSnapshot) -> Self {
        let mut catalog = Self::from_details(snapshot.weapons.iter().map(WeaponDetails::from));

        for quest in &snapshot.quests {
            let objectives = quest
                .objectives
                .iter()
                .filter(|raw| {
                    raw.get("type").and_then(|t| t.as_str()) == Some(BUILD_WEAPON_OBJECTIVE)
                })
                .filter_map(|raw| match serde_json::from_value(raw.clone()) {
                    Ok(objective) => Some(objective),
                    Err(e) => {
                        tracing::warn!("Skipping malformed objective in quest {}: {}", quest.id, e);
                        None
                    }
                })
                .collect();
            catalog.quests.insert(quest.id.clone(), objectives);
        }

        catalog
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let snapshot: CatalogSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(&snapshot))
    }

    /// Load a JSON snapshot from disk.
    pub fn load(path: &Utf8Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&contents)?;
        tracing::info!(
            "Loaded catalog from {}: {} weapons, {} quests",
            path,
            catalog.weapons.len(),
            catalog.quests.len()
        );
        Ok(catalog)
    }

    pub fn insert_weapon(&mut self, details: WeaponDetails) {
        self.weapons.insert(details.weapon.id.clone(), details);
    }

    pub fn insert_quest(&mut self, quest_id: impl Into<String>, objectives: Vec<QuestObjective>) {
        self.quests.insert(quest_id.into(), objectives);
    }

    pub fn weapon_count(&self) -> usize {
        self.weapons.len()
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn weapon_details(
        &self,
        weapon_id: &WeaponId,
    ) -> Result<Option<WeaponDetails>, CatalogError> {
        Ok(self.weapons.get(weapon_id).cloned())
    }

    async fn all_weapons(&self) -> Result<Vec<Weapon>, CatalogError> {
        Ok(self.weapons.values().map(|d| d.weapon.clone()).collect())
    }
}

#[async_trait]
impl QuestDataProvider for StaticCatalog {
    async fn build_objectives(&self, quest_id: &str) -> Result<Vec<QuestObjective>, CatalogError> {
        self.quests
            .get(quest_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("Quest {}", quest_id)))
    }
}
