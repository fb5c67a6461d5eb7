use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Vendor name used for purchases that go through the open market.
pub const FLEA_MARKET: &str = "Flea Market";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Catalog identifier of a weapon.
    WeaponId
);
string_id!(
    /// Catalog identifier of an attachment module.
    ModuleId
);
string_id!(
    /// Stable identifier of a weapon slot (the catalog's `nameId`, e.g. `mod_stock`).
    SlotId
);

/// A trader offer for a weapon or module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorOffer {
    pub trader: String,
    pub min_loyalty_level: u8,
    pub price: u64,
}

impl VendorOffer {
    /// Check whether the offer is unlocked for the given trader levels.
    ///
    /// Traders missing from the map are treated as level 0.
    pub fn is_unlocked(&self, trader_levels: &HashMap<String, u8>) -> bool {
        let level = trader_levels.get(&self.trader).copied().unwrap_or(0);
        level >= self.min_loyalty_level
    }
}

/// Cheapest offer among `offers` that passes `filter`.
pub fn cheapest_offer<'a>(
    offers: &'a [VendorOffer],
    filter: impl Fn(&VendorOffer) -> bool,
) -> Option<&'a VendorOffer> {
    offers
        .iter()
        .filter(|offer| filter(offer))
        .min_by_key(|offer| offer.price)
}

/// Base stats of an unmodified weapon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeaponStats {
    pub ergonomics: f64,
    pub recoil_vertical: f64,
    pub recoil_horizontal: f64,
    pub caliber: Option<String>,
    pub fire_rate: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub id: WeaponId,
    pub name: String,
    pub category: Option<String>,
    pub stats: WeaponStats,
    /// Reference price; weapons without one are never picked by budget selection.
    pub price: Option<u64>,
    #[serde(default)]
    pub offers: Vec<VendorOffer>,
}

impl Weapon {
    /// Case-insensitive category match. `None` matches every weapon.
    pub fn matches_category(&self, category: Option<&str>) -> bool {
        match (category, self.category.as_deref()) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => actual.eq_ignore_ascii_case(wanted),
            (Some(_), None) => false,
        }
    }
}

/// Stat contribution of an installed module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleStats {
    pub ergonomics: f64,
    /// Recoil modifier in percent points (negative reduces recoil).
    pub recoil_modifier: f64,
    /// Round capacity, only present on magazines.
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub flea_price: Option<u64>,
    #[serde(default)]
    pub stats: ModuleStats,
    #[serde(default)]
    pub offers: Vec<VendorOffer>,
}

impl Module {
    pub fn is_magazine(&self) -> bool {
        self.stats.capacity.is_some()
    }

    /// Cheapest trader offer unlocked at `trader_levels`.
    pub fn cheapest_unlocked_offer(
        &self,
        trader_levels: &HashMap<String, u8>,
    ) -> Option<&VendorOffer> {
        cheapest_offer(&self.offers, |offer| offer.is_unlocked(trader_levels))
    }

    /// Cheapest trader offer regardless of loyalty.
    pub fn cheapest_trader_offer(&self) -> Option<&VendorOffer> {
        cheapest_offer(&self.offers, |_| true)
    }
}

/// A modification slot on a weapon and its compatibility filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub name: String,
    pub required: bool,
    #[serde(default)]
    pub allowed_items: Vec<Module>,
    #[serde(default)]
    pub excluded_items: HashSet<ModuleId>,
}

impl Slot {
    /// True iff `module_id` is allowed and not excluded.
    pub fn accepts(&self, module_id: &ModuleId) -> bool {
        !self.excluded_items.contains(module_id)
            && self.allowed_items.iter().any(|m| &m.id == module_id)
    }

    /// Allowed modules minus excluded ones, in catalog order.
    pub fn compatible_modules(&self) -> impl Iterator<Item = &Module> {
        self.allowed_items
            .iter()
            .filter(|m| !self.excluded_items.contains(&m.id))
    }

    /// Match by slot id or display name, ignoring ASCII case.
    pub fn matches(&self, key: &str) -> bool {
        self.id.as_str().eq_ignore_ascii_case(key) || self.name.eq_ignore_ascii_case(key)
    }
}

/// Everything the engine needs to know about one weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponDetails {
    pub weapon: Weapon,
    pub slots: Vec<Slot>,
    /// Modules of the factory configuration.
    #[serde(default)]
    pub default_preset: Vec<Module>,
}

impl WeaponDetails {
    pub fn slot(&self, key: &str) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.matches(key))
    }

    pub fn required_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| slot.required)
    }

    pub fn optional_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| !slot.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &str) -> Module {
        Module {
            id: ModuleId::new(id),
            name: id.to_string(),
            flea_price: Some(1000),
            stats: ModuleStats::default(),
            offers: vec![
                VendorOffer {
                    trader: "Prapor".to_string(),
                    min_loyalty_level: 1,
                    price: 900,
                },
                VendorOffer {
                    trader: "Mechanic".to_string(),
                    min_loyalty_level: 3,
                    price: 700,
                },
            ],
        }
    }

    #[test]
    fn test_slot_accepts_respects_exclusions() {
        let slot = Slot {
            id: SlotId::new("mod_stock"),
            name: "Stock".to_string(),
            required: true,
            allowed_items: vec![module("a"), module("b")],
            excluded_items: [ModuleId::new("b")].into_iter().collect(),
        };

        assert!(slot.accepts(&ModuleId::new("a")));
        assert!(!slot.accepts(&ModuleId::new("b")));
        assert!(!slot.accepts(&ModuleId::new("c")));
        assert_eq!(slot.compatible_modules().count(), 1);
    }

    #[test]
    fn test_slot_matches_id_or_name() {
        let slot = Slot {
            id: SlotId::new("mod_pistol_grip"),
            name: "Pistol Grip".to_string(),
            required: false,
            allowed_items: Vec::new(),
            excluded_items: HashSet::new(),
        };

        assert!(slot.matches("MOD_PISTOL_GRIP"));
        assert!(slot.matches("pistol grip"));
        assert!(!slot.matches("stock"));
    }

    #[test]
    fn test_cheapest_unlocked_offer() {
        let m = module("a");
        let mut levels = HashMap::new();
        levels.insert("Prapor".to_string(), 1);
        levels.insert("Mechanic".to_string(), 2);

        assert_eq!(m.cheapest_unlocked_offer(&levels).unwrap().trader, "Prapor");

        levels.insert("Mechanic".to_string(), 4);
        assert_eq!(m.cheapest_unlocked_offer(&levels).unwrap().price, 700);

        assert!(m.cheapest_unlocked_offer(&HashMap::new()).is_none());
        assert_eq!(m.cheapest_trader_offer().unwrap().trader, "Mechanic");
    }

    #[test]
    fn test_weapon_category_match() {
        let weapon = Weapon {
            id: WeaponId::new("w"),
            name: "W".to_string(),
            category: Some("Assault rifle".to_string()),
            stats: WeaponStats::default(),
            price: Some(1),
            offers: Vec::new(),
        };

        assert!(weapon.matches_category(None));
        assert!(weapon.matches_category(Some("assault rifle")));
        assert!(!weapon.matches_category(Some("SMG")));
    }
}
