use super::catalog::{ModuleId, SlotId, Weapon, WeaponId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Objective type that carries weapon build requirements.
pub const BUILD_WEAPON_OBJECTIVE: &str = "buildWeapon";

/// Errors raised while turning quest data into requirements.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequirementParseError {
    #[error("Objective type {0} does not describe a weapon build")]
    NotBuildObjective(String),

    #[error("Unknown comparator: {0}")]
    UnknownComparator(String),

    #[error("Unknown stat: {0}")]
    UnknownStat(String),

    #[error("Invalid threshold value: {0}")]
    InvalidThreshold(String),

    #[error("Malformed requirement: {0}")]
    Malformed(String),
}

/// A weapon stat a quest can put a threshold on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestStat {
    Ergonomics,
    Recoil,
    MagazineCapacity,
    Durability,
    Weight,
    Accuracy,
    EffectiveDistance,
}

impl QuestStat {
    pub fn name(self) -> &'static str {
        match self {
            QuestStat::Ergonomics => "ergonomics",
            QuestStat::Recoil => "recoil",
            QuestStat::MagazineCapacity => "magazineCapacity",
            QuestStat::Durability => "durability",
            QuestStat::Weight => "weight",
            QuestStat::Accuracy => "accuracy",
            QuestStat::EffectiveDistance => "effectiveDistance",
        }
    }
}

impl fmt::Display for QuestStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QuestStat {
    type Err = RequirementParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "ergonomics" | "ergo" => Ok(QuestStat::Ergonomics),
            "recoil" | "recoilvertical" | "verticalrecoil" | "recoilsum" => Ok(QuestStat::Recoil),
            "magazinecapacity" | "capacity" => Ok(QuestStat::MagazineCapacity),
            "durability" => Ok(QuestStat::Durability),
            "weight" => Ok(QuestStat::Weight),
            "accuracy" => Ok(QuestStat::Accuracy),
            "effectivedistance" => Ok(QuestStat::EffectiveDistance),
            _ => Err(RequirementParseError::UnknownStat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
}

impl Comparator {
    const EPSILON: f64 = 1e-9;

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::GreaterOrEqual => ">=",
            Comparator::LessOrEqual => "<=",
            Comparator::Equal => "==",
            Comparator::Greater => ">",
            Comparator::Less => "<",
        }
    }

    pub fn check(self, actual: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterOrEqual => actual >= threshold - Self::EPSILON,
            Comparator::LessOrEqual => actual <= threshold + Self::EPSILON,
            Comparator::Equal => (actual - threshold).abs() <= Self::EPSILON,
            Comparator::Greater => actual > threshold,
            Comparator::Less => actual < threshold,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Comparator {
    type Err = RequirementParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">=" => Ok(Comparator::GreaterOrEqual),
            "<=" => Ok(Comparator::LessOrEqual),
            "==" | "=" => Ok(Comparator::Equal),
            ">" => Ok(Comparator::Greater),
            "<" => Ok(Comparator::Less),
            other => Err(RequirementParseError::UnknownComparator(other.to_string())),
        }
    }
}

/// One stat threshold, e.g. `ergonomics >= 55`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestRequirement {
    pub stat: QuestStat,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl QuestRequirement {
    pub fn new(stat: QuestStat, comparator: Comparator, threshold: f64) -> Self {
        Self {
            stat,
            comparator,
            threshold,
        }
    }

    pub fn is_met(&self, stats: &QuestStats) -> bool {
        self.comparator.check(stats.get(self.stat), self.threshold)
    }
}

impl fmt::Display for QuestRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.stat, self.comparator, self.threshold)
    }
}

impl FromStr for QuestRequirement {
    type Err = RequirementParseError;

    /// Parse `stat<op>value`, e.g. `magazineCapacity>=60`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op_start = s
            .find(['<', '>', '='])
            .ok_or_else(|| RequirementParseError::Malformed(s.to_string()))?;
        let op_len = s[op_start..]
            .chars()
            .take_while(|c| matches!(c, '<' | '>' | '='))
            .count();

        let stat: QuestStat = s[..op_start].trim().parse()?;
        let comparator: Comparator = s[op_start..op_start + op_len].parse()?;
        let raw_value = s[op_start + op_len..].trim();
        let threshold = raw_value
            .parse::<f64>()
            .map_err(|_| RequirementParseError::InvalidThreshold(raw_value.to_string()))?;

        Ok(Self::new(stat, comparator, threshold))
    }
}

/// Target weapon and ordered requirements of a quest build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestBuildRequirements {
    pub weapon_id: WeaponId,
    pub weapon_name: Option<String>,
    pub requirements: Vec<QuestRequirement>,
}

impl QuestBuildRequirements {
    pub fn new(weapon_id: impl Into<WeaponId>, requirements: Vec<QuestRequirement>) -> Self {
        Self {
            weapon_id: weapon_id.into(),
            weapon_name: None,
            requirements,
        }
    }

    /// Parse a `buildWeapon` objective.
    ///
    /// Attributes naming a stat the engine does not know are skipped.
    pub fn from_objective(objective: &QuestObjective) -> Result<Self, RequirementParseError> {
        if objective.objective_type != BUILD_WEAPON_OBJECTIVE {
            return Err(RequirementParseError::NotBuildObjective(
                objective.objective_type.clone(),
            ));
        }

        let mut requirements = Vec::with_capacity(objective.attributes.len());
        for attribute in &objective.attributes {
            let stat = match attribute.name.parse::<QuestStat>() {
                Ok(stat) => stat,
                Err(e) => {
                    tracing::warn!("Skipping quest attribute: {}", e);
                    continue;
                }
            };
            let comparator = attribute.requirement.compare_method.parse()?;
            requirements.push(QuestRequirement::new(
                stat,
                comparator,
                attribute.requirement.value,
            ));
        }

        Ok(Self {
            weapon_id: objective.item.id.clone(),
            weapon_name: Some(objective.item.name.clone()),
            requirements,
        })
    }
}

/// Quest objective as supplied by the quest data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestObjective {
    #[serde(rename = "type")]
    pub objective_type: String,
    pub item: ObjectiveItem,
    #[serde(default)]
    pub attributes: Vec<ObjectiveAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveItem {
    pub id: WeaponId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveAttribute {
    pub name: String,
    pub requirement: AttributeRequirement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRequirement {
    pub compare_method: String,
    pub value: f64,
}

/// Stats tracked while optimizing a quest build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestStats {
    pub ergonomics: f64,
    pub recoil: f64,
    pub magazine_capacity: f64,
    // Not modeled by module data; kept at fixed placeholder values.
    pub durability: f64,
    pub weight: f64,
    pub accuracy: f64,
    pub effective_distance: f64,
}

impl QuestStats {
    pub const PLACEHOLDER_DURABILITY: f64 = 100.0;

    pub fn get(&self, stat: QuestStat) -> f64 {
        match stat {
            QuestStat::Ergonomics => self.ergonomics,
            QuestStat::Recoil => self.recoil,
            QuestStat::MagazineCapacity => self.magazine_capacity,
            QuestStat::Durability => self.durability,
            QuestStat::Weight => self.weight,
            QuestStat::Accuracy => self.accuracy,
            QuestStat::EffectiveDistance => self.effective_distance,
        }
    }
}

/// Outcome of one requirement against the final stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementCheck {
    pub requirement: QuestRequirement,
    pub actual: f64,
    pub met: bool,
}

/// A module of a quest build and where to buy it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestModule {
    pub module_id: ModuleId,
    pub name: String,
    pub vendor: String,
    pub price: u64,
    /// True when the module is part of the factory configuration.
    pub factory: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestBuildResult {
    pub weapon: Weapon,
    pub modules: IndexMap<SlotId, QuestModule>,
    pub stats: QuestStats,
    pub total_cost: u64,
    pub meets_requirements: bool,
    pub checks: Vec<RequirementCheck>,
}

impl QuestBuildResult {
    pub fn unmet(&self) -> impl Iterator<Item = &RequirementCheck> {
        self.checks.iter().filter(|check| !check.met)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requirement() {
        let req: QuestRequirement = "ergonomics>=55".parse().unwrap();
        assert_eq!(req.stat, QuestStat::Ergonomics);
        assert_eq!(req.comparator, Comparator::GreaterOrEqual);
        assert_eq!(req.threshold, 55.0);

        let req: QuestRequirement = "recoil < 300".parse().unwrap();
        assert_eq!(req.stat, QuestStat::Recoil);
        assert_eq!(req.comparator, Comparator::Less);

        let req: QuestRequirement = "magazine capacity = 60".parse().unwrap();
        assert_eq!(req.stat, QuestStat::MagazineCapacity);
        assert_eq!(req.comparator, Comparator::Equal);
    }

    #[test]
    fn test_parse_requirement_errors() {
        assert!(matches!(
            "ergonomics 55".parse::<QuestRequirement>(),
            Err(RequirementParseError::Malformed(_))
        ));
        assert!(matches!(
            "luck>=3".parse::<QuestRequirement>(),
            Err(RequirementParseError::UnknownStat(_))
        ));
        assert!(matches!(
            "ergonomics=>3".parse::<QuestRequirement>(),
            Err(RequirementParseError::UnknownComparator(_))
        ));
        assert!(matches!(
            "ergonomics>=high".parse::<QuestRequirement>(),
            Err(RequirementParseError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_comparator_check() {
        assert!(Comparator::GreaterOrEqual.check(55.0, 55.0));
        assert!(!Comparator::Greater.check(55.0, 55.0));
        assert!(Comparator::LessOrEqual.check(10.0, 10.0));
        assert!(Comparator::Less.check(9.0, 10.0));
        assert!(Comparator::Equal.check(60.0, 60.0));
        assert!(!Comparator::Equal.check(60.5, 60.0));
    }

    #[test]
    fn test_from_objective() {
        let objective: QuestObjective = serde_json::from_str(
            r#"{
                "type": "buildWeapon",
                "item": { "id": "m4a1", "name": "Colt M4A1" },
                "attributes": [
                    { "name": "ergonomics", "requirement": { "compareMethod": ">=", "value": 55 } },
                    { "name": "recoil", "requirement": { "compareMethod": "<=", "value": 300 } },
                    { "name": "tacticalDevice", "requirement": { "compareMethod": ">=", "value": 1 } }
                ]
            }"#,
        )
        .unwrap();

        let parsed = QuestBuildRequirements::from_objective(&objective).unwrap();
        assert_eq!(parsed.weapon_id, WeaponId::new("m4a1"));
        assert_eq!(parsed.weapon_name.as_deref(), Some("Colt M4A1"));
        assert_eq!(parsed.requirements.len(), 2);
        assert_eq!(parsed.requirements[1].comparator, Comparator::LessOrEqual);
    }

    #[test]
    fn test_from_objective_rejects_other_types() {
        let objective = QuestObjective {
            objective_type: "shoot".to_string(),
            item: ObjectiveItem {
                id: WeaponId::new("x"),
                name: "X".to_string(),
            },
            attributes: Vec::new(),
        };

        assert_eq!(
            QuestBuildRequirements::from_objective(&objective),
            Err(RequirementParseError::NotBuildObjective("shoot".to_string()))
        );
    }
}
