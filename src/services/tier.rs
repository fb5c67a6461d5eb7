use crate::models::{BuildStats, Completeness, TierRating, WeaponStats};
use serde::Serialize;

/// Stats of the unmodified weapon, used for the improvement bonus
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaseStats {
    pub ergonomics: f64,
    pub recoil_vertical: f64,
}

impl From<&WeaponStats> for BaseStats {
    fn from(stats: &WeaponStats) -> Self {
        Self {
            ergonomics: stats.ergonomics,
            recoil_vertical: stats.recoil_vertical,
        }
    }
}

/// Everything the tier score depends on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierInputs {
    pub ergonomics: f64,
    pub recoil_vertical: f64,
    /// Carried for display; not scored.
    pub recoil_horizontal: f64,
    pub total_cost: u64,
    pub completeness: Completeness,
    pub base: Option<BaseStats>,
}

impl TierInputs {
    pub fn from_build(
        stats: &BuildStats,
        total_cost: u64,
        completeness: Completeness,
        base: Option<BaseStats>,
    ) -> Self {
        Self {
            ergonomics: stats.ergonomics,
            recoil_vertical: stats.recoil_vertical,
            recoil_horizontal: stats.recoil_horizontal,
            total_cost,
            completeness,
            base,
        }
    }
}

/// Points awarded per scoring component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub completeness: i32,
    pub key_modules: i32,
    pub ergonomics: i32,
    pub recoil: i32,
    pub cost_efficiency: i32,
    pub improvement: i32,
}

impl ScoreBreakdown {
    pub fn raw_total(&self) -> i32 {
        self.completeness
            + self.key_modules
            + self.ergonomics
            + self.recoil
            + self.cost_efficiency
            + self.improvement
    }

    /// Total clamped to 0..=100
    pub fn score(&self) -> u8 {
        self.raw_total().clamp(0, 100) as u8
    }
}

/// Pure scoring of a build into a 0-100 score and a [`TierRating`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TierEvaluator;

impl TierEvaluator {
    pub fn breakdown(inputs: &TierInputs) -> ScoreBreakdown {
        ScoreBreakdown {
            completeness: completeness_points(&inputs.completeness),
            key_modules: key_module_points(&inputs.completeness),
            ergonomics: ergonomics_points(inputs.ergonomics),
            recoil: recoil_points(inputs.recoil_vertical),
            cost_efficiency: cost_points(inputs),
            improvement: inputs
                .base
                .map(|base| improvement_points(inputs, base))
                .unwrap_or(0),
        }
    }

    pub fn score(inputs: &TierInputs) -> u8 {
        Self::breakdown(inputs).score()
    }

    pub fn evaluate(inputs: &TierInputs) -> TierRating {
        TierRating::from_score(Self::score(inputs))
    }
}

fn completeness_points(completeness: &Completeness) -> i32 {
    if completeness.has_all_required_slots {
        20
    } else {
        -20
    }
}

fn key_module_points(completeness: &Completeness) -> i32 {
    [
        completeness.has_sight,
        completeness.has_stock,
        completeness.has_grip,
    ]
    .into_iter()
    .filter(|present| *present)
    .count() as i32
        * 5
}

fn ergonomics_points(ergonomics: f64) -> i32 {
    if ergonomics >= 50.0 {
        30
    } else if ergonomics >= 35.0 {
        22
    } else if ergonomics >= 20.0 {
        15
    } else {
        5
    }
}

fn recoil_points(recoil_vertical: f64) -> i32 {
    if recoil_vertical <= 40.0 {
        30
    } else if recoil_vertical <= 60.0 {
        22
    } else if recoil_vertical <= 80.0 {
        15
    } else {
        5
    }
}

// A non-positive stat value falls in the worst bucket so the score stays
// monotone when it crosses zero.
fn cost_points(inputs: &TierInputs) -> i32 {
    let stat_value = inputs.ergonomics + (100.0 - inputs.recoil_vertical);
    if stat_value <= 0.0 {
        return -5;
    }

    let cost_per_stat = inputs.total_cost as f64 / stat_value;
    if cost_per_stat <= 1500.0 {
        5
    } else if cost_per_stat <= 2500.0 {
        3
    } else if cost_per_stat <= 4000.0 {
        1
    } else {
        -5
    }
}

fn improvement_points(inputs: &TierInputs, base: BaseStats) -> i32 {
    let improvement = (inputs.ergonomics - base.ergonomics)
        + (base.recoil_vertical - inputs.recoil_vertical);
    if improvement > 50.0 {
        10
    } else if improvement > 30.0 {
        5
    } else if improvement < 0.0 {
        -5
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> Completeness {
        Completeness {
            has_all_required_slots: true,
            has_sight: true,
            has_stock: true,
            has_grip: true,
        }
    }

    fn inputs(ergonomics: f64, recoil_vertical: f64, total_cost: u64) -> TierInputs {
        TierInputs {
            ergonomics,
            recoil_vertical,
            recoil_horizontal: 200.0,
            total_cost,
            completeness: complete(),
            base: None,
        }
    }

    #[test]
    fn test_full_marks_is_s_tier() {
        // 20 + 15 + 30 + 30 + 5 = 100
        let inputs = inputs(60.0, 35.0, 50_000);
        assert_eq!(TierEvaluator::score(&inputs), 100);
        assert_eq!(TierEvaluator::evaluate(&inputs), TierRating::S);
    }

    #[test]
    fn test_missing_required_slots() {
        let mut inputs = inputs(10.0, 120.0, 500_000);
        inputs.completeness = Completeness::default();

        let breakdown = TierEvaluator::breakdown(&inputs);
        assert_eq!(breakdown.completeness, -20);
        assert_eq!(breakdown.key_modules, 0);
        assert_eq!(breakdown.ergonomics, 5);
        assert_eq!(breakdown.recoil, 5);
        // stat value <= 0
        assert_eq!(breakdown.cost_efficiency, -5);
        assert_eq!(breakdown.raw_total(), -15);
        assert_eq!(TierEvaluator::score(&inputs), 0);
        assert_eq!(TierEvaluator::evaluate(&inputs), TierRating::D);
    }

    #[test]
    fn test_bucket_edges() {
        assert_eq!(ergonomics_points(50.0), 30);
        assert_eq!(ergonomics_points(49.9), 22);
        assert_eq!(ergonomics_points(35.0), 22);
        assert_eq!(ergonomics_points(20.0), 15);
        assert_eq!(ergonomics_points(19.9), 5);

        assert_eq!(recoil_points(40.0), 30);
        assert_eq!(recoil_points(60.0), 22);
        assert_eq!(recoil_points(80.0), 15);
        assert_eq!(recoil_points(80.1), 5);
    }

    #[test]
    fn test_cost_efficiency() {
        // stat value 100
        assert_eq!(cost_points(&inputs(50.0, 50.0, 150_000)), 5);
        assert_eq!(cost_points(&inputs(50.0, 50.0, 250_000)), 3);
        assert_eq!(cost_points(&inputs(50.0, 50.0, 400_000)), 1);
        assert_eq!(cost_points(&inputs(50.0, 50.0, 400_001)), -5);
    }

    #[test]
    fn test_improvement_bonus() {
        let mut inputs = inputs(60.0, 50.0, 100_000);
        inputs.base = Some(BaseStats {
            ergonomics: 30.0,
            recoil_vertical: 80.0,
        });
        assert_eq!(TierEvaluator::breakdown(&inputs).improvement, 10);

        inputs.base = Some(BaseStats {
            ergonomics: 45.0,
            recoil_vertical: 70.0,
        });
        assert_eq!(TierEvaluator::breakdown(&inputs).improvement, 5);

        inputs.base = Some(BaseStats {
            ergonomics: 70.0,
            recoil_vertical: 50.0,
        });
        assert_eq!(TierEvaluator::breakdown(&inputs).improvement, -5);

        inputs.base = None;
        assert_eq!(TierEvaluator::breakdown(&inputs).improvement, 0);
    }

    #[test]
    fn test_evaluate_is_pure() {
        let inputs = inputs(42.0, 55.0, 180_000);
        let first = TierEvaluator::evaluate(&inputs);
        for _ in 0..10 {
            assert_eq!(TierEvaluator::evaluate(&inputs), first);
        }
    }
}
