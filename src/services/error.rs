use crate::models::{RequirementParseError, WeaponId};
use thiserror::Error;

/// Errors raised by catalog and quest data providers
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{0} not found in catalog")]
    NotFound(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed catalog data: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end a generation or optimization request without a build
///
/// Partial satisfaction of quest requirements is not an error: the optimizer
/// returns its best effort with `meets_requirements = false`.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Catalog data unavailable: {0}")]
    DataUnavailable(#[from] CatalogError),

    #[error("No weapon fits a budget of {budget}")]
    BudgetInfeasible { budget: u64 },

    #[error("Weapon {weapon} costs {price}, above the budget of {budget}")]
    WeaponOverBudget {
        weapon: WeaponId,
        price: u64,
        budget: u64,
    },

    #[error("Weapon {0} has no known price")]
    Unpriced(WeaponId),

    #[error("Invalid quest requirements: {0}")]
    InvalidRequirements(#[from] RequirementParseError),

    #[error("Build request cancelled")]
    Cancelled,
}

impl BuildError {
    /// True for the budget-related failures a caller should answer with a larger budget
    pub fn is_budget_infeasible(&self) -> bool {
        matches!(
            self,
            BuildError::BudgetInfeasible { .. } | BuildError::WeaponOverBudget { .. }
        )
    }
}
