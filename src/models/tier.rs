use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter grade of a build. Ordered so that `S > A > B > C > D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TierRating {
    D,
    C,
    B,
    A,
    S,
}

/// Presentation text for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierDescription {
    pub summary: &'static str,
    pub suggestion: &'static str,
}

const S_TIER: TierDescription = TierDescription {
    summary: "Top-tier build with excellent ergonomics and recoil control",
    suggestion: "Nothing to change, this build is ready for any raid",
};

const A_TIER: TierDescription = TierDescription {
    summary: "Strong build with good balance between handling and cost",
    suggestion: "A better muzzle device or grip can push it into S tier",
};

const B_TIER: TierDescription = TierDescription {
    summary: "Solid build for most situations",
    suggestion: "Look for lighter parts with positive ergonomics to improve handling",
};

const C_TIER: TierDescription = TierDescription {
    summary: "Usable build with noticeable weaknesses",
    suggestion: "Invest in a recoil-reducing stock and muzzle device",
};

const D_TIER: TierDescription = TierDescription {
    summary: "Weak or incomplete build",
    suggestion: "Fill every required slot first, then raise the budget",
};

impl TierRating {
    pub const ALL: [TierRating; 5] = [
        TierRating::S,
        TierRating::A,
        TierRating::B,
        TierRating::C,
        TierRating::D,
    ];

    /// Map a 0-100 score to a tier.
    pub fn from_score(score: u8) -> Self {
        match score {
            85.. => TierRating::S,
            70..=84 => TierRating::A,
            50..=69 => TierRating::B,
            30..=49 => TierRating::C,
            _ => TierRating::D,
        }
    }

    pub fn letter(self) -> char {
        match self {
            TierRating::S => 'S',
            TierRating::A => 'A',
            TierRating::B => 'B',
            TierRating::C => 'C',
            TierRating::D => 'D',
        }
    }

    /// Human-readable summary and improvement hint for this tier.
    pub fn describe(self) -> &'static TierDescription {
        match self {
            TierRating::S => &S_TIER,
            TierRating::A => &A_TIER,
            TierRating::B => &B_TIER,
            TierRating::C => &C_TIER,
            TierRating::D => &D_TIER,
        }
    }
}

impl fmt::Display for TierRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}
