//! Common domain type definitions
//!
//! This module contains the item catalogue and group labels shared by every
//! stage of the analysis.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of PHQ-9 items
pub const N_ITEMS: usize = 9;

/// Number of ordered response categories per item (0..=3)
pub const N_CATEGORIES: usize = 4;

/// Highest response category
pub const MAX_RESPONSE: u8 = 3;

/// Highest possible sum score
pub const MAX_SUM_SCORE: u32 = 27;

/// Response at or above which a symptom counts as elevated
pub const ELEVATED_RESPONSE: u8 = 2;

/// A PHQ-9 item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Item {
    /// Little interest or pleasure in doing things
    Anhedonia,
    /// Feeling down, depressed, or hopeless
    DepressedMood,
    /// Trouble falling or staying asleep, or sleeping too much
    Sleep,
    /// Feeling tired or having little energy
    Fatigue,
    /// Poor appetite or overeating
    Appetite,
    /// Feeling bad about yourself
    Worthlessness,
    /// Trouble concentrating
    Concentration,
    /// Moving or speaking slowly, or being fidgety or restless
    Psychomotor,
    /// Thoughts that you would be better off dead
    SuicidalIdeation,
}

impl Item {
    /// All items in questionnaire order
    pub const ALL: [Self; N_ITEMS] = [
        Self::Anhedonia,
        Self::DepressedMood,
        Self::Sleep,
        Self::Fatigue,
        Self::Appetite,
        Self::Worthlessness,
        Self::Concentration,
        Self::Psychomotor,
        Self::SuicidalIdeation,
    ];

    /// The two cardinal symptoms (PHQ-2)
    pub const CORE: [Self; 2] = [Self::Anhedonia, Self::DepressedMood];

    /// Zero-based position in the questionnaire
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Item at a zero-based position
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Column code (`phq1`..`phq9`)
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Anhedonia => "phq1",
            Self::DepressedMood => "phq2",
            Self::Sleep => "phq3",
            Self::Fatigue => "phq4",
            Self::Appetite => "phq5",
            Self::Worthlessness => "phq6",
            Self::Concentration => "phq7",
            Self::Psychomotor => "phq8",
            Self::SuicidalIdeation => "phq9",
        }
    }

    /// Human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Anhedonia => "Anhedonia",
            Self::DepressedMood => "Depressed mood",
            Self::Sleep => "Sleep problems",
            Self::Fatigue => "Fatigue",
            Self::Appetite => "Appetite changes",
            Self::Worthlessness => "Worthlessness",
            Self::Concentration => "Concentration",
            Self::Psychomotor => "Psychomotor change",
            Self::SuicidalIdeation => "Suicidal ideation",
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Item {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let key = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|item| item.code() == key)
            .ok_or_else(|| format!("unknown item '{s}'"))
    }
}

/// Sample membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Group {
    /// Reference group (indicator 0)
    Reference,
    /// Focal group (indicator 1)
    Focal,
}

impl Group {
    /// Both groups, reference first
    pub const BOTH: [Self; 2] = [Self::Reference, Self::Focal];

    /// Binary indicator used in design matrices
    #[must_use]
    pub const fn indicator(self) -> u8 {
        match self {
            Self::Reference => 0,
            Self::Focal => 1,
        }
    }

    /// Zero-based index
    #[must_use]
    pub const fn index(self) -> usize {
        self.indicator() as usize
    }

    /// Indicator as a regressor value
    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.indicator())
    }
}

impl TryFrom<i64> for Group {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Reference),
            1 => Ok(Self::Focal),
            other => Err(format!("group indicator must be 0 or 1, got {other}")),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => f.write_str("reference"),
            Self::Focal => f.write_str("focal"),
        }
    }
}
