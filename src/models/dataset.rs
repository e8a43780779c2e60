//! Harmonized response dataset
//!
//! `ResponseData` is the validated, immutable input every analysis stage reads.
//! Construction enforces the tabular contract: complete 0..=3 responses, both
//! groups present, and no item without response variance.

use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::models::respondent::Respondent;
use crate::models::types::{Group, Item, N_CATEGORIES, N_ITEMS};

/// Validated responses from both samples
#[derive(Debug, Clone)]
pub struct ResponseData {
    respondents: Vec<Respondent>,
    group_labels: [String; 2],
}

impl ResponseData {
    /// Validate and wrap a set of respondents
    ///
    /// # Errors
    /// Returns `InputValidation` when a response is outside 0..=3, a group has
    /// no respondents, or an item has the same response for everyone.
    pub fn new(respondents: Vec<Respondent>, group_labels: [String; 2]) -> Result<Self> {
        if respondents.is_empty() {
            return Err(AnalysisError::validation("dataset", "no respondents"));
        }

        for (row, respondent) in respondents.iter().enumerate() {
            if let Some(item) = respondent.invalid_item() {
                return Err(AnalysisError::validation(
                    format!("row {row}, {item}"),
                    format!(
                        "response {} outside 0..=3",
                        respondent.response(item)
                    ),
                ));
            }
            if let Some(w) = respondent.weight {
                if !w.is_finite() || w < 0.0 {
                    return Err(AnalysisError::validation(
                        format!("row {row}, weight"),
                        format!("weight must be finite and non-negative, got {w}"),
                    ));
                }
            }
        }

        let data = Self {
            respondents,
            group_labels,
        };

        for group in Group::BOTH {
            if data.count_in(group) == 0 {
                return Err(AnalysisError::validation(
                    format!("group {group}"),
                    "fewer than 2 groups present",
                ));
            }
        }

        for item in Item::ALL {
            if data.is_constant(item, None) {
                return Err(AnalysisError::validation(
                    item.code(),
                    "all respondents gave the same response (zero variance)",
                ));
            }
        }

        Ok(data)
    }

    /// Wrap respondents with generic group labels
    pub fn with_default_labels(respondents: Vec<Respondent>) -> Result<Self> {
        Self::new(
            respondents,
            ["reference".to_string(), "focal".to_string()],
        )
    }

    /// Number of respondents
    #[must_use]
    pub fn len(&self) -> usize {
        self.respondents.len()
    }

    /// Whether the dataset is empty (never true after validation)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.respondents.is_empty()
    }

    /// All respondents in input order
    #[must_use]
    pub fn respondents(&self) -> &[Respondent] {
        &self.respondents
    }

    /// Label of a group
    #[must_use]
    pub fn group_label(&self, group: Group) -> &str {
        &self.group_labels[group.index()]
    }

    /// Group of every respondent, in input order
    #[must_use]
    pub fn groups(&self) -> Vec<Group> {
        self.respondents.iter().map(|r| r.group).collect()
    }

    /// Responses to one item, in input order
    #[must_use]
    pub fn item_responses(&self, item: Item) -> Vec<u8> {
        self.respondents.iter().map(|r| r.response(item)).collect()
    }

    /// Elevated indicators (response >= 2) for one item, in input order
    #[must_use]
    pub fn elevated_responses(&self, item: Item) -> Vec<u8> {
        self.respondents
            .iter()
            .map(|r| u8::from(r.elevated(item)))
            .collect()
    }

    /// Sum scores, in input order
    #[must_use]
    pub fn sum_scores(&self) -> Vec<u32> {
        self.respondents.iter().map(Respondent::sum_score).collect()
    }

    /// Number of respondents in a group
    #[must_use]
    pub fn count_in(&self, group: Group) -> usize {
        self.respondents.iter().filter(|r| r.group == group).count()
    }

    /// Category frequencies of an item, optionally within one group
    #[must_use]
    pub fn category_counts(&self, item: Item, group: Option<Group>) -> [usize; N_CATEGORIES] {
        let mut counts = [0usize; N_CATEGORIES];
        for r in &self.respondents {
            if group.is_none_or(|g| g == r.group) {
                counts[usize::from(r.response(item))] += 1;
            }
        }
        counts
    }

    /// Whether an item has a single observed category (overall or within a group)
    #[must_use]
    pub fn is_constant(&self, item: Item, group: Option<Group>) -> bool {
        self.category_counts(item, group)
            .iter()
            .filter(|&&c| c > 0)
            .count()
            < 2
    }

    /// Descriptive summary per group
    #[must_use]
    pub fn summary(&self, screening_cutoff: u32) -> DataSummary {
        let groups = Group::BOTH.map(|group| {
            let members: Vec<&Respondent> =
                self.respondents.iter().filter(|r| r.group == group).collect();
            let n = members.len();
            let n_f = n.max(1) as f64;

            let mut elevated_rate = [0.0; N_ITEMS];
            for item in Item::ALL {
                let elevated = members.iter().filter(|r| r.elevated(item)).count();
                elevated_rate[item.index()] = elevated as f64 / n_f;
            }

            let sum: u32 = members.iter().map(|r| r.sum_score()).sum();
            let positive = members
                .iter()
                .filter(|r| r.sum_score() >= screening_cutoff)
                .count();

            GroupSummary {
                group,
                label: self.group_label(group).to_string(),
                n,
                mean_sum_score: f64::from(sum) / n_f,
                category_counts: Item::ALL.map(|item| self.category_counts(item, Some(group))),
                elevated_rate,
                screen_positive_rate: positive as f64 / n_f,
            }
        });

        DataSummary {
            n: self.len(),
            screening_cutoff,
            groups,
        }
    }
}

/// Descriptive statistics for one group
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    /// Group
    pub group: Group,
    /// Human-readable label
    pub label: String,
    /// Sample size
    pub n: usize,
    /// Mean sum score
    pub mean_sum_score: f64,
    /// Category frequencies per item
    pub category_counts: [[usize; N_CATEGORIES]; N_ITEMS],
    /// Share with response >= 2 per item
    pub elevated_rate: [f64; N_ITEMS],
    /// Share with sum score at or above the screening cutoff
    pub screen_positive_rate: f64,
}

/// Descriptive statistics for both groups
#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    /// Total respondents
    pub n: usize,
    /// Sum-score cutoff used for screen positivity
    pub screening_cutoff: u32,
    /// Reference group first
    pub groups: [GroupSummary; 2],
}
