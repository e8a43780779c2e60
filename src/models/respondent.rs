//! Respondent record
//!
//! One complete PHQ-9 questionnaire with its group membership.

use serde::{Deserialize, Serialize};

use crate::models::types::{ELEVATED_RESPONSE, Group, Item, MAX_RESPONSE, N_ITEMS};

/// A single respondent with all nine item responses present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Respondent {
    /// Responses in questionnaire order, each in 0..=3
    pub responses: [u8; N_ITEMS],
    /// Sample membership
    pub group: Group,
    /// Optional sampling weight carried from the harmonized dataset
    pub weight: Option<f64>,
}

impl Respondent {
    /// Create a respondent without a sampling weight
    #[must_use]
    pub const fn new(responses: [u8; N_ITEMS], group: Group) -> Self {
        Self {
            responses,
            group,
            weight: None,
        }
    }

    /// Response to one item
    #[must_use]
    pub const fn response(&self, item: Item) -> u8 {
        self.responses[item.index()]
    }

    /// Sum score (0..=27)
    #[must_use]
    pub fn sum_score(&self) -> u32 {
        self.responses.iter().map(|&r| u32::from(r)).sum()
    }

    /// Whether the item is endorsed at least "more than half the days"
    #[must_use]
    pub const fn elevated(&self, item: Item) -> bool {
        self.response(item) >= ELEVATED_RESPONSE
    }

    /// First item whose response falls outside 0..=3
    #[must_use]
    pub fn invalid_item(&self) -> Option<Item> {
        Item::ALL
            .into_iter()
            .find(|&item| self.response(item) > MAX_RESPONSE)
    }
}
