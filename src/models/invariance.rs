//! Invariance (anchor) sets
//!
//! The subset of items whose parameters are shared across groups. It fully
//! determines which multi-group model variant the estimator produces.

use itertools::Itertools;
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

use crate::models::types::{Item, N_ITEMS};

/// Minimum number of invariant items for a multi-group model to be identified
pub const MIN_INVARIANT_ITEMS: usize = 2;

/// Items constrained equal across groups, kept in questionnaire order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InvarianceSet {
    items: SmallVec<[Item; N_ITEMS]>,
}

impl InvarianceSet {
    /// All nine items invariant
    #[must_use]
    pub fn all() -> Self {
        Self::from_items(Item::ALL)
    }

    /// Only the two core symptoms invariant
    #[must_use]
    pub fn core() -> Self {
        Self::from_items(Item::CORE)
    }

    /// All items except `released`
    #[must_use]
    pub fn all_except(released: Item) -> Self {
        Self::from_items(Item::ALL.into_iter().filter(|&i| i != released))
    }

    /// Build from any collection of items; duplicates are dropped
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut items: SmallVec<[Item; N_ITEMS]> = items.into_iter().collect();
        items.sort_unstable();
        items.dedup();
        Self { items }
    }

    /// Whether an item is invariant
    #[must_use]
    pub fn contains(&self, item: Item) -> bool {
        self.items.contains(&item)
    }

    /// Number of invariant items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no item is invariant
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Invariant items
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Items with group-specific parameters
    #[must_use]
    pub fn free_items(&self) -> Vec<Item> {
        Item::ALL
            .into_iter()
            .filter(|&i| !self.contains(i))
            .collect()
    }

    /// Whether enough items are shared to identify the group scale
    #[must_use]
    pub fn is_identified(&self) -> bool {
        self.len() >= MIN_INVARIANT_ITEMS
    }
}

impl fmt::Display for InvarianceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.len() == N_ITEMS {
            return f.write_str("all items");
        }
        write!(f, "{{{}}}", self.items.iter().map(|i| i.code()).join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_construction() {
        let all = InvarianceSet::all();
        assert_eq!(all.len(), 9);
        assert!(all.free_items().is_empty());
        assert_eq!(all.to_string(), "all items");

        let released = InvarianceSet::all_except(Item::Sleep);
        assert_eq!(released.len(), 8);
        assert_eq!(released.free_items(), vec![Item::Sleep]);

        let core = InvarianceSet::core();
        assert!(core.is_identified());
        assert_eq!(core.to_string(), "{phq1, phq2}");

        let single = InvarianceSet::from_items([Item::Fatigue, Item::Fatigue]);
        assert_eq!(single.len(), 1);
        assert!(!single.is_identified());
    }
}
