//! Normalized set of per-category option choices.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Option choices keyed by category name.
///
/// Only non-absence choices are kept: setting option 0 removes the category,
/// so two selections that encode to the same identifier compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, u32>", into = "BTreeMap<String, u32>")]
pub struct TraitSelection {
    options: BTreeMap<String, u32>,
}

impl TraitSelection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, category: impl Into<String>, option: u32) -> Self {
        self.set(category, option);
        self
    }

    /// Choose `option` for `category`. Option 0 clears the category.
    pub fn set(&mut self, category: impl Into<String>, option: u32) {
        let category = category.into();
        if option == 0 {
            self.options.remove(&category);
        } else {
            self.options.insert(category, option);
        }
    }

    /// Chosen option for a category, or `None` if absent.
    #[inline]
    pub fn get(&self, category: &str) -> Option<u32> {
        self.options.get(category).copied()
    }

    /// Iterate over `(category, option)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.options.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of non-absent categories.
    #[inline]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl From<BTreeMap<String, u32>> for TraitSelection {
    fn from(map: BTreeMap<String, u32>) -> Self {
        let mut selection = Self::new();
        for (category, option) in map {
            selection.set(category, option);
        }
        selection
    }
}

impl From<TraitSelection> for BTreeMap<String, u32> {
    fn from(selection: TraitSelection) -> Self {
        selection.options
    }
}

impl<K: Into<String>> FromIterator<(K, u32)> for TraitSelection {
    fn from_iter<I: IntoIterator<Item = (K, u32)>>(iter: I) -> Self {
        let mut selection = Self::new();
        for (category, option) in iter {
            selection.set(category, option);
        }
        selection
    }
}
