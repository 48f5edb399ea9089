//! Labelings of states and choices.

use std::{collections::BTreeMap, fmt};

use crate::storage::BitVector;

/// The label of the initial states.
pub const INIT_LABEL: &str = "init";
/// The label of the deadlock states.
pub const DEADLOCK_LABEL: &str = "deadlock";

/// Assigns sets of labels to a fixed number of items (states or choices).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemLabeling {
    item_count: usize,
    labels: BTreeMap<String, BitVector>,
}

/// A labeling of states.
pub type StateLabeling = ItemLabeling;
/// A labeling of choices, i.e., matrix rows.
pub type ChoiceLabeling = ItemLabeling;

impl ItemLabeling {
    pub fn new(item_count: usize) -> Self {
        Self {
            item_count,
            labels: BTreeMap::new(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Adds a label without items. An existing label is kept.
    pub fn add_label(&mut self, label: impl Into<String>) {
        let item_count = self.item_count;
        self.labels
            .entry(label.into())
            .or_insert_with(|| BitVector::new(item_count));
    }

    /// Adds a label with the given items, replacing an existing one.
    ///
    /// # Panics
    ///
    /// Panics if the set does not have one bit per item.
    pub fn add_label_with_items(&mut self, label: impl Into<String>, items: BitVector) {
        assert!(
            items.len() == self.item_count,
            "Labeling of {} items cannot hold a set of size {}.",
            self.item_count,
            items.len()
        );
        self.labels.insert(label.into(), items);
    }

    /// Adds the label to the given item, creating the label if necessary.
    pub fn add_label_to_item(&mut self, label: &str, item: usize) {
        if !self.labels.contains_key(label) {
            self.add_label(label);
        }
        if let Some(items) = self.labels.get_mut(label) {
            items.set(item, true);
        }
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// The items carrying the label.
    pub fn items(&self, label: &str) -> Option<&BitVector> {
        self.labels.get(label)
    }

    pub fn item_has_label(&self, label: &str, item: usize) -> bool {
        self.labels.get(label).is_some_and(|items| items.get(item))
    }

    pub fn labels_of_item(&self, item: usize) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|(_, items)| items.get(item))
            .map(|(label, _)| label.as_str())
            .collect()
    }

    /// All label names in lexicographic order.
    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BitVector)> {
        self.labels
            .iter()
            .map(|(label, items)| (label.as_str(), items))
    }
}

impl fmt::Display for ItemLabeling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Labels: \t{}", self.labels.len())?;
        for (label, items) in &self.labels {
            writeln!(f, "   * {} -> {} item(s)", label, items.count_ones())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let mut labeling = StateLabeling::new(4);
        labeling.add_label(INIT_LABEL);
        labeling.add_label_to_item(INIT_LABEL, 0);
        labeling.add_label_to_item("goal", 3);
        labeling.add_label_to_item("goal", 0);

        assert!(labeling.contains_label("goal"));
        assert!(labeling.item_has_label("goal", 3));
        assert!(!labeling.item_has_label("goal", 1));
        assert!(!labeling.item_has_label("missing", 1));
        assert_eq!(labeling.labels_of_item(0), vec!["goal", INIT_LABEL]);
        assert_eq!(labeling.label_names().collect::<Vec<_>>(), vec!["goal", "init"]);
    }

    #[test]
    #[should_panic]
    fn test_wrong_set_size() {
        StateLabeling::new(2).add_label_with_items("a", BitVector::new(3));
    }
}
