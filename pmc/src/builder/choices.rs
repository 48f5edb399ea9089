use std::collections::{BTreeMap, BTreeSet};

use crate::{models::ChoiceLabeling, storage::BitVector};

/// Collects labels and origins of choices while the state space is explored.
#[derive(Debug, Default)]
pub struct ChoiceInformationBuilder {
    labels: BTreeMap<String, Vec<usize>>,
    origin_data: Vec<Option<BTreeSet<usize>>>,
}

impl ChoiceInformationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_label(&mut self, label: &str, row: usize) {
        self.labels.entry(label.to_string()).or_default().push(row);
    }

    pub fn add_origin_data(&mut self, data: BTreeSet<usize>, row: usize) {
        if self.origin_data.len() <= row {
            self.origin_data.resize(row + 1, None);
        }
        self.origin_data[row] = Some(data);
    }

    pub fn build_choice_labeling(self, row_count: usize) -> ChoiceLabeling {
        let mut labeling = ChoiceLabeling::new(row_count);
        for (label, rows) in self.labels {
            labeling.add_label_with_items(label, BitVector::from_indices(row_count, rows));
        }
        labeling
    }

    /// The origin data of every row; rows without origin map to `None`.
    pub fn build_data_of_choice_origins(
        &mut self,
        row_count: usize,
    ) -> Vec<Option<BTreeSet<usize>>> {
        let mut data = std::mem::take(&mut self.origin_data);
        data.resize(row_count, None);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_information() {
        let mut builder = ChoiceInformationBuilder::new();
        builder.add_label("flip", 0);
        builder.add_label("flip", 2);
        builder.add_origin_data(BTreeSet::from([4]), 1);

        let origins = builder.build_data_of_choice_origins(3);
        assert_eq!(origins, vec![None, Some(BTreeSet::from([4])), None]);

        let labeling = builder.build_choice_labeling(3);
        assert!(labeling.item_has_label("flip", 2));
        assert!(!labeling.item_has_label("flip", 1));
    }
}
