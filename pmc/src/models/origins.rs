use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

/// Links every choice to the set of commands it originates from.
///
/// Choices with equal command sets share one identifier. Identifier 0 is reserved
/// for choices without origin, e.g., synthesized self-loops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceOrigins {
    identifiers: Vec<usize>,
    identifier_info: Vec<BTreeSet<usize>>,
    command_names: Vec<String>,
}

impl ChoiceOrigins {
    pub fn from_command_sets(
        data: Vec<Option<BTreeSet<usize>>>,
        command_names: Vec<String>,
    ) -> Self {
        let mut identifier_info = vec![BTreeSet::new()];
        let mut known: BTreeMap<BTreeSet<usize>, usize> = BTreeMap::new();
        known.insert(BTreeSet::new(), 0);

        let identifiers = data
            .into_iter()
            .map(|commands| {
                let commands = commands.unwrap_or_default();
                *known.entry(commands.clone()).or_insert_with(|| {
                    identifier_info.push(commands);
                    identifier_info.len() - 1
                })
            })
            .collect();

        Self {
            identifiers,
            identifier_info,
            command_names,
        }
    }

    pub fn number_of_choices(&self) -> usize {
        self.identifiers.len()
    }

    pub fn number_of_identifiers(&self) -> usize {
        self.identifier_info.len()
    }

    pub fn identifier(&self, choice: usize) -> usize {
        self.identifiers[choice]
    }

    pub fn commands(&self, choice: usize) -> &BTreeSet<usize> {
        &self.identifier_info[self.identifiers[choice]]
    }

    /// A readable description of the origin of a choice.
    pub fn choice_info(&self, choice: usize) -> String {
        let commands = self.commands(choice);
        if commands.is_empty() {
            return "No origin".to_string();
        }
        commands
            .iter()
            .map(|command| {
                self.command_names
                    .get(*command)
                    .cloned()
                    .unwrap_or_else(|| format!("command {command}"))
            })
            .join(" || ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_are_shared() {
        let origins = ChoiceOrigins::from_command_sets(
            vec![
                Some(BTreeSet::from([1])),
                None,
                Some(BTreeSet::from([0, 1])),
                Some(BTreeSet::from([1])),
            ],
            vec!["flip".to_string(), "stay".to_string()],
        );
        assert_eq!(origins.number_of_choices(), 4);
        assert_eq!(origins.number_of_identifiers(), 3);
        assert_eq!(origins.identifier(0), origins.identifier(3));
        assert_eq!(origins.identifier(1), 0);
        assert_eq!(origins.choice_info(2), "flip || stay");
        assert_eq!(origins.choice_info(1), "No origin");
    }
}
