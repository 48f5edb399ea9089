//! A generator for models that are already given explicitly, e.g., read from
//! `.tra` files.
//!
//! States are identified by their index, stored in the smallest number of bits
//! that can hold the largest index.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    builder::rewards::RewardModelInformation,
    error::{BuildError, BuildResult},
    linalg::fields::PseudoField,
    models::{DEADLOCK_LABEL, INIT_LABEL, ModelType, StateLabeling},
    storage::{BitVectorHashMap, CompressedState},
};

use super::{
    Choice, NextStateGenerator, StateBehavior, StateId, StateToId, label_states,
    variables::{Valuation, Value},
};

/// A choice of an explicit model: an optional action label and weighted successors.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplicitChoice<F> {
    pub label: Option<String>,
    pub transitions: Vec<(usize, F)>,
}

impl<F> ExplicitChoice<F> {
    pub fn new(transitions: Vec<(usize, F)>) -> Self {
        Self {
            label: None,
            transitions,
        }
    }
}

/// An explicitly given model.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplicitModel<F> {
    pub model_type: ModelType,
    pub initial_states: Vec<usize>,
    /// The choices of every state.
    pub choices: Vec<Vec<ExplicitChoice<F>>>,
    pub labels: BTreeMap<String, BTreeSet<usize>>,
    pub state_rewards: BTreeMap<String, Vec<F>>,
}

impl<F: PseudoField> ExplicitModel<F> {
    pub fn new(model_type: ModelType, state_count: usize) -> Self {
        Self {
            model_type,
            initial_states: Vec::new(),
            choices: vec![Vec::new(); state_count],
            labels: BTreeMap::new(),
            state_rewards: BTreeMap::new(),
        }
    }

    pub fn state_count(&self) -> usize {
        self.choices.len()
    }

    fn check(&self) -> BuildResult<()> {
        if !matches!(
            self.model_type,
            ModelType::Dtmc | ModelType::Ctmc | ModelType::Mdp
        ) {
            return Err(BuildError::UnsupportedModelType(self.model_type.to_string()));
        }
        let states = self.state_count();
        let out_of_range = |state: &usize| *state >= states;
        if self.initial_states.iter().any(out_of_range) {
            return Err(BuildError::WrongFormat("Initial state out of range.".to_owned()));
        }
        for (state, choices) in self.choices.iter().enumerate() {
            if choices.len() > 1 && self.model_type != ModelType::Mdp {
                return Err(BuildError::WrongFormat(format!(
                    "State {state} of a {} has {} choices.",
                    self.model_type,
                    choices.len()
                )));
            }
            let mut targets = choices
                .iter()
                .flat_map(|choice| choice.transitions.iter().map(|(target, _)| target));
            if let Some(target) = targets.find(|target| out_of_range(*target)) {
                return Err(BuildError::WrongFormat(format!(
                    "Transition from state {state} to state {target} out of range."
                )));
            }
        }
        for (name, states) in &self.labels {
            if name == INIT_LABEL || name == DEADLOCK_LABEL {
                return Err(BuildError::WrongFormat(format!(
                    "The label '{name}' is reserved."
                )));
            }
            if states.iter().any(out_of_range) {
                return Err(BuildError::WrongFormat(format!(
                    "Label '{name}' refers to a state out of range."
                )));
            }
        }
        for (name, rewards) in &self.state_rewards {
            if rewards.len() != states {
                return Err(BuildError::WrongFormat(format!(
                    "Reward model '{name}' has {} entries for {states} states.",
                    rewards.len()
                )));
            }
        }
        Ok(())
    }
}

/// Explores an [`ExplicitModel`].
pub struct ExplicitGenerator<F> {
    model: ExplicitModel<F>,
    bit_width: usize,
    state_size: usize,
    current: usize,
}

impl<F: PseudoField> ExplicitGenerator<F> {
    pub fn new(model: ExplicitModel<F>) -> BuildResult<Self> {
        model.check()?;
        let largest = model.state_count().saturating_sub(1) as u64;
        let bit_width = ((u64::BITS - largest.leading_zeros()) as usize).max(1);
        Ok(Self {
            model,
            bit_width,
            state_size: bit_width.div_ceil(64) * 64,
            current: 0,
        })
    }

    pub fn model(&self) -> &ExplicitModel<F> {
        &self.model
    }

    fn encode(&self, index: usize) -> CompressedState {
        let mut state = CompressedState::new(self.state_size);
        state.set_from_int(0, self.bit_width, index as u64);
        state
    }

    fn decode(&self, state: &CompressedState) -> usize {
        state.get_as_int(0, self.bit_width) as usize
    }
}

impl<F: PseudoField> NextStateGenerator<F> for ExplicitGenerator<F> {
    fn state_size(&self) -> usize {
        self.state_size
    }

    fn model_type(&self) -> ModelType {
        self.model.model_type
    }

    fn initial_states(&mut self, resolver: &mut StateToId<'_>) -> BuildResult<Vec<StateId>> {
        let mut ids = self
            .model
            .initial_states
            .iter()
            .map(|index| resolver(&self.encode(*index)))
            .collect::<BuildResult<Vec<_>>>()?;
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn load(&mut self, state: &CompressedState) {
        self.current = self.decode(state);
    }

    fn expand(&mut self, resolver: &mut StateToId<'_>) -> BuildResult<StateBehavior<F>> {
        let mut behavior = StateBehavior::new();
        for rewards in self.model.state_rewards.values() {
            behavior.add_state_reward(rewards[self.current].clone());
        }
        behavior.set_expanded();

        for (index, explicit) in self.model.choices[self.current].iter().enumerate() {
            let mut choice = Choice::new(None, false);
            if let Some(label) = &explicit.label {
                choice.add_label(label.clone());
            }
            choice.add_origin_data(BTreeSet::from([index]));
            for (target, value) in &explicit.transitions {
                choice.add_probability(resolver(&self.encode(*target))?, value.clone());
            }
            behavior.add_choice(choice);
        }
        Ok(behavior)
    }

    fn number_of_reward_models(&self) -> usize {
        self.model.state_rewards.len()
    }

    fn reward_model_information(&self, index: usize) -> RewardModelInformation {
        let name = self
            .model
            .state_rewards
            .keys()
            .nth(index)
            .expect("Reward model index out of range.");
        RewardModelInformation::new(name.clone(), true, false)
    }

    fn label(
        &self,
        states: &BitVectorHashMap<StateId>,
        initial_states: &[StateId],
        deadlock_states: &[StateId],
    ) -> BuildResult<StateLabeling> {
        let predicates: Vec<(&str, Box<dyn Fn(&CompressedState) -> bool + '_>)> = self
            .model
            .labels
            .iter()
            .map(|(name, members)| {
                let predicate: Box<dyn Fn(&CompressedState) -> bool + '_> =
                    Box::new(move |state: &CompressedState| members.contains(&self.decode(state)));
                (name.as_str(), predicate)
            })
            .collect();
        Ok(label_states(
            states,
            initial_states,
            deadlock_states,
            predicates
                .iter()
                .map(|(name, predicate)| (*name, &**predicate)),
        ))
    }

    fn to_valuation(&self, state: &CompressedState) -> Valuation {
        Valuation::new(vec![(
            "state".to_string(),
            Value::Int(self.decode(state) as i64),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::fields::float64::Float64;

    #[test]
    fn test_encoding() {
        let model = ExplicitModel::<Float64>::new(ModelType::Dtmc, 300);
        let generator = ExplicitGenerator::new(model).unwrap();
        assert_eq!(generator.bit_width, 9);
        assert_eq!(generator.state_size(), 64);
        assert_eq!(generator.decode(&generator.encode(299)), 299);
        assert_eq!(generator.to_valuation(&generator.encode(7)).to_string(), "state=7");
    }

    #[test]
    fn test_checks() {
        let mut model = ExplicitModel::<Float64>::new(ModelType::Dtmc, 2);
        model.choices[0].push(ExplicitChoice::new(vec![(2, Float64::from(1.0))]));
        assert!(matches!(ExplicitGenerator::new(model), Err(BuildError::WrongFormat(_))));

        let mut model = ExplicitModel::<Float64>::new(ModelType::Ctmc, 1);
        model.choices[0].push(ExplicitChoice::new(vec![(0, Float64::from(1.0))]));
        model.choices[0].push(ExplicitChoice::new(vec![(0, Float64::from(1.0))]));
        assert!(matches!(ExplicitGenerator::new(model), Err(BuildError::WrongFormat(_))));

        let mut model = ExplicitModel::<Float64>::new(ModelType::Dtmc, 1);
        model.labels.insert("init".to_owned(), BTreeSet::from([0]));
        assert!(matches!(ExplicitGenerator::new(model), Err(BuildError::WrongFormat(_))));

        let model = ExplicitModel::<Float64>::new(ModelType::Gsmp, 1);
        assert!(matches!(
            ExplicitGenerator::new(model),
            Err(BuildError::UnsupportedModelType(_))
        ));
    }
}
