//! Next-state generators.
//!
//! A generator knows the semantics of a model description. The
//! [`ExplicitModelBuilder`] drives it: it loads a compressed state, asks for the
//! behavior of that state and resolves every successor to a dense state id with a
//! callback that also schedules new states for exploration.
//!
//! [`ExplicitModelBuilder`]: crate::builder::ExplicitModelBuilder

pub mod explicit;
pub mod program;
pub mod variables;

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    builder::rewards::RewardModelInformation,
    error::BuildResult,
    linalg::fields::PseudoField,
    models::{ChoiceOrigins, DEADLOCK_LABEL, EventTable, INIT_LABEL, ModelType, StateLabeling},
    storage::{BitVectorHashMap, CompressedState},
};

use self::variables::Valuation;

/// Dense index of an explored state.
pub type StateId = usize;

/// Resolves a compressed state to its id, registering it if it is new.
pub type StateToId<'a> = dyn FnMut(&CompressedState) -> BuildResult<StateId> + 'a;

/// One choice of a state: a distribution over successors plus its annotations.
#[derive(Clone, Debug, PartialEq)]
pub struct Choice<F> {
    action_index: Option<usize>,
    markovian: bool,
    distribution: BTreeMap<StateId, F>,
    total_mass: F,
    labels: BTreeSet<String>,
    origin_data: Option<BTreeSet<usize>>,
    rewards: Vec<F>,
    event_names: Vec<String>,
}

impl<F: PseudoField> Choice<F> {
    pub fn new(action_index: Option<usize>, markovian: bool) -> Self {
        Self {
            action_index,
            markovian,
            distribution: BTreeMap::new(),
            total_mass: F::zero(),
            labels: BTreeSet::new(),
            origin_data: None,
            rewards: Vec::new(),
            event_names: Vec::new(),
        }
    }

    /// Adds probability (or rate) mass for a successor. Mass for a successor that is
    /// already present is accumulated.
    pub fn add_probability(&mut self, state: StateId, value: F) {
        self.total_mass.add_assign(&value);
        self.distribution
            .entry(state)
            .and_modify(|mass| mass.add_assign(&value))
            .or_insert(value);
    }

    pub fn action_index(&self) -> Option<usize> {
        self.action_index
    }

    pub fn is_markovian(&self) -> bool {
        self.markovian
    }

    pub fn total_mass(&self) -> &F {
        &self.total_mass
    }

    /// The distribution sorted by successor.
    pub fn iter(&self) -> impl Iterator<Item = (StateId, &F)> {
        self.distribution.iter().map(|(state, value)| (*state, value))
    }

    pub fn len(&self) -> usize {
        self.distribution.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distribution.is_empty()
    }

    pub fn add_label(&mut self, label: impl Into<String>) {
        self.labels.insert(label.into());
    }

    pub fn add_labels(&mut self, labels: impl IntoIterator<Item = String>) {
        self.labels.extend(labels);
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    /// Adds the origins of this choice, merging them with the known ones.
    pub fn add_origin_data(&mut self, data: BTreeSet<usize>) {
        match &mut self.origin_data {
            Some(known) => known.extend(data),
            None => self.origin_data = Some(data),
        }
    }

    pub fn origin_data(&self) -> Option<&BTreeSet<usize>> {
        self.origin_data.as_ref()
    }

    /// Appends the reward of the next reward model.
    pub fn add_reward(&mut self, value: F) {
        self.rewards.push(value);
    }

    pub fn rewards(&self) -> &[F] {
        &self.rewards
    }

    pub fn add_event(&mut self, name: impl Into<String>) {
        self.event_names.push(name.into());
    }

    pub fn event_names(&self) -> &[String] {
        &self.event_names
    }

    pub fn has_events(&self) -> bool {
        !self.event_names.is_empty()
    }

    pub fn has_multiple_events(&self) -> bool {
        self.event_names.len() > 1
    }

    /// Multiplies every successor mass by `factor`.
    pub fn scale(&mut self, factor: &F) {
        for value in self.distribution.values_mut() {
            value.mul_assign(factor);
        }
        self.total_mass.mul_assign(factor);
    }
}

/// The behavior of one state: its state rewards and choices.
#[derive(Clone, Debug, PartialEq)]
pub struct StateBehavior<F> {
    choices: Vec<Choice<F>>,
    state_rewards: Vec<F>,
    expanded: bool,
}

impl<F: PseudoField> Default for StateBehavior<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: PseudoField> StateBehavior<F> {
    pub fn new() -> Self {
        Self {
            choices: Vec::new(),
            state_rewards: Vec::new(),
            expanded: false,
        }
    }

    pub fn add_choice(&mut self, choice: Choice<F>) {
        self.choices.push(choice);
    }

    /// Appends the state reward of the next reward model.
    pub fn add_state_reward(&mut self, value: F) {
        self.state_rewards.push(value);
    }

    pub fn set_expanded(&mut self) {
        self.expanded = true;
    }

    /// Whether the generator looked at the outgoing behavior of the state. States
    /// that satisfy a terminal condition are not expanded.
    pub fn was_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn choices(&self) -> &[Choice<F>] {
        &self.choices
    }

    pub fn state_rewards(&self) -> &[F] {
        &self.state_rewards
    }
}

/// The semantics of a model, explored state by state.
pub trait NextStateGenerator<F: PseudoField> {
    /// The number of bits of every compressed state.
    fn state_size(&self) -> usize;

    fn model_type(&self) -> ModelType;

    /// Whether every state has at most one choice.
    fn is_deterministic_model(&self) -> bool {
        matches!(self.model_type(), ModelType::Dtmc | ModelType::Ctmc)
    }

    fn is_discrete_time_model(&self) -> bool {
        self.model_type().is_discrete_time()
    }

    /// Resolves all initial states and returns their ids.
    fn initial_states(&mut self, resolver: &mut StateToId<'_>) -> BuildResult<Vec<StateId>>;

    /// Makes the given state the one that is expanded next.
    fn load(&mut self, state: &CompressedState);

    /// Computes the behavior of the loaded state.
    fn expand(&mut self, resolver: &mut StateToId<'_>) -> BuildResult<StateBehavior<F>>;

    fn number_of_reward_models(&self) -> usize {
        0
    }

    /// # Panics
    ///
    /// Panics if there is no reward model with the given index.
    fn reward_model_information(&self, index: usize) -> RewardModelInformation;

    /// Labels all explored states.
    fn label(
        &self,
        states: &BitVectorHashMap<StateId>,
        initial_states: &[StateId],
        deadlock_states: &[StateId],
    ) -> BuildResult<StateLabeling>;

    fn to_valuation(&self, state: &CompressedState) -> Valuation;

    /// Turns the origin data of all choices into choice origins.
    fn generate_choice_origins(
        &self,
        _data: Vec<Option<BTreeSet<usize>>>,
    ) -> Option<ChoiceOrigins> {
        None
    }

    /// Registers the events of the model.
    fn map_events(&self, _events: &mut EventTable<F>) {}
}

/// Labels states by the given predicates and adds the initial and deadlock labels.
pub fn label_states<'a>(
    states: &BitVectorHashMap<StateId>,
    initial_states: &[StateId],
    deadlock_states: &[StateId],
    labels: impl IntoIterator<Item = (&'a str, &'a dyn Fn(&CompressedState) -> bool)>,
) -> StateLabeling {
    let mut labeling = StateLabeling::new(states.len());
    for (label, predicate) in labels {
        labeling.add_label(label);
        for (state, id) in states.iter() {
            if predicate(&state) {
                labeling.add_label_to_item(label, id);
            }
        }
    }

    labeling.add_label(INIT_LABEL);
    for id in initial_states {
        labeling.add_label_to_item(INIT_LABEL, *id);
    }
    labeling.add_label(DEADLOCK_LABEL);
    for id in deadlock_states {
        labeling.add_label_to_item(DEADLOCK_LABEL, *id);
    }
    labeling
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::fields::{FromRational, rational::Rational};

    #[test]
    fn test_choice_merges_successors() {
        let mut choice = Choice::new(None, false);
        choice.add_probability(2, Rational::from_rational("1", "4"));
        choice.add_probability(0, Rational::from_rational("1", "4"));
        choice.add_probability(2, Rational::from_rational("1", "2"));
        let entries: Vec<_> = choice.iter().map(|(state, value)| (state, value.clone())).collect();
        assert_eq!(
            entries,
            vec![
                (0, Rational::from_rational("1", "4")),
                (2, Rational::from_rational("3", "4"))
            ]
        );
        assert_eq!(choice.total_mass(), &Rational::from_rational("1", "1"));
        assert_eq!(choice.len(), 2);
    }

    #[test]
    fn test_origin_data_is_united() {
        let mut choice = Choice::<Rational>::new(Some(0), false);
        choice.add_origin_data(BTreeSet::from([1]));
        choice.add_origin_data(BTreeSet::from([3, 1]));
        assert_eq!(choice.origin_data(), Some(&BTreeSet::from([1, 3])));
    }

    #[test]
    fn test_label_states() {
        let mut states = BitVectorHashMap::new(64, 5, 0.75).unwrap();
        for value in 0..3u64 {
            let mut state = CompressedState::new(64);
            state.set_from_int(0, 2, value);
            states.find_or_add(&state, value as usize).unwrap();
        }
        let odd = |state: &CompressedState| state.get_as_int(0, 2) % 2 == 1;
        let odd: &dyn Fn(&CompressedState) -> bool = &odd;
        let labeling = label_states(&states, &[0], &[2], [("odd", odd)]);
        assert!(labeling.item_has_label("odd", 1));
        assert!(!labeling.item_has_label("odd", 2));
        assert!(labeling.item_has_label(INIT_LABEL, 0));
        assert!(labeling.item_has_label(DEADLOCK_LABEL, 2));
        assert_eq!(labeling.item_count(), 3);
    }
}
