//! Construction of explicit sparse models from next-state generators.
//!
//! The [`ExplicitModelBuilder`] explores the reachable state space of a
//! [`NextStateGenerator`]. Every newly discovered state is given the next free id
//! and scheduled for exploration, either at the back of the frontier
//! (breadth-first) or at its front (depth-first). When a state is explored, its
//! choices become the rows of the next row group of the transition matrix.
//!
//! With breadth-first exploration states are explored in the order of their ids,
//! so row group $i$ belongs to state $i$. Depth-first exploration breaks this
//! property; the builder records which row group every state occupies and renames
//! all state ids accordingly once the exploration is finished.

pub mod choices;
pub mod rewards;
pub mod storage;

use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
    marker::PhantomData,
    time::Instant,
};

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::{
    error::{BuildError, BuildResult},
    generator::{Choice, NextStateGenerator, StateId, variables::Valuation},
    linalg::fields::PseudoField,
    models::{
        EventDistribution, EventTable, EventVariableInformation, GsmpEvents, ModelComponents,
        ModelType, SparseModel,
    },
    storage::{BitVector, CompressedState, SparseMatrixBuilder},
};

use self::{
    choices::ChoiceInformationBuilder, rewards::RewardModelBuilder, storage::StateStorage,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExplorationOrder {
    #[default]
    Bfs,
    Dfs,
}

impl fmt::Display for ExplorationOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplorationOrder::Bfs => write!(f, "breadth-first"),
            ExplorationOrder::Dfs => write!(f, "depth-first"),
        }
    }
}

/// Options of the [`ExplicitModelBuilder`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderOptions {
    pub exploration_order: ExplorationOrder,
    /// Adds self-loops to deadlock states instead of failing.
    pub fix_deadlocks: bool,
    pub build_state_valuations: bool,
    pub build_choice_labels: bool,
    pub build_choice_origins: bool,
    pub show_progress: bool,
    /// Seconds between two progress messages.
    pub progress_delay: u64,
    /// Load factor of the table of explored states.
    pub load_factor: f64,
    /// Number of buckets the table of explored states starts with.
    pub initial_capacity: usize,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            exploration_order: ExplorationOrder::Bfs,
            fix_deadlocks: true,
            build_state_valuations: false,
            build_choice_labels: true,
            build_choice_origins: false,
            show_progress: false,
            progress_delay: 5,
            load_factor: 0.75,
            initial_capacity: 4096,
        }
    }
}

/// The explored states together with the states that still have to be explored.
struct Exploration {
    order: ExplorationOrder,
    storage: StateStorage,
    frontier: VecDeque<CompressedState>,
    /// For depth-first exploration, the row group of every discovered state.
    remapping: Vec<StateId>,
}

impl Exploration {
    fn get_or_add_state_index(&mut self, state: &CompressedState) -> BuildResult<StateId> {
        let new_index = self.storage.number_of_states();
        let (index, _) = self
            .storage
            .state_to_id
            .find_or_add_and_get_bucket(state, new_index)?;
        if index == new_index {
            match self.order {
                ExplorationOrder::Bfs => self.frontier.push_back(state.clone()),
                ExplorationOrder::Dfs => {
                    self.frontier.push_front(state.clone());
                    self.remapping.push(0);
                }
            }
        }
        Ok(index)
    }
}

/// Per-row bookkeeping that is filled while the matrix is built.
struct Accumulators<F> {
    matrix: SparseMatrixBuilder<F>,
    rewards: Vec<RewardModelBuilder<F>>,
    choices: ChoiceInformationBuilder,
    markovian_states: Option<BitVector>,
    events: Option<GsmpEvents<F>>,
}

/// Builds explicit sparse models by exploring a generator's state space.
pub struct ExplicitModelBuilder<F, G> {
    generator: G,
    options: BuilderOptions,
    _field: PhantomData<F>,
}

impl<F: PseudoField, G: NextStateGenerator<F>> ExplicitModelBuilder<F, G> {
    pub fn new(generator: G, options: BuilderOptions) -> Self {
        Self {
            generator,
            options,
            _field: PhantomData,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Explores the generator and assembles the model.
    pub fn build(self) -> BuildResult<SparseModel<F>> {
        debug!("Exploration order is: {}.", self.options.exploration_order);
        let model_type = self.generator.model_type();
        let components = self.build_model_components()?;
        SparseModel::from_components(model_type, components)
    }

    /// Explores the generator and returns the components of the model.
    pub fn build_model_components(mut self) -> BuildResult<ModelComponents<F>> {
        let model_type = self.generator.model_type();
        let custom_row_grouping =
            !self.generator.is_deterministic_model() || model_type == ModelType::Gsmp;

        let mut accumulators = Accumulators {
            matrix: SparseMatrixBuilder::with_dimensions(0, 0, 0, false, custom_row_grouping, 0),
            rewards: (0..self.generator.number_of_reward_models())
                .map(|index| {
                    RewardModelBuilder::new(self.generator.reward_model_information(index))
                })
                .collect(),
            choices: ChoiceInformationBuilder::new(),
            markovian_states: (model_type == ModelType::MarkovAutomaton).then(|| BitVector::new(0)),
            events: (model_type == ModelType::Gsmp).then(|| {
                let mut table = EventTable::new();
                self.generator.map_events(&mut table);
                GsmpEvents::new(table)
            }),
        };

        let (storage, row_count) = self.build_matrices(&mut accumulators, custom_row_grouping)?;
        let state_count = storage.number_of_states();
        let Accumulators {
            matrix,
            rewards,
            mut choices,
            markovian_states,
            events,
        } = accumulators;

        let transition_matrix =
            matrix.build_with(Some(row_count), Some(state_count), Some(state_count));
        let state_labeling = self.generator.label(
            &storage.state_to_id,
            &storage.initial_state_indices,
            &storage.deadlock_state_indices,
        )?;

        let mut reward_models = BTreeMap::new();
        for builder in rewards {
            let name = builder.name().to_string();
            let model = builder.build(
                transition_matrix.row_count(),
                transition_matrix.column_count(),
                transition_matrix.row_group_count(),
            )?;
            reward_models.insert(name, model);
        }

        let mut components = ModelComponents::new(transition_matrix, state_labeling, reward_models);
        components.rate_transitions = !self.generator.is_discrete_time_model();
        components.markovian_states = markovian_states;
        components.events = events;

        if self.options.build_state_valuations {
            let mut valuations = vec![Valuation::default(); state_count];
            for (state, id) in storage.state_to_id.iter() {
                valuations[id] = self.generator.to_valuation(&state);
            }
            components.state_valuations = Some(valuations);
        }
        if self.options.build_choice_origins {
            let data = choices.build_data_of_choice_origins(row_count);
            components.choice_origins = self.generator.generate_choice_origins(data);
        }
        if self.options.build_choice_labels {
            components.choice_labeling = Some(choices.build_choice_labeling(row_count));
        }

        Ok(components)
    }

    fn build_matrices(
        &mut self,
        accumulators: &mut Accumulators<F>,
        custom_row_grouping: bool,
    ) -> BuildResult<(StateStorage, usize)> {
        let order = self.options.exploration_order;
        let mut exploration = Exploration {
            order,
            storage: StateStorage::new(
                self.generator.state_size(),
                self.options.initial_capacity,
                self.options.load_factor,
            )?,
            frontier: VecDeque::new(),
            remapping: Vec::new(),
        };

        let initial_states = self
            .generator
            .initial_states(&mut |state: &CompressedState| {
                exploration.get_or_add_state_index(state)
            })?;
        exploration.storage.initial_state_indices = initial_states;

        let mut current_row_group = 0;
        let mut current_row = 0;

        let start = Instant::now();
        let mut last_message = start;
        let mut explored_states: u64 = 0;
        let mut explored_since_last_message: u64 = 0;

        while let Some(current_state) = exploration.frontier.pop_front() {
            let current_index = exploration.storage.state_to_id.get_value(&current_state);
            if order == ExplorationOrder::Dfs {
                exploration.remapping[current_index] = current_row_group;
            }
            trace!("Exploring state with id {current_index}.");

            self.generator.load(&current_state);
            let behavior = self
                .generator
                .expand(&mut |state: &CompressedState| exploration.get_or_add_state_index(state))?;

            if behavior.is_empty() {
                if !self.options.fix_deadlocks && behavior.was_expanded() {
                    return Err(BuildError::DeadlockState {
                        valuation: self.generator.to_valuation(&current_state).to_string(),
                    });
                }
                if behavior.was_expanded() {
                    exploration.storage.deadlock_state_indices.push(current_index);
                }
                if let Some(markovian) = &mut accumulators.markovian_states {
                    markovian.grow(current_row_group + 1);
                    markovian.set(current_row_group, true);
                }
                if custom_row_grouping {
                    accumulators.matrix.new_row_group(current_row);
                }
                accumulators
                    .matrix
                    .add_next_value(current_row, current_index, F::one());

                if let Some(events) = &mut accumulators.events {
                    let name = format!("deadlock_event_{}", events.table.len());
                    let event = events
                        .table
                        .add(name, EventVariableInformation::exponential(F::one()));
                    events.add_occurrence(event, current_row_group, current_row);
                }

                for builder in &mut accumulators.rewards {
                    if builder.has_state_rewards() {
                        builder.add_state_reward(F::zero());
                    }
                    if builder.has_state_action_rewards() {
                        builder.add_state_action_reward(F::zero());
                    }
                }

                current_row += 1;
                current_row_group += 1;
            } else {
                for (builder, reward) in accumulators
                    .rewards
                    .iter_mut()
                    .zip(behavior.state_rewards())
                {
                    if builder.has_state_rewards() {
                        builder.add_state_reward(reward.clone());
                    }
                }

                if custom_row_grouping {
                    accumulators.matrix.new_row_group(current_row);
                }

                for choice in behavior.choices() {
                    self.add_choice(accumulators, choice, current_row_group, current_row)?;
                    current_row += 1;
                }
                current_row_group += 1;
            }

            if self.options.show_progress {
                explored_states += 1;
                explored_since_last_message += 1;

                let now = Instant::now();
                let since_last_message = now.duration_since(last_message).as_secs();
                if since_last_message >= self.options.progress_delay {
                    info!(
                        "Explored {} states in {} seconds (currently {} states per second).",
                        explored_states,
                        now.duration_since(start).as_secs(),
                        explored_since_last_message / since_last_message.max(1)
                    );
                    last_message = now;
                    explored_since_last_message = 0;
                }
            }
        }

        if let Some(markovian) = &mut accumulators.markovian_states {
            markovian.resize(current_row_group);
        }

        if order == ExplorationOrder::Dfs {
            let remapping = std::mem::take(&mut exploration.remapping);
            check_bijection(&remapping, exploration.storage.number_of_states())?;
            accumulators.matrix.replace_columns(&remapping, 0);
            exploration.storage.remap(&remapping);
        }

        debug!(
            "Explored {} states with {} choices.",
            exploration.storage.number_of_states(),
            current_row
        );
        Ok((exploration.storage, current_row))
    }

    fn add_choice(
        &self,
        accumulators: &mut Accumulators<F>,
        choice: &Choice<F>,
        row_group: usize,
        row: usize,
    ) -> BuildResult<()> {
        if self.options.build_choice_labels {
            for label in choice.labels() {
                accumulators.choices.add_label(label, row);
            }
        }
        if self.options.build_choice_origins {
            if let Some(data) = choice.origin_data() {
                accumulators.choices.add_origin_data(data.clone(), row);
            }
        }

        if choice.is_markovian() {
            if let Some(markovian) = &mut accumulators.markovian_states {
                markovian.grow(row_group + 1);
                markovian.set(row_group, true);
            }
        }

        for (state, value) in choice.iter() {
            accumulators.matrix.add_next_value(row, state, value.clone());
        }

        if choice.has_events() {
            if let Some(events) = &mut accumulators.events {
                let event = resolve_event(&mut events.table, choice.event_names())?;
                events.add_occurrence(event, row_group, row);
            }
        }

        for (builder, reward) in accumulators.rewards.iter_mut().zip(choice.rewards()) {
            if builder.has_state_action_rewards() {
                builder.add_state_action_reward(reward.clone());
            }
        }
        Ok(())
    }
}

fn event_id<F: PseudoField>(table: &EventTable<F>, name: &str) -> BuildResult<usize> {
    table
        .id(name)
        .ok_or_else(|| BuildError::WrongFormat(format!("Event '{name}' is not known.")))
}

/// Finds the event of a choice. Several exponential events are fused into a single
/// one whose rate is the product of their rates.
fn resolve_event<F: PseudoField>(
    table: &mut EventTable<F>,
    names: &[String],
) -> BuildResult<usize> {
    if let [name] = names {
        return event_id(table, name);
    }

    let mut rate = F::one();
    for name in names {
        let event = table.get(event_id(table, name)?);
        if event.distribution() != EventDistribution::Exp {
            return Err(BuildError::WrongFormat(format!(
                "Invalid GSMP operation, non-exponential event '{name}' fusing with exponential events."
            )));
        }
        rate.mul_assign(event.rate());
    }

    let fused = names.join(" X ");
    Ok(match table.id(&fused) {
        Some(id) => id,
        None => table.add(fused, EventVariableInformation::exponential(rate)),
    })
}

/// Checks that `remapping` is a permutation of `0..state_count`.
fn check_bijection(remapping: &[StateId], state_count: usize) -> BuildResult<()> {
    if remapping.len() != state_count {
        return Err(BuildError::InconsistentRemapping {
            reason: format!(
                "{} row groups for {} states",
                remapping.len(),
                state_count
            ),
        });
    }
    let mut hit = BitVector::new(state_count);
    for (state, row_group) in remapping.iter().enumerate() {
        if *row_group >= state_count || hit.get(*row_group) {
            return Err(BuildError::InconsistentRemapping {
                reason: format!("state {state} is mapped to row group {row_group}"),
            });
        }
        hit.set(*row_group, true);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::fields::float64::Float64;

    #[test]
    fn test_options_from_json() {
        let json = r#"{ "exploration_order": "dfs", "fix_deadlocks": false }"#;
        let options: BuilderOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.exploration_order, ExplorationOrder::Dfs);
        assert!(!options.fix_deadlocks);
        assert_eq!(options.load_factor, 0.75);
        assert!(options.build_choice_labels);
    }

    #[test]
    fn test_check_bijection() {
        assert!(check_bijection(&[1, 2, 0], 3).is_ok());
        assert!(matches!(
            check_bijection(&[1, 1, 0], 3),
            Err(BuildError::InconsistentRemapping { .. })
        ));
        assert!(check_bijection(&[0, 3, 1], 3).is_err());
        assert!(check_bijection(&[0], 3).is_err());
    }

    #[test]
    fn test_resolve_event() {
        let mut table = EventTable::new();
        table.add("a", EventVariableInformation::exponential(Float64::from(2.0)));
        table.add("b", EventVariableInformation::exponential(Float64::from(3.0)));
        table.add(
            "d",
            EventVariableInformation::new(EventDistribution::Dirac, Float64::from(1.0)),
        );

        assert_eq!(resolve_event(&mut table, &["b".to_string()]).unwrap(), 1);
        let fused = resolve_event(&mut table, &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(fused, 3);
        assert_eq!(table.id("a X b"), Some(3));
        assert_eq!(table.get(fused).rate(), &Float64::from(6.0));
        assert_eq!(
            resolve_event(&mut table, &["a".to_string(), "b".to_string()]).unwrap(),
            3
        );
        assert!(matches!(
            resolve_event(&mut table, &["a".to_string(), "d".to_string()]),
            Err(BuildError::WrongFormat(_))
        ));
        assert!(matches!(
            resolve_event(&mut table, &["x".to_string()]),
            Err(BuildError::WrongFormat(_))
        ));
    }
}
