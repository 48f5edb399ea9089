//! Explicit sparse models as produced by the [`ExplicitModelBuilder`].
//!
//! A [`SparseModel`] is assembled from [`ModelComponents`] and a [`ModelType`].
//! Assembly validates the components: probabilistic rows must be distributions and
//! every model type must come with the components it needs, e.g., the Markovian
//! states of a Markov automaton.
//!
//! [`ExplicitModelBuilder`]: crate::builder::ExplicitModelBuilder

pub mod events;
pub mod labeling;
pub mod origins;
pub mod rewards;

use std::{collections::BTreeMap, fmt};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{BuildError, BuildResult},
    generator::variables::Valuation,
    linalg::fields::PseudoField,
    storage::{BitVector, SparseMatrix},
};

pub use self::{
    events::{EventDistribution, EventTable, EventVariableInformation, GsmpEvents},
    labeling::{ChoiceLabeling, DEADLOCK_LABEL, INIT_LABEL, ItemLabeling, StateLabeling},
    origins::ChoiceOrigins,
    rewards::StandardRewardModel,
};

/// Tolerance for rows that have to sum up to one.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelType {
    Dtmc,
    Ctmc,
    Mdp,
    MarkovAutomaton,
    Gsmp,
}

impl ModelType {
    pub fn is_discrete_time(&self) -> bool {
        matches!(self, ModelType::Dtmc | ModelType::Mdp)
    }

    pub fn is_nondeterministic(&self) -> bool {
        matches!(self, ModelType::Mdp | ModelType::MarkovAutomaton)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelType::Dtmc => "DTMC",
            ModelType::Ctmc => "CTMC",
            ModelType::Mdp => "MDP",
            ModelType::MarkovAutomaton => "Markov Automaton",
            ModelType::Gsmp => "GSMP",
        };
        write!(f, "{name}")
    }
}

/// The parts a [`SparseModel`] is assembled from.
#[derive(Clone, Debug)]
pub struct ModelComponents<F> {
    pub transition_matrix: SparseMatrix<F>,
    pub state_labeling: StateLabeling,
    pub reward_models: BTreeMap<String, StandardRewardModel<F>>,
    /// Whether the values of (Markovian) rows are rates rather than probabilities.
    pub rate_transitions: bool,
    pub markovian_states: Option<BitVector>,
    pub choice_labeling: Option<ChoiceLabeling>,
    pub state_valuations: Option<Vec<Valuation>>,
    pub choice_origins: Option<ChoiceOrigins>,
    pub events: Option<GsmpEvents<F>>,
}

impl<F> ModelComponents<F> {
    pub fn new(
        transition_matrix: SparseMatrix<F>,
        state_labeling: StateLabeling,
        reward_models: BTreeMap<String, StandardRewardModel<F>>,
    ) -> Self {
        Self {
            transition_matrix,
            state_labeling,
            reward_models,
            rate_transitions: false,
            markovian_states: None,
            choice_labeling: None,
            state_valuations: None,
            choice_origins: None,
            events: None,
        }
    }
}

/// An explicit model with its transitions in a sparse matrix.
#[derive(Clone, Debug)]
pub struct SparseModel<F> {
    model_type: ModelType,
    transition_matrix: SparseMatrix<F>,
    labeling: StateLabeling,
    reward_models: BTreeMap<String, StandardRewardModel<F>>,
    markovian_states: Option<BitVector>,
    exit_rates: Option<Vec<F>>,
    choice_labeling: Option<ChoiceLabeling>,
    state_valuations: Option<Vec<Valuation>>,
    choice_origins: Option<ChoiceOrigins>,
    events: Option<GsmpEvents<F>>,
}

impl<F: PseudoField> SparseModel<F> {
    /// Assembles and validates a model of the given type.
    pub fn from_components(
        model_type: ModelType,
        components: ModelComponents<F>,
    ) -> BuildResult<Self> {
        let ModelComponents {
            mut transition_matrix,
            state_labeling,
            reward_models,
            rate_transitions,
            markovian_states,
            choice_labeling,
            state_valuations,
            choice_origins,
            events,
        } = components;

        check_dimensions(&transition_matrix, &state_labeling, &reward_models)?;
        check_non_negative(&transition_matrix)?;

        let mut exit_rates = None;
        match model_type {
            ModelType::Dtmc | ModelType::Mdp => {
                check_distributions(&transition_matrix, 0..transition_matrix.row_count())?;
            }
            ModelType::Ctmc => {
                exit_rates = Some(
                    (0..transition_matrix.row_count())
                        .map(|row| transition_matrix.row_sum(row))
                        .collect(),
                );
            }
            ModelType::MarkovAutomaton => {
                let markovian = markovian_states
                    .as_ref()
                    .ok_or(BuildError::MissingComponent("Markovian states"))?;
                let state_count = transition_matrix.row_group_count();
                let probabilistic_rows = (0..state_count)
                    .flat_map(|state| {
                        let mut rows = transition_matrix.row_group(state);
                        if markovian.len() > state && markovian.get(state) {
                            rows.next();
                        }
                        rows
                    })
                    .collect::<Vec<_>>();
                check_distributions(&transition_matrix, probabilistic_rows)?;

                let rates = (0..state_count)
                    .map(|state| {
                        if markovian.len() > state && markovian.get(state) {
                            let row = transition_matrix.row_group(state).start;
                            transition_matrix.row_sum(row)
                        } else {
                            F::zero()
                        }
                    })
                    .collect::<Vec<_>>();
                if rate_transitions {
                    for (state, rate) in rates.iter().enumerate() {
                        if !rate.is_zero() {
                            let row = transition_matrix.row_group(state).start;
                            transition_matrix.divide_row(row, rate);
                        }
                    }
                }
                exit_rates = Some(rates);
            }
            ModelType::Gsmp => {
                if events.is_none() {
                    return Err(BuildError::MissingComponent("GSMP events"));
                }
            }
        }

        debug!(
            "Assembled {} with {} states and {} transitions.",
            model_type,
            transition_matrix.row_group_count(),
            transition_matrix.entry_count()
        );

        Ok(Self {
            model_type,
            transition_matrix,
            labeling: state_labeling,
            reward_models,
            markovian_states,
            exit_rates,
            choice_labeling,
            state_valuations,
            choice_origins,
            events,
        })
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn number_of_states(&self) -> usize {
        self.transition_matrix.row_group_count()
    }

    pub fn number_of_transitions(&self) -> usize {
        self.transition_matrix.nonzero_entry_count()
    }

    pub fn number_of_choices(&self) -> usize {
        self.transition_matrix.row_count()
    }

    pub fn initial_states(&self) -> BitVector {
        self.states_with(INIT_LABEL)
    }

    pub fn deadlock_states(&self) -> BitVector {
        self.states_with(DEADLOCK_LABEL)
    }

    fn states_with(&self, label: &str) -> BitVector {
        self.labeling
            .items(label)
            .cloned()
            .unwrap_or_else(|| BitVector::new(self.number_of_states()))
    }

    pub fn transition_matrix(&self) -> &SparseMatrix<F> {
        &self.transition_matrix
    }

    pub fn labeling(&self) -> &StateLabeling {
        &self.labeling
    }

    pub fn reward_model(&self, name: &str) -> Option<&StandardRewardModel<F>> {
        self.reward_models.get(name)
    }

    pub fn reward_models(&self) -> &BTreeMap<String, StandardRewardModel<F>> {
        &self.reward_models
    }

    pub fn markovian_states(&self) -> Option<&BitVector> {
        self.markovian_states.as_ref()
    }

    pub fn exit_rates(&self) -> Option<&[F]> {
        self.exit_rates.as_deref()
    }

    pub fn choice_labeling(&self) -> Option<&ChoiceLabeling> {
        self.choice_labeling.as_ref()
    }

    pub fn state_valuations(&self) -> Option<&[Valuation]> {
        self.state_valuations.as_deref()
    }

    pub fn choice_origins(&self) -> Option<&ChoiceOrigins> {
        self.choice_origins.as_ref()
    }

    pub fn events(&self) -> Option<&GsmpEvents<F>> {
        self.events.as_ref()
    }

    pub fn is_discrete_time(&self) -> bool {
        self.model_type.is_discrete_time()
    }

    pub fn is_nondeterministic(&self) -> bool {
        self.model_type.is_nondeterministic()
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events
            .as_ref()
            .is_some_and(|events| events.table.id(name).is_some())
    }

    /// The transitions triggered by the named event, with one row per state. States
    /// in which the event is not enabled have an empty row. Returns `None` for
    /// unknown events.
    pub fn transition_matrix_for_event(&self, name: &str) -> Option<SparseMatrix<F>> {
        let events = self.events.as_ref()?;
        let id = events.table.id(name)?;
        let selection = events
            .event_to_states
            .get(&id)
            .into_iter()
            .flat_map(|states| states.iter().map(|(state, row)| (*state, *row)));
        Some(
            self.transition_matrix
                .submatrix_rows(selection, self.number_of_states()),
        )
    }
}

fn check_dimensions<F: PseudoField>(
    matrix: &SparseMatrix<F>,
    labeling: &StateLabeling,
    reward_models: &BTreeMap<String, StandardRewardModel<F>>,
) -> BuildResult<()> {
    let states = matrix.row_group_count();
    if labeling.item_count() != states {
        return Err(BuildError::WrongFormat(format!(
            "State labeling covers {} states, but the model has {}.",
            labeling.item_count(),
            states
        )));
    }
    for (name, model) in reward_models {
        let state_rewards_fit = model.state_rewards().is_none_or(|r| r.len() == states);
        let action_rewards_fit = model
            .state_action_rewards()
            .is_none_or(|r| r.len() == matrix.row_count());
        if !state_rewards_fit || !action_rewards_fit {
            return Err(BuildError::WrongFormat(format!(
                "Reward model '{name}' does not match the dimensions of the model."
            )));
        }
    }
    Ok(())
}

fn check_non_negative<F: PseudoField>(matrix: &SparseMatrix<F>) -> BuildResult<()> {
    match matrix.entries().find(|(_, entry)| *entry.value() < F::zero()) {
        Some((row, entry)) => Err(BuildError::WrongFormat(format!(
            "Negative value {} in row {row} and column {}.",
            entry.value(),
            entry.column()
        ))),
        None => Ok(()),
    }
}

fn check_distributions<F: PseudoField>(
    matrix: &SparseMatrix<F>,
    rows: impl IntoIterator<Item = usize>,
) -> BuildResult<()> {
    for row in rows {
        let sum = matrix.row_sum(row);
        if !sum.is_close(&F::one(), DISTRIBUTION_TOLERANCE) {
            return Err(BuildError::InvalidDistribution {
                row,
                sum: sum.to_string(),
            });
        }
    }
    Ok(())
}

impl<F: PseudoField> fmt::Display for SparseModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(62);
        writeln!(f, "{rule}")?;
        writeln!(f, "Model type: \t{} (sparse)", self.model_type)?;
        writeln!(f, "States: \t{}", self.number_of_states())?;
        writeln!(f, "Transitions: \t{}", self.number_of_transitions())?;
        if self.is_nondeterministic() || self.model_type == ModelType::Gsmp {
            writeln!(f, "Choices: \t{}", self.number_of_choices())?;
        }
        if let Some(markovian) = &self.markovian_states {
            writeln!(f, "Markovian St.: \t{}", markovian.count_ones())?;
        }
        if let Some(events) = &self.events {
            writeln!(f, "Events: \t{}", events.table.len())?;
            for (name, event) in events.table.iter() {
                writeln!(f, "   * {name} = {event}")?;
            }
        }
        if self.reward_models.is_empty() {
            writeln!(f, "Reward Models:  none")?;
        } else {
            let names: Vec<&str> = self.reward_models.keys().map(String::as_str).collect();
            writeln!(f, "Reward Models:  {}", names.join(", "))?;
        }
        write!(f, "State {}", self.labeling)?;
        match &self.choice_labeling {
            Some(labeling) => write!(f, "Choice {labeling}")?,
            None => writeln!(f, "Choice Labels: \tnone")?,
        }
        writeln!(f, "{rule}")
    }
}
