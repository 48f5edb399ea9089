//! A generator for guarded-command programs.
//!
//! A [`Program`] consists of bounded integer and boolean variables and a set of
//! commands. A command is enabled in every state satisfying its guard and then
//! offers one choice whose successors are given by its updates. Guards, update
//! weights and effects as well as labels and rewards are plain closures over the
//! [`Assignment`] of a state.
//!
//! Deterministic models (DTMCs and CTMCs) have a single choice per state, so the
//! choices of all enabled commands are fused: in a DTMC the successor probabilities
//! are averaged over the commands, in a CTMC the rates are added up. In a Markov
//! automaton all Markovian commands are fused into the first choice of a state; in
//! a GSMP the commands triggered by the same events are fused.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use crate::{
    builder::rewards::RewardModelInformation,
    error::{BuildError, BuildResult},
    linalg::fields::PseudoField,
    models::{
        ChoiceOrigins, DEADLOCK_LABEL, DISTRIBUTION_TOLERANCE, EventDistribution, EventTable,
        EventVariableInformation, INIT_LABEL, ModelType, StateLabeling,
    },
    storage::{BitVectorHashMap, CompressedState},
};

use super::{
    Choice, NextStateGenerator, StateBehavior, StateId, StateToId, label_states,
    variables::{Assignment, Valuation, VariableInformation},
};

pub type Guard = Box<dyn Fn(&Assignment) -> bool>;
pub type Effect = Box<dyn Fn(&mut Assignment)>;
pub type Expression<F> = Box<dyn Fn(&Assignment) -> F>;

pub struct Update<F> {
    weight: Expression<F>,
    effect: Effect,
}

pub struct Command<F> {
    name: String,
    action: Option<usize>,
    guard: Guard,
    updates: Vec<Update<F>>,
    markovian: bool,
    events: Vec<String>,
}

impl<F: PseudoField + 'static> Command<F> {
    pub fn new(name: impl Into<String>, guard: impl Fn(&Assignment) -> bool + 'static) -> Self {
        Self {
            name: name.into(),
            action: None,
            guard: Box::new(guard),
            updates: Vec::new(),
            markovian: false,
            events: Vec::new(),
        }
    }

    /// Labels the command with an action of the program.
    pub fn with_action(mut self, action: usize) -> Self {
        self.action = Some(action);
        self
    }

    pub fn markovian(mut self) -> Self {
        self.markovian = true;
        self
    }

    /// Makes the command triggered by the named event. A command with several events
    /// is triggered by their product.
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    /// Adds an update with a constant probability or rate.
    pub fn update(self, weight: F, effect: impl Fn(&mut Assignment) + 'static) -> Self {
        self.update_with(move |_| weight.clone(), effect)
    }

    /// Adds an update whose probability or rate depends on the state.
    pub fn update_with(
        mut self,
        weight: impl Fn(&Assignment) -> F + 'static,
        effect: impl Fn(&mut Assignment) + 'static,
    ) -> Self {
        self.updates.push(Update {
            weight: Box::new(weight),
            effect: Box::new(effect),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Named state and state-action rewards.
pub struct RewardStructure<F> {
    name: String,
    state_rewards: Vec<(Guard, Expression<F>)>,
    action_rewards: Vec<(Option<usize>, Guard, Expression<F>)>,
}

impl<F: PseudoField + 'static> RewardStructure<F> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state_rewards: Vec::new(),
            action_rewards: Vec::new(),
        }
    }

    pub fn state_reward(
        mut self,
        guard: impl Fn(&Assignment) -> bool + 'static,
        value: impl Fn(&Assignment) -> F + 'static,
    ) -> Self {
        self.state_rewards.push((Box::new(guard), Box::new(value)));
        self
    }

    /// Adds a reward for the choices of commands with the given action, where `None`
    /// stands for unlabeled commands.
    pub fn action_reward(
        mut self,
        action: Option<usize>,
        guard: impl Fn(&Assignment) -> bool + 'static,
        value: impl Fn(&Assignment) -> F + 'static,
    ) -> Self {
        self.action_rewards
            .push((action, Box::new(guard), Box::new(value)));
        self
    }

    fn state_value(&self, assignment: &Assignment) -> F {
        let mut value = F::zero();
        for (guard, reward) in &self.state_rewards {
            if guard(assignment) {
                value.add_assign(&reward(assignment));
            }
        }
        value
    }

    fn action_value(&self, action: Option<usize>, assignment: &Assignment) -> F {
        let mut value = F::zero();
        for (reward_action, guard, reward) in &self.action_rewards {
            if *reward_action == action && guard(assignment) {
                value.add_assign(&reward(assignment));
            }
        }
        value
    }
}

/// A guarded-command program.
pub struct Program<F> {
    model_type: ModelType,
    variables: VariableInformation,
    initial_states: Vec<Assignment>,
    actions: Vec<String>,
    commands: Vec<Command<F>>,
    labels: Vec<(String, Guard)>,
    reward_structures: Vec<RewardStructure<F>>,
    events: Vec<(String, EventVariableInformation<F>)>,
    terminal: Option<Guard>,
}

impl<F: PseudoField + 'static> Program<F> {
    pub fn new(model_type: ModelType, variables: VariableInformation) -> Self {
        Self {
            model_type,
            variables,
            initial_states: Vec::new(),
            actions: Vec::new(),
            commands: Vec::new(),
            labels: Vec::new(),
            reward_structures: Vec::new(),
            events: Vec::new(),
            terminal: None,
        }
    }

    pub fn variables(&self) -> &VariableInformation {
        &self.variables
    }

    /// Adds an initial state. Without initial states, the program starts with every
    /// variable at its lower bound.
    pub fn add_initial_state(&mut self, assignment: Assignment) {
        self.initial_states.push(assignment);
    }

    /// Declares an action and returns its index.
    pub fn add_action(&mut self, name: impl Into<String>) -> usize {
        self.actions.push(name.into());
        self.actions.len() - 1
    }

    pub fn add_command(&mut self, command: Command<F>) {
        self.commands.push(command);
    }

    pub fn add_label(
        &mut self,
        name: impl Into<String>,
        predicate: impl Fn(&Assignment) -> bool + 'static,
    ) {
        self.labels.push((name.into(), Box::new(predicate)));
    }

    pub fn add_reward_structure(&mut self, rewards: RewardStructure<F>) {
        self.reward_structures.push(rewards);
    }

    pub fn add_event(&mut self, name: impl Into<String>, event: EventVariableInformation<F>) {
        self.events.push((name.into(), event));
    }

    /// States satisfying the predicate are not expanded.
    pub fn set_terminal(&mut self, predicate: impl Fn(&Assignment) -> bool + 'static) {
        self.terminal = Some(Box::new(predicate));
    }

    fn check(&self) -> BuildResult<()> {
        for (name, _) in &self.labels {
            if name == INIT_LABEL || name == DEADLOCK_LABEL {
                return Err(BuildError::WrongFormat(format!(
                    "Label '{name}' is reserved."
                )));
            }
        }

        let known_events: BTreeSet<&str> =
            self.events.iter().map(|(name, _)| name.as_str()).collect();
        for command in &self.commands {
            if command.action.is_some_and(|action| action >= self.actions.len()) {
                return Err(BuildError::WrongFormat(format!(
                    "Command '{}' refers to an undeclared action.",
                    command.name
                )));
            }
            match (self.model_type, command.events.is_empty()) {
                (ModelType::Gsmp, true) => {
                    return Err(BuildError::WrongFormat(format!(
                        "Command '{}' of a GSMP is not triggered by an event.",
                        command.name
                    )));
                }
                (ModelType::Gsmp, false) => {
                    if let Some(event) = command
                        .events
                        .iter()
                        .find(|event| !known_events.contains(event.as_str()))
                    {
                        return Err(BuildError::WrongFormat(format!(
                            "Command '{}' is triggered by unknown event '{}'.",
                            command.name, event
                        )));
                    }
                }
                (_, false) => {
                    return Err(BuildError::Unsupported(format!(
                        "events in {} models",
                        self.model_type
                    )));
                }
                (_, true) => {}
            }
        }

        let non_exponential = self
            .events
            .iter()
            .any(|(_, event)| event.distribution() != EventDistribution::Exp);
        if non_exponential && !F::supports_exponential() {
            warn!("Non-exponential events cannot be analysed precisely with this value type.");
        }
        Ok(())
    }
}

/// Explores a [`Program`].
pub struct ProgramGenerator<F> {
    program: Program<F>,
    current: Assignment,
    exploration_checks: bool,
}

impl<F: PseudoField + 'static> ProgramGenerator<F> {
    pub fn new(program: Program<F>) -> BuildResult<Self> {
        program.check()?;
        let current = program.variables.lower_bounds();
        Ok(Self {
            program,
            current,
            exploration_checks: false,
        })
    }

    /// Checks that the probabilities of every command of a discrete-time model sum
    /// up to one.
    pub fn with_exploration_checks(mut self, enabled: bool) -> Self {
        self.exploration_checks = enabled;
        self
    }

    pub fn program(&self) -> &Program<F> {
        &self.program
    }

    fn command_choice(
        &self,
        index: usize,
        command: &Command<F>,
        resolver: &mut StateToId<'_>,
    ) -> BuildResult<Choice<F>> {
        let mut choice = Choice::new(command.action, command.markovian);
        if let Some(action) = command.action {
            choice.add_label(self.program.actions[action].clone());
        }
        for event in &command.events {
            choice.add_event(event.clone());
        }
        choice.add_origin_data(BTreeSet::from([index]));

        for update in &command.updates {
            let weight = (update.weight)(&self.current);
            if weight.is_zero() {
                continue;
            }
            let mut successor = self.current.clone();
            (update.effect)(&mut successor);
            let state = self.program.variables.encode(&successor)?;
            choice.add_probability(resolver(&state)?, weight);
        }

        if self.exploration_checks
            && self.program.model_type.is_discrete_time()
            && !choice.total_mass().is_close(&F::one(), DISTRIBUTION_TOLERANCE)
        {
            return Err(BuildError::WrongFormat(format!(
                "Probabilities of command '{}' sum to {} instead of one.",
                command.name,
                choice.total_mass()
            )));
        }

        for rewards in &self.program.reward_structures {
            choice.add_reward(rewards.action_value(command.action, &self.current));
        }
        Ok(choice)
    }
}

/// How the masses of fused choices are combined.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Fusion {
    /// Every choice is taken with the same probability.
    Uniform,
    /// Rates race against each other.
    Race,
}

/// Fuses several choices into one. Action rewards are weighted with the mass of
/// their choice.
fn fuse<F: PseudoField>(choices: &[Choice<F>], fusion: Fusion, markovian: bool) -> Choice<F> {
    let count = F::from_count(choices.len());
    let mut fused = Choice::new(None, markovian);
    let mut total = match fusion {
        Fusion::Uniform => count.clone(),
        Fusion::Race => F::zero(),
    };
    let reward_count = choices.first().map_or(0, |choice| choice.rewards().len());
    let mut rewards = vec![F::zero(); reward_count];

    for choice in choices {
        for (state, value) in choice.iter() {
            let mut value = value.clone();
            if fusion == Fusion::Uniform {
                value.div_assign(&count);
            }
            fused.add_probability(state, value);
        }
        if fusion == Fusion::Race {
            total.add_assign(choice.total_mass());
        }
        fused.add_labels(choice.labels().iter().cloned());
        if let Some(data) = choice.origin_data() {
            fused.add_origin_data(data.clone());
        }
        for (sum, reward) in rewards.iter_mut().zip(choice.rewards()) {
            let mut reward = reward.clone();
            reward.mul_assign(choice.total_mass());
            sum.add_assign(&reward);
        }
    }

    for mut reward in rewards {
        if !total.is_zero() {
            reward.div_assign(&total);
        }
        fused.add_reward(reward);
    }
    fused
}

fn fuse_markovian<F: PseudoField>(choices: Vec<Choice<F>>) -> Vec<Choice<F>> {
    let (markovian, probabilistic): (Vec<_>, Vec<_>) =
        choices.into_iter().partition(Choice::is_markovian);
    let mut result = Vec::with_capacity(probabilistic.len() + 1);
    match markovian.len() {
        0 => {}
        1 => result.extend(markovian),
        _ => result.push(fuse(&markovian, Fusion::Race, true)),
    }
    result.extend(probabilistic);
    result
}

fn fuse_by_events<F: PseudoField>(choices: Vec<Choice<F>>) -> Vec<Choice<F>> {
    let mut by_events: BTreeMap<Vec<String>, Vec<Choice<F>>> = BTreeMap::new();
    for choice in choices {
        by_events
            .entry(choice.event_names().to_vec())
            .or_default()
            .push(choice);
    }
    by_events
        .into_iter()
        .map(|(events, mut group)| {
            if group.len() == 1 {
                return group.remove(0);
            }
            let mut fused = fuse(&group, Fusion::Uniform, false);
            for event in events {
                fused.add_event(event);
            }
            fused
        })
        .collect()
}

impl<F: PseudoField + 'static> NextStateGenerator<F> for ProgramGenerator<F> {
    fn state_size(&self) -> usize {
        self.program.variables.total_bit_offset(true)
    }

    fn model_type(&self) -> ModelType {
        self.program.model_type
    }

    fn initial_states(&mut self, resolver: &mut StateToId<'_>) -> BuildResult<Vec<StateId>> {
        let mut ids = Vec::new();
        if self.program.initial_states.is_empty() {
            let state = self.program.variables.encode(&self.program.variables.lower_bounds())?;
            ids.push(resolver(&state)?);
        }
        for assignment in &self.program.initial_states {
            let state = self.program.variables.encode(assignment)?;
            ids.push(resolver(&state)?);
        }
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn load(&mut self, state: &CompressedState) {
        self.current = self.program.variables.decode(state);
    }

    fn expand(&mut self, resolver: &mut StateToId<'_>) -> BuildResult<StateBehavior<F>> {
        let mut behavior = StateBehavior::new();
        for rewards in &self.program.reward_structures {
            behavior.add_state_reward(rewards.state_value(&self.current));
        }

        if self
            .program
            .terminal
            .as_ref()
            .is_some_and(|terminal| terminal(&self.current))
        {
            return Ok(behavior);
        }
        behavior.set_expanded();

        let mut choices = Vec::new();
        for (index, command) in self.program.commands.iter().enumerate() {
            if (command.guard)(&self.current) {
                choices.push(self.command_choice(index, command, resolver)?);
            }
        }

        let choices = match self.program.model_type {
            ModelType::Dtmc if choices.len() > 1 => vec![fuse(&choices, Fusion::Uniform, false)],
            ModelType::Ctmc if choices.len() > 1 => vec![fuse(&choices, Fusion::Race, false)],
            ModelType::MarkovAutomaton => fuse_markovian(choices),
            ModelType::Gsmp => fuse_by_events(choices),
            _ => choices,
        };
        for choice in choices {
            behavior.add_choice(choice);
        }
        Ok(behavior)
    }

    fn number_of_reward_models(&self) -> usize {
        self.program.reward_structures.len()
    }

    fn reward_model_information(&self, index: usize) -> RewardModelInformation {
        let rewards = &self.program.reward_structures[index];
        RewardModelInformation::new(
            rewards.name.clone(),
            !rewards.state_rewards.is_empty(),
            !rewards.action_rewards.is_empty(),
        )
    }

    fn label(
        &self,
        states: &BitVectorHashMap<StateId>,
        initial_states: &[StateId],
        deadlock_states: &[StateId],
    ) -> BuildResult<StateLabeling> {
        let variables = &self.program.variables;
        let predicates: Vec<(&str, Box<dyn Fn(&CompressedState) -> bool + '_>)> = self
            .program
            .labels
            .iter()
            .map(|(name, predicate)| {
                let predicate: Box<dyn Fn(&CompressedState) -> bool + '_> =
                    Box::new(move |state: &CompressedState| predicate(&variables.decode(state)));
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
        self.program.variables.to_valuation(state)
    }

    fn generate_choice_origins(
        &self,
        data: Vec<Option<BTreeSet<usize>>>,
    ) -> Option<ChoiceOrigins> {
        let names = self
            .program
            .commands
            .iter()
            .map(|command| command.name.clone())
            .collect();
        Some(ChoiceOrigins::from_command_sets(data, names))
    }

    fn map_events(&self, events: &mut EventTable<F>) {
        for (name, event) in &self.program.events {
            events.add(name.clone(), event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        generator::variables::Var,
        linalg::fields::{FromRational, float64::Float64, rational::Rational},
        storage::BitVector,
    };

    fn half() -> Rational {
        Rational::from_rational("1", "2")
    }

    fn coin() -> (Program<Rational>, Var) {
        let mut variables = VariableInformation::new();
        let s = variables.add_integer("s", 0, 2);
        let mut program = Program::new(ModelType::Dtmc, variables);
        program.add_command(
            Command::new("flip", move |a| a.get(s) == 0)
                .update(half(), move |a| a.set(s, 1))
                .update(half(), move |a| a.set(s, 2)),
        );
        (program, s)
    }

    /// Resolves states with a plain vector of known states.
    fn expand_initial<F: PseudoField + 'static>(
        generator: &mut ProgramGenerator<F>,
    ) -> (StateBehavior<F>, Vec<BitVector>) {
        let mut known: Vec<BitVector> = Vec::new();
        let mut resolver = |state: &CompressedState| -> BuildResult<StateId> {
            Ok(match known.iter().position(|other| other == state) {
                Some(id) => id,
                None => {
                    known.push(state.clone());
                    known.len() - 1
                }
            })
        };
        let initial = generator.initial_states(&mut resolver).unwrap();
        assert_eq!(initial, vec![0]);
        let state = generator
            .program
            .variables
            .encode(&generator.program.variables.lower_bounds())
            .unwrap();
        generator.load(&state);
        let behavior = generator.expand(&mut resolver).unwrap();
        (behavior, known)
    }

    #[test]
    fn test_single_command() {
        let (program, _) = coin();
        let mut generator = ProgramGenerator::new(program).unwrap();
        let (behavior, known) = expand_initial(&mut generator);
        assert!(behavior.was_expanded());
        assert_eq!(behavior.choices().len(), 1);
        let choice = &behavior.choices()[0];
        assert_eq!(choice.iter().map(|(state, _)| state).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(choice.origin_data(), Some(&BTreeSet::from([0])));
        assert_eq!(known.len(), 3);
    }

    #[test]
    fn test_dtmc_choices_are_averaged() {
        let (mut program, s) = coin();
        program.add_command(
            Command::new("stay", move |a| a.get(s) == 0)
                .update(Rational::from_rational("1", "1"), |_| {}),
        );
        let mut generator = ProgramGenerator::new(program).unwrap();
        let (behavior, _) = expand_initial(&mut generator);
        assert_eq!(behavior.choices().len(), 1);
        let values: Vec<_> = behavior.choices()[0]
            .iter()
            .map(|(state, value)| (state, value.clone()))
            .collect();
        assert_eq!(
            values,
            vec![
                (0, half()),
                (1, Rational::from_rational("1", "4")),
                (2, Rational::from_rational("1", "4"))
            ]
        );
    }

    #[test]
    fn test_ctmc_rates_are_added() {
        let mut variables = VariableInformation::new();
        let n = variables.add_integer("n", 0, 1);
        let mut program = Program::new(ModelType::Ctmc, variables);
        program.add_command(
            Command::new("a", move |a| a.get(n) == 0)
                .update(Float64::from(2.0), move |a| a.set(n, 1)),
        );
        program.add_command(
            Command::new("b", move |a| a.get(n) == 0)
                .update(Float64::from(3.0), move |a| a.set(n, 1)),
        );
        program.add_reward_structure(
            RewardStructure::new("cost").action_reward(None, |_| true, |_| Float64::from(1.0)),
        );
        let mut generator = ProgramGenerator::new(program).unwrap();
        let (behavior, _) = expand_initial(&mut generator);
        let choice = &behavior.choices()[0];
        assert_eq!(choice.total_mass(), &Float64::from(5.0));
        assert_eq!(choice.rewards(), &[Float64::from(1.0)]);
        assert_eq!(behavior.state_rewards(), &[Float64::from(0.0)]);
    }

    #[test]
    fn test_terminal_state_is_not_expanded() {
        let (mut program, s) = coin();
        program.set_terminal(move |a| a.get(s) == 0);
        let mut generator = ProgramGenerator::new(program).unwrap();
        let (behavior, _) = expand_initial(&mut generator);
        assert!(!behavior.was_expanded());
        assert!(behavior.is_empty());
    }

    #[test]
    fn test_exploration_checks() {
        let mut variables = VariableInformation::new();
        let s = variables.add_integer("s", 0, 1);
        let mut program = Program::new(ModelType::Mdp, variables);
        program.add_command(
            Command::new("leak", move |a| a.get(s) == 0).update(half(), move |a| a.set(s, 1)),
        );
        let mut generator = ProgramGenerator::new(program).unwrap().with_exploration_checks(true);
        let variables = &generator.program.variables;
        let state = variables.encode(&variables.lower_bounds()).unwrap();
        generator.load(&state);
        let result = generator.expand(&mut |_: &CompressedState| Ok(0));
        assert!(matches!(result, Err(BuildError::WrongFormat(_))));
    }

    #[test]
    fn test_update_out_of_bounds() {
        let mut variables = VariableInformation::new();
        let s = variables.add_integer("s", 0, 1);
        let mut program = Program::new(ModelType::Dtmc, variables);
        program.add_command(
            Command::new("overflow", |_| true)
                .update(half(), move |a| a.set(s, 2))
                .update(half(), |_| {}),
        );
        let mut generator = ProgramGenerator::new(program).unwrap();
        let variables = &generator.program.variables;
        let state = variables.encode(&variables.lower_bounds()).unwrap();
        generator.load(&state);
        let result = generator.expand(&mut |_: &CompressedState| Ok(0));
        assert!(matches!(result, Err(BuildError::WrongFormat(_))));
    }

    #[test]
    fn test_markovian_choices_come_first() {
        let mut variables = VariableInformation::new();
        let s = variables.add_integer("s", 0, 2);
        let mut program = Program::new(ModelType::MarkovAutomaton, variables);
        let go = program.add_action("go");
        program.add_command(
            Command::new("go", move |a| a.get(s) == 0)
                .with_action(go)
                .update(Float64::from(1.0), move |a| a.set(s, 2)),
        );
        program.add_command(
            Command::new("r1", move |a| a.get(s) == 0)
                .markovian()
                .update(Float64::from(1.0), move |a| a.set(s, 1)),
        );
        program.add_command(
            Command::new("r2", move |a| a.get(s) == 0)
                .markovian()
                .update(Float64::from(2.0), move |a| a.set(s, 2)),
        );
        let mut generator = ProgramGenerator::new(program).unwrap();
        let (behavior, _) = expand_initial(&mut generator);
        assert_eq!(behavior.choices().len(), 2);
        assert!(behavior.choices()[0].is_markovian());
        assert_eq!(behavior.choices()[0].total_mass(), &Float64::from(3.0));
        assert!(behavior.choices()[1].labels().contains("go"));
    }

    #[test]
    fn test_program_checks() {
        let (mut program, _) = coin();
        program.add_label(INIT_LABEL, |_| true);
        assert!(matches!(ProgramGenerator::new(program), Err(BuildError::WrongFormat(_))));

        let mut variables = VariableInformation::new();
        variables.add_boolean("b");
        let mut program = Program::<Float64>::new(ModelType::Gsmp, variables);
        program.add_command(Command::new("c", |_| true).with_event("missing"));
        assert!(matches!(ProgramGenerator::new(program), Err(BuildError::WrongFormat(_))));
    }
}
