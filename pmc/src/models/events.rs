//! Events of generalized semi-Markov processes.
//!
//! Every choice of a GSMP state is triggered by an event whose delay follows an
//! [`EventDistribution`]. The builder records which row of the transition matrix
//! belongs to which event in which state.

use std::{collections::BTreeMap, fmt};

use itertools::Itertools;

use crate::linalg::fields::PseudoField;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventDistribution {
    Exp,
    Weibull,
    Uniform,
    Dirac,
    Erlang,
}

impl fmt::Display for EventDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventDistribution::Exp => "Exponential",
            EventDistribution::Weibull => "Weibull",
            EventDistribution::Uniform => "Uniform",
            EventDistribution::Dirac => "Dirac",
            EventDistribution::Erlang => "Erlang",
        };
        write!(f, "{name}")
    }
}

/// The delay distribution of an event with its one or two parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct EventVariableInformation<F> {
    distribution: EventDistribution,
    args: Vec<F>,
}

impl<F: PseudoField> EventVariableInformation<F> {
    pub fn new(distribution: EventDistribution, arg: F) -> Self {
        Self {
            distribution,
            args: vec![arg],
        }
    }

    pub fn with_two_args(distribution: EventDistribution, first: F, second: F) -> Self {
        Self {
            distribution,
            args: vec![first, second],
        }
    }

    /// An exponentially distributed event with the given rate.
    pub fn exponential(rate: F) -> Self {
        Self::new(EventDistribution::Exp, rate)
    }

    pub fn distribution(&self) -> EventDistribution {
        self.distribution
    }

    pub fn args(&self) -> &[F] {
        &self.args
    }

    /// The first parameter, i.e., the rate of exponential events.
    pub fn rate(&self) -> &F {
        &self.args[0]
    }
}

impl<F: PseudoField> fmt::Display for EventVariableInformation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.distribution, self.args.iter().join(", "))
    }
}

/// Events by id together with the map from their names to ids.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventTable<F> {
    variables: Vec<EventVariableInformation<F>>,
    name_to_id: BTreeMap<String, usize>,
}

impl<F: PseudoField> EventTable<F> {
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            name_to_id: BTreeMap::new(),
        }
    }

    /// Adds an event and returns its id. A name that is already taken is rebound
    /// to the new event.
    pub fn add(&mut self, name: impl Into<String>, event: EventVariableInformation<F>) -> usize {
        let id = self.variables.len();
        self.variables.push(event);
        self.name_to_id.insert(name.into(), id);
        id
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.name_to_id.get(name).copied()
    }

    pub fn get(&self, id: usize) -> &EventVariableInformation<F> {
        &self.variables[id]
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Named events in lexicographic order of their names.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EventVariableInformation<F>)> {
        self.name_to_id
            .iter()
            .map(|(name, id)| (name.as_str(), &self.variables[*id]))
    }
}

/// The events of a GSMP and where they occur in its transition matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct GsmpEvents<F> {
    pub table: EventTable<F>,
    /// For every event, the row it triggers in each state where it is enabled.
    pub event_to_states: BTreeMap<usize, BTreeMap<usize, usize>>,
    /// For every state, its enabled events in row order.
    pub state_to_events: BTreeMap<usize, Vec<usize>>,
}

impl<F: PseudoField> GsmpEvents<F> {
    pub fn new(table: EventTable<F>) -> Self {
        Self {
            table,
            event_to_states: BTreeMap::new(),
            state_to_events: BTreeMap::new(),
        }
    }

    /// Records that `event` triggers `row` in `state`.
    pub fn add_occurrence(&mut self, event: usize, state: usize, row: usize) {
        self.event_to_states
            .entry(event)
            .or_default()
            .insert(state, row);
        self.state_to_events.entry(state).or_default().push(event);
    }

    pub fn events_of_state(&self, state: usize) -> &[usize] {
        self.state_to_events
            .get(&state)
            .map_or(&[], |events| events.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::fields::float64::Float64;

    #[test]
    fn test_event_table() {
        let mut table = EventTable::new();
        let a = table.add("a", EventVariableInformation::exponential(Float64::from(2.0)));
        let b = table.add(
            "b",
            EventVariableInformation::with_two_args(
                EventDistribution::Uniform,
                Float64::from(1.0),
                Float64::from(3.0),
            ),
        );
        assert_eq!(table.id("a"), Some(a));
        assert_eq!(table.id("c"), None);
        assert_eq!(table.get(b).to_string(), "Uniform(1, 3)");
        assert_eq!(table.get(a).rate(), &Float64::from(2.0));
        assert_eq!(table.iter().map(|(name, _)| name).collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn test_occurrences() {
        let mut events = GsmpEvents::new(EventTable::<Float64>::new());
        events.add_occurrence(0, 1, 2);
        events.add_occurrence(1, 1, 3);
        assert_eq!(events.events_of_state(1), &[0, 1]);
        assert!(events.events_of_state(0).is_empty());
        assert_eq!(events.event_to_states[&1][&1], 3);
    }
}
