//! Layout of model variables inside compressed states.
//!
//! Every variable occupies a fixed range of bits. Boolean variables take a single
//! bit; an integer variable with range $[l, u]$ stores $v - l$ in
//! $\lceil \log_2 (u - l + 1) \rceil$ bits.

use std::fmt;

use itertools::Itertools;

use crate::{
    error::{BuildError, BuildResult},
    storage::CompressedState,
};

/// A handle to a variable of a [`VariableInformation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(usize);

impl Var {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableKind {
    Boolean,
    Integer { lower: i64, upper: i64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableLayout {
    pub name: String,
    pub kind: VariableKind,
    /// Its bit offset in the compressed state.
    pub bit_offset: usize,
    /// Its bit width in the compressed state.
    pub bit_width: usize,
}

impl VariableLayout {
    fn lower(&self) -> i64 {
        match self.kind {
            VariableKind::Boolean => 0,
            VariableKind::Integer { lower, .. } => lower,
        }
    }

    fn upper(&self) -> i64 {
        match self.kind {
            VariableKind::Boolean => 1,
            VariableKind::Integer { upper, .. } => upper,
        }
    }
}

/// The values of all variables of one state, indexed by [`Var`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Assignment(Vec<i64>);

impl Assignment {
    pub fn get(&self, var: Var) -> i64 {
        self.0[var.0]
    }

    pub fn is(&self, var: Var) -> bool {
        self.0[var.0] != 0
    }

    pub fn set(&mut self, var: Var, value: i64) {
        self.0[var.0] = value;
    }

    pub fn set_bool(&mut self, var: Var, value: bool) {
        self.0[var.0] = value as i64;
    }

    pub fn values(&self) -> &[i64] {
        &self.0
    }
}

/// A single variable value of a [`Valuation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
        }
    }
}

/// A human-readable valuation of the variables of a state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Valuation(Vec<(String, Value)>);

impl Valuation {
    pub fn new(entries: Vec<(String, Value)>) -> Self {
        Self(entries)
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0
            .iter()
            .find(|(variable, _)| variable == name)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl fmt::Display for Valuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .0
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .join(", ");
        write!(f, "{entries}")
    }
}

/// The variables of a model and their positions in compressed states.
#[derive(Clone, Debug, Default)]
pub struct VariableInformation {
    variables: Vec<VariableLayout>,
    total_bit_offset: usize,
}

impl VariableInformation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_boolean(&mut self, name: impl Into<String>) -> Var {
        self.push(name.into(), VariableKind::Boolean, 1)
    }

    /// # Panics
    ///
    /// Panics if the range is empty.
    pub fn add_integer(&mut self, name: impl Into<String>, lower: i64, upper: i64) -> Var {
        assert!(lower <= upper, "Integer variable has an empty range.");
        let range = (upper - lower) as u64;
        let width = (u64::BITS - range.leading_zeros()).max(1) as usize;
        self.push(name.into(), VariableKind::Integer { lower, upper }, width)
    }

    fn push(&mut self, name: String, kind: VariableKind, bit_width: usize) -> Var {
        self.variables.push(VariableLayout {
            name,
            kind,
            bit_offset: self.total_bit_offset,
            bit_width,
        });
        self.total_bit_offset += bit_width;
        Var(self.variables.len() - 1)
    }

    pub fn variables(&self) -> &[VariableLayout] {
        &self.variables
    }

    pub fn find(&self, name: &str) -> Option<Var> {
        self.variables
            .iter()
            .position(|variable| variable.name == name)
            .map(Var)
    }

    /// The number of bits of a compressed state, optionally rounded up to a
    /// multiple of 64.
    pub fn total_bit_offset(&self, round_to_64_bit: bool) -> usize {
        if round_to_64_bit {
            self.total_bit_offset.div_ceil(64).max(1) * 64
        } else {
            self.total_bit_offset
        }
    }

    /// An assignment with every variable at its lower bound.
    pub fn lower_bounds(&self) -> Assignment {
        Assignment(self.variables.iter().map(VariableLayout::lower).collect())
    }

    /// Encodes an assignment as a compressed state.
    pub fn encode(&self, assignment: &Assignment) -> BuildResult<CompressedState> {
        let mut state = CompressedState::new(self.total_bit_offset(true));
        for (variable, value) in self.variables.iter().zip(assignment.values()) {
            if *value < variable.lower() || *value > variable.upper() {
                return Err(BuildError::WrongFormat(format!(
                    "Assignment of {} to variable {} is out of bounds [{}, {}].",
                    value,
                    variable.name,
                    variable.lower(),
                    variable.upper()
                )));
            }
            state.set_from_int(
                variable.bit_offset,
                variable.bit_width,
                (*value - variable.lower()) as u64,
            );
        }
        Ok(state)
    }

    pub fn decode(&self, state: &CompressedState) -> Assignment {
        Assignment(
            self.variables
                .iter()
                .map(|variable| {
                    state.get_as_int(variable.bit_offset, variable.bit_width) as i64
                        + variable.lower()
                })
                .collect(),
        )
    }

    pub fn to_valuation(&self, state: &CompressedState) -> Valuation {
        let assignment = self.decode(state);
        Valuation(
            self.variables
                .iter()
                .zip(assignment.values())
                .map(|(variable, value)| {
                    let value = match variable.kind {
                        VariableKind::Boolean => Value::Bool(*value != 0),
                        VariableKind::Integer { .. } => Value::Int(*value),
                    };
                    (variable.name.clone(), value)
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut info = VariableInformation::new();
        let s = info.add_integer("s", 0, 7);
        let d = info.add_integer("d", -3, 3);
        let b = info.add_boolean("b");
        assert_eq!(info.variables()[s.index()].bit_width, 3);
        assert_eq!(info.variables()[d.index()].bit_offset, 3);
        assert_eq!(info.variables()[d.index()].bit_width, 3);
        assert_eq!(info.variables()[b.index()].bit_offset, 6);
        assert_eq!(info.total_bit_offset(false), 7);
        assert_eq!(info.total_bit_offset(true), 64);
        assert_eq!(info.find("d"), Some(d));
    }

    #[test]
    fn test_encode_decode() {
        let mut info = VariableInformation::new();
        let s = info.add_integer("s", 0, 7);
        let d = info.add_integer("d", -3, 3);
        let b = info.add_boolean("b");
        let mut assignment = info.lower_bounds();
        assignment.set(s, 5);
        assignment.set(d, -1);
        assignment.set_bool(b, true);

        let state = info.encode(&assignment).unwrap();
        assert_eq!(info.decode(&state), assignment);
        assert_eq!(info.to_valuation(&state).to_string(), "s=5, d=-1, b=true");
    }

    #[test]
    fn test_out_of_bounds() {
        let mut info = VariableInformation::new();
        let s = info.add_integer("s", 0, 2);
        let mut assignment = info.lower_bounds();
        assignment.set(s, 3);
        assert!(matches!(
            info.encode(&assignment),
            Err(BuildError::WrongFormat(_))
        ));
    }
}
