//! The `.rew` file format of the *Markov Reward Model Checker* for state rewards.
//!
//! Every line assigns a reward to a state; states without a line have reward zero.

use std::io::Write;

use crate::{linalg::fields::PseudoField, models::StandardRewardModel};

use super::{Cursor, ExportError, ParseError};

pub fn parse<F: PseudoField>(input: &str, states: usize) -> Result<Vec<F>, ParseError> {
    let mut rewards = vec![F::zero(); states];
    let mut cursor = Cursor::new(input);
    while !cursor.is_empty() {
        let state = cursor.consume_index()?;
        let value = cursor.consume_rational::<F>()?;
        let reward = rewards.get_mut(state).ok_or_else(|| {
            ParseError::new(format!(
                "State {} out of range, the model has {states} states.",
                state + 1
            ))
        })?;
        *reward = value;
    }
    Ok(rewards)
}

/// Writes the nonzero state rewards of a reward model. Models without state
/// rewards produce an empty file.
pub fn write<F: PseudoField>(
    rewards: &StandardRewardModel<F>,
    out: &mut impl Write,
) -> Result<(), ExportError> {
    for (state, value) in rewards.state_rewards().unwrap_or_default().iter().enumerate() {
        if !value.is_zero() {
            writeln!(out, "{} {}", state + 1, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use num_traits::{One, Zero};

    use super::*;
    use crate::linalg::fields::{FromRational, rational::Rational};

    #[test]
    fn test_write_and_parse() {
        let rewards = StandardRewardModel::new(
            Some(vec![Rational::zero(), Rational::from_rational("3", "2"), Rational::one()]),
            None,
        );
        let mut out = Vec::new();
        write(&rewards, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "2 3/2\n3 1\n");
        assert_eq!(parse::<Rational>(&text, 3).unwrap(), rewards.state_rewards().unwrap());
        assert!(parse::<Rational>(&text, 2).is_err());
    }
}
