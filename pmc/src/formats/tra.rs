//! The `.tra` file format used by the *Markov Reward Model Checker*.
//!
//! The `.tra` file format is used by the *Markov Reward Model Checker* [^1] to describe
//! the rate matrix of continuous time Markov chains. We extend it
//! with an optional `MODEL` header naming the model type and, for MDPs, with a
//! 1-based choice index between source and target of every transition:
//!
//! ```text
//! MODEL mdp
//! STATES 2
//! INITIALS 1
//! TRANSITIONS 3
//! 1
//! 1 1 2 1
//! 1 2 1 1/2
//! 1 2 2 1/2
//! ```
//!
//! Without a `MODEL` header the file describes a CTMC.
//!
//! [^1]: [J.-P. Katoen, M. Khattri, and I. S. Zapreevt.
//! "A Markov reward model checker."
//! Second International Conference on the Quantitative Evaluation of Systems (QEST'05).
//! IEEE, 2005.](https://doi.org/10.1109/QEST.2005.2)

use std::io::Write;

use crate::{
    generator::explicit::{ExplicitChoice, ExplicitModel},
    linalg::fields::PseudoField,
    models::{ModelType, SparseModel},
};

use super::{Cursor, ExportError, ParseError};

fn parse_model_type(name: &str) -> Result<ModelType, ParseError> {
    match name {
        "dtmc" => Ok(ModelType::Dtmc),
        "ctmc" => Ok(ModelType::Ctmc),
        "mdp" => Ok(ModelType::Mdp),
        _ => Err(ParseError::new(format!("Unsupported model type `{name}`."))),
    }
}

fn model_type_name(model_type: ModelType) -> Result<&'static str, ExportError> {
    match model_type {
        ModelType::Dtmc => Ok("dtmc"),
        ModelType::Ctmc => Ok("ctmc"),
        ModelType::Mdp => Ok("mdp"),
        _ => Err(ExportError::UnsupportedModelType(model_type)),
    }
}

pub fn parse<F: PseudoField>(input: &str) -> Result<ExplicitModel<F>, ParseError> {
    let mut cursor = Cursor::new(input);
    let model_type = if cursor.consume_tag("MODEL").is_ok() {
        parse_model_type(cursor.consume_word()?)?
    } else {
        ModelType::Ctmc
    };
    cursor.consume_tag("STATES")?;
    let states = cursor.consume_usize()?;
    cursor.consume_tag("INITIALS")?;
    let initials = cursor.consume_usize()?;
    cursor.consume_tag("TRANSITIONS")?;
    let transitions = cursor.consume_usize()?;

    let mut model = ExplicitModel::new(model_type, states);
    let check_state = |state: usize| {
        if state < states {
            Ok(state)
        } else {
            Err(ParseError::new(format!(
                "State {} out of range, the model has {states} states.",
                state + 1
            )))
        }
    };

    for _ in 0..initials {
        let state = check_state(cursor.consume_index()?)?;
        model.initial_states.push(state);
    }
    for _ in 0..transitions {
        let source = check_state(cursor.consume_index()?)?;
        let choice = if model_type == ModelType::Mdp {
            cursor.consume_index()?
        } else {
            0
        };
        let target = check_state(cursor.consume_index()?)?;
        let value = cursor.consume_rational::<F>()?;

        let choices = &mut model.choices[source];
        if choice == choices.len() {
            choices.push(ExplicitChoice::new(Vec::new()));
        } else if choice > choices.len() {
            return Err(ParseError::new(format!(
                "Choice {} of state {} appears before choice {}.",
                choice + 1,
                source + 1,
                choices.len() + 1
            )));
        }
        choices[choice].transitions.push((target, value));
    }
    if !cursor.is_empty() {
        return Err(ParseError::new(
            "Found more transitions than announced in the header.",
        ));
    }
    Ok(model)
}

/// Writes the transition matrix of a DTMC, CTMC or MDP.
pub fn write<F: PseudoField>(
    model: &SparseModel<F>,
    out: &mut impl Write,
) -> Result<(), ExportError> {
    let name = model_type_name(model.model_type())?;
    let matrix = model.transition_matrix();
    let initial_states = model.initial_states();

    writeln!(out, "MODEL {name}")?;
    writeln!(out, "STATES {}", model.number_of_states())?;
    writeln!(out, "INITIALS {}", initial_states.count_ones())?;
    writeln!(out, "TRANSITIONS {}", matrix.entry_count())?;
    for state in initial_states.iter_ones() {
        writeln!(out, "{}", state + 1)?;
    }
    for state in 0..matrix.row_group_count() {
        for (choice, row) in matrix.row_group(state).enumerate() {
            for entry in matrix.row(row) {
                if model.model_type() == ModelType::Mdp {
                    write!(out, "{} {} ", state + 1, choice + 1)?;
                } else {
                    write!(out, "{} ", state + 1)?;
                }
                writeln!(out, "{} {}", entry.column() + 1, entry.value())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::fields::{FromRational, rational::Rational};

    const MDP: &str = "MODEL mdp
STATES 2
INITIALS 1
TRANSITIONS 4
1
1 1 2 1
1 2 1 1/2
1 2 2 1/2
2 1 2 1
";

    #[test]
    fn test_parse_mdp() {
        let model = parse::<Rational>(MDP).unwrap();
        assert_eq!(model.model_type, ModelType::Mdp);
        assert_eq!(model.initial_states, vec![0]);
        assert_eq!(model.choices[0].len(), 2);
        assert_eq!(
            model.choices[0][1].transitions,
            vec![
                (0, Rational::from_rational("1", "2")),
                (1, Rational::from_rational("1", "2"))
            ]
        );
        assert_eq!(model.choices[1][0].transitions.len(), 1);
    }

    #[test]
    fn test_parse_plain_ctmc() {
        let model =
            parse::<Rational>("STATES 2\nINITIALS 1\nTRANSITIONS 2\n1\n1 2 3\n2 1 1").unwrap();
        assert_eq!(model.model_type, ModelType::Ctmc);
        assert_eq!(model.choices[0][0].transitions, vec![(1, Rational::from_rational("3", "1"))]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse::<Rational>("MODEL gsmp\nSTATES 1").is_err());
        assert!(parse::<Rational>("STATES 1\nINITIALS 1\nTRANSITIONS 0\n2").is_err());
        assert!(parse::<Rational>("MODEL mdp STATES 1 INITIALS 1 TRANSITIONS 1 1 2 1 1").is_err());
        assert!(parse::<Rational>("STATES 1 INITIALS 1 TRANSITIONS 1 1 1 1 1 1 1").is_err());
    }
}
