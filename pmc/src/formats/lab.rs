//! The `.lab` file format of the *Markov Reward Model Checker*.
//!
//! A declaration block lists all labels, followed by one line per labeled state:
//!
//! ```text
//! #DECLARATION
//! init goal
//! #END
//! 1 init
//! 3 goal
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
};

use crate::models::{DEADLOCK_LABEL, INIT_LABEL, StateLabeling};

use super::{Cursor, ExportError, ParseError};

/// Parses the labels of a model with `states` states.
///
/// The labels `init` and `deadlock` are derived during exploration, so they are
/// accepted but dropped.
pub fn parse(input: &str, states: usize) -> Result<BTreeMap<String, BTreeSet<usize>>, ParseError> {
    let mut lines = input.lines().map(str::trim).filter(|line| !line.is_empty());
    if lines.next() != Some("#DECLARATION") {
        return Err(ParseError::new("Expected `#DECLARATION`."));
    }
    let mut labels = BTreeMap::new();
    for line in lines.by_ref() {
        if line == "#END" {
            break;
        }
        for name in line.split_whitespace() {
            labels.insert(name.to_owned(), BTreeSet::new());
        }
    }
    for line in lines {
        let mut cursor = Cursor::new(line);
        let state = cursor.consume_index()?;
        if state >= states {
            return Err(ParseError::new(format!(
                "State {} out of range, the model has {states} states.",
                state + 1
            )));
        }
        while !cursor.is_empty() {
            let name = cursor.consume_word()?;
            labels
                .get_mut(name)
                .ok_or_else(|| ParseError::new(format!("Undeclared label `{name}`.")))?
                .insert(state);
        }
    }
    labels.remove(INIT_LABEL);
    labels.remove(DEADLOCK_LABEL);
    Ok(labels)
}

pub fn write(labeling: &StateLabeling, out: &mut impl Write) -> Result<(), ExportError> {
    writeln!(out, "#DECLARATION")?;
    writeln!(out, "{}", itertools::join(labeling.label_names(), " "))?;
    writeln!(out, "#END")?;
    for state in 0..labeling.item_count() {
        let labels = labeling.labels_of_item(state);
        if !labels.is_empty() {
            writeln!(out, "{} {}", state + 1, labels.join(" "))?;
        }
    }
    Ok(())
}
