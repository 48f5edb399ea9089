//! Input and output file formats.
//!
//! Explicit models are read and written in the formats of the *Markov Reward Model
//! Checker*: transitions in `.tra` files, state labels in `.lab` files and state
//! rewards in `.rew` files. All of them count states from 1.

use std::{io, str::FromStr};

use thiserror::Error;

use crate::{linalg::fields::PseudoField, models::ModelType};

pub mod lab;
pub mod rew;
pub mod tra;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ParseError(String);

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Cannot export a {0} in this format.")]
    UnsupportedModelType(ModelType),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub(crate) struct Cursor<'i> {
    tail: &'i str,
}

impl<'i> Cursor<'i> {
    pub fn new(input: &'i str) -> Self {
        let mut this = Self { tail: input };
        this.consume_whitespace();
        this
    }

    pub fn is_empty(&self) -> bool {
        self.tail.is_empty()
    }

    pub fn consume_whitespace(&mut self) {
        self.tail = self.tail.trim_start()
    }

    pub fn consume_tag(&mut self, tag: impl AsRef<str>) -> Result<(), ParseError> {
        let tag = tag.as_ref();
        self.tail = self
            .tail
            .strip_prefix(tag)
            .ok_or_else(|| ParseError(format!("Expected `{tag}` but found {}.", self.excerpt())))?;
        self.consume_whitespace();
        Ok(())
    }

    /// Consumes a run of alphanumeric characters and underscores.
    pub fn consume_word(&mut self) -> Result<&'i str, ParseError> {
        let length = self
            .tail
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(self.tail.len());
        if length == 0 {
            return Err(ParseError(format!("Expected word but found {}.", self.excerpt())));
        }
        let word = &self.tail[..length];
        self.tail = &self.tail[length..];
        self.consume_whitespace();
        Ok(word)
    }

    pub fn consume_number(&mut self) -> Result<&'i str, ParseError> {
        let mut chars = self.tail.chars();
        while chars
            .as_str()
            .starts_with(|c| char::is_digit(c, 10) || c == '.' || c == 'e' || c == '-')
        {
            chars.next();
        }
        let length = self.tail.len() - chars.as_str().len();
        if length > 0 {
            let number = &self.tail[..length];
            self.tail = chars.as_str();
            self.consume_whitespace();
            Ok(number)
        } else {
            Err(ParseError(format!("Expected number but found {}.", self.excerpt())))
        }
    }

    pub fn consume_usize(&mut self) -> Result<usize, ParseError> {
        let number = self.consume_number()?;
        usize::from_str(number)
            .map_err(|_| ParseError(format!("Unable to convert number {number} to usize.")))
    }

    /// Consumes a 1-based index and converts it into a 0-based one.
    pub fn consume_index(&mut self) -> Result<usize, ParseError> {
        let index = self.consume_usize()?;
        index
            .checked_sub(1)
            .ok_or_else(|| ParseError("Indices start at 1.".to_owned()))
    }

    pub fn consume_rational<F: PseudoField>(&mut self) -> Result<F, ParseError> {
        let nominator = self.consume_number()?;
        let denominator = if self.consume_tag("/").is_ok() {
            self.consume_number()?
        } else {
            "1"
        };
        Ok(F::from_rational(nominator, denominator))
    }

    fn excerpt(&self) -> &'i str {
        let end = self
            .tail
            .char_indices()
            .nth(20)
            .map_or(self.tail.len(), |(index, _)| index);
        if end == 0 { "end of input" } else { &self.tail[..end] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::fields::{FromRational, rational::Rational};

    #[test]
    fn test_cursor() {
        let mut cursor = Cursor::new("  MODEL mdp\n3 1/4 0");
        cursor.consume_tag("MODEL").unwrap();
        assert_eq!(cursor.consume_word().unwrap(), "mdp");
        assert_eq!(cursor.consume_index().unwrap(), 2);
        assert_eq!(
            cursor.consume_rational::<Rational>().unwrap(),
            Rational::from_rational("1", "4")
        );
        assert!(cursor.consume_index().is_err());
        assert!(cursor.is_empty());
        assert!(cursor.consume_number().is_err());
    }
}
