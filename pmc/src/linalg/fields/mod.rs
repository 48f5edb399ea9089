//! Traits and data structures for the numeric value types of models.
//!
//! Transition weights, rates and rewards of a model are all drawn from one numeric
//! type. Mathematically these values should form a *field* (a set with addition and
//! multiplication satisfying the usual axioms), but in practice only some of the
//! supported types do. Floating-point numbers, for instance, violate associativity:
//!
//! ```
//! assert!(10e-100 + (-1.0 + 1.0) != (10e-100 + -1.0) + 1.0)
//! ```
//!
//! A [`PseudoField`] is a numeric type supporting the usual arithmetic operators of
//! fields but without any guarantee that the field axioms are satisfied. Every type
//! used as a value type of a sparse model implements it:
//!
//! - [`Float64`], a thin wrapper around [`f64`].
//! - [`Rational`], arbitrary-precision rational numbers as provided by
//!   [`num_rational`].
//!
//! A [`Field`] is a mere marker trait on top of [`PseudoField`] for types that do
//! satisfy all field axioms.
//!
//! Algorithms that need transcendental functions (e.g. uniformisation of a
//! continuous-time model) check [`PseudoField::supports_exponential`] before being
//! applied to a value type.
//!
//! [`Float64`]: float64::Float64
//! [`Rational`]: rational::Rational

use std::fmt::{Debug, Display};

pub mod float64;
pub mod rational;

pub trait FromRational: Sized {
    fn from_rational(numerator: &str, denominator: &str) -> Self;
}

pub trait ToRational: Sized {
    fn to_rational(&self) -> (String, String);
}

/// A [`Field`] is a numeric type satisfying all field axioms, e.g., arbitrary-precision
/// rational numbers.
pub trait Field: PseudoField {}

/// A [`PseudoField`] is a numeric type supporting the usual arithmetic operators of
/// fields but without any guarantee that the field axioms are satisfied, e.g.,
/// rational numbers or floating-point numbers.
pub trait PseudoField:
    Debug
    + Sized
    + Clone
    + PartialOrd
    + PartialEq
    + FromRational
    + ToRational
    + num_traits::Zero
    + num_traits::One
    + Display
    + From<f64>
{
    fn neg_assign(&mut self);
    fn abs_assign(&mut self);
    fn inv_assign(&mut self);

    fn add_assign(&mut self, rhs: &Self);
    fn sub_assign(&mut self, rhs: &Self);
    fn mul_assign(&mut self, rhs: &Self);
    fn div_assign(&mut self, rhs: &Self);

    /// Lossy conversion used for diagnostics and tolerance checks.
    fn to_f64(&self) -> f64;

    /// Whether the type offers (approximate) exponentiation.
    fn supports_exponential() -> bool;

    /// Checks whether `self` and `other` differ by at most `tolerance`.
    fn is_close(&self, other: &Self, tolerance: f64) -> bool {
        let mut difference = self.clone();
        difference.sub_assign(other);
        difference.abs_assign();
        difference <= Self::from(tolerance)
    }

    /// Converts a count (e.g. a number of choices) into the value type.
    fn from_count(count: usize) -> Self {
        Self::from_rational(&count.to_string(), "1")
    }
}

/// Sums up the given values.
pub fn sum<'a, F: PseudoField + 'a>(values: impl IntoIterator<Item = &'a F>) -> F {
    let mut result = F::zero();
    for value in values {
        result.add_assign(value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::{float64::Float64, rational::Rational, *};

    #[test]
    fn test_sum_and_closeness() {
        let values = [Float64::from(0.25), Float64::from(0.5), Float64::from(0.25)];
        assert!(sum(values.iter()).is_close(&Float64::from(1.0), 1e-12));

        let thirds = vec![Rational::from_rational("1", "3"); 3];
        assert_eq!(sum(thirds.iter()), Rational::from_count(1));
    }

    #[test]
    fn test_exponential_capability() {
        assert!(Float64::supports_exponential());
        assert!(!Rational::supports_exponential());
    }
}
