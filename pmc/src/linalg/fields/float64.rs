use std::{
    fmt::Display,
    ops::{Add, Mul, Sub},
};

use super::{FromRational, PseudoField, ToRational};
use log::warn;
use num_rational::Ratio;

/// A 64-bit floating-point type implementing [`PseudoField`].
#[derive(Clone, Copy, PartialEq, PartialOrd, Debug, Default)]
pub struct Float64(f64);

impl Float64 {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Display for Float64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromRational for Float64 {
    fn from_rational(numerator: &str, denominator: &str) -> Self {
        let parse = |number: &str| {
            number.trim().parse::<f64>().unwrap_or_else(|_| {
                warn!("Unable to parse {number:?} as a float, using NaN.");
                f64::NAN
            })
        };
        Self(parse(numerator) / parse(denominator))
    }
}

impl ToRational for Float64 {
    fn to_rational(&self) -> (String, String) {
        match Ratio::<i64>::approximate_float(self.0) {
            Some(ratio) => (ratio.numer().to_string(), ratio.denom().to_string()),
            None => (self.0.to_string(), "1".to_owned()),
        }
    }
}

impl Add for Float64 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Float64 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul for Float64 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl num_traits::Zero for Float64 {
    fn zero() -> Self {
        Self(0.0)
    }

    fn is_zero(&self) -> bool {
        self.0 == 0.0
    }
}

impl num_traits::One for Float64 {
    fn one() -> Self {
        Self(1.0)
    }

    fn is_one(&self) -> bool {
        self.0 == 1.0
    }
}

impl From<f64> for Float64 {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<Float64> for f64 {
    fn from(float: Float64) -> Self {
        float.0
    }
}

impl PseudoField for Float64 {
    fn neg_assign(&mut self) {
        self.0 = -self.0;
    }

    fn abs_assign(&mut self) {
        self.0 = self.0.abs();
    }

    fn inv_assign(&mut self) {
        self.0 = 1.0 / self.0;
    }

    fn add_assign(&mut self, rhs: &Self) {
        self.0 += rhs.0;
    }

    fn sub_assign(&mut self, rhs: &Self) {
        self.0 -= rhs.0;
    }

    fn mul_assign(&mut self, rhs: &Self) {
        self.0 *= rhs.0;
    }

    fn div_assign(&mut self, rhs: &Self) {
        self.0 /= rhs.0;
    }

    fn to_f64(&self) -> f64 {
        self.0
    }

    fn supports_exponential() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rational() {
        assert_eq!(Float64::from_rational("1", "4"), Float64::from(0.25));
        assert_eq!(Float64::from_rational("0.5", "1"), Float64::from(0.5));
        assert!(Float64::from_rational("x", "1").value().is_nan());
    }

    #[test]
    fn test_to_rational() {
        assert_eq!(
            Float64::from(0.75).to_rational(),
            ("3".to_owned(), "4".to_owned())
        );
    }
}
