use std::{
    fmt::Display,
    hash::Hash,
    ops::{Add, Mul, Sub},
    str::FromStr,
};

use super::{Field, FromRational, PseudoField, ToRational};
use log::warn;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// An arbitrary-precision rational number implementing [`Field`].
///
/// Currently this is based on [`num_rational::BigRational`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Rational(BigRational);

impl Rational {
    pub fn numer(&self) -> String {
        self.0.numer().to_string()
    }

    pub fn denom(&self) -> String {
        self.0.denom().to_string()
    }

    /// Parses a single decimal or fractional literal such as `3`, `0.25` or `1/3`.
    fn parse_literal(literal: &str) -> Option<BigRational> {
        let literal = literal.trim();
        if let Ok(ratio) = BigRational::from_str(literal) {
            return Some(ratio);
        }
        // Decimal literals are read exactly, e.g. `0.1` becomes `1/10`.
        let (negative, digits) = match literal.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, literal),
        };
        let (integral, fractional) = digits.split_once('.')?;
        let scale = BigInt::from(10).pow(fractional.len() as u32);
        let mantissa = BigInt::from_str(&format!("{integral}{fractional}")).ok()?;
        let ratio = BigRational::new(mantissa, scale);
        Some(if negative { -ratio } else { ratio })
    }
}

impl Field for Rational {}

impl Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_integer() {
            write!(f, "{}", self.numer())
        } else {
            write!(f, "{}/{}", self.numer(), self.denom())
        }
    }
}

impl From<Rational> for f64 {
    fn from(rational: Rational) -> Self {
        rational.to_f64()
    }
}

impl From<f64> for Rational {
    fn from(value: f64) -> Self {
        Self(BigRational::from_float(value).unwrap_or_else(|| {
            warn!("Unable to represent {value} as a rational, using zero.");
            BigRational::zero()
        }))
    }
}

impl num_traits::One for Rational {
    fn one() -> Self {
        Self(BigRational::one())
    }

    fn is_one(&self) -> bool {
        self.0.is_one()
    }
}

impl num_traits::Zero for Rational {
    fn zero() -> Self {
        Self(BigRational::zero())
    }

    fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Rational {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Rational {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul for Rational {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl FromRational for Rational {
    fn from_rational(numerator: &str, denominator: &str) -> Self {
        match (Self::parse_literal(numerator), Self::parse_literal(denominator)) {
            (Some(numerator), Some(denominator)) if !denominator.is_zero() => {
                Self(numerator / denominator)
            }
            _ => {
                warn!("Unable to parse {numerator}/{denominator} as a rational, using zero.");
                Self::zero()
            }
        }
    }
}

impl ToRational for Rational {
    fn to_rational(&self) -> (String, String) {
        (self.numer(), self.denom())
    }
}

impl PseudoField for Rational {
    fn neg_assign(&mut self) {
        self.0 = -self.0.clone();
    }

    fn abs_assign(&mut self) {
        self.0 = self.0.abs();
    }

    fn inv_assign(&mut self) {
        self.0 = self.0.recip();
    }

    fn add_assign(&mut self, rhs: &Self) {
        self.0 += &rhs.0;
    }

    fn sub_assign(&mut self, rhs: &Self) {
        self.0 -= &rhs.0;
    }

    fn mul_assign(&mut self, rhs: &Self) {
        self.0 *= &rhs.0;
    }

    fn div_assign(&mut self, rhs: &Self) {
        self.0 /= &rhs.0;
    }

    fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }

    fn supports_exponential() -> bool {
        false
    }

    fn is_close(&self, other: &Self, tolerance: f64) -> bool {
        if tolerance == 0.0 {
            return self == other;
        }
        (self.0.clone() - other.0.clone()).abs() <= Self::from(tolerance).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literals() {
        assert_eq!(Rational::from_rational("1", "3").to_string(), "1/3");
        assert_eq!(Rational::from_rational("0.25", "1").to_string(), "1/4");
        assert_eq!(Rational::from_rational("-1.5", "1").to_string(), "-3/2");
        assert_eq!(Rational::from_rational("2/4", "1").to_string(), "1/2");
        assert!(Rational::from_rational("1", "0").is_zero());
    }

    #[test]
    fn test_exact_arithmetic() {
        let mut value = Rational::from_rational("1", "10");
        for _ in 0..9 {
            value.add_assign(&Rational::from_rational("1", "10"));
        }
        assert!(value.is_one());
        assert!(value.is_close(&Rational::one(), 0.0));
    }
}
