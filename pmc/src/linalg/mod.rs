//! Numeric value types for transition weights, rates and rewards.

pub mod fields;
