//! Explicit state-space exploration and construction of sparse probabilistic models.
//!
//! A [`NextStateGenerator`] describes a model implicitly: it produces the initial
//! states and, for every state, the choices and their weighted successors. The
//! [`ExplicitModelBuilder`] explores all reachable states and assembles a
//! [`SparseModel`], i.e., a DTMC, CTMC, MDP, Markov automaton or GSMP with its
//! transitions stored in a sparse matrix.

pub mod builder;
pub mod error;
pub mod formats;
pub mod generator;
pub mod linalg;
pub mod models;
pub mod storage;

pub use builder::{BuilderOptions, ExplicitModelBuilder, ExplorationOrder};
pub use error::{BuildError, BuildResult};
pub use generator::{NextStateGenerator, StateId};
pub use models::{ModelType, SparseModel};
