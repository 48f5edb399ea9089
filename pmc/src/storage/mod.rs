//! Storage of states and sparse transition structures.

use thiserror::Error;

pub mod bitvector;
pub mod hashmap;
pub mod matrix;

pub use bitvector::{BitVector, CompressedState};
pub use hashmap::BitVectorHashMap;
pub use matrix::{MatrixEntry, SparseMatrix, SparseMatrixBuilder};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Hash map became too big: no capacity available for {elements} elements.")]
    CapacityExhausted { elements: usize },
    #[error("Increasing the size of the hash map failed too often ({attempts} attempts).")]
    GrowthFailed { attempts: usize },
}
