//! Dense/sparse matrix block storage.
//!
//! A [`MatrixBlock`] holds one rectangular tile of a larger matrix in exactly
//! one of two layouts, converts between them by cost model, and serializes to
//! a compact tagged binary format.

mod copy;
mod core;
pub mod format;
mod index;
mod io;
mod sparse_row;

pub use self::core::MatrixBlock;
pub use self::format::{
    BlockLayout, BlockType, HEADER_SIZE, MAX_DENSE_ELEMENTS, SPARSITY_TURN_POINT,
    ULTRA_SPARSITY_TURN_POINT,
};
pub use self::sparse_row::{SparseRow, INITIAL_CAPACITY};
