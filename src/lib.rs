//! # blockmat
//!
//! **Dense/sparse matrix block storage with reproducible random generation.**
//!
//! blockmat stores rectangular matrix tiles in whichever of two layouts the
//! cost model prefers, serializes them to a compact tagged binary format, and
//! fills them with seeded pseudorandom data whose output is bit-identical
//! regardless of how many worker threads participate.
//!
//! ## Features
//!
//! - **Dual representation**: row-major dense array or per-row sparse pairs,
//!   selected and converted by closed-form memory cost models
//! - **Block operations**: copy, disjoint merge, slice, left-indexing,
//!   concatenation, elementwise scalar functions
//! - **Compact serialization**: empty, dense, sparse, and ultra-sparse
//!   on-disk encodings chosen per write from the current non-zero count
//! - **Seeded generation**: uniform, normal, and Poisson matrices at a
//!   target sparsity, plus linear sequences and random samples
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use blockmat::prelude::*;
//!
//! let rgen = RandomMatrixGenerator::from_pdf(
//!     "uniform", 1000, 1000, 250, 250, 0.05, 0.0, 1.0, None)?;
//! let mut block = MatrixBlock::new();
//! generate_random_matrix(&mut block, &rgen, Some(42), 4)?;
//!
//! let mut bytes = Vec::new();
//! block.write_to(&mut bytes)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): multi-threaded random generation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod datagen;
pub mod error;
pub mod functionobjects;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::block::{BlockLayout, BlockType, MatrixBlock, SparseRow};
    pub use crate::datagen::{
        compute_nnz_per_block, generate_random_matrix, generate_sample, generate_sequence,
        Distribution, RandomMatrixGenerator,
    };
    pub use crate::error::{Error, Result};
    pub use crate::functionobjects::Opcode;
}
