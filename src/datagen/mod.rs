//! Seeded random matrix generation.
//!
//! Fills blocks with distribution-driven pseudorandom values at a target
//! sparsity, deterministically for a given seed regardless of parallelism,
//! plus linear sequence and sampling helpers.

mod generator;
mod rand_matrix;
mod sequence;
mod stream;
mod well;

pub use generator::{Distribution, RandomMatrixGenerator};
pub use rand_matrix::{compute_nnz_per_block, generate_random_matrix};
pub use sequence::{generate_sample, generate_sequence};
pub use stream::TileRng;
pub use well::Well1024a;
