//! Error types for blockmat

use thiserror::Error;

/// Result type alias using blockmat's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in block storage and generation operations
#[derive(Error, Debug)]
pub enum Error {
    /// Cell index outside the block dimensions
    #[error("Cell index ({row},{col}) out of range ({rows},{cols})")]
    IndexOutOfBounds {
        /// Requested row
        row: usize,
        /// Requested column
        col: usize,
        /// Block rows
        rows: usize,
        /// Block columns
        cols: usize,
    },

    /// Block dimensions do not match for a binary block operation
    #[error("Dimension mismatch on {op} (target={target_rows}x{target_cols}, source={source_rows}x{source_cols})")]
    DimensionMismatch {
        /// The operation name
        op: &'static str,
        /// Target block rows
        target_rows: usize,
        /// Target block columns
        target_cols: usize,
        /// Source block rows
        source_rows: usize,
        /// Source block columns
        source_cols: usize,
    },

    /// Combined non-zero count exceeds the cell count on merge
    #[error("Number of non-zeros mismatch on merge disjoint ({rows}x{cols}, nnz target={target_nnz}, nnz source={source_nnz})")]
    MergeNonZeros {
        /// Block rows
        rows: usize,
        /// Block columns
        cols: usize,
        /// Target nnz
        target_nnz: usize,
        /// Source nnz
        source_nnz: usize,
    },

    /// Invalid closed index range for slicing or left-indexing
    #[error("Invalid range [{rl}:{ru},{cl}:{cu}] for block of dimensions [{rows},{cols}]")]
    InvalidRange {
        /// Row lower bound
        rl: usize,
        /// Row upper bound (inclusive)
        ru: usize,
        /// Column lower bound
        cl: usize,
        /// Column upper bound (inclusive)
        cu: usize,
        /// Block rows
        rows: usize,
        /// Block columns
        cols: usize,
    },

    /// Dense allocation beyond the supported element count
    #[error("Dense matrix block ({rows}x{cols}) exceeds supported size of {max} elements")]
    DenseBlockTooLarge {
        /// Requested rows
        rows: usize,
        /// Requested columns
        cols: usize,
        /// Maximum supported element count
        max: usize,
    },

    /// Unknown probability distribution name
    #[error("Unsupported probability distribution \"{0}\" -- it must be one of \"uniform\", \"normal\", or \"poisson\"")]
    UnsupportedDistribution(String),

    /// Unparsable or out-of-range distribution parameter
    #[error("Invalid distribution parameter '{param}': {reason}")]
    DistributionParameter {
        /// The parameter name
        param: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Tiling produces more tiles than the addressable range
    #[error("A random matrix of size [{rows},{cols}] cannot be created: number of tiles ({tiles}) exceeds the supported maximum; increase the tile size")]
    TileCountOverflow {
        /// Matrix rows
        rows: usize,
        /// Matrix columns
        cols: usize,
        /// Computed tile count
        tiles: u64,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Unknown block-type tag encountered during deserialization
    #[error("Invalid serialized block type tag: '{0}' (must be 0-3)")]
    InvalidBlockTag(u8),

    /// Negative dimension fields in a serialized block header
    #[error("Invalid serialized block dimensions ({rows},{cols})")]
    InvalidBlockDimensions {
        /// Rows field as read from the header
        rows: i32,
        /// Columns field as read from the header
        cols: i32,
    },

    /// Serialized entry count disagrees with the recorded non-zero count
    #[error("Invalid number of serialized non-zeros: {written} (expected: {expected})")]
    NonZerosMismatch {
        /// Recorded nnz
        expected: usize,
        /// Entries actually written
        written: usize,
    },

    /// Underlying I/O failure during (de)serialization
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}
