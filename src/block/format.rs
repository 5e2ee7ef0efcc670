//! Representation selection and size estimation.
//!
//! A block lives in exactly one of two in-memory layouts (dense row-major
//! array or per-row sparse pairs) and is serialized in one of four on-disk
//! encodings. Both decisions share the same sparsity threshold but use
//! different byte-cost models, so they are evaluated independently: memory
//! and disk favor different constants.

use super::sparse_row::INITIAL_CAPACITY;

/// Density threshold below which sparse storage is considered.
///
/// Sparsity below the turn point is necessary but not sufficient: the
/// per-row overhead of sparse rows dominates at small sizes, so the cost
/// models are always consulted as well.
pub const SPARSITY_TURN_POINT: f64 = 0.4;

/// Density threshold for the ultra-sparse on-disk encoding (40 non-zeros in
/// a 1000x1000 block). In memory, ultra-sparse blocks are plain sparse.
pub const ULTRA_SPARSITY_TURN_POINT: f64 = 0.00004;

/// Serialized header: i32 rows, i32 cols, u8 type tag.
pub const HEADER_SIZE: usize = 9;

/// Hard ceiling on dense element counts, aligned with the serialized i32
/// fields. Exceeding it is a fatal allocation error, not a soft warning.
pub const MAX_DENSE_ELEMENTS: usize = i32::MAX as usize;

/// In-memory layout of a block payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLayout {
    /// Flat row-major f64 array
    Dense,
    /// Per-row (column, value) pair lists
    Sparse,
}

/// On-disk block encoding tag (wire format byte values are fixed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockType {
    /// Header only, no payload bytes
    Empty = 0,
    /// Explicit (row[,col],value) entries
    UltraSparse = 1,
    /// Per-row counts with (col,value) pairs
    Sparse = 2,
    /// Row-major doubles, no nnz field
    Dense = 3,
}

impl BlockType {
    /// Decode a wire tag; `None` for unknown values.
    pub fn from_tag(tag: u8) -> Option<BlockType> {
        match tag {
            0 => Some(BlockType::Empty),
            1 => Some(BlockType::UltraSparse),
            2 => Some(BlockType::Sparse),
            3 => Some(BlockType::Dense),
            _ => None,
        }
    }
}

/// Evaluates if a block with the given characteristics should be sparse in
/// memory.
pub fn eval_sparse_format_in_memory(rows: usize, cols: usize, nnz: usize) -> bool {
    if rows == 0 || cols == 0 {
        return false;
    }

    // sparsity threshold is necessary but not sufficient
    let sparsity = nnz as f64 / rows as f64 / cols as f64;
    let lsparse = sparsity < SPARSITY_TURN_POINT;

    // compare sparse and dense footprints in order to prevent that the
    // sparse size exceeds the dense size (dense doubles as the worst-case
    // estimate if unknown, and needs less memory traffic)
    let size_sparse = estimate_size_sparse_in_memory(rows, cols, sparsity);
    let size_dense = estimate_size_dense_in_memory(rows, cols);

    lsparse && size_sparse < size_dense
}

/// Evaluates if a block with the given characteristics should be sparse on
/// disk (in any serialized representation).
pub fn eval_sparse_format_on_disk(rows: usize, cols: usize, nnz: usize) -> bool {
    if rows == 0 || cols == 0 {
        return false;
    }

    let sparsity = nnz as f64 / rows as f64 / cols as f64;
    let lsparse = sparsity < SPARSITY_TURN_POINT;

    let size_ultra = estimate_size_ultra_sparse_on_disk(rows, cols, nnz);
    let size_sparse = estimate_size_sparse_on_disk(rows, cols, nnz);
    let size_dense = estimate_size_dense_on_disk(rows, cols);

    lsparse && (size_sparse < size_dense || size_ultra < size_dense)
}

/// Estimated in-memory footprint of a dense block in bytes.
pub fn estimate_size_dense_in_memory(rows: usize, cols: usize) -> u64 {
    // fixed object overhead + one 8-byte float per cell
    let size = 44.0 + 8.0 * rows as f64 * cols as f64;
    size.min(u64::MAX as f64) as u64
}

/// Estimated in-memory footprint of a sparse block in bytes.
///
/// Each materialized row carries a fixed 116-byte overhead plus 12 bytes per
/// (column, value) pair at a capacity of at least [`INITIAL_CAPACITY`];
/// every row additionally costs an 8-byte slot in the row table. When
/// `nnz < rows` some rows stay empty, which the `rows_nonempty` bound
/// accounts for so that extremely sparse blocks are not over-charged.
pub fn estimate_size_sparse_in_memory(rows: usize, cols: usize, sparsity: f64) -> u64 {
    let cnnz = f64::max(INITIAL_CAPACITY as f64, (sparsity * cols as f64).ceil());
    let rows_nonempty = f64::min(
        rows as f64,
        (sparsity * rows as f64 * cols as f64).ceil(),
    );
    let size = 44.0 + rows_nonempty * (116.0 + 12.0 * cnnz) + rows as f64 * 8.0;
    size.min(u64::MAX as f64) as u64
}

/// Serialized size of a dense-encoded block in bytes.
pub fn estimate_size_dense_on_disk(rows: usize, cols: usize) -> u64 {
    HEADER_SIZE as u64 + rows as u64 * cols as u64 * 8
}

/// Serialized size of a sparse-encoded block in bytes.
pub fn estimate_size_sparse_on_disk(rows: usize, cols: usize, nnz: usize) -> u64 {
    let mut size = HEADER_SIZE as u64;
    // extended header: i64 nnz only for blocks beyond the i32 cell range
    size += if rows as u64 * cols as u64 > i32::MAX as u64 {
        8
    } else {
        4
    };
    // per-row count + (col, value) pair per non-zero
    size + rows as u64 * 4 + nnz as u64 * 12
}

/// Serialized size of an ultra-sparse-encoded block in bytes.
pub fn estimate_size_ultra_sparse_on_disk(_rows: usize, cols: usize, nnz: usize) -> u64 {
    // i32 nnz field; the encoding is only reachable with nnz < rows
    let mut size = HEADER_SIZE as u64 + 4;
    if cols > 1 {
        size += nnz as u64 * 16; // (row, col, value) triples
    } else {
        size += nnz as u64 * 12; // (row, value) pairs
    }
    size
}

/// Estimated in-memory footprint for the representation the cost model
/// would pick, used by external cost-based optimizers.
pub fn estimate_size_in_memory(rows: usize, cols: usize, sparsity: f64) -> u64 {
    let nnz = (sparsity * rows as f64 * cols as f64) as usize;
    if eval_sparse_format_in_memory(rows, cols, nnz) {
        estimate_size_sparse_in_memory(rows, cols, sparsity)
    } else {
        estimate_size_dense_in_memory(rows, cols)
    }
}

/// Estimated serialized size for the encoding the on-disk model would pick.
pub fn estimate_size_on_disk(rows: usize, cols: usize, nnz: usize) -> u64 {
    if eval_sparse_format_on_disk(rows, cols, nnz) {
        if nnz < rows {
            estimate_size_ultra_sparse_on_disk(rows, cols, nnz)
        } else {
            estimate_size_sparse_on_disk(rows, cols, nnz)
        }
    } else {
        estimate_size_dense_on_disk(rows, cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_point_necessary_not_sufficient() {
        // tiny blocks stay dense even when sparse by density, because the
        // per-row overhead dominates
        assert!(!eval_sparse_format_in_memory(2, 2, 1));
        // large blocks below the turn point go sparse
        assert!(eval_sparse_format_in_memory(1000, 1000, 10_000));
        // above the turn point always dense
        assert!(!eval_sparse_format_in_memory(1000, 1000, 500_000));
    }

    #[test]
    fn test_dense_memory_estimate() {
        assert_eq!(estimate_size_dense_in_memory(10, 10), 44 + 800);
    }

    #[test]
    fn test_disk_estimates() {
        assert_eq!(estimate_size_dense_on_disk(4, 4), 9 + 128);
        // small block: i32 nnz field
        assert_eq!(estimate_size_sparse_on_disk(4, 4, 3), 9 + 4 + 16 + 36);
        // multi-column triples vs single-column pairs
        assert_eq!(estimate_size_ultra_sparse_on_disk(100, 10, 5), 9 + 4 + 80);
        assert_eq!(estimate_size_ultra_sparse_on_disk(100, 1, 5), 9 + 4 + 60);
    }

    #[test]
    fn test_on_disk_picks_ultra_when_tiny_nnz() {
        let est = estimate_size_on_disk(1000, 1000, 10);
        assert_eq!(est, estimate_size_ultra_sparse_on_disk(1000, 1000, 10));
    }

    #[test]
    fn test_block_type_tags() {
        assert_eq!(BlockType::from_tag(0), Some(BlockType::Empty));
        assert_eq!(BlockType::from_tag(3), Some(BlockType::Dense));
        assert_eq!(BlockType::from_tag(4), None);
    }
}
