//! Matrix block: metadata, payload management, cell access, and
//! representation conversion.

use crate::error::{Error, Result};

use super::format::{self, BlockLayout, MAX_DENSE_ELEMENTS, ULTRA_SPARSITY_TURN_POINT};
use super::sparse_row::SparseRow;

/// Physical payload of a block; exactly one variant is ever populated.
///
/// The inner `Option` is the lazy-allocation state: a block can carry a
/// layout decision without having allocated any storage yet. Only the
/// conversion functions, the reset family, and deserialization change the
/// variant.
#[derive(Debug, Clone)]
pub(crate) enum BlockData {
    /// Row-major array of at least `rows*cols` cells (may be over-allocated
    /// and reused across resets).
    Dense(Option<Vec<f64>>),
    /// One optional sparse row per matrix row, allocated on first write.
    Sparse(Option<Vec<Option<SparseRow>>>),
}

/// A rectangular tile of a larger matrix, the unit of storage and transfer.
///
/// The block owns its payload exclusively; all mutating operations work
/// in place and read-only consumers take `&self`. The cached non-zero count
/// is a performance hint: bulk operations document whether they maintain it,
/// and [`MatrixBlock::recompute_non_zeros`] restores exactness.
#[derive(Debug, Clone)]
pub struct MatrixBlock {
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    pub(crate) nnz: usize,
    pub(crate) data: BlockData,

    /// Capacity hint for newly created sparse rows (0 = unknown).
    pub(crate) est_nnz_per_row: usize,

    // operation-specific attributes
    pub(crate) max_row: usize,
    pub(crate) max_col: usize,
    pub(crate) group_count: Option<usize>,
    pub(crate) diag: bool,
}

impl Default for MatrixBlock {
    fn default() -> Self {
        MatrixBlock::new()
    }
}

impl MatrixBlock {
    /// Create an empty 0x0 block (sparse by default, nothing allocated).
    pub fn new() -> Self {
        MatrixBlock {
            rows: 0,
            cols: 0,
            nnz: 0,
            data: BlockData::Sparse(None),
            est_nnz_per_row: 0,
            max_row: 0,
            max_col: 0,
            group_count: None,
            diag: false,
        }
    }

    /// Create a block with the given shape and layout; storage is allocated
    /// lazily on first write.
    pub fn with_shape(rows: usize, cols: usize, layout: BlockLayout) -> Self {
        let mut blk = MatrixBlock::new();
        blk.rows = rows;
        blk.cols = cols;
        blk.data = match layout {
            BlockLayout::Dense => BlockData::Dense(None),
            BlockLayout::Sparse => BlockData::Sparse(None),
        };
        blk
    }

    /// Create a block whose layout is picked by the memory cost model from
    /// an estimated non-zero count.
    pub fn with_estimated_nnz(rows: usize, cols: usize, est_nnz: usize) -> Self {
        let cells = rows as f64 * cols as f64;
        let sparsity = if cells > 0.0 { est_nnz as f64 / cells } else { 0.0 };
        let dense_size = format::estimate_size_dense_in_memory(rows, cols);
        let sparse_size = format::estimate_size_sparse_in_memory(rows, cols, sparsity);
        let layout = if dense_size < sparse_size {
            BlockLayout::Dense
        } else {
            BlockLayout::Sparse
        };
        let mut blk = MatrixBlock::with_shape(rows, cols, layout);
        blk.est_nnz_per_row = if rows > 0 {
            (est_nnz as f64 / rows as f64).ceil() as usize
        } else {
            0
        };
        blk
    }

    ////////
    // metadata

    /// Logical number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Logical number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cached non-zero count (a hint; see [`MatrixBlock::recompute_non_zeros`]).
    #[inline]
    pub fn non_zeros(&self) -> usize {
        self.nnz
    }

    /// Overwrite the cached non-zero count.
    pub fn set_non_zeros(&mut self, nnz: usize) {
        self.nnz = nnz;
    }

    /// Current in-memory layout.
    #[inline]
    pub fn layout(&self) -> BlockLayout {
        match self.data {
            BlockData::Dense(_) => BlockLayout::Dense,
            BlockData::Sparse(_) => BlockLayout::Sparse,
        }
    }

    /// Returns true for row or column vectors.
    pub fn is_vector(&self) -> bool {
        self.rows == 1 || self.cols == 1
    }

    /// Returns true once the active payload has been allocated.
    pub fn is_allocated(&self) -> bool {
        match &self.data {
            BlockData::Dense(d) => d.is_some(),
            BlockData::Sparse(s) => s.is_some(),
        }
    }

    /// Highest row index touched while sparse (table-building operators).
    pub fn max_row(&self) -> usize {
        match self.data {
            BlockData::Dense(_) => self.rows,
            BlockData::Sparse(_) => self.max_row,
        }
    }

    /// Highest column index touched while sparse.
    pub fn max_col(&self) -> usize {
        match self.data {
            BlockData::Dense(_) => self.cols,
            BlockData::Sparse(_) => self.max_col,
        }
    }

    /// Record the high-water mark of touched indices.
    pub fn set_max_indices(&mut self, r: usize, c: usize) {
        self.max_row = r;
        self.max_col = c;
    }

    /// Cached group count for grouped-aggregate consumers.
    pub fn group_count(&self) -> Option<usize> {
        self.group_count
    }

    /// Set the cached group count.
    pub fn set_group_count(&mut self, groups: usize) {
        self.group_count = Some(groups);
    }

    /// Diagonal-structure hint flag.
    pub fn is_diag(&self) -> bool {
        self.diag
    }

    /// Mark the block as diagonal.
    pub fn set_diag(&mut self) {
        self.diag = true;
    }

    ////////
    // reset and allocation

    /// Clear all cells, keeping shape, layout and (for dense) allocated
    /// storage for reuse.
    pub fn reset(&mut self) {
        let est = self.nnz;
        self.reset_with_estimate(est);
    }

    /// Clear all cells and set the per-row capacity hint from an estimated
    /// total non-zero count.
    pub fn reset_with_estimate(&mut self, est_nnz: usize) {
        self.est_nnz_per_row = if self.rows > 0 {
            (est_nnz as f64 / self.rows as f64).ceil() as usize
        } else {
            0
        };
        match &mut self.data {
            BlockData::Sparse(rows) => {
                if let Some(rows) = rows {
                    let est = self.est_nnz_per_row;
                    for row in rows.iter_mut().flatten() {
                        row.reset(est, self.cols);
                    }
                    // keep the table in sync after shape growth
                    if rows.len() < self.rows {
                        rows.resize_with(self.rows, || None);
                    }
                }
            }
            BlockData::Dense(block) => {
                let limit = self.rows * self.cols;
                if let Some(d) = block {
                    if d.len() < limit {
                        *block = None;
                    } else {
                        d[..limit].fill(0.0);
                    }
                }
            }
        }
        self.nnz = 0;
        self.max_row = self.rows;
        self.max_col = self.cols;
        self.group_count = None;
    }

    /// Reset to a new shape, keeping the current layout.
    pub fn reset_shape(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.nnz = 0;
        self.reset();
    }

    /// Reset to a new shape and layout.
    ///
    /// This is part of the reset family and thus allowed to change the
    /// payload tag; switching layout drops the previous payload.
    pub fn reset_layout(&mut self, rows: usize, cols: usize, layout: BlockLayout) {
        if self.layout() != layout {
            self.data = match layout {
                BlockLayout::Dense => BlockData::Dense(None),
                BlockLayout::Sparse => BlockData::Sparse(None),
            };
        }
        self.reset_shape(rows, cols);
    }

    /// Reset to a new shape and layout with a non-zero estimate for sparse
    /// row pre-sizing.
    pub fn reset_full(&mut self, rows: usize, cols: usize, layout: BlockLayout, est_nnz: usize) {
        if self.layout() != layout {
            self.data = match layout {
                BlockLayout::Dense => BlockData::Dense(None),
                BlockLayout::Sparse => BlockData::Sparse(None),
            };
        }
        self.rows = rows;
        self.cols = cols;
        self.nnz = 0;
        self.reset_with_estimate(est_nnz);
    }

    /// Reset to a dense block filled with a constant value.
    pub fn reset_dense_with_value(&mut self, rows: usize, cols: usize, v: f64) -> Result<()> {
        self.est_nnz_per_row = 0;
        self.reset_layout(rows, cols, BlockLayout::Dense);
        if v == 0.0 {
            return Ok(());
        }
        self.allocate_dense_block(true)?;
        self.init_value(v, rows, cols)
    }

    /// Fill the top-left `r x c` corner with a constant (dense layout only).
    ///
    /// Used by the generation shortcut for equal-valued full-density blocks.
    pub fn init_value(&mut self, v: f64, r: usize, c: usize) -> Result<()> {
        if self.layout() != BlockLayout::Dense {
            return Err(Error::InvalidArgument {
                arg: "layout",
                reason: "init_value requires a dense block".to_string(),
            });
        }
        if r * c > self.rows * self.cols {
            return Err(Error::InvalidArgument {
                arg: "shape",
                reason: format!(
                    "init dimensions ({},{}) exceed block dimensions ({},{})",
                    r, c, self.rows, self.cols
                ),
            });
        }
        if v != 0.0 {
            self.allocate_dense_block(false)?;
            let cols = self.cols;
            let dense = self.dense_mut();
            if r * c == dense.len() {
                dense.fill(v);
            } else {
                for i in 0..r {
                    dense[i * cols..i * cols + c].fill(v);
                }
            }
            self.nnz = r * c;
        }
        self.max_row = r;
        self.max_col = c;
        Ok(())
    }

    /// Bulk-initialize from a row-major slice (dense layout only); recomputes
    /// the non-zero count.
    pub fn init_from_slice(&mut self, values: &[f64], r: usize, c: usize) -> Result<()> {
        if self.layout() != BlockLayout::Dense {
            return Err(Error::InvalidArgument {
                arg: "layout",
                reason: "init_from_slice requires a dense block".to_string(),
            });
        }
        if r * c > self.rows * self.cols || values.len() < r * c {
            return Err(Error::InvalidArgument {
                arg: "values",
                reason: format!(
                    "init dimensions ({},{}) incompatible with block ({},{}) or slice length {}",
                    r,
                    c,
                    self.rows,
                    self.cols,
                    values.len()
                ),
            });
        }
        self.allocate_dense_block(false)?;
        let cols = self.cols;
        let dense = self.dense_mut();
        for i in 0..r {
            dense[i * cols..i * cols + c].copy_from_slice(&values[i * c..(i + 1) * c]);
        }
        self.recompute_non_zeros();
        self.max_row = r;
        self.max_col = c;
        Ok(())
    }

    /// Allocate the dense payload if absent or too small.
    ///
    /// Fails hard once `rows*cols` exceeds [`MAX_DENSE_ELEMENTS`]; this is a
    /// safety valve against unbounded allocation from a single tile.
    pub fn allocate_dense_block(&mut self, clear_nnz: bool) -> Result<()> {
        let limit = self.rows.checked_mul(self.cols).unwrap_or(usize::MAX);
        if limit > MAX_DENSE_ELEMENTS {
            return Err(Error::DenseBlockTooLarge {
                rows: self.rows,
                cols: self.cols,
                max: MAX_DENSE_ELEMENTS,
            });
        }
        match &mut self.data {
            BlockData::Dense(block) => {
                // allocate if non-existing or too small (zero-initialized)
                if block.as_ref().map_or(true, |d| d.len() < limit) {
                    *block = Some(vec![0.0; limit]);
                }
            }
            BlockData::Sparse(_) => {
                return Err(Error::Internal(
                    "allocate_dense_block called on sparse block".to_string(),
                ));
            }
        }
        if clear_nnz {
            self.nnz = 0;
        }
        Ok(())
    }

    /// Allocate the sparse row table if absent or too short; individual rows
    /// stay unallocated until their first write.
    pub fn allocate_sparse_rows(&mut self, clear_nnz: bool) {
        if let BlockData::Sparse(rows) = &mut self.data {
            match rows {
                None => *rows = Some(vec![None; self.rows]),
                Some(r) if r.len() < self.rows => r.resize_with(self.rows, || None),
                _ => {}
            }
        }
        if clear_nnz {
            self.nnz = 0;
        }
    }

    /// Allocate whichever payload the current layout requires.
    pub fn allocate_payload(&mut self) -> Result<()> {
        match self.data {
            BlockData::Dense(_) => self.allocate_dense_block(false),
            BlockData::Sparse(_) => {
                self.allocate_sparse_rows(false);
                Ok(())
            }
        }
    }

    /// Drop the payload and set an unallocated layout (deserialization and
    /// empty-block handling).
    pub(crate) fn set_layout_unallocated(&mut self, layout: BlockLayout) {
        self.data = match layout {
            BlockLayout::Dense => BlockData::Dense(None),
            BlockLayout::Sparse => BlockData::Sparse(None),
        };
    }

    ////////
    // payload accessors (crate-internal hot paths)

    #[inline]
    pub(crate) fn dense(&self) -> Option<&[f64]> {
        match &self.data {
            BlockData::Dense(Some(d)) => Some(d),
            _ => None,
        }
    }

    /// Dense payload; callers must have allocated it.
    #[inline]
    pub(crate) fn dense_mut(&mut self) -> &mut Vec<f64> {
        match &mut self.data {
            BlockData::Dense(Some(d)) => d,
            _ => unreachable!("dense payload not allocated"),
        }
    }

    #[inline]
    pub(crate) fn dense_opt_mut(&mut self) -> Option<&mut Vec<f64>> {
        match &mut self.data {
            BlockData::Dense(Some(d)) => Some(d),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn sparse_rows(&self) -> Option<&[Option<SparseRow>]> {
        match &self.data {
            BlockData::Sparse(Some(s)) => Some(s),
            _ => None,
        }
    }

    /// Sparse row table; callers must have allocated it.
    #[inline]
    pub(crate) fn sparse_rows_mut(&mut self) -> &mut Vec<Option<SparseRow>> {
        match &mut self.data {
            BlockData::Sparse(Some(s)) => s,
            _ => unreachable!("sparse payload not allocated"),
        }
    }

    #[inline]
    pub(crate) fn sparse_rows_opt_mut(&mut self) -> Option<&mut Vec<Option<SparseRow>>> {
        match &mut self.data {
            BlockData::Sparse(Some(s)) => Some(s),
            _ => None,
        }
    }

    /// Get-or-create the sparse row `r` with the block's capacity hint.
    #[inline]
    pub(crate) fn sparse_row_for_write(&mut self, r: usize) -> &mut SparseRow {
        let est = self.est_nnz_per_row;
        let cols = self.cols;
        let rows = self.sparse_rows_mut();
        rows[r].get_or_insert_with(|| SparseRow::new(est, cols))
    }

    ////////
    // cell access

    /// Bounds-checked read.
    pub fn get(&self, r: usize, c: usize) -> Result<f64> {
        if r >= self.rows || c >= self.cols {
            return Err(Error::IndexOutOfBounds {
                row: r,
                col: c,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(self.quick_get(r, c))
    }

    /// Bounds-checked write; allocates the payload on first write and
    /// maintains the non-zero count.
    pub fn set(&mut self, r: usize, c: usize, v: f64) -> Result<()> {
        if r >= self.rows || c >= self.cols {
            return Err(Error::IndexOutOfBounds {
                row: r,
                col: c,
                rows: self.rows,
                cols: self.cols,
            });
        }
        match self.data {
            BlockData::Sparse(_) => self.quick_set(r, c, v),
            BlockData::Dense(_) => {
                // surface the allocation ceiling instead of panicking
                if self.dense().is_none() {
                    if v == 0.0 {
                        return Ok(());
                    }
                    self.allocate_dense_block(false)?;
                }
                self.quick_set(r, c, v);
            }
        }
        Ok(())
    }

    /// Unchecked read for hot paths; the caller has validated the indices.
    #[inline]
    pub fn quick_get(&self, r: usize, c: usize) -> f64 {
        match &self.data {
            BlockData::Sparse(rows) => match rows {
                Some(rows) => match &rows[r] {
                    Some(row) => row.get(c as u32),
                    None => 0.0,
                },
                None => 0.0,
            },
            BlockData::Dense(block) => match block {
                Some(d) => d[r * self.cols + c],
                None => 0.0,
            },
        }
    }

    /// Unchecked write for hot paths; maintains the non-zero count.
    ///
    /// Writing zero into an unallocated payload or an absent sparse cell is
    /// a no-op.
    pub fn quick_set(&mut self, r: usize, c: usize, v: f64) {
        match &mut self.data {
            BlockData::Sparse(rows) => {
                // early abort: no storage means the cell already reads 0
                let absent = match rows {
                    None => true,
                    Some(rows) => rows.get(r).map_or(true, |s| s.is_none()),
                };
                if absent && v == 0.0 {
                    return;
                }
                self.allocate_sparse_rows(false);
                let changed = self.sparse_row_for_write(r).set(c as u32, v);
                if changed {
                    if v != 0.0 {
                        self.nnz += 1;
                    } else {
                        self.nnz -= 1;
                    }
                }
            }
            BlockData::Dense(block) => {
                if block.is_none() {
                    if v == 0.0 {
                        return;
                    }
                    // shape was validated by the caller; the ceiling was
                    // checked when the layout was chosen
                    *block = Some(vec![0.0; self.rows * self.cols]);
                }
                let index = r * self.cols + c;
                let was_zero = self.dense_mut()[index] == 0.0;
                if was_zero {
                    self.nnz += 1;
                }
                self.dense_mut()[index] = v;
                if v == 0.0 {
                    self.nnz -= 1;
                }
            }
        }
    }

    /// Accumulate `v` into cell `(r,c)` without maintaining the non-zero
    /// count (callers recompute after the bulk update).
    pub fn add_value(&mut self, r: usize, c: usize, v: f64) {
        match &mut self.data {
            BlockData::Sparse(_) => {
                self.allocate_sparse_rows(false);
                let row = self.sparse_row_for_write(r);
                let cur = row.get(c as u32);
                row.set(c as u32, cur + v);
            }
            BlockData::Dense(block) => {
                if block.is_none() {
                    *block = Some(vec![0.0; self.rows * self.cols]);
                }
                let index = r * self.cols + c;
                self.dense_mut()[index] += v;
            }
        }
    }

    /// Append a value at the end of row `r`; zero values are skipped and the
    /// non-zero count always incremented otherwise.
    ///
    /// Caller contract: at most one write per cell, and for sparse layouts
    /// strictly increasing columns within each row. Violations corrupt
    /// binary-search-dependent operations until [`MatrixBlock::sort_sparse_rows`].
    pub fn append_value(&mut self, r: usize, c: usize, v: f64) {
        if v == 0.0 {
            return;
        }
        match &mut self.data {
            BlockData::Dense(block) => {
                if block.is_none() {
                    *block = Some(vec![0.0; self.rows * self.cols]);
                }
                let index = r * self.cols + c;
                self.dense_mut()[index] = v;
                self.nnz += 1;
            }
            BlockData::Sparse(_) => {
                self.allocate_sparse_rows(false);
                self.sparse_row_for_write(r).append(c as u32, v);
                self.nnz += 1;
            }
        }
    }

    /// Append an entire sparse row at row index `r`.
    pub fn append_row(&mut self, r: usize, values: &SparseRow) {
        match &mut self.data {
            BlockData::Sparse(_) => {
                self.allocate_sparse_rows(false);
                let rows = self.sparse_rows_mut();
                match &mut rows[r] {
                    Some(row) => row.copy_from(values),
                    None => rows[r] = Some(values.clone()),
                }
                self.nnz += values.size();
            }
            BlockData::Dense(_) => {
                for (i, &c) in values.indexes().iter().enumerate() {
                    self.quick_set(r, c as usize, values.values()[i]);
                }
            }
        }
    }

    /// Sort all sparse rows by column (no-op for dense blocks).
    pub fn sort_sparse_rows(&mut self) {
        if let BlockData::Sparse(Some(rows)) = &mut self.data {
            for row in rows.iter_mut().flatten() {
                if row.size() > 1 {
                    row.sort();
                }
            }
        }
    }

    ////////
    // non-zero maintenance

    /// Recount non-zeros from the payload and refresh the cache.
    pub fn recompute_non_zeros(&mut self) -> usize {
        let nnz = self.count_non_zeros();
        self.nnz = nnz;
        nnz
    }

    /// Non-mutating recount, for write paths that hold a shared reference.
    pub(crate) fn count_non_zeros(&self) -> usize {
        match &self.data {
            BlockData::Sparse(rows) => rows
                .iter()
                .flatten()
                .flatten()
                .map(|row| row.values().iter().filter(|&&v| v != 0.0).count())
                .sum(),
            BlockData::Dense(block) => match block {
                Some(d) => d[..self.rows * self.cols]
                    .iter()
                    .filter(|&&v| v != 0.0)
                    .count(),
                None => 0,
            },
        }
    }

    /// Count non-zeros in the closed sub-rectangle `[rl,ru] x [cl,cu]`
    /// without touching the cache.
    pub fn recompute_non_zeros_range(&self, rl: usize, ru: usize, cl: usize, cu: usize) -> usize {
        let mut nnz = 0;
        match &self.data {
            BlockData::Sparse(rows) => {
                if let Some(rows) = rows {
                    if cl == 0 && cu == self.cols - 1 {
                        // full row range
                        for row in rows[rl..=ru].iter().flatten() {
                            nnz += row.size();
                        }
                    } else if cl == cu {
                        for row in rows[rl..=ru].iter().flatten() {
                            if row.get(cl as u32) != 0.0 {
                                nnz += 1;
                            }
                        }
                    } else {
                        for row in rows[rl..=ru].iter().flatten() {
                            if let Some(start) = row.search_first_gte(cl as u32) {
                                nnz += row.indexes()[start..]
                                    .iter()
                                    .take_while(|&&c| c <= cu as u32)
                                    .count();
                            }
                        }
                    }
                }
            }
            BlockData::Dense(block) => {
                if let Some(d) = block {
                    for i in rl..=ru {
                        let ix = i * self.cols;
                        nnz += d[ix + cl..=ix + cu].iter().filter(|&&v| v != 0.0).count();
                    }
                }
            }
        }
        nnz
    }

    /// Debugging primitive: verify the cached non-zero count, refreshing it.
    pub fn check_non_zeros(&mut self) -> Result<()> {
        let before = self.nnz;
        let after = self.recompute_non_zeros();
        if before != after {
            return Err(Error::Internal(format!(
                "number of non-zeros incorrect: {} vs {}",
                before, after
            )));
        }
        Ok(())
    }

    /// Returns true when the block holds no non-zeros.
    ///
    /// With `safe=true` the non-zero count is recomputed first to prevent
    /// under-estimation after unmaintained bulk mutation.
    pub fn is_empty_block(&mut self, safe: bool) -> bool {
        let unallocated = !self.is_allocated();
        if self.nnz == 0 {
            if safe {
                self.recompute_non_zeros();
            }
            return self.nnz == 0;
        }
        unallocated
    }

    /// Cheap emptiness check on the cached state (no recount).
    pub(crate) fn is_empty_hint(&self) -> bool {
        !self.is_allocated() || self.nnz == 0
    }

    /// Minimum non-zero value, or `None` for an empty block.
    pub fn min_non_zero(&self) -> Option<f64> {
        let mut min: Option<f64> = None;
        for i in 0..self.rows {
            for j in 0..self.cols {
                let val = self.quick_get(i, j);
                if val != 0.0 {
                    min = Some(min.map_or(val, |m: f64| m.min(val)));
                }
            }
        }
        min
    }

    ////////
    // sparsity handling

    /// Ultra-sparse predicate (on-disk encoding concern; requires the block
    /// to already be sparse so dense vectors are not misclassified).
    pub fn is_ultra_sparse(&self) -> bool {
        if self.layout() != BlockLayout::Sparse || self.rows == 0 || self.cols == 0 {
            return false;
        }
        let sp = (self.nnz as f64 / self.rows as f64) / self.cols as f64;
        sp < ULTRA_SPARSITY_TURN_POINT && self.nnz < 40
    }

    /// Should this block be sparse in memory? Recomputes the non-zero count
    /// first when the cache reads 0, so write-path decisions see exact sizes.
    pub fn eval_sparse_format_in_memory(&mut self) -> bool {
        if self.nnz == 0 {
            self.recompute_non_zeros();
        }
        format::eval_sparse_format_in_memory(self.rows, self.cols, self.nnz)
    }

    /// Should this block be sparse on disk (or any serialized form)?
    pub fn eval_sparse_format_on_disk(&mut self) -> bool {
        if self.nnz == 0 {
            self.recompute_non_zeros();
        }
        format::eval_sparse_format_on_disk(self.rows, self.cols, self.nnz)
    }

    /// Convert the in-memory representation to whatever the cost model
    /// prefers for the current shape and non-zero count.
    ///
    /// Holds both representations transiently; see the conversion functions
    /// for the peak-memory ordering.
    pub fn exam_sparsity(&mut self) -> Result<()> {
        let target_sparse = self.eval_sparse_format_in_memory();

        // empty blocks only need their representation flag set
        if self.is_empty_block(false) {
            self.set_layout_unallocated(if target_sparse {
                BlockLayout::Sparse
            } else {
                BlockLayout::Dense
            });
            self.nnz = 0;
            return Ok(());
        }

        match (self.layout(), target_sparse) {
            (BlockLayout::Sparse, false) => self.sparse_to_dense(),
            (BlockLayout::Dense, true) => {
                self.dense_to_sparse();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Full-pass conversion to sparse layout; drops the dense payload on
    /// completion. No-op if already sparse.
    pub fn dense_to_sparse(&mut self) {
        let dense = match &mut self.data {
            BlockData::Dense(block) => block.take(),
            BlockData::Sparse(_) => return,
        };
        // set the target representation even for unallocated blocks
        self.data = BlockData::Sparse(None);
        let dense = match dense {
            Some(d) => d,
            None => return,
        };

        self.allocate_sparse_rows(true);
        let est = self.est_nnz_per_row;
        let cols = self.cols;
        let rows = self.sparse_rows_mut();
        let mut nnz = 0;
        for (i, row_slot) in rows.iter_mut().enumerate() {
            for (j, &v) in dense[i * cols..(i + 1) * cols].iter().enumerate() {
                if v != 0.0 {
                    row_slot
                        .get_or_insert_with(|| SparseRow::new(est, cols))
                        .append(j as u32, v);
                    nnz += 1;
                }
            }
        }
        self.nnz = nnz;
        // dense payload dropped here, immediately after the fill
        drop(dense);
    }

    /// Full-pass conversion to dense layout; drops the sparse payload on
    /// completion. No-op if already dense.
    ///
    /// The destination is allocated and filled before the source is freed,
    /// bounding peak memory to roughly 1.5x the larger representation.
    pub fn sparse_to_dense(&mut self) -> Result<()> {
        let sparse = match &mut self.data {
            BlockData::Sparse(rows) => rows.take(),
            BlockData::Dense(_) => return Ok(()),
        };
        self.data = BlockData::Dense(None);
        let sparse = match sparse {
            Some(s) => s,
            None => return Ok(()),
        };

        self.allocate_dense_block(false)?;
        let cols = self.cols;
        let dense = self.dense_mut();
        for (i, row) in sparse.iter().enumerate() {
            if let Some(row) = row {
                let base = i * cols;
                for (k, &c) in row.indexes().iter().enumerate() {
                    dense[base + c as usize] = row.values()[k];
                }
            }
        }
        drop(sparse);
        Ok(())
    }

    ////////
    // size estimation (instance wrappers over the closed-form models)

    /// Estimated in-memory footprint for the representation the cost model
    /// would pick at the current shape and non-zero count.
    pub fn estimate_size_in_memory(&self) -> u64 {
        let cells = self.rows as f64 * self.cols as f64;
        let sp = if cells > 0.0 { self.nnz as f64 / cells } else { 0.0 };
        format::estimate_size_in_memory(self.rows, self.cols, sp)
    }

    /// Estimated serialized size for the encoding the on-disk model would
    /// pick at the current shape and non-zero count.
    pub fn estimate_size_on_disk(&self) -> u64 {
        format::estimate_size_on_disk(self.rows, self.cols, self.nnz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_block_is_empty() {
        let mut blk = MatrixBlock::new();
        assert_eq!(blk.rows(), 0);
        assert_eq!(blk.cols(), 0);
        assert!(blk.is_empty_block(false));
        assert!(!blk.is_allocated());
    }

    #[test]
    fn test_set_get_dense() {
        let mut blk = MatrixBlock::with_shape(3, 3, BlockLayout::Dense);
        blk.set(0, 0, 1.5).unwrap();
        blk.set(2, 2, -2.0).unwrap();
        assert_eq!(blk.get(0, 0).unwrap(), 1.5);
        assert_eq!(blk.get(2, 2).unwrap(), -2.0);
        assert_eq!(blk.get(1, 1).unwrap(), 0.0);
        assert_eq!(blk.non_zeros(), 2);

        // overwrite with zero decrements
        blk.set(0, 0, 0.0).unwrap();
        assert_eq!(blk.non_zeros(), 1);
    }

    #[test]
    fn test_set_get_sparse() {
        let mut blk = MatrixBlock::with_shape(4, 4, BlockLayout::Sparse);
        // zero write without payload is a no-op and allocates nothing
        blk.set(1, 1, 0.0).unwrap();
        assert!(!blk.is_allocated());

        blk.set(1, 1, 7.0).unwrap();
        blk.set(1, 3, 8.0).unwrap();
        blk.set(3, 0, 9.0).unwrap();
        assert_eq!(blk.non_zeros(), 3);
        assert_eq!(blk.get(1, 3).unwrap(), 8.0);

        blk.set(1, 3, 0.0).unwrap();
        assert_eq!(blk.non_zeros(), 2);
        assert_eq!(blk.get(1, 3).unwrap(), 0.0);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut blk = MatrixBlock::with_shape(2, 2, BlockLayout::Dense);
        assert!(blk.get(2, 0).is_err());
        assert!(blk.set(0, 2, 1.0).is_err());
    }

    #[test]
    fn test_append_value_increments_nnz() {
        let mut blk = MatrixBlock::with_shape(2, 4, BlockLayout::Sparse);
        blk.append_value(0, 1, 2.0);
        blk.append_value(0, 3, 4.0);
        blk.append_value(1, 0, 0.0); // skipped
        assert_eq!(blk.non_zeros(), 2);
        assert_eq!(blk.quick_get(0, 3), 4.0);
    }

    #[test]
    fn test_dense_sparse_round_trip_equivalence() {
        let mut blk = MatrixBlock::with_shape(5, 5, BlockLayout::Dense);
        for (r, c, v) in [(0, 0, 1.0), (1, 3, 2.0), (4, 4, 3.0), (2, 2, -4.0)] {
            blk.set(r, c, v).unwrap();
        }
        let reference: Vec<f64> = (0..5)
            .flat_map(|r| (0..5).map(move |c| (r, c)))
            .map(|(r, c)| blk.quick_get(r, c))
            .collect();

        blk.dense_to_sparse();
        assert_eq!(blk.layout(), BlockLayout::Sparse);
        let after: Vec<f64> = (0..5)
            .flat_map(|r| (0..5).map(move |c| (r, c)))
            .map(|(r, c)| blk.quick_get(r, c))
            .collect();
        assert_eq!(reference, after);
        assert_eq!(blk.recompute_non_zeros(), 4);

        blk.sparse_to_dense().unwrap();
        assert_eq!(blk.layout(), BlockLayout::Dense);
        let back: Vec<f64> = (0..5)
            .flat_map(|r| (0..5).map(move |c| (r, c)))
            .map(|(r, c)| blk.quick_get(r, c))
            .collect();
        assert_eq!(reference, back);
        assert_eq!(blk.recompute_non_zeros(), 4);
    }

    #[test]
    fn test_exam_sparsity_converts() {
        // 10x10 with a single non-zero: still dense by the cost model at
        // this size (row overhead dominates)
        let mut blk = MatrixBlock::with_shape(10, 10, BlockLayout::Sparse);
        blk.set(0, 0, 1.0).unwrap();
        blk.exam_sparsity().unwrap();
        assert_eq!(blk.layout(), BlockLayout::Dense);
        assert_eq!(blk.quick_get(0, 0), 1.0);
    }

    #[test]
    fn test_dense_allocation_ceiling() {
        let mut blk = MatrixBlock::with_shape(1 << 16, 1 << 16, BlockLayout::Dense);
        let err = blk.allocate_dense_block(true).unwrap_err();
        match err {
            Error::DenseBlockTooLarge { rows, cols, .. } => {
                assert_eq!(rows, 1 << 16);
                assert_eq!(cols, 1 << 16);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reset_reuses_dense_storage() {
        let mut blk = MatrixBlock::with_shape(3, 3, BlockLayout::Dense);
        blk.set(1, 1, 5.0).unwrap();
        blk.reset();
        assert!(blk.is_allocated());
        assert_eq!(blk.non_zeros(), 0);
        assert_eq!(blk.quick_get(1, 1), 0.0);
    }

    #[test]
    fn test_reset_dense_with_value() {
        let mut blk = MatrixBlock::new();
        blk.reset_dense_with_value(2, 3, 1.5).unwrap();
        assert_eq!(blk.non_zeros(), 6);
        assert_eq!(blk.quick_get(1, 2), 1.5);
    }

    #[test]
    fn test_is_ultra_sparse() {
        let mut blk = MatrixBlock::with_shape(1000, 1000, BlockLayout::Sparse);
        for i in 0..10 {
            blk.set(i * 97, i * 89, 1.0).unwrap();
        }
        assert!(blk.is_ultra_sparse());

        // dense vectors never qualify
        let blk2 = MatrixBlock::with_shape(1000, 1, BlockLayout::Dense);
        assert!(!blk2.is_ultra_sparse());
    }
}
