//! Sparse row storage: ordered (column, value) pairs for a single matrix row.

/// Initial pair capacity for newly allocated rows.
pub const INITIAL_CAPACITY: usize = 4;

/// One matrix row stored as parallel column-index/value arrays, omitting zeros.
///
/// Pairs are kept in column order by `set`, `delete` and friends, which rely
/// on binary search. `append` pushes blindly at the end; callers that append
/// out of column order must invoke [`SparseRow::sort`] before any
/// search-dependent operation. This is a documented contract, not a checked
/// one -- violating it produces wrong lookups, not an error.
#[derive(Debug, Clone, Default)]
pub struct SparseRow {
    cols: Vec<u32>,
    vals: Vec<f64>,
}

impl SparseRow {
    /// Create an empty row with capacity for `est_nnz` pairs, capped at the
    /// row width `max_cols`.
    pub fn new(est_nnz: usize, max_cols: usize) -> Self {
        let cap = est_nnz.max(INITIAL_CAPACITY).min(max_cols.max(1));
        SparseRow {
            cols: Vec::with_capacity(cap),
            vals: Vec::with_capacity(cap),
        }
    }

    /// Number of stored pairs.
    #[inline]
    pub fn size(&self) -> usize {
        self.cols.len()
    }

    /// Returns true if the row holds no pairs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// Stored column indexes.
    #[inline]
    pub fn indexes(&self) -> &[u32] {
        &self.cols
    }

    /// Stored values, parallel to [`SparseRow::indexes`].
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.vals
    }

    /// Clear all pairs and re-align capacity with a new estimate, capped at
    /// the row width; an allocation that already fits is kept for reuse.
    pub fn reset(&mut self, est_nnz: usize, max_cols: usize) {
        self.cols.clear();
        self.vals.clear();
        let cap = est_nnz.max(INITIAL_CAPACITY).min(max_cols.max(1));
        if self.cols.capacity() < cap {
            self.cols.reserve(cap);
            self.vals.reserve(cap);
        }
    }

    /// Replace the contents of this row with a copy of `other`.
    pub fn copy_from(&mut self, other: &SparseRow) {
        self.cols.clear();
        self.vals.clear();
        self.cols.extend_from_slice(&other.cols);
        self.vals.extend_from_slice(&other.vals);
    }

    /// Append a pair at the end of the row; zero values are skipped.
    ///
    /// Caller contract: `col` must be strictly greater than every column
    /// already stored, otherwise the row is unsorted until [`SparseRow::sort`].
    #[inline]
    pub fn append(&mut self, col: u32, v: f64) {
        if v == 0.0 {
            return;
        }
        self.cols.push(col);
        self.vals.push(v);
    }

    /// Point update via binary search: insert, overwrite, or delete (`v == 0`).
    ///
    /// Returns true iff the number of stored pairs changed, which is what the
    /// owning block needs to maintain its non-zero count.
    pub fn set(&mut self, col: u32, v: f64) -> bool {
        match self.cols.binary_search(&col) {
            Ok(pos) => {
                if v == 0.0 {
                    self.cols.remove(pos);
                    self.vals.remove(pos);
                    true
                } else {
                    self.vals[pos] = v;
                    false
                }
            }
            Err(pos) => {
                if v == 0.0 {
                    return false;
                }
                self.cols.insert(pos, col);
                self.vals.insert(pos, v);
                true
            }
        }
    }

    /// Value at `col`, or 0.0 when the column holds no pair.
    pub fn get(&self, col: u32) -> f64 {
        match self.cols.binary_search(&col) {
            Ok(pos) => self.vals[pos],
            Err(_) => 0.0,
        }
    }

    /// Remove the pair at `col` if present.
    pub fn delete(&mut self, col: u32) {
        if let Ok(pos) = self.cols.binary_search(&col) {
            self.cols.remove(pos);
            self.vals.remove(pos);
        }
    }

    /// Remove all pairs in the closed column range `[cl, cu]`.
    pub fn delete_range(&mut self, cl: u32, cu: u32) {
        let start = self.cols.partition_point(|&c| c < cl);
        let end = self.cols.partition_point(|&c| c <= cu);
        if start < end {
            self.cols.drain(start..end);
            self.vals.drain(start..end);
        }
    }

    /// Overwrite the closed column range `[cl, cl+vals.len()-1]` with the
    /// non-zeros of a dense segment, dropping any pairs previously in
    /// `[cl, cu]`.
    pub fn set_range(&mut self, cl: u32, cu: u32, vals: &[f64]) {
        self.delete_range(cl, cu);
        let start = self.cols.partition_point(|&c| c < cl);
        // splice in column order; the range is empty after the delete
        let mut ins = start;
        for (j, &v) in vals.iter().enumerate() {
            if v != 0.0 {
                self.cols.insert(ins, cl + j as u32);
                self.vals.insert(ins, v);
                ins += 1;
            }
        }
    }

    /// Position of the first pair with column `>= col`, or `None` when every
    /// stored column is smaller.
    pub fn search_first_gte(&self, col: u32) -> Option<usize> {
        let pos = self.cols.partition_point(|&c| c < col);
        (pos < self.cols.len()).then_some(pos)
    }

    /// Re-establish column order after out-of-order appends.
    pub fn sort(&mut self) {
        if self.cols.len() <= 1 || self.cols.windows(2).all(|w| w[0] < w[1]) {
            return;
        }
        let mut pairs: Vec<(u32, f64)> = self
            .cols
            .iter()
            .copied()
            .zip(self.vals.iter().copied())
            .collect();
        pairs.sort_unstable_by_key(|&(c, _)| c);
        for (i, (c, v)) in pairs.into_iter().enumerate() {
            self.cols[i] = c;
            self.vals[i] = v;
        }
    }
}
