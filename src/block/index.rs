//! Indexed access producing or updating sub-rectangles: slicing,
//! left-indexing, and block concatenation.

use crate::error::{Error, Result};

use super::core::MatrixBlock;
use super::format::{self, BlockLayout};

impl MatrixBlock {
    fn check_range(&self, rl: usize, ru: usize, cl: usize, cu: usize) -> Result<()> {
        if rl > ru || cl > cu || ru >= self.rows || cu >= self.cols {
            return Err(Error::InvalidRange {
                rl,
                ru,
                cl,
                cu,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    /// Extract the closed sub-rectangle `[rl,ru] x [cl,cu]` as a new block.
    ///
    /// The result layout is chosen from the estimated sub-block sparsity,
    /// not inherited. A full-matrix slice degenerates to a plain copy.
    pub fn slice(&self, rl: usize, ru: usize, cl: usize, cu: usize) -> Result<MatrixBlock> {
        self.check_range(rl, ru, cl, cu)?;

        if rl == 0 && ru == self.rows - 1 && cl == 0 && cu == self.cols - 1 {
            return Ok(self.clone());
        }

        let m = ru - rl + 1;
        let n = cu - cl + 1;
        let est_nnz = self.nnz.min(m * n);
        let layout = if format::eval_sparse_format_in_memory(m, n, est_nnz) {
            BlockLayout::Sparse
        } else {
            BlockLayout::Dense
        };
        let mut out = MatrixBlock::with_shape(m, n, layout);
        if self.is_empty_hint() {
            return Ok(out);
        }

        match self.layout() {
            BlockLayout::Sparse if n == 1 => self.slice_sparse_column(&mut out, rl, ru, cl)?,
            BlockLayout::Sparse => self.slice_sparse_general(&mut out, rl, ru, cl, cu)?,
            BlockLayout::Dense => self.slice_dense(&mut out, rl, ru, cl, cu)?,
        }
        out.recompute_non_zeros();
        Ok(out)
    }

    /// Column-vector slice from a sparse source: one binary search per row
    /// beats scanning pair lists.
    fn slice_sparse_column(&self, out: &mut MatrixBlock, rl: usize, ru: usize, cl: usize) -> Result<()> {
        let rows = match self.sparse_rows() {
            Some(rows) => rows,
            None => return Ok(()),
        };
        for (i, row) in rows[rl..=ru].iter().enumerate() {
            if let Some(row) = row {
                let v = row.get(cl as u32);
                if v != 0.0 {
                    out.append_value(i, 0, v);
                }
            }
        }
        Ok(())
    }

    fn slice_sparse_general(
        &self,
        out: &mut MatrixBlock,
        rl: usize,
        ru: usize,
        cl: usize,
        cu: usize,
    ) -> Result<()> {
        let rows = match self.sparse_rows() {
            Some(rows) => rows,
            None => return Ok(()),
        };
        if out.layout() == BlockLayout::Dense {
            out.allocate_dense_block(false)?;
        }
        for (i, row) in rows[rl..=ru].iter().enumerate() {
            let row = match row {
                Some(row) if !row.is_empty() => row,
                _ => continue,
            };
            if let Some(start) = row.search_first_gte(cl as u32) {
                let idx = row.indexes();
                let vals = row.values();
                for k in start..row.size() {
                    if idx[k] > cu as u32 {
                        break;
                    }
                    out.append_value(i, (idx[k] as usize) - cl, vals[k]);
                }
            }
        }
        Ok(())
    }

    fn slice_dense(
        &self,
        out: &mut MatrixBlock,
        rl: usize,
        ru: usize,
        cl: usize,
        cu: usize,
    ) -> Result<()> {
        let src = match self.dense() {
            Some(d) => d,
            None => return Ok(()),
        };
        let n = cu - cl + 1;
        match out.layout() {
            BlockLayout::Dense => {
                out.allocate_dense_block(false)?;
                let cols = self.cols;
                let dense = out.dense_mut();
                for i in 0..=(ru - rl) {
                    let base = (rl + i) * cols + cl;
                    dense[i * n..(i + 1) * n].copy_from_slice(&src[base..base + n]);
                }
            }
            BlockLayout::Sparse => {
                for i in 0..=(ru - rl) {
                    let base = (rl + i) * self.cols + cl;
                    for (j, &v) in src[base..base + n].iter().enumerate() {
                        out.append_value(i, j, v);
                    }
                }
            }
        }
        Ok(())
    }

    /// Estimated post-write sparsity of `self` after left-indexing `rhs_nnz`
    /// non-zeros into it (worst case: no overwritten non-zeros).
    fn estimate_nnz_on_left_indexing(&self, rhs_nnz: usize) -> usize {
        (self.nnz + rhs_nnz).min(self.rows * self.cols)
    }

    /// Write `rhs` into the closed sub-rectangle `[rl,ru] x [cl,cu]` of this
    /// block, mutating it directly.
    ///
    /// The representation is converted up front when the post-write sparsity
    /// estimate demands it; the write itself then runs in the final layout.
    /// Callers use this variant when the optimizer knows the block has a
    /// single live reference.
    pub fn left_index_in_place(
        &mut self,
        rhs: &MatrixBlock,
        rl: usize,
        ru: usize,
        cl: usize,
        cu: usize,
    ) -> Result<()> {
        self.check_range(rl, ru, cl, cu)?;
        if rhs.rows != ru - rl + 1 || rhs.cols != cu - cl + 1 {
            return Err(Error::DimensionMismatch {
                op: "left_index",
                target_rows: ru - rl + 1,
                target_cols: cu - cl + 1,
                source_rows: rhs.rows,
                source_cols: rhs.cols,
            });
        }

        let est_nnz = self.estimate_nnz_on_left_indexing(rhs.nnz);
        let target_sparse = format::eval_sparse_format_in_memory(self.rows, self.cols, est_nnz);
        match (self.layout(), target_sparse) {
            (BlockLayout::Dense, true) => self.dense_to_sparse(),
            (BlockLayout::Sparse, false) => self.sparse_to_dense()?,
            _ => {}
        }
        self.copy_range(rhs, rl, ru, cl, cu, true)
    }

    /// Copy-on-write left-indexing: returns a fresh block with `rhs` written
    /// into the sub-rectangle, leaving `self` untouched.
    pub fn left_index(
        &self,
        rhs: &MatrixBlock,
        rl: usize,
        ru: usize,
        cl: usize,
        cu: usize,
    ) -> Result<MatrixBlock> {
        let est_nnz = self.estimate_nnz_on_left_indexing(rhs.nnz);
        let target_sparse = format::eval_sparse_format_in_memory(self.rows, self.cols, est_nnz);
        let layout = if target_sparse {
            BlockLayout::Sparse
        } else {
            BlockLayout::Dense
        };
        let mut out = MatrixBlock::new();
        out.copy_with_layout(self, layout)?;
        out.left_index_in_place(rhs, rl, ru, cl, cu)?;
        Ok(out)
    }

    /// Single-cell left-indexing: a fresh copy with cell `(r,c)` set to `v`.
    pub fn left_index_scalar(&self, r: usize, c: usize, v: f64) -> Result<MatrixBlock> {
        let mut out = self.clone();
        out.set(r, c, v)?;
        Ok(out)
    }

    /// Concatenate `that` to the right (`cbind`) or below into a new block.
    ///
    /// The output representation is chosen once from the combined non-zero
    /// estimate, not inherited from either input.
    pub fn append_block(&self, that: &MatrixBlock, cbind: bool) -> Result<MatrixBlock> {
        if cbind && self.rows != that.rows || !cbind && self.cols != that.cols {
            return Err(Error::DimensionMismatch {
                op: "append",
                target_rows: self.rows,
                target_cols: self.cols,
                source_rows: that.rows,
                source_cols: that.cols,
            });
        }

        let (m, n) = if cbind {
            (self.rows, self.cols + that.cols)
        } else {
            (self.rows + that.rows, self.cols)
        };
        let est_nnz = self.nnz + that.nnz;
        let layout = if format::eval_sparse_format_in_memory(m, n, est_nnz) {
            BlockLayout::Sparse
        } else {
            BlockLayout::Dense
        };
        let mut out = MatrixBlock::with_shape(m, n, layout);
        out.est_nnz_per_row = if m > 0 {
            (est_nnz as f64 / m as f64).ceil() as usize
        } else {
            0
        };

        // both ranges are disjoint and empty in the fresh output
        let (rl, cl) = if cbind { (0, self.cols) } else { (self.rows, 0) };
        match layout {
            BlockLayout::Sparse => {
                // blind offset appends; within a destination row the second
                // operand's columns all land after the first's, so every row
                // stays sorted
                out.append_to_sparse(self, 0, 0);
                out.append_to_sparse(that, rl, cl);
            }
            BlockLayout::Dense => {
                if self.rows > 0 && self.cols > 0 {
                    out.copy_range(self, 0, self.rows - 1, 0, self.cols - 1, false)?;
                }
                if that.rows > 0 && that.cols > 0 {
                    out.copy_range(that, rl, rl + that.rows - 1, cl, cl + that.cols - 1, false)?;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(rows: usize, cols: usize, layout: BlockLayout, cells: &[(usize, usize, f64)]) -> MatrixBlock {
        let mut blk = MatrixBlock::with_shape(rows, cols, layout);
        for &(r, c, v) in cells {
            blk.set(r, c, v).unwrap();
        }
        blk
    }

    #[test]
    fn test_slice_general() {
        let blk = filled(
            4,
            4,
            BlockLayout::Dense,
            &[(0, 0, 1.0), (1, 1, 2.0), (2, 2, 3.0), (3, 3, 4.0)],
        );
        let sub = blk.slice(1, 2, 1, 2).unwrap();
        assert_eq!(sub.rows(), 2);
        assert_eq!(sub.cols(), 2);
        assert_eq!(sub.quick_get(0, 0), 2.0);
        assert_eq!(sub.quick_get(1, 1), 3.0);
        assert_eq!(sub.non_zeros(), 2);
    }

    #[test]
    fn test_slice_full_matrix_is_copy() {
        let blk = filled(3, 3, BlockLayout::Sparse, &[(0, 2, 1.0), (2, 0, 2.0)]);
        let full = blk.slice(0, 2, 0, 2).unwrap();
        assert_eq!(full.layout(), blk.layout());
        assert_eq!(full.non_zeros(), 2);
        assert_eq!(full.quick_get(0, 2), 1.0);
    }

    #[test]
    fn test_slice_sparse_column_vector() {
        let blk = filled(
            100,
            50,
            BlockLayout::Sparse,
            &[(3, 7, 1.0), (10, 7, 2.0), (10, 8, 9.0), (99, 7, 3.0)],
        );
        let col = blk.slice(0, 99, 7, 7).unwrap();
        assert_eq!(col.cols(), 1);
        assert_eq!(col.non_zeros(), 3);
        assert_eq!(col.quick_get(10, 0), 2.0);
        assert_eq!(col.quick_get(10, 0), 2.0);
        assert_eq!(col.quick_get(99, 0), 3.0);
    }

    #[test]
    fn test_slice_invalid_range() {
        let blk = MatrixBlock::with_shape(3, 3, BlockLayout::Dense);
        assert!(matches!(blk.slice(0, 3, 0, 2), Err(Error::InvalidRange { .. })));
        assert!(matches!(blk.slice(2, 1, 0, 2), Err(Error::InvalidRange { .. })));
    }

    #[test]
    fn test_left_index_copy_preserves_source() {
        let base = filled(3, 3, BlockLayout::Dense, &[(0, 0, 1.0)]);
        let rhs = filled(2, 2, BlockLayout::Dense, &[(0, 0, 7.0), (1, 1, 8.0)]);
        let out = base.left_index(&rhs, 1, 2, 1, 2).unwrap();
        assert_eq!(out.quick_get(1, 1), 7.0);
        assert_eq!(out.quick_get(2, 2), 8.0);
        assert_eq!(out.quick_get(0, 0), 1.0);
        // source untouched
        assert_eq!(base.quick_get(1, 1), 0.0);
        assert_eq!(base.non_zeros(), 1);
    }

    #[test]
    fn test_left_index_in_place_overwrites() {
        let mut blk = filled(3, 3, BlockLayout::Dense, &[(1, 1, 9.0), (1, 2, 9.0)]);
        let rhs = filled(1, 2, BlockLayout::Dense, &[(0, 0, 5.0)]);
        blk.left_index_in_place(&rhs, 1, 1, 1, 2).unwrap();
        assert_eq!(blk.quick_get(1, 1), 5.0);
        assert_eq!(blk.quick_get(1, 2), 0.0);
        assert_eq!(blk.non_zeros(), 1);
    }

    #[test]
    fn test_left_index_scalar() {
        let base = filled(2, 2, BlockLayout::Dense, &[(0, 0, 1.0)]);
        let out = base.left_index_scalar(1, 1, 3.0).unwrap();
        assert_eq!(out.quick_get(1, 1), 3.0);
        assert_eq!(base.quick_get(1, 1), 0.0);
    }

    #[test]
    fn test_append_cbind_and_rbind() {
        let a = filled(2, 2, BlockLayout::Dense, &[(0, 0, 1.0), (1, 1, 2.0)]);
        let b = filled(2, 1, BlockLayout::Dense, &[(0, 0, 3.0)]);
        let wide = a.append_block(&b, true).unwrap();
        assert_eq!((wide.rows(), wide.cols()), (2, 3));
        assert_eq!(wide.quick_get(0, 2), 3.0);
        assert_eq!(wide.non_zeros(), 3);

        let c = filled(1, 2, BlockLayout::Dense, &[(0, 1, 4.0)]);
        let tall = a.append_block(&c, false).unwrap();
        assert_eq!((tall.rows(), tall.cols()), (3, 2));
        assert_eq!(tall.quick_get(2, 1), 4.0);
        assert_eq!(tall.non_zeros(), 3);
    }

    #[test]
    fn test_append_dimension_mismatch() {
        let a = MatrixBlock::with_shape(2, 2, BlockLayout::Dense);
        let b = MatrixBlock::with_shape(3, 3, BlockLayout::Dense);
        assert!(matches!(
            a.append_block(&b, true),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
