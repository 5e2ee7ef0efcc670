//! Bulk transfer between blocks: full copies, sub-rectangle copies, and
//! disjoint merges.
//!
//! These paths are performance-sensitive bulk constructors. They trust their
//! documented preconditions (disjointness for merge, empty destination range
//! for unaware copies) instead of validating per cell; violations corrupt
//! data silently rather than raising errors.

use crate::error::{Error, Result};

use super::core::MatrixBlock;
use super::format::BlockLayout;
use super::sparse_row::SparseRow;

impl MatrixBlock {
    /// Replace this block's contents with a full copy of `that`, adopting
    /// its shape and layout.
    pub fn copy(&mut self, that: &MatrixBlock) -> Result<()> {
        self.copy_with_layout(that, that.layout())
    }

    /// Replace this block's contents with a full copy of `that` in the given
    /// target layout, converting on the fly.
    pub fn copy_with_layout(&mut self, that: &MatrixBlock, layout: BlockLayout) -> Result<()> {
        self.reset_full(that.rows, that.cols, layout, that.nnz);
        if !that.is_allocated() || that.nnz == 0 {
            return Ok(());
        }

        match (layout, that.layout()) {
            (BlockLayout::Dense, BlockLayout::Dense) => {
                self.allocate_dense_block(false)?;
                let limit = that.rows * that.cols;
                let src = that.dense().unwrap_or(&[]);
                self.dense_mut()[..limit].copy_from_slice(&src[..limit]);
            }
            (BlockLayout::Sparse, BlockLayout::Sparse) => {
                self.allocate_sparse_rows(false);
                let rows = self.sparse_rows_mut();
                if let Some(src_rows) = that.sparse_rows() {
                    for (i, src_row) in src_rows.iter().take(that.rows).enumerate() {
                        rows[i] = match src_row {
                            Some(row) if !row.is_empty() => Some(row.clone()),
                            _ => None,
                        };
                    }
                }
            }
            (BlockLayout::Dense, BlockLayout::Sparse) => {
                self.allocate_dense_block(false)?;
                let cols = self.cols;
                let dense = self.dense_mut();
                if let Some(src_rows) = that.sparse_rows() {
                    for (i, src_row) in src_rows.iter().take(that.rows).enumerate() {
                        if let Some(row) = src_row {
                            let base = i * cols;
                            for (k, &c) in row.indexes().iter().enumerate() {
                                dense[base + c as usize] = row.values()[k];
                            }
                        }
                    }
                }
            }
            (BlockLayout::Sparse, BlockLayout::Dense) => {
                self.allocate_sparse_rows(false);
                let est = self.est_nnz_per_row;
                let cols = self.cols;
                let src = that.dense().unwrap_or(&[]);
                let rows = self.sparse_rows_mut();
                for (i, row_slot) in rows.iter_mut().enumerate() {
                    for (j, &v) in src[i * cols..(i + 1) * cols].iter().enumerate() {
                        if v != 0.0 {
                            row_slot
                                .get_or_insert_with(|| SparseRow::new(est, cols))
                                .append(j as u32, v);
                        }
                    }
                }
            }
        }
        self.nnz = that.nnz;
        Ok(())
    }

    /// Copy `src` into the closed sub-rectangle `[rl,ru] x [cl,cu]` of this
    /// block; `src` must have exactly the range's shape.
    ///
    /// With `aware_dest_nz` the destination range is cleared first and the
    /// non-zero count maintained exactly. Without it the clearing pass is
    /// skipped: the caller guarantees the range held no non-zeros, which is
    /// what bulk construction from disjoint pieces relies on.
    pub fn copy_range(
        &mut self,
        src: &MatrixBlock,
        rl: usize,
        ru: usize,
        cl: usize,
        cu: usize,
        aware_dest_nz: bool,
    ) -> Result<()> {
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
        let m = ru - rl + 1;
        let n = cu - cl + 1;
        if src.rows != m || src.cols != n {
            return Err(Error::DimensionMismatch {
                op: "copy_range",
                target_rows: m,
                target_cols: n,
                source_rows: src.rows,
                source_cols: src.cols,
            });
        }

        // empty source: only the clearing pass remains
        if src.is_empty_hint() {
            if aware_dest_nz && self.is_allocated() {
                self.clear_range(rl, ru, cl, cu);
            }
            return Ok(());
        }

        match self.layout() {
            BlockLayout::Sparse => self.copy_range_to_sparse(src, rl, cl, cu, aware_dest_nz),
            BlockLayout::Dense => self.copy_range_to_dense(src, rl, ru, cl, cu, aware_dest_nz),
        }
    }

    /// Zero out the closed sub-rectangle, maintaining the non-zero count.
    pub(crate) fn clear_range(&mut self, rl: usize, ru: usize, cl: usize, cu: usize) {
        let mut nnz = self.nnz;
        match self.layout() {
            BlockLayout::Sparse => {
                if let Some(rows) = self.sparse_rows_opt_mut() {
                    for row in rows[rl..=ru].iter_mut().flatten() {
                        let before = row.size();
                        row.delete_range(cl as u32, cu as u32);
                        nnz -= before - row.size();
                    }
                }
            }
            BlockLayout::Dense => {
                let cols = self.cols;
                if let Some(dense) = self.dense_opt_mut() {
                    for i in rl..=ru {
                        let base = i * cols;
                        for v in &mut dense[base + cl..=base + cu] {
                            if *v != 0.0 {
                                nnz -= 1;
                                *v = 0.0;
                            }
                        }
                    }
                }
            }
        }
        self.nnz = nnz;
    }

    fn copy_range_to_sparse(
        &mut self,
        src: &MatrixBlock,
        rl: usize,
        cl: usize,
        cu: usize,
        aware_dest_nz: bool,
    ) -> Result<()> {
        self.allocate_sparse_rows(false);
        let est = self.est_nnz_per_row;
        let cols = self.cols;
        let mut nnz = self.nnz;
        let rows = self.sparse_rows_mut();

        for i in 0..src.rows {
            let r = rl + i;
            if aware_dest_nz {
                if let Some(row) = rows[r].as_mut() {
                    let before = row.size();
                    row.delete_range(cl as u32, cu as u32);
                    nnz -= before - row.size();
                }
            }
            match src.layout() {
                BlockLayout::Sparse => {
                    let src_row = src.sparse_rows().and_then(|rs| rs.get(i)?.as_ref());
                    if let Some(src_row) = src_row {
                        if src_row.is_empty() {
                            continue;
                        }
                        let dest = rows[r].get_or_insert_with(|| SparseRow::new(est, cols));
                        for (k, &c) in src_row.indexes().iter().enumerate() {
                            if dest.set(cl as u32 + c, src_row.values()[k]) {
                                nnz += 1;
                            }
                        }
                    }
                }
                BlockLayout::Dense => {
                    let src_dense = src.dense().unwrap_or(&[]);
                    let seg = &src_dense[i * src.cols..(i + 1) * src.cols];
                    if seg.iter().all(|&v| v == 0.0) {
                        continue;
                    }
                    let dest = rows[r].get_or_insert_with(|| SparseRow::new(est, cols));
                    for (j, &v) in seg.iter().enumerate() {
                        if v != 0.0 && dest.set((cl + j) as u32, v) {
                            nnz += 1;
                        }
                    }
                }
            }
        }
        self.nnz = nnz;
        Ok(())
    }

    fn copy_range_to_dense(
        &mut self,
        src: &MatrixBlock,
        rl: usize,
        ru: usize,
        cl: usize,
        cu: usize,
        aware_dest_nz: bool,
    ) -> Result<()> {
        if aware_dest_nz && self.is_allocated() {
            self.clear_range(rl, ru, cl, cu);
        }
        self.allocate_dense_block(false)?;
        let cols = self.cols;
        let mut nnz = self.nnz;
        let dense = self.dense_mut();

        match src.layout() {
            BlockLayout::Sparse => {
                if let Some(src_rows) = src.sparse_rows() {
                    for (i, src_row) in src_rows.iter().take(src.rows).enumerate() {
                        if let Some(row) = src_row {
                            let base = (rl + i) * cols + cl;
                            for (k, &c) in row.indexes().iter().enumerate() {
                                let v = row.values()[k];
                                let cell = &mut dense[base + c as usize];
                                if *cell == 0.0 && v != 0.0 {
                                    nnz += 1;
                                } else if *cell != 0.0 && v == 0.0 {
                                    nnz -= 1;
                                }
                                *cell = v;
                            }
                        }
                    }
                }
            }
            BlockLayout::Dense => {
                let src_dense = src.dense().unwrap_or(&[]);
                for i in 0..src.rows {
                    let base = (rl + i) * cols + cl;
                    let seg = &src_dense[i * src.cols..(i + 1) * src.cols];
                    let dest = &mut dense[base..base + (cu - cl + 1)];
                    // range was cleared (aware) or empty by contract (unaware)
                    nnz += seg.iter().filter(|&&v| v != 0.0).count();
                    dest.copy_from_slice(seg);
                }
            }
        }
        self.nnz = nnz;
        Ok(())
    }

    /// Disjoint union: add `that`'s non-zeros into this block.
    ///
    /// Caller contract: the two blocks must not overlap on a non-zero cell.
    /// Only the non-zero counts are sanity-checked against the cell count;
    /// overlap itself is not detected. With `append_only` the post-merge
    /// sort of touched sparse rows is skipped and the caller must invoke
    /// [`MatrixBlock::sort_sparse_rows`] before any search-dependent access.
    pub fn merge(&mut self, that: &MatrixBlock, append_only: bool) -> Result<()> {
        if self.rows != that.rows || self.cols != that.cols {
            return Err(Error::DimensionMismatch {
                op: "merge",
                target_rows: self.rows,
                target_cols: self.cols,
                source_rows: that.rows,
                source_cols: that.cols,
            });
        }
        if self.nnz + that.nnz > self.rows * self.cols {
            return Err(Error::MergeNonZeros {
                rows: self.rows,
                cols: self.cols,
                target_nnz: self.nnz,
                source_nnz: that.nnz,
            });
        }
        if that.is_empty_hint() {
            return Ok(());
        }
        if self.is_empty_hint() {
            return self.copy_with_layout(that, self.layout());
        }

        match self.layout() {
            BlockLayout::Dense => self.merge_into_dense(that)?,
            BlockLayout::Sparse => {
                self.merge_into_sparse(that);
                if !append_only {
                    self.sort_sparse_rows();
                }
            }
        }
        Ok(())
    }

    fn merge_into_dense(&mut self, that: &MatrixBlock) -> Result<()> {
        self.allocate_dense_block(false)?;
        let cols = self.cols;
        let mut nnz = self.nnz;
        let dense = self.dense_mut();

        match that.layout() {
            BlockLayout::Dense => {
                let limit = that.rows * that.cols;
                let src = that.dense().unwrap_or(&[]);
                for (cell, &v) in dense[..limit].iter_mut().zip(&src[..limit]) {
                    if v != 0.0 {
                        if *cell == 0.0 {
                            nnz += 1;
                        }
                        *cell = v;
                    }
                }
            }
            BlockLayout::Sparse => {
                if let Some(src_rows) = that.sparse_rows() {
                    for (i, src_row) in src_rows.iter().take(that.rows).enumerate() {
                        if let Some(row) = src_row {
                            let base = i * cols;
                            for (k, &c) in row.indexes().iter().enumerate() {
                                let v = row.values()[k];
                                if v != 0.0 {
                                    let cell = &mut dense[base + c as usize];
                                    if *cell == 0.0 {
                                        nnz += 1;
                                    }
                                    *cell = v;
                                }
                            }
                        }
                    }
                }
            }
        }
        self.nnz = nnz;
        Ok(())
    }

    /// Append `that`'s non-zeros into this sparse block, shifted by the
    /// given row and column offsets, using blind row appends.
    ///
    /// This is the bulk-construction path for concatenation: the target
    /// range is empty and each destination row receives columns in ascending
    /// order, so no binary searches and no post-sort are needed. Callers
    /// appending out of column order must invoke
    /// [`MatrixBlock::sort_sparse_rows`] afterwards.
    pub fn append_to_sparse(&mut self, that: &MatrixBlock, row_offset: usize, col_offset: usize) {
        if that.is_empty_hint() {
            return;
        }
        self.allocate_sparse_rows(false);
        let est = self.est_nnz_per_row;
        let cols = self.cols;
        let mut nnz = self.nnz;
        let rows = self.sparse_rows_mut();

        match that.layout() {
            BlockLayout::Sparse => {
                if let Some(src_rows) = that.sparse_rows() {
                    for (i, src_row) in src_rows.iter().take(that.rows).enumerate() {
                        let src_row = match src_row {
                            Some(row) if !row.is_empty() => row,
                            _ => continue,
                        };
                        let dest = rows[row_offset + i]
                            .get_or_insert_with(|| SparseRow::new(est, cols));
                        for (k, &c) in src_row.indexes().iter().enumerate() {
                            let v = src_row.values()[k];
                            if v != 0.0 {
                                dest.append(col_offset as u32 + c, v);
                                nnz += 1;
                            }
                        }
                    }
                }
            }
            BlockLayout::Dense => {
                let src = that.dense().unwrap_or(&[]);
                for i in 0..that.rows {
                    let seg = &src[i * that.cols..(i + 1) * that.cols];
                    if seg.iter().all(|&v| v == 0.0) {
                        continue;
                    }
                    let dest =
                        rows[row_offset + i].get_or_insert_with(|| SparseRow::new(est, cols));
                    for (j, &v) in seg.iter().enumerate() {
                        if v != 0.0 {
                            dest.append((col_offset + j) as u32, v);
                            nnz += 1;
                        }
                    }
                }
            }
        }
        self.nnz = nnz;
    }

    fn merge_into_sparse(&mut self, that: &MatrixBlock) {
        self.allocate_sparse_rows(false);
        let est = self.est_nnz_per_row;
        let cols = self.cols;
        let mut nnz = self.nnz;
        let rows = self.sparse_rows_mut();

        match that.layout() {
            BlockLayout::Sparse => {
                if let Some(src_rows) = that.sparse_rows() {
                    for (i, src_row) in src_rows.iter().take(that.rows).enumerate() {
                        let src_row = match src_row {
                            Some(row) if !row.is_empty() => row,
                            _ => continue,
                        };
                        match &mut rows[i] {
                            slot @ None => {
                                *slot = Some(src_row.clone());
                                nnz += src_row.size();
                            }
                            Some(dest) => {
                                // blind appends; row order restored by the
                                // caller-controlled sort
                                for (k, &c) in src_row.indexes().iter().enumerate() {
                                    dest.append(c, src_row.values()[k]);
                                }
                                nnz += src_row.size();
                            }
                        }
                    }
                }
            }
            BlockLayout::Dense => {
                let src = that.dense().unwrap_or(&[]);
                for (i, row_slot) in rows.iter_mut().enumerate() {
                    for (j, &v) in src[i * cols..(i + 1) * cols].iter().enumerate() {
                        if v != 0.0 {
                            row_slot
                                .get_or_insert_with(|| SparseRow::new(est, cols))
                                .append(j as u32, v);
                            nnz += 1;
                        }
                    }
                }
            }
        }
        self.nnz = nnz;
    }
}
