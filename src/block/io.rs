//! Binary block serialization.
//!
//! The wire format is big-endian and fixed for interop with persisted data:
//! an `i32 rows, i32 cols, u8 tag` header followed by a tag-specific payload.
//! The encoding is chosen per write call from the current shape and non-zero
//! count; the in-memory layout on read is chosen independently by the
//! in-memory cost model, so a round trip may legitimately change layout while
//! preserving every cell value.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::trace;

use crate::error::{Error, Result};

use super::core::MatrixBlock;
use super::format::{self, BlockLayout, BlockType, HEADER_SIZE};

/// Does the serialized sparse encoding need an i64 nnz field?
fn wide_nnz_field(rows: usize, cols: usize) -> bool {
    rows as u64 * cols as u64 > i32::MAX as u64
}

impl MatrixBlock {
    /// Serialize the block, choosing the most compact encoding for the
    /// current non-zero count.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        // never trust a zero cache on the write path
        let nnz = if self.nnz == 0 {
            self.count_non_zeros()
        } else {
            self.nnz
        };

        if nnz == 0 {
            return self.write_header(w, BlockType::Empty);
        }

        let sparse_dst = format::eval_sparse_format_on_disk(self.rows, self.cols, nnz);
        match (self.layout(), sparse_dst) {
            (BlockLayout::Dense, false) => self.write_dense_block(w),
            (BlockLayout::Dense, true) => self.write_dense_to_sparse(w, nnz),
            (BlockLayout::Sparse, true) => {
                if self.is_ultra_sparse() {
                    self.write_sparse_to_ultra_sparse(w, nnz)
                } else {
                    self.write_sparse_block(w, nnz)
                }
            }
            (BlockLayout::Sparse, false) => self.write_sparse_to_dense(w),
        }
    }

    /// Deserialize a block; the in-memory layout is picked by the cost model,
    /// independent of the on-disk encoding.
    ///
    /// Any failure leaves no partially populated block behind: the result is
    /// only handed out on success.
    pub fn read_from<R: Read>(r: &mut R) -> Result<MatrixBlock> {
        let rows = r.read_i32::<BigEndian>()?;
        let cols = r.read_i32::<BigEndian>()?;
        if rows < 0 || cols < 0 {
            return Err(Error::InvalidBlockDimensions { rows, cols });
        }
        let rows = rows as usize;
        let cols = cols as usize;
        let tag = r.read_u8()?;
        let btype = BlockType::from_tag(tag).ok_or(Error::InvalidBlockTag(tag))?;
        trace!("reading {rows}x{cols} block, encoding {btype:?}");

        match btype {
            BlockType::Empty => {
                let layout = if format::eval_sparse_format_in_memory(rows, cols, 0) {
                    BlockLayout::Sparse
                } else {
                    BlockLayout::Dense
                };
                Ok(MatrixBlock::with_shape(rows, cols, layout))
            }
            BlockType::Dense => Self::read_dense_block(r, rows, cols),
            BlockType::Sparse => {
                let nnz = if wide_nnz_field(rows, cols) {
                    r.read_i64::<BigEndian>()? as usize
                } else {
                    r.read_i32::<BigEndian>()? as usize
                };
                if format::eval_sparse_format_in_memory(rows, cols, nnz) {
                    Self::read_sparse_block(r, rows, cols, nnz)
                } else {
                    Self::read_sparse_to_dense(r, rows, cols, nnz)
                }
            }
            BlockType::UltraSparse => {
                let nnz = r.read_i32::<BigEndian>()? as usize;
                Self::read_ultra_sparse_block(r, rows, cols, nnz)
            }
        }
    }

    /// Exact serialized size in bytes for the encoding [`MatrixBlock::write_to`]
    /// would pick right now.
    pub fn exact_size_on_disk(&self) -> u64 {
        let nnz = if self.nnz == 0 {
            self.count_non_zeros()
        } else {
            self.nnz
        };
        if nnz == 0 {
            return HEADER_SIZE as u64;
        }
        if format::eval_sparse_format_on_disk(self.rows, self.cols, nnz) {
            if self.is_ultra_sparse() {
                format::estimate_size_ultra_sparse_on_disk(self.rows, self.cols, nnz)
            } else {
                format::estimate_size_sparse_on_disk(self.rows, self.cols, nnz)
            }
        } else {
            format::estimate_size_dense_on_disk(self.rows, self.cols)
        }
    }

    ////////
    // writers

    fn write_header<W: Write>(&self, w: &mut W, btype: BlockType) -> Result<()> {
        w.write_i32::<BigEndian>(self.rows as i32)?;
        w.write_i32::<BigEndian>(self.cols as i32)?;
        w.write_u8(btype as u8)?;
        Ok(())
    }

    fn write_dense_block<W: Write>(&self, w: &mut W) -> Result<()> {
        self.write_header(w, BlockType::Dense)?;
        let limit = self.rows * self.cols;
        match self.dense() {
            Some(d) => {
                for &v in &d[..limit] {
                    w.write_f64::<BigEndian>(v)?;
                }
            }
            None => {
                for _ in 0..limit {
                    w.write_f64::<BigEndian>(0.0)?;
                }
            }
        }
        Ok(())
    }

    fn write_sparse_to_dense<W: Write>(&self, w: &mut W) -> Result<()> {
        self.write_header(w, BlockType::Dense)?;
        let rows = self.sparse_rows();
        for i in 0..self.rows {
            let row = rows.and_then(|rs| rs.get(i).and_then(|r| r.as_ref()));
            match row {
                Some(row) => {
                    // expand the pair list to a full row of doubles
                    let mut last: i64 = -1;
                    for (k, &c) in row.indexes().iter().enumerate() {
                        for _ in (last + 1)..c as i64 {
                            w.write_f64::<BigEndian>(0.0)?;
                        }
                        w.write_f64::<BigEndian>(row.values()[k])?;
                        last = c as i64;
                    }
                    for _ in (last + 1)..self.cols as i64 {
                        w.write_f64::<BigEndian>(0.0)?;
                    }
                }
                None => {
                    for _ in 0..self.cols {
                        w.write_f64::<BigEndian>(0.0)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_nnz_field<W: Write>(&self, w: &mut W, nnz: usize) -> Result<()> {
        if wide_nnz_field(self.rows, self.cols) {
            w.write_i64::<BigEndian>(nnz as i64)?;
        } else {
            w.write_i32::<BigEndian>(nnz as i32)?;
        }
        Ok(())
    }

    fn write_sparse_block<W: Write>(&self, w: &mut W, nnz: usize) -> Result<()> {
        self.write_header(w, BlockType::Sparse)?;
        self.write_nnz_field(w, nnz)?;
        let rows = self.sparse_rows();
        for i in 0..self.rows {
            let row = rows.and_then(|rs| rs.get(i).and_then(|r| r.as_ref()));
            match row {
                Some(row) => {
                    w.write_i32::<BigEndian>(row.size() as i32)?;
                    for (k, &c) in row.indexes().iter().enumerate() {
                        w.write_i32::<BigEndian>(c as i32)?;
                        w.write_f64::<BigEndian>(row.values()[k])?;
                    }
                }
                None => w.write_i32::<BigEndian>(0)?,
            }
        }
        Ok(())
    }

    fn write_dense_to_sparse<W: Write>(&self, w: &mut W, nnz: usize) -> Result<()> {
        self.write_header(w, BlockType::Sparse)?;
        self.write_nnz_field(w, nnz)?;
        let dense = self.dense().unwrap_or(&[]);
        for i in 0..self.rows {
            let seg = &dense[i * self.cols..(i + 1) * self.cols];
            let count = seg.iter().filter(|&&v| v != 0.0).count();
            w.write_i32::<BigEndian>(count as i32)?;
            for (j, &v) in seg.iter().enumerate() {
                if v != 0.0 {
                    w.write_i32::<BigEndian>(j as i32)?;
                    w.write_f64::<BigEndian>(v)?;
                }
            }
        }
        Ok(())
    }

    fn write_sparse_to_ultra_sparse<W: Write>(&self, w: &mut W, nnz: usize) -> Result<()> {
        self.write_header(w, BlockType::UltraSparse)?;
        w.write_i32::<BigEndian>(nnz as i32)?;
        let mut written = 0usize;
        if let Some(rows) = self.sparse_rows() {
            if self.cols > 1 {
                // (row, col, value) triples
                for (i, row) in rows.iter().enumerate() {
                    if let Some(row) = row {
                        for (k, &c) in row.indexes().iter().enumerate() {
                            w.write_i32::<BigEndian>(i as i32)?;
                            w.write_i32::<BigEndian>(c as i32)?;
                            w.write_f64::<BigEndian>(row.values()[k])?;
                            written += 1;
                        }
                    }
                }
            } else {
                // (row, value) pairs, column implicitly 0
                for (i, row) in rows.iter().enumerate() {
                    if let Some(row) = row {
                        for &v in row.values() {
                            w.write_i32::<BigEndian>(i as i32)?;
                            w.write_f64::<BigEndian>(v)?;
                            written += 1;
                        }
                    }
                }
            }
        }
        // defends against representation/metadata drift
        if written != nnz {
            return Err(Error::NonZerosMismatch {
                expected: nnz,
                written,
            });
        }
        Ok(())
    }

    ////////
    // readers

    fn read_dense_block<R: Read>(r: &mut R, rows: usize, cols: usize) -> Result<MatrixBlock> {
        let mut blk = MatrixBlock::with_shape(rows, cols, BlockLayout::Dense);
        blk.allocate_dense_block(true)?;
        let limit = rows * cols;
        let mut nnz = 0usize;
        {
            let dense = blk.dense_mut();
            for cell in &mut dense[..limit] {
                let v = r.read_f64::<BigEndian>()?;
                if v != 0.0 {
                    nnz += 1;
                }
                *cell = v;
            }
        }
        blk.set_non_zeros(nnz);
        Ok(blk)
    }

    fn read_sparse_block<R: Read>(
        r: &mut R,
        rows: usize,
        cols: usize,
        nnz: usize,
    ) -> Result<MatrixBlock> {
        let mut blk = MatrixBlock::with_shape(rows, cols, BlockLayout::Sparse);
        blk.reset_with_estimate(nnz);
        blk.allocate_sparse_rows(false);
        for i in 0..rows {
            let count = r.read_i32::<BigEndian>()? as usize;
            if count == 0 {
                continue;
            }
            let row = blk.sparse_row_for_write(i);
            for _ in 0..count {
                let c = r.read_i32::<BigEndian>()? as u32;
                let v = r.read_f64::<BigEndian>()?;
                row.append(c, v);
            }
        }
        blk.set_non_zeros(nnz);
        Ok(blk)
    }

    fn read_sparse_to_dense<R: Read>(
        r: &mut R,
        rows: usize,
        cols: usize,
        nnz: usize,
    ) -> Result<MatrixBlock> {
        let mut blk = MatrixBlock::with_shape(rows, cols, BlockLayout::Dense);
        blk.allocate_dense_block(true)?;
        {
            let dense = blk.dense_mut();
            for i in 0..rows {
                let count = r.read_i32::<BigEndian>()? as usize;
                let base = i * cols;
                for _ in 0..count {
                    let c = r.read_i32::<BigEndian>()? as usize;
                    let v = r.read_f64::<BigEndian>()?;
                    dense[base + c] = v;
                }
            }
        }
        blk.set_non_zeros(nnz);
        Ok(blk)
    }

    fn read_ultra_sparse_block<R: Read>(
        r: &mut R,
        rows: usize,
        cols: usize,
        nnz: usize,
    ) -> Result<MatrixBlock> {
        let target_sparse = format::eval_sparse_format_in_memory(rows, cols, nnz);
        let layout = if target_sparse {
            BlockLayout::Sparse
        } else {
            BlockLayout::Dense
        };
        let mut blk = MatrixBlock::with_shape(rows, cols, layout);
        blk.allocate_payload()?;
        for _ in 0..nnz {
            let i = r.read_i32::<BigEndian>()? as usize;
            let c = if cols > 1 {
                r.read_i32::<BigEndian>()? as usize
            } else {
                0
            };
            let v = r.read_f64::<BigEndian>()?;
            blk.append_value(i, c, v);
        }
        // entries arrive in row-major order, so rows are already sorted
        blk.set_non_zeros(nnz);
        Ok(blk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(blk: &MatrixBlock) -> MatrixBlock {
        let mut buf = Vec::new();
        blk.write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, blk.exact_size_on_disk());
        MatrixBlock::read_from(&mut Cursor::new(buf)).unwrap()
    }

    fn assert_same_cells(a: &MatrixBlock, b: &MatrixBlock) {
        assert_eq!((a.rows(), a.cols()), (b.rows(), b.cols()));
        for r in 0..a.rows() {
            for c in 0..a.cols() {
                assert_eq!(a.quick_get(r, c), b.quick_get(r, c), "cell ({r},{c})");
            }
        }
    }

    #[test]
    fn test_round_trip_empty() {
        let blk = MatrixBlock::with_shape(7, 5, BlockLayout::Sparse);
        let back = round_trip(&blk);
        assert_eq!(back.non_zeros(), 0);
        assert_same_cells(&blk, &back);
    }

    #[test]
    fn test_round_trip_dense() {
        let mut blk = MatrixBlock::with_shape(3, 4, BlockLayout::Dense);
        for r in 0..3 {
            for c in 0..4 {
                blk.set(r, c, (r * 4 + c) as f64 + 0.5).unwrap();
            }
        }
        let back = round_trip(&blk);
        assert_eq!(back.non_zeros(), 12);
        assert_same_cells(&blk, &back);
    }

    #[test]
    fn test_round_trip_sparse() {
        let mut blk = MatrixBlock::with_shape(200, 100, BlockLayout::Sparse);
        for i in 0..200 {
            blk.set(i, (i * 7) % 100, i as f64 + 1.0).unwrap();
        }
        let back = round_trip(&blk);
        assert_eq!(back.non_zeros(), blk.non_zeros());
        assert_same_cells(&blk, &back);
    }

    #[test]
    fn test_round_trip_ultra_sparse() {
        let mut blk = MatrixBlock::with_shape(1000, 1000, BlockLayout::Sparse);
        for i in 0..10 {
            blk.set(i * 99, i * 83, (i + 1) as f64).unwrap();
        }
        assert!(blk.is_ultra_sparse());
        let mut buf = Vec::new();
        blk.write_to(&mut buf).unwrap();
        // tag byte after the 8-byte dimensions
        assert_eq!(buf[8], BlockType::UltraSparse as u8);
        let back = MatrixBlock::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back.non_zeros(), 10);
        assert_same_cells(&blk, &back);
    }

    #[test]
    fn test_round_trip_ultra_sparse_column_vector() {
        let mut blk = MatrixBlock::with_shape(100_000, 1, BlockLayout::Sparse);
        blk.set(3, 0, 1.5).unwrap();
        blk.set(99_999, 0, 2.5).unwrap();
        let back = round_trip(&blk);
        assert_eq!(back.non_zeros(), 2);
        assert_eq!(back.quick_get(3, 0), 1.5);
        assert_eq!(back.quick_get(99_999, 0), 2.5);
    }

    #[test]
    fn test_round_trip_boundary_shapes() {
        for (rows, cols) in [(1, 1), (1, 17), (17, 1)] {
            let mut blk = MatrixBlock::with_shape(rows, cols, BlockLayout::Dense);
            blk.set(0, 0, 42.0).unwrap();
            blk.set(rows - 1, cols - 1, -1.0).unwrap();
            let back = round_trip(&blk);
            assert_same_cells(&blk, &back);
            assert_eq!(back.non_zeros(), blk.count_non_zeros());
        }
    }

    #[test]
    fn test_cross_encoding_dense_written_sparse() {
        // dense in memory but sparse enough that the disk model picks the
        // sparse encoding
        let mut blk = MatrixBlock::with_shape(100, 100, BlockLayout::Dense);
        for i in 0..50 {
            blk.set(i, i, 1.0 + i as f64).unwrap();
        }
        let mut buf = Vec::new();
        blk.write_to(&mut buf).unwrap();
        assert_eq!(buf[8], BlockType::Sparse as u8);
        let back = MatrixBlock::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back.non_zeros(), 50);
        assert_same_cells(&blk, &back);
    }

    #[test]
    fn test_cross_encoding_sparse_written_dense() {
        // sparse in memory but too dense for the disk model
        let mut blk = MatrixBlock::with_shape(4, 4, BlockLayout::Sparse);
        for r in 0..4 {
            for c in 0..4 {
                if (r + c) % 2 == 0 {
                    blk.set(r, c, 1.0).unwrap();
                }
            }
        }
        let mut buf = Vec::new();
        blk.write_to(&mut buf).unwrap();
        assert_eq!(buf[8], BlockType::Dense as u8);
        let back = MatrixBlock::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back.non_zeros(), 8);
        assert_same_cells(&blk, &back);
    }

    #[test]
    fn test_invalid_tag_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2i32.to_be_bytes());
        buf.extend_from_slice(&2i32.to_be_bytes());
        buf.push(9);
        let err = MatrixBlock::read_from(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::InvalidBlockTag(9)));
    }

    #[test]
    fn test_negative_dimensions_rejected() {
        // corrupt header: negative row count must be a format error, not an
        // allocation attempt
        let mut buf = Vec::new();
        buf.extend_from_slice(&(-5i32).to_be_bytes());
        buf.extend_from_slice(&2i32.to_be_bytes());
        buf.push(BlockType::Empty as u8);
        let err = MatrixBlock::read_from(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidBlockDimensions { rows: -5, cols: 2 }
        ));
    }

    #[test]
    fn test_stale_zero_nnz_recounted_on_write() {
        let mut blk = MatrixBlock::with_shape(2, 2, BlockLayout::Dense);
        blk.set(0, 1, 3.0).unwrap();
        blk.set_non_zeros(0); // simulate unmaintained bulk mutation
        let back = round_trip(&blk);
        assert_eq!(back.quick_get(0, 1), 3.0);
        assert_eq!(back.non_zeros(), 1);
    }
}
