//! Sequence and sampling helpers.

use log::trace;

use crate::block::{BlockLayout, MatrixBlock};
use crate::error::{Error, Result};

use super::rand_matrix::random_seed;
use super::stream::TileRng;

/// Generate the linear sequence `from, from+incr, ...` into a dense column
/// vector.
///
/// Both endpoints are included only when `to - from` is evenly divisible by
/// `incr`: `seq(0, 1, 0.5)` yields `[0.0, 0.5, 1.0]` while `seq(0, 1, 0.6)`
/// yields `[0.0, 0.6]`.
pub fn generate_sequence(out: &mut MatrixBlock, from: f64, to: f64, incr: f64) -> Result<()> {
    if incr == 0.0 || (from > to) != (incr < 0.0) {
        return Err(Error::InvalidArgument {
            arg: "incr",
            reason: format!("wrong sign for the increment in seq(): from={from}, to={to}, incr={incr}"),
        });
    }

    let rows = 1 + ((to - from) / incr).floor() as usize;
    trace!("generating seq({from},{to},{incr}) with {rows} rows");
    out.reset_layout(rows, 1, BlockLayout::Dense);
    out.allocate_dense_block(true)?;

    let mut v = from;
    let dense = out.dense_mut();
    dense[0] = from;
    for cell in dense[1..rows].iter_mut() {
        v += incr;
        *cell = v;
    }
    out.recompute_non_zeros();
    Ok(())
}

/// Draw a sample of `size` values from `[1, range]` into a dense column
/// vector.
///
/// Without replacement this is one-pass reservoir sampling followed by a
/// Fisher-Yates shuffle (Knuth's Algorithm P), so the output ordering is
/// itself random even when `size` is close to `range`. With replacement
/// every slot is an independent uniform draw. Passing `seed: None` draws a
/// fresh time-based seed.
pub fn generate_sample(
    out: &mut MatrixBlock,
    range: u64,
    size: usize,
    replace: bool,
    seed: Option<u64>,
) -> Result<()> {
    if range == 0 {
        return Err(Error::InvalidArgument {
            arg: "range",
            reason: "sampling range must be positive".to_string(),
        });
    }
    if !replace && size as u64 > range {
        return Err(Error::InvalidArgument {
            arg: "size",
            reason: format!(
                "cannot sample {size} values from [1,{range}] without replacement"
            ),
        });
    }

    out.reset_layout(size, 1, BlockLayout::Dense);
    out.allocate_dense_block(true)?;
    let mut rng = TileRng::new(seed.unwrap_or_else(random_seed));

    {
        let dense = out.dense_mut();
        if !replace {
            // reservoir fill with the first `size` candidates
            for (i, cell) in dense[..size].iter_mut().enumerate() {
                *cell = (i + 1) as f64;
            }
            for i in (size as u64 + 1)..=range {
                if rng.next_bounded(i) < size as u64 {
                    dense[rng.next_bounded(size as u64) as usize] = i as f64;
                }
            }
            // randomize the sample ordering
            for i in (1..size).rev() {
                let j = rng.next_bounded(i as u64 + 1) as usize;
                dense.swap(i, j);
            }
        } else {
            for cell in dense[..size].iter_mut() {
                *cell = (1 + rng.next_bounded(range)) as f64;
            }
        }
    }

    out.recompute_non_zeros();
    out.exam_sparsity()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(out: &MatrixBlock) -> Vec<f64> {
        (0..out.rows()).map(|r| out.quick_get(r, 0)).collect()
    }

    #[test]
    fn test_seq_even_and_uneven_endpoints() {
        let mut out = MatrixBlock::new();
        generate_sequence(&mut out, 0.0, 1.0, 0.5).unwrap();
        assert_eq!(column(&out), vec![0.0, 0.5, 1.0]);

        generate_sequence(&mut out, 0.0, 1.0, 0.6).unwrap();
        assert_eq!(column(&out), vec![0.0, 0.6]);
    }

    #[test]
    fn test_seq_descending() {
        let mut out = MatrixBlock::new();
        generate_sequence(&mut out, 3.0, 1.0, -1.0).unwrap();
        assert_eq!(column(&out), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_seq_sign_mismatch() {
        let mut out = MatrixBlock::new();
        assert!(matches!(
            generate_sequence(&mut out, 0.0, 5.0, -1.0),
            Err(Error::InvalidArgument { arg: "incr", .. })
        ));
        assert!(matches!(
            generate_sequence(&mut out, 5.0, 0.0, 1.0),
            Err(Error::InvalidArgument { arg: "incr", .. })
        ));
    }

    #[test]
    fn test_sample_without_replacement_distinct_in_range() {
        let mut out = MatrixBlock::new();
        generate_sample(&mut out, 10, 3, false, Some(42)).unwrap();
        let vals = column(&out);
        assert_eq!(vals.len(), 3);
        for &v in &vals {
            assert!(v >= 1.0 && v <= 10.0);
            assert_eq!(v, v.trunc());
        }
        let distinct: std::collections::HashSet<u64> = vals.iter().map(|&v| v as u64).collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn test_sample_deterministic_per_seed() {
        let mut a = MatrixBlock::new();
        let mut b = MatrixBlock::new();
        generate_sample(&mut a, 1000, 50, false, Some(42)).unwrap();
        generate_sample(&mut b, 1000, 50, false, Some(42)).unwrap();
        assert_eq!(column(&a), column(&b));
    }

    #[test]
    fn test_sample_with_replacement_in_range() {
        let mut out = MatrixBlock::new();
        generate_sample(&mut out, 5, 100, true, Some(7)).unwrap();
        for v in column(&out) {
            assert!(v >= 1.0 && v <= 5.0);
        }
    }

    #[test]
    fn test_sample_size_exceeding_range_rejected() {
        let mut out = MatrixBlock::new();
        assert!(matches!(
            generate_sample(&mut out, 3, 5, false, Some(1)),
            Err(Error::InvalidArgument { arg: "size", .. })
        ));
    }
}
