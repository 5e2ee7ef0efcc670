//! Seeded random matrix generation.
//!
//! The matrix is tiled into `rpb x cpb` blocks; a WELL1024a block-seed
//! source, initialized from the global seed, hands every tile its own 64-bit
//! seed up front in row-major tile order. All per-tile state derives from
//! that seed alone, so splitting the row tiles across 1 or N workers yields
//! bit-identical output.

use log::trace;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::block::format;
use crate::block::{BlockLayout, MatrixBlock, SparseRow};
use crate::error::{Error, Result};

use super::generator::{Distribution, RandomMatrixGenerator};
use super::stream::{TileRng, ValueSampler};
use super::well::Well1024a;

/// Time-derived fallback seed for callers that did not pin one.
pub(crate) fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9e3779b97f4a7c15)
}

/// Apportion the expected non-zero total across tiles, deterministically for
/// a given seed.
///
/// The sum of all quotas equals `ceil(rows * (cols * sparsity))` in the
/// ultra-sparse branch, where a correction loop absorbs rounding error. The
/// proportional branch keeps independent per-tile floors, since there the
/// quotas only steer per-tile layout decisions, not exact counts.
pub fn compute_nnz_per_block(rgen: &RandomMatrixGenerator, seed: u64) -> Result<Vec<u64>> {
    let nrb = rgen.num_row_blocks() as u64;
    let ncb = rgen.num_col_blocks() as u64;
    let tiles = nrb * ncb;
    if tiles > i32::MAX as u64 {
        return Err(Error::TileCountOverflow {
            rows: rgen.rows,
            cols: rgen.cols,
            tiles,
        });
    }

    let nnz = (rgen.rows as f64 * (rgen.cols as f64 * rgen.sparsity)).ceil() as u64;
    let mut quotas = vec![0u64; tiles as usize];
    if nnz == 0 {
        return Ok(quotas);
    }

    if nnz < tiles {
        // ultra-sparse: concentrate the non-zeros in a random tile subset
        let mut rng = TileRng::new(seed);
        let num_nz_blocks = if nnz == 1 {
            1
        } else {
            1 + rng.next_bounded(nnz - 1) as usize
        };

        // randomly partition (0,1] into per-tile proportions
        let mut props: Vec<f64> = (1..num_nz_blocks).map(|_| rng.next_f64()).collect();
        props.push(1.0);
        props.sort_unstable_by(f64::total_cmp);

        let mut actual = 0u64;
        let mut prev = 0.0;
        for &p in &props {
            let mut bid = rng.next_bounded(tiles) as usize;
            while quotas[bid] != 0 {
                bid = rng.next_bounded(tiles) as usize;
            }
            let quota = ((p - prev) * nnz as f64).floor() as u64;
            quotas[bid] = quota;
            actual += quota;
            prev = p;
        }

        // absorb rounding error one non-zero at a time
        while actual < nnz {
            let bid = rng.next_bounded(tiles) as usize;
            quotas[bid] += 1;
            actual += 1;
        }
    } else {
        // proportional allocation, computed independently per tile position
        let mut bid = 0;
        let mut r = 0;
        while r < rgen.rows {
            let cur_rows = rgen.rows_per_block.min(rgen.rows - r);
            let mut c = 0;
            while c < rgen.cols {
                let cur_cols = rgen.cols_per_block.min(rgen.cols - c);
                quotas[bid] = (cur_rows as f64 * cur_cols as f64 * rgen.sparsity) as u64;
                bid += 1;
                c += rgen.cols_per_block;
            }
            r += rgen.rows_per_block;
        }
    }
    Ok(quotas)
}

/// Disjoint view of the rows a worker fills: one contiguous row range of the
/// shared payload.
enum TilePayload<'a> {
    Dense(&'a mut [f64]),
    Sparse(&'a mut [Option<SparseRow>]),
}

impl TilePayload<'_> {
    /// Write a cell; `row` is relative to the view's first row. Sparse rows
    /// receive appends in ascending column order because tiles advance
    /// row-major within a worker.
    #[inline]
    fn write(&mut self, row: usize, col: usize, v: f64, cols: usize, est_nnz_per_row: usize) {
        match self {
            TilePayload::Dense(d) => d[row * cols + col] = v,
            TilePayload::Sparse(rows) => {
                rows[row]
                    .get_or_insert_with(|| SparseRow::new(est_nnz_per_row, cols))
                    .append(col as u32, v);
            }
        }
    }
}

struct FillParams<'a> {
    rows: usize,
    cols: usize,
    rpb: usize,
    cpb: usize,
    nrb: usize,
    ncb: usize,
    sparsity: f64,
    dist: Distribution,
    est_nnz_per_row: usize,
    quotas: &'a [u64],
}

/// Fill the row-tile range `[rbi_lo, rbi_hi)` of the target.
///
/// `base_row` is the absolute first matrix row of the payload view. Both
/// per-tile streams are reseeded from the tile's assigned seed, so output
/// does not depend on how the row-tile ranges were partitioned.
fn fill_row_blocks(
    params: &FillParams<'_>,
    payload: &mut TilePayload<'_>,
    rbi_lo: usize,
    rbi_hi: usize,
    seeds: &[u64],
    base_row: usize,
) -> Result<()> {
    let mut counter = 0;
    for rbi in rbi_lo..rbi_hi {
        let block_rows = if rbi == params.nrb - 1 {
            params.rows - rbi * params.rpb
        } else {
            params.rpb
        };
        let row_offset = rbi * params.rpb - base_row;

        for cbj in 0..params.ncb {
            let block_cols = if cbj == params.ncb - 1 {
                params.cols - cbj * params.cpb
            } else {
                params.cpb
            };
            let col_offset = cbj * params.cpb;
            let block_id = rbi * params.ncb + cbj;

            let seed = seeds[counter];
            counter += 1;
            if params.sparsity <= 0.0 {
                continue;
            }

            let mut value = ValueSampler::new(&params.dist, seed)?;
            // cell selection is always uniform, regardless of the value pdf
            let mut nnz_rng = TileRng::new(seed);

            // tile-level layout may differ from the matrix-level one: border
            // tiles are smaller and can cross the turn point differently
            let local_sparse = format::eval_sparse_format_in_memory(
                block_rows,
                block_cols,
                params.quotas[block_id] as usize,
            );

            if local_sparse && params.sparsity < 1.0 {
                // geometric skip-sampling: O(nnz) draws instead of O(cells).
                // Prob[k-1 zeros before a non-zero] = p*(1-p)^(k-1)
                let log1mp = (1.0 - params.sparsity).ln();
                let block_size = (block_rows * block_cols) as i64;
                let mut idx: i64 = 0;
                loop {
                    let step = (nnz_rng.next_f64().ln() / log1mp).ceil();
                    if !step.is_finite() || step > (block_size - idx) as f64 {
                        break;
                    }
                    idx += step as i64;
                    let ridx = (idx - 1) as usize / block_cols;
                    let cidx = (idx - 1) as usize % block_cols;
                    payload.write(
                        row_offset + ridx,
                        col_offset + cidx,
                        value.draw(),
                        params.cols,
                        params.est_nnz_per_row,
                    );
                }
            } else if params.sparsity == 1.0 {
                // full density: only the value stream is consumed
                for ii in 0..block_rows {
                    for jj in 0..block_cols {
                        payload.write(
                            row_offset + ii,
                            col_offset + jj,
                            value.draw(),
                            params.cols,
                            params.est_nnz_per_row,
                        );
                    }
                }
            } else {
                // dense-tile strategy: one Bernoulli trial per cell
                for ii in 0..block_rows {
                    for jj in 0..block_cols {
                        if nnz_rng.next_f64() <= params.sparsity {
                            payload.write(
                                row_offset + ii,
                                col_offset + jj,
                                value.draw(),
                                params.cols,
                                params.est_nnz_per_row,
                            );
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Generate a seeded random matrix into `out`, with up to `k` parallel
/// workers over contiguous row-tile ranges.
///
/// Passing `seed: None` draws a fresh time-based seed. The call is atomic
/// from the caller's perspective: on any error the block contents are
/// undefined and must be discarded.
pub fn generate_random_matrix(
    out: &mut MatrixBlock,
    rgen: &RandomMatrixGenerator,
    seed: Option<u64>,
    k: usize,
) -> Result<()> {
    let seed = seed.unwrap_or_else(random_seed);
    trace!(
        "generating {}x{} random matrix, sparsity {}, seed {seed}",
        rgen.rows,
        rgen.cols,
        rgen.sparsity
    );

    // configuration errors fail before any allocation
    let quotas = compute_nnz_per_block(rgen, seed)?;

    let est_nnz = match rgen.dist {
        Distribution::Uniform { min, max } if min == 0.0 && max == 0.0 => 0,
        _ => (rgen.sparsity * rgen.rows as f64 * rgen.cols as f64) as usize,
    };
    let lsparse = format::eval_sparse_format_in_memory(rgen.rows, rgen.cols, est_nnz);
    let layout = if lsparse {
        BlockLayout::Sparse
    } else {
        BlockLayout::Dense
    };
    out.reset_full(rgen.rows, rgen.cols, layout, est_nnz);

    // shortcut outputs never touch a generator
    if let Distribution::Uniform { min, max } = rgen.dist {
        if min == 0.0 && max == 0.0 {
            out.set_non_zeros(0);
            return Ok(());
        }
        if !lsparse && rgen.sparsity == 1.0 && min == max {
            return out.init_value(min, rgen.rows, rgen.cols);
        }
    }

    out.allocate_payload()?;

    let nrb = rgen.num_row_blocks();
    let ncb = rgen.num_col_blocks();
    let mut bigrand = Well1024a::new(seed);
    let seeds: Vec<u64> = (0..nrb * ncb).map(|_| bigrand.next_u64()).collect();

    let params = FillParams {
        rows: rgen.rows,
        cols: rgen.cols,
        rpb: rgen.rows_per_block,
        cpb: rgen.cols_per_block,
        nrb,
        ncb,
        sparsity: rgen.sparsity,
        dist: rgen.dist,
        est_nnz_per_row: out.est_nnz_per_row,
        quotas: &quotas,
    };

    let threads = k.max(1).min(nrb);
    if threads <= 1 {
        let mut payload = full_payload(out);
        fill_row_blocks(&params, &mut payload, 0, nrb, &seeds, 0)?;
    } else {
        run_parallel(out, &params, &seeds, threads)?;
    }

    // metadata is finalized only after all workers joined
    out.recompute_non_zeros();
    Ok(())
}

fn full_payload(out: &mut MatrixBlock) -> TilePayload<'_> {
    let limit = out.rows() * out.cols();
    match out.layout() {
        BlockLayout::Dense => TilePayload::Dense(&mut out.dense_mut()[..limit]),
        BlockLayout::Sparse => {
            let rows = out.rows();
            TilePayload::Sparse(&mut out.sparse_rows_mut()[..rows])
        }
    }
}

struct WorkerChunk<'a> {
    rbi_lo: usize,
    rbi_hi: usize,
    base_row: usize,
    payload: TilePayload<'a>,
    seeds: &'a [u64],
}

/// Partition contiguous row-tile ranges across workers and fill them without
/// synchronization; the payload splits are disjoint by construction.
fn run_parallel(
    out: &mut MatrixBlock,
    params: &FillParams<'_>,
    seeds: &[u64],
    threads: usize,
) -> Result<()> {
    let nrb = params.nrb;
    let ncb = params.ncb;
    let rows = params.rows;
    let cols = params.cols;

    // ceil-balanced contiguous ranges
    let mut bounds = Vec::with_capacity(threads);
    let mut rl = 0;
    for i in 0..threads {
        let incr = (nrb - rl).div_ceil(threads - i);
        let ru = (rl + incr).min(nrb);
        bounds.push((rl, ru));
        rl = ru;
    }

    let mut chunks: Vec<WorkerChunk<'_>> = Vec::with_capacity(threads);
    match out.layout() {
        BlockLayout::Dense => {
            let limit = rows * cols;
            let mut rest: &mut [f64] = &mut out.dense_mut()[..limit];
            for &(lo, hi) in &bounds {
                let row_lo = lo * params.rpb;
                let row_hi = (hi * params.rpb).min(rows);
                let (head, tail) = rest.split_at_mut((row_hi - row_lo) * cols);
                rest = tail;
                chunks.push(WorkerChunk {
                    rbi_lo: lo,
                    rbi_hi: hi,
                    base_row: row_lo,
                    payload: TilePayload::Dense(head),
                    seeds: &seeds[lo * ncb..hi * ncb],
                });
            }
        }
        BlockLayout::Sparse => {
            let mut rest: &mut [Option<SparseRow>] = &mut out.sparse_rows_mut()[..rows];
            for &(lo, hi) in &bounds {
                let row_lo = lo * params.rpb;
                let row_hi = (hi * params.rpb).min(rows);
                let (head, tail) = rest.split_at_mut(row_hi - row_lo);
                rest = tail;
                chunks.push(WorkerChunk {
                    rbi_lo: lo,
                    rbi_hi: hi,
                    base_row: row_lo,
                    payload: TilePayload::Sparse(head),
                    seeds: &seeds[lo * ncb..hi * ncb],
                });
            }
        }
    }

    // first worker error aborts the whole call
    #[cfg(feature = "rayon")]
    {
        chunks.into_par_iter().try_for_each(|mut chunk| {
            fill_row_blocks(
                params,
                &mut chunk.payload,
                chunk.rbi_lo,
                chunk.rbi_hi,
                chunk.seeds,
                chunk.base_row,
            )
        })
    }
    #[cfg(not(feature = "rayon"))]
    {
        for mut chunk in chunks {
            fill_row_blocks(
                params,
                &mut chunk.payload,
                chunk.rbi_lo,
                chunk.rbi_hi,
                chunk.seeds,
                chunk.base_row,
            )?;
        }
        Ok(())
    }
}
