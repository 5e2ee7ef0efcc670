//! Generation parameter surface: distribution selection and validation.

use crate::error::{Error, Result};

/// Cell-value distribution for random matrix generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    /// Uniform in `[min, max]`.
    Uniform { min: f64, max: f64 },
    /// Standard normal N(0,1).
    Normal,
    /// Poisson with the given mean.
    Poisson { mean: f64 },
}

/// Validated parameters for one random matrix generation call.
#[derive(Debug, Clone)]
pub struct RandomMatrixGenerator {
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    pub(crate) rows_per_block: usize,
    pub(crate) cols_per_block: usize,
    pub(crate) sparsity: f64,
    pub(crate) dist: Distribution,
}

impl RandomMatrixGenerator {
    /// Create a generator, validating shape, tiling and distribution
    /// parameters up front (configuration errors fail before any allocation).
    pub fn new(
        dist: Distribution,
        rows: usize,
        cols: usize,
        rows_per_block: usize,
        cols_per_block: usize,
        sparsity: f64,
    ) -> Result<Self> {
        if rows_per_block == 0 || cols_per_block == 0 {
            return Err(Error::InvalidArgument {
                arg: "tiling",
                reason: format!(
                    "tile dimensions must be positive, got {}x{}",
                    rows_per_block, cols_per_block
                ),
            });
        }
        if !(0.0..=1.0).contains(&sparsity) {
            return Err(Error::InvalidArgument {
                arg: "sparsity",
                reason: format!("must lie in [0,1], got {sparsity}"),
            });
        }
        if let Distribution::Poisson { mean } = dist {
            if !(mean > 0.0) {
                return Err(Error::DistributionParameter {
                    param: "mean",
                    reason: format!("must be positive, got {mean}"),
                });
            }
        }
        Ok(RandomMatrixGenerator {
            rows,
            cols,
            rows_per_block,
            cols_per_block,
            sparsity,
            dist,
        })
    }

    /// Create a generator from the string parameter surface of the
    /// instruction layer: a case-insensitive pdf name plus distribution
    /// parameters (`min`/`max` for uniform, a parseable mean string for
    /// poisson).
    #[allow(clippy::too_many_arguments)]
    pub fn from_pdf(
        pdf: &str,
        rows: usize,
        cols: usize,
        rows_per_block: usize,
        cols_per_block: usize,
        sparsity: f64,
        min: f64,
        max: f64,
        dist_param: Option<&str>,
    ) -> Result<Self> {
        let dist = if pdf.eq_ignore_ascii_case("uniform") {
            Distribution::Uniform { min, max }
        } else if pdf.eq_ignore_ascii_case("normal") {
            Distribution::Normal
        } else if pdf.eq_ignore_ascii_case("poisson") {
            let raw = dist_param.unwrap_or("");
            let mean = raw.trim().parse::<f64>().map_err(|_| {
                Error::DistributionParameter {
                    param: "mean",
                    reason: format!("failed to parse \"{raw}\" as a number"),
                }
            })?;
            Distribution::Poisson { mean }
        } else {
            return Err(Error::UnsupportedDistribution(pdf.to_string()));
        };
        Self::new(dist, rows, cols, rows_per_block, cols_per_block, sparsity)
    }

    /// Target rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Target columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Target sparsity.
    pub fn sparsity(&self) -> f64 {
        self.sparsity
    }

    /// Configured distribution.
    pub fn distribution(&self) -> Distribution {
        self.dist
    }

    /// True when the output is all-zero or an equal-valued constant at full
    /// density, both of which bypass the generators entirely.
    pub fn is_shortcut_output(&self) -> bool {
        match self.dist {
            Distribution::Uniform { min, max } => {
                (min == 0.0 && max == 0.0) || (self.sparsity == 1.0 && min == max)
            }
            _ => false,
        }
    }

    /// Number of row tiles.
    pub(crate) fn num_row_blocks(&self) -> usize {
        self.rows.div_ceil(self.rows_per_block)
    }

    /// Number of column tiles.
    pub(crate) fn num_col_blocks(&self) -> usize {
        self.cols.div_ceil(self.cols_per_block)
    }
}
