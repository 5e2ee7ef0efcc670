//! Built-in scalar function objects.
//!
//! Shared immutable operator instances keyed by opcode: the registry is a
//! plain match over unit structs, so lookups are constant and there is no
//! lazily initialized mutable state.

use crate::block::{BlockLayout, MatrixBlock};
use crate::error::Result;

/// Opcode for a built-in elementwise scalar function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Opcode {
    Abs,
    Sin,
    Cos,
    Tan,
    Sqrt,
    Exp,
    Log,
    Floor,
    Ceil,
    Round,
    Sign,
}

/// A stateless elementwise scalar function.
pub trait ScalarFn: Sync {
    /// Apply the function to one value.
    fn execute(&self, x: f64) -> f64;

    /// A function is sparse-safe when it maps zero to zero, allowing sparse
    /// blocks to be transformed by touching only stored pairs.
    fn sparse_safe(&self) -> bool {
        self.execute(0.0) == 0.0
    }
}

struct Abs;
struct Sin;
struct Cos;
struct Tan;
struct Sqrt;
struct Exp;
struct Log;
struct Floor;
struct Ceil;
struct Round;
struct Sign;

impl ScalarFn for Abs {
    fn execute(&self, x: f64) -> f64 {
        x.abs()
    }
}
impl ScalarFn for Sin {
    fn execute(&self, x: f64) -> f64 {
        x.sin()
    }
}
impl ScalarFn for Cos {
    fn execute(&self, x: f64) -> f64 {
        x.cos()
    }
}
impl ScalarFn for Tan {
    fn execute(&self, x: f64) -> f64 {
        x.tan()
    }
}
impl ScalarFn for Sqrt {
    fn execute(&self, x: f64) -> f64 {
        x.sqrt()
    }
}
impl ScalarFn for Exp {
    fn execute(&self, x: f64) -> f64 {
        x.exp()
    }
}
impl ScalarFn for Log {
    fn execute(&self, x: f64) -> f64 {
        x.ln()
    }
}
impl ScalarFn for Floor {
    fn execute(&self, x: f64) -> f64 {
        x.floor()
    }
}
impl ScalarFn for Ceil {
    fn execute(&self, x: f64) -> f64 {
        x.ceil()
    }
}
impl ScalarFn for Round {
    fn execute(&self, x: f64) -> f64 {
        x.round()
    }
}
impl ScalarFn for Sign {
    fn execute(&self, x: f64) -> f64 {
        if x == 0.0 {
            0.0
        } else {
            x.signum()
        }
    }
}

/// Resolve an opcode to its shared function object.
pub fn lookup(op: Opcode) -> &'static dyn ScalarFn {
    match op {
        Opcode::Abs => &Abs,
        Opcode::Sin => &Sin,
        Opcode::Cos => &Cos,
        Opcode::Tan => &Tan,
        Opcode::Sqrt => &Sqrt,
        Opcode::Exp => &Exp,
        Opcode::Log => &Log,
        Opcode::Floor => &Floor,
        Opcode::Ceil => &Ceil,
        Opcode::Round => &Round,
        Opcode::Sign => &Sign,
    }
}

impl MatrixBlock {
    /// Apply a built-in scalar function elementwise into a new block.
    ///
    /// Sparse-safe functions on sparse blocks touch only stored pairs; all
    /// other cases evaluate every cell. The result representation follows
    /// the cost model for the output's non-zero count.
    pub fn apply_unary(&self, op: Opcode) -> Result<MatrixBlock> {
        let f = lookup(op);

        let mut out;
        if f.sparse_safe() && self.layout() == BlockLayout::Sparse {
            out = MatrixBlock::with_shape(self.rows(), self.cols(), BlockLayout::Sparse);
            if let Some(rows) = self.sparse_rows() {
                for (i, row) in rows.iter().enumerate() {
                    if let Some(row) = row {
                        for (k, &c) in row.indexes().iter().enumerate() {
                            out.append_value(i, c as usize, f.execute(row.values()[k]));
                        }
                    }
                }
            }
        } else {
            out = MatrixBlock::with_shape(self.rows(), self.cols(), BlockLayout::Dense);
            out.allocate_dense_block(true)?;
            for r in 0..self.rows() {
                for c in 0..self.cols() {
                    let v = f.execute(self.quick_get(r, c));
                    if v != 0.0 {
                        out.quick_set(r, c, v);
                    }
                }
            }
        }
        out.exam_sparsity()?;
        Ok(out)
    }
}
