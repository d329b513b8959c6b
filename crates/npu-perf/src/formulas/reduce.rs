//! Reductions over the innermost axis.
//!
//! Each row of `cols` elements is tiled into vector repeats. A partial last
//! repeat is first padded with the reduction identity, then the repeats are
//! halved level by level: one elementwise combine per level folds the upper
//! half onto the lower half, and an odd repeat rides along to the next level.
//! One cross-lane reduce folds the surviving repeat.

use npu_perf_expr::Expr;

use crate::error::PerfError;
use crate::formulas::vector_cost;
use crate::output::PerfOutputInfo;
use crate::pipe::PipeType;
use crate::query::{FormulaCtx, PerfQuery};
use crate::shape::{DataType, product};

pub const REDUCE_OPS: [&str; 3] = ["ReduceSum", "ReduceMax", "ReduceMin"];

/// Halving levels unrolled for a symbolic repeat count: rows of up to
/// `2^16` repeats.
const MAX_COMBINE_LEVELS: u32 = 16;

/// `(combine, cross-lane)` micro instructions of a reduction.
fn instructions(op: &str) -> Option<(&'static str, &'static str)> {
    match op {
        "ReduceSum" => Some(("Vadd", "Vcadd")),
        "ReduceMax" => Some(("Vmax", "Vcmax")),
        "ReduceMin" => Some(("Vmin", "Vcmin")),
        _ => None,
    }
}

pub fn reduce(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    let (combine, cross) = instructions(&query.op_type).ok_or_else(|| PerfError::UnknownOp(query.op_type.clone()))?;
    let input = query.shaped_input(0)?;
    let dtype = input.dtype;

    let (outer, last) = input.shape.split_at(input.rank() - 1);
    let rows = product(outer);
    let cols = last[0].clone();
    let repeat = ctx.soc.repeat_elems(dtype);
    let blocks = cols.clone().ceil_div(repeat);

    let pad = cols.modulo(repeat).tail_exists() * &rows * vector_cost(ctx, "Vdup", dtype, repeat)?;
    let combines = &rows * combine_levels(ctx, combine, dtype, &blocks, repeat)?;
    let folds = &rows * vector_cost(ctx, cross, dtype, repeat)?;

    out.set_pipe(PipeType::Vector, pad + combines + folds);
    Ok(())
}

/// Per-row cost of halving `blocks` repeats down to one.
///
/// Level `i` starts with `ceil(blocks / 2^i)` live repeats and issues one
/// combine over `floor(live / 2)` repeats. A level with a single live repeat
/// costs nothing, intercept included.
fn combine_levels(
    ctx: &FormulaCtx<'_>,
    instr: &str,
    dtype: DataType,
    blocks: &Expr,
    repeat: i64,
) -> Result<Expr, PerfError> {
    let mut total = Expr::zero();
    for level in 0..MAX_COMBINE_LEVELS {
        let live = blocks.clone().ceil_div(1_i64 << level);
        if live.as_f64().is_some_and(|n| n <= 1.0) {
            break;
        }
        let pairs = live.clone().floor_div(2);
        let issued = (live - 1).max(0).tail_exists();
        total = total + issued * vector_cost(ctx, instr, dtype, pairs * repeat)?;
    }
    Ok(total)
}
