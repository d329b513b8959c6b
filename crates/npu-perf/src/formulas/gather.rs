//! Row gather `table[R, C]` by `indices[I]`.
//!
//! The index vector is loaded like any other operand, each selected row is
//! one strided block of `C` elements, and the scalar unit computes one
//! address per index.

use crate::error::PerfError;
use crate::formulas::memory::{self, LOAD};
use crate::output::PerfOutputInfo;
use crate::params::evaluate_linear;
use crate::pipe::PipeType;
use crate::query::{FormulaCtx, PerfQuery};
use crate::shape::{dtype_pair, product};

pub fn gather(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    let table = query.shaped_input(0)?;
    let indices = query.shaped_input(1)?;
    if table.rank() < 2 {
        return Err(PerfError::RankMismatch {
            op: query.op_type.clone(),
            lhs: table.rank(),
            rhs: indices.rank(),
        });
    }

    let index_load = PerfQuery::new("Load").with_input(indices.clone());
    let mut sub = PerfOutputInfo::new();
    memory::load(ctx, &index_load, &mut sub)?;
    out.accumulate(sub);

    let count = indices.element_count();
    let row_elems = product(&table.shape[1..]);
    let rows = memory::strided_cost(ctx, &LOAD, table.dtype, &count, &row_elems, &mut out.pending)?;
    out.add_to_pipe(PipeType::Mte2, rows);

    let coeffs = ctx
        .params
        .linear(&query.op_type, &dtype_pair(indices.dtype, table.dtype))?;
    out.set_pipe(PipeType::Scalar, evaluate_linear(coeffs, count));
    Ok(())
}
