//! Single-core micro instructions.
//!
//! Micro instructions run on one core, so the transfer formulas here reuse
//! the graph-level models with whatever `block_dim` the context carries and
//! the cube cost is not divided at all.

use crate::error::PerfError;
use crate::formulas::matmul::MatmulDims;
use crate::formulas::memory::{LOAD, STORE, transfer_cost};
use crate::output::PerfOutputInfo;
use crate::params::evaluate_linear;
use crate::pipe::PipeType;
use crate::query::{FormulaCtx, PerfQuery};
use crate::shape::dtype_pair;

pub const VECTOR_OPS: [&str; 16] = [
    "Vadd", "Vsub", "Vmul", "Vdiv", "Vmax", "Vmin", "Vabs", "Vexp", "Vrelu", "Vdup", "Vcopy", "Vor", "Vtranspose",
    "Vcadd", "Vcmax", "Vcmin",
];

/// Vector instruction over the destination's element count.
pub fn vector(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    let dst = query.output(0)?;
    let src = query.inputs.first().map_or(dst.dtype, |t| t.dtype);
    let coeffs = ctx.params.linear(&query.op_type, &dtype_pair(src, dst.dtype))?;
    out.set_pipe(PipeType::Vector, evaluate_linear(coeffs, dst.element_count()));
    Ok(())
}

pub fn copy_gm_to_ubuf(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    let src = query.shaped_input(0)?;
    let cost = transfer_cost(ctx, &LOAD, src, &mut out.pending)?;
    out.set_pipe(PipeType::Mte2, cost);
    Ok(())
}

pub fn copy_ubuf_to_gm(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    let dst = query.shaped_output(0)?;
    let cost = transfer_cost(ctx, &STORE, dst, &mut out.pending)?;
    out.set_pipe(PipeType::Mte3, cost);
    Ok(())
}

/// One cube instruction on L0 operands.
pub fn mmad(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    let dims = MatmulDims::from_operands(&query.op_type, query.input(0)?, query.input(1)?)?;
    out.set_pipe(PipeType::Cube, dims.fractals(ctx.soc) * ctx.soc.cube_cycles_per_fractal);
    Ok(())
}
