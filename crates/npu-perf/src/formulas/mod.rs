//! Built-in cost formulas.

pub mod broadcast;
pub mod elementwise;
pub mod gather;
pub mod matmul;
pub mod memory;
pub mod micro;
pub mod reduce;

use npu_perf_expr::Expr;

use crate::error::PerfError;
use crate::output::PerfOutputInfo;
use crate::params::evaluate_linear;
use crate::pipe::PipeType;
use crate::query::{FormulaCtx, PerfQuery};
use crate::registry::{DEFAULT_KEY, FormulaRegistry};
use crate::shape::{DataType, dtype_pair};
use crate::soc::Generation;

/// Scalar cycles charged to operators without a dedicated model.
pub const DEFAULT_COST: i64 = 1;

/// Catch-all formula for intentionally unmodeled operators.
pub fn default(_: &FormulaCtx<'_>, _: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    out.set_pipe(PipeType::Scalar, DEFAULT_COST);
    Ok(())
}

/// Cost of one micro vector instruction over `elements` elements of
/// `dtype`, from its `SimpleLinear` entry.
pub fn vector_cost(
    ctx: &FormulaCtx<'_>,
    instr: &str,
    dtype: DataType,
    elements: impl Into<Expr>,
) -> Result<Expr, PerfError> {
    let coeffs = ctx.params.linear(instr, &dtype_pair(dtype, dtype))?;
    Ok(evaluate_linear(coeffs, elements))
}

pub(crate) fn register_graph(reg: &mut FormulaRegistry) {
    reg.register(DEFAULT_KEY, default);
    for op in elementwise::LINEAR_OPS {
        reg.register(op, elementwise::linear);
    }
    for op in elementwise::COMPARE_OPS {
        reg.register(op, elementwise::compare);
    }
    reg.register("Load", memory::load);
    reg.register("Store", memory::store);
    reg.register("Gather", gather::gather);
    reg.register("Broadcast", broadcast::broadcast);
    for op in reduce::REDUCE_OPS {
        reg.register(op, reduce::reduce);
    }
    reg.register("MatMul", matmul::matmul);

    reg.register_tagged("Exp", Generation::V2, elementwise::linear_v2);
    reg.register_tagged("Load", Generation::V2, memory::load_v2);
}

pub(crate) fn register_micro(reg: &mut FormulaRegistry) {
    for op in micro::VECTOR_OPS {
        reg.register(op, micro::vector);
    }
    reg.register("CopyGmToUbuf", micro::copy_gm_to_ubuf);
    reg.register("CopyUbufToGm", micro::copy_ubuf_to_gm);
    reg.register("Mmad", micro::mmad);
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::params::ParamTable;
    use crate::shape::TensorShapeInfo;
    use crate::soc::SocProfile;

    pub fn run(formula: crate::registry::FormulaFn, query: &PerfQuery) -> Result<PerfOutputInfo, PerfError> {
        run_on(&SocProfile::default(), formula, query)
    }

    pub fn run_on(
        soc: &SocProfile,
        formula: crate::registry::FormulaFn,
        query: &PerfQuery,
    ) -> Result<PerfOutputInfo, PerfError> {
        let ctx = FormulaCtx::new(ParamTable::builtin(), soc);
        let mut out = PerfOutputInfo::new();
        formula(&ctx, query, &mut out)?;
        Ok(out)
    }

    pub fn unary(op: &str, input: TensorShapeInfo, output: TensorShapeInfo) -> PerfQuery {
        PerfQuery::new(op).with_input(input).with_output(output)
    }

    pub fn close(expr: &Expr, expected: f64) -> bool {
        expr.as_f64().is_some_and(|v| (v - expected).abs() < 1e-9)
    }
}
