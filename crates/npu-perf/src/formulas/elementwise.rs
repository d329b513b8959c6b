//! Point-wise operators: one linear model over the output element count.

use crate::error::PerfError;
use crate::output::PerfOutputInfo;
use crate::params::evaluate_linear;
use crate::pipe::PipeType;
use crate::query::{FormulaCtx, PerfQuery};
use crate::shape::{DataType, dtype_pair};

pub const LINEAR_OPS: [&str; 11] = [
    "Abs", "Exp", "Relu", "Sqrt", "Add", "Sub", "Mul", "Div", "Maximum", "Minimum", "Cast",
];

const BINARY_OPS: [&str; 6] = ["Add", "Sub", "Mul", "Div", "Maximum", "Minimum"];

pub const COMPARE_OPS: [&str; 6] = ["Less", "LessEqual", "Greater", "GreaterEqual", "Equal", "NotEqual"];

/// Calibration factor applied to int32 compare coefficients for int64
/// inputs, which have no fit of their own.
pub const INT64_COMPARE_ADJUSTMENT: f64 = 1.8374;

fn arity(op: &str) -> usize {
    if BINARY_OPS.contains(&op) || COMPARE_OPS.contains(&op) {
        2
    } else {
        1
    }
}

fn linear_with(instr: &str, ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    query.input(arity(&query.op_type) - 1)?;
    let input = query.input(0)?;
    let output = query.output(0)?;
    let coeffs = ctx.params.linear(instr, &dtype_pair(input.dtype, output.dtype))?;
    out.set_pipe(PipeType::Vector, evaluate_linear(coeffs, output.element_count()));
    Ok(())
}

/// `k * elements + b` from the entry for the operator's own name.
pub fn linear(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    linear_with(&query.op_type, ctx, query, out)
}

/// Second-generation refit: same model, `{op}_V2` coefficients.
pub fn linear_v2(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    linear_with(&format!("{}_V2", query.op_type), ctx, query, out)
}

/// Comparisons produce `bool` and are keyed by `{input}tobool`.
pub fn compare(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    query.input(1)?;
    let input = query.input(0)?;
    let output = query.output(0)?;
    let elements = output.element_count();

    let cost = if input.dtype == DataType::Int64 {
        let coeffs = ctx
            .params
            .linear(&query.op_type, &dtype_pair(DataType::Int32, DataType::Bool))?;
        evaluate_linear(coeffs, elements) * INT64_COMPARE_ADJUSTMENT
    } else {
        let coeffs = ctx
            .params
            .linear(&query.op_type, &dtype_pair(input.dtype, DataType::Bool))?;
        evaluate_linear(coeffs, elements)
    };
    out.set_pipe(PipeType::Vector, cost);
    Ok(())
}
