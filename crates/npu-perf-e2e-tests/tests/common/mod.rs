use npu_perf::{
    DataType, FormulaCtx, FormulaRegistry, Generation, ParamTable, PerfError, PerfOutputInfo, PerfQuery,
    SocProfile, TensorShapeInfo,
};
use npu_perf_expr::{Bindings, Expr, Symbol};

/// A packed fp16 operand in GM.
#[allow(dead_code)]
pub fn f16(shape: &[i64]) -> TensorShapeInfo {
    TensorShapeInfo::new(DataType::Float16, shape.iter().copied())
}

/// An operand whose dimensions may be symbols or expressions.
#[allow(dead_code)]
pub fn tensor<I>(dtype: DataType, shape: I) -> TensorShapeInfo
where
    I: IntoIterator,
    I::Item: Into<Expr>,
{
    TensorShapeInfo::new(dtype, shape)
}

/// Parse an operand from its text form, panicking on bad test input.
#[allow(dead_code)]
pub fn operand(spec: &str) -> TensorShapeInfo {
    spec.parse().unwrap_or_else(|e| panic!("bad operand {spec}: {e}"))
}

/// Cost `query` against the built-in graph registry on the default SoC.
#[allow(dead_code)]
pub fn graph(query: &PerfQuery) -> PerfOutputInfo {
    try_graph(query, None).expect("graph estimate failed")
}

#[allow(dead_code)]
pub fn try_graph(query: &PerfQuery, generation: Option<Generation>) -> Result<PerfOutputInfo, PerfError> {
    let soc = SocProfile::for_generation(generation);
    run(npu_perf::builtin_graph_registry(), ParamTable::builtin(), &soc, query, generation)
}

/// Cost `query` against the built-in micro registry.
#[allow(dead_code)]
pub fn micro(query: &PerfQuery) -> PerfOutputInfo {
    let soc = SocProfile::default();
    run(npu_perf::builtin_micro_registry(), ParamTable::builtin(), &soc, query, None)
        .expect("micro estimate failed")
}

#[allow(dead_code)]
pub fn run(
    registry: &FormulaRegistry,
    params: &ParamTable,
    soc: &SocProfile,
    query: &PerfQuery,
    generation: Option<Generation>,
) -> Result<PerfOutputInfo, PerfError> {
    let ctx = FormulaCtx::new(params, soc);
    npu_perf::estimate(registry, &ctx, query, generation)
}

#[allow(dead_code)]
pub fn unary(op: &str, input: TensorShapeInfo, output: TensorShapeInfo) -> PerfQuery {
    PerfQuery::new(op).with_input(input).with_output(output)
}

/// Bindings from `(name, value)` pairs.
#[allow(dead_code)]
pub fn env(pairs: &[(&str, i64)]) -> Bindings {
    pairs
        .iter()
        .map(|(name, value)| (Symbol::new(*name), Expr::from(*value)))
        .collect()
}

/// Evaluated cycles on one pipe.
#[allow(dead_code)]
pub fn cycles(out: &PerfOutputInfo, pipe: npu_perf::PipeType, bindings: &Bindings) -> f64 {
    out.evaluate(bindings).expect("evaluation failed")[&pipe].to_f64()
}

#[allow(dead_code)]
pub fn assert_close(actual: f64, expected: f64) {
    let tolerance = 1e-9 * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() < tolerance,
        "expected {expected}, got {actual}"
    );
}
