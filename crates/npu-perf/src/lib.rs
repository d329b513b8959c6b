//! Per-pipe cost estimation for NPU instructions.
//!
//! A [`PerfQuery`] names an operator and describes its operands. The
//! [`FormulaRegistry`] maps the operator to a cost formula, which fills a
//! [`PerfOutputInfo`] with one symbolic cycle count per [`PipeType`].
//! Coefficients come from a [`ParamTable`] keyed by instruction and dtype
//! pair; hardware constants come from a [`SocProfile`].
//!
//! ```
//! use npu_perf::{DataType, FormulaCtx, ParamTable, PerfQuery, PipeType, SocProfile, TensorShapeInfo};
//!
//! let soc = SocProfile::default();
//! let ctx = FormulaCtx::new(ParamTable::builtin(), &soc);
//! let t = TensorShapeInfo::new(DataType::Float16, [30, 100]);
//! let query = PerfQuery::new("Abs").with_input(t.clone()).with_output(t);
//! let out = npu_perf::estimate(npu_perf::builtin_graph_registry(), &ctx, &query, None).unwrap();
//! assert!(out.pipe(PipeType::Vector).unwrap().is_constant());
//! ```

mod error;
pub mod formulas;
mod output;
pub mod params;
mod pipe;
mod query;
pub mod registry;
mod shape;
pub mod soc;

pub use error::{OperandSide, PerfError};
pub use output::PerfOutputInfo;
pub use params::{
    LinearCoeffs, LoadStoreCoeffs, ModelParams, ParamTable, StoreBlockCoeffs, StrideCoeffs, evaluate_linear,
};
pub use pipe::PipeType;
pub use query::{FormulaCtx, PerfQuery};
pub use registry::{
    DEFAULT_KEY, FormulaFn, FormulaRegistry, OpKey, builtin_graph_registry, builtin_micro_registry, estimate,
    graph_builtins, micro_builtins, register_all,
};
pub use shape::{DataType, MemoryTier, NodeRef, TensorShapeInfo, dtype_pair, packed_strides, product};
pub use soc::{BLOCK_DIM, Generation, SocProfile};

pub use npu_perf_expr as expr;
