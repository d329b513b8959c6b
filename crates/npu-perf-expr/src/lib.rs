//! Symbolic cost expressions for NPU performance estimation.
//!
//! A cost is an [`Expr`] over numeric constants and run-time symbols such
//! as shape dimensions or `block_dim`. Constant sub-expressions fold at
//! construction. Decisions that depend on a run-time symbol are recorded
//! as case nodes ([`build_case`]) and inlined later by the
//! [resolution pass](resolve).

pub mod case;
mod display;
mod error;
mod expr;
mod number;
mod parse;
pub mod resolve;
mod symbol;

pub use case::{CaseTree, PendingCases, Predicate, TernaryOp, build_case};
pub use error::ExprError;
pub use expr::{BinaryOp, Bindings, CompareKind, Expr, ExprKind, UnaryOp, bindings};
pub use number::Number;
pub use resolve::{
    Resolved, expand, resolve, resolve_pending, try_expand, try_resolve, try_resolve_pending,
};
pub use symbol::Symbol;
