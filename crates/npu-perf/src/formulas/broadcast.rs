//! Broadcast decomposition.
//!
//! The input is first padded to the output rank with leading singleton
//! dimensions. Output singletons are dropped and neighbouring axes of the
//! same kind are merged, so what remains alternates between kept and
//! broadcast runs. The merged rank then selects a pattern:
//!
//! | axes | pattern |
//! |---|---|
//! | `[K]` / `[B]` | copy / scalar duplicate |
//! | `[B, K]` | outer: `B` copies of the row |
//! | `[K, B]` | inner: transpose-like for short `B`, else `K` duplicates |
//! | `[K, B, K]` | middle: row copies plus an OR-mask for the tail block |
//! | longer | peel the outermost run and recurse |

use npu_perf_expr::{Expr, PendingCases, Predicate, build_case};

use crate::error::PerfError;
use crate::formulas::vector_cost;
use crate::output::PerfOutputInfo;
use crate::pipe::PipeType;
use crate::query::{FormulaCtx, PerfQuery};
use crate::shape::DataType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisKind {
    Keep,
    Broadcast,
}

/// A run of merged axes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Axis {
    pub kind: AxisKind,
    /// Product of the run's output dimensions.
    pub extent: Expr,
}

impl Axis {
    fn keep(extent: impl Into<Expr>) -> Self {
        Self {
            kind: AxisKind::Keep,
            extent: extent.into(),
        }
    }

    fn broadcast(extent: impl Into<Expr>) -> Self {
        Self {
            kind: AxisKind::Broadcast,
            extent: extent.into(),
        }
    }
}

fn dims_text(dims: &[Expr]) -> String {
    let dims: Vec<_> = dims.iter().map(ToString::to_string).collect();
    format!("[{}]", dims.join(", "))
}

/// Normalizes `input -> output` into alternating runs.
pub fn merge_axes(input: &[Expr], output: &[Expr]) -> Result<Vec<Axis>, PerfError> {
    let incompatible = || PerfError::IncompatibleBroadcast {
        input: dims_text(input),
        output: dims_text(output),
    };
    if input.len() > output.len() {
        return Err(incompatible());
    }
    let one = Expr::one();
    let pad = output.len() - input.len();

    let mut axes: Vec<Axis> = Vec::new();
    for (idx, o) in output.iter().enumerate() {
        let i = if idx < pad { &one } else { &input[idx - pad] };
        if *o == one {
            if *i != one {
                return Err(incompatible());
            }
            continue;
        }
        let kind = if i == o {
            AxisKind::Keep
        } else if *i == one {
            AxisKind::Broadcast
        } else {
            return Err(incompatible());
        };
        match axes.last_mut() {
            Some(last) if last.kind == kind => last.extent = &last.extent * o,
            _ => axes.push(Axis {
                kind,
                extent: o.clone(),
            }),
        }
    }
    Ok(axes)
}

fn elements(axes: &[Axis]) -> Expr {
    axes.iter().fold(Expr::one(), |acc, a| acc * &a.extent)
}

/// `[rows, b]`: each of `rows` values is repeated `b` times.
fn inner_broadcast(
    ctx: &FormulaCtx<'_>,
    dtype: DataType,
    rows: &Expr,
    b: &Expr,
    pending: &mut PendingCases,
) -> Result<Expr, PerfError> {
    let block = ctx.soc.block_elems(dtype);
    let filled = rows * block;
    let transpose_like =
        vector_cost(ctx, "Vdup", dtype, filled.clone())? + vector_cost(ctx, "Vtranspose", dtype, filled)?;
    let per_row = rows * vector_cost(ctx, "Vdup", dtype, b.clone())?;
    Ok(build_case(Predicate::less(b.clone(), block), transpose_like, per_row, pending))
}

/// Vector cost of a normalized broadcast.
pub fn axes_cost(
    ctx: &FormulaCtx<'_>,
    dtype: DataType,
    axes: &[Axis],
    pending: &mut PendingCases,
) -> Result<Expr, PerfError> {
    use AxisKind::{Broadcast, Keep};

    match axes {
        [] => vector_cost(ctx, "Vcopy", dtype, 1),
        [a] => {
            let instr = if a.kind == Keep { "Vcopy" } else { "Vdup" };
            vector_cost(ctx, instr, dtype, a.extent.clone())
        }
        [outer, inner] if outer.kind == Broadcast => {
            Ok(&outer.extent * vector_cost(ctx, "Vcopy", dtype, inner.extent.clone())?)
        }
        [rows, inner] => inner_broadcast(ctx, dtype, &rows.extent, &inner.extent, pending),
        [n1, b, n2] if n1.kind == Keep => {
            let copies = &n1.extent * &b.extent;
            let rows = &copies * vector_cost(ctx, "Vcopy", dtype, n2.extent.clone())?;
            let block = ctx.soc.block_elems(dtype);
            let tail = n2.extent.clone().modulo(block).tail_exists();
            let mask = tail * copies * vector_cost(ctx, "Vor", dtype, block)?;
            Ok(rows + mask)
        }
        [head, rest @ ..] => {
            let inner = axes_cost(ctx, dtype, rest, pending)?;
            match head.kind {
                Keep => Ok(&head.extent * inner),
                Broadcast => {
                    let copies = &head.extent - 1;
                    Ok(inner + copies * vector_cost(ctx, "Vcopy", dtype, elements(rest))?)
                }
            }
        }
    }
}

pub fn broadcast(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    let input = query.input(0)?;
    let output = query.output(0)?;
    let axes = merge_axes(&input.shape, &output.shape)?;
    log::debug!("broadcast {} -> {}: {} merged axes", dims_text(&input.shape), dims_text(&output.shape), axes.len());
    let cost = axes_cost(ctx, input.dtype, &axes, &mut out.pending)?;
    out.set_pipe(PipeType::Vector, cost);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::test_util::{run, unary};
    use crate::params::ParamTable;
    use crate::shape::TensorShapeInfo;
    use crate::soc::SocProfile;

    fn dims(v: &[i64]) -> Vec<Expr> {
        v.iter().map(|&d| Expr::from(d)).collect()
    }

    fn f16(shape: &[i64]) -> TensorShapeInfo {
        TensorShapeInfo::new(DataType::Float16, shape.iter().copied())
    }

    fn cost(from: &[i64], to: &[i64]) -> PerfOutputInfo {
        run(broadcast, &unary("Broadcast", f16(from), f16(to))).unwrap()
    }

    fn vec_op(instr: &str, n: i64) -> f64 {
        let c = ParamTable::builtin().linear(instr, "float16tofloat16").unwrap();
        n as f64 * c.k + c.b
    }

    fn value(out: &PerfOutputInfo) -> f64 {
        out.pipe(PipeType::Vector).unwrap().as_f64().unwrap()
    }

    #[test]
    fn merge_drops_singletons_and_merges_runs() {
        let axes = merge_axes(&dims(&[1, 4, 1, 8]), &dims(&[2, 4, 1, 8])).unwrap();
        assert_eq!(axes, vec![Axis::broadcast(2), Axis::keep(32)]);

        let axes = merge_axes(&dims(&[8]), &dims(&[3, 5, 8])).unwrap();
        assert_eq!(axes, vec![Axis::broadcast(15), Axis::keep(8)]);
    }

    #[test]
    fn incompatible_shapes() {
        assert!(matches!(
            merge_axes(&dims(&[3, 4]), &dims(&[5, 4])),
            Err(PerfError::IncompatibleBroadcast { .. })
        ));
        assert!(merge_axes(&dims(&[2, 3, 4]), &dims(&[3, 4])).is_err());
        assert!(merge_axes(&[Expr::symbol("n")], &[Expr::symbol("m")]).is_err());
    }

    #[test]
    fn outer_axis_broadcast() {
        let out = cost(&[1, 128], &[64, 128]);
        assert!(out.pending.is_empty());
        assert!((value(&out) - 64.0 * vec_op("Vcopy", 128)).abs() < 1e-9);
    }

    #[test]
    fn identity_and_scalar() {
        let out = cost(&[4, 8], &[4, 8]);
        assert!((value(&out) - vec_op("Vcopy", 32)).abs() < 1e-9);
        let out = cost(&[1], &[100]);
        assert!((value(&out) - vec_op("Vdup", 100)).abs() < 1e-9);
    }

    #[test]
    fn short_inner_broadcast_is_transpose_like() {
        let out = cost(&[64, 1], &[64, 4]);
        let filled = 64 * SocProfile::default().block_elems(DataType::Float16);
        let expected = vec_op("Vdup", filled) + vec_op("Vtranspose", filled);
        assert!((value(&out) - expected).abs() < 1e-9);
    }

    #[test]
    fn long_inner_broadcast_duplicates_rows() {
        let out = cost(&[64, 1], &[64, 256]);
        assert!((value(&out) - 64.0 * vec_op("Vdup", 256)).abs() < 1e-9);
    }

    #[test]
    fn middle_axis_with_tail() {
        let aligned = cost(&[4, 1, 32], &[4, 3, 32]);
        assert!((value(&aligned) - 12.0 * vec_op("Vcopy", 32)).abs() < 1e-9);

        let tailed = cost(&[4, 1, 20], &[4, 3, 20]);
        let expected = 12.0 * vec_op("Vcopy", 20) + 12.0 * vec_op("Vor", 16);
        assert!((value(&tailed) - expected).abs() < 1e-9);
    }

    #[test]
    fn four_runs_split_recursively() {
        // [B=2, K=4, B=3, K=32]
        let out = cost(&[1, 4, 1, 32], &[2, 4, 3, 32]);
        let inner = 12.0 * vec_op("Vcopy", 32);
        let expected = inner + vec_op("Vcopy", 4 * 3 * 32);
        assert!((value(&out) - expected).abs() < 1e-9);
    }

    #[test]
    fn symbolic_inner_extent_defers() {
        let b = Expr::symbol("b");
        let input = f16(&[64, 1]);
        let output = TensorShapeInfo::new(DataType::Float16, [Expr::from(64), b]);
        let out = run(broadcast, &unary("Broadcast", input, output)).unwrap();
        assert_eq!(out.pending.len(), 1);
        assert!(out.pipe(PipeType::Vector).unwrap().as_symbol().is_some());
    }
}
