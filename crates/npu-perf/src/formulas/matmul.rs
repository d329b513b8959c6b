//! Cube matrix multiply `A[.., M, K] @ B[.., K, N]`.
//!
//! Operands are split into fractals; each fractal triple costs a fixed number
//! of cube cycles. Both operands travel GM -> L1 -> L0 and the result
//! leaves through the fixpipe. All pipes are shared across `block_dim` cores.

use npu_perf_expr::Expr;

use crate::error::PerfError;
use crate::output::PerfOutputInfo;
use crate::pipe::PipeType;
use crate::query::{FormulaCtx, PerfQuery};
use crate::shape::{TensorShapeInfo, product};
use crate::soc::SocProfile;

/// Problem extents of one matrix multiply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatmulDims {
    pub batch: Expr,
    pub m: Expr,
    pub k: Expr,
    pub n: Expr,
}

impl MatmulDims {
    /// Reads `(batch, M, K, N)` from the two operands.
    pub fn from_operands(op: &str, a: &TensorShapeInfo, b: &TensorShapeInfo) -> Result<Self, PerfError> {
        if a.rank() < 2 || b.rank() < 2 {
            return Err(PerfError::RankMismatch {
                op: op.to_string(),
                lhs: a.rank(),
                rhs: b.rank(),
            });
        }
        let (a_batch, a_mat) = a.shape.split_at(a.rank() - 2);
        let b_mat = &b.shape[b.rank() - 2..];
        let (k, k_b) = (&a_mat[1], &b_mat[0]);
        if k.is_constant() && k_b.is_constant() && k != k_b {
            return Err(PerfError::UnsupportedLayout {
                op: op.to_string(),
                reason: format!("contraction extents differ ({k} vs {k_b})"),
            });
        }
        Ok(Self {
            batch: product(a_batch),
            m: a_mat[0].clone(),
            k: k.clone(),
            n: b_mat[1].clone(),
        })
    }

    /// Number of `(M, K, N)` fractal triples the cube has to process.
    pub fn fractals(&self, soc: &SocProfile) -> Expr {
        let (fm, fk, fn_) = soc.cube_fractal;
        &self.batch * self.m.clone().ceil_div(fm) * self.k.clone().ceil_div(fk) * self.n.clone().ceil_div(fn_)
    }
}

pub fn matmul(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    let a = query.input(0)?;
    let b = query.input(1)?;
    let c = query.output(0)?;
    let dims = MatmulDims::from_operands(&query.op_type, a, b)?;
    let soc = ctx.soc;
    let block_dim = ctx.block_dim();

    let cube = dims.fractals(soc) * soc.cube_cycles_per_fractal / &block_dim;
    let operand_bytes = a.data_bytes() + b.data_bytes();
    let mte2 = operand_bytes.clone() / soc.gm_bandwidth / &block_dim;
    let mte1 = operand_bytes / soc.l1_bandwidth / &block_dim;
    let fixpipe = c.data_bytes() / soc.fixpipe_bandwidth / &block_dim;

    out.set_pipe(PipeType::Cube, cube);
    out.set_pipe(PipeType::Mte2, mte2);
    out.set_pipe(PipeType::Mte1, mte1);
    out.set_pipe(PipeType::Fixpipe, fixpipe);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::test_util::{close, run_on};
    use crate::shape::DataType;
    use crate::soc::Generation;

    fn f16(shape: &[i64]) -> TensorShapeInfo {
        TensorShapeInfo::new(DataType::Float16, shape.iter().copied())
    }

    fn query(a: &[i64], b: &[i64], c: &[i64]) -> PerfQuery {
        PerfQuery::new("MatMul").with_input(f16(a)).with_input(f16(b)).with_output(f16(c))
    }

    #[test]
    fn square_single_core() {
        let soc = SocProfile::default().with_core_count(1);
        let out = run_on(&soc, matmul, &query(&[64, 64], &[64, 64], &[64, 64])).unwrap();
        // 4 * 4 * 4 fractals at one cycle each.
        assert!(close(out.pipe(PipeType::Cube).unwrap(), 64.0));
        // 2 * 8192 bytes over 64 B/cycle.
        assert!(close(out.pipe(PipeType::Mte2).unwrap(), 256.0));
        assert!(close(out.pipe(PipeType::Mte1).unwrap(), 64.0));
        assert!(close(out.pipe(PipeType::Fixpipe).unwrap(), 64.0));
    }

    #[test]
    fn partial_fractals_round_up() {
        let soc = SocProfile::default().with_core_count(1);
        let out = run_on(&soc, matmul, &query(&[2, 17, 16], &[2, 16, 1], &[2, 17, 1])).unwrap();
        // batch 2 * ceil(17/16) * 1 * ceil(1/16)
        assert!(close(out.pipe(PipeType::Cube).unwrap(), 4.0));
    }

    #[test]
    fn cores_divide_the_work() {
        let soc = SocProfile::for_generation(Some(Generation::V2)).with_core_count(4);
        let out = run_on(&soc, matmul, &query(&[64, 64], &[64, 64], &[64, 64])).unwrap();
        assert!(close(out.pipe(PipeType::Cube).unwrap(), 64.0 * 2.0 / 4.0));
    }

    #[test]
    fn symbolic_block_dim_stays_free() {
        let out = run_on(&SocProfile::default(), matmul, &query(&[32, 32], &[32, 32], &[32, 32])).unwrap();
        let bd = Expr::symbol("block_dim");
        for cost in out.pipe_costs.values() {
            assert!(cost.contains_symbol(bd.as_symbol().unwrap()), "{cost}");
        }
    }

    #[test]
    fn shape_errors() {
        let soc = SocProfile::default();
        assert!(matches!(
            run_on(&soc, matmul, &query(&[64], &[64, 64], &[64])),
            Err(PerfError::RankMismatch { lhs: 1, rhs: 2, .. })
        ));
        assert!(matches!(
            run_on(&soc, matmul, &query(&[8, 32], &[16, 8], &[8, 8])),
            Err(PerfError::UnsupportedLayout { .. })
        ));
    }
}
