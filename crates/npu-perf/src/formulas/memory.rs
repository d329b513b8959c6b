//! Global-memory transfers.
//!
//! A packed operand moves as one run and is costed with the contiguous
//! model, split on the large-transfer threshold. Otherwise the packed
//! innermost dimensions form one block and the outer dimensions give the
//! repeat count. Blocks whose byte length is a multiple of the UB block
//! use the aligned model; others are padded up to the next UB block.
//! Stores additionally split aligned blocks on the small-block threshold
//! (a block of exactly that size counts as large).

use npu_perf_expr::{CaseTree, Expr, PendingCases, Predicate, build_case};

use crate::error::PerfError;
use crate::output::PerfOutputInfo;
use crate::pipe::PipeType;
use crate::query::{FormulaCtx, PerfQuery};
use crate::shape::{DataType, MemoryTier, TensorShapeInfo, dtype_pair, product};
use crate::soc::SocProfile;

/// Parameter-table entries used by one transfer direction.
#[derive(Clone, Copy, Debug)]
pub struct TransferModel {
    /// `LoadStoreFunc` entry for packed transfers.
    pub contiguous: &'static str,
    /// `LoadStoreStrideFunc` entry for block transfers.
    pub stride: &'static str,
    /// `StoreFunc` entry for aligned blocks, if the direction has one.
    pub block: Option<&'static str>,
}

pub const LOAD: TransferModel = TransferModel {
    contiguous: "Load",
    stride: "LoadStride",
    block: None,
};

pub const STORE: TransferModel = TransferModel {
    contiguous: "Store",
    stride: "StoreStride",
    block: Some("StoreBlock"),
};

/// `(repeat, block_elems)` of a non-packed operand.
pub fn block_layout(tensor: &TensorShapeInfo) -> (Expr, Expr) {
    let split = tensor.rank() - tensor.contiguous_suffix();
    (product(&tensor.shape[..split]), product(&tensor.shape[split..]))
}

/// `bytes` rounded up to a whole number of UB blocks.
pub fn pad_to_block(soc: &SocProfile, bytes: &Expr) -> Expr {
    bytes.clone().ceil_div(soc.ub_block_bytes) * soc.ub_block_bytes
}

/// Packed transfer of the whole operand.
pub fn contiguous_cost(
    ctx: &FormulaCtx<'_>,
    instr: &str,
    tensor: &TensorShapeInfo,
    pending: &mut PendingCases,
) -> Result<Expr, PerfError> {
    let coeffs = ctx.params.load_store(instr, &dtype_pair(tensor.dtype, tensor.dtype))?;
    let block_dim = ctx.block_dim();
    let elements = tensor.element_count();
    Ok(build_case(
        Predicate::less(tensor.data_bytes(), ctx.soc.large_transfer_bytes),
        coeffs.small(&elements, &block_dim),
        coeffs.large(&elements, &block_dim),
        pending,
    ))
}

/// Strided transfer of `repeat` blocks of `block_bytes` each, without the
/// alignment split.
pub fn stride_cost(
    ctx: &FormulaCtx<'_>,
    instr: &str,
    dtype: DataType,
    repeat: &Expr,
    block_bytes: &Expr,
) -> Result<Expr, PerfError> {
    let coeffs = ctx.params.stride(instr, &dtype_pair(dtype, dtype))?;
    Ok(coeffs.evaluate(repeat, block_bytes, &ctx.block_dim()))
}

/// Transfer of `repeat` blocks of `block_elems` elements, split on
/// alignment.
pub fn strided_cost(
    ctx: &FormulaCtx<'_>,
    model: &TransferModel,
    dtype: DataType,
    repeat: &Expr,
    block_elems: &Expr,
    pending: &mut PendingCases,
) -> Result<Expr, PerfError> {
    let soc = ctx.soc;
    let block_bytes = block_elems * dtype.byte_size();

    let aligned = match model.block {
        None => CaseTree::Leaf(stride_cost(ctx, model.stride, dtype, repeat, &block_bytes)?),
        Some(instr) => {
            let coeffs = ctx.params.store_block(instr, &dtype_pair(dtype, dtype))?;
            CaseTree::node(
                Predicate::less(block_bytes.clone(), soc.store_small_block_bytes),
                coeffs.small(repeat, &block_bytes),
                coeffs.large(repeat, &block_bytes),
            )
        }
    };
    let padded = pad_to_block(soc, &block_bytes);
    let unaligned = stride_cost(ctx, model.stride, dtype, repeat, &padded)?;

    Ok(build_case(
        Predicate::equal(block_bytes.modulo(soc.ub_block_bytes), 0),
        aligned,
        unaligned,
        pending,
    ))
}

/// Cost of moving `tensor` between GM and UB in the direction of `model`.
pub fn transfer_cost(
    ctx: &FormulaCtx<'_>,
    model: &TransferModel,
    tensor: &TensorShapeInfo,
    pending: &mut PendingCases,
) -> Result<Expr, PerfError> {
    if tensor.is_contiguous() {
        contiguous_cost(ctx, model.contiguous, tensor, pending)
    } else {
        let (repeat, block_elems) = block_layout(tensor);
        strided_cost(ctx, model, tensor.dtype, &repeat, &block_elems, pending)
    }
}

fn require_gm(query: &PerfQuery, tensor: &TensorShapeInfo) -> Result<(), PerfError> {
    if tensor.location != MemoryTier::GM {
        return Err(PerfError::UnsupportedLayout {
            op: query.op_type.clone(),
            reason: format!("global-memory operand is in {}", tensor.location),
        });
    }
    Ok(())
}

/// GM to UB.
pub fn load(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    let src = query.shaped_input(0)?;
    require_gm(query, src)?;
    let cost = transfer_cost(ctx, &LOAD, src, &mut out.pending)?;
    out.set_pipe(PipeType::Mte2, cost);
    Ok(())
}

/// Second-generation load: packed transfers have no large-transfer
/// penalty, so they use a single `Load_V2` fit.
pub fn load_v2(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    let src = query.shaped_input(0)?;
    require_gm(query, src)?;
    if !src.is_contiguous() {
        return load(ctx, query, out);
    }
    let coeffs = ctx.params.load_store("Load_V2", &dtype_pair(src.dtype, src.dtype))?;
    out.set_pipe(PipeType::Mte2, coeffs.small(&src.element_count(), &ctx.block_dim()));
    Ok(())
}

/// UB to GM.
pub fn store(ctx: &FormulaCtx<'_>, query: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
    let dst = query.shaped_output(0)?;
    require_gm(query, dst)?;
    let cost = transfer_cost(ctx, &STORE, dst, &mut out.pending)?;
    out.set_pipe(PipeType::Mte3, cost);
    Ok(())
}
