//! Error types for cost estimation.

use npu_perf_expr::ExprError;

/// Which operand list of a query an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandSide {
    Input,
    Output,
}

impl std::fmt::Display for OperandSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Output => "output",
        })
    }
}

/// Errors reported by formula lookup and evaluation.
///
/// All of these are recoverable: the caller may skip the candidate or fall
/// back to a constant cost.
#[derive(Debug, thiserror::Error)]
pub enum PerfError {
    /// The query has fewer operands than the formula needs.
    #[error("{op}: expected at least {expected} {side} operand(s), got {got}")]
    MissingOperands {
        op: String,
        side: OperandSide,
        expected: usize,
        got: usize,
    },

    /// An operand has rank 0 where a dimension is required.
    #[error("{op}: operand has an empty shape")]
    EmptyShape { op: String },

    /// Operand ranks are incompatible for the formula.
    #[error("{op}: rank mismatch ({lhs} vs {rhs})")]
    RankMismatch { op: String, lhs: usize, rhs: usize },

    /// A data type name that is not one of the known types.
    #[error("unknown data type `{0}`")]
    UnknownDataType(String),

    /// No coefficients for this instruction and dtype pair.
    #[error("no parameters for `{instr}` with `{dtype_pair}`")]
    MissingParams { instr: String, dtype_pair: String },

    /// The table entry exists but uses a different model kind.
    #[error("parameters for `{instr}` are not a {expected} model")]
    ModelMismatch {
        instr: String,
        expected: &'static str,
    },

    /// Input and output shapes cannot be related by broadcasting.
    #[error("cannot broadcast {input} to {output}")]
    IncompatibleBroadcast { input: String, output: String },

    /// The operand layout is not one the formula models.
    #[error("{op}: unsupported layout: {reason}")]
    UnsupportedLayout { op: String, reason: String },

    /// A formula returned without setting any pipe cost.
    #[error("{op}: formula produced no pipe cost")]
    NoPipeCost { op: String },

    /// No formula is registered for this operator.
    #[error("no cost formula registered for `{0}`")]
    UnknownOp(String),

    /// The parameter table text is not valid.
    #[error("malformed parameter table: {0}")]
    MalformedParams(#[from] serde_json::Error),

    /// An operand descriptor could not be parsed.
    #[error("invalid operand `{input}`: {reason}")]
    InvalidOperand { input: String, reason: String },

    #[error(transparent)]
    Expr(#[from] ExprError),
}
