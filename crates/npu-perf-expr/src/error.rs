//! Error types for symbolic cost expressions.

use crate::symbol::Symbol;

/// Errors that can occur when querying, resolving or parsing expressions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// A numeric value was requested from an expression that still
    /// contains symbols.
    #[error("expression `{0}` is not a constant")]
    NotConstant(String),

    /// Evaluation reached a symbol with no binding.
    #[error("symbol `{0}` has no binding")]
    UnboundSymbol(Symbol),

    /// A case placeholder transitively depends on itself.
    #[error("case placeholder `{0}` depends on itself")]
    CaseCycle(Symbol),

    /// Two pending maps define the same placeholder.
    #[error("case placeholder `{0}` is defined twice")]
    PlaceholderCollision(Symbol),

    /// A cost references a placeholder that no pending map defines.
    #[error("case placeholder `{0}` has no definition")]
    UndefinedPlaceholder(Symbol),

    /// Textual expression could not be parsed.
    #[error("cannot parse `{input}`: {reason}")]
    Parse { input: String, reason: String },
}
