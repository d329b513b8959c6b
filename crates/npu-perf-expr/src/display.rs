//! Deterministic text form of expressions.
//!
//! The output is stable across runs so it can be used for golden-value
//! tests: parentheses are emitted from operator precedence only, never from
//! how the tree happened to be built.

use std::fmt;

use crate::expr::{BinaryOp, CompareKind, Expr, ExprKind, UnaryOp};
use crate::number::Number;

const PREC_COMPARE: u8 = 0;
const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_UNARY: u8 = 3;
const PREC_ATOM: u8 = 4;

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Negate => "-",
            Self::Ceil => "ceil",
            Self::Floor => "floor",
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Min => "min",
            Self::Max => "max",
        })
    }
}

impl fmt::Display for CompareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
        })
    }
}

fn number_precedence(n: &Number) -> u8 {
    match n {
        _ if !n.is_finite() => PREC_ATOM,
        _ if n.is_negative() => PREC_UNARY,
        Number::Rational(_) => PREC_MUL,
        _ => PREC_ATOM,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr.kind() {
        ExprKind::Const(n) => number_precedence(n),
        ExprKind::Bool(_) | ExprKind::Symbol(_) | ExprKind::Select { .. } => PREC_ATOM,
        ExprKind::Unary {
            op: UnaryOp::Negate,
            ..
        } => PREC_UNARY,
        ExprKind::Unary { .. } => PREC_ATOM,
        ExprKind::Binary { op, .. } => match op {
            BinaryOp::Add | BinaryOp::Subtract => PREC_ADD,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => PREC_MUL,
            BinaryOp::Min | BinaryOp::Max => PREC_ATOM,
        },
        ExprKind::Compare { .. } => PREC_COMPARE,
    }
}

/// Writes `expr`, parenthesised if it binds looser than `min_prec`.
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min_prec: u8) -> fmt::Result {
    if precedence(expr) < min_prec {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Const(n) => write!(f, "{n}"),
            ExprKind::Bool(b) => write!(f, "{b}"),
            ExprKind::Symbol(s) => write!(f, "{s}"),
            ExprKind::Unary {
                op: UnaryOp::Negate,
                arg,
            } => {
                f.write_str("-")?;
                write_operand(f, arg, PREC_ATOM)
            }
            ExprKind::Unary { op, arg } => write!(f, "{op}({arg})"),
            ExprKind::Binary {
                op: op @ (BinaryOp::Min | BinaryOp::Max),
                lhs,
                rhs,
            } => write!(f, "{op}({lhs}, {rhs})"),
            ExprKind::Binary { op, lhs, rhs } => {
                let prec = precedence(self);
                write_operand(f, lhs, prec)?;
                write!(f, " {op} ")?;
                // Right operands of equal precedence are always bracketed so
                // `a - (b - c)` and `a * (b / c)` keep their tree shape.
                write_operand(f, rhs, prec + 1)
            }
            ExprKind::Compare { kind, lhs, rhs } => {
                write_operand(f, lhs, PREC_ADD)?;
                write!(f, " {kind} ")?;
                write_operand(f, rhs, PREC_ADD)
            }
            ExprKind::Select {
                condition,
                accept,
                reject,
            } => write!(f, "({condition} ? {accept} : {reject})"),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({self})")
    }
}
