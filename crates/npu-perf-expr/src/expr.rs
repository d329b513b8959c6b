//! Immutable symbolic cost expressions.
//!
//! An [`Expr`] is a reference-counted tree node, so cloning is cheap and
//! sub-costs computed once are shared between the accumulators of sibling
//! formula calls. All constructors fold eagerly: an operation whose operands
//! are all constants never survives as a node.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use crate::error::ExprError;
use crate::number::Number;
use crate::symbol::Symbol;

/// Symbol bindings used by [`Expr::substitute`] and [`Expr::evaluate`].
pub type Bindings = BTreeMap<Symbol, Expr>;

/// A unary operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum UnaryOp {
    Negate,
    Ceil,
    Floor,
}

/// A binary arithmetic operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Min,
    Max,
}

/// A comparison operator.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum CompareKind {
    Less,
    LessEqual,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
}

impl CompareKind {
    /// Decides the comparison for two constants.
    ///
    /// NaN operands only satisfy `NotEqual`.
    pub fn holds(self, lhs: Number, rhs: Number) -> bool {
        match (self, lhs.cmp_value(rhs)) {
            (Self::NotEqual, None) => true,
            (_, None) => false,
            (Self::Less, Some(ord)) => ord.is_lt(),
            (Self::LessEqual, Some(ord)) => ord.is_le(),
            (Self::Equal, Some(ord)) => ord.is_eq(),
            (Self::NotEqual, Some(ord)) => ord.is_ne(),
            (Self::Greater, Some(ord)) => ord.is_gt(),
            (Self::GreaterEqual, Some(ord)) => ord.is_ge(),
        }
    }

    /// Result of comparing an expression with itself.
    fn reflexive(self) -> bool {
        matches!(self, Self::LessEqual | Self::Equal | Self::GreaterEqual)
    }
}

/// The node kinds of an [`Expr`].
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ExprKind {
    /// A folded numeric constant.
    Const(Number),
    /// A folded comparison result.
    Bool(bool),
    /// A run-time symbol or case placeholder.
    Symbol(Symbol),
    Unary {
        op: UnaryOp,
        arg: Expr,
    },
    Binary {
        op: BinaryOp,
        lhs: Expr,
        rhs: Expr,
    },
    Compare {
        kind: CompareKind,
        lhs: Expr,
        rhs: Expr,
    },
    /// A resolved case node: `condition ? accept : reject`.
    Select {
        condition: Expr,
        accept: Expr,
        reject: Expr,
    },
}

/// A shared, immutable symbolic expression.
///
/// Equality, ordering and hashing are structural, so two independently
/// built expressions of the same shape are interchangeable map keys.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Expr(Arc<ExprKind>);

impl Expr {
    fn from_kind(kind: ExprKind) -> Self {
        Self(Arc::new(kind))
    }

    /// Returns the node kind.
    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    /// Creates a constant.
    pub fn constant(value: impl Into<Number>) -> Self {
        Self::from_kind(ExprKind::Const(value.into()))
    }

    pub fn zero() -> Self {
        Self::constant(0)
    }

    pub fn one() -> Self {
        Self::constant(1)
    }

    pub fn boolean(value: bool) -> Self {
        Self::from_kind(ExprKind::Bool(value))
    }

    /// Creates a named run-time symbol.
    pub fn symbol(name: &str) -> Self {
        Self::from_symbol(Symbol::new(name))
    }

    pub fn from_symbol(symbol: Symbol) -> Self {
        Self::from_kind(ExprKind::Symbol(symbol))
    }

    /// Builds `op(arg)`, folding constants.
    pub fn unary(op: UnaryOp, arg: Expr) -> Self {
        match (op, arg.kind()) {
            (UnaryOp::Negate, ExprKind::Const(n)) => Self::constant(n.neg()),
            (UnaryOp::Ceil, ExprKind::Const(n)) => Self::constant(n.ceil()),
            (UnaryOp::Floor, ExprKind::Const(n)) => Self::constant(n.floor()),
            (
                UnaryOp::Negate,
                ExprKind::Unary {
                    op: UnaryOp::Negate,
                    arg: inner,
                },
            ) => inner.clone(),
            _ => Self::from_kind(ExprKind::Unary { op, arg }),
        }
    }

    /// Builds `lhs op rhs`, folding constants and trivial identities.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        if let (ExprKind::Const(l), ExprKind::Const(r)) = (lhs.kind(), rhs.kind()) {
            let (l, r) = (*l, *r);
            return Self::constant(match op {
                BinaryOp::Add => l.add(r),
                BinaryOp::Subtract => l.sub(r),
                BinaryOp::Multiply => l.mul(r),
                BinaryOp::Divide => l.div(r),
                BinaryOp::Modulo => l.modulo(r),
                BinaryOp::Min => l.min(r),
                BinaryOp::Max => l.max(r),
            });
        }
        match op {
            BinaryOp::Add if lhs.is_zero() => return rhs,
            BinaryOp::Add | BinaryOp::Subtract if rhs.is_zero() => return lhs,
            BinaryOp::Multiply if lhs.is_zero() || rhs.is_zero() => return Self::zero(),
            BinaryOp::Multiply if lhs.is_one() => return rhs,
            BinaryOp::Multiply | BinaryOp::Divide if rhs.is_one() => return lhs,
            BinaryOp::Min | BinaryOp::Max if lhs == rhs => return lhs,
            _ => {}
        }
        Self::from_kind(ExprKind::Binary { op, lhs, rhs })
    }

    /// Builds a comparison, folding to a boolean when decidable.
    pub fn compare(kind: CompareKind, lhs: Expr, rhs: Expr) -> Self {
        if let (ExprKind::Const(l), ExprKind::Const(r)) = (lhs.kind(), rhs.kind()) {
            return Self::boolean(kind.holds(*l, *r));
        }
        if lhs == rhs {
            return Self::boolean(kind.reflexive());
        }
        Self::from_kind(ExprKind::Compare { kind, lhs, rhs })
    }

    /// Builds `condition ? accept : reject`, folding a decided condition.
    pub fn select(condition: Expr, accept: Expr, reject: Expr) -> Self {
        match condition.kind() {
            ExprKind::Bool(true) => accept,
            ExprKind::Bool(false) => reject,
            _ if accept == reject => accept,
            _ => Self::from_kind(ExprKind::Select {
                condition,
                accept,
                reject,
            }),
        }
    }

    pub fn min(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Min, self, rhs.into())
    }

    pub fn max(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Max, self, rhs.into())
    }

    /// Floored modulo.
    pub fn modulo(self, rhs: impl Into<Expr>) -> Self {
        Self::binary(BinaryOp::Modulo, self, rhs.into())
    }

    pub fn ceil(self) -> Self {
        Self::unary(UnaryOp::Ceil, self)
    }

    pub fn floor(self) -> Self {
        Self::unary(UnaryOp::Floor, self)
    }

    /// `ceil(self / rhs)`.
    pub fn ceil_div(self, rhs: impl Into<Expr>) -> Self {
        (self / rhs.into()).ceil()
    }

    /// `floor(self / rhs)`.
    pub fn floor_div(self, rhs: impl Into<Expr>) -> Self {
        (self / rhs.into()).floor()
    }

    /// `ceil(t / (t + 1))`: 0 when `t` is 0 and 1 for any positive `t`.
    ///
    /// Lets a formula scale a remainder-handling cost without a case node.
    pub fn tail_exists(self) -> Self {
        let next = &self + 1;
        self.ceil_div(next)
    }

    pub fn less_than(self, rhs: impl Into<Expr>) -> Self {
        Self::compare(CompareKind::Less, self, rhs.into())
    }

    pub fn equals(self, rhs: impl Into<Expr>) -> Self {
        Self::compare(CompareKind::Equal, self, rhs.into())
    }

    /// Returns `true` if no symbol occurs in the expression.
    pub fn is_constant(&self) -> bool {
        match self.kind() {
            ExprKind::Const(_) | ExprKind::Bool(_) => true,
            ExprKind::Symbol(_) => false,
            ExprKind::Unary { arg, .. } => arg.is_constant(),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Compare { lhs, rhs, .. } => {
                lhs.is_constant() && rhs.is_constant()
            }
            ExprKind::Select {
                condition,
                accept,
                reject,
            } => condition.is_constant() && accept.is_constant() && reject.is_constant(),
        }
    }

    /// Extracts the numeric value of a constant expression.
    pub fn extract_constant(&self) -> Result<Number, ExprError> {
        match self.kind() {
            ExprKind::Const(n) => Ok(*n),
            _ => Err(ExprError::NotConstant(self.to_string())),
        }
    }

    /// Returns the constant as `f64`, if this is a constant.
    pub fn as_f64(&self) -> Option<f64> {
        self.extract_constant().ok().map(Number::to_f64)
    }

    /// Returns the folded value of a comparison.
    pub fn as_bool(&self) -> Option<bool> {
        match self.kind() {
            ExprKind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self.kind() {
            ExprKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    fn is_zero(&self) -> bool {
        matches!(self.kind(), ExprKind::Const(n) if n.is_zero())
    }

    fn is_one(&self) -> bool {
        matches!(self.kind(), ExprKind::Const(n) if n.is_one())
    }

    /// Calls `f` for every symbol occurrence, in tree order.
    pub fn for_each_symbol(&self, f: &mut impl FnMut(&Symbol)) {
        match self.kind() {
            ExprKind::Const(_) | ExprKind::Bool(_) => {}
            ExprKind::Symbol(s) => f(s),
            ExprKind::Unary { arg, .. } => arg.for_each_symbol(f),
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Compare { lhs, rhs, .. } => {
                lhs.for_each_symbol(f);
                rhs.for_each_symbol(f);
            }
            ExprKind::Select {
                condition,
                accept,
                reject,
            } => {
                condition.for_each_symbol(f);
                accept.for_each_symbol(f);
                reject.for_each_symbol(f);
            }
        }
    }

    /// All distinct symbols, named and placeholder.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.for_each_symbol(&mut |s| {
            out.insert(s.clone());
        });
        out
    }

    /// All distinct case placeholders.
    pub fn placeholders(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.for_each_symbol(&mut |s| {
            if s.is_placeholder() {
                out.insert(s.clone());
            }
        });
        out
    }

    pub fn contains_symbol(&self, symbol: &Symbol) -> bool {
        let mut found = false;
        self.for_each_symbol(&mut |s| found |= s == symbol);
        found
    }

    /// Replaces bound symbols and re-folds. Substituted values are not
    /// themselves searched for further bound symbols.
    ///
    /// Untouched subtrees are shared with `self`, not copied.
    pub fn substitute(&self, bindings: &Bindings) -> Expr {
        if bindings.is_empty() {
            return self.clone();
        }
        match self.kind() {
            ExprKind::Const(_) | ExprKind::Bool(_) => self.clone(),
            ExprKind::Symbol(s) => bindings.get(s).cloned().unwrap_or_else(|| self.clone()),
            ExprKind::Unary { op, arg } => {
                let new_arg = arg.substitute(bindings);
                if new_arg.ptr_eq(arg) {
                    self.clone()
                } else {
                    Self::unary(*op, new_arg)
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (l, r) = (lhs.substitute(bindings), rhs.substitute(bindings));
                if l.ptr_eq(lhs) && r.ptr_eq(rhs) {
                    self.clone()
                } else {
                    Self::binary(*op, l, r)
                }
            }
            ExprKind::Compare { kind, lhs, rhs } => {
                let (l, r) = (lhs.substitute(bindings), rhs.substitute(bindings));
                if l.ptr_eq(lhs) && r.ptr_eq(rhs) {
                    self.clone()
                } else {
                    Self::compare(*kind, l, r)
                }
            }
            ExprKind::Select {
                condition,
                accept,
                reject,
            } => {
                let c = condition.substitute(bindings);
                let a = accept.substitute(bindings);
                let r = reject.substitute(bindings);
                if c.ptr_eq(condition) && a.ptr_eq(accept) && r.ptr_eq(reject) {
                    self.clone()
                } else {
                    Self::select(c, a, r)
                }
            }
        }
    }

    /// Substitutes `bindings` and extracts the resulting number.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<Number, ExprError> {
        let folded = self.substitute(bindings);
        if let Some(symbol) = folded.free_symbols().into_iter().next() {
            return Err(ExprError::UnboundSymbol(symbol));
        }
        folded.extract_constant()
    }

    /// Returns `true` if both handles point at the same node.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Convenience: build a [`Bindings`] map from `(name, value)` pairs.
pub fn bindings<I, V>(pairs: I) -> Bindings
where
    I: IntoIterator<Item = (&'static str, V)>,
    V: Into<Expr>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (Symbol::new(name), value.into()))
        .collect()
}

impl From<Number> for Expr {
    fn from(value: Number) -> Self {
        Self::constant(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Self::constant(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Self::constant(value)
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Self::constant(value)
    }
}

impl From<usize> for Expr {
    fn from(value: usize) -> Self {
        Self::constant(value)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl From<Symbol> for Expr {
    fn from(value: Symbol) -> Self {
        Self::from_symbol(value)
    }
}

impl From<&Expr> for Expr {
    fn from(value: &Expr) -> Self {
        value.clone()
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<R: Into<Expr>> $trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::binary($op, self, rhs.into())
            }
        }

        impl<R: Into<Expr>> $trait<R> for &Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::binary($op, self.clone(), rhs.into())
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Subtract);
impl_binary_op!(Mul, mul, BinaryOp::Multiply);
impl_binary_op!(Div, div, BinaryOp::Divide);

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Negate, self)
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Negate, self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_fold_eagerly() {
        let e = Expr::from(64) * 2 * 0.0147 + 20.1204;
        assert!(e.is_constant());
        let v = e.extract_constant().unwrap().to_f64();
        assert!((v - (128.0 * 0.0147 + 20.1204)).abs() < 1e-9);
    }

    #[test]
    fn integer_division_is_exact() {
        let e = Expr::from(7) / 2;
        assert_eq!(e.extract_constant().unwrap(), Number::ratio(7, 2));
        assert_eq!((e * 2).extract_constant().unwrap(), Number::Int(7));
    }

    #[test]
    fn symbols_survive() {
        let n = Expr::symbol("n");
        let e = &n * 2 + 1;
        assert!(!e.is_constant());
        assert!(e.extract_constant().is_err());
        assert_eq!(e.free_symbols().len(), 1);
    }

    #[test]
    fn identities() {
        let n = Expr::symbol("n");
        assert_eq!(&n + 0, n);
        assert_eq!(&n * 1, n);
        assert_eq!(&n / 1, n);
        assert_eq!(&n * 0, Expr::zero());
        assert_eq!(Expr::zero() + &n, n);
        assert_eq!(n.clone().min(n.clone()), n);
        assert_eq!(-(-n.clone()), n);
    }

    #[test]
    fn comparisons_fold() {
        assert_eq!(Expr::from(3).less_than(4).as_bool(), Some(true));
        assert_eq!(Expr::from(4).less_than(4).as_bool(), Some(false));
        let n = Expr::symbol("n");
        assert_eq!(n.clone().equals(n.clone()).as_bool(), Some(true));
        assert_eq!(n.clone().less_than(4).as_bool(), None);
    }

    #[test]
    fn select_folds_decided_condition() {
        let n = Expr::symbol("n");
        let picked = Expr::select(Expr::from(1).less_than(2), n.clone(), Expr::from(5));
        assert_eq!(picked, n);
        let same = Expr::select(n.clone().less_than(3), Expr::from(5), Expr::from(5));
        assert_eq!(same, Expr::from(5));
    }

    #[test]
    fn ceil_div_and_tail() {
        assert_eq!(Expr::from(100).ceil_div(32), Expr::from(4));
        assert_eq!(Expr::from(96).ceil_div(32), Expr::from(3));
        assert_eq!(Expr::from(0).tail_exists(), Expr::from(0));
        assert_eq!(Expr::from(17).tail_exists(), Expr::from(1));
        assert!(!Expr::symbol("t").tail_exists().is_constant());
    }

    #[test]
    fn structural_equality_and_hash() {
        use std::collections::HashSet;
        let a = Expr::symbol("n") * 2 + Expr::symbol("m");
        let b = Expr::symbol("n") * 2 + Expr::symbol("m");
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        let set: HashSet<Expr> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn substitute_and_evaluate() {
        let e = Expr::from(1024) / (Expr::from(7.31) / Expr::symbol("block_dim") + 7.9052) + 27.01;
        let v = e.evaluate(&bindings([("block_dim", 8)])).unwrap().to_f64();
        assert!((v - (1024.0 / (7.31 / 8.0 + 7.9052) + 27.01)).abs() < 1e-9);
        assert_eq!(
            e.evaluate(&Bindings::new()),
            Err(ExprError::UnboundSymbol(Symbol::new("block_dim")))
        );
    }

    #[test]
    fn substitute_shares_untouched_subtrees() {
        let shared = Expr::symbol("a") * Expr::symbol("b");
        let e = &shared + Expr::symbol("c");
        let out = e.substitute(&bindings([("c", 1)]));
        match out.kind() {
            ExprKind::Binary { lhs, .. } => assert!(lhs.ptr_eq(&shared)),
            other => panic!("expected Binary, got {other:?}"),
        }
    }
}
