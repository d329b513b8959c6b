//! Deferred conditionals ("case nodes").
//!
//! A formula that has to choose between alternative cost expressions calls
//! [`build_case`]. If the deciding comparison folds at construction time the
//! chosen branch is returned directly and nothing is recorded. Otherwise a
//! fresh placeholder symbol is returned and its three-way definition is
//! stored in a flat [`PendingCases`] map, where sibling formulas can share
//! it and a later [resolution pass](crate::resolve) inlines it.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use crate::error::ExprError;
use crate::expr::{Bindings, CompareKind, Expr};
use crate::symbol::Symbol;

/// The comparison deciding a case node.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Predicate {
    pub kind: CompareKind,
    pub lhs: Expr,
    pub rhs: Expr,
}

impl Predicate {
    pub fn new(kind: CompareKind, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self {
            kind,
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    pub fn less(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::new(CompareKind::Less, lhs, rhs)
    }

    pub fn equal(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::new(CompareKind::Equal, lhs, rhs)
    }

    pub fn greater_equal(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::new(CompareKind::GreaterEqual, lhs, rhs)
    }

    /// The predicate as a (possibly folded) comparison expression.
    pub fn to_expr(&self) -> Expr {
        Expr::compare(self.kind, self.lhs.clone(), self.rhs.clone())
    }

    /// Decides the predicate if it folds now.
    pub fn decide(&self) -> Option<bool> {
        self.to_expr().as_bool()
    }

    pub fn substitute(&self, bindings: &Bindings) -> Self {
        Self {
            kind: self.kind,
            lhs: self.lhs.substitute(bindings),
            rhs: self.rhs.substitute(bindings),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}

/// One branch of a case node: a plain cost or another binary split.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum CaseTree {
    Leaf(Expr),
    Node(Box<TernaryOp>),
}

impl CaseTree {
    pub fn node(predicate: Predicate, accept: impl Into<CaseTree>, reject: impl Into<CaseTree>) -> Self {
        Self::Node(Box::new(TernaryOp::new(predicate, accept, reject)))
    }

    /// Drops every nested split whose predicate already folds.
    fn prune(self) -> Self {
        match self {
            Self::Leaf(_) => self,
            Self::Node(op) => {
                let TernaryOp {
                    predicate,
                    accept,
                    reject,
                } = *op;
                match predicate.decide() {
                    Some(true) => accept.prune(),
                    Some(false) => reject.prune(),
                    None => Self::Node(Box::new(TernaryOp {
                        predicate,
                        accept: accept.prune(),
                        reject: reject.prune(),
                    })),
                }
            }
        }
    }

    /// The branch as a `Select` tree. Placeholders are left untouched.
    pub fn to_expr(&self) -> Expr {
        match self {
            Self::Leaf(e) => e.clone(),
            Self::Node(op) => op.to_expr(),
        }
    }

    pub fn substitute(&self, bindings: &Bindings) -> Self {
        match self {
            Self::Leaf(e) => Self::Leaf(e.substitute(bindings)),
            Self::Node(op) => Self::Node(Box::new(op.substitute(bindings))),
        }
    }

    pub fn as_leaf(&self) -> Option<&Expr> {
        match self {
            Self::Leaf(e) => Some(e),
            Self::Node(_) => None,
        }
    }

    fn for_each_expr(&self, f: &mut impl FnMut(&Expr)) {
        match self {
            Self::Leaf(e) => f(e),
            Self::Node(op) => op.for_each_expr(f),
        }
    }
}

impl From<Expr> for CaseTree {
    fn from(value: Expr) -> Self {
        Self::Leaf(value)
    }
}

impl From<TernaryOp> for CaseTree {
    fn from(value: TernaryOp) -> Self {
        Self::Node(Box::new(value))
    }
}

impl fmt::Display for CaseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(e) => write!(f, "{e}"),
            Self::Node(op) => write!(f, "{op}"),
        }
    }
}

/// A case definition: `predicate ? accept : reject`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TernaryOp {
    pub predicate: Predicate,
    pub accept: CaseTree,
    pub reject: CaseTree,
}

impl TernaryOp {
    pub fn new(predicate: Predicate, accept: impl Into<CaseTree>, reject: impl Into<CaseTree>) -> Self {
        Self {
            predicate,
            accept: accept.into(),
            reject: reject.into(),
        }
    }

    /// The definition as a nested `Select` expression.
    pub fn to_expr(&self) -> Expr {
        Expr::select(
            self.predicate.to_expr(),
            self.accept.to_expr(),
            self.reject.to_expr(),
        )
    }

    pub fn substitute(&self, bindings: &Bindings) -> Self {
        Self {
            predicate: self.predicate.substitute(bindings),
            accept: self.accept.substitute(bindings),
            reject: self.reject.substitute(bindings),
        }
    }

    /// Calls `f` on the predicate operands and every leaf.
    pub fn for_each_expr(&self, f: &mut impl FnMut(&Expr)) {
        f(&self.predicate.lhs);
        f(&self.predicate.rhs);
        self.accept.for_each_expr(f);
        self.reject.for_each_expr(f);
    }

    /// Placeholders referenced anywhere in this definition.
    pub fn dependencies(&self) -> Vec<Symbol> {
        let mut out = Vec::new();
        self.for_each_expr(&mut |e| {
            for s in e.placeholders() {
                if !out.contains(&s) {
                    out.push(s);
                }
            }
        });
        out
    }
}

impl fmt::Display for TernaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} ? {} : {})", self.predicate, self.accept, self.reject)
    }
}

/// Flat map from placeholder to its case definition.
///
/// Definitions reference each other only through placeholder symbols, so
/// combining the results of several sub-formulas is a map union.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingCases {
    cases: BTreeMap<Symbol, TernaryOp>,
}

impl PendingCases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&TernaryOp> {
        self.cases.get(symbol)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.cases.contains_key(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &TernaryOp)> {
        self.cases.iter()
    }

    /// Records a definition under a new placeholder.
    ///
    /// # Panics
    ///
    /// Panics if `symbol` is already defined.
    pub fn insert(&mut self, symbol: Symbol, definition: TernaryOp) {
        if let Err(err) = self.try_insert(symbol, definition) {
            panic!("{err}");
        }
    }

    pub fn try_insert(&mut self, symbol: Symbol, definition: TernaryOp) -> Result<(), ExprError> {
        match self.cases.entry(symbol) {
            btree_map::Entry::Occupied(entry) => {
                Err(ExprError::PlaceholderCollision(entry.key().clone()))
            }
            btree_map::Entry::Vacant(entry) => {
                entry.insert(definition);
                Ok(())
            }
        }
    }

    /// Unions `other` into `self`.
    ///
    /// # Panics
    ///
    /// Panics if both maps define the same placeholder. Placeholders are
    /// unique per process, so a collision means a definition was duplicated
    /// rather than shared.
    pub fn merge(&mut self, other: PendingCases) {
        if let Err(err) = self.try_merge(other) {
            panic!("{err}");
        }
    }

    /// Like [`merge`](Self::merge) but reports a collision as an error.
    /// `self` is left unchanged on error.
    pub fn try_merge(&mut self, other: PendingCases) -> Result<(), ExprError> {
        if let Some(symbol) = other.cases.keys().find(|s| self.cases.contains_key(*s)) {
            return Err(ExprError::PlaceholderCollision(symbol.clone()));
        }
        self.cases.extend(other.cases);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a PendingCases {
    type Item = (&'a Symbol, &'a TernaryOp);
    type IntoIter = btree_map::Iter<'a, Symbol, TernaryOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.cases.iter()
    }
}

impl FromIterator<(Symbol, TernaryOp)> for PendingCases {
    fn from_iter<I: IntoIterator<Item = (Symbol, TernaryOp)>>(iter: I) -> Self {
        Self {
            cases: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for PendingCases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (symbol, definition) in &self.cases {
            writeln!(f, "{symbol} := {definition}")?;
        }
        Ok(())
    }
}

/// Builds a case node.
///
/// When both sides of `predicate` are constants the chosen branch is
/// returned as a plain expression (nested branches are decided the same way)
/// and `pending` is not touched. Otherwise a fresh placeholder is returned
/// and the definition is recorded in `pending`; nested symbolic splits stay
/// nested inside that one definition.
pub fn build_case(
    predicate: Predicate,
    accept: impl Into<CaseTree>,
    reject: impl Into<CaseTree>,
    pending: &mut PendingCases,
) -> Expr {
    let (accept, reject) = (accept.into(), reject.into());
    if let Some(taken) = predicate.decide() {
        log::trace!("case `{predicate}` folded to {taken}");
        let branch = if taken { accept } else { reject };
        return collapse(branch, pending);
    }

    let placeholder = Symbol::fresh_placeholder();
    let definition = TernaryOp {
        predicate,
        accept: accept.prune(),
        reject: reject.prune(),
    };
    log::debug!("deferred case {placeholder} := {definition}");
    pending.insert(placeholder.clone(), definition);
    Expr::from_symbol(placeholder)
}

fn collapse(branch: CaseTree, pending: &mut PendingCases) -> Expr {
    match branch {
        CaseTree::Leaf(e) => e,
        CaseTree::Node(op) => {
            let TernaryOp {
                predicate,
                accept,
                reject,
            } = *op;
            build_case(predicate, accept, reject, pending)
        }
    }
}
