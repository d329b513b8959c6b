//! The resolution pass: inlining case placeholders.
//!
//! Resolution walks the dependency graph between pending definitions
//! depth-first. Each placeholder is resolved once and memoised; a
//! placeholder met again while its own definition is still being resolved
//! is a cycle, which is an engine bug.
//!
//! Placeholders that have no definition in the map being resolved are left
//! in place, so a partial map can be resolved and merged later.

use std::collections::{BTreeMap, BTreeSet};

use crate::case::{PendingCases, TernaryOp};
use crate::error::ExprError;
use crate::expr::{Bindings, Expr};
use crate::symbol::Symbol;

/// Placeholder to fully inlined `Select` tree.
pub type Resolved = BTreeMap<Symbol, Expr>;

struct Resolver<'a> {
    pending: &'a PendingCases,
    done: BTreeMap<Symbol, TernaryOp>,
    in_progress: BTreeSet<Symbol>,
}

impl<'a> Resolver<'a> {
    fn new(pending: &'a PendingCases) -> Self {
        Self {
            pending,
            done: BTreeMap::new(),
            in_progress: BTreeSet::new(),
        }
    }

    /// Returns the definition of `symbol` with every dependency inlined.
    fn definition(&mut self, symbol: &Symbol) -> Result<Option<TernaryOp>, ExprError> {
        if let Some(resolved) = self.done.get(symbol) {
            return Ok(Some(resolved.clone()));
        }
        let Some(definition) = self.pending.get(symbol) else {
            return Ok(None);
        };
        if !self.in_progress.insert(symbol.clone()) {
            return Err(ExprError::CaseCycle(symbol.clone()));
        }

        let mut inlined = Bindings::new();
        for dependency in definition.dependencies() {
            if let Some(dep) = self.definition(&dependency)? {
                inlined.insert(dependency, dep.to_expr());
            }
        }
        let resolved = definition.substitute(&inlined);

        self.in_progress.remove(symbol);
        self.done.insert(symbol.clone(), resolved.clone());
        Ok(Some(resolved))
    }

    fn bindings_for(&mut self, expr: &Expr) -> Result<Bindings, ExprError> {
        let mut out = Bindings::new();
        for symbol in expr.placeholders() {
            if let Some(definition) = self.definition(&symbol)? {
                out.insert(symbol, definition.to_expr());
            }
        }
        Ok(out)
    }
}

/// Resolves every placeholder in `pending` to a dependency-free expression.
pub fn try_resolve(pending: &PendingCases) -> Result<Resolved, ExprError> {
    let mut resolver = Resolver::new(pending);
    let mut out = Resolved::new();
    for (symbol, _) in pending {
        if let Some(definition) = resolver.definition(symbol)? {
            out.insert(symbol.clone(), definition.to_expr());
        }
    }
    log::debug!("resolved {} case placeholders", out.len());
    Ok(out)
}

/// Like [`try_resolve`].
///
/// # Panics
///
/// Panics if the case definitions reference each other in a cycle.
pub fn resolve(pending: &PendingCases) -> Resolved {
    try_resolve(pending).unwrap_or_else(|err| panic!("{err}"))
}

/// Inlines dependencies between definitions but keeps them as
/// [`TernaryOp`]s. Resolving the result again returns it unchanged.
pub fn try_resolve_pending(pending: &PendingCases) -> Result<PendingCases, ExprError> {
    let mut resolver = Resolver::new(pending);
    let mut out = Vec::with_capacity(pending.len());
    for (symbol, _) in pending {
        if let Some(definition) = resolver.definition(symbol)? {
            out.push((symbol.clone(), definition));
        }
    }
    Ok(out.into_iter().collect())
}

/// Like [`try_resolve_pending`].
///
/// # Panics
///
/// Panics on a cycle.
pub fn resolve_pending(pending: &PendingCases) -> PendingCases {
    try_resolve_pending(pending).unwrap_or_else(|err| panic!("{err}"))
}

/// Replaces every placeholder in `expr` that `pending` defines by its fully
/// inlined definition. Only the definitions `expr` actually reaches are
/// resolved.
pub fn try_expand(expr: &Expr, pending: &PendingCases) -> Result<Expr, ExprError> {
    let bindings = Resolver::new(pending).bindings_for(expr)?;
    Ok(expr.substitute(&bindings))
}

/// Like [`try_expand`].
///
/// # Panics
///
/// Panics on a cycle.
pub fn expand(expr: &Expr, pending: &PendingCases) -> Expr {
    try_expand(expr, pending).unwrap_or_else(|err| panic!("{err}"))
}
