//! Per-instruction cost accumulator.

use std::collections::BTreeMap;
use std::fmt;

use npu_perf_expr::{Bindings, Expr, ExprError, Number, PendingCases, resolve};

use crate::pipe::PipeType;

/// The cost of one instruction: a symbolic cycle count per pipe, plus the
/// definitions of every case placeholder those costs reference.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PerfOutputInfo {
    pub pipe_costs: BTreeMap<PipeType, Expr>,
    pub pending: PendingCases,
}

impl PerfOutputInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cost of `pipe`, replacing any earlier value.
    pub fn set_pipe(&mut self, pipe: PipeType, cost: impl Into<Expr>) {
        if let Some(old) = self.pipe_costs.insert(pipe, cost.into()) {
            log::trace!("{pipe} cost {old} overwritten");
        }
    }

    /// Adds `cost` to whatever `pipe` already holds.
    pub fn add_to_pipe(&mut self, pipe: PipeType, cost: impl Into<Expr>) {
        let cost = cost.into();
        let total = match self.pipe_costs.remove(&pipe) {
            Some(existing) => existing + cost,
            None => cost,
        };
        self.pipe_costs.insert(pipe, total);
    }

    pub fn pipe(&self, pipe: PipeType) -> Option<&Expr> {
        self.pipe_costs.get(&pipe)
    }

    pub fn is_empty(&self) -> bool {
        self.pipe_costs.is_empty()
    }

    /// Takes over the pending cases of a sub-formula's result and returns
    /// its pipe costs for the caller to combine.
    ///
    /// # Panics
    ///
    /// Panics if both accumulators define the same placeholder.
    pub fn absorb(&mut self, sub: PerfOutputInfo) -> BTreeMap<PipeType, Expr> {
        self.pending.merge(sub.pending);
        sub.pipe_costs
    }

    /// Absorbs `sub` and adds each of its pipe costs to this accumulator.
    pub fn accumulate(&mut self, sub: PerfOutputInfo) {
        for (pipe, cost) in self.absorb(sub) {
            self.add_to_pipe(pipe, cost);
        }
    }

    /// `true` if every pipe cost is a plain number.
    pub fn is_constant(&self) -> bool {
        self.pipe_costs.values().all(Expr::is_constant)
    }

    /// Pipe costs with every pending placeholder inlined.
    ///
    /// A placeholder left over after inlining has no definition in
    /// `pending` and is reported as [`ExprError::UndefinedPlaceholder`].
    pub fn try_expanded(&self) -> Result<BTreeMap<PipeType, Expr>, ExprError> {
        let resolved = npu_perf_expr::try_resolve(&self.pending)?;
        let expanded: BTreeMap<_, _> = self
            .pipe_costs
            .iter()
            .map(|(pipe, cost)| (*pipe, cost.substitute(&resolved)))
            .collect();
        if let Some(symbol) = expanded.values().find_map(|cost| cost.placeholders().into_iter().next()) {
            return Err(ExprError::UndefinedPlaceholder(symbol));
        }
        Ok(expanded)
    }

    /// Like [`try_expanded`](Self::try_expanded).
    ///
    /// # Panics
    ///
    /// Panics if the pending cases form a cycle. Debug builds also panic on
    /// a placeholder with no definition.
    pub fn expanded(&self) -> BTreeMap<PipeType, Expr> {
        let resolved = resolve(&self.pending);
        let expanded: BTreeMap<_, _> = self
            .pipe_costs
            .iter()
            .map(|(pipe, cost)| (*pipe, cost.substitute(&resolved)))
            .collect();
        debug_assert!(
            expanded.values().all(|cost| cost.placeholders().is_empty()),
            "pipe cost references an undefined case placeholder"
        );
        expanded
    }

    /// A copy with every placeholder inlined and no pending cases left.
    pub fn resolved(&self) -> Result<PerfOutputInfo, ExprError> {
        Ok(Self {
            pipe_costs: self.try_expanded()?,
            pending: PendingCases::new(),
        })
    }

    /// Evaluates every pipe for concrete symbol values.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<BTreeMap<PipeType, Number>, ExprError> {
        self.try_expanded()?
            .into_iter()
            .map(|(pipe, cost)| Ok((pipe, cost.evaluate(bindings)?)))
            .collect()
    }

    /// Cycles of the busiest pipe, assuming pipes run in parallel.
    pub fn total_cycles(&self, bindings: &Bindings) -> Result<f64, ExprError> {
        Ok(self
            .evaluate(bindings)?
            .values()
            .map(|n| n.to_f64())
            .fold(0.0, f64::max))
    }
}

impl fmt::Display for PerfOutputInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pipe, cost) in &self.pipe_costs {
            writeln!(f, "{pipe}: {cost}")?;
        }
        write!(f, "{}", self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npu_perf_expr::{Predicate, bindings, build_case};

    #[test]
    fn last_write_wins() {
        let mut out = PerfOutputInfo::new();
        out.set_pipe(PipeType::Vector, 3);
        out.set_pipe(PipeType::Vector, 5);
        assert_eq!(out.pipe(PipeType::Vector), Some(&Expr::from(5)));
    }

    #[test]
    fn add_to_pipe_combines() {
        let mut out = PerfOutputInfo::new();
        out.add_to_pipe(PipeType::Mte2, 3);
        out.add_to_pipe(PipeType::Mte2, Expr::symbol("n"));
        assert_eq!(out.pipe(PipeType::Mte2).unwrap().to_string(), "3 + n");
    }

    #[test]
    fn accumulate_merges_pending() {
        let n = Expr::symbol("n");
        let mut sub = PerfOutputInfo::new();
        let cost = build_case(Predicate::less(n.clone(), 8), Expr::from(1), Expr::from(2), &mut sub.pending);
        sub.set_pipe(PipeType::Vector, cost);

        let mut out = PerfOutputInfo::new();
        out.set_pipe(PipeType::Vector, 10);
        out.accumulate(sub);
        assert_eq!(out.pending.len(), 1);
        assert!(!out.is_constant());

        let cycles = out.evaluate(&bindings([("n", 4)])).unwrap();
        assert_eq!(cycles[&PipeType::Vector], Number::Int(11));
    }

    #[test]
    fn resolved_drops_pending() {
        let n = Expr::symbol("n");
        let mut out = PerfOutputInfo::new();
        let cost = build_case(Predicate::less(n, 8), Expr::from(1), Expr::from(2), &mut out.pending);
        out.set_pipe(PipeType::Scalar, cost);
        let resolved = out.resolved().unwrap();
        assert!(resolved.pending.is_empty());
        assert_eq!(
            resolved.pipe(PipeType::Scalar).unwrap().to_string(),
            "(n < 8 ? 1 : 2)"
        );
    }

    #[test]
    fn undefined_placeholder_is_reported() {
        let mut elsewhere = PendingCases::new();
        let orphan = build_case(
            Predicate::less(Expr::symbol("n"), 8),
            Expr::from(1),
            Expr::from(2),
            &mut elsewhere,
        );
        let mut out = PerfOutputInfo::new();
        out.set_pipe(PipeType::Scalar, orphan.clone());

        let expected = ExprError::UndefinedPlaceholder(orphan.as_symbol().unwrap().clone());
        assert_eq!(out.try_expanded(), Err(expected.clone()));
        assert_eq!(out.resolved(), Err(expected));
        assert!(out.evaluate(&Bindings::new()).is_err());
    }

    #[test]
    fn total_cycles_is_busiest_pipe() {
        let mut out = PerfOutputInfo::new();
        out.set_pipe(PipeType::Vector, 10.5);
        out.set_pipe(PipeType::Mte2, Expr::symbol("n") * 2);
        let total = out.total_cycles(&bindings([("n", 20)])).unwrap();
        assert!((total - 40.0).abs() < 1e-9);
        assert!(out.total_cycles(&Bindings::new()).is_err());
    }

    #[test]
    fn display_lists_pipes_in_order() {
        let mut out = PerfOutputInfo::new();
        out.set_pipe(PipeType::Mte2, 7);
        out.set_pipe(PipeType::Vector, 3);
        assert_eq!(out.to_string(), "PIPE_V: 3\nPIPE_MTE2: 7\n");
    }
}
