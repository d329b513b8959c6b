//! Formula dispatch by operator name.
//!
//! Two independent registries exist: graph-level operators (`Exp`, `Load`,
//! `Broadcast`, ...) and micro instructions (`Vexp`, `CopyGmToUbuf`, ...).
//! An entry may be tagged with a hardware [`Generation`]; a tagged lookup
//! falls back to the untagged entry when no override exists.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::error::PerfError;
use crate::formulas;
use crate::output::PerfOutputInfo;
use crate::query::{FormulaCtx, PerfQuery};
use crate::soc::Generation;

/// A cost formula: fills `out` with the per-pipe cost of `query`.
pub type FormulaFn = fn(&FormulaCtx<'_>, &PerfQuery, &mut PerfOutputInfo) -> Result<(), PerfError>;

/// Name of the catch-all formula.
pub const DEFAULT_KEY: &str = "Default";

/// Registry key.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct OpKey {
    pub name: String,
    pub generation: Option<Generation>,
}

impl OpKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generation: None,
        }
    }

    pub fn tagged(name: impl Into<String>, generation: Generation) -> Self {
        Self {
            name: name.into(),
            generation: Some(generation),
        }
    }
}

impl fmt::Display for OpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generation {
            Some(generation) => write!(f, "{}@{generation}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Map from operator key to formula. Populated once, then only read.
#[derive(Clone, Default)]
pub struct FormulaRegistry {
    formulas: BTreeMap<OpKey, FormulaFn>,
}

impl fmt::Debug for FormulaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.formulas.keys()).finish()
    }
}

impl FormulaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the default formula for `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered.
    pub fn register(&mut self, name: &str, formula: FormulaFn) {
        self.insert(OpKey::new(name), formula);
    }

    /// Registers a generation-specific override for `name`.
    ///
    /// # Panics
    ///
    /// Panics if the same override is already registered.
    pub fn register_tagged(&mut self, name: &str, generation: Generation, formula: FormulaFn) {
        self.insert(OpKey::tagged(name, generation), formula);
    }

    fn insert(&mut self, key: OpKey, formula: FormulaFn) {
        if self.formulas.contains_key(&key) {
            panic!("cost formula `{key}` registered twice");
        }
        self.formulas.insert(key, formula);
    }

    /// The untagged formula for `name`, or `None` if nothing is registered.
    pub fn get_perf_func(&self, name: &str) -> Option<FormulaFn> {
        self.get_perf_func_tagged(name, None)
    }

    /// The override for `generation` if one exists, else the untagged
    /// formula.
    pub fn get_perf_func_tagged(&self, name: &str, generation: Option<Generation>) -> Option<FormulaFn> {
        if let Some(generation) = generation {
            if let Some(formula) = self.formulas.get(&OpKey::tagged(name, generation)) {
                return Some(*formula);
            }
            log::debug!("no {generation} override for `{name}`, using the default formula");
        }
        let found = self.formulas.get(&OpKey::new(name)).copied();
        if found.is_none() {
            log::debug!("no cost formula for `{name}`");
        }
        found
    }

    /// Like [`get_perf_func_tagged`](Self::get_perf_func_tagged), falling
    /// back to the `Default` formula for unknown operators.
    pub fn get_or_default(&self, name: &str, generation: Option<Generation>) -> Option<FormulaFn> {
        self.get_perf_func_tagged(name, generation)
            .or_else(|| self.get_perf_func(DEFAULT_KEY))
    }

    pub fn contains(&self, key: &OpKey) -> bool {
        self.formulas.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &OpKey> {
        self.formulas.keys()
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }
}

/// Registry of graph-level operator formulas.
pub fn graph_builtins() -> FormulaRegistry {
    let mut reg = FormulaRegistry::new();
    formulas::register_graph(&mut reg);
    reg
}

/// Registry of micro-instruction formulas.
pub fn micro_builtins() -> FormulaRegistry {
    let mut reg = FormulaRegistry::new();
    formulas::register_micro(&mut reg);
    reg
}

/// Populates both registries with the built-in formulas.
pub fn register_all(graph: &mut FormulaRegistry, micro: &mut FormulaRegistry) {
    formulas::register_graph(graph);
    formulas::register_micro(micro);
}

static GRAPH: LazyLock<FormulaRegistry> = LazyLock::new(graph_builtins);
static MICRO: LazyLock<FormulaRegistry> = LazyLock::new(micro_builtins);

/// Process-wide graph-level registry, built on first use.
pub fn builtin_graph_registry() -> &'static FormulaRegistry {
    &GRAPH
}

/// Process-wide micro-instruction registry, built on first use.
pub fn builtin_micro_registry() -> &'static FormulaRegistry {
    &MICRO
}

/// Looks up and runs the formula for `query.op_type`.
///
/// Fails with [`PerfError::UnknownOp`] when nothing is registered and with
/// [`PerfError::NoPipeCost`] when the formula set no pipe.
pub fn estimate(
    registry: &FormulaRegistry,
    ctx: &FormulaCtx<'_>,
    query: &PerfQuery,
    generation: Option<Generation>,
) -> Result<PerfOutputInfo, PerfError> {
    let formula = registry
        .get_perf_func_tagged(&query.op_type, generation)
        .ok_or_else(|| PerfError::UnknownOp(query.op_type.clone()))?;
    log::debug!("costing {} ({} in, {} out)", query.op_type, query.inputs.len(), query.outputs.len());

    let mut out = PerfOutputInfo::new();
    formula(ctx, query, &mut out)?;
    if out.is_empty() {
        return Err(PerfError::NoPipeCost {
            op: query.op_type.clone(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamTable;
    use crate::pipe::PipeType;
    use crate::soc::SocProfile;

    fn one_cycle(_: &FormulaCtx<'_>, _: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
        out.set_pipe(PipeType::Scalar, 1);
        Ok(())
    }

    fn two_cycles(_: &FormulaCtx<'_>, _: &PerfQuery, out: &mut PerfOutputInfo) -> Result<(), PerfError> {
        out.set_pipe(PipeType::Scalar, 2);
        Ok(())
    }

    fn nothing(_: &FormulaCtx<'_>, _: &PerfQuery, _: &mut PerfOutputInfo) -> Result<(), PerfError> {
        Ok(())
    }

    fn run(reg: &FormulaRegistry, name: &str, generation: Option<Generation>) -> Result<PerfOutputInfo, PerfError> {
        let soc = SocProfile::default();
        let ctx = FormulaCtx::new(ParamTable::builtin(), &soc);
        estimate(reg, &ctx, &PerfQuery::new(name), generation)
    }

    #[test]
    fn unknown_key_is_none() {
        let reg = FormulaRegistry::new();
        assert!(reg.get_perf_func("InvalidOp").is_none());
        assert!(matches!(run(&reg, "InvalidOp", None), Err(PerfError::UnknownOp(_))));
    }

    #[test]
    fn tagged_override_and_fallback() {
        let mut reg = FormulaRegistry::new();
        reg.register("Op", one_cycle);
        reg.register_tagged("Op", Generation::V2, two_cycles);

        let v2 = run(&reg, "Op", Some(Generation::V2)).unwrap();
        assert_eq!(v2.pipe(PipeType::Scalar), Some(&2.into()));
        let v3 = run(&reg, "Op", Some(Generation::V3)).unwrap();
        assert_eq!(v3.pipe(PipeType::Scalar), Some(&1.into()));
        let plain = run(&reg, "Op", None).unwrap();
        assert_eq!(plain.pipe(PipeType::Scalar), Some(&1.into()));
    }

    #[test]
    fn tagged_only_entry_is_not_a_default() {
        let mut reg = FormulaRegistry::new();
        reg.register_tagged("Op", Generation::V2, two_cycles);
        assert!(reg.get_perf_func("Op").is_none());
        assert!(reg.get_perf_func_tagged("Op", Some(Generation::V2)).is_some());
    }

    #[test]
    fn default_fallback() {
        let mut reg = FormulaRegistry::new();
        reg.register(DEFAULT_KEY, one_cycle);
        assert!(reg.get_perf_func("Mystery").is_none());
        assert!(reg.get_or_default("Mystery", None).is_some());
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_registration_panics() {
        let mut reg = FormulaRegistry::new();
        reg.register("Op", one_cycle);
        reg.register("Op", two_cycles);
    }

    #[test]
    fn formula_without_pipe_is_an_error() {
        let mut reg = FormulaRegistry::new();
        reg.register("Empty", nothing);
        assert!(matches!(run(&reg, "Empty", None), Err(PerfError::NoPipeCost { .. })));
    }

    #[test]
    fn builtin_registries_are_separate() {
        let graph = builtin_graph_registry();
        let micro = builtin_micro_registry();
        assert!(graph.get_perf_func("Load").is_some());
        assert!(graph.get_perf_func("Vexp").is_none());
        assert!(micro.get_perf_func("Vexp").is_some());
        assert!(micro.get_perf_func("Load").is_none());
        assert!(graph.contains(&OpKey::tagged("Exp", Generation::V2)));
    }

    #[test]
    fn register_all_fills_both() {
        let mut graph = FormulaRegistry::new();
        let mut micro = FormulaRegistry::new();
        register_all(&mut graph, &mut micro);
        assert_eq!(graph.len(), builtin_graph_registry().len());
        assert_eq!(micro.len(), builtin_micro_registry().len());
    }

    #[test]
    fn key_display() {
        assert_eq!(OpKey::new("Exp").to_string(), "Exp");
        assert_eq!(OpKey::tagged("Exp", Generation::V2).to_string(), "Exp@v2");
    }
}
