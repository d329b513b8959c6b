//! Regression coefficients and the linear-model evaluators.
//!
//! The table is keyed by instruction name and a `"{src}to{dst}"` dtype
//! pair. Each entry names the model kind it was fitted for:
//!
//! ```json
//! { "Abs": { "float16tofloat16": { "model": "SimpleLinear", "k": 0.0077, "b": 20.0153 } } }
//! ```
//!
//! A built-in table is compiled into the crate. A missing entry is always
//! an error; nothing defaults to zero cost.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use npu_perf_expr::Expr;
use serde::{Deserialize, Serialize};

use crate::error::PerfError;

/// `cost = k * data_size + b`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearCoeffs {
    pub k: f64,
    pub b: f64,
}

/// Contiguous GM transfer.
///
/// `cost = bytes / (b / block_dim + a) + h`, with `hl` replacing `h` for
/// large transfers. `data_type_size` is the element width the fit was made
/// for and converts element counts to bytes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadStoreCoeffs {
    pub h: f64,
    pub a: f64,
    pub b: f64,
    pub hl: f64,
    pub data_type_size: u32,
}

/// Strided GM transfer of `repeat` blocks:
/// `cost = repeat * (block_bytes / (b / block_dim + a) + gap) + h`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrideCoeffs {
    pub h: f64,
    pub a: f64,
    pub b: f64,
    pub gap: f64,
}

/// Aligned block store, with separate slopes for small and large blocks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreBlockCoeffs {
    pub h: f64,
    pub k_small: f64,
    pub b_small: f64,
    pub k_large: f64,
    pub b_large: f64,
}

/// One table entry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum ModelParams {
    SimpleLinear(LinearCoeffs),
    LoadStoreFunc(LoadStoreCoeffs),
    LoadStoreStrideFunc(StrideCoeffs),
    StoreFunc(StoreBlockCoeffs),
}

impl ModelParams {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SimpleLinear(_) => "SimpleLinear",
            Self::LoadStoreFunc(_) => "LoadStoreFunc",
            Self::LoadStoreStrideFunc(_) => "LoadStoreStrideFunc",
            Self::StoreFunc(_) => "StoreFunc",
        }
    }
}

/// `data_size * k + b`. Folds to a number when `data_size` is constant.
pub fn evaluate_linear(coeffs: &LinearCoeffs, data_size: impl Into<Expr>) -> Expr {
    data_size.into() * coeffs.k + coeffs.b
}

impl LoadStoreCoeffs {
    fn transfer(&self, elements: &Expr, block_dim: &Expr) -> Expr {
        let bytes = elements * self.data_type_size;
        bytes / (Expr::from(self.b) / block_dim + self.a)
    }

    /// Cost of a transfer below the large-transfer threshold.
    pub fn small(&self, elements: &Expr, block_dim: &Expr) -> Expr {
        self.transfer(elements, block_dim) + self.h
    }

    pub fn large(&self, elements: &Expr, block_dim: &Expr) -> Expr {
        self.transfer(elements, block_dim) + self.hl
    }
}

impl StrideCoeffs {
    pub fn evaluate(&self, repeat: &Expr, block_bytes: &Expr, block_dim: &Expr) -> Expr {
        let per_block = block_bytes / (Expr::from(self.b) / block_dim + self.a) + self.gap;
        repeat * per_block + self.h
    }
}

impl StoreBlockCoeffs {
    pub fn small(&self, repeat: &Expr, block_bytes: &Expr) -> Expr {
        repeat * (block_bytes * self.k_small + self.b_small) + self.h
    }

    pub fn large(&self, repeat: &Expr, block_bytes: &Expr) -> Expr {
        repeat * (block_bytes * self.k_large + self.b_large) + self.h
    }
}

const BUILTIN_JSON: &str = include_str!("../data/params.json");

static BUILTIN: LazyLock<ParamTable> = LazyLock::new(|| {
    ParamTable::from_json(BUILTIN_JSON)
        .unwrap_or_else(|err| panic!("built-in parameter table is malformed: {err}"))
});

/// Process-wide read-only coefficient table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamTable {
    entries: BTreeMap<String, BTreeMap<String, ModelParams>>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table shipped with this crate.
    pub fn builtin() -> &'static ParamTable {
        &BUILTIN
    }

    pub fn from_json(text: &str) -> Result<Self, PerfError> {
        let table: Self = serde_json::from_str(text)?;
        log::debug!("loaded parameter table with {} instructions", table.entries.len());
        Ok(table)
    }

    pub fn insert(&mut self, instr: &str, dtype_pair: &str, params: ModelParams) {
        self.entries
            .entry(instr.to_string())
            .or_default()
            .insert(dtype_pair.to_string(), params);
    }

    /// Overlays every entry of `other` onto this table.
    pub fn extend(&mut self, other: ParamTable) {
        for (instr, pairs) in other.entries {
            self.entries.entry(instr).or_default().extend(pairs);
        }
    }

    pub fn lookup(&self, instr: &str, dtype_pair: &str) -> Option<&ModelParams> {
        self.entries.get(instr)?.get(dtype_pair)
    }

    /// Like [`lookup`](Self::lookup) but reports a missing entry.
    pub fn get(&self, instr: &str, dtype_pair: &str) -> Result<&ModelParams, PerfError> {
        self.lookup(instr, dtype_pair).ok_or_else(|| {
            log::debug!("no parameters for {instr}/{dtype_pair}");
            PerfError::MissingParams {
                instr: instr.to_string(),
                dtype_pair: dtype_pair.to_string(),
            }
        })
    }

    pub fn instructions(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn linear(&self, instr: &str, dtype_pair: &str) -> Result<&LinearCoeffs, PerfError> {
        match self.get(instr, dtype_pair)? {
            ModelParams::SimpleLinear(c) => Ok(c),
            _ => Err(mismatch(instr, "SimpleLinear")),
        }
    }

    pub fn load_store(&self, instr: &str, dtype_pair: &str) -> Result<&LoadStoreCoeffs, PerfError> {
        match self.get(instr, dtype_pair)? {
            ModelParams::LoadStoreFunc(c) => Ok(c),
            _ => Err(mismatch(instr, "LoadStoreFunc")),
        }
    }

    pub fn stride(&self, instr: &str, dtype_pair: &str) -> Result<&StrideCoeffs, PerfError> {
        match self.get(instr, dtype_pair)? {
            ModelParams::LoadStoreStrideFunc(c) => Ok(c),
            _ => Err(mismatch(instr, "LoadStoreStrideFunc")),
        }
    }

    pub fn store_block(&self, instr: &str, dtype_pair: &str) -> Result<&StoreBlockCoeffs, PerfError> {
        match self.get(instr, dtype_pair)? {
            ModelParams::StoreFunc(c) => Ok(c),
            _ => Err(mismatch(instr, "StoreFunc")),
        }
    }
}

fn mismatch(instr: &str, expected: &'static str) -> PerfError {
    PerfError::ModelMismatch {
        instr: instr.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_parses() {
        let table = ParamTable::builtin();
        assert!(table.instructions().count() > 20);
        let abs = table.linear("Abs", "float16tofloat16").unwrap();
        assert_eq!(abs.k, 0.0077);
        assert_eq!(abs.b, 20.0153);
    }

    #[test]
    fn linear_on_constant_folds() {
        let c = LinearCoeffs { k: 0.0077, b: 20.0153 };
        let cost = evaluate_linear(&c, 3000);
        let v = cost.as_f64().unwrap();
        assert!((v - (3000.0 * 0.0077 + 20.0153)).abs() < 1e-9);
    }

    #[test]
    fn linear_on_symbol_stays_symbolic() {
        let c = LinearCoeffs { k: 0.5, b: 2.0 };
        let cost = evaluate_linear(&c, Expr::symbol("n"));
        assert_eq!(cost.to_string(), "n * 0.5 + 2.0");
    }

    #[test]
    fn load_store_uses_symbolic_block_dim() {
        let c = LoadStoreCoeffs {
            h: 27.01,
            a: 7.9052,
            b: 7.31,
            hl: 30.0,
            data_type_size: 2,
        };
        let bd = Expr::symbol("block_dim");
        let small = c.small(&Expr::from(512), &bd);
        assert_eq!(small.to_string(), "1024 / (7.31 / block_dim + 7.9052) + 27.01");
        let large = c.large(&Expr::from(512), &bd);
        assert_eq!(large.to_string(), "1024 / (7.31 / block_dim + 7.9052) + 30.0");
    }

    #[test]
    fn missing_entry_is_an_error() {
        let table = ParamTable::builtin();
        assert!(table.lookup("Abs", "int64toint64").is_none());
        assert!(matches!(
            table.get("Abs", "int64toint64"),
            Err(PerfError::MissingParams { .. })
        ));
        assert!(matches!(
            table.linear("NoSuchInstr", "float16tofloat16"),
            Err(PerfError::MissingParams { .. })
        ));
    }

    #[test]
    fn wrong_model_kind_is_reported() {
        let table = ParamTable::builtin();
        let err = table.linear("Load", "float16tofloat16").unwrap_err();
        assert!(matches!(err, PerfError::ModelMismatch { expected: "SimpleLinear", .. }));
    }

    #[test]
    fn override_table() {
        let text = r#"{ "Abs": { "float16tofloat16": { "model": "SimpleLinear", "k": 1.0, "b": 0.5 } } }"#;
        let mut table = ParamTable::builtin().clone();
        table.extend(ParamTable::from_json(text).unwrap());
        assert_eq!(table.linear("Abs", "float16tofloat16").unwrap().k, 1.0);
        assert!(table.lookup("Exp", "float16tofloat16").is_some());
    }

    #[test]
    fn malformed_table() {
        let err = ParamTable::from_json(r#"{ "Abs": { "x": { "model": "Cubic" } } }"#).unwrap_err();
        assert!(matches!(err, PerfError::MalformedParams(_)));
    }
}
