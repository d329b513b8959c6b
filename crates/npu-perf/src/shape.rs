//! Operand descriptors.
//!
//! A [`TensorShapeInfo`] describes one operand of an instruction: element
//! type, per-dimension sizes (each an [`Expr`], so dimensions may be
//! run-time symbols), local and global-memory strides, and the memory tier
//! the operand lives in. Descriptors are built by the caller and only read
//! by formulas.

use std::fmt;
use std::str::FromStr;

use npu_perf_expr::Expr;
use serde::{Deserialize, Serialize};

use crate::error::PerfError;

/// Element data type of an operand.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float16,
    Float32,
    BFloat16,
    Int8,
    Uint8,
    Int16,
    Int32,
    Int64,
    Bool,
}

impl DataType {
    pub const ALL: [Self; 9] = [
        Self::Float16,
        Self::Float32,
        Self::BFloat16,
        Self::Int8,
        Self::Uint8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Bool,
    ];

    /// Parses a data type name as used in parameter-table keys.
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "float16" | "fp16" | "half" => Some(Self::Float16),
            "float32" | "fp32" | "float" => Some(Self::Float32),
            "bfloat16" | "bf16" => Some(Self::BFloat16),
            "int8" => Some(Self::Int8),
            "uint8" => Some(Self::Uint8),
            "int16" => Some(Self::Int16),
            "int32" => Some(Self::Int32),
            "int64" => Some(Self::Int64),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Canonical name, as used in parameter-table keys.
    pub fn name(self) -> &'static str {
        match self {
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::BFloat16 => "bfloat16",
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Bool => "bool",
        }
    }

    /// Size of one element in bytes.
    pub fn byte_size(self) -> u32 {
        match self {
            Self::Int8 | Self::Uint8 | Self::Bool => 1,
            Self::Float16 | Self::BFloat16 | Self::Int16 => 2,
            Self::Float32 | Self::Int32 => 4,
            Self::Int64 => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = PerfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_name(s).ok_or_else(|| PerfError::UnknownDataType(s.to_string()))
    }
}

/// Parameter-table key for a source/destination type pair, e.g.
/// `float16tofloat32`.
pub fn dtype_pair(src: DataType, dst: DataType) -> String {
    format!("{src}to{dst}")
}

/// Hardware memory tier an operand resides in.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum MemoryTier {
    /// Off-chip global memory.
    GM,
    /// Vector unified buffer.
    UB,
    /// Cube input staging buffer.
    L1,
    /// Cube left-operand buffer.
    L0A,
    /// Cube right-operand buffer.
    L0B,
    /// Cube accumulator buffer.
    L0C,
}

impl MemoryTier {
    /// Case-insensitive parse.
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GM" => Some(Self::GM),
            "UB" => Some(Self::UB),
            "L1" => Some(Self::L1),
            "L0A" => Some(Self::L0A),
            "L0B" => Some(Self::L0B),
            "L0C" => Some(Self::L0C),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::GM => "GM",
            Self::UB => "UB",
            Self::L1 => "L1",
            Self::L0A => "L0A",
            Self::L0B => "L0B",
            Self::L0C => "L0C",
        }
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque identity of the graph node being costed. Formulas pass it
/// through untouched.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct NodeRef(pub u64);

/// One operand of a cost query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorShapeInfo {
    pub dtype: DataType,
    /// Dimension sizes, outermost first.
    pub shape: Vec<Expr>,
    /// Element strides in the local buffer.
    pub strides: Vec<Expr>,
    /// Element strides in global memory.
    pub gm_strides: Vec<Expr>,
    pub location: MemoryTier,
}

/// Packed (row-major) element strides for `shape`.
pub fn packed_strides(shape: &[Expr]) -> Vec<Expr> {
    let mut strides = vec![Expr::one(); shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = &strides[i + 1] * &shape[i + 1];
    }
    strides
}

/// Product of `dims`; `1` for an empty slice.
pub fn product(dims: &[Expr]) -> Expr {
    dims.iter().fold(Expr::one(), |acc, d| acc * d)
}

impl TensorShapeInfo {
    /// A packed operand in global memory.
    pub fn new<I>(dtype: DataType, shape: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        let shape: Vec<Expr> = shape.into_iter().map(Into::into).collect();
        let strides = packed_strides(&shape);
        Self {
            dtype,
            gm_strides: strides.clone(),
            strides,
            shape,
            location: MemoryTier::GM,
        }
    }

    /// Replaces the global-memory strides.
    pub fn with_gm_strides<I>(mut self, strides: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        self.gm_strides = strides.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the local-buffer strides.
    pub fn with_strides<I>(mut self, strides: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        self.strides = strides.into_iter().map(Into::into).collect();
        self
    }

    /// Moves the operand to `location`.
    pub fn at(mut self, location: MemoryTier) -> Self {
        self.location = location;
        self
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn element_count(&self) -> Expr {
        product(&self.shape)
    }

    pub fn elem_bytes(&self) -> Expr {
        Expr::from(self.dtype.byte_size())
    }

    pub fn data_bytes(&self) -> Expr {
        self.element_count() * self.elem_bytes()
    }

    /// Number of innermost dimensions that are packed in global memory.
    ///
    /// Strides are compared structurally, so a symbolic stride only counts
    /// as packed if it is literally the product of the inner dimensions.
    /// The stride of a size-1 dimension is never stepped and is ignored.
    pub fn contiguous_suffix(&self) -> usize {
        if self.gm_strides.len() != self.shape.len() {
            return 0;
        }
        let one = Expr::one();
        let mut expected = Expr::one();
        let mut count = 0;
        for (dim, stride) in self.shape.iter().zip(&self.gm_strides).rev() {
            if *dim != one && *stride != expected {
                break;
            }
            count += 1;
            expected = expected * dim;
        }
        count
    }

    /// `true` when the whole operand is one packed run in global memory.
    pub fn is_contiguous(&self) -> bool {
        self.contiguous_suffix() == self.rank()
    }
}

fn write_dims(f: &mut fmt::Formatter<'_>, dims: &[Expr]) -> fmt::Result {
    f.write_str("[")?;
    for (i, d) in dims.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{d}")?;
    }
    f.write_str("]")
}

/// Text form `[16,n]:float16@GM`, followed by `/[...]` global-memory
/// strides when they are not packed.
impl fmt::Display for TensorShapeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_dims(f, &self.shape)?;
        write!(f, ":{}@{}", self.dtype, self.location)?;
        if self.gm_strides != packed_strides(&self.shape) {
            f.write_str("/")?;
            write_dims(f, &self.gm_strides)?;
        }
        Ok(())
    }
}

/// Splits on commas that are not nested inside parentheses.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn parse_dims(spec: &str, text: &str) -> Result<Vec<Expr>, PerfError> {
    let invalid = |reason: String| PerfError::InvalidOperand {
        input: spec.to_string(),
        reason,
    };
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| invalid(format!("expected `[...]`, found `{text}`")))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    split_top_level(inner)
        .into_iter()
        .map(|d| d.parse::<Expr>().map_err(|e| invalid(e.to_string())))
        .collect()
}

/// Parses `[dims]:dtype[@tier][/[gm_strides]]`.
///
/// Dimensions and strides are expressions, so `[n,32]` has a symbolic
/// outer dimension. The tier defaults to `GM`.
impl FromStr for TensorShapeInfo {
    type Err = PerfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| PerfError::InvalidOperand {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let (dims, rest) = s
            .split_once(':')
            .ok_or_else(|| invalid("missing `:dtype`"))?;
        let (rest, strides) = match rest.split_once('/') {
            Some((head, strides)) => (head, Some(strides)),
            None => (rest, None),
        };
        let (dtype, tier) = match rest.split_once('@') {
            Some((dtype, tier)) => (dtype, Some(tier)),
            None => (rest, None),
        };

        let dtype: DataType = dtype.trim().parse()?;
        let mut info = Self::new(dtype, parse_dims(s, dims)?);
        if let Some(tier) = tier {
            let tier = MemoryTier::from_str_name(tier.trim())
                .ok_or_else(|| invalid("unknown memory tier"))?;
            info = info.at(tier);
        }
        if let Some(strides) = strides {
            let strides = parse_dims(s, strides)?;
            if strides.len() != info.rank() {
                return Err(invalid("stride count does not match rank"));
            }
            info = info.with_gm_strides(strides);
        }
        Ok(info)
    }
}
