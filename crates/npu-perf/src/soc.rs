//! Hardware profile constants used by the formulas.

use std::fmt;
use std::str::FromStr;

use npu_perf_expr::Expr;

use crate::shape::DataType;

/// Name of the run-time symbol for the active core count.
pub const BLOCK_DIM: &str = "block_dim";

/// Hardware generation tag for formula overrides.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Generation {
    V2,
    V3,
}

impl Generation {
    pub fn name(self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Generation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v2" => Ok(Self::V2),
            "v3" => Ok(Self::V3),
            _ => Err(format!("unknown generation '{s}', expected v2 or v3")),
        }
    }
}

/// Hardware constants of one SoC.
#[derive(Clone, Debug, PartialEq)]
pub struct SocProfile {
    pub name: String,
    /// Minimum addressable UB block in bytes.
    pub ub_block_bytes: i64,
    /// Bytes processed by one vector repeat.
    pub vector_repeat_bytes: i64,
    /// Contiguous transfers of at least this many bytes use the
    /// large-transfer coefficients.
    pub large_transfer_bytes: i64,
    /// Aligned store blocks below this many bytes use the small-block
    /// coefficients.
    pub store_small_block_bytes: i64,
    /// Cube fractal edge lengths (M, K, N) in elements.
    pub cube_fractal: (i64, i64, i64),
    pub cube_cycles_per_fractal: f64,
    /// Bytes per cycle.
    pub gm_bandwidth: f64,
    pub l1_bandwidth: f64,
    pub fixpipe_bandwidth: f64,
    /// Fixed core count; `None` leaves `block_dim` symbolic.
    pub core_count: Option<u32>,
}

impl Default for SocProfile {
    fn default() -> Self {
        Self {
            name: "default".into(),
            ub_block_bytes: 32,
            vector_repeat_bytes: 256,
            large_transfer_bytes: 32768,
            store_small_block_bytes: 512,
            cube_fractal: (16, 16, 16),
            cube_cycles_per_fractal: 1.0,
            gm_bandwidth: 64.0,
            l1_bandwidth: 256.0,
            fixpipe_bandwidth: 128.0,
            core_count: None,
        }
    }
}

impl SocProfile {
    /// Profile for `generation`, or the default profile.
    pub fn for_generation(generation: Option<Generation>) -> Self {
        match generation {
            None => Self::default(),
            Some(Generation::V3) => Self {
                name: "v3".into(),
                ..Self::default()
            },
            Some(Generation::V2) => Self {
                name: "v2".into(),
                gm_bandwidth: 32.0,
                l1_bandwidth: 128.0,
                fixpipe_bandwidth: 64.0,
                cube_cycles_per_fractal: 2.0,
                ..Self::default()
            },
        }
    }

    pub fn with_core_count(mut self, cores: u32) -> Self {
        self.core_count = Some(cores);
        self
    }

    /// The active core count, or the `block_dim` symbol when not fixed.
    pub fn block_dim(&self) -> Expr {
        match self.core_count {
            Some(n) => Expr::from(n),
            None => Expr::symbol(BLOCK_DIM),
        }
    }

    /// Elements of `dtype` in one UB block.
    pub fn block_elems(&self, dtype: DataType) -> i64 {
        (self.ub_block_bytes / i64::from(dtype.byte_size())).max(1)
    }

    /// Elements of `dtype` processed by one vector repeat.
    pub fn repeat_elems(&self, dtype: DataType) -> i64 {
        (self.vector_repeat_bytes / i64::from(dtype.byte_size())).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_block_dim_is_symbolic() {
        let soc = SocProfile::default();
        assert_eq!(soc.block_dim(), Expr::symbol("block_dim"));
        assert_eq!(soc.with_core_count(8).block_dim(), Expr::from(8));
    }

    #[test]
    fn element_counts() {
        let soc = SocProfile::default();
        assert_eq!(soc.block_elems(DataType::Float16), 16);
        assert_eq!(soc.block_elems(DataType::Int64), 4);
        assert_eq!(soc.repeat_elems(DataType::Float32), 64);
    }

    #[test]
    fn generation_profiles() {
        let v2 = SocProfile::for_generation(Some(Generation::V2));
        assert_eq!(v2.name, "v2");
        assert!(v2.gm_bandwidth < SocProfile::default().gm_bandwidth);
        assert_eq!(v2.ub_block_bytes, 32);
        assert_eq!("V2".parse::<Generation>(), Ok(Generation::V2));
        assert!("v9".parse::<Generation>().is_err());
    }
}
