//! Hardware pipes.

use std::fmt;

use serde::Serialize;

use crate::shape::MemoryTier;

/// An independent execution or transfer unit whose cycles accumulate
/// separately.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub enum PipeType {
    /// Vector unit.
    #[serde(rename = "PIPE_V")]
    Vector,
    /// Cube (matrix) unit.
    #[serde(rename = "PIPE_M")]
    Cube,
    /// Scalar unit.
    #[serde(rename = "PIPE_S")]
    Scalar,
    /// L1 to L0A/L0B.
    #[serde(rename = "PIPE_MTE1")]
    Mte1,
    /// GM to UB/L1.
    #[serde(rename = "PIPE_MTE2")]
    Mte2,
    /// UB to GM.
    #[serde(rename = "PIPE_MTE3")]
    Mte3,
    /// L0C to GM/L1.
    #[serde(rename = "PIPE_FIX")]
    Fixpipe,
}

impl PipeType {
    pub const ALL: [Self; 7] = [
        Self::Vector,
        Self::Cube,
        Self::Scalar,
        Self::Mte1,
        Self::Mte2,
        Self::Mte3,
        Self::Fixpipe,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Vector => "PIPE_V",
            Self::Cube => "PIPE_M",
            Self::Scalar => "PIPE_S",
            Self::Mte1 => "PIPE_MTE1",
            Self::Mte2 => "PIPE_MTE2",
            Self::Mte3 => "PIPE_MTE3",
            Self::Fixpipe => "PIPE_FIX",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == s)
    }

    /// The pipe that moves data from `src` to `dst`, if any.
    pub fn for_transfer(src: MemoryTier, dst: MemoryTier) -> Option<Self> {
        use MemoryTier::*;
        match (src, dst) {
            (GM, UB | L1) => Some(Self::Mte2),
            (UB, GM) => Some(Self::Mte3),
            (L1, L0A | L0B) => Some(Self::Mte1),
            (L0C, GM | L1) => Some(Self::Fixpipe),
            (UB, UB) => Some(Self::Vector),
            _ => None,
        }
    }
}

impl fmt::Display for PipeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for pipe in PipeType::ALL {
            assert_eq!(PipeType::from_name(pipe.name()), Some(pipe));
        }
        assert_eq!(PipeType::from_name("PIPE_X"), None);
    }

    #[test]
    fn transfer_pipes() {
        use MemoryTier::*;
        assert_eq!(PipeType::for_transfer(GM, UB), Some(PipeType::Mte2));
        assert_eq!(PipeType::for_transfer(GM, L1), Some(PipeType::Mte2));
        assert_eq!(PipeType::for_transfer(UB, GM), Some(PipeType::Mte3));
        assert_eq!(PipeType::for_transfer(L1, L0B), Some(PipeType::Mte1));
        assert_eq!(PipeType::for_transfer(L0C, GM), Some(PipeType::Fixpipe));
        assert_eq!(PipeType::for_transfer(L0A, GM), None);
    }

    #[test]
    fn serializes_as_pipe_name() {
        let json = serde_json::to_string(&PipeType::Mte2).unwrap();
        assert_eq!(json, "\"PIPE_MTE2\"");
    }
}
