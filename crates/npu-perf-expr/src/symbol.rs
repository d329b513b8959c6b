//! Named run-time symbols and case placeholders.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Next placeholder id. Process-wide so that pending maps produced by
/// independent formula calls (on any thread) can always be merged.
static NEXT_PLACEHOLDER: AtomicU64 = AtomicU64::new(0);

/// A symbol appearing in a cost expression.
///
/// `Named` symbols stand for values unknown until kernel launch (shape
/// dimensions, the active core count). `Placeholder` symbols stand for a
/// deferred case node whose definition lives in a
/// [`PendingCases`](crate::PendingCases) map.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Symbol {
    /// A free symbol such as `block_dim` or `n`.
    Named(Arc<str>),
    /// A case placeholder, displayed as `_case<id>`.
    Placeholder(u64),
}

impl Symbol {
    /// Creates a named symbol.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::Named(name.into())
    }

    /// Allocates a placeholder that no other call in this process will
    /// ever receive.
    pub fn fresh_placeholder() -> Self {
        Self::Placeholder(NEXT_PLACEHOLDER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns `true` for case placeholders.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    /// Returns the name of a named symbol.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Placeholder(_) => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Placeholder(id) => write!(f, "_case{id}"),
        }
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
