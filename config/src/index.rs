//! Index strategy decision
//!
//! HNSW-class indexes cap out at 2000 dimensions in the pgvector
//! family. Exceeding the cap must never produce a silent failure, so
//! the strategy is decided once from the configured dimensionality,
//! logged at startup, and treated as an invariant for the process
//! lifetime.

use tracing::info;

/// Maximum dimensionality the approximate index family supports
pub const HNSW_DIMENSION_CAP: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStrategy {
    /// Approximate nearest-neighbor index (HNSW)
    Hnsw,
    /// Exact sequential scan; required above the index dimension cap
    ExactScan,
}

impl IndexStrategy {
    pub fn for_dimensions(dimensions: usize) -> Self {
        if dimensions <= HNSW_DIMENSION_CAP {
            IndexStrategy::Hnsw
        } else {
            IndexStrategy::ExactScan
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStrategy::Hnsw => "hnsw",
            IndexStrategy::ExactScan => "exact_scan",
        }
    }

    /// Emit the observable startup log entry for this decision
    pub fn log_decision(&self, dimensions: usize) {
        info!(
            strategy = self.as_str(),
            dimensions,
            cap = HNSW_DIMENSION_CAP,
            "vector index strategy selected"
        );
    }
}

impl std::fmt::Display for IndexStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_follows_the_dimension_cap() {
        assert_eq!(IndexStrategy::for_dimensions(768), IndexStrategy::Hnsw);
        assert_eq!(IndexStrategy::for_dimensions(2000), IndexStrategy::Hnsw);
        assert_eq!(
            IndexStrategy::for_dimensions(2001),
            IndexStrategy::ExactScan
        );
        assert_eq!(
            IndexStrategy::for_dimensions(4096),
            IndexStrategy::ExactScan
        );
    }
}
