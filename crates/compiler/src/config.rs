//! Evaluator configuration
//!
//! The partial evaluator's tunables, with the defaults the rest of the
//! pipeline is calibrated against. External drivers can override them
//! programmatically or from a TOML file.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs of the partial evaluator and the non-deterministic driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoldConfig {
    /// Counted loops up to this many iterations are unrolled; larger
    /// loops residualise unconditionally.
    pub unroll_limit: usize,
    /// Largest static array length that still gets an implicit default
    /// value. Above it the ref-let is treated as un-eliminable and the
    /// code generator zeroes the storage instead.
    pub implicit_array_limit: usize,
    /// A mutable array left partially known with at most this many
    /// non-default entries residualises as element-wise assignments
    /// rather than an array literal.
    pub writeout_limit: usize,
    /// Upper bound on branches the non-deterministic driver explores.
    pub branch_limit: usize,
}

impl Default for FoldConfig {
    fn default() -> Self {
        FoldConfig {
            unroll_limit: 512,
            implicit_array_limit: 2048,
            writeout_limit: 32,
            branch_limit: 64,
        }
    }
}

impl FoldConfig {
    pub fn new() -> Self {
        FoldConfig::default()
    }

    pub fn with_unroll_limit(mut self, n: usize) -> Self {
        self.unroll_limit = n;
        self
    }

    pub fn with_implicit_array_limit(mut self, n: usize) -> Self {
        self.implicit_array_limit = n;
        self
    }

    pub fn with_writeout_limit(mut self, n: usize) -> Self {
        self.writeout_limit = n;
        self
    }

    pub fn with_branch_limit(mut self, n: usize) -> Self {
        self.branch_limit = n;
        self
    }

    /// Load overrides from a TOML file. Unset keys keep their defaults.
    pub fn load(path: &Path) -> Result<FoldConfig, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
        toml::from_str(&text).map_err(|e| format!("invalid config {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = FoldConfig::default();
        assert_eq!(c.unroll_limit, 512);
        assert_eq!(c.implicit_array_limit, 2048);
        assert_eq!(c.writeout_limit, 32);
    }

    #[test]
    fn test_builder() {
        let c = FoldConfig::new().with_unroll_limit(8).with_branch_limit(2);
        assert_eq!(c.unroll_limit, 8);
        assert_eq!(c.branch_limit, 2);
        assert_eq!(c.writeout_limit, 32);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let c: FoldConfig = toml::from_str("unroll_limit = 16").unwrap();
        assert_eq!(c.unroll_limit, 16);
        assert_eq!(c.implicit_array_limit, 2048);
    }
}
