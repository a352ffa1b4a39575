//! Source locations for error reporting and tooling
//!
//! Locations live in the core crate because runtime values carry them:
//! a folded constant keeps the position of the expression it came from
//! so diagnostics stay useful after partial evaluation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source location attached to values, expressions and comps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// Start line (0-indexed for LSP compatibility)
    pub start_line: usize,
    /// End line (0-indexed, inclusive)
    pub end_line: usize,
}

impl SourceLocation {
    /// Create a new source location covering a single line
    pub fn new(file: PathBuf, line: usize) -> Self {
        SourceLocation {
            file,
            start_line: line,
            end_line: line,
        }
    }

    /// Create a source location spanning multiple lines
    pub fn span(file: PathBuf, start_line: usize, end_line: usize) -> Self {
        debug_assert!(
            start_line <= end_line,
            "SourceLocation: start_line ({}) must be <= end_line ({})",
            start_line,
            end_line
        );
        SourceLocation {
            file,
            start_line,
            end_line,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "{}:{}", self.file.display(), self.start_line + 1)
        } else {
            write!(
                f,
                "{}:{}-{}",
                self.file.display(),
                self.start_line + 1,
                self.end_line + 1
            )
        }
    }
}

/// Format a location as an error message prefix (e.g., "at lib/crc.rl:42: ").
/// Empty when no location is known.
pub fn loc_prefix(loc: Option<&SourceLocation>) -> String {
    match loc {
        Some(l) => format!("at {}: ", l),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_display() {
        let loc = SourceLocation::new(PathBuf::from("tx.rl"), 4);
        assert_eq!(loc.to_string(), "tx.rl:5");
    }

    #[test]
    fn test_span_display() {
        let loc = SourceLocation::span(PathBuf::from("tx.rl"), 4, 7);
        assert_eq!(loc.to_string(), "tx.rl:5-8");
    }

    #[test]
    fn test_loc_prefix_empty_when_unknown() {
        assert_eq!(loc_prefix(None), "");
        let loc = SourceLocation::new(PathBuf::from("rx.rl"), 0);
        assert_eq!(loc_prefix(Some(&loc)), "at rx.rl:1: ");
    }
}
