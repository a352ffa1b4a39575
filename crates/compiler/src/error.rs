//! Evaluator and splitter error types.
//!
//! Each traversal threads a single error channel; the first failure
//! aborts that mode's result. Side effects accumulated before the
//! failure stay visible in the print log as a diagnostic aid.

use rill_core::loc::{SourceLocation, loc_prefix};

/// Error raised by the expression evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A variable had no value during full evaluation. Callers wanting
    /// residuals switch to partial mode.
    FreeVar {
        var: String,
        loc: Option<SourceLocation>,
    },
    /// Full evaluation reached a subexpression that did not reduce.
    NotReduced {
        exp: String,
        loc: Option<SourceLocation>,
    },
    /// Array access outside the array's bounds; fatal in every mode.
    OutOfBounds {
        index: i64,
        len: usize,
        loc: Option<SourceLocation>,
    },
    /// An operator applied to tags it has no meaning for. The type
    /// checker upstream should have ruled this out, so it is reported
    /// as a compiler bug with the offending expression printed.
    OpMismatch {
        exp: String,
        loc: Option<SourceLocation>,
    },
    /// A node the core deliberately does not interpret.
    NotImplemented {
        what: String,
        loc: Option<SourceLocation>,
    },
    /// Non-deterministic branch whose integer-domain intersection is
    /// empty. Not a user-visible error: the driver drops the branch.
    Pruned,
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::FreeVar { var, loc } => {
                write!(f, "{}free variable `{}` in full evaluation", loc_prefix(loc.as_ref()), var)
            }
            EvalError::NotReduced { exp, loc } => write!(
                f,
                "{}expression did not reduce in full evaluation: {}",
                loc_prefix(loc.as_ref()),
                exp
            ),
            EvalError::OutOfBounds { index, len, loc } => write!(
                f,
                "{}array index {} out of bounds (length {})",
                loc_prefix(loc.as_ref()),
                index,
                len
            ),
            EvalError::OpMismatch { exp, loc } => write!(
                f,
                "{}operator not applicable (compiler bug, the type checker should have \
                 rejected this): {}",
                loc_prefix(loc.as_ref()),
                exp
            ),
            EvalError::NotImplemented { what, loc } => {
                write!(f, "{}not implemented: {}", loc_prefix(loc.as_ref()), what)
            }
            EvalError::Pruned => write!(f, "non-deterministic branch pruned"),
        }
    }
}

impl std::error::Error for EvalError {}

/// Error raised by the task splitter.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitError {
    /// Barriers inside iteration constructs need a scheduler-friendly
    /// loop driver and cardinality analysis this compiler does not
    /// provide yet.
    BarrierInLoop {
        construct: &'static str,
        loc: Option<SourceLocation>,
    },
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitError::BarrierInLoop { construct, loc } => write!(
                f,
                "{}not implemented: standalone barrier inside `{}`",
                loc_prefix(loc.as_ref()),
                construct
            ),
        }
    }
}

impl std::error::Error for SplitError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_messages_carry_locations() {
        let loc = SourceLocation::new(PathBuf::from("rx.rl"), 11);
        let e = EvalError::FreeVar {
            var: "gain".to_string(),
            loc: Some(loc),
        };
        assert_eq!(e.to_string(), "at rx.rl:12: free variable `gain` in full evaluation");
        let e = EvalError::OutOfBounds {
            index: 9,
            len: 8,
            loc: None,
        };
        assert_eq!(e.to_string(), "array index 9 out of bounds (length 8)");
    }

    #[test]
    fn test_split_error_message() {
        let e = SplitError::BarrierInLoop {
            construct: "until",
            loc: None,
        };
        assert!(e.to_string().contains("not implemented"));
        assert!(e.to_string().contains("until"));
    }
}
