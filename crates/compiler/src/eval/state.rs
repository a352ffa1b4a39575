//! Evaluator state
//!
//! Everything one top-level evaluation call mutates: the immutable and
//! mutable scopes, the guess stores, the print log and the statistics
//! map. State lives for one call and is discarded.

use crate::ast::Exp;
use crate::eval::guess::IntDomain;
use rill_core::value::Val;
use std::collections::HashMap;

/// Did the variable's current value come from an explicit write or from
/// its type's implicit default?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Implicit,
    Explicit,
}

/// State of a mutable variable.
///
/// `Unknown` optionally remembers the last known value: a complex
/// (partial-overwrite) assignment keeps it so the code generator can
/// seed the variable's initial contents, a simple (whole-variable)
/// assignment discards it.
#[derive(Debug, Clone, PartialEq)]
pub enum RefState {
    Known { val: Val, prov: Provenance },
    Unknown { last: Option<(Val, Provenance)> },
}

/// One print/println record: the newline flag and the evaluated
/// argument (a literal when it reduced, the residual otherwise).
pub type PrintLog = Vec<(bool, Exp)>;

#[derive(Debug, Clone, Default)]
pub struct EvalState {
    /// Immutable let bindings
    pub lets: HashMap<String, Val>,
    /// Mutable ref-let bindings
    pub refs: HashMap<String, RefState>,
    /// Assumed truth per boolean expression (keyed by the
    /// location-stripped rendering); non-deterministic mode only
    pub bool_guesses: HashMap<String, bool>,
    /// Integer domain per guessed comparison subject; non-deterministic
    /// mode only
    pub int_guesses: HashMap<String, IntDomain>,
    pub print_log: PrintLog,
    /// Per-variable maximum observed value size
    pub stats: HashMap<String, usize>,
}

impl EvalState {
    pub fn new() -> EvalState {
        EvalState::default()
    }

    /// Record the size of a value observed in a variable.
    pub fn note_size(&mut self, var: &str, size: usize) {
        let entry = self.stats.entry(var.to_string()).or_insert(0);
        if size > *entry {
            *entry = size;
        }
    }

    /// Snapshot for loop unrolling: restoring undoes every effect of
    /// the abandoned iterations, including their log entries.
    pub fn snapshot(&self) -> EvalState {
        self.clone()
    }

    pub fn restore(&mut self, snap: EvalState) {
        *self = snap;
    }

    /// Coarse invalidation at control-flow joins the evaluator cannot
    /// see through (unknown conditionals, opaque calls, residual
    /// loops): every known ref moves to unknown-remembering-its-value,
    /// and all guesses drop.
    pub fn invalidate_refs(&mut self) {
        for state in self.refs.values_mut() {
            if let RefState::Known { val, prov } = state {
                *state = RefState::Unknown {
                    last: Some((val.clone(), *prov)),
                };
            }
        }
        self.clear_guesses();
    }

    pub fn clear_guesses(&mut self) {
        self.bool_guesses.clear();
        self.int_guesses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_size_keeps_maximum() {
        let mut st = EvalState::new();
        st.note_size("buf", 4);
        st.note_size("buf", 2);
        st.note_size("buf", 9);
        assert_eq!(st.stats["buf"], 9);
    }

    #[test]
    fn test_invalidate_remembers_last_known() {
        let mut st = EvalState::new();
        st.refs.insert(
            "x".to_string(),
            RefState::Known {
                val: Val::i32(5),
                prov: Provenance::Explicit,
            },
        );
        st.bool_guesses.insert("(a == 0)".to_string(), true);
        st.invalidate_refs();
        assert_eq!(
            st.refs["x"],
            RefState::Unknown {
                last: Some((Val::i32(5), Provenance::Explicit))
            }
        );
        assert!(st.bool_guesses.is_empty());
    }

    #[test]
    fn test_restore_undoes_log_entries() {
        let mut st = EvalState::new();
        st.print_log.push((true, Exp::i32(1)));
        let snap = st.snapshot();
        st.print_log.push((true, Exp::i32(2)));
        st.restore(snap);
        assert_eq!(st.print_log.len(), 1);
    }
}
