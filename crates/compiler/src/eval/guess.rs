//! Guessing support for non-deterministic evaluation
//!
//! Two pieces: the lightweight integer domain intersected on each
//! assumed comparison, and the decision tape that drives depth-first
//! enumeration of guessed alternatives by re-running the traversal.
//!
//! The domain is `(lower?, upper?, finite hole set)` - a heuristic, not
//! a decision procedure. Emptiness is decided exactly when the interval
//! is bounded and fully covered by holes, and conservatively answered
//! "non-empty" otherwise.

use crate::ast::{Exp, ExpKind};
use rill_core::ops::BinOp;
use std::collections::BTreeSet;

/// Abstract set of integers: optional bounds plus excluded points.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntDomain {
    pub lo: Option<i64>,
    pub hi: Option<i64>,
    pub holes: BTreeSet<i64>,
}

impl IntDomain {
    pub fn full() -> IntDomain {
        IntDomain::default()
    }

    pub fn exactly(k: i64) -> IntDomain {
        IntDomain {
            lo: Some(k),
            hi: Some(k),
            holes: BTreeSet::new(),
        }
    }

    pub fn at_most(k: i64) -> IntDomain {
        IntDomain {
            lo: None,
            hi: Some(k),
            holes: BTreeSet::new(),
        }
    }

    pub fn at_least(k: i64) -> IntDomain {
        IntDomain {
            lo: Some(k),
            hi: None,
            holes: BTreeSet::new(),
        }
    }

    pub fn excluding(k: i64) -> IntDomain {
        let mut holes = BTreeSet::new();
        holes.insert(k);
        IntDomain {
            lo: None,
            hi: None,
            holes,
        }
    }

    pub fn intersect(&self, other: &IntDomain) -> IntDomain {
        let lo = match (self.lo, other.lo) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let hi = match (self.hi, other.hi) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let holes = self.holes.union(&other.holes).copied().collect();
        IntDomain { lo, hi, holes }
    }

    /// True when no integer satisfies the domain. Exact for bounded
    /// intervals covered by holes; unbounded domains are never empty.
    pub fn is_empty(&self) -> bool {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) => {
                if lo > hi {
                    return true;
                }
                // a finite hole set can only cover a bounded interval
                // no wider than itself
                match hi.checked_sub(lo).and_then(|w| w.checked_add(1)) {
                    Some(width) if width <= self.holes.len() as i64 => {
                        self.holes.range(lo..=hi).count() as i64 == width
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// The domain a comparison `subject op k` implies under the given
    /// assumed truth.
    pub fn implied(op: BinOp, k: i64, assumed: bool) -> IntDomain {
        match (op, assumed) {
            (BinOp::Eq, true) | (BinOp::Neq, false) => IntDomain::exactly(k),
            (BinOp::Eq, false) | (BinOp::Neq, true) => IntDomain::excluding(k),
            (BinOp::Lt, true) | (BinOp::Geq, false) => IntDomain::at_most(k.saturating_sub(1)),
            (BinOp::Lt, false) | (BinOp::Geq, true) => IntDomain::at_least(k),
            (BinOp::Leq, true) | (BinOp::Gt, false) => IntDomain::at_most(k),
            (BinOp::Leq, false) | (BinOp::Gt, true) => IntDomain::at_least(k.saturating_add(1)),
            _ => IntDomain::full(),
        }
    }
}

/// Split a guessed condition into (subject key, comparison, literal):
/// only comparisons against a known integer literal on the right feed
/// the integer domain.
pub fn comparison_parts(e: &Exp) -> Option<(String, BinOp, i64)> {
    match &*e.kind {
        ExpKind::Bin { op, lhs, rhs } if op.is_comparison() => {
            let k = rhs.as_val()?.as_int()?;
            Some((lhs.to_string(), *op, k))
        }
        _ => None,
    }
}

/// Recorded boolean choices of one non-deterministic run. The driver
/// replays a prefix and the evaluator extends it (true first) at each
/// fresh guess point.
#[derive(Debug, Clone, Default)]
pub struct DecisionTape {
    choices: Vec<bool>,
    cursor: usize,
}

impl DecisionTape {
    pub fn with_prefix(choices: Vec<bool>) -> DecisionTape {
        DecisionTape { choices, cursor: 0 }
    }

    /// The next choice: replayed from the prefix if present, otherwise
    /// a fresh `true`.
    pub fn next(&mut self) -> bool {
        if self.cursor == self.choices.len() {
            self.choices.push(true);
        }
        let b = self.choices[self.cursor];
        self.cursor += 1;
        b
    }

    /// The choices actually consumed by the finished run.
    pub fn taken(mut self) -> Vec<bool> {
        self.choices.truncate(self.cursor);
        self.choices
    }
}

/// The next unexplored choice vector after `taken`, depth-first:
/// discard exhausted trailing `false`s and flip the deepest `true`.
/// `None` when the whole tree has been explored.
pub fn backtrack(mut taken: Vec<bool>) -> Option<Vec<bool>> {
    while taken.last() == Some(&false) {
        taken.pop();
    }
    let last = taken.last_mut()?;
    *last = false;
    Some(taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::types::Ty;

    #[test]
    fn test_intersection_becomes_empty() {
        let d = IntDomain::exactly(0).intersect(&IntDomain::exactly(1));
        assert!(d.is_empty());
        let d = IntDomain::at_least(5).intersect(&IntDomain::at_most(4));
        assert!(d.is_empty());
        let d = IntDomain::at_least(5).intersect(&IntDomain::at_most(5));
        assert!(!d.is_empty());
    }

    #[test]
    fn test_holes_cover_bounded_interval() {
        let d = IntDomain::exactly(3).intersect(&IntDomain::excluding(3));
        assert!(d.is_empty());
        let mut d = IntDomain {
            lo: Some(0),
            hi: Some(2),
            holes: BTreeSet::new(),
        };
        d = d.intersect(&IntDomain::excluding(0));
        d = d.intersect(&IntDomain::excluding(2));
        assert!(!d.is_empty());
        d = d.intersect(&IntDomain::excluding(1));
        assert!(d.is_empty());
    }

    #[test]
    fn test_unbounded_never_empty() {
        let mut d = IntDomain::full();
        for k in 0..100 {
            d = d.intersect(&IntDomain::excluding(k));
        }
        assert!(!d.is_empty());
    }

    #[test]
    fn test_implied_domains() {
        assert_eq!(IntDomain::implied(BinOp::Eq, 7, true), IntDomain::exactly(7));
        assert_eq!(IntDomain::implied(BinOp::Lt, 7, true), IntDomain::at_most(6));
        assert_eq!(IntDomain::implied(BinOp::Lt, 7, false), IntDomain::at_least(7));
        assert_eq!(IntDomain::implied(BinOp::Neq, 7, true), IntDomain::excluding(7));
    }

    #[test]
    fn test_comparison_parts() {
        let e = Exp::bin(BinOp::Eq, Exp::var("a", Ty::int32()), Exp::i32(0), Ty::Bool);
        let (key, op, k) = comparison_parts(&e).unwrap();
        assert_eq!(key, "a");
        assert_eq!(op, BinOp::Eq);
        assert_eq!(k, 0);
        let e2 = Exp::bin(
            BinOp::Add,
            Exp::var("a", Ty::int32()),
            Exp::i32(0),
            Ty::int32(),
        );
        assert!(comparison_parts(&e2).is_none());
    }

    #[test]
    fn test_tape_explores_depth_first() {
        let mut t = DecisionTape::default();
        assert!(t.next());
        assert!(t.next());
        let taken = t.taken();
        assert_eq!(taken, vec![true, true]);
        let next = backtrack(taken).unwrap();
        assert_eq!(next, vec![true, false]);
        let mut t = DecisionTape::with_prefix(next);
        assert!(t.next());
        assert!(!t.next());
        let next = backtrack(t.taken()).unwrap();
        assert_eq!(next, vec![false]);
        assert_eq!(backtrack(vec![false]), None);
    }
}
