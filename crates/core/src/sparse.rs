//! Sparse fixed-length arrays
//!
//! Physical-layer programs pre-allocate large scratch buffers (tens of
//! thousands of elements) and touch only a handful of entries between
//! barriers. Materialising those densely during partial evaluation would
//! dominate memory, so an array value is a default element plus a map of
//! overrides. The override map is a B-tree: reads and writes stay
//! logarithmic, and override iteration is ordered, which keeps the
//! element-wise write-out emission deterministic.

use crate::value::Val;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A fixed-length array value: one default element plus overrides.
///
/// The override map never stores an element equal to the default, so
/// `write_count` is exactly the number of positions that differ from
/// the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseArr {
    len: usize,
    default: Box<Val>,
    writes: BTreeMap<usize, Val>,
}

impl SparseArr {
    /// All-default array of the given length.
    pub fn new(default: Val, len: usize) -> SparseArr {
        SparseArr {
            len,
            default: Box::new(default),
            writes: BTreeMap::new(),
        }
    }

    /// Array from explicit elements. The default still backs positions
    /// whose element equals it, keeping the representation sparse when
    /// the input is mostly uniform.
    pub fn from_elems(default: Val, elems: Vec<Val>) -> SparseArr {
        let mut arr = SparseArr::new(default, elems.len());
        for (i, v) in elems.into_iter().enumerate() {
            arr.set(i, v);
        }
        arr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn default_elem(&self) -> &Val {
        &self.default
    }

    /// Element at `i`, or `None` out of bounds.
    pub fn get(&self, i: usize) -> Option<&Val> {
        if i >= self.len {
            return None;
        }
        Some(self.writes.get(&i).unwrap_or(&self.default))
    }

    /// Overwrite element `i`. Returns `false` out of bounds.
    pub fn set(&mut self, i: usize, v: Val) -> bool {
        if i >= self.len {
            return false;
        }
        if v == *self.default {
            self.writes.remove(&i);
        } else {
            self.writes.insert(i, v);
        }
        true
    }

    /// Copy of the sub-array `[lo, lo + n)`, or `None` out of bounds.
    pub fn slice(&self, lo: usize, n: usize) -> Option<SparseArr> {
        if lo.checked_add(n)? > self.len {
            return None;
        }
        let mut out = SparseArr::new((*self.default).clone(), n);
        for (i, v) in self.writes.range(lo..lo + n) {
            out.writes.insert(i - lo, v.clone());
        }
        Some(out)
    }

    /// Overwrite `[lo, lo + src.len())` with the elements of `src`.
    /// Returns `false` out of bounds.
    pub fn write_slice(&mut self, lo: usize, src: &SparseArr) -> bool {
        match lo.checked_add(src.len) {
            Some(hi) if hi <= self.len => {}
            _ => return false,
        }
        for i in 0..src.len {
            let v = src.get(i).expect("index in bounds").clone();
            self.set(lo + i, v);
        }
        true
    }

    /// Ordered iteration over the positions that differ from the default.
    pub fn writes(&self) -> impl Iterator<Item = (usize, &Val)> {
        self.writes.iter().map(|(i, v)| (*i, v))
    }

    /// Number of positions that differ from the default.
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Dense element list. Intended for small arrays (literals, test
    /// fixtures); callers holding a 96k scratch buffer iterate `writes`
    /// instead.
    pub fn to_vec(&self) -> Vec<Val> {
        (0..self.len)
            .map(|i| self.get(i).expect("index in bounds").clone())
            .collect()
    }
}

impl std::fmt::Display for SparseArr {
    /// Compact form: `{default; [i]=v, ...}`. Dense printing would be
    /// unusable for the buffer sizes this type exists for.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}x{}", self.len, self.default)?;
        for (i, v) in self.writes.iter() {
            write!(f, ", [{}]={}", i, v)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Val;

    fn int(n: i32) -> Val {
        Val::i32(n)
    }

    #[test]
    fn test_default_reads() {
        let arr = SparseArr::new(int(0), 96000);
        assert_eq!(arr.len(), 96000);
        assert_eq!(arr.get(0), Some(&int(0)));
        assert_eq!(arr.get(95999), Some(&int(0)));
        assert_eq!(arr.get(96000), None);
        assert_eq!(arr.write_count(), 0);
    }

    #[test]
    fn test_set_and_get() {
        let mut arr = SparseArr::new(int(0), 16);
        assert!(arr.set(3, int(7)));
        assert!(arr.set(9, int(-1)));
        assert!(!arr.set(16, int(5)));
        assert_eq!(arr.get(3), Some(&int(7)));
        assert_eq!(arr.get(4), Some(&int(0)));
        assert_eq!(arr.write_count(), 2);
    }

    #[test]
    fn test_writing_default_clears_override() {
        let mut arr = SparseArr::new(int(0), 8);
        arr.set(2, int(5));
        assert_eq!(arr.write_count(), 1);
        arr.set(2, int(0));
        assert_eq!(arr.write_count(), 0);
        assert_eq!(arr.get(2), Some(&int(0)));
    }

    #[test]
    fn test_slice() {
        let mut arr = SparseArr::new(int(0), 16);
        arr.set(4, int(1));
        arr.set(6, int(2));
        arr.set(12, int(3));
        let s = arr.slice(4, 4).unwrap();
        assert_eq!(s.len(), 4);
        assert_eq!(s.get(0), Some(&int(1)));
        assert_eq!(s.get(2), Some(&int(2)));
        assert_eq!(s.get(3), Some(&int(0)));
        assert_eq!(s.write_count(), 2);
        assert!(arr.slice(14, 4).is_none());
    }

    #[test]
    fn test_write_slice() {
        let mut arr = SparseArr::new(int(0), 16);
        let src = SparseArr::from_elems(int(0), vec![int(9), int(0), int(8)]);
        assert!(arr.write_slice(5, &src));
        assert_eq!(arr.get(5), Some(&int(9)));
        assert_eq!(arr.get(6), Some(&int(0)));
        assert_eq!(arr.get(7), Some(&int(8)));
        assert!(!arr.write_slice(14, &src));
    }

    #[test]
    fn test_ordered_writes_iteration() {
        let mut arr = SparseArr::new(int(0), 32);
        arr.set(20, int(1));
        arr.set(3, int(2));
        arr.set(11, int(3));
        let idx: Vec<usize> = arr.writes().map(|(i, _)| i).collect();
        assert_eq!(idx, vec![3, 11, 20]);
    }

    #[test]
    fn test_display_compact() {
        let mut arr = SparseArr::new(int(0), 8);
        arr.set(1, int(4));
        assert_eq!(arr.to_string(), "{8x0, [1]=4}");
    }
}
