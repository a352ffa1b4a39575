//! Operator and cast semantics
//!
//! The meaning of every unary/binary operator and cast over the value
//! model, as pure partial functions. `None` means the operator does not
//! apply to the given tags; the evaluator decides whether that is a
//! fatal type error (full evaluation — the type checker upstream should
//! have ruled it out) or grounds for residualising (partial evaluation).
//!
//! Integer arithmetic is wrapping two's-complement at the operand
//! width. All widths are normalised through `i128` so one code path
//! serves the eight integer tags; `mk_int` re-truncates to the
//! destination tag.

use crate::types::{Sign, Ty, Width};
use crate::value::{Val, ValKind, mk_complex, mk_int};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Expon,
    ShL,
    ShR,
    BwAnd,
    BwOr,
    BwXor,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Leq | BinOp::Gt | BinOp::Geq
        )
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Expon => "**",
            BinOp::ShL => "<<",
            BinOp::ShR => ">>",
            BinOp::BwAnd => "&",
            BinOp::BwOr => "|",
            BinOp::BwXor => "^",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Leq => "<=",
            BinOp::Gt => ">",
            BinOp::Geq => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum UnOp {
    Neg,
    Not,
    BwNeg,
    Cast(Ty),
    /// Array length
    Len,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "!"),
            UnOp::BwNeg => write!(f, "~"),
            UnOp::Cast(ty) => write!(f, "{}", ty),
            UnOp::Len => write!(f, "length"),
        }
    }
}

/// Integer payload normalised to `i128`, with its tag.
fn int_parts(v: &Val) -> Option<(Width, Sign, i128)> {
    match v.kind {
        ValKind::I8(n) => Some((Width::W8, Sign::Signed, n as i128)),
        ValKind::I16(n) => Some((Width::W16, Sign::Signed, n as i128)),
        ValKind::I32(n) => Some((Width::W32, Sign::Signed, n as i128)),
        ValKind::I64(n) => Some((Width::W64, Sign::Signed, n as i128)),
        ValKind::U8(n) => Some((Width::W8, Sign::Unsigned, n as i128)),
        ValKind::U16(n) => Some((Width::W16, Sign::Unsigned, n as i128)),
        ValKind::U32(n) => Some((Width::W32, Sign::Unsigned, n as i128)),
        ValKind::U64(n) => Some((Width::W64, Sign::Unsigned, n as i128)),
        _ => None,
    }
}

fn complex_parts(v: &Val) -> Option<(Width, i128, i128)> {
    match v.kind {
        ValKind::C8(c) => Some((Width::W8, c.re as i128, c.im as i128)),
        ValKind::C16(c) => Some((Width::W16, c.re as i128, c.im as i128)),
        ValKind::C32(c) => Some((Width::W32, c.re as i128, c.im as i128)),
        ValKind::C64(c) => Some((Width::W64, c.re as i128, c.im as i128)),
        _ => None,
    }
}

/// Apply a binary operator. `None` when the operator does not cover the
/// operand tags (or the divisor is zero, which the generated program
/// must fault on at runtime, not here).
pub fn bin_op(op: BinOp, lhs: &Val, rhs: &Val) -> Option<Val> {
    use BinOp::*;
    match op {
        Add | Sub | Mul | Div | Rem | Expon => arith(op, lhs, rhs),
        ShL | ShR => shift(op, lhs, rhs),
        BwAnd | BwOr | BwXor => bitwise(op, lhs, rhs),
        Eq | Neq => {
            if lhs.ty() != rhs.ty() {
                return None;
            }
            let eq = lhs == rhs;
            Some(Val::bool(if op == Eq { eq } else { !eq }))
        }
        Lt | Leq | Gt | Geq => ordering(op, lhs, rhs),
        And | Or => match (&lhs.kind, &rhs.kind) {
            (ValKind::Bool(a), ValKind::Bool(b)) => Some(Val::bool(logic(op, *a, *b))),
            (ValKind::Bit(a), ValKind::Bit(b)) => Some(Val::bit(logic(op, *a, *b))),
            _ => None,
        },
    }
}

fn logic(op: BinOp, a: bool, b: bool) -> bool {
    match op {
        BinOp::And => a && b,
        BinOp::Or => a || b,
        _ => unreachable!("logic: not a boolean operator"),
    }
}

fn arith(op: BinOp, lhs: &Val, rhs: &Val) -> Option<Val> {
    use BinOp::*;
    if let (Some((w, s, a)), Some((w2, s2, b))) = (int_parts(lhs), int_parts(rhs)) {
        if (w, s) != (w2, s2) {
            return None;
        }
        let n = match op {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Div => {
                if b == 0 {
                    return None;
                }
                a / b
            }
            Rem => {
                if b == 0 {
                    return None;
                }
                a % b
            }
            Expon => return None,
            _ => unreachable!("arith: not an arithmetic operator"),
        };
        return Some(mk_int(w, s, n).into());
    }
    if let (ValKind::Double(a), ValKind::Double(b)) = (&lhs.kind, &rhs.kind) {
        let d = match op {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Div => a / b,
            Expon => a.powf(*b),
            Rem => return None,
            _ => unreachable!("arith: not an arithmetic operator"),
        };
        return Some(Val::double(d));
    }
    if let (Some((w, a, b)), Some((w2, c, d))) = (complex_parts(lhs), complex_parts(rhs)) {
        if w != w2 {
            return None;
        }
        let kind = match op {
            Add => mk_complex(w, a + c, b + d),
            Sub => mk_complex(w, a - c, b - d),
            Mul => mk_complex(w, a * c - b * d, b * c + a * d),
            Div => {
                // (a+bi)/(c+di) = (ac+bd)/(c^2+d^2) + ((bc-ad)/(c^2+d^2))i,
                // both quotients truncated toward zero
                let denom = c * c + d * d;
                if denom == 0 {
                    return None;
                }
                mk_complex(w, (a * c + b * d) / denom, (b * c - a * d) / denom)
            }
            _ => return None,
        };
        return Some(kind.into());
    }
    None
}

/// Shifts: the result width follows the left operand; the shift amount
/// is read as an integer whatever its width. A negative right-shift
/// shifts left by the absolute value, and symmetrically for left
/// shifts.
fn shift(op: BinOp, lhs: &Val, rhs: &Val) -> Option<Val> {
    let (w, s, a) = int_parts(lhs)?;
    let k = rhs.as_int()?;
    let (left, k) = match (op, k < 0) {
        (BinOp::ShL, false) => (true, k as u32),
        (BinOp::ShL, true) => (false, k.unsigned_abs() as u32),
        (BinOp::ShR, false) => (false, k as u32),
        (BinOp::ShR, true) => (true, k.unsigned_abs() as u32),
        _ => unreachable!("shift: not a shift operator"),
    };
    let n = if left {
        if k >= w.bits() {
            0
        } else {
            a << k
        }
    } else {
        // arithmetic shift; normalised unsigned payloads are
        // non-negative so this is logical for them
        a >> k.min(127)
    };
    Some(mk_int(w, s, n).into())
}

fn bitwise(op: BinOp, lhs: &Val, rhs: &Val) -> Option<Val> {
    if let (Some((w, s, a)), Some((w2, s2, b))) = (int_parts(lhs), int_parts(rhs)) {
        if (w, s) != (w2, s2) {
            return None;
        }
        let n = match op {
            BinOp::BwAnd => a & b,
            BinOp::BwOr => a | b,
            BinOp::BwXor => a ^ b,
            _ => unreachable!("bitwise: not a bitwise operator"),
        };
        return Some(mk_int(w, s, n).into());
    }
    match (&lhs.kind, &rhs.kind) {
        (ValKind::Bit(a), ValKind::Bit(b)) => Some(Val::bit(bit_logic(op, *a, *b))),
        (ValKind::Bool(a), ValKind::Bool(b)) => Some(Val::bool(bit_logic(op, *a, *b))),
        _ => None,
    }
}

fn bit_logic(op: BinOp, a: bool, b: bool) -> bool {
    match op {
        BinOp::BwAnd => a & b,
        BinOp::BwOr => a | b,
        BinOp::BwXor => a ^ b,
        _ => unreachable!("bit_logic: not a bitwise operator"),
    }
}

fn ordering(op: BinOp, lhs: &Val, rhs: &Val) -> Option<Val> {
    use std::cmp::Ordering;
    let ord = if let (Some((w, s, a)), Some((w2, s2, b))) = (int_parts(lhs), int_parts(rhs)) {
        if (w, s) != (w2, s2) {
            return None;
        }
        a.cmp(&b)
    } else {
        match (&lhs.kind, &rhs.kind) {
            (ValKind::Double(a), ValKind::Double(b)) => a.partial_cmp(b)?,
            (ValKind::Str(a), ValKind::Str(b)) => a.cmp(b),
            (ValKind::Bit(a), ValKind::Bit(b)) => a.cmp(b),
            (ValKind::Bool(a), ValKind::Bool(b)) => a.cmp(b),
            _ => return None,
        }
    };
    let b = match op {
        BinOp::Lt => ord == Ordering::Less,
        BinOp::Leq => ord != Ordering::Greater,
        BinOp::Gt => ord == Ordering::Greater,
        BinOp::Geq => ord != Ordering::Less,
        _ => unreachable!("ordering: not a comparison operator"),
    };
    Some(Val::bool(b))
}

/// Apply a unary operator.
pub fn un_op(op: &UnOp, v: &Val) -> Option<Val> {
    match op {
        UnOp::Neg => {
            if let Some((w, s, n)) = int_parts(v) {
                return Some(mk_int(w, s, -n).into());
            }
            if let ValKind::Double(d) = v.kind {
                return Some(Val::double(-d));
            }
            let (w, re, im) = complex_parts(v)?;
            Some(mk_complex(w, -re, -im).into())
        }
        UnOp::Not => v.as_bool().map(|b| match v.kind {
            ValKind::Bit(_) => Val::bit(!b),
            _ => Val::bool(!b),
        }),
        UnOp::BwNeg => {
            if let Some((w, s, n)) = int_parts(v) {
                return Some(mk_int(w, s, !n).into());
            }
            match v.kind {
                ValKind::Bit(b) => Some(Val::bit(!b)),
                ValKind::Bool(b) => Some(Val::bool(!b)),
                _ => None,
            }
        }
        UnOp::Cast(ty) => cast_val(ty, v),
        UnOp::Len => match &v.kind {
            ValKind::Arr(a) => Some(Val::i32(i32::try_from(a.len()).ok()?)),
            _ => None,
        },
    }
}

/// Cast a value to `to`. `None` for unsupported (source, target) pairs,
/// which the evaluator residualises.
pub fn cast_val(to: &Ty, v: &Val) -> Option<Val> {
    match to {
        Ty::Int(w, s) => {
            if let Some((_, _, n)) = int_parts(v) {
                return Some(mk_int(*w, *s, n).into());
            }
            match v.kind {
                ValKind::Bit(b) | ValKind::Bool(b) => {
                    Some(mk_int(*w, *s, if b { 1 } else { 0 }).into())
                }
                // truncation toward zero
                ValKind::Double(d) => Some(mk_int(*w, *s, d as i128).into()),
                _ => None,
            }
        }
        Ty::Bit => cast_truth(v).map(Val::bit),
        Ty::Bool => cast_truth(v).map(Val::bool),
        Ty::Double => match v.kind {
            ValKind::Double(d) => Some(Val::double(d)),
            _ => int_parts(v).map(|(_, _, n)| Val::double(n as f64)),
        },
        Ty::Complex(w) => {
            if let Some((_, re, im)) = complex_parts(v) {
                return Some(mk_complex(*w, re, im).into());
            }
            // promote an integer to a purely real complex
            int_parts(v).map(|(_, _, n)| mk_complex(*w, n, 0).into())
        }
        Ty::String => {
            let s = match &v.kind {
                ValKind::Double(d) => d.to_string(),
                ValKind::Bool(b) => b.to_string(),
                ValKind::Bit(b) => if *b { "1" } else { "0" }.to_string(),
                ValKind::Str(s) => s.clone(),
                _ => int_parts(v)?.2.to_string(),
            };
            Some(Val::str(s))
        }
        _ => None,
    }
}

fn cast_truth(v: &Val) -> Option<bool> {
    match v.kind {
        ValKind::Bit(b) | ValKind::Bool(b) => Some(b),
        _ => int_parts(v).map(|(_, _, n)| n != 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Cpx;

    fn i16v(n: i16) -> Val {
        Val::new(ValKind::I16(n))
    }

    fn u8v(n: u8) -> Val {
        Val::new(ValKind::U8(n))
    }

    #[test]
    fn test_wrapping_add() {
        let r = bin_op(BinOp::Add, &u8v(200), &u8v(100)).unwrap();
        assert_eq!(r.kind, ValKind::U8(44));
        let r = bin_op(BinOp::Add, &i16v(i16::MAX), &i16v(1)).unwrap();
        assert_eq!(r.kind, ValKind::I16(i16::MIN));
    }

    #[test]
    fn test_mixed_width_is_not_applicable() {
        assert!(bin_op(BinOp::Add, &u8v(1), &i16v(1)).is_none());
    }

    #[test]
    fn test_signed_div_truncates_toward_zero() {
        let r = bin_op(BinOp::Div, &i16v(-7), &i16v(2)).unwrap();
        assert_eq!(r.kind, ValKind::I16(-3));
        let r = bin_op(BinOp::Rem, &i16v(-7), &i16v(2)).unwrap();
        assert_eq!(r.kind, ValKind::I16(-1));
        assert!(bin_op(BinOp::Div, &i16v(1), &i16v(0)).is_none());
    }

    #[test]
    fn test_complex_mul_div() {
        let a = Val::complex_of(Width::W32, 3, 4);
        let b = Val::complex_of(Width::W32, 1, 2);
        let m = bin_op(BinOp::Mul, &a, &b).unwrap();
        assert_eq!(m.kind, ValKind::C32(Cpx::new(-5, 10)));
        let d = bin_op(BinOp::Div, &a, &b).unwrap();
        // (3*1+4*2)/5 = 2, (4*1-3*2)/5 = 0 (truncated)
        assert_eq!(d.kind, ValKind::C32(Cpx::new(2, 0)));
    }

    #[test]
    fn test_shift_width_follows_left_operand() {
        let r = bin_op(BinOp::ShL, &u8v(0b0101_0000), &Val::i32(2)).unwrap();
        assert_eq!(r.kind, ValKind::U8(0b0100_0000));
        let r = bin_op(BinOp::ShR, &i16v(-8), &Val::new(ValKind::U8(1))).unwrap();
        assert_eq!(r.kind, ValKind::I16(-4));
    }

    #[test]
    fn test_negative_shift_reverses_direction() {
        let r = bin_op(BinOp::ShR, &u8v(1), &Val::i32(-3)).unwrap();
        assert_eq!(r.kind, ValKind::U8(8));
        let r = bin_op(BinOp::ShL, &u8v(8), &Val::i32(-3)).unwrap();
        assert_eq!(r.kind, ValKind::U8(1));
    }

    #[test]
    fn test_string_ordering_is_lexicographic() {
        let r = bin_op(BinOp::Lt, &Val::str("alpha"), &Val::str("beta")).unwrap();
        assert_eq!(r, Val::bool(true));
    }

    #[test]
    fn test_eq_requires_matching_types() {
        assert!(bin_op(BinOp::Eq, &u8v(1), &i16v(1)).is_none());
        let r = bin_op(BinOp::Neq, &u8v(1), &u8v(2)).unwrap();
        assert_eq!(r, Val::bool(true));
    }

    #[test]
    fn test_cast_matrix() {
        // integer -> bool: nonzero maps to true
        assert_eq!(cast_val(&Ty::Bool, &i16v(-3)), Some(Val::bool(true)));
        assert_eq!(cast_val(&Ty::Bit, &i16v(0)), Some(Val::bit(false)));
        // bool -> integer
        assert_eq!(
            cast_val(&Ty::uint32(), &Val::bool(true)),
            Some(Val::new(ValKind::U32(1)))
        );
        // width change: two's-complement truncation
        assert_eq!(
            cast_val(&Ty::uint8(), &Val::i32(-1)),
            Some(Val::new(ValKind::U8(255)))
        );
        // sign extension through the normalised payload
        assert_eq!(
            cast_val(&Ty::int32(), &Val::new(ValKind::I8(-5))),
            Some(Val::i32(-5))
        );
        // double -> integer truncates toward zero
        assert_eq!(cast_val(&Ty::int32(), &Val::double(-2.9)), Some(Val::i32(-2)));
        // element-wise complex cast
        assert_eq!(
            cast_val(&Ty::Complex(Width::W8), &Val::complex_of(Width::W32, 300, -1)),
            Some(Val::complex_of(Width::W8, 44, -1))
        );
        // decimal string rendering
        assert_eq!(cast_val(&Ty::String, &Val::i32(42)), Some(Val::str("42")));
        // unsupported pair
        assert!(cast_val(&Ty::int32(), &Val::str("42")).is_none());
    }

    #[test]
    fn test_cast_idempotent() {
        let x = Val::i32(1000);
        let once = cast_val(&Ty::uint8(), &x).unwrap();
        let twice = cast_val(&Ty::uint8(), &once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unary() {
        assert_eq!(un_op(&UnOp::Neg, &i16v(5)).unwrap().kind, ValKind::I16(-5));
        assert_eq!(un_op(&UnOp::Not, &Val::bool(true)), Some(Val::bool(false)));
        assert_eq!(un_op(&UnOp::BwNeg, &u8v(0b1111_0000)).unwrap().kind, ValKind::U8(0b0000_1111));
        let arr = Val::arr(crate::sparse::SparseArr::new(Val::bit(false), 48));
        assert_eq!(un_op(&UnOp::Len, &arr), Some(Val::i32(48)));
    }
}
