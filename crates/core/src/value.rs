//! Runtime values
//!
//! A value is a closed tagged union: one tag per scalar width, four
//! dedicated complex tags, a sparse array and a nominal struct. The
//! complex family is deliberately not represented as a two-field struct;
//! the operator tables give complex arithmetic its own rules and the
//! dedicated tags keep dispatch a flat match. Every value carries an
//! optional source location which equality ignores.

use crate::loc::SourceLocation;
use crate::sparse::SparseArr;
use crate::types::{ArrLen, Sign, Ty, Width, complex_struct_width};
use serde::{Deserialize, Serialize};

/// A complex integer: two equally-wide signed components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpx<T> {
    pub re: T,
    pub im: T,
}

impl<T> Cpx<T> {
    pub fn new(re: T, im: T) -> Cpx<T> {
        Cpx { re, im }
    }
}

/// The payload of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValKind {
    Unit,
    Bit(bool),
    Bool(bool),
    Str(String),
    Double(f64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    C8(Cpx<i8>),
    C16(Cpx<i16>),
    C32(Cpx<i32>),
    C64(Cpx<i64>),
    Arr(SparseArr),
    /// Nominal struct: type name plus ordered fields
    Struct(String, Vec<(String, Val)>),
}

/// A tagged value with an optional source location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Val {
    pub kind: ValKind,
    pub loc: Option<SourceLocation>,
}

/// Equality on values ignores the attached location.
impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl From<ValKind> for Val {
    fn from(kind: ValKind) -> Val {
        Val { kind, loc: None }
    }
}

impl Val {
    pub fn new(kind: ValKind) -> Val {
        Val { kind, loc: None }
    }

    pub fn with_loc(kind: ValKind, loc: Option<SourceLocation>) -> Val {
        Val { kind, loc }
    }

    /// Same value at a different (usually more precise) location.
    pub fn at(mut self, loc: Option<SourceLocation>) -> Val {
        self.loc = loc;
        self
    }

    pub fn unit() -> Val {
        ValKind::Unit.into()
    }

    pub fn bit(b: bool) -> Val {
        ValKind::Bit(b).into()
    }

    pub fn bool(b: bool) -> Val {
        ValKind::Bool(b).into()
    }

    pub fn str(s: impl Into<String>) -> Val {
        ValKind::Str(s.into()).into()
    }

    pub fn double(d: f64) -> Val {
        ValKind::Double(d).into()
    }

    pub fn i32(n: i32) -> Val {
        ValKind::I32(n).into()
    }

    pub fn arr(a: SparseArr) -> Val {
        ValKind::Arr(a).into()
    }

    /// Integer value of the given width and signedness, truncating the
    /// operand two's-complement style.
    pub fn int_of(width: Width, sign: Sign, n: i128) -> Val {
        mk_int(width, sign, n).into()
    }

    /// Complex value of the given width, truncating both components.
    pub fn complex_of(width: Width, re: i128, im: i128) -> Val {
        mk_complex(width, re, im).into()
    }

    /// Struct construction. The four complex struct names collapse to
    /// the dedicated complex tags; every other name builds a nominal
    /// struct with the fields in the given order.
    pub fn struct_of(name: &str, fields: Vec<(String, Val)>) -> Val {
        if let Some(w) = complex_struct_width(name) {
            let mut re = None;
            let mut im = None;
            for (f, v) in &fields {
                match (f.as_str(), v.as_int()) {
                    ("re", Some(n)) => re = Some(n),
                    ("im", Some(n)) => im = Some(n),
                    _ => {}
                }
            }
            if let (Some(re), Some(im)) = (re, im) {
                return Val::complex_of(w, re as i128, im as i128);
            }
        }
        ValKind::Struct(name.to_string(), fields).into()
    }

    /// Struct field projection. On the complex tags, `re`/`im` project
    /// the matching component at the component width.
    pub fn project(&self, field: &str) -> Option<Val> {
        match &self.kind {
            ValKind::Struct(_, fields) => fields
                .iter()
                .find(|(f, _)| f == field)
                .map(|(_, v)| v.clone()),
            ValKind::C8(c) => complex_component(field, c.re as i128, c.im as i128, Width::W8),
            ValKind::C16(c) => complex_component(field, c.re as i128, c.im as i128, Width::W16),
            ValKind::C32(c) => complex_component(field, c.re as i128, c.im as i128, Width::W32),
            ValKind::C64(c) => complex_component(field, c.re as i128, c.im as i128, Width::W64),
            _ => None,
        }
    }

    /// The integer payload of any integer tag.
    pub fn as_int(&self) -> Option<i64> {
        match self.kind {
            ValKind::I8(n) => Some(n as i64),
            ValKind::I16(n) => Some(n as i64),
            ValKind::I32(n) => Some(n as i64),
            ValKind::I64(n) => Some(n),
            ValKind::U8(n) => Some(n as i64),
            ValKind::U16(n) => Some(n as i64),
            ValKind::U32(n) => Some(n as i64),
            ValKind::U64(n) => i64::try_from(n).ok(),
            _ => None,
        }
    }

    /// Non-negative integer payload, for array indexing.
    pub fn as_index(&self) -> Option<usize> {
        self.as_int().and_then(|n| usize::try_from(n).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            ValKind::Bool(b) | ValKind::Bit(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.kind, ValKind::Unit)
    }

    /// Additive identity of the numeric tags.
    pub fn is_zero(&self) -> bool {
        match &self.kind {
            ValKind::Double(d) => *d == 0.0,
            ValKind::C8(c) => c.re == 0 && c.im == 0,
            ValKind::C16(c) => c.re == 0 && c.im == 0,
            ValKind::C32(c) => c.re == 0 && c.im == 0,
            ValKind::C64(c) => c.re == 0 && c.im == 0,
            _ => self.as_int() == Some(0),
        }
    }

    /// Multiplicative identity of the numeric tags.
    pub fn is_one(&self) -> bool {
        match &self.kind {
            ValKind::Double(d) => *d == 1.0,
            ValKind::C8(c) => c.re == 1 && c.im == 0,
            ValKind::C16(c) => c.re == 1 && c.im == 0,
            ValKind::C32(c) => c.re == 1 && c.im == 0,
            ValKind::C64(c) => c.re == 1 && c.im == 0,
            _ => self.as_int() == Some(1),
        }
    }

    /// The type this value inhabits.
    pub fn ty(&self) -> Ty {
        match &self.kind {
            ValKind::Unit => Ty::Unit,
            ValKind::Bit(_) => Ty::Bit,
            ValKind::Bool(_) => Ty::Bool,
            ValKind::Str(_) => Ty::String,
            ValKind::Double(_) => Ty::Double,
            ValKind::I8(_) => Ty::Int(Width::W8, Sign::Signed),
            ValKind::I16(_) => Ty::Int(Width::W16, Sign::Signed),
            ValKind::I32(_) => Ty::Int(Width::W32, Sign::Signed),
            ValKind::I64(_) => Ty::Int(Width::W64, Sign::Signed),
            ValKind::U8(_) => Ty::Int(Width::W8, Sign::Unsigned),
            ValKind::U16(_) => Ty::Int(Width::W16, Sign::Unsigned),
            ValKind::U32(_) => Ty::Int(Width::W32, Sign::Unsigned),
            ValKind::U64(_) => Ty::Int(Width::W64, Sign::Unsigned),
            ValKind::C8(_) => Ty::Complex(Width::W8),
            ValKind::C16(_) => Ty::Complex(Width::W16),
            ValKind::C32(_) => Ty::Complex(Width::W32),
            ValKind::C64(_) => Ty::Complex(Width::W64),
            ValKind::Arr(a) => Ty::Arr(
                ArrLen::Static(a.len()),
                Box::new(a.default_elem().ty()),
            ),
            ValKind::Struct(name, fields) => Ty::Struct(
                name.clone(),
                fields.iter().map(|(f, v)| (f.clone(), v.ty())).collect(),
            ),
        }
    }

    /// Abstract size, feeding the evaluator's per-variable statistics:
    /// 1 per scalar, 2 per complex, sum over struct fields, and for
    /// arrays element-size times the number of non-default entries.
    pub fn size(&self) -> usize {
        match &self.kind {
            ValKind::C8(_) | ValKind::C16(_) | ValKind::C32(_) | ValKind::C64(_) => 2,
            ValKind::Struct(_, fields) => fields.iter().map(|(_, v)| v.size()).sum(),
            ValKind::Arr(a) => a.default_elem().size() * a.write_count(),
            _ => 1,
        }
    }

    /// The zero/false/empty default a `var` binding of type `ty` starts
    /// at when no explicit initialiser is given. `None` when the type is
    /// not ground, or when a static array length exceeds `arr_cap` (the
    /// binding is then un-eliminable and left to the code generator).
    pub fn implicit_default(ty: &Ty, arr_cap: usize) -> Option<Val> {
        let kind = match ty {
            Ty::Unit => ValKind::Unit,
            Ty::Bit => ValKind::Bit(false),
            Ty::Bool => ValKind::Bool(false),
            Ty::String => ValKind::Str(String::new()),
            Ty::Double => ValKind::Double(0.0),
            Ty::Int(w, s) => mk_int(*w, *s, 0),
            Ty::Complex(w) => mk_complex(*w, 0, 0),
            Ty::Arr(ArrLen::Static(n), elem) => {
                if *n > arr_cap {
                    return None;
                }
                let d = Val::implicit_default(elem, arr_cap)?;
                ValKind::Arr(SparseArr::new(d, *n))
            }
            Ty::Arr(ArrLen::Var(_), _) => return None,
            Ty::Struct(name, fields) => {
                let fs = fields
                    .iter()
                    .map(|(f, t)| Val::implicit_default(t, arr_cap).map(|v| (f.clone(), v)))
                    .collect::<Option<Vec<_>>>()?;
                return Some(Val::struct_of(name, fs));
            }
        };
        Some(kind.into())
    }
}

fn complex_component(field: &str, re: i128, im: i128, w: Width) -> Option<Val> {
    match field {
        "re" => Some(Val::int_of(w, Sign::Signed, re)),
        "im" => Some(Val::int_of(w, Sign::Signed, im)),
        _ => None,
    }
}

/// Truncate `n` two's-complement style into an integer tag of the given
/// width and signedness.
pub fn mk_int(width: Width, sign: Sign, n: i128) -> ValKind {
    match (width, sign) {
        (Width::W8, Sign::Signed) => ValKind::I8(n as i8),
        (Width::W16, Sign::Signed) => ValKind::I16(n as i16),
        (Width::W32, Sign::Signed) => ValKind::I32(n as i32),
        (Width::W64, Sign::Signed) => ValKind::I64(n as i64),
        (Width::W8, Sign::Unsigned) => ValKind::U8(n as u8),
        (Width::W16, Sign::Unsigned) => ValKind::U16(n as u16),
        (Width::W32, Sign::Unsigned) => ValKind::U32(n as u32),
        (Width::W64, Sign::Unsigned) => ValKind::U64(n as u64),
    }
}

/// Truncate both components into a complex tag of the given width.
pub fn mk_complex(width: Width, re: i128, im: i128) -> ValKind {
    match width {
        Width::W8 => ValKind::C8(Cpx::new(re as i8, im as i8)),
        Width::W16 => ValKind::C16(Cpx::new(re as i16, im as i16)),
        Width::W32 => ValKind::C32(Cpx::new(re as i32, im as i32)),
        Width::W64 => ValKind::C64(Cpx::new(re as i64, im as i64)),
    }
}

impl std::fmt::Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ValKind::Unit => write!(f, "()"),
            ValKind::Bit(b) => write!(f, "{}", if *b { "'1" } else { "'0" }),
            ValKind::Bool(b) => write!(f, "{}", b),
            ValKind::Str(s) => write!(f, "{:?}", s),
            ValKind::Double(d) => write!(f, "{}", d),
            ValKind::I8(n) => write!(f, "{}", n),
            ValKind::I16(n) => write!(f, "{}", n),
            ValKind::I32(n) => write!(f, "{}", n),
            ValKind::I64(n) => write!(f, "{}", n),
            ValKind::U8(n) => write!(f, "{}", n),
            ValKind::U16(n) => write!(f, "{}", n),
            ValKind::U32(n) => write!(f, "{}", n),
            ValKind::U64(n) => write!(f, "{}", n),
            ValKind::C8(c) => write!(f, "{}{:+}i", c.re, c.im),
            ValKind::C16(c) => write!(f, "{}{:+}i", c.re, c.im),
            ValKind::C32(c) => write!(f, "{}{:+}i", c.re, c.im),
            ValKind::C64(c) => write!(f, "{}{:+}i", c.re, c.im),
            ValKind::Arr(a) => write!(f, "{}", a),
            ValKind::Struct(name, fields) => {
                write!(f, "{}{{", name)?;
                for (i, (field, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", field, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_eq_ignores_location() {
        let a = Val::i32(7);
        let b = Val::i32(7).at(Some(SourceLocation::new(PathBuf::from("a.rl"), 3)));
        assert_eq!(a, b);
        assert_ne!(a, Val::i32(8));
    }

    #[test]
    fn test_complex_struct_collapses() {
        let v = Val::struct_of(
            "complex16",
            vec![
                ("re".to_string(), Val::new(ValKind::I16(3))),
                ("im".to_string(), Val::new(ValKind::I16(-4))),
            ],
        );
        assert_eq!(v.kind, ValKind::C16(Cpx::new(3, -4)));
        assert_eq!(v.project("re"), Some(Val::new(ValKind::I16(3))));
        assert_eq!(v.project("im"), Some(Val::new(ValKind::I16(-4))));
    }

    #[test]
    fn test_plain_struct_projection() {
        let v = Val::struct_of(
            "hdr",
            vec![
                ("len".to_string(), Val::new(ValKind::U16(12))),
                ("crc".to_string(), Val::new(ValKind::U32(9))),
            ],
        );
        assert_eq!(v.project("crc"), Some(Val::new(ValKind::U32(9))));
        assert_eq!(v.project("nope"), None);
    }

    #[test]
    fn test_int_truncation() {
        assert_eq!(Val::int_of(Width::W8, Sign::Signed, 300).kind, ValKind::I8(44));
        assert_eq!(Val::int_of(Width::W8, Sign::Unsigned, -1).kind, ValKind::U8(255));
        assert_eq!(
            Val::int_of(Width::W16, Sign::Signed, -70000).kind,
            ValKind::I16(-4464)
        );
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Val::i32(1).size(), 1);
        assert_eq!(Val::complex_of(Width::W16, 1, 2).size(), 2);
        let mut arr = SparseArr::new(Val::complex_of(Width::W16, 0, 0), 96000);
        arr.set(5, Val::complex_of(Width::W16, 1, 1));
        arr.set(17, Val::complex_of(Width::W16, 2, 2));
        assert_eq!(Val::arr(arr).size(), 4);
        let s = Val::struct_of(
            "hdr",
            vec![
                ("a".to_string(), Val::i32(0)),
                ("b".to_string(), Val::complex_of(Width::W32, 0, 0)),
            ],
        );
        assert_eq!(s.size(), 3);
    }

    #[test]
    fn test_implicit_defaults() {
        assert_eq!(Val::implicit_default(&Ty::Bool, 2048), Some(Val::bool(false)));
        assert_eq!(
            Val::implicit_default(&Ty::int32(), 2048),
            Some(Val::i32(0))
        );
        let arr = Val::implicit_default(&Ty::arr(16, Ty::Bit), 2048).unwrap();
        match arr.kind {
            ValKind::Arr(a) => {
                assert_eq!(a.len(), 16);
                assert_eq!(a.write_count(), 0);
            }
            other => panic!("expected array default, got {:?}", other),
        }
        // over the cap: no default, the binding stays un-eliminable
        assert_eq!(Val::implicit_default(&Ty::arr(4096, Ty::Bit), 2048), None);
        // non-ground: no default
        let open = Ty::Arr(ArrLen::Var("n".to_string()), Box::new(Ty::Bit));
        assert_eq!(Val::implicit_default(&open, 2048), None);
    }

    #[test]
    fn test_value_type() {
        assert_eq!(Val::i32(3).ty(), Ty::int32());
        assert_eq!(Val::complex_of(Width::W8, 0, 0).ty(), Ty::Complex(Width::W8));
        let arr = Val::arr(SparseArr::new(Val::bit(false), 8));
        assert_eq!(arr.ty(), Ty::arr(8, Ty::Bit));
    }
}
