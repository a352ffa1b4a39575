//! Type language for Rill
//!
//! Types are established by the external type checker and carried as
//! annotations on AST nodes; the evaluator and the task splitter consume
//! them but never infer them. Scalars exist at four widths, signed and
//! unsigned, with a dedicated complex family (a pair of equally-wide
//! integers). Array lengths are either static or a length meta-variable
//! the front end could not resolve.

use serde::{Deserialize, Serialize};

/// Width of an integer scalar in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    /// Number of bits.
    pub fn bits(self) -> u32 {
        match self {
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sign {
    Signed,
    Unsigned,
}

/// Array length annotation: a resolved length or a meta-variable left
/// open by the front end (polymorphic array arguments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrLen {
    Static(usize),
    Var(String),
}

impl std::fmt::Display for ArrLen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrLen::Static(n) => write!(f, "{}", n),
            ArrLen::Var(v) => write!(f, "{}", v),
        }
    }
}

/// Scalar and aggregate types of the expression language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    Unit,
    Bit,
    Bool,
    String,
    Double,
    Int(Width, Sign),
    /// Complex integer: a pair of equally-wide signed components
    Complex(Width),
    Arr(ArrLen, Box<Ty>),
    /// Nominal struct with ordered fields
    Struct(String, Vec<(String, Ty)>),
}

/// The names under which the front end declares the complex structs.
/// Struct construction with one of these names collapses to the
/// dedicated complex value tag.
pub const COMPLEX_STRUCT_NAMES: [(&str, Width); 4] = [
    ("complex8", Width::W8),
    ("complex16", Width::W16),
    ("complex32", Width::W32),
    ("complex64", Width::W64),
];

/// Look up the complex width for a struct name, if it is one of the
/// four complex structs.
pub fn complex_struct_width(name: &str) -> Option<Width> {
    COMPLEX_STRUCT_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, w)| *w)
}

impl Ty {
    pub fn int8() -> Ty {
        Ty::Int(Width::W8, Sign::Signed)
    }
    pub fn int16() -> Ty {
        Ty::Int(Width::W16, Sign::Signed)
    }
    pub fn int32() -> Ty {
        Ty::Int(Width::W32, Sign::Signed)
    }
    pub fn int64() -> Ty {
        Ty::Int(Width::W64, Sign::Signed)
    }
    pub fn uint8() -> Ty {
        Ty::Int(Width::W8, Sign::Unsigned)
    }
    pub fn uint16() -> Ty {
        Ty::Int(Width::W16, Sign::Unsigned)
    }
    pub fn uint32() -> Ty {
        Ty::Int(Width::W32, Sign::Unsigned)
    }
    pub fn uint64() -> Ty {
        Ty::Int(Width::W64, Sign::Unsigned)
    }

    pub fn arr(len: usize, elem: Ty) -> Ty {
        Ty::Arr(ArrLen::Static(len), Box::new(elem))
    }

    /// A type is ground when every array length is static and every
    /// struct field is itself ground. Only ground types have an
    /// implicit default value.
    pub fn is_ground(&self) -> bool {
        match self {
            Ty::Arr(ArrLen::Var(_), _) => false,
            Ty::Arr(ArrLen::Static(_), elem) => elem.is_ground(),
            Ty::Struct(_, fields) => fields.iter().all(|(_, t)| t.is_ground()),
            _ => true,
        }
    }

    /// Static array length, when this is an array type with one.
    pub fn static_len(&self) -> Option<usize> {
        match self {
            Ty::Arr(ArrLen::Static(n), _) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ty::Unit => write!(f, "unit"),
            Ty::Bit => write!(f, "bit"),
            Ty::Bool => write!(f, "bool"),
            Ty::String => write!(f, "string"),
            Ty::Double => write!(f, "double"),
            Ty::Int(w, Sign::Signed) => write!(f, "int{}", w.bits()),
            Ty::Int(w, Sign::Unsigned) => write!(f, "uint{}", w.bits()),
            Ty::Complex(w) => write!(f, "complex{}", w.bits()),
            Ty::Arr(len, elem) => write!(f, "arr[{}] {}", len, elem),
            Ty::Struct(name, _) => write!(f, "{}", name),
        }
    }
}

/// Stream shape of a comp: a computer additionally finishes with a value
/// of type `done`, a transformer only pumps elements from `input` to
/// `output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompTy {
    pub done: Option<Ty>,
    pub input: Ty,
    pub output: Ty,
}

impl CompTy {
    pub fn computer(done: Ty, input: Ty, output: Ty) -> CompTy {
        CompTy {
            done: Some(done),
            input,
            output,
        }
    }

    pub fn transformer(input: Ty, output: Ty) -> CompTy {
        CompTy {
            done: None,
            input,
            output,
        }
    }

    pub fn is_computer(&self) -> bool {
        self.done.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Ty::int32().to_string(), "int32");
        assert_eq!(Ty::uint8().to_string(), "uint8");
        assert_eq!(Ty::Complex(Width::W16).to_string(), "complex16");
        assert_eq!(Ty::arr(64, Ty::Complex(Width::W16)).to_string(), "arr[64] complex16");
        assert_eq!(
            Ty::Arr(ArrLen::Var("n".to_string()), Box::new(Ty::Bit)).to_string(),
            "arr[n] bit"
        );
    }

    #[test]
    fn test_groundness() {
        assert!(Ty::arr(8, Ty::Bit).is_ground());
        assert!(!Ty::Arr(ArrLen::Var("n".to_string()), Box::new(Ty::Bit)).is_ground());
        let s = Ty::Struct(
            "hdr".to_string(),
            vec![("len".to_string(), Ty::uint16()), ("crc".to_string(), Ty::uint32())],
        );
        assert!(s.is_ground());
        let s2 = Ty::Struct(
            "frame".to_string(),
            vec![(
                "payload".to_string(),
                Ty::Arr(ArrLen::Var("n".to_string()), Box::new(Ty::Bit)),
            )],
        );
        assert!(!s2.is_ground());
    }

    #[test]
    fn test_complex_struct_names() {
        assert_eq!(complex_struct_width("complex16"), Some(Width::W16));
        assert_eq!(complex_struct_width("hdr"), None);
    }

    #[test]
    fn test_comp_ty() {
        let c = CompTy::computer(Ty::Unit, Ty::Bit, Ty::Bit);
        assert!(c.is_computer());
        let t = CompTy::transformer(Ty::Bit, Ty::Bit);
        assert!(!t.is_computer());
    }
}
