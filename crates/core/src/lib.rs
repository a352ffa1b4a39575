//! Rill Core: the value-model foundation of the Rill compiler
//!
//! This crate provides the pieces shared by every pass that manipulates
//! constants: the evaluator folds with them, the code generator emits
//! them, diagnostics print them. It has no opinion about ASTs.
//!
//! Key design principles:
//! - Val: a closed tagged union, one tag per scalar width plus dedicated
//!   complex tags; operator dispatch is an exhaustive match, missing
//!   cases denote type errors caught upstream
//! - SparseArr: fixed-length arrays as default + overrides, because
//!   physical-layer scratch buffers are huge and mostly uniform
//! - ops: pure partial functions giving every operator and cast its
//!   meaning; `None` means "not applicable to these tags"
//!
//! # Modules
//!
//! - `loc`: source locations carried on values and AST nodes
//! - `types`: the erased-but-annotated type language
//! - `sparse`: the sparse fixed-length array representation
//! - `value`: the Val tagged union and conversions
//! - `ops`: unary/binary operator and cast semantics

pub mod loc;
pub mod ops;
pub mod sparse;
pub mod types;
pub mod value;

// Re-export key types and functions
pub use loc::{SourceLocation, loc_prefix};
pub use ops::{BinOp, UnOp, bin_op, cast_val, un_op};
pub use sparse::SparseArr;
pub use types::{ArrLen, CompTy, Sign, Ty, Width, complex_struct_width};
pub use value::{Cpx, Val, ValKind};
