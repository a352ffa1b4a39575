//! Expression AST for Rill
//!
//! The scalar expression language the evaluator walks. Nodes arrive from
//! the external front end already typed: every node carries the type the
//! checker gave it plus an optional source location. Nodes are immutable
//! once constructed; each pass builds new trees.
//!
//! Equality on expressions ignores locations, like equality on values.
//! The `Display` rendering is location-free and canonical; the evaluator
//! keys its guess stores on it.

use rill_core::loc::SourceLocation;
use rill_core::ops::{BinOp, UnOp};
use rill_core::types::Ty;
use rill_core::value::Val;
use serde::{Deserialize, Serialize};

/// Index modes of an array read or write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceKind {
    /// One element
    Single,
    /// A slice of statically known length
    Fixed(usize),
    /// A slice whose length is a meta-variable the front end left open
    Meta(String),
}

/// Binding-site inlining directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InlineHint {
    Auto,
    /// Substitute the initialiser into the body instead of evaluating it
    /// at the binding site
    Force,
    Never,
}

/// Loop unrolling directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnrollHint {
    Auto,
    Unroll,
    NoUnroll,
}

/// A typed expression node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exp {
    pub kind: Box<ExpKind>,
    pub ty: Ty,
    pub loc: Option<SourceLocation>,
}

/// Equality ignores locations.
impl PartialEq for Exp {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.kind == other.kind
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpKind {
    Lit(Val),
    Var(String),
    ArrLit(Vec<Exp>),
    ArrRead {
        base: Exp,
        index: Exp,
        slice: SliceKind,
    },
    /// Distinct from `Assign` of an `ArrRead`: the code generator emits
    /// the two differently (issue #88), so the distinction must survive
    /// partial evaluation.
    ArrWrite {
        base: Exp,
        index: Exp,
        slice: SliceKind,
        value: Exp,
    },
    StructNew {
        name: String,
        fields: Vec<(String, Exp)>,
    },
    Proj {
        base: Exp,
        field: String,
    },
    Un {
        op: UnOp,
        arg: Exp,
    },
    Bin {
        op: BinOp,
        lhs: Exp,
        rhs: Exp,
    },
    Let {
        var: String,
        inline: InlineHint,
        def: Exp,
        body: Exp,
    },
    /// Mutable-variable binding. `ty` is the variable's declared type
    /// (the node's own type is the body's).
    LetRef {
        var: String,
        ty: Ty,
        init: Option<Exp>,
        body: Exp,
    },
    Assign {
        lhs: Exp,
        rhs: Exp,
    },
    Seq {
        first: Exp,
        second: Exp,
    },
    Cond {
        cond: Exp,
        then_e: Exp,
        else_e: Exp,
    },
    For {
        var: String,
        start: Exp,
        count: Exp,
        unroll: UnrollHint,
        body: Exp,
    },
    While {
        cond: Exp,
        body: Exp,
    },
    /// External call: opaque to the evaluator
    Call {
        func: String,
        args: Vec<Exp>,
    },
    Print {
        newline: bool,
        args: Vec<Exp>,
    },
    Error {
        msg: String,
    },
    /// Lookup-table marker left by the LUT extractor; not interpretable
    Lut(Exp),
}

impl Exp {
    pub fn new(kind: ExpKind, ty: Ty) -> Exp {
        Exp {
            kind: Box::new(kind),
            ty,
            loc: None,
        }
    }

    pub fn with_loc(kind: ExpKind, ty: Ty, loc: Option<SourceLocation>) -> Exp {
        Exp {
            kind: Box::new(kind),
            ty,
            loc,
        }
    }

    /// Same expression at a different location.
    pub fn at(mut self, loc: Option<SourceLocation>) -> Exp {
        self.loc = loc;
        self
    }

    /// Literal node for a value. Total and injective up to location:
    /// this is the value model's conversion back into the AST.
    pub fn lit(v: Val) -> Exp {
        let ty = v.ty();
        let loc = v.loc.clone();
        Exp::with_loc(ExpKind::Lit(v), ty, loc)
    }

    pub fn unit() -> Exp {
        Exp::lit(Val::unit())
    }

    pub fn i32(n: i32) -> Exp {
        Exp::lit(Val::i32(n))
    }

    pub fn bool(b: bool) -> Exp {
        Exp::lit(Val::bool(b))
    }

    pub fn var(name: impl Into<String>, ty: Ty) -> Exp {
        Exp::new(ExpKind::Var(name.into()), ty)
    }

    pub fn bin(op: BinOp, lhs: Exp, rhs: Exp, ty: Ty) -> Exp {
        Exp::new(ExpKind::Bin { op, lhs, rhs }, ty)
    }

    pub fn un(op: UnOp, arg: Exp, ty: Ty) -> Exp {
        Exp::new(ExpKind::Un { op, arg }, ty)
    }

    pub fn seq(first: Exp, second: Exp) -> Exp {
        let ty = second.ty.clone();
        Exp::new(ExpKind::Seq { first, second }, ty)
    }

    pub fn assign(lhs: Exp, rhs: Exp) -> Exp {
        Exp::new(ExpKind::Assign { lhs, rhs }, Ty::Unit)
    }

    pub fn arr_write(base: Exp, index: Exp, slice: SliceKind, value: Exp) -> Exp {
        Exp::new(
            ExpKind::ArrWrite {
                base,
                index,
                slice,
                value,
            },
            Ty::Unit,
        )
    }

    /// The literal payload, when this is a literal node.
    pub fn as_val(&self) -> Option<&Val> {
        match &*self.kind {
            ExpKind::Lit(v) => Some(v),
            _ => None,
        }
    }

    /// Does `name` occur free in this expression?
    pub fn mentions_var(&self, name: &str) -> bool {
        match &*self.kind {
            ExpKind::Lit(_) | ExpKind::Error { .. } => false,
            ExpKind::Var(v) => v == name,
            ExpKind::ArrLit(es) => es.iter().any(|e| e.mentions_var(name)),
            ExpKind::ArrRead { base, index, .. } => {
                base.mentions_var(name) || index.mentions_var(name)
            }
            ExpKind::ArrWrite {
                base,
                index,
                value,
                ..
            } => {
                base.mentions_var(name) || index.mentions_var(name) || value.mentions_var(name)
            }
            ExpKind::StructNew { fields, .. } => {
                fields.iter().any(|(_, e)| e.mentions_var(name))
            }
            ExpKind::Proj { base, .. } => base.mentions_var(name),
            ExpKind::Un { arg, .. } => arg.mentions_var(name),
            ExpKind::Bin { lhs, rhs, .. } => lhs.mentions_var(name) || rhs.mentions_var(name),
            ExpKind::Let { var, def, body, .. } => {
                def.mentions_var(name) || (var != name && body.mentions_var(name))
            }
            ExpKind::LetRef {
                var, init, body, ..
            } => {
                init.as_ref().is_some_and(|e| e.mentions_var(name))
                    || (var != name && body.mentions_var(name))
            }
            ExpKind::Assign { lhs, rhs } => lhs.mentions_var(name) || rhs.mentions_var(name),
            ExpKind::Seq { first, second } => {
                first.mentions_var(name) || second.mentions_var(name)
            }
            ExpKind::Cond {
                cond,
                then_e,
                else_e,
            } => {
                cond.mentions_var(name)
                    || then_e.mentions_var(name)
                    || else_e.mentions_var(name)
            }
            ExpKind::For {
                var,
                start,
                count,
                body,
                ..
            } => {
                start.mentions_var(name)
                    || count.mentions_var(name)
                    || (var != name && body.mentions_var(name))
            }
            ExpKind::While { cond, body } => cond.mentions_var(name) || body.mentions_var(name),
            ExpKind::Call { args, .. } | ExpKind::Print { args, .. } => {
                args.iter().any(|e| e.mentions_var(name))
            }
            ExpKind::Lut(e) => e.mentions_var(name),
        }
    }

    /// Substitute `rep` for every free occurrence of `name`. The front
    /// end gives bindings unique names, but shadowing binders still stop
    /// the walk for safety.
    pub fn subst(&self, name: &str, rep: &Exp) -> Exp {
        let kind = match &*self.kind {
            ExpKind::Var(v) if v == name => return rep.clone(),
            k @ (ExpKind::Lit(_) | ExpKind::Var(_) | ExpKind::Error { .. }) => k.clone(),
            ExpKind::ArrLit(es) => {
                ExpKind::ArrLit(es.iter().map(|e| e.subst(name, rep)).collect())
            }
            ExpKind::ArrRead { base, index, slice } => ExpKind::ArrRead {
                base: base.subst(name, rep),
                index: index.subst(name, rep),
                slice: slice.clone(),
            },
            ExpKind::ArrWrite {
                base,
                index,
                slice,
                value,
            } => ExpKind::ArrWrite {
                base: base.subst(name, rep),
                index: index.subst(name, rep),
                slice: slice.clone(),
                value: value.subst(name, rep),
            },
            ExpKind::StructNew { name: sn, fields } => ExpKind::StructNew {
                name: sn.clone(),
                fields: fields
                    .iter()
                    .map(|(f, e)| (f.clone(), e.subst(name, rep)))
                    .collect(),
            },
            ExpKind::Proj { base, field } => ExpKind::Proj {
                base: base.subst(name, rep),
                field: field.clone(),
            },
            ExpKind::Un { op, arg } => ExpKind::Un {
                op: op.clone(),
                arg: arg.subst(name, rep),
            },
            ExpKind::Bin { op, lhs, rhs } => ExpKind::Bin {
                op: *op,
                lhs: lhs.subst(name, rep),
                rhs: rhs.subst(name, rep),
            },
            ExpKind::Let {
                var,
                inline,
                def,
                body,
            } => ExpKind::Let {
                var: var.clone(),
                inline: *inline,
                def: def.subst(name, rep),
                body: if var == name {
                    body.clone()
                } else {
                    body.subst(name, rep)
                },
            },
            ExpKind::LetRef {
                var,
                ty,
                init,
                body,
            } => ExpKind::LetRef {
                var: var.clone(),
                ty: ty.clone(),
                init: init.as_ref().map(|e| e.subst(name, rep)),
                body: if var == name {
                    body.clone()
                } else {
                    body.subst(name, rep)
                },
            },
            ExpKind::Assign { lhs, rhs } => ExpKind::Assign {
                lhs: lhs.subst(name, rep),
                rhs: rhs.subst(name, rep),
            },
            ExpKind::Seq { first, second } => ExpKind::Seq {
                first: first.subst(name, rep),
                second: second.subst(name, rep),
            },
            ExpKind::Cond {
                cond,
                then_e,
                else_e,
            } => ExpKind::Cond {
                cond: cond.subst(name, rep),
                then_e: then_e.subst(name, rep),
                else_e: else_e.subst(name, rep),
            },
            ExpKind::For {
                var,
                start,
                count,
                unroll,
                body,
            } => ExpKind::For {
                var: var.clone(),
                start: start.subst(name, rep),
                count: count.subst(name, rep),
                unroll: *unroll,
                body: if var == name {
                    body.clone()
                } else {
                    body.subst(name, rep)
                },
            },
            ExpKind::While { cond, body } => ExpKind::While {
                cond: cond.subst(name, rep),
                body: body.subst(name, rep),
            },
            ExpKind::Call { func, args } => ExpKind::Call {
                func: func.clone(),
                args: args.iter().map(|e| e.subst(name, rep)).collect(),
            },
            ExpKind::Print { newline, args } => ExpKind::Print {
                newline: *newline,
                args: args.iter().map(|e| e.subst(name, rep)).collect(),
            },
            ExpKind::Lut(e) => ExpKind::Lut(e.subst(name, rep)),
        };
        Exp::with_loc(kind, self.ty.clone(), self.loc.clone())
    }
}

fn write_index(
    f: &mut std::fmt::Formatter<'_>,
    index: &Exp,
    slice: &SliceKind,
) -> std::fmt::Result {
    match slice {
        SliceKind::Single => write!(f, "[{}]", index),
        SliceKind::Fixed(n) => write!(f, "[{}:+{}]", index, n),
        SliceKind::Meta(v) => write!(f, "[{}:+{}]", index, v),
    }
}

fn write_args(f: &mut std::fmt::Formatter<'_>, args: &[Exp]) -> std::fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", a)?;
    }
    Ok(())
}

impl std::fmt::Display for Exp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.kind {
            ExpKind::Lit(v) => write!(f, "{}", v),
            ExpKind::Var(v) => write!(f, "{}", v),
            ExpKind::ArrLit(es) => {
                write!(f, "{{")?;
                write_args(f, es)?;
                write!(f, "}}")
            }
            ExpKind::ArrRead { base, index, slice } => {
                write!(f, "{}", base)?;
                write_index(f, index, slice)
            }
            ExpKind::ArrWrite {
                base,
                index,
                slice,
                value,
            } => {
                write!(f, "{}", base)?;
                write_index(f, index, slice)?;
                write!(f, " := {}", value)
            }
            ExpKind::StructNew { name, fields } => {
                write!(f, "{}{{", name)?;
                for (i, (field, e)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", field, e)?;
                }
                write!(f, "}}")
            }
            ExpKind::Proj { base, field } => write!(f, "{}.{}", base, field),
            ExpKind::Un { op, arg } => match op {
                UnOp::Len => write!(f, "length({})", arg),
                UnOp::Cast(ty) => write!(f, "{}({})", ty, arg),
                _ => write!(f, "{}({})", op, arg),
            },
            ExpKind::Bin { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            ExpKind::Let {
                var,
                inline,
                def,
                body,
            } => {
                let kw = match inline {
                    InlineHint::Auto => "let",
                    InlineHint::Force => "let inline",
                    InlineHint::Never => "let noinline",
                };
                write!(f, "{} {} = {} in {}", kw, var, def, body)
            }
            ExpKind::LetRef {
                var,
                ty,
                init,
                body,
            } => match init {
                Some(e) => write!(f, "var {} : {} := {} in {}", var, ty, e, body),
                None => write!(f, "var {} : {} in {}", var, ty, body),
            },
            ExpKind::Assign { lhs, rhs } => write!(f, "{} := {}", lhs, rhs),
            ExpKind::Seq { first, second } => write!(f, "{}; {}", first, second),
            ExpKind::Cond {
                cond,
                then_e,
                else_e,
            } => write!(f, "if {} then {} else {}", cond, then_e, else_e),
            ExpKind::For {
                var,
                start,
                count,
                unroll,
                body,
            } => {
                let kw = match unroll {
                    UnrollHint::Auto => "for",
                    UnrollHint::Unroll => "unroll for",
                    UnrollHint::NoUnroll => "nounroll for",
                };
                write!(f, "{} {} in [{}, {}] {{ {} }}", kw, var, start, count, body)
            }
            ExpKind::While { cond, body } => write!(f, "while {} {{ {} }}", cond, body),
            ExpKind::Call { func, args } => {
                write!(f, "{}(", func)?;
                write_args(f, args)?;
                write!(f, ")")
            }
            ExpKind::Print { newline, args } => {
                write!(f, "{}(", if *newline { "println" } else { "print" })?;
                write_args(f, args)?;
                write!(f, ")")
            }
            ExpKind::Error { msg } => write!(f, "error {:?}", msg),
            ExpKind::Lut(e) => write!(f, "lut({})", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_eq_ignores_location() {
        let a = Exp::i32(5);
        let b = Exp::i32(5).at(Some(SourceLocation::new(PathBuf::from("x.rl"), 9)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_display_is_location_free() {
        let loc = Some(SourceLocation::new(PathBuf::from("x.rl"), 9));
        let a = Exp::bin(BinOp::Add, Exp::var("a", Ty::int32()), Exp::i32(6), Ty::int32());
        let b = Exp::bin(
            BinOp::Add,
            Exp::var("a", Ty::int32()).at(loc.clone()),
            Exp::i32(6).at(loc),
            Ty::int32(),
        );
        assert_eq!(a.to_string(), "(a + 6)");
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_mentions_respects_binders() {
        // let x = x + 1 in x: the def's x is free, the body's is bound
        let def = Exp::bin(BinOp::Add, Exp::var("x", Ty::int32()), Exp::i32(1), Ty::int32());
        let e = Exp::new(
            ExpKind::Let {
                var: "x".to_string(),
                inline: InlineHint::Auto,
                def,
                body: Exp::var("x", Ty::int32()),
            },
            Ty::int32(),
        );
        assert!(e.mentions_var("x"));
        let e2 = Exp::new(
            ExpKind::Let {
                var: "x".to_string(),
                inline: InlineHint::Auto,
                def: Exp::i32(1),
                body: Exp::var("x", Ty::int32()),
            },
            Ty::int32(),
        );
        assert!(!e2.mentions_var("x"));
    }

    #[test]
    fn test_subst_stops_at_shadowing_binder() {
        let body = Exp::new(
            ExpKind::Let {
                var: "x".to_string(),
                inline: InlineHint::Auto,
                def: Exp::var("x", Ty::int32()),
                body: Exp::var("x", Ty::int32()),
            },
            Ty::int32(),
        );
        let out = body.subst("x", &Exp::i32(3));
        match &*out.kind {
            ExpKind::Let { def, body, .. } => {
                assert_eq!(def, &Exp::i32(3));
                assert_eq!(body, &Exp::var("x", Ty::int32()));
            }
            other => panic!("expected let, got {:?}", other),
        }
    }

    #[test]
    fn test_slice_display() {
        let base = Exp::var("buf", Ty::arr(16, Ty::Bit));
        let rd = Exp::new(
            ExpKind::ArrRead {
                base,
                index: Exp::i32(4),
                slice: SliceKind::Fixed(4),
            },
            Ty::arr(4, Ty::Bit),
        );
        assert_eq!(rd.to_string(), "buf[4:+4]");
    }
}
