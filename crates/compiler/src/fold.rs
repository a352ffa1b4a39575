//! Pre-split constant folding over comp trees
//!
//! Partially evaluates every scalar expression embedded in a comp,
//! leaving the stream structure untouched. Each expression folds in a
//! fresh evaluator: dataflow across comp boundaries belongs to the
//! vectorisation analyses, not here. Run before the task splitter so
//! the emitted task bodies carry folded expressions.

use crate::ast::Exp;
use crate::comp::{CallArg, Comp, CompKind};
use crate::config::FoldConfig;
use crate::error::EvalError;
use crate::eval::eval_partial;

/// Fold one embedded expression.
fn fold_exp(e: &Exp, cfg: &FoldConfig) -> Result<Exp, EvalError> {
    let (r, _, _) = eval_partial(e, cfg);
    r
}

/// Fold every expression embedded in `c`.
pub fn fold_comp(c: &Comp, cfg: &FoldConfig) -> Result<Comp, EvalError> {
    let kind = match &*c.kind {
        CompKind::Var(v) => CompKind::Var(v.clone()),
        CompKind::BindMany { head, binds } => CompKind::BindMany {
            head: fold_comp(head, cfg)?,
            binds: binds
                .iter()
                .map(|(v, cc)| Ok((v.clone(), fold_comp(cc, cfg)?)))
                .collect::<Result<Vec<_>, EvalError>>()?,
        },
        CompKind::Seq { first, second } => CompKind::Seq {
            first: fold_comp(first, cfg)?,
            second: fold_comp(second, cfg)?,
        },
        CompKind::Par { hint, left, right } => CompKind::Par {
            hint: *hint,
            left: fold_comp(left, cfg)?,
            right: fold_comp(right, cfg)?,
        },
        CompKind::LetC { var, def, body } => CompKind::LetC {
            var: var.clone(),
            def: fold_comp(def, cfg)?,
            body: fold_comp(body, cfg)?,
        },
        CompKind::LetE {
            var,
            inline,
            def,
            body,
        } => CompKind::LetE {
            var: var.clone(),
            inline: *inline,
            def: fold_exp(def, cfg)?,
            body: fold_comp(body, cfg)?,
        },
        CompKind::LetERef {
            var,
            ty,
            init,
            body,
        } => CompKind::LetERef {
            var: var.clone(),
            ty: ty.clone(),
            init: init.as_ref().map(|e| fold_exp(e, cfg)).transpose()?,
            body: fold_comp(body, cfg)?,
        },
        CompKind::LetFunE {
            name,
            params,
            def,
            body,
        } => CompKind::LetFunE {
            name: name.clone(),
            params: params.clone(),
            def: fold_exp(def, cfg)?,
            body: fold_comp(body, cfg)?,
        },
        CompKind::LetFunC {
            name,
            params,
            def,
            body,
        } => CompKind::LetFunC {
            name: name.clone(),
            params: params.clone(),
            def: fold_comp(def, cfg)?,
            body: fold_comp(body, cfg)?,
        },
        CompKind::LetStruct { name, fields, body } => CompKind::LetStruct {
            name: name.clone(),
            fields: fields.clone(),
            body: fold_comp(body, cfg)?,
        },
        CompKind::Call { name, args } => CompKind::Call {
            name: name.clone(),
            args: args
                .iter()
                .map(|a| {
                    Ok(match a {
                        CallArg::ExpArg(e) => CallArg::ExpArg(fold_exp(e, cfg)?),
                        CallArg::CompArg(cc) => CallArg::CompArg(fold_comp(cc, cfg)?),
                    })
                })
                .collect::<Result<Vec<_>, EvalError>>()?,
        },
        CompKind::Emit(e) => CompKind::Emit(fold_exp(e, cfg)?),
        CompKind::Emits(e) => CompKind::Emits(fold_exp(e, cfg)?),
        CompKind::Return(e) => CompKind::Return(fold_exp(e, cfg)?),
        CompKind::Take(t) => CompKind::Take(t.clone()),
        CompKind::Takes { ty, count } => CompKind::Takes {
            ty: ty.clone(),
            count: *count,
        },
        CompKind::Branch {
            cond,
            then_c,
            else_c,
        } => CompKind::Branch {
            cond: fold_exp(cond, cfg)?,
            then_c: fold_comp(then_c, cfg)?,
            else_c: fold_comp(else_c, cfg)?,
        },
        CompKind::Until { cond, body } => CompKind::Until {
            cond: fold_exp(cond, cfg)?,
            body: fold_comp(body, cfg)?,
        },
        CompKind::While { cond, body } => CompKind::While {
            cond: fold_exp(cond, cfg)?,
            body: fold_comp(body, cfg)?,
        },
        CompKind::Times {
            var,
            start,
            count,
            body,
        } => CompKind::Times {
            var: var.clone(),
            start: fold_exp(start, cfg)?,
            count: fold_exp(count, cfg)?,
            body: fold_comp(body, cfg)?,
        },
        CompKind::Repeat { ann, body } => CompKind::Repeat {
            ann: *ann,
            body: fold_comp(body, cfg)?,
        },
        CompKind::VectComp { ann, body } => CompKind::VectComp {
            ann: *ann,
            body: fold_comp(body, cfg)?,
        },
        CompKind::Standalone(body) => CompKind::Standalone(fold_comp(body, cfg)?),
        k @ (CompKind::Map { .. }
        | CompKind::Filter { .. }
        | CompKind::ReadSrc(_)
        | CompKind::WriteSnk(_)
        | CompKind::ReadInternal { .. }
        | CompKind::WriteInternal { .. }
        | CompKind::Mitigate { .. }
        | CompKind::ActivateTask { .. }) => k.clone(),
    };
    Ok(Comp {
        kind: Box::new(kind),
        ty: c.ty.clone(),
        loc: c.loc.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::ops::BinOp;
    use rill_core::types::Ty;

    #[test]
    fn test_folds_embedded_expressions() {
        let e = Exp::bin(
            BinOp::Add,
            Exp::i32(2),
            Exp::bin(BinOp::Mul, Exp::i32(3), Exp::i32(4), Ty::int32()),
            Ty::int32(),
        );
        let c = Comp::standalone(Comp::new(CompKind::Emit(e)));
        let folded = fold_comp(&c, &FoldConfig::default()).unwrap();
        let expected = Comp::standalone(Comp::new(CompKind::Emit(Exp::i32(14))));
        assert_eq!(folded, expected);
    }

    #[test]
    fn test_leaves_symbolic_expressions() {
        let e = Exp::bin(
            BinOp::Add,
            Exp::var("a", Ty::int32()),
            Exp::i32(0),
            Ty::int32(),
        );
        let c = Comp::new(CompKind::Return(e));
        let folded = fold_comp(&c, &FoldConfig::default()).unwrap();
        assert_eq!(
            folded,
            Comp::new(CompKind::Return(Exp::var("a", Ty::int32())))
        );
    }
}
