//! Mode-parametric expression evaluator
//!
//! One traversal serves three modes. Full evaluation demands a value and
//! fails on anything unreduced. Partial evaluation folds what it can and
//! rebuilds residual expressions around what it cannot. Non-deterministic
//! evaluation behaves like partial evaluation until a conditional's truth
//! is unknown, then guesses both ways and enumerates the alternatives
//! under a decision tape.
//!
//! The traversal owns all mutable state (scopes, guesses, print log,
//! statistics) for exactly one top-level call. Operand order is
//! left-to-right and observable through the mutable store and the print
//! log; the only exception is force-inline lets, whose initialiser is
//! substituted into the body instead of being evaluated at the binding
//! site.

pub mod guess;
pub mod state;

use crate::ast::{Exp, ExpKind, InlineHint, SliceKind, UnrollHint};
use crate::config::FoldConfig;
use crate::error::EvalError;
use guess::{DecisionTape, IntDomain, backtrack, comparison_parts};
use state::{EvalState, PrintLog, Provenance, RefState};

use rill_core::ops::{self, BinOp, UnOp};
use rill_core::sparse::SparseArr;
use rill_core::types::Ty;
use rill_core::value::{Val, ValKind};
use std::collections::HashMap;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Full,
    Partial,
    NonDet,
}

/// Result of interpreting one expression: a fully reduced value or a
/// residual expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Evald {
    Val(Val),
    Exp(Exp),
}

impl Evald {
    /// Back into the AST; values become literal nodes.
    pub fn into_exp(self) -> Exp {
        match self {
            Evald::Val(v) => Exp::lit(v),
            Evald::Exp(e) => e,
        }
    }

    pub fn as_val(&self) -> Option<&Val> {
        match self {
            Evald::Val(v) => Some(v),
            Evald::Exp(_) => None,
        }
    }
}

/// Evaluated selector of an assignment's deref path.
#[derive(Debug, Clone)]
enum EvSel {
    Field(String),
    Idx(Evald, SliceKind),
}

pub struct Evaluator {
    mode: Mode,
    cfg: FoldConfig,
    pub st: EvalState,
    pub tape: DecisionTape,
    /// Non-zero while interpreting constructs where guessing must not
    /// fire (a guessed-true while condition would re-guess true forever)
    suppress_guess: usize,
    /// Non-zero while interpreting code only to residualise it (the
    /// branches of an unknown conditional, the body of a loop that will
    /// run at runtime). Static writes are suppressed there: performing
    /// them would erase the assignment from the rebuilt code.
    symbolic: usize,
}

impl Evaluator {
    pub fn new(mode: Mode, cfg: &FoldConfig) -> Evaluator {
        Evaluator {
            mode,
            cfg: cfg.clone(),
            st: EvalState::new(),
            tape: DecisionTape::default(),
            suppress_guess: 0,
            symbolic: 0,
        }
    }

    /// Abandon with a residual. This is the mode-parametric action: full
    /// mode turns it into the given error, partial mode keeps the
    /// expression, and non-deterministic mode guesses a truth for
    /// boolean-typed residuals instead of keeping them.
    fn abandon(&mut self, err: EvalError, residual: Exp) -> Result<Evald, EvalError> {
        match self.mode {
            Mode::Full => Err(err),
            Mode::Partial => Ok(Evald::Exp(residual)),
            Mode::NonDet => {
                if self.suppress_guess == 0 && guessable(&residual) {
                    let b = self.guess_bool(&residual)?;
                    let v = match residual.ty {
                        Ty::Bit => Val::bit(b),
                        _ => Val::bool(b),
                    };
                    Ok(Evald::Val(v))
                } else {
                    Ok(Evald::Exp(residual))
                }
            }
        }
    }

    /// Abandon with the generic did-not-reduce error.
    fn keep(&mut self, residual: Exp) -> Result<Evald, EvalError> {
        let err = EvalError::NotReduced {
            exp: residual.to_string(),
            loc: residual.loc.clone(),
        };
        self.abandon(err, residual)
    }

    fn rebuild(&self, template: &Exp, kind: ExpKind) -> Exp {
        Exp::with_loc(kind, template.ty.clone(), template.loc.clone())
    }

    pub fn interpret(&mut self, e: &Exp) -> Result<Evald, EvalError> {
        match &*e.kind {
            ExpKind::Lit(v) => Ok(Evald::Val(v.clone())),

            ExpKind::Var(name) => {
                if let Some(v) = self.st.lets.get(name) {
                    return Ok(Evald::Val(v.clone()));
                }
                match self.st.refs.get(name) {
                    Some(RefState::Known { val, .. }) => Ok(Evald::Val(val.clone())),
                    _ => self.abandon(
                        EvalError::FreeVar {
                            var: name.clone(),
                            loc: e.loc.clone(),
                        },
                        e.clone(),
                    ),
                }
            }

            ExpKind::ArrLit(elems) => {
                let evs = self.interpret_all(elems)?;
                if evs.iter().all(|ev| ev.as_val().is_some()) {
                    let vals: Vec<Val> =
                        evs.into_iter().map(|ev| match ev {
                            Evald::Val(v) => v,
                            Evald::Exp(_) => unreachable!("all elements reduced"),
                        }).collect();
                    let default = self.elem_default(&e.ty).or_else(|| vals.first().cloned());
                    match default {
                        Some(d) => Ok(Evald::Val(Val::arr(SparseArr::from_elems(d, vals)))),
                        None => self.keep(self.rebuild(
                            e,
                            ExpKind::ArrLit(vals.into_iter().map(Exp::lit).collect()),
                        )),
                    }
                } else {
                    let kids = evs.into_iter().map(Evald::into_exp).collect();
                    self.keep(self.rebuild(e, ExpKind::ArrLit(kids)))
                }
            }

            ExpKind::ArrRead { base, index, slice } => {
                let b = self.interpret(base)?;
                let i = self.interpret(index)?;
                // a read covering [0, n) of an arr[n] is the array itself
                if let SliceKind::Fixed(n) = slice {
                    if i.as_val().and_then(Val::as_index) == Some(0)
                        && base.ty.static_len() == Some(*n)
                    {
                        return Ok(b);
                    }
                }
                if let (Some(bv), Some(iv)) = (b.as_val(), i.as_val()) {
                    if let (ValKind::Arr(arr), Some(idx)) = (&bv.kind, iv.as_int()) {
                        let oob = |index: i64| EvalError::OutOfBounds {
                            index,
                            len: arr.len(),
                            loc: e.loc.clone(),
                        };
                        let pos = usize::try_from(idx).map_err(|_| oob(idx))?;
                        match slice {
                            SliceKind::Single => {
                                return arr
                                    .get(pos)
                                    .cloned()
                                    .map(Evald::Val)
                                    .ok_or_else(|| oob(idx));
                            }
                            SliceKind::Fixed(n) => {
                                return arr
                                    .slice(pos, *n)
                                    .map(|s| Evald::Val(Val::arr(s)))
                                    .ok_or_else(|| oob(idx));
                            }
                            SliceKind::Meta(_) => {}
                        }
                    }
                }
                self.keep(self.rebuild(
                    e,
                    ExpKind::ArrRead {
                        base: b.into_exp(),
                        index: i.into_exp(),
                        slice: slice.clone(),
                    },
                ))
            }

            ExpKind::ArrWrite {
                base,
                index,
                slice,
                value,
            } => self.interpret_arr_write(e, base, index, slice, value),

            ExpKind::StructNew { name, fields } => {
                let evs = self
                    .interpret_all(&fields.iter().map(|(_, x)| x.clone()).collect::<Vec<_>>())?;
                if evs.iter().all(|ev| ev.as_val().is_some()) {
                    let fs = fields
                        .iter()
                        .zip(evs)
                        .map(|((f, _), ev)| match ev {
                            Evald::Val(v) => (f.clone(), v),
                            Evald::Exp(_) => unreachable!("all fields reduced"),
                        })
                        .collect();
                    Ok(Evald::Val(Val::struct_of(name, fs)))
                } else {
                    let fs = fields
                        .iter()
                        .zip(evs)
                        .map(|((f, _), ev)| (f.clone(), ev.into_exp()))
                        .collect();
                    self.keep(self.rebuild(
                        e,
                        ExpKind::StructNew {
                            name: name.clone(),
                            fields: fs,
                        },
                    ))
                }
            }

            ExpKind::Proj { base, field } => {
                let b = self.interpret(base)?;
                match b {
                    Evald::Val(v) => match v.project(field) {
                        Some(r) => Ok(Evald::Val(r)),
                        None => {
                            let residual = self.rebuild(
                                e,
                                ExpKind::Proj {
                                    base: Exp::lit(v),
                                    field: field.clone(),
                                },
                            );
                            self.abandon(
                                EvalError::OpMismatch {
                                    exp: residual.to_string(),
                                    loc: e.loc.clone(),
                                },
                                residual,
                            )
                        }
                    },
                    Evald::Exp(be) => self.keep(self.rebuild(
                        e,
                        ExpKind::Proj {
                            base: be,
                            field: field.clone(),
                        },
                    )),
                }
            }

            ExpKind::Un { op, arg } => {
                let a = self.interpret(arg)?;
                // array length folds from the type annotation even when
                // the array itself stays symbolic
                if *op == UnOp::Len {
                    if let Some(n) = arg.ty.static_len() {
                        return Ok(Evald::Val(Val::i32(n as i32)));
                    }
                }
                match a {
                    Evald::Val(v) => match ops::un_op(op, &v) {
                        Some(r) => Ok(Evald::Val(r)),
                        None => {
                            let residual = self.rebuild(
                                e,
                                ExpKind::Un {
                                    op: op.clone(),
                                    arg: Exp::lit(v),
                                },
                            );
                            self.abandon(
                                EvalError::OpMismatch {
                                    exp: residual.to_string(),
                                    loc: e.loc.clone(),
                                },
                                residual,
                            )
                        }
                    },
                    Evald::Exp(ae) => self.keep(self.rebuild(
                        e,
                        ExpKind::Un {
                            op: op.clone(),
                            arg: ae,
                        },
                    )),
                }
            }

            ExpKind::Bin { op, lhs, rhs } => {
                let l = self.interpret(lhs)?;
                let r = self.interpret(rhs)?;
                match (l, r) {
                    (Evald::Val(a), Evald::Val(b)) => match ops::bin_op(*op, &a, &b) {
                        Some(v) => Ok(Evald::Val(v)),
                        None => {
                            let residual = self.rebuild(
                                e,
                                ExpKind::Bin {
                                    op: *op,
                                    lhs: Exp::lit(a),
                                    rhs: Exp::lit(b),
                                },
                            );
                            self.abandon(
                                EvalError::OpMismatch {
                                    exp: residual.to_string(),
                                    loc: e.loc.clone(),
                                },
                                residual,
                            )
                        }
                    },
                    // algebraic identities that fire around residuals
                    (Evald::Val(a), Evald::Exp(re)) if *op == BinOp::Add && a.is_zero() => {
                        Ok(Evald::Exp(re))
                    }
                    (Evald::Val(a), Evald::Exp(re)) if *op == BinOp::Mul && a.is_one() => {
                        Ok(Evald::Exp(re))
                    }
                    (Evald::Exp(le), Evald::Val(b)) if *op == BinOp::Add && b.is_zero() => {
                        Ok(Evald::Exp(le))
                    }
                    (Evald::Exp(le), Evald::Val(b)) if *op == BinOp::Mul && b.is_one() => {
                        Ok(Evald::Exp(le))
                    }
                    (l, r) => self.keep(self.rebuild(
                        e,
                        ExpKind::Bin {
                            op: *op,
                            lhs: l.into_exp(),
                            rhs: r.into_exp(),
                        },
                    )),
                }
            }

            ExpKind::Let {
                var,
                inline,
                def,
                body,
            } => {
                if *inline == InlineHint::Force {
                    // substitute-then-interpret preserves the intended
                    // evaluation of an initialiser with effects
                    let substituted = body.subst(var, def);
                    return self.interpret(&substituted);
                }
                let d = self.interpret(def)?;
                match d {
                    Evald::Val(v) => {
                        self.st.note_size(var, v.size());
                        self.st.lets.insert(var.clone(), v);
                        let r = self.interpret(body);
                        self.st.lets.remove(var);
                        r
                    }
                    Evald::Exp(de) => {
                        let b = self.interpret(body)?;
                        self.keep(self.rebuild(
                            e,
                            ExpKind::Let {
                                var: var.clone(),
                                inline: *inline,
                                def: de,
                                body: b.into_exp(),
                            },
                        ))
                    }
                }
            }

            ExpKind::LetRef {
                var,
                ty,
                init,
                body,
            } => self.interpret_let_ref(e, var, ty, init.as_ref(), body),

            ExpKind::Assign { lhs, rhs } => self.interpret_assign(e, lhs, rhs),

            ExpKind::Seq { first, second } => {
                let f = self.interpret(first)?;
                let s = self.interpret(second)?;
                match f {
                    Evald::Val(v) if v.is_unit() => Ok(s),
                    f => self.keep(self.rebuild(
                        e,
                        ExpKind::Seq {
                            first: f.into_exp(),
                            second: s.into_exp(),
                        },
                    )),
                }
            }

            ExpKind::Cond {
                cond,
                then_e,
                else_e,
            } => {
                let c = self.interpret(cond)?;
                if let Some(b) = c.as_val().and_then(Val::as_bool) {
                    return self.interpret(if b { then_e } else { else_e });
                }
                let ce = c.into_exp();
                // unknown branch: nothing known about refs survives
                self.st.invalidate_refs();
                let snap = self.st.snapshot();
                self.symbolic += 1;
                let branches = (|| -> Result<(Evald, Evald), EvalError> {
                    let t = self.interpret(then_e)?;
                    self.st.restore(snap.clone());
                    let el = self.interpret(else_e)?;
                    Ok((t, el))
                })();
                self.symbolic -= 1;
                let (t, el) = branches?;
                self.st.restore(snap);
                self.keep(self.rebuild(
                    e,
                    ExpKind::Cond {
                        cond: ce,
                        then_e: t.into_exp(),
                        else_e: el.into_exp(),
                    },
                ))
            }

            ExpKind::For {
                var,
                start,
                count,
                unroll,
                body,
            } => self.interpret_for(e, var, start, count, *unroll, body),

            ExpKind::While { cond, body } => {
                self.suppress_guess += 1;
                let r = self.interpret_while(e, cond, body);
                self.suppress_guess -= 1;
                r
            }

            ExpKind::Call { func, args } => {
                // calls are opaque: whatever they may write is unknown
                self.st.invalidate_refs();
                let evs = self.interpret_all(args)?;
                self.keep(self.rebuild(
                    e,
                    ExpKind::Call {
                        func: func.clone(),
                        args: evs.into_iter().map(Evald::into_exp).collect(),
                    },
                ))
            }

            ExpKind::Print { newline, args } => {
                let evs = self.interpret_all(args)?;
                if evs.is_empty() {
                    self.st.print_log.push((*newline, Exp::unit()));
                }
                let last = evs.len().saturating_sub(1);
                for (i, ev) in evs.iter().enumerate() {
                    let nl = *newline && i == last;
                    self.st.print_log.push((nl, ev.clone().into_exp()));
                }
                self.keep(self.rebuild(
                    e,
                    ExpKind::Print {
                        newline: *newline,
                        args: evs.into_iter().map(Evald::into_exp).collect(),
                    },
                ))
            }

            ExpKind::Error { .. } => self.keep(e.clone()),

            ExpKind::Lut(_) => Err(EvalError::NotImplemented {
                what: "LUT marker in the interpreter".to_string(),
                loc: e.loc.clone(),
            }),
        }
    }

    fn interpret_all(&mut self, exps: &[Exp]) -> Result<Vec<Evald>, EvalError> {
        exps.iter().map(|x| self.interpret(x)).collect()
    }

    /// Implicit default of the element type of an array-typed node.
    fn elem_default(&self, arr_ty: &Ty) -> Option<Val> {
        match arr_ty {
            Ty::Arr(_, elem) => Val::implicit_default(elem, self.cfg.implicit_array_limit),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // ref-lets

    fn interpret_let_ref(
        &mut self,
        e: &Exp,
        var: &str,
        ty: &Ty,
        init: Option<&Exp>,
        body: &Exp,
    ) -> Result<Evald, EvalError> {
        let mut kept_init: Option<Exp> = None;
        let start = match init {
            Some(ie) => match self.interpret(ie)? {
                Evald::Val(v) => {
                    self.st.note_size(var, v.size());
                    RefState::Known {
                        val: v,
                        prov: Provenance::Explicit,
                    }
                }
                Evald::Exp(res) => {
                    kept_init = Some(res);
                    RefState::Unknown { last: None }
                }
            },
            None => match Val::implicit_default(ty, self.cfg.implicit_array_limit) {
                Some(v) => {
                    self.st.note_size(var, v.size());
                    RefState::Known {
                        val: v,
                        prov: Provenance::Implicit,
                    }
                }
                // non-ground or oversized array: un-eliminable binding
                None => RefState::Unknown { last: None },
            },
        };
        self.st.refs.insert(var.to_string(), start);
        let body_r = self.interpret(body);
        let final_state = self
            .st
            .refs
            .remove(var)
            .expect("ref binding survives its body");
        let body_r = body_r?;

        if let (Evald::Val(v), None) = (&body_r, &kept_init) {
            // the whole body reduced; the binding disappears
            return Ok(Evald::Val(v.clone()));
        }
        let be = body_r.into_exp();
        if !be.mentions_var(var) && kept_init.is_none() {
            return Ok(Evald::Exp(be));
        }

        let rebuilt = match final_state {
            RefState::Known {
                prov: Provenance::Implicit,
                ..
            }
            | RefState::Unknown {
                last: Some((_, Provenance::Implicit)),
            } => self.make_let_ref(e, var, ty, None, be),
            RefState::Known {
                val,
                prov: Provenance::Explicit,
            } => self.make_let_ref(e, var, ty, Some(Exp::lit(val)), be),
            RefState::Unknown { last: None } => self.make_let_ref(e, var, ty, kept_init, be),
            RefState::Unknown {
                last: Some((val, Provenance::Explicit)),
            } => {
                if let Some(writes) = self.writeout_assigns(var, ty, &val) {
                    // seed the storage with element assignments instead
                    // of a multi-kilobyte literal
                    let seeded = writes
                        .into_iter()
                        .rev()
                        .fold(be, |acc, w| Exp::seq(w, acc));
                    self.make_let_ref(e, var, ty, None, seeded)
                } else {
                    self.make_let_ref(e, var, ty, Some(Exp::lit(val)), be)
                }
            }
        };
        self.keep(rebuilt)
    }

    fn make_let_ref(&self, e: &Exp, var: &str, ty: &Ty, init: Option<Exp>, body: Exp) -> Exp {
        self.rebuild(
            e,
            ExpKind::LetRef {
                var: var.to_string(),
                ty: ty.clone(),
                init,
                body,
            },
        )
    }

    /// Element-wise seeding assignments for a sparse array left behind
    /// by a partially known mutable variable. Applicable when the array
    /// default matches the implicit default of the element type (the
    /// code generator zeroes the storage) and few entries differ.
    fn writeout_assigns(&self, var: &str, ty: &Ty, val: &Val) -> Option<Vec<Exp>> {
        let ValKind::Arr(arr) = &val.kind else {
            return None;
        };
        if arr.write_count() == 0 || arr.write_count() > self.cfg.writeout_limit {
            return None;
        }
        let elem_default = self.elem_default(ty)?;
        if *arr.default_elem() != elem_default {
            return None;
        }
        Some(
            arr.writes()
                .map(|(i, v)| {
                    Exp::arr_write(
                        Exp::var(var, ty.clone()),
                        Exp::i32(i as i32),
                        SliceKind::Single,
                        Exp::lit(v.clone()),
                    )
                })
                .collect(),
        )
    }

    // ------------------------------------------------------------------
    // assignments

    fn interpret_assign(&mut self, e: &Exp, lhs: &Exp, rhs: &Exp) -> Result<Evald, EvalError> {
        let rhs_ev = self.interpret(rhs)?;
        let (head, sels, lhs_rb) = self.eval_lhs(lhs)?;
        let Some(head) = head else {
            let residual = self.rebuild(
                e,
                ExpKind::Assign {
                    lhs: lhs_rb,
                    rhs: rhs_ev.into_exp(),
                },
            );
            return self.abandon(
                EvalError::OpMismatch {
                    exp: residual.to_string(),
                    loc: e.loc.clone(),
                },
                residual,
            );
        };
        let residual = match &*lhs_rb.kind {
            // an assignment whose target is an array read stays an
            // array-write node (issue #88)
            ExpKind::ArrRead { .. } => {
                let ExpKind::ArrRead { base, index, slice } = *lhs_rb.kind.clone() else {
                    unreachable!("matched above");
                };
                self.rebuild(
                    e,
                    ExpKind::ArrWrite {
                        base,
                        index,
                        slice,
                        value: rhs_ev.clone().into_exp(),
                    },
                )
            }
            _ => self.rebuild(
                e,
                ExpKind::Assign {
                    lhs: lhs_rb.clone(),
                    rhs: rhs_ev.clone().into_exp(),
                },
            ),
        };
        self.finish_assign(e, head, sels, rhs_ev, residual)
    }

    fn interpret_arr_write(
        &mut self,
        e: &Exp,
        base: &Exp,
        index: &Exp,
        slice: &SliceKind,
        value: &Exp,
    ) -> Result<Evald, EvalError> {
        let rhs_ev = self.interpret(value)?;
        let (head, mut sels, base_rb) = self.eval_lhs(base)?;
        let idx = self.interpret(index)?;
        sels.push(EvSel::Idx(idx.clone(), slice.clone()));
        let residual = self.rebuild(
            e,
            ExpKind::ArrWrite {
                base: base_rb.clone(),
                index: idx.into_exp(),
                slice: slice.clone(),
                value: rhs_ev.clone().into_exp(),
            },
        );
        let Some(head) = head else {
            return self.abandon(
                EvalError::OpMismatch {
                    exp: residual.to_string(),
                    loc: e.loc.clone(),
                },
                residual,
            );
        };
        self.finish_assign(e, head, sels, rhs_ev, residual)
    }

    /// Walk an assignment target, evaluating index expressions
    /// left-to-right. Returns the head variable (when the target is a
    /// deref path), the evaluated selectors in head-to-surface order,
    /// and the rebuilt target expression.
    fn eval_lhs(&mut self, e: &Exp) -> Result<(Option<String>, Vec<EvSel>, Exp), EvalError> {
        match &*e.kind {
            ExpKind::Var(v) => Ok((Some(v.clone()), vec![], e.clone())),
            ExpKind::Proj { base, field } => {
                let (head, mut sels, rb) = self.eval_lhs(base)?;
                sels.push(EvSel::Field(field.clone()));
                let rebuilt = self.rebuild(
                    e,
                    ExpKind::Proj {
                        base: rb,
                        field: field.clone(),
                    },
                );
                Ok((head, sels, rebuilt))
            }
            ExpKind::ArrRead { base, index, slice } => {
                let (head, mut sels, rb) = self.eval_lhs(base)?;
                let idx = self.interpret(index)?;
                sels.push(EvSel::Idx(idx.clone(), slice.clone()));
                let rebuilt = self.rebuild(
                    e,
                    ExpKind::ArrRead {
                        base: rb,
                        index: idx.into_exp(),
                        slice: slice.clone(),
                    },
                );
                Ok((head, sels, rebuilt))
            }
            _ => Ok((None, vec![], e.clone())),
        }
    }

    fn finish_assign(
        &mut self,
        e: &Exp,
        head: String,
        sels: Vec<EvSel>,
        rhs_ev: Evald,
        residual: Exp,
    ) -> Result<Evald, EvalError> {
        // any write retracts everything the guess stores assumed
        self.st.clear_guesses();

        let statically_known = self.symbolic == 0
            && rhs_ev.as_val().is_some()
            && sels.iter().all(|s| match s {
                EvSel::Field(_) => true,
                EvSel::Idx(i, slice) => {
                    i.as_val().and_then(Val::as_index).is_some()
                        && !matches!(slice, SliceKind::Meta(_))
                }
            });
        let head_known = matches!(self.st.refs.get(&head), Some(RefState::Known { .. }));
        let whole_var = sels.is_empty();

        if statically_known && (head_known || whole_var) {
            let rhs_val = match rhs_ev {
                Evald::Val(v) => v,
                Evald::Exp(_) => unreachable!("statically known"),
            };
            if whole_var {
                if self.st.refs.contains_key(&head) {
                    self.st.note_size(&head, rhs_val.size());
                    self.st.refs.insert(
                        head,
                        RefState::Known {
                            val: rhs_val,
                            prov: Provenance::Explicit,
                        },
                    );
                    return Ok(Evald::Val(Val::unit()));
                }
            } else if let Some(RefState::Known { val, .. }) = self.st.refs.get(&head) {
                let mut cur = val.clone();
                write_path(&mut cur, &sels, rhs_val, e)?;
                self.st.note_size(&head, cur.size());
                self.st.refs.insert(
                    head,
                    RefState::Known {
                        val: cur,
                        prov: Provenance::Explicit,
                    },
                );
                return Ok(Evald::Val(Val::unit()));
            }
        }

        // the write cannot be performed statically: the head variable's
        // known value is gone. A whole-variable overwrite discards the
        // old value; a partial overwrite keeps it so code generation can
        // seed the initial contents. A residual write to an
        // already-unknown variable adds nothing and forgets nothing.
        if let Some(st) = self.st.refs.get_mut(&head) {
            match st {
                RefState::Known { val, prov } => {
                    *st = RefState::Unknown {
                        last: if whole_var {
                            None
                        } else {
                            Some((val.clone(), *prov))
                        },
                    };
                }
                RefState::Unknown { .. } => {}
            }
        }
        trace!(var = %head, "assignment residualised, variable invalidated");
        self.keep(residual)
    }

    // ------------------------------------------------------------------
    // counted loops

    fn interpret_for(
        &mut self,
        e: &Exp,
        var: &str,
        start: &Exp,
        count: &Exp,
        unroll: UnrollHint,
        body: &Exp,
    ) -> Result<Evald, EvalError> {
        let s = self.interpret(start)?;
        let c = self.interpret(count)?;
        let bounds = match (
            s.as_val().and_then(Val::as_int),
            c.as_val().and_then(Val::as_int),
        ) {
            (Some(s0), Some(n)) if s0.checked_add(n).is_some() => Some((s0, n)),
            _ => None,
        };
        let try_unroll = match (unroll, bounds) {
            (UnrollHint::NoUnroll, _) | (_, None) => false,
            (UnrollHint::Unroll, Some(_)) => true,
            (UnrollHint::Auto, Some((_, n))) => n <= self.cfg.unroll_limit as i64,
        };

        if try_unroll {
            let (s0, n) = bounds.expect("bounds known when unrolling");
            let idx_ty = s.as_val().map(Val::ty).unwrap_or_else(Ty::int32);
            let snap = self.st.snapshot();
            let mut completed = true;
            for i in s0..s0 + n {
                self.st.lets.insert(var.to_string(), index_val(&idx_ty, i));
                let r = self.interpret(body);
                match r {
                    Ok(Evald::Val(ref v)) if v.is_unit() => continue,
                    Ok(_) => {
                        completed = false;
                        break;
                    }
                    Err(err) => {
                        self.st.lets.remove(var);
                        return Err(err);
                    }
                }
            }
            self.st.lets.remove(var);
            if completed {
                trace!(loop_var = var, iterations = n, "loop unrolled");
                return Ok(Evald::Val(Val::unit()));
            }
            debug!(loop_var = var, "iteration did not reduce, abandoning unroll");
            self.st.restore(snap);
        }

        // the loop runs at runtime: nothing written inside stays known
        self.st.invalidate_refs();
        self.symbolic += 1;
        let body_r = self.interpret(body);
        self.symbolic -= 1;
        let body_r = body_r?;
        self.st.invalidate_refs();
        self.keep(self.rebuild(
            e,
            ExpKind::For {
                var: var.to_string(),
                start: s.into_exp(),
                count: c.into_exp(),
                unroll,
                body: body_r.into_exp(),
            },
        ))
    }

    /// Run a while loop to static completion, or residualise it. There
    /// is no iteration cap here: a statically diverging loop diverges
    /// in the evaluator too.
    fn interpret_while(&mut self, e: &Exp, cond: &Exp, body: &Exp) -> Result<Evald, EvalError> {
        let snap = self.st.snapshot();
        loop {
            let c = self.interpret(cond)?;
            match c.as_val().and_then(Val::as_bool) {
                Some(false) => return Ok(Evald::Val(Val::unit())),
                Some(true) => match self.interpret(body)? {
                    Evald::Val(v) if v.is_unit() => continue,
                    _ => break,
                },
                None => break,
            }
        }
        self.st.restore(snap);
        self.st.invalidate_refs();
        self.symbolic += 1;
        let parts = (|| -> Result<(Evald, Evald), EvalError> {
            let c = self.interpret(cond)?;
            let b = self.interpret(body)?;
            Ok((c, b))
        })();
        self.symbolic -= 1;
        let (c, b) = parts?;
        self.st.invalidate_refs();
        self.keep(self.rebuild(
            e,
            ExpKind::While {
                cond: c.into_exp(),
                body: b.into_exp(),
            },
        ))
    }

    // ------------------------------------------------------------------
    // guessing

    /// Assume a truth for a residual boolean condition. Consistent with
    /// earlier assumptions of the same (location-stripped) expression;
    /// fresh assumptions consume the decision tape. Comparisons against
    /// integer literals additionally narrow the subject's integer
    /// domain, and an empty intersection prunes the branch.
    fn guess_bool(&mut self, cond: &Exp) -> Result<bool, EvalError> {
        let key = cond.to_string();
        if let Some(b) = self.st.bool_guesses.get(&key) {
            return Ok(*b);
        }
        let b = self.tape.next();
        if let Some((subject, op, k)) = comparison_parts(cond) {
            let dom = self
                .st
                .int_guesses
                .get(&subject)
                .cloned()
                .unwrap_or_default();
            let narrowed = dom.intersect(&IntDomain::implied(op, k, b));
            if narrowed.is_empty() {
                debug!(cond = %key, assumed = b, "empty integer domain, branch pruned");
                return Err(EvalError::Pruned);
            }
            self.st.int_guesses.insert(subject, narrowed);
        }
        self.st.bool_guesses.insert(key, b);
        Ok(b)
    }
}

/// Is this residual something non-deterministic mode may assume a truth
/// for? Boolean-typed reads and operator applications qualify;
/// effectful or structural forms do not.
fn guessable(e: &Exp) -> bool {
    if e.ty != Ty::Bool && e.ty != Ty::Bit {
        return false;
    }
    matches!(
        &*e.kind,
        ExpKind::Var(_)
            | ExpKind::Bin { .. }
            | ExpKind::Un { .. }
            | ExpKind::Proj { .. }
            | ExpKind::ArrRead { .. }
    )
}

/// Loop index literal at the loop variable's type.
fn index_val(ty: &Ty, i: i64) -> Val {
    match ty {
        Ty::Int(w, s) => Val::int_of(*w, *s, i as i128),
        _ => Val::i32(i as i32),
    }
}

/// In-place update of a known value along an evaluated deref path.
fn write_path(target: &mut Val, sels: &[EvSel], v: Val, node: &Exp) -> Result<(), EvalError> {
    let Some(first) = sels.first() else {
        *target = v;
        return Ok(());
    };
    let mismatch = || EvalError::OpMismatch {
        exp: node.to_string(),
        loc: node.loc.clone(),
    };
    match first {
        EvSel::Field(f) => match &mut target.kind {
            ValKind::Struct(_, fields) => {
                let slot = fields
                    .iter_mut()
                    .find(|(name, _)| name == f)
                    .ok_or_else(mismatch)?;
                write_path(&mut slot.1, &sels[1..], v, node)
            }
            kind => {
                if sels.len() == 1 {
                    if let Some(n) = v.as_int() {
                        if set_complex_component(kind, f, n) {
                            return Ok(());
                        }
                    }
                }
                Err(mismatch())
            }
        },
        EvSel::Idx(i, slice) => {
            let idx = i
                .as_val()
                .and_then(Val::as_index)
                .expect("index statically known");
            let ValKind::Arr(arr) = &mut target.kind else {
                return Err(mismatch());
            };
            let oob = |arr: &SparseArr| EvalError::OutOfBounds {
                index: idx as i64,
                len: arr.len(),
                loc: node.loc.clone(),
            };
            match slice {
                SliceKind::Single => {
                    let mut elem = arr.get(idx).cloned().ok_or_else(|| oob(arr))?;
                    write_path(&mut elem, &sels[1..], v, node)?;
                    arr.set(idx, elem);
                    Ok(())
                }
                SliceKind::Fixed(n) => {
                    if sels.len() != 1 {
                        return Err(mismatch());
                    }
                    let ValKind::Arr(src) = &v.kind else {
                        return Err(mismatch());
                    };
                    if src.len() != *n || !arr.write_slice(idx, src) {
                        return Err(oob(arr));
                    }
                    Ok(())
                }
                SliceKind::Meta(_) => Err(mismatch()),
            }
        }
    }
}

fn set_complex_component(kind: &mut ValKind, field: &str, n: i64) -> bool {
    macro_rules! set {
        ($c:expr, $t:ty) => {
            match field {
                "re" => {
                    $c.re = n as $t;
                    true
                }
                "im" => {
                    $c.im = n as $t;
                    true
                }
                _ => false,
            }
        };
    }
    match kind {
        ValKind::C8(c) => set!(c, i8),
        ValKind::C16(c) => set!(c, i16),
        ValKind::C32(c) => set!(c, i32),
        ValKind::C64(c) => set!(c, i64),
        _ => false,
    }
}

// ----------------------------------------------------------------------
// drivers

/// Full evaluation: a value or the first failure, plus the print log.
pub fn eval_full(e: &Exp, cfg: &FoldConfig) -> (Result<Val, EvalError>, PrintLog) {
    let mut ev = Evaluator::new(Mode::Full, cfg);
    let r = match ev.interpret(e) {
        Ok(Evald::Val(v)) => Ok(v),
        Ok(Evald::Exp(x)) => Err(EvalError::NotReduced {
            exp: x.to_string(),
            loc: x.loc.clone(),
        }),
        Err(err) => Err(err),
    };
    (r, ev.st.print_log)
}

/// Partial evaluation: the folded expression, the print log, and the
/// per-variable size statistics.
pub fn eval_partial(
    e: &Exp,
    cfg: &FoldConfig,
) -> (Result<Exp, EvalError>, PrintLog, HashMap<String, usize>) {
    let mut ev = Evaluator::new(Mode::Partial, cfg);
    let r = ev.interpret(e).map(Evald::into_exp);
    (r, ev.st.print_log, ev.st.stats)
}

/// Non-deterministic evaluation: one entry per explored branch, pruned
/// branches omitted. The number of explored branches is capped by the
/// configuration.
pub fn eval_nondet(e: &Exp, cfg: &FoldConfig) -> Vec<(Result<Exp, EvalError>, PrintLog)> {
    let mut out = Vec::new();
    let mut prefix: Vec<bool> = Vec::new();
    let mut explored = 0usize;
    loop {
        let mut ev = Evaluator::new(Mode::NonDet, cfg);
        ev.tape = DecisionTape::with_prefix(prefix);
        let r = ev.interpret(e);
        explored += 1;
        match r {
            Err(EvalError::Pruned) => {}
            Ok(evd) => out.push((Ok(evd.into_exp()), ev.st.print_log)),
            Err(err) => out.push((Err(err), ev.st.print_log)),
        }
        if explored >= cfg.branch_limit {
            debug!(explored, "branch limit reached, stopping enumeration");
            break;
        }
        match backtrack(ev.tape.taken()) {
            Some(next) => prefix = next,
            None => break,
        }
    }
    out
}

/// Is there a guessed world in which `e` evaluates to `true`?
pub fn satisfiable(e: &Exp, cfg: &FoldConfig) -> bool {
    eval_nondet(e, cfg).iter().any(|(r, _)| match r {
        Ok(exp) => exp.as_val().and_then(Val::as_bool) == Some(true),
        Err(_) => false,
    })
}

/// `e` holds in every guessed world.
pub fn provable(e: &Exp, cfg: &FoldConfig) -> bool {
    let neg = Exp::un(UnOp::Not, e.clone(), Ty::Bool);
    !satisfiable(&neg, cfg)
}

/// `a` implies `b` across every guessed world.
pub fn implies(a: &Exp, b: &Exp, cfg: &FoldConfig) -> bool {
    let not_a = Exp::un(UnOp::Not, a.clone(), Ty::Bool);
    let disj = Exp::bin(BinOp::Or, not_a, b.clone(), Ty::Bool);
    provable(&disj, cfg)
}
