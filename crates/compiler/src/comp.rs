//! Stream-computation AST for Rill
//!
//! Comps are the stream layer above scalar expressions: pipelines,
//! monadic binds, take/emit, control flow, and the barrier markers the
//! task splitter cuts at. Like expressions, comps arrive typed from the
//! front end and are immutable once constructed.

use crate::ast::{Exp, InlineHint};
use rill_core::loc::SourceLocation;
use rill_core::types::{CompTy, Ty};
use serde::{Deserialize, Serialize};

/// Opaque task identifier handed out by the task splitter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Opaque inter-task queue identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct QueueId(pub u32);

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// What a task does when its input queue is empty. The main task must
/// yield back to the scheduler instead of spinning, or it starves the
/// standalone producer it is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadPolicy {
    SpinOnEmpty,
    JumpToConsumeOnEmpty,
}

/// Pipelining directive on a `Par` seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineHint {
    Always,
    Never,
    Maybe {
        burst_in: Option<usize>,
        burst_out: Option<usize>,
    },
}

/// A typed comp node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comp {
    pub kind: Box<CompKind>,
    pub ty: Option<CompTy>,
    pub loc: Option<SourceLocation>,
}

/// Equality ignores locations.
impl PartialEq for Comp {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.kind == other.kind
    }
}

/// Argument of a comp-level call: scalar or stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallArg {
    ExpArg(Exp),
    CompArg(Comp),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompKind {
    /// Reference to a comp binding
    Var(String),
    /// n-ary monadic bind: run `head`, bind its result to the first
    /// variable, run the first continuation, and so on; the last
    /// continuation's result is the whole bind's. Built through
    /// [`Comp::bind_many`], which keeps binds flat and non-empty.
    BindMany {
        head: Comp,
        binds: Vec<(String, Comp)>,
    },
    Seq {
        first: Comp,
        second: Comp,
    },
    Par {
        hint: PipelineHint,
        left: Comp,
        right: Comp,
    },
    /// Comp-level let
    LetC {
        var: String,
        def: Comp,
        body: Comp,
    },
    LetE {
        var: String,
        inline: InlineHint,
        def: Exp,
        body: Comp,
    },
    LetERef {
        var: String,
        ty: Ty,
        init: Option<Exp>,
        body: Comp,
    },
    LetFunE {
        name: String,
        params: Vec<(String, Ty)>,
        def: Exp,
        body: Comp,
    },
    LetFunC {
        name: String,
        params: Vec<(String, Ty)>,
        def: Comp,
        body: Comp,
    },
    LetStruct {
        name: String,
        fields: Vec<(String, Ty)>,
        body: Comp,
    },
    Call {
        name: String,
        args: Vec<CallArg>,
    },
    Emit(Exp),
    Emits(Exp),
    Return(Exp),
    Take(Ty),
    Takes {
        ty: Ty,
        count: usize,
    },
    Branch {
        cond: Exp,
        then_c: Comp,
        else_c: Comp,
    },
    Until {
        cond: Exp,
        body: Comp,
    },
    While {
        cond: Exp,
        body: Comp,
    },
    Times {
        var: String,
        start: Exp,
        count: Exp,
        body: Comp,
    },
    /// Lift a computer to a transformer by running it forever
    Repeat {
        ann: Option<(usize, usize)>,
        body: Comp,
    },
    /// Vectorisation annotation
    VectComp {
        ann: (usize, usize),
        body: Comp,
    },
    /// Stateless transformer from a pure expression function
    Map {
        func: String,
    },
    Filter {
        func: String,
    },
    ReadSrc(Ty),
    WriteSnk(Ty),
    ReadInternal {
        queue: QueueId,
        policy: ReadPolicy,
    },
    WriteInternal {
        queue: QueueId,
    },
    /// Barrier marker: the task splitter cuts here. Only the innermost
    /// of nested standalones defines the barrier.
    Standalone(Comp),
    /// Rate-matching adaptor between `arr[from] ty` and `arr[to] ty`
    /// streams; one of the rates divides the other
    Mitigate {
        ty: Ty,
        from: usize,
        to: usize,
    },
    /// Activation stub emitted by the task splitter in place of a
    /// barrier; `input` names the bind variable whose value the
    /// scheduler passes into the task
    ActivateTask {
        task: TaskId,
        input: Option<String>,
    },
}

impl Comp {
    pub fn new(kind: CompKind) -> Comp {
        Comp {
            kind: Box::new(kind),
            ty: None,
            loc: None,
        }
    }

    pub fn typed(kind: CompKind, ty: CompTy) -> Comp {
        Comp {
            kind: Box::new(kind),
            ty: Some(ty),
            loc: None,
        }
    }

    pub fn at(mut self, loc: Option<SourceLocation>) -> Comp {
        self.loc = loc;
        self
    }

    /// Does this comp produce a result (computer) rather than only pump
    /// a stream (transformer)? Unannotated comps are assumed computers.
    pub fn is_computer(&self) -> bool {
        self.ty.as_ref().map(CompTy::is_computer).unwrap_or(true)
    }

    /// Smart constructor for `BindMany` maintaining the two bind
    /// invariants: an empty bind list collapses to the head, and a head
    /// that is itself a bind is flattened into one n-ary node.
    pub fn bind_many(head: Comp, binds: Vec<(String, Comp)>) -> Comp {
        if binds.is_empty() {
            return head;
        }
        match *head.kind {
            CompKind::BindMany {
                head: inner_head,
                binds: inner_binds,
            } => {
                let mut all = inner_binds;
                all.extend(binds);
                Comp::bind_many(inner_head, all)
            }
            k => Comp::new(CompKind::BindMany {
                head: Comp {
                    kind: Box::new(k),
                    ty: head.ty,
                    loc: head.loc,
                },
                binds,
            }),
        }
    }

    pub fn seq(first: Comp, second: Comp) -> Comp {
        Comp::new(CompKind::Seq { first, second })
    }

    pub fn par(hint: PipelineHint, left: Comp, right: Comp) -> Comp {
        Comp::new(CompKind::Par { hint, left, right })
    }

    pub fn standalone(body: Comp) -> Comp {
        Comp::new(CompKind::Standalone(body))
    }

    pub fn activate(task: TaskId, input: Option<String>) -> Comp {
        Comp::new(CompKind::ActivateTask { task, input })
    }

    /// Does `name` occur free in this comp (in embedded expressions or
    /// comp references)?
    pub fn mentions_var(&self, name: &str) -> bool {
        match &*self.kind {
            CompKind::Var(v) => v == name,
            CompKind::BindMany { head, binds } => {
                if head.mentions_var(name) {
                    return true;
                }
                // each bind variable scopes over everything after it
                for (i, (_, c)) in binds.iter().enumerate() {
                    if binds[..=i].iter().any(|(v, _)| v == name) {
                        return false;
                    }
                    if c.mentions_var(name) {
                        return true;
                    }
                }
                false
            }
            CompKind::Seq { first, second } => {
                first.mentions_var(name) || second.mentions_var(name)
            }
            CompKind::Par { left, right, .. } => {
                left.mentions_var(name) || right.mentions_var(name)
            }
            CompKind::LetC { var, def, body } => {
                def.mentions_var(name) || (var != name && body.mentions_var(name))
            }
            CompKind::LetE { var, def, body, .. } => {
                def.mentions_var(name) || (var != name && body.mentions_var(name))
            }
            CompKind::LetERef {
                var, init, body, ..
            } => {
                init.as_ref().is_some_and(|e| e.mentions_var(name))
                    || (var != name && body.mentions_var(name))
            }
            CompKind::LetFunE { def, body, .. } => {
                def.mentions_var(name) || body.mentions_var(name)
            }
            CompKind::LetFunC { def, body, .. } => {
                def.mentions_var(name) || body.mentions_var(name)
            }
            CompKind::LetStruct { body, .. } => body.mentions_var(name),
            CompKind::Call { args, .. } => args.iter().any(|a| match a {
                CallArg::ExpArg(e) => e.mentions_var(name),
                CallArg::CompArg(c) => c.mentions_var(name),
            }),
            CompKind::Emit(e) | CompKind::Emits(e) | CompKind::Return(e) => {
                e.mentions_var(name)
            }
            CompKind::Branch {
                cond,
                then_c,
                else_c,
            } => {
                cond.mentions_var(name)
                    || then_c.mentions_var(name)
                    || else_c.mentions_var(name)
            }
            CompKind::Until { cond, body } | CompKind::While { cond, body } => {
                cond.mentions_var(name) || body.mentions_var(name)
            }
            CompKind::Times {
                var,
                start,
                count,
                body,
            } => {
                start.mentions_var(name)
                    || count.mentions_var(name)
                    || (var != name && body.mentions_var(name))
            }
            CompKind::Repeat { body, .. }
            | CompKind::VectComp { body, .. }
            | CompKind::Standalone(body) => body.mentions_var(name),
            CompKind::Take(_)
            | CompKind::Takes { .. }
            | CompKind::Map { .. }
            | CompKind::Filter { .. }
            | CompKind::ReadSrc(_)
            | CompKind::WriteSnk(_)
            | CompKind::ReadInternal { .. }
            | CompKind::WriteInternal { .. }
            | CompKind::Mitigate { .. }
            | CompKind::ActivateTask { .. } => false,
        }
    }
}

impl std::fmt::Display for Comp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.kind {
            CompKind::Var(v) => write!(f, "{}", v),
            CompKind::BindMany { head, binds } => {
                let mut prev = head;
                for (var, c) in binds {
                    write!(f, "{} <- {}; ", var, prev)?;
                    prev = c;
                }
                write!(f, "{}", prev)
            }
            CompKind::Seq { first, second } => write!(f, "{}; {}", first, second),
            CompKind::Par { left, right, .. } => write!(f, "{} >>> {}", left, right),
            CompKind::LetC { var, def, body } => {
                write!(f, "let comp {} = {} in {}", var, def, body)
            }
            CompKind::LetE { var, def, body, .. } => {
                write!(f, "let {} = {} in {}", var, def, body)
            }
            CompKind::LetERef {
                var,
                ty,
                init,
                body,
            } => match init {
                Some(e) => write!(f, "var {} : {} := {} in {}", var, ty, e, body),
                None => write!(f, "var {} : {} in {}", var, ty, body),
            },
            CompKind::LetFunE { name, body, .. } => {
                write!(f, "fun {}(..) in {}", name, body)
            }
            CompKind::LetFunC { name, body, .. } => {
                write!(f, "fun comp {}(..) in {}", name, body)
            }
            CompKind::LetStruct { name, body, .. } => {
                write!(f, "struct {} in {}", name, body)
            }
            CompKind::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match a {
                        CallArg::ExpArg(e) => write!(f, "{}", e)?,
                        CallArg::CompArg(c) => write!(f, "{}", c)?,
                    }
                }
                write!(f, ")")
            }
            CompKind::Emit(e) => write!(f, "emit {}", e),
            CompKind::Emits(e) => write!(f, "emits {}", e),
            CompKind::Return(e) => write!(f, "return {}", e),
            CompKind::Take(_) => write!(f, "take"),
            CompKind::Takes { count, .. } => write!(f, "takes {}", count),
            CompKind::Branch {
                cond,
                then_c,
                else_c,
            } => write!(f, "if {} then {{ {} }} else {{ {} }}", cond, then_c, else_c),
            CompKind::Until { cond, body } => write!(f, "until {} {{ {} }}", cond, body),
            CompKind::While { cond, body } => write!(f, "while {} {{ {} }}", cond, body),
            CompKind::Times {
                var,
                start,
                count,
                body,
            } => write!(f, "times {} in [{}, {}] {{ {} }}", var, start, count, body),
            CompKind::Repeat { body, .. } => write!(f, "repeat {{ {} }}", body),
            CompKind::VectComp { ann, body } => {
                write!(f, "<{},{}> {{ {} }}", ann.0, ann.1, body)
            }
            CompKind::Map { func } => write!(f, "map {}", func),
            CompKind::Filter { func } => write!(f, "filter {}", func),
            CompKind::ReadSrc(_) => write!(f, "read"),
            CompKind::WriteSnk(_) => write!(f, "write"),
            CompKind::ReadInternal { queue, policy } => {
                let p = match policy {
                    ReadPolicy::SpinOnEmpty => "spin",
                    ReadPolicy::JumpToConsumeOnEmpty => "yield",
                };
                write!(f, "read_q({}, {})", queue, p)
            }
            CompKind::WriteInternal { queue } => write!(f, "write_q({})", queue),
            CompKind::Standalone(body) => write!(f, "standalone {{ {} }}", body),
            CompKind::Mitigate { ty, from, to } => {
                write!(f, "mitigate[{}, {}, {}]", ty, from, to)
            }
            CompKind::ActivateTask { task, input } => match input {
                Some(v) => write!(f, "activate {}({})", task, v),
                None => write!(f, "activate {}", task),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::types::Ty;

    fn ret(n: i32) -> Comp {
        Comp::new(CompKind::Return(Exp::i32(n)))
    }

    #[test]
    fn test_bind_many_empty_collapses_to_head() {
        let c = Comp::bind_many(ret(1), vec![]);
        assert_eq!(c, ret(1));
    }

    #[test]
    fn test_bind_many_flattens_nested_head() {
        let inner = Comp::bind_many(ret(1), vec![("x".to_string(), ret(2))]);
        let outer = Comp::bind_many(inner, vec![("y".to_string(), ret(3))]);
        match &*outer.kind {
            CompKind::BindMany { head, binds } => {
                assert_eq!(head, &ret(1));
                let vars: Vec<&str> = binds.iter().map(|(v, _)| v.as_str()).collect();
                assert_eq!(vars, vec!["x", "y"]);
            }
            other => panic!("expected flattened bind, got {:?}", other),
        }
    }

    #[test]
    fn test_is_computer_defaults_true() {
        assert!(ret(1).is_computer());
        let t = Comp::typed(
            CompKind::Map {
                func: "scale".to_string(),
            },
            CompTy::transformer(Ty::Bit, Ty::Bit),
        );
        assert!(!t.is_computer());
    }

    #[test]
    fn test_bind_scoping_in_mentions() {
        // v <- return 1; emit v : v is bound, not free
        let c = Comp::bind_many(
            ret(1),
            vec![(
                "v".to_string(),
                Comp::new(CompKind::Emit(Exp::var("v", Ty::int32()))),
            )],
        );
        assert!(!c.mentions_var("v"));
        // but a different variable read inside is free
        let c2 = Comp::bind_many(
            ret(1),
            vec![(
                "v".to_string(),
                Comp::new(CompKind::Emit(Exp::var("w", Ty::int32()))),
            )],
        );
        assert!(c2.mentions_var("w"));
    }

    #[test]
    fn test_display() {
        let pipe = Comp::par(
            PipelineHint::Maybe {
                burst_in: None,
                burst_out: None,
            },
            Comp::new(CompKind::ReadSrc(Ty::Bit)),
            Comp::new(CompKind::WriteSnk(Ty::Bit)),
        );
        assert_eq!(pipe.to_string(), "read >>> write");
        assert_eq!(
            Comp::activate(TaskId(3), Some("x".to_string())).to_string(),
            "activate t3(x)"
        );
    }
}
