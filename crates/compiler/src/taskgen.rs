//! Task-graph splitter
//!
//! Rewrites a comp tree into independently schedulable tasks, cutting at
//! barrier points. A barrier is a `Standalone` node or a call to a
//! function whose body contains one. Each barrier-delimited piece is
//! registered in the task table and replaced in the enclosing comp by an
//! `ActivateTask` stub; barrier-free chunks stay in the activating
//! task's body. Pipeline stages always run on separate tasks, joined by
//! freshly allocated single-producer single-consumer queues.
//!
//! The splitter only rewrites the tree; scheduling, queue backpressure
//! and the empty-queue policies are contracts for the runtime that
//! executes the table.

use crate::comp::{Comp, CompKind, PipelineHint, QueueId, ReadPolicy, TaskId};
use crate::error::SplitError;
use rill_core::types::Ty;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Where the scheduler should place a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// Pin to its own worker (from a `Standalone` marker)
    Alone,
    Shared,
    Unspecified,
}

/// One entry of the task table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub body: Comp,
    /// `None` when the task reads its source directly rather than an
    /// inter-task queue
    pub input_queue: Option<QueueId>,
    pub output_queue: Option<QueueId>,
    pub placement: Placement,
}

/// The splitter's output: every task keyed by its opaque id, plus the
/// id of the entry task (which is itself in the table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTable {
    pub tasks: BTreeMap<TaskId, TaskInfo>,
    pub entry: TaskId,
}

impl TaskTable {
    pub fn get(&self, id: TaskId) -> Option<&TaskInfo> {
        self.tasks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &TaskInfo)> {
        self.tasks.iter().map(|(id, info)| (*id, info))
    }
}

/// Split `c` into tasks. The returned comp is the entry task's body.
pub fn insert_tasks(c: Comp) -> Result<(TaskTable, Comp), SplitError> {
    insert_tasks_between(c, None, None)
}

/// Split `c`, reusing the caller's queues at the entry and exit
/// endpoints instead of allocating fresh ones.
pub fn insert_tasks_between(
    c: Comp,
    qin: Option<QueueId>,
    qout: Option<QueueId>,
) -> Result<(TaskTable, Comp), SplitError> {
    let mut tg = TaskGen::new();
    let entry_body = tg.rewrite(c, qin, qout)?;
    let entry = tg.register(entry_body, qin, qout, Placement::Unspecified);
    let entry_comp = tg.tasks[&entry].body.clone();
    debug!(tasks = tg.tasks.len(), queues = tg.next_queue, "task split complete");
    Ok((
        TaskTable {
            tasks: tg.tasks,
            entry,
        },
        entry_comp,
    ))
}

struct TaskGen {
    next_task: u32,
    next_queue: u32,
    tasks: BTreeMap<TaskId, TaskInfo>,
    /// Names (functions and comp-lets) whose bodies contain a barrier;
    /// calling or mapping one is itself a barrier
    barrier_funs: HashSet<String>,
}

impl TaskGen {
    fn new() -> TaskGen {
        TaskGen {
            next_task: 0,
            next_queue: 0,
            tasks: BTreeMap::new(),
            barrier_funs: HashSet::new(),
        }
    }

    fn fresh_queue(&mut self) -> QueueId {
        let q = QueueId(self.next_queue);
        self.next_queue += 1;
        debug!(queue = %q, "queue allocated");
        q
    }

    fn register(
        &mut self,
        body: Comp,
        input_queue: Option<QueueId>,
        output_queue: Option<QueueId>,
        placement: Placement,
    ) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        let body = strip_standalone(body);
        debug!(task = %id, ?placement, "task registered");
        self.tasks.insert(
            id,
            TaskInfo {
                body,
                input_queue,
                output_queue,
                placement,
            },
        );
        id
    }

    fn contains_barrier(&self, c: &Comp) -> bool {
        let mut funs = self.barrier_funs.clone();
        contains_barrier_with(c, &mut funs)
    }

    fn rewrite(
        &mut self,
        c: Comp,
        qin: Option<QueueId>,
        qout: Option<QueueId>,
    ) -> Result<Comp, SplitError> {
        let Comp { kind, ty, loc } = c;
        let rebuilt = |kind: CompKind| Comp {
            kind: Box::new(kind),
            ty: ty.clone(),
            loc: loc.clone(),
        };
        match *kind {
            CompKind::Standalone(inner) => {
                if self.contains_barrier(&inner) {
                    // nested standalones collapse: only the innermost
                    // defines the barrier
                    self.rewrite(inner, qin, qout)
                } else {
                    let id = self.register(inner, qin, qout, Placement::Alone);
                    Ok(Comp::activate(id, None).at(loc))
                }
            }

            CompKind::Par { hint, left, right } => {
                self.rewrite_par(hint, left, right, loc, qin, qout)
            }

            CompKind::BindMany { head, binds } => {
                let head2 = self.rewrite_bind_item(None, head, qin, qout)?;
                let mut binds2 = Vec::with_capacity(binds.len());
                for (var, ci) in binds {
                    let c2 = self.rewrite_bind_item(Some(&var), ci, qin, qout)?;
                    binds2.push((var, c2));
                }
                Ok(Comp::bind_many(head2, binds2).at(loc))
            }

            CompKind::Seq { first, second } => {
                let first = self.rewrite(first, qin, qout)?;
                let second = self.rewrite(second, qin, qout)?;
                Ok(rebuilt(CompKind::Seq { first, second }))
            }

            CompKind::Branch {
                cond,
                then_c,
                else_c,
            } => {
                if self.contains_barrier(&then_c) || self.contains_barrier(&else_c) {
                    // both arms become tasks behind stubs so the branch
                    // itself stays cheap to schedule
                    let t_body = self.rewrite(then_c, qin, qout)?;
                    let t_id = self.register(t_body, qin, qout, Placement::Shared);
                    let e_body = self.rewrite(else_c, qin, qout)?;
                    let e_id = self.register(e_body, qin, qout, Placement::Shared);
                    Ok(rebuilt(CompKind::Branch {
                        cond,
                        then_c: Comp::activate(t_id, None),
                        else_c: Comp::activate(e_id, None),
                    }))
                } else {
                    let then_c = self.rewrite(then_c, qin, qout)?;
                    let else_c = self.rewrite(else_c, qin, qout)?;
                    Ok(rebuilt(CompKind::Branch {
                        cond,
                        then_c,
                        else_c,
                    }))
                }
            }

            CompKind::Until { cond, body } => {
                self.reject_loop_barrier("until", &body, &loc)?;
                Ok(rebuilt(CompKind::Until { cond, body }))
            }
            CompKind::While { cond, body } => {
                self.reject_loop_barrier("while", &body, &loc)?;
                Ok(rebuilt(CompKind::While { cond, body }))
            }
            CompKind::Times {
                var,
                start,
                count,
                body,
            } => {
                self.reject_loop_barrier("times", &body, &loc)?;
                Ok(rebuilt(CompKind::Times {
                    var,
                    start,
                    count,
                    body,
                }))
            }
            CompKind::Repeat { ann, body } => {
                self.reject_loop_barrier("repeat", &body, &loc)?;
                Ok(rebuilt(CompKind::Repeat { ann, body }))
            }

            CompKind::LetFunC {
                name,
                params,
                def,
                body,
            } => {
                if self.contains_barrier(&def) {
                    self.barrier_funs.insert(name.clone());
                }
                let mark = self.next_task;
                let body2 = self.rewrite(body, qin, qout)?;
                self.lift_onto_new_tasks(mark, |b| {
                    Comp::new(CompKind::LetFunC {
                        name: name.clone(),
                        params: params.clone(),
                        def: def.clone(),
                        body: b,
                    })
                });
                Ok(rebuilt(CompKind::LetFunC {
                    name,
                    params,
                    def,
                    body: body2,
                }))
            }

            CompKind::LetC { var, def, body } => {
                if self.contains_barrier(&def) {
                    self.barrier_funs.insert(var.clone());
                }
                let mark = self.next_task;
                let body2 = self.rewrite(body, qin, qout)?;
                self.lift_onto_new_tasks(mark, |b| {
                    Comp::new(CompKind::LetC {
                        var: var.clone(),
                        def: def.clone(),
                        body: b,
                    })
                });
                Ok(rebuilt(CompKind::LetC {
                    var,
                    def,
                    body: body2,
                }))
            }

            CompKind::LetE {
                var,
                inline,
                def,
                body,
            } => {
                let mark = self.next_task;
                let body2 = self.rewrite(body, qin, qout)?;
                self.lift_onto_new_tasks(mark, |b| {
                    Comp::new(CompKind::LetE {
                        var: var.clone(),
                        inline,
                        def: def.clone(),
                        body: b,
                    })
                });
                Ok(rebuilt(CompKind::LetE {
                    var,
                    inline,
                    def,
                    body: body2,
                }))
            }

            CompKind::LetERef {
                var,
                ty: ref_ty,
                init,
                body,
            } => {
                let mark = self.next_task;
                let body2 = self.rewrite(body, qin, qout)?;
                self.lift_onto_new_tasks(mark, |b| {
                    Comp::new(CompKind::LetERef {
                        var: var.clone(),
                        ty: ref_ty.clone(),
                        init: init.clone(),
                        body: b,
                    })
                });
                Ok(rebuilt(CompKind::LetERef {
                    var,
                    ty: ref_ty,
                    init,
                    body: body2,
                }))
            }

            CompKind::LetFunE {
                name,
                params,
                def,
                body,
            } => {
                let mark = self.next_task;
                let body2 = self.rewrite(body, qin, qout)?;
                self.lift_onto_new_tasks(mark, |b| {
                    Comp::new(CompKind::LetFunE {
                        name: name.clone(),
                        params: params.clone(),
                        def: def.clone(),
                        body: b,
                    })
                });
                Ok(rebuilt(CompKind::LetFunE {
                    name,
                    params,
                    def,
                    body: body2,
                }))
            }

            CompKind::LetStruct { name, fields, body } => {
                let mark = self.next_task;
                let body2 = self.rewrite(body, qin, qout)?;
                self.lift_onto_new_tasks(mark, |b| {
                    Comp::new(CompKind::LetStruct {
                        name: name.clone(),
                        fields: fields.clone(),
                        body: b,
                    })
                });
                Ok(rebuilt(CompKind::LetStruct {
                    name,
                    fields,
                    body: body2,
                }))
            }

            CompKind::VectComp { ann, body } => {
                let mark = self.next_task;
                let body2 = self.rewrite(body, qin, qout)?;
                self.lift_onto_new_tasks(mark, |b| {
                    Comp::new(CompKind::VectComp { ann, body: b })
                });
                Ok(rebuilt(CompKind::VectComp { ann, body: body2 }))
            }

            k @ CompKind::Call { .. } => {
                let name = match &k {
                    CompKind::Call { name, .. } => name.clone(),
                    _ => unreachable!("matched call"),
                };
                let call = rebuilt(k);
                if self.barrier_funs.contains(&name) {
                    // no structural rule splits inside an opaque call;
                    // the call itself becomes the task
                    let id = self.register(call, qin, qout, Placement::Shared);
                    Ok(Comp::activate(id, None))
                } else {
                    Ok(call)
                }
            }

            k @ CompKind::Map { .. } => {
                let func = match &k {
                    CompKind::Map { func } => func.clone(),
                    _ => unreachable!("matched map"),
                };
                let map = rebuilt(k);
                if self.barrier_funs.contains(&func) {
                    let id = self.register(map, qin, qout, Placement::Shared);
                    Ok(Comp::activate(id, None))
                } else {
                    Ok(map)
                }
            }

            k @ CompKind::Var(_) => {
                let name = match &k {
                    CompKind::Var(v) => v.clone(),
                    _ => unreachable!("matched var"),
                };
                let var = rebuilt(k);
                if self.barrier_funs.contains(&name) {
                    let id = self.register(var, qin, qout, Placement::Shared);
                    Ok(Comp::activate(id, None))
                } else {
                    Ok(var)
                }
            }

            // leaves and expression-bearing nodes: no sub-comps
            k => Ok(rebuilt(k)),
        }
    }

    /// Rewrite one item of a bind chain. When the item becomes a task
    /// stub and it consumed the binder of its predecessor's result, the
    /// stub carries that variable so the scheduler passes the value in.
    fn rewrite_bind_item(
        &mut self,
        binder: Option<&str>,
        c: Comp,
        qin: Option<QueueId>,
        qout: Option<QueueId>,
    ) -> Result<Comp, SplitError> {
        let wants_input = binder.map(|v| c.mentions_var(v)).unwrap_or(false);
        let mut r = self.rewrite(c, qin, qout)?;
        if wants_input {
            if let CompKind::ActivateTask { input, .. } = &mut *r.kind {
                *input = binder.map(str::to_string);
            }
        }
        Ok(r)
    }

    fn rewrite_par(
        &mut self,
        hint: PipelineHint,
        left: Comp,
        right: Comp,
        loc: Option<rill_core::loc::SourceLocation>,
        qin: Option<QueueId>,
        qout: Option<QueueId>,
    ) -> Result<Comp, SplitError> {
        if hint == PipelineHint::Never {
            // the seam is pinned shut; only inner barriers split
            let left = self.rewrite(left, qin, qout)?;
            let right = self.rewrite(right, qin, qout)?;
            return Ok(Comp::par(hint, left, right).at(loc));
        }
        let mut stages = Vec::new();
        flatten_stages(left, &mut stages);
        flatten_stages(right, &mut stages);
        let k = stages.len();
        let seams: Vec<QueueId> = (0..k - 1).map(|_| self.fresh_queue()).collect();

        let mut stubs = Vec::with_capacity(k);
        for (i, stage) in stages.into_iter().enumerate() {
            let stage_qin = if i == 0 { qin } else { Some(seams[i - 1]) };
            let stage_qout = if i + 1 == k { qout } else { Some(seams[i]) };

            // standalone wrappers on a stage pin its placement
            let mut placement = Placement::Shared;
            let mut core = stage;
            while let CompKind::Standalone(inner) = *core.kind {
                placement = Placement::Alone;
                core = inner;
            }
            let mut body = self.rewrite(core, stage_qin, stage_qout)?;

            // thread the seam queues through the stage body; a pinned
            // worker may spin, a shared one must yield to its consumer
            if i > 0 {
                let policy = if placement == Placement::Alone {
                    ReadPolicy::SpinOnEmpty
                } else {
                    ReadPolicy::JumpToConsumeOnEmpty
                };
                body = Comp::par(
                    PipelineHint::Always,
                    Comp::new(CompKind::ReadInternal {
                        queue: seams[i - 1],
                        policy,
                    }),
                    body,
                );
            }
            if i + 1 < k {
                body = Comp::par(
                    PipelineHint::Always,
                    body,
                    Comp::new(CompKind::WriteInternal { queue: seams[i] }),
                );
            }
            let id = self.register(body, stage_qin, stage_qout, placement);
            stubs.push(Comp::activate(id, None));
        }

        // the entry body starts every stage in pipeline order
        let entry = stubs
            .into_iter()
            .rev()
            .reduce(|acc, stub| Comp::seq(stub, acc))
            .expect("a pipeline has at least one stage");
        Ok(entry.at(loc))
    }

    fn reject_loop_barrier(
        &self,
        construct: &'static str,
        body: &Comp,
        loc: &Option<rill_core::loc::SourceLocation>,
    ) -> Result<(), SplitError> {
        if self.contains_barrier(body) {
            return Err(SplitError::BarrierInLoop {
                construct,
                loc: loc.clone(),
            });
        }
        Ok(())
    }

    /// Bindings scope over the tasks carved out beneath them; copy the
    /// binding onto each such task body so the code generator can place
    /// it as a file-scope declaration.
    fn lift_onto_new_tasks(&mut self, mark: u32, wrap: impl Fn(Comp) -> Comp) {
        for n in mark..self.next_task {
            if let Some(info) = self.tasks.get_mut(&TaskId(n)) {
                let body = std::mem::replace(
                    &mut info.body,
                    Comp::new(CompKind::Take(Ty::Unit)),
                );
                info.body = strip_standalone(wrap(body));
            }
        }
    }
}

/// Pipeline stages of a par spine, left to right. Seams hinted `Never`
/// keep their subtree as a single stage.
fn flatten_stages(c: Comp, out: &mut Vec<Comp>) {
    match *c.kind {
        CompKind::Par { hint, left, right } if hint != PipelineHint::Never => {
            flatten_stages(left, out);
            flatten_stages(right, out);
        }
        k => out.push(Comp {
            kind: Box::new(k),
            ty: c.ty,
            loc: c.loc,
        }),
    }
}

fn contains_barrier_with(c: &Comp, funs: &mut HashSet<String>) -> bool {
    match &*c.kind {
        CompKind::Standalone(_) => true,
        CompKind::Var(v) => funs.contains(v),
        CompKind::Call { name, args } => {
            funs.contains(name)
                || args.iter().any(|a| match a {
                    crate::comp::CallArg::CompArg(cc) => contains_barrier_with(cc, funs),
                    crate::comp::CallArg::ExpArg(_) => false,
                })
        }
        CompKind::Map { func } => funs.contains(func),
        CompKind::LetFunC {
            name, def, body, ..
        } => {
            if contains_barrier_with(def, funs) {
                funs.insert(name.clone());
            }
            contains_barrier_with(body, funs)
        }
        CompKind::LetC { var, def, body } => {
            if contains_barrier_with(def, funs) {
                funs.insert(var.clone());
            }
            contains_barrier_with(body, funs)
        }
        CompKind::BindMany { head, binds } => {
            contains_barrier_with(head, funs)
                || binds.iter().any(|(_, cc)| contains_barrier_with(cc, funs))
        }
        CompKind::Seq { first, second } => {
            contains_barrier_with(first, funs) || contains_barrier_with(second, funs)
        }
        CompKind::Par { left, right, .. } => {
            contains_barrier_with(left, funs) || contains_barrier_with(right, funs)
        }
        CompKind::LetE { body, .. }
        | CompKind::LetERef { body, .. }
        | CompKind::LetFunE { body, .. }
        | CompKind::LetStruct { body, .. } => contains_barrier_with(body, funs),
        CompKind::Branch { then_c, else_c, .. } => {
            contains_barrier_with(then_c, funs) || contains_barrier_with(else_c, funs)
        }
        CompKind::Until { body, .. }
        | CompKind::While { body, .. }
        | CompKind::Times { body, .. }
        | CompKind::Repeat { body, .. }
        | CompKind::VectComp { body, .. } => contains_barrier_with(body, funs),
        CompKind::Emit(_)
        | CompKind::Emits(_)
        | CompKind::Return(_)
        | CompKind::Take(_)
        | CompKind::Takes { .. }
        | CompKind::Filter { .. }
        | CompKind::ReadSrc(_)
        | CompKind::WriteSnk(_)
        | CompKind::ReadInternal { .. }
        | CompKind::WriteInternal { .. }
        | CompKind::Mitigate { .. }
        | CompKind::ActivateTask { .. } => false,
    }
}

/// Remove every `Standalone` marker: task bodies carry placement in the
/// table instead.
fn strip_standalone(c: Comp) -> Comp {
    let Comp { kind, ty, loc } = c;
    let rebuilt = |kind: CompKind| Comp {
        kind: Box::new(kind),
        ty: ty.clone(),
        loc: loc.clone(),
    };
    match *kind {
        CompKind::Standalone(inner) => strip_standalone(inner),
        CompKind::BindMany { head, binds } => rebuilt(CompKind::BindMany {
            head: strip_standalone(head),
            binds: binds
                .into_iter()
                .map(|(v, cc)| (v, strip_standalone(cc)))
                .collect(),
        }),
        CompKind::Seq { first, second } => rebuilt(CompKind::Seq {
            first: strip_standalone(first),
            second: strip_standalone(second),
        }),
        CompKind::Par { hint, left, right } => rebuilt(CompKind::Par {
            hint,
            left: strip_standalone(left),
            right: strip_standalone(right),
        }),
        CompKind::LetC { var, def, body } => rebuilt(CompKind::LetC {
            var,
            def: strip_standalone(def),
            body: strip_standalone(body),
        }),
        CompKind::LetE {
            var,
            inline,
            def,
            body,
        } => rebuilt(CompKind::LetE {
            var,
            inline,
            def,
            body: strip_standalone(body),
        }),
        CompKind::LetERef {
            var,
            ty: rty,
            init,
            body,
        } => rebuilt(CompKind::LetERef {
            var,
            ty: rty,
            init,
            body: strip_standalone(body),
        }),
        CompKind::LetFunE {
            name,
            params,
            def,
            body,
        } => rebuilt(CompKind::LetFunE {
            name,
            params,
            def,
            body: strip_standalone(body),
        }),
        CompKind::LetFunC {
            name,
            params,
            def,
            body,
        } => rebuilt(CompKind::LetFunC {
            name,
            params,
            def: strip_standalone(def),
            body: strip_standalone(body),
        }),
        CompKind::LetStruct { name, fields, body } => rebuilt(CompKind::LetStruct {
            name,
            fields,
            body: strip_standalone(body),
        }),
        CompKind::Call { name, args } => rebuilt(CompKind::Call {
            name,
            args: args
                .into_iter()
                .map(|a| match a {
                    crate::comp::CallArg::CompArg(cc) => {
                        crate::comp::CallArg::CompArg(strip_standalone(cc))
                    }
                    e => e,
                })
                .collect(),
        }),
        CompKind::Branch {
            cond,
            then_c,
            else_c,
        } => rebuilt(CompKind::Branch {
            cond,
            then_c: strip_standalone(then_c),
            else_c: strip_standalone(else_c),
        }),
        CompKind::Until { cond, body } => rebuilt(CompKind::Until {
            cond,
            body: strip_standalone(body),
        }),
        CompKind::While { cond, body } => rebuilt(CompKind::While {
            cond,
            body: strip_standalone(body),
        }),
        CompKind::Times {
            var,
            start,
            count,
            body,
        } => rebuilt(CompKind::Times {
            var,
            start,
            count,
            body: strip_standalone(body),
        }),
        CompKind::Repeat { ann, body } => rebuilt(CompKind::Repeat {
            ann,
            body: strip_standalone(body),
        }),
        CompKind::VectComp { ann, body } => rebuilt(CompKind::VectComp {
            ann,
            body: strip_standalone(body),
        }),
        k => rebuilt(k),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Exp;

    fn ret(n: i32) -> Comp {
        Comp::new(CompKind::Return(Exp::i32(n)))
    }

    #[test]
    fn test_no_barrier_single_task() {
        let (table, entry) = insert_tasks(ret(1)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(entry, ret(1));
        assert_eq!(table.get(table.entry).unwrap().body, ret(1));
    }

    #[test]
    fn test_standalone_strip_in_task_bodies() {
        let c = Comp::standalone(ret(1));
        let (table, entry) = insert_tasks(c).unwrap();
        // entry activates the standalone task; the task body has no
        // standalone marker left
        assert_eq!(table.len(), 2);
        match &*entry.kind {
            CompKind::ActivateTask { task, .. } => {
                let info = table.get(*task).unwrap();
                assert_eq!(info.placement, Placement::Alone);
                assert_eq!(info.body, ret(1));
            }
            other => panic!("expected activation stub, got {:?}", other),
        }
    }

    #[test]
    fn test_barrier_function_call_becomes_task() {
        // fun comp f() = standalone { return 1 } in f()
        let c = Comp::new(CompKind::LetFunC {
            name: "f".to_string(),
            params: vec![],
            def: Comp::standalone(ret(1)),
            body: Comp::new(CompKind::Call {
                name: "f".to_string(),
                args: vec![],
            }),
        });
        let (table, entry) = insert_tasks(c).unwrap();
        assert_eq!(table.len(), 2);
        // the call task keeps the function binding, standalone stripped
        let call_task = table
            .iter()
            .find(|(id, _)| *id != table.entry)
            .map(|(_, info)| info.body.clone())
            .unwrap();
        match &*call_task.kind {
            CompKind::LetFunC { name, def, body, .. } => {
                assert_eq!(name, "f");
                assert_eq!(def, &ret(1));
                assert!(matches!(&*body.kind, CompKind::Call { .. }));
            }
            other => panic!("expected lifted function binding, got {:?}", other),
        }
        match &*entry.kind {
            CompKind::LetFunC { body, .. } => {
                assert!(matches!(&*body.kind, CompKind::ActivateTask { .. }))
            }
            other => panic!("expected function binding around stub, got {:?}", other),
        }
    }

    #[test]
    fn test_barrier_in_loop_rejected() {
        let c = Comp::new(CompKind::Repeat {
            ann: None,
            body: Comp::standalone(ret(1)),
        });
        match insert_tasks(c) {
            Err(SplitError::BarrierInLoop { construct, .. }) => {
                assert_eq!(construct, "repeat")
            }
            other => panic!("expected loop rejection, got {:?}", other),
        }
    }
}
