//! End-to-end task splitter tests
//!
//! Exercises the splitting rules against the contracts the runtime
//! relies on: pipeline stages on separate tasks with well-formed queue
//! seams, one activation stub per barrier, standalone collapse, and the
//! explicit rejection of barriers inside loops.

use rill_core::types::Ty;
use rillc::ast::Exp;
use rillc::comp::{Comp, CompKind, PipelineHint, ReadPolicy, TaskId};
use rillc::error::SplitError;
use rillc::taskgen::{Placement, insert_tasks};

fn ret(n: i32) -> Comp {
    Comp::new(CompKind::Return(Exp::i32(n)))
}

fn pipe(left: Comp, right: Comp) -> Comp {
    Comp::par(
        PipelineHint::Maybe {
            burst_in: None,
            burst_out: None,
        },
        left,
        right,
    )
}

/// Activation stubs of a comp, in sequential order.
fn stubs(c: &Comp) -> Vec<(TaskId, Option<String>)> {
    fn walk(c: &Comp, out: &mut Vec<(TaskId, Option<String>)>) {
        match &*c.kind {
            CompKind::ActivateTask { task, input } => out.push((*task, input.clone())),
            CompKind::BindMany { head, binds } => {
                walk(head, out);
                for (_, cc) in binds {
                    walk(cc, out);
                }
            }
            CompKind::Seq { first, second } => {
                walk(first, out);
                walk(second, out);
            }
            CompKind::Par { left, right, .. } => {
                walk(left, out);
                walk(right, out);
            }
            CompKind::LetC { body, .. }
            | CompKind::LetE { body, .. }
            | CompKind::LetERef { body, .. }
            | CompKind::LetFunE { body, .. }
            | CompKind::LetFunC { body, .. }
            | CompKind::LetStruct { body, .. }
            | CompKind::Standalone(body) => walk(body, out),
            CompKind::Branch { then_c, else_c, .. } => {
                walk(then_c, out);
                walk(else_c, out);
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(c, &mut out);
    out
}

// scenario: read >>> standalone(cca) >>> decode >>> write
#[test]
fn test_pipeline_split() {
    let read = Comp::new(CompKind::ReadSrc(Ty::Bit));
    let cca = Comp::standalone(Comp::new(CompKind::Map {
        func: "cca".to_string(),
    }));
    let decode = Comp::new(CompKind::Map {
        func: "decode".to_string(),
    });
    let write = Comp::new(CompKind::WriteSnk(Ty::Bit));
    let c = pipe(read, pipe(cca, pipe(decode, write)));

    let (table, entry) = insert_tasks(c).unwrap();

    // four stage tasks plus the entry
    assert_eq!(table.len(), 5);
    let entry_stubs = stubs(&entry);
    assert_eq!(entry_stubs.len(), 4);

    let stages: Vec<_> = entry_stubs
        .iter()
        .map(|(id, _)| table.get(*id).unwrap())
        .collect();

    // the cca stage is pinned alone, the others are shared
    assert_eq!(stages[0].placement, Placement::Shared);
    assert_eq!(stages[1].placement, Placement::Alone);
    assert_eq!(stages[2].placement, Placement::Shared);
    assert_eq!(stages[3].placement, Placement::Shared);

    // three fresh seam queues; adjacent stages share one
    assert_eq!(stages[0].input_queue, None);
    assert_eq!(stages[3].output_queue, None);
    let mut seams = Vec::new();
    for pair in stages.windows(2) {
        let q = pair[0].output_queue.expect("seam queue");
        assert_eq!(pair[1].input_queue, Some(q));
        seams.push(q);
    }
    seams.sort();
    seams.dedup();
    assert_eq!(seams.len(), 3);
}

#[test]
fn test_pipeline_read_policies() {
    let cca = Comp::standalone(Comp::new(CompKind::Map {
        func: "cca".to_string(),
    }));
    let decode = Comp::new(CompKind::Map {
        func: "decode".to_string(),
    });
    let c = pipe(Comp::new(CompKind::ReadSrc(Ty::Bit)), pipe(cca, decode));
    let (table, entry) = insert_tasks(c).unwrap();

    fn read_policy(c: &Comp) -> Option<ReadPolicy> {
        match &*c.kind {
            CompKind::ReadInternal { policy, .. } => Some(*policy),
            CompKind::Par { left, right, .. } => {
                read_policy(left).or_else(|| read_policy(right))
            }
            _ => None,
        }
    }

    let entry_stubs = stubs(&entry);
    let alone = table.get(entry_stubs[1].0).unwrap();
    assert_eq!(alone.placement, Placement::Alone);
    // a pinned worker may spin on its empty input queue
    assert_eq!(read_policy(&alone.body), Some(ReadPolicy::SpinOnEmpty));
    // a shared task must yield back to the scheduler instead
    let shared = table.get(entry_stubs[2].0).unwrap();
    assert_eq!(shared.placement, Placement::Shared);
    assert_eq!(
        read_policy(&shared.body),
        Some(ReadPolicy::JumpToConsumeOnEmpty)
    );
}

#[test]
fn test_bind_barriers_one_stub_each() {
    // x <- standalone c1; y <- standalone c2; return y: two barriers,
    // two stubs in the entry, three tasks in total
    let c = Comp::bind_many(
        Comp::standalone(ret(1)),
        vec![
            ("x".to_string(), Comp::standalone(ret(2))),
            (
                "y".to_string(),
                Comp::new(CompKind::Return(Exp::var("y", Ty::int32()))),
            ),
        ],
    );
    let (table, entry) = insert_tasks(c).unwrap();
    assert_eq!(table.len(), 3);
    let entry_stubs = stubs(&entry);
    assert_eq!(entry_stubs.len(), 2);
    // the barrier-free tail stays inline in the entry body
    match &*entry.kind {
        CompKind::BindMany { binds, .. } => {
            assert!(matches!(&*binds[1].1.kind, CompKind::Return(_)))
        }
        other => panic!("expected bind chain in entry, got {:?}", other),
    }
}

#[test]
fn test_bind_stub_carries_input_variable() {
    // x <- return 1; standalone { return x }: the task consumes x, so
    // its activation stub carries it
    let c = Comp::bind_many(
        ret(1),
        vec![(
            "x".to_string(),
            Comp::standalone(Comp::new(CompKind::Return(Exp::var("x", Ty::int32())))),
        )],
    );
    let (_, entry) = insert_tasks(c).unwrap();
    let entry_stubs = stubs(&entry);
    assert_eq!(entry_stubs.len(), 1);
    assert_eq!(entry_stubs[0].1, Some("x".to_string()));
}

#[test]
fn test_standalone_collapse() {
    let single = Comp::standalone(ret(7));
    let nested = Comp::standalone(Comp::standalone(ret(7)));
    let (t1, e1) = insert_tasks(single).unwrap();
    let (t2, e2) = insert_tasks(nested).unwrap();
    assert_eq!(t1, t2);
    assert_eq!(e1, e2);
}

#[test]
fn test_seq_splits_at_barrier() {
    let c = Comp::seq(ret(1), Comp::seq(Comp::standalone(ret(2)), ret(3)));
    let (table, entry) = insert_tasks(c).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(stubs(&entry).len(), 1);
    // the fragments around the barrier stay in the entry
    match &*entry.kind {
        CompKind::Seq { first, second } => {
            assert_eq!(first, &ret(1));
            assert!(matches!(&*second.kind, CompKind::Seq { .. }));
        }
        other => panic!("expected sequence in entry, got {:?}", other),
    }
}

#[test]
fn test_branch_arms_become_tasks() {
    let c = Comp::new(CompKind::Branch {
        cond: Exp::var("c", Ty::Bool),
        then_c: Comp::standalone(ret(1)),
        else_c: ret(2),
    });
    let (table, entry) = insert_tasks(c).unwrap();
    // both arms taskified (plus the standalone inside the then arm,
    // plus the entry)
    assert_eq!(table.len(), 4);
    match &*entry.kind {
        CompKind::Branch { then_c, else_c, .. } => {
            assert!(matches!(&*then_c.kind, CompKind::ActivateTask { .. }));
            assert!(matches!(&*else_c.kind, CompKind::ActivateTask { .. }));
        }
        other => panic!("expected branch of stubs, got {:?}", other),
    }
}

#[test]
fn test_let_bindings_lifted_onto_tasks() {
    // let n = 4 in standalone { return n }
    let c = Comp::new(CompKind::LetE {
        var: "n".to_string(),
        inline: rillc::ast::InlineHint::Auto,
        def: Exp::i32(4),
        body: Comp::standalone(Comp::new(CompKind::Return(Exp::var("n", Ty::int32())))),
    });
    let (table, entry) = insert_tasks(c).unwrap();
    let entry_stubs = stubs(&entry);
    assert_eq!(entry_stubs.len(), 1);
    let task = table.get(entry_stubs[0].0).unwrap();
    match &*task.body.kind {
        CompKind::LetE { var, body, .. } => {
            assert_eq!(var, "n");
            assert!(matches!(&*body.kind, CompKind::Return(_)));
        }
        other => panic!("expected lifted binding on task body, got {:?}", other),
    }
}

#[test]
fn test_no_standalone_in_any_task_body() {
    fn has_standalone(c: &Comp) -> bool {
        format!("{}", c).contains("standalone")
    }
    let c = pipe(
        Comp::standalone(ret(1)),
        Comp::bind_many(
            Comp::standalone(Comp::standalone(ret(2))),
            vec![("x".to_string(), Comp::standalone(ret(3)))],
        ),
    );
    let (table, _) = insert_tasks(c).unwrap();
    for (_, info) in table.iter() {
        assert!(!has_standalone(&info.body));
    }
}

#[test]
fn test_barriers_in_loops_rejected() {
    let mk_loops: Vec<(&str, Comp)> = vec![
        (
            "until",
            Comp::new(CompKind::Until {
                cond: Exp::bool(false),
                body: Comp::standalone(ret(1)),
            }),
        ),
        (
            "while",
            Comp::new(CompKind::While {
                cond: Exp::bool(true),
                body: Comp::standalone(ret(1)),
            }),
        ),
        (
            "times",
            Comp::new(CompKind::Times {
                var: "i".to_string(),
                start: Exp::i32(0),
                count: Exp::i32(8),
                body: Comp::standalone(ret(1)),
            }),
        ),
        (
            "repeat",
            Comp::new(CompKind::Repeat {
                ann: None,
                body: Comp::standalone(ret(1)),
            }),
        ),
    ];
    for (name, c) in mk_loops {
        match insert_tasks(c) {
            Err(SplitError::BarrierInLoop { construct, .. }) => assert_eq!(construct, name),
            other => panic!("expected rejection for {}, got {:?}", name, other),
        }
    }
}

#[test]
fn test_loop_without_barrier_is_untouched() {
    let c = Comp::new(CompKind::Repeat {
        ann: None,
        body: pipe(
            Comp::new(CompKind::Map {
                func: "scramble".to_string(),
            }),
            Comp::new(CompKind::Map {
                func: "interleave".to_string(),
            }),
        ),
    });
    let (table, entry) = insert_tasks(c.clone()).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(entry, c);
}

#[test]
fn test_never_hint_keeps_seam_fused() {
    let fused = Comp::par(
        PipelineHint::Never,
        Comp::new(CompKind::Map {
            func: "a".to_string(),
        }),
        Comp::new(CompKind::Map {
            func: "b".to_string(),
        }),
    );
    let (table, entry) = insert_tasks(fused.clone()).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(entry, fused);
}
