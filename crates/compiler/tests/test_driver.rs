//! Driver-facing tests: the JSON AST interchange format and the TOML
//! configuration loading, through real files.

use rill_core::ops::BinOp;
use rill_core::types::Ty;
use rillc::ast::Exp;
use rillc::comp::{Comp, CompKind, PipelineHint};
use rillc::config::FoldConfig;
use rillc::taskgen::insert_tasks;
use std::io::Write;

fn sample_exp() -> Exp {
    Exp::bin(
        BinOp::Add,
        Exp::var("gain", Ty::int32()),
        Exp::i32(6),
        Ty::int32(),
    )
}

#[test]
fn test_exp_json_round_trip_through_file() {
    let exp = sample_exp();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", serde_json::to_string(&exp).unwrap()).unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let back: Exp = serde_json::from_str(&text).unwrap();
    assert_eq!(back, exp);
}

#[test]
fn test_comp_json_round_trip() {
    let c = Comp::par(
        PipelineHint::Maybe {
            burst_in: Some(16),
            burst_out: None,
        },
        Comp::new(CompKind::ReadSrc(Ty::Bit)),
        Comp::standalone(Comp::new(CompKind::Emit(sample_exp()))),
    );
    let json = serde_json::to_string(&c).unwrap();
    let back: Comp = serde_json::from_str(&json).unwrap();
    assert_eq!(back, c);
}

#[test]
fn test_task_table_serializes() {
    let c = Comp::par(
        PipelineHint::Always,
        Comp::new(CompKind::ReadSrc(Ty::Bit)),
        Comp::new(CompKind::WriteSnk(Ty::Bit)),
    );
    let (table, _) = insert_tasks(c).unwrap();
    let json = serde_json::to_string(&table).unwrap();
    let back: rillc::taskgen::TaskTable = serde_json::from_str(&json).unwrap();
    assert_eq!(back, table);
}

#[test]
fn test_config_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "unroll_limit = 64\nwriteout_limit = 8\n").unwrap();
    let cfg = FoldConfig::load(file.path()).unwrap();
    assert_eq!(cfg.unroll_limit, 64);
    assert_eq!(cfg.writeout_limit, 8);
    assert_eq!(cfg.implicit_array_limit, 2048);
}

#[test]
fn test_config_load_rejects_bad_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "unroll_limit = \"many\"").unwrap();
    assert!(FoldConfig::load(file.path()).is_err());
}
