//! Rill compiler debug driver
//!
//! Command-line interface over the evaluator and the task splitter.
//! Consumes already-typed ASTs serialized as JSON by the front end;
//! this is a development tool, not the production driver.

use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;

use rillc::config::FoldConfig;
use rillc::eval::{eval_full, eval_nondet, eval_partial};
use rillc::taskgen::insert_tasks;
use rillc::{Comp, Exp};

#[derive(ClapParser)]
#[command(name = "rillc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rill compiler core - fold expressions and split task graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EvalMode {
    Full,
    Partial,
    Nondet,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a typed expression AST (JSON)
    Fold {
        /// Input expression AST file
        input: PathBuf,

        /// Evaluation mode
        #[arg(long, value_enum, default_value = "partial")]
        mode: EvalMode,

        /// Path to evaluator configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print per-variable size statistics after folding
        #[arg(long)]
        stats: bool,
    },

    /// Split a typed comp AST (JSON) into a task table
    Tasks {
        /// Input comp AST file
        input: PathBuf,

        /// Fold embedded expressions before splitting
        #[arg(long)]
        fold: bool,

        /// Path to evaluator configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Fold {
            input,
            mode,
            config,
            stats,
        } => run_fold(&input, mode, config.as_deref(), stats),
        Commands::Tasks {
            input,
            fold,
            config,
        } => run_tasks(&input, fold, config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> FoldConfig {
    match path {
        Some(p) => FoldConfig::load(p).unwrap_or_else(|e| {
            eprintln!("error: {}", e);
            process::exit(1);
        }),
        None => FoldConfig::default(),
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: cannot read {}: {}", path.display(), e);
        process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("error: {} is not a valid AST: {}", path.display(), e);
        process::exit(1);
    })
}

fn print_log(log: &[(bool, Exp)]) {
    for (newline, arg) in log {
        if *newline {
            println!("print: {}", arg);
        } else {
            print!("print: {}", arg);
        }
    }
}

fn run_fold(input: &Path, mode: EvalMode, config: Option<&Path>, stats: bool) {
    let cfg = load_config(config);
    let exp: Exp = load_json(input);
    match mode {
        EvalMode::Full => {
            let (r, log) = eval_full(&exp, &cfg);
            print_log(&log);
            match r {
                Ok(v) => println!("{}", v),
                Err(e) => {
                    eprintln!("error: {}", e);
                    process::exit(1);
                }
            }
        }
        EvalMode::Partial => {
            let (r, log, sizes) = eval_partial(&exp, &cfg);
            print_log(&log);
            match r {
                Ok(folded) => {
                    println!("{}", folded);
                    if stats {
                        let mut entries: Vec<_> = sizes.into_iter().collect();
                        entries.sort();
                        for (var, size) in entries {
                            println!("size {} = {}", var, size);
                        }
                    }
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    process::exit(1);
                }
            }
        }
        EvalMode::Nondet => {
            let branches = eval_nondet(&exp, &cfg);
            for (i, (r, log)) in branches.iter().enumerate() {
                print_log(log);
                match r {
                    Ok(e) => println!("branch {}: {}", i, e),
                    Err(e) => println!("branch {}: error: {}", i, e),
                }
            }
        }
    }
}

fn run_tasks(input: &Path, fold: bool, config: Option<&Path>) {
    let cfg = load_config(config);
    let mut comp: Comp = load_json(input);
    if fold {
        comp = rillc::fold_comp(&comp, &cfg).unwrap_or_else(|e| {
            eprintln!("error: {}", e);
            process::exit(1);
        });
    }
    match insert_tasks(comp) {
        Ok((table, entry)) => {
            println!("entry {}: {}", table.entry, entry);
            for (id, info) in table.iter() {
                let q = |q: Option<rillc::QueueId>| {
                    q.map(|q| q.to_string()).unwrap_or_else(|| "-".to_string())
                };
                println!(
                    "{} [{} -> {}] {:?}: {}",
                    id,
                    q(info.input_queue),
                    q(info.output_queue),
                    info.placement,
                    info.body
                );
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}
