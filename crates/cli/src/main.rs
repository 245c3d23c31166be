//! Multipath core simulator CLI.
//!
//! This binary runs one program through the engine. It performs:
//! 1. **Setup:** Loads an optional JSON configuration, applies command-line
//!    overrides, and loads the program from assembly or a JSON image.
//! 2. **Run:** Ticks the simulator until the program halts, the pipeline
//!    drains, or a run limit is reached.
//! 3. **Report:** Prints statistics as text sections or JSON. With `--verify`
//!    the commit log is checked against the in-order interpreter.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use mpsim_core::config::Config;
use mpsim_core::sim::program::Program;
use mpsim_core::sim::simulator::Simulator;
use mpsim_core::stats::STATS_SECTIONS;

#[derive(Parser, Debug)]
#[command(
    name = "mpsim",
    author,
    version,
    about = "Cycle-level out-of-order core simulator with multipath execution",
    long_about = "Run a program on the multipath out-of-order core model.\n\nPrograms are assembly text, or JSON images when the file ends in .json.\nConfiguration is a JSON file; absent fields take their defaults.\n\nExamples:\n  mpsim loop.s\n  mpsim loop.s --config wide.json --max-cycles 100000\n  mpsim loop.s --sections summary,multipath --verify"
)]
struct Cli {
    /// Program to run (assembly, or a `.json` image).
    program: PathBuf,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many cycles (overrides the configuration).
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Stop after this many committed instructions (overrides the configuration).
    #[arg(long)]
    max_insts: Option<u64>,

    /// Print statistics as JSON.
    #[arg(long)]
    json: bool,

    /// Comma-separated statistics sections to print (default: all).
    #[arg(long, value_delimiter = ',')]
    sections: Vec<String>,

    /// Print the machine state when the run ends.
    #[arg(long)]
    dump: bool,

    /// Check every committed write against the in-order interpreter.
    #[arg(long)]
    verify: bool,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    for s in &cli.sections {
        if !STATS_SECTIONS.contains(&s.as_str()) {
            eprintln!(
                "Error: unknown section `{s}` (expected one of: {})",
                STATS_SECTIONS.join(", ")
            );
            process::exit(2);
        }
    }

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).unwrap_or_else(|e| fail(&e)),
        None => Config::default(),
    };
    if let Some(n) = cli.max_cycles {
        config.general.max_cycles = n;
    }
    if let Some(n) = cli.max_insts {
        config.general.max_insts = n;
    }
    if cli.verify {
        config.general.commit_log = true;
    }

    let program = Program::from_file(&cli.program).unwrap_or_else(|e| fail(&e));
    info!(
        program = %cli.program.display(),
        instructions = program.instructions.len(),
        "program loaded"
    );
    debug!(?config, "configuration");

    let mut sim = Simulator::new(config, &program).unwrap_or_else(|e| fail(&e));
    let reason = match sim.run() {
        Ok(reason) => reason,
        Err(failure) => {
            eprintln!("\n[!] {}", failure.error);
            eprintln!("{}", failure.dump);
            sim.stats().print();
            process::exit(1);
        }
    };

    println!("[*] {reason}");
    if cli.dump {
        println!("{}", sim.engine().dump());
    }
    if cli.json {
        match sim.stats().to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => fail(&e),
        }
    } else {
        sim.stats().print_sections(&cli.sections);
    }

    if cli.verify && !verify(&sim, &program) {
        process::exit(3);
    }
}

/// Installs the fmt subscriber, writing to stderr.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Compares the commit log with the interpreter's trace over the same number of instructions.
fn verify(sim: &Simulator, program: &Program) -> bool {
    let log = &sim.engine().state().commit_log;
    let expected = program.interpret(log.len());
    let first_diff = log
        .iter()
        .zip(&expected.commits)
        .position(|(got, want)| got != want);
    match first_diff {
        None if log.len() == expected.commits.len() => {
            println!("[*] verify: {} commits match the interpreter", log.len());
            true
        }
        None => {
            error!(
                committed = log.len(),
                interpreted = expected.commits.len(),
                "commit count differs from the interpreter"
            );
            false
        }
        Some(i) => {
            let detail = serde_json::json!({
                "index": i,
                "committed": log[i],
                "expected": expected.commits[i],
            });
            error!(%detail, "commit log diverges from the interpreter");
            false
        }
    }
}

fn fail(e: &dyn std::fmt::Display) -> ! {
    eprintln!("Error: {e}");
    process::exit(1);
}
