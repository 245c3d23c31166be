//! Program Loading and Run Surface.
//!
//! Covers the two program file formats, assembler diagnostics, run limits and
//! the report and dump formats the command line prints.

use std::io::Write;

use mpsim_core::common::ProgramError;
use mpsim_core::config::Config;
use mpsim_core::sim::program::Program;
use mpsim_core::sim::simulator::{ExitReason, Simulator};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::harness::TestContext;

const SUM: &str = "
    .reg r1 5
          addi r2, r1, 3
          halt
";

const SUM_JSON: &str = r#"{
    "registers": { "1": 5 },
    "instructions": [
        { "op": "addi", "rd": 2, "rs1": 1, "imm": 3 },
        { "op": "halt" }
    ]
}"#;

fn temp_file(suffix: &str, text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn asm_and_json_files_load_the_same_program() {
    let asm = temp_file(".s", SUM);
    let json = temp_file(".json", SUM_JSON);
    let from_asm = Program::from_file(asm.path()).unwrap();
    let from_json = Program::from_file(json.path()).unwrap();
    assert_eq!(from_asm, from_json);

    let mut ctx = TestContext::with_program(from_json, Config::default());
    assert_eq!(ctx.run(), ExitReason::Halted);
    assert_eq!(ctx.reg(2), 8);
}

#[test]
fn missing_program_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Program::from_file(dir.path().join("absent.s")),
        Err(ProgramError::Io { .. })
    ));
}

#[rstest]
#[case::bad_mnemonic("addi r1, r0, 1\nfrobnicate r1\n", 2)]
#[case::bad_register("add r1, r99, r2\n", 1)]
fn syntax_errors_name_the_line(#[case] src: &str, #[case] line: usize) {
    match Program::from_asm(src) {
        Err(ProgramError::Syntax { line: l, .. }) => assert_eq!(l, line),
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn empty_image_rejected() {
    assert!(matches!(
        Program::from_json(r#"{ "instructions": [] }"#),
        Err(ProgramError::Empty)
    ));
    assert!(matches!(Program::from_json("[1, 2"), Err(ProgramError::Json(_))));
}

#[test]
fn instruction_limit_stops_run() {
    let program = Program::from_asm("loop: addi r1, r1, 1\nj loop\n").unwrap();
    let mut config = Config::default();
    config.general.max_insts = 10;
    let mut sim = Simulator::new(config, &program).unwrap();
    assert_eq!(sim.run().unwrap(), ExitReason::InstructionLimit);
    assert!(sim.stats().committed >= 10);
}

#[test]
fn report_sections_filter_output() {
    let mut ctx = TestContext::new(SUM, Config::default());
    ctx.run();

    let mut all = Vec::new();
    ctx.stats().write_sections(&mut all, &[]).unwrap();
    let all = String::from_utf8(all).unwrap();
    assert!(all.contains("sim_cycles"));
    assert!(all.contains("PIPELINE"));

    let mut summary = Vec::new();
    ctx.stats()
        .write_sections(&mut summary, &["summary".to_string()])
        .unwrap();
    let summary = String::from_utf8(summary).unwrap();
    assert!(summary.contains("sim_insts"));
    assert!(!summary.contains("PIPELINE"));

    let json: serde_json::Value = serde_json::from_str(&ctx.stats().to_json().unwrap()).unwrap();
    assert_eq!(json["committed"], 2);
}

#[test]
fn dump_shows_live_paths() {
    let mut ctx = TestContext::new(SUM, Config::default());
    ctx.tick();
    let dump = ctx.sim.engine().dump();
    let text = dump.to_string();
    assert!(text.starts_with("==== machine state at cycle 1 ===="));
    assert!(text.contains("t0:"));
    let json: serde_json::Value = serde_json::from_str(&dump.to_json().unwrap()).unwrap();
    assert_eq!(json["cycle"], 1);
}
