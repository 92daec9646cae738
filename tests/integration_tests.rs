use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::str::contains;

fn isa16() -> Command {
    let mut cmd = Command::cargo_bin("isa16").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("ISA16_MAX_STEPS")
        .env_remove("ISA16_MEMORY_WINDOW");
    cmd
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("isa16-{}-{}", std::process::id(), name))
}

#[test]
fn runs_without_arguments() {
    isa16().assert().success().stdout(contains("isa16"));
}

#[test]
fn runs_program_to_halt() {
    isa16()
        .args(["run", "tests/files/countdown.asm", "--minimal"])
        .assert()
        .success()
        .stdout(contains("Halted program finished"))
        .stdout(contains("R1 0\n"))
        .stdout(contains("R2 15\n"))
        .stdout(contains("PC 12\n"))
        .stdout(contains("HALTED true\n"))
        .stdout(contains("CYCLES 22 INSTRUCTIONS 22\n"))
        .stdout(contains("0x0010: 0x000f\n"));
}

#[test]
fn runs_path_without_subcommand() {
    isa16()
        .arg("tests/files/countdown.asm")
        .assert()
        .success()
        .stdout(contains("Halted"));
}

#[test]
fn prints_traces() {
    isa16()
        .args(["run", "tests/files/countdown.asm", "--minimal", "--trace"])
        .assert()
        .success()
        .stdout(contains("PC=0000 I=5205 ADDI R1, R0, 5\n"))
        .stdout(contains("PC=0006 I=9004 BRZ (not taken) +4\n"))
        .stdout(contains("PC=0006 I=9004 BRZ (taken) +4\n"))
        .stdout(contains("PC=0008 I=83FA JMP -6\n"))
        .stdout(contains("PC=000A I=7410 STORE R2, R0, 16\n"))
        .stdout(contains("PC=000C I=A000 HALT\n"));
}

#[test]
fn loads_program_at_start_address() {
    isa16()
        .args(["run", "tests/files/countdown.asm", "--minimal"])
        .args(["--start", "0x100"])
        .assert()
        .success()
        .stdout(contains("R2 15\n"))
        .stdout(contains("PC 268\n"))
        .stdout(contains("0x0100: 0x5205\n"));
}

#[test]
fn stops_at_breakpoint() {
    isa16()
        .args(["run", "tests/files/countdown.asm", "--minimal"])
        .args(["--break", "6", "--break", "0x8"])
        .assert()
        .success()
        .stdout(contains("Paused breakpoint at 0x0006"))
        .stdout(contains("R1 4\n"))
        .stdout(contains("HALTED false\n"))
        .stdout(contains("CYCLES 3 INSTRUCTIONS 3\n"));
}

#[test]
fn bounds_steps() {
    isa16()
        .args(["run", "tests/files/spin.asm", "--minimal", "--max-steps", "50"])
        .assert()
        .success()
        .stdout(contains("Stopped step limit of 50 reached"))
        .stdout(contains("CYCLES 50 INSTRUCTIONS 50\n"));

    isa16()
        .args(["run", "tests/files/spin.asm", "--minimal"])
        .env("ISA16_MAX_STEPS", "7")
        .assert()
        .success()
        .stdout(contains("CYCLES 7 INSTRUCTIONS 7\n"));
}

#[test]
fn checks_valid_file() {
    isa16()
        .args(["check", "tests/files/countdown.asm"])
        .assert()
        .success()
        .stdout(contains("no errors found!"));
}

#[test]
fn reports_every_error() {
    isa16()
        .args(["check", "tests/files/errors.asm"])
        .assert()
        .failure()
        .stderr(contains("ADD requires 3 operands"))
        .stderr(contains("Immediate out of range: 40 (must be -32 to 31)"))
        .stderr(contains("Unknown label or invalid offset: nowhere"))
        .stderr(contains("Failed to assemble with 3 errors"));

    isa16()
        .args(["run", "tests/files/errors.asm"])
        .assert()
        .failure()
        .stderr(contains("Failed to assemble with 3 errors"));
}

#[test]
fn compiles_and_runs_binary() {
    let dest = temp_path("countdown.bin");
    isa16()
        .args(["compile", "tests/files/countdown.asm"])
        .arg(&dest)
        .assert()
        .success()
        .stdout(contains("Saved"));

    let bytes = fs::read(&dest).unwrap();
    assert_eq!(bytes.len(), 14);
    assert_eq!(&bytes[..2], [0x05, 0x52]);
    assert_eq!(&bytes[12..], [0x00, 0xA0]);

    isa16()
        .args(["run", "--minimal"])
        .arg(&dest)
        .assert()
        .success()
        .stdout(contains("R2 15\n"));

    isa16()
        .arg("disasm")
        .arg(&dest)
        .assert()
        .success()
        .stdout(contains("000c: a000  HALT\n"));

    fs::remove_file(&dest).unwrap();
}

#[test]
fn rejects_unaligned_binary() {
    let path = temp_path("odd.bin");
    fs::write(&path, [0x00, 0xA0, 0x00]).unwrap();
    isa16()
        .arg("run")
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("File is not aligned to 16 bits"));
    fs::remove_file(&path).unwrap();
}

#[test]
fn rejects_unknown_extension() {
    isa16()
        .args(["run", "Cargo.toml"])
        .assert()
        .failure()
        .stderr(contains("File has unknown extension"));
}

#[test]
fn disassembles_source() {
    isa16()
        .args(["disasm", "tests/files/countdown.asm"])
        .assert()
        .success()
        .stdout(contains("0000: 5205  ADDI R1, R0, 5\nloop:\n0002: 1488  ADD R2, R2, R1\n"))
        .stdout(contains("0006: 9004  BRZ +4\n0008: 83fa  JMP -6\ndone:\n000a: 7410"));
}
