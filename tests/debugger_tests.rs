use assert_cmd::Command;
use predicates::str::{contains, diff};

fn debug(commands: &str) -> Command {
    let mut cmd = Command::cargo_bin("isa16").unwrap();
    cmd.env_remove("RUST_LOG")
        .args(["debug", "tests/files/countdown.asm", "--minimal"])
        .args(["--command", commands]);
    cmd
}

#[test]
fn debugs_to_breakpoint_and_halt() {
    debug("break add done; run; registers; memory 0x10; step; step; memory 0x10")
        .assert()
        .success()
        .stdout(contains("R2 15\nR3 0\n"))
        .stdout(contains("0x0010: 0x0000\n"))
        .stdout(contains("PC=000A I=7410 STORE R2, R0, 16\n"))
        .stdout(contains("PC=000C I=A000 HALT\n"))
        .stdout(contains("0x0010: 0x000f\n"))
        .stderr(diff(
            "Added breakpoint at 0x000a.\n\
             Breakpoint reached at 0x000a.\n\
             Program halted.\n",
        ));
}

#[test]
fn lists_and_removes_breakpoints() {
    debug("break add loop; b a 0x8; break add 8; break list; break remove loop; break remove loop; break list")
        .assert()
        .success()
        .stderr(diff(
            "Added breakpoint at 0x0002.\n\
             Added breakpoint at 0x0008.\n\
             Breakpoint already exists at 0x0008.\n\
             Breakpoints:\n\
             \x20 0x0002  loop\n\
             \x20 0x0008\n\
             Removed breakpoint at 0x0002.\n\
             No breakpoint exists at 0x0002.\n\
             Breakpoints:\n\
             \x20 0x0008\n",
        ));
}

#[test]
fn passes_breakpoint_on_next_run() {
    debug("break add 4\nrun\nrun\nregisters")
        .assert()
        .success()
        .stdout(contains("R1 4\n"))
        .stdout(contains("PC 4\n"))
        .stderr(diff(
            "Added breakpoint at 0x0004.\n\
             Breakpoint reached at 0x0004.\n\
             Breakpoint reached at 0x0004.\n",
        ));
}

#[test]
fn zero_step_bound_executes_nothing() {
    let mut cmd = Command::cargo_bin("isa16").unwrap();
    cmd.env_remove("RUST_LOG")
        .args(["debug", "tests/files/countdown.asm", "--minimal"])
        .args(["--max-steps", "0", "--command", "run; registers"]);
    cmd.assert()
        .success()
        .stdout(contains("R1 0
"))
        .stdout(contains("PC 0
"))
        .stdout(contains("CYCLES 0 INSTRUCTIONS 0
"));
}

#[test]
fn applies_breakpoints_from_arguments() {
    let mut cmd = Command::cargo_bin("isa16").unwrap();
    cmd.env_remove("RUST_LOG")
        .args(["debug", "tests/files/countdown.asm", "--minimal"])
        .args(["--start", "0x20", "--break", "0x2a"])
        .args(["--command", "run; memory done 2"]);
    cmd.assert()
        .success()
        .stdout(contains("0x002a: 0x7410\n0x002c: 0xa000\n"))
        .stderr(diff("Breakpoint reached at 0x002a.\n"));
}

#[test]
fn resets_and_reloads() {
    debug("run; reset; memory 0; reload; step")
        .assert()
        .success()
        .stdout(contains("0x0000: 0x0000\n"))
        .stdout(contains("PC=0000 I=5205 ADDI R1, R0, 5\n"))
        .stderr(contains("Program halted."))
        .stderr(contains("Reset machine."))
        .stderr(contains("Reloaded program at 0x0000."));
}

#[test]
fn reports_invalid_commands() {
    debug("jump 4; step many; break; memory nowhere; quit; step")
        .assert()
        .success()
        .stderr(diff(
            "Error: Not a command: `jump`\n\
             Error: Invalid value `many` for argument `count`\n\
             Error: Missing subcommand for `break`\n\
             Label not found named `nowhere`.\n",
        ));
}

#[test]
fn reads_commands_from_stdin() {
    let mut cmd = Command::cargo_bin("isa16").unwrap();
    cmd.env_remove("RUST_LOG")
        .args(["debug", "tests/files/countdown.asm", "--minimal"])
        .write_stdin("step 2\nregisters; quit\n");
    cmd.assert()
        .success()
        .stdout(contains("PC=0002 I=1488 ADD R2, R2, R1\n"))
        .stdout(contains("R2 5\n"));
}

#[test]
fn prints_help_message() {
    debug("help")
        .assert()
        .success()
        .stderr(diff(
            include_str!("../src/debugger/help.txt").replace("\r\n", "\n") + "\n",
        ));
}
