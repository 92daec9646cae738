mod command;
mod source;

use std::ops::ControlFlow;

pub use self::command::{Command, CommandError, Location};
use self::source::Source;
use crate::asm::LabelTable;
use crate::breakpoint::Breakpoints;
use crate::dprintln;
use crate::output::Output;
use crate::runtime::{Simulator, Trace};

const HELP: &str = include_str!("./help.txt");

#[derive(Debug)]
pub struct DebuggerOptions {
    /// Commands to run instead of reading standard input.
    pub command: Option<String>,
    /// Bound for `run` without an explicit count.
    pub max_steps: usize,
}

/// Command loop driving a single [`Simulator`].
pub struct Debugger {
    sim: Simulator,
    /// Loaded again by `reload`.
    program: Vec<u16>,
    start: u16,
    /// Label addresses, relative to `start`.
    labels: LabelTable,
    source: Source,
    max_steps: usize,
    /// Breakpoint which stopped the last `step` or `run`. Passed on the next attempt.
    current_breakpoint: Option<u16>,
}

impl Debugger {
    pub fn new(
        opts: DebuggerOptions,
        program: Vec<u16>,
        start: u16,
        labels: LabelTable,
        breakpoints: impl Into<Breakpoints>,
    ) -> Self {
        let mut sim = Simulator::new();
        sim.load_program(&program, start);
        let breakpoints: Breakpoints = breakpoints.into();
        for address in &breakpoints {
            sim.add_breakpoint(*address);
        }
        Self {
            sim,
            program,
            start,
            labels,
            source: Source::from(opts.command),
            max_steps: opts.max_steps,
            current_breakpoint: None,
        }
    }

    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    /// Read and execute commands until `quit` or the end of input.
    pub fn run(&mut self) {
        dprintln!(
            Sometimes,
            "Debugger started. Type `help` for a list of commands."
        );
        while let Some(line) = self.source.read() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match Command::try_from(line) {
                Ok(command) => {
                    if self.execute(command).is_break() {
                        return;
                    }
                }
                Err(err) => dprintln!(Always, "Error: {}", err),
            }
        }
        dprintln!(Sometimes, "Reached end of input. Exiting debugger.");
    }

    fn execute(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Help => dprintln!(Always, "{}", HELP),
            Command::Step { count } => self.resume(count, true),
            Command::Run { max_steps } => self.resume(max_steps.unwrap_or(self.max_steps), false),
            Command::BreakList => self.list_breakpoints(),
            Command::BreakAdd { location } => {
                let Some(address) = self.resolve(&location) else {
                    return ControlFlow::Continue(());
                };
                if self.sim.add_breakpoint(address) {
                    dprintln!(Always, "Added breakpoint at 0x{:04x}.", address);
                } else {
                    dprintln!(Always, "Breakpoint already exists at 0x{:04x}.", address);
                }
            }
            Command::BreakRemove { location } => {
                let Some(address) = self.resolve(&location) else {
                    return ControlFlow::Continue(());
                };
                if self.sim.remove_breakpoint(address) {
                    if self.current_breakpoint == Some(address) {
                        self.current_breakpoint = None;
                    }
                    dprintln!(Always, "Removed breakpoint at 0x{:04x}.", address);
                } else {
                    dprintln!(Always, "No breakpoint exists at 0x{:04x}.", address);
                }
            }
            Command::Registers => Output::Normal.print_registers(&self.sim.snapshot(0)),
            Command::Memory { location, count } => {
                if let Some(address) = self.resolve(&location) {
                    Output::Normal.print_memory(&self.sim, address, count);
                }
            }
            Command::Reset => {
                self.sim.reset();
                self.current_breakpoint = None;
                dprintln!(
                    Always,
                    "Reset machine. Memory and breakpoints were cleared; use `reload` to load the program."
                );
            }
            Command::Reload => {
                self.sim.load_program(&self.program, self.start);
                self.current_breakpoint = None;
                dprintln!(
                    Always,
                    "Reloaded program at 0x{:04x}. Breakpoints were kept.",
                    self.start
                );
            }
            Command::Quit => {
                dprintln!(Sometimes, "Exiting debugger.");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Execute up to `limit` instructions, stopping early at `HALT` or a breakpoint.
    fn resume(&mut self, limit: usize, echo: bool) {
        if self.sim.is_halted() {
            dprintln!(
                Always,
                "Program has halted. Use `reload` to run it again."
            );
            return;
        }
        if limit == 0 {
            dprintln!(Sometimes, "Executed 0 instructions.");
            return;
        }

        let first = match self.current_breakpoint.take() {
            Some(pc) if i32::from(pc) == self.sim.pc() => self.sim.step_over(),
            _ => self.sim.step(),
        };
        let stopped = first.as_ref().is_some_and(Trace::is_breakpoint);
        let mut traces: Vec<Trace> = first.into_iter().collect();
        if !stopped && limit > 1 {
            traces.extend(self.sim.run(limit - 1));
        }

        let executed = traces.iter().filter(|trace| !trace.is_breakpoint()).count();
        if echo {
            for trace in &traces {
                Output::Normal.print_trace(trace);
            }
        } else {
            dprintln!(Sometimes, "Executed {} instructions.", executed);
        }

        match traces.last() {
            Some(Trace::Breakpoint { pc }) => {
                self.current_breakpoint = Some(*pc);
                dprintln!(Always, "Breakpoint reached at 0x{:04x}.", pc);
            }
            _ if self.sim.is_halted() => dprintln!(Always, "Program halted."),
            _ => (),
        }
    }

    fn list_breakpoints(&self) {
        let breakpoints = self.sim.breakpoints();
        if breakpoints.is_empty() {
            dprintln!(Always, "No breakpoints exist.");
            return;
        }
        dprintln!(Always, "Breakpoints:");
        for address in breakpoints.iter() {
            match self.label_at(address) {
                Some(label) => dprintln!(Always, "  0x{:04x}  {}", address, label),
                None => dprintln!(Always, "  0x{:04x}", address),
            }
        }
    }

    fn resolve(&self, location: &Location) -> Option<u16> {
        match location {
            Location::Address(address) => Some(*address),
            Location::Label(name) => {
                let address = self.labels.get(name).map(|&offset| self.start.wrapping_add(offset));
                if address.is_none() {
                    dprintln!(Always, "Label not found named `{}`.", name);
                }
                address
            }
        }
    }

    /// Alphabetically first label bound to `address`.
    fn label_at(&self, address: u16) -> Option<&str> {
        self.labels
            .iter()
            .filter(|(_, offset)| self.start.wrapping_add(**offset) == address)
            .map(|(name, _)| name.as_str())
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::isa::Register;

    const COUNTDOWN: &str = "\
        ADDI R1, R1, 3
loop:   ADDI R1, R1, -1
        BRZ done
        JMP loop
done:   HALT
";

    fn debugger(src: &str, start: u16, commands: &str, breakpoints: Vec<u16>) -> Debugger {
        let asm = assemble(src);
        assert!(asm.is_ok(), "{:?}", asm.messages());
        let opts = DebuggerOptions {
            command: Some(commands.to_string()),
            max_steps: 1000,
        };
        Debugger::new(opts, asm.binary, start, asm.labels, breakpoints)
    }

    #[test]
    fn steps_and_runs() {
        let mut dbg = debugger(COUNTDOWN, 0, "step; step 2", vec![]);
        dbg.run();
        assert_eq!(dbg.simulator().instruction_count(), 3);
        assert_eq!(dbg.simulator().reg(Register::R1), 2);

        let mut dbg = debugger(COUNTDOWN, 0, "run", vec![]);
        dbg.run();
        assert!(dbg.simulator().is_halted());
        assert_eq!(dbg.simulator().reg(Register::R1), 0);
    }

    #[test]
    fn zero_step_bound_runs_nothing() {
        let asm = assemble("ADDI R1, R1, 1\nHALT");
        let opts = DebuggerOptions {
            command: Some("run; run".to_string()),
            max_steps: 0,
        };
        let mut dbg = Debugger::new(opts, asm.binary, 0, asm.labels, vec![]);
        dbg.run();
        assert_eq!(dbg.simulator().instruction_count(), 0);
        assert_eq!(dbg.simulator().reg(Register::R1), 0);
        assert_eq!(dbg.simulator().pc(), 0);
    }

    #[test]
    fn passes_breakpoint_on_next_attempt() {
        let mut dbg = debugger(COUNTDOWN, 0, "run\nrun", vec![4]);
        dbg.run();
        // Stopped in front of `BRZ done` twice
        assert_eq!(dbg.simulator().pc(), 4);
        assert_eq!(dbg.simulator().reg(Register::R1), 1);
        assert!(!dbg.simulator().is_halted());

        let mut dbg = debugger(COUNTDOWN, 0, "run; break remove 4; run", vec![4]);
        dbg.run();
        assert!(dbg.simulator().is_halted());
    }

    #[test]
    fn breakpoints_by_label_are_relative_to_start() {
        let mut dbg = debugger(COUNTDOWN, 0x100, "break add done; run", vec![]);
        dbg.run();
        assert!(dbg.simulator().breakpoints().contains(0x108));
        assert_eq!(dbg.simulator().pc(), 0x108);
        assert!(!dbg.simulator().is_halted());
        assert_eq!(dbg.label_at(0x108), Some("done"));
    }

    #[test]
    fn unknown_label_adds_nothing() {
        let mut dbg = debugger(COUNTDOWN, 0, "break add nowhere", vec![]);
        dbg.run();
        assert!(dbg.simulator().breakpoints().is_empty());
    }

    #[test]
    fn reset_and_reload() {
        let mut dbg = debugger(COUNTDOWN, 0, "run; reset", vec![2]);
        dbg.run();
        assert!(dbg.simulator().breakpoints().is_empty());
        assert_eq!(dbg.simulator().mem_word(0), Some(0));

        let mut dbg = debugger(COUNTDOWN, 0, "break remove 2; run; reload; step", vec![2]);
        dbg.run();
        assert!(!dbg.simulator().is_halted());
        assert_eq!(dbg.simulator().instruction_count(), 1);
        assert_eq!(dbg.simulator().reg(Register::R1), 3);
    }

    #[test]
    fn stops_at_quit_and_ignores_bad_commands() {
        let mut dbg = debugger(COUNTDOWN, 0, "jump; step 0; quit; run", vec![]);
        dbg.run();
        assert_eq!(dbg.simulator().instruction_count(), 0);
    }

    #[test]
    fn halted_program_does_not_resume() {
        let mut dbg = debugger("HALT", 0, "run; step; run", vec![]);
        dbg.run();
        assert!(dbg.simulator().is_halted());
        assert_eq!(dbg.simulator().instruction_count(), 1);
    }
}
