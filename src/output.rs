use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::runtime::{Simulator, Snapshot, Trace};

#[macro_export]
macro_rules! dprint {
    ( $cond:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        let s = format!(
            $fmt
            $($tt)*
        );
        $crate::output::Output::Debugger($cond).print_str(&s);
    }};
}

#[macro_export]
macro_rules! dprintln {
    ( $cond:expr ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        $crate::output::Output::Debugger($cond).print_str("\n");
    }};
    ( $cond:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        let s = format!(
            concat!($fmt, "\n")
            $($tt)*
        );
        $crate::output::Output::Debugger($cond).print_str(&s);
    }};
}

/// Where text goes. Program traces are written to stdout, debugger chatter to stderr.
#[derive(Clone, Copy, Debug)]
pub enum Output {
    Normal,
    Debugger(Condition),
}

/// Whether debugger output survives `--minimal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Always,
    Sometimes,
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => {
                if Self::is_minimal() {
                    print!("{}", Decolored::new(string).collect::<String>());
                } else {
                    print!("{}", string);
                }
            }
            Self::Debugger(condition) => match (Self::is_minimal(), *condition) {
                (false, _) => eprint!("{}", ColoredString::from(string).blue()),
                // Always remove color if `--minimal`
                (true, Condition::Always) => eprint_colorless(string),
                (true, Condition::Sometimes) => (),
            },
        }
    }

    pub fn print_trace(&self, trace: &Trace) {
        let line = match trace {
            Trace::Exec { .. } => trace.to_string(),
            Trace::Breakpoint { .. } => trace.to_string().yellow().bold().to_string(),
        };
        self.print_str(&line);
        self.print_str("\n");
    }

    pub fn print_registers(&self, state: &Snapshot) {
        let flag = |set: bool, name: &'static str| if set { name } else { "-" };
        let flags = format!(
            "{}{}{}",
            flag(state.flags.z, "Z"),
            flag(state.flags.n, "N"),
            flag(state.flags.c, "C")
        );

        if Self::is_minimal() {
            for (i, value) in state.registers.iter().enumerate() {
                self.print_str(&format!("R{} {}\n", i, value));
            }
            self.print_str(&format!("PC {}\n", state.pc));
            self.print_str(&format!("FLAGS {}\n", flags));
            self.print_str(&format!("HALTED {}\n", state.halted));
            self.print_str(&format!(
                "CYCLES {} INSTRUCTIONS {}\n",
                state.cycle_count, state.instruction_count
            ));
            return;
        }

        self.print_str("\x1b[2m┌──────────────────────────────┐\x1b[0m\n");
        self.print_str("\x1b[2m│        \x1b[3mhex     uint     int\x1b[0m\x1b[2m │\x1b[0m\n");
        for (i, value) in state.registers.iter().enumerate() {
            self.print_str("\x1b[2m│\x1b[0m");
            self.print_str(&format!(" \x1b[1mR{}\x1b[0m  ", i));
            self.print_integer(*value);
            self.print_str(" \x1b[2m│\x1b[0m\n");
        }
        self.print_str("\x1b[2m│\x1b[0m");
        self.print_str(&format!(" \x1b[1mPC\x1b[0m  0x{:04x}", state.pc));
        self.print_str(&format!("  \x1b[1mFLAGS\x1b[0m {}", flags));
        self.print_str(&format!(
            "  {:>6}",
            if state.halted { "halted" } else { "" }
        ));
        self.print_str(" \x1b[2m│\x1b[0m\n");
        self.print_str("\x1b[2m└──────────────────────────────┘\x1b[0m\n");
        self.print_str(&format!(
            "\x1b[2m{} cycles, {} instructions\x1b[0m\n",
            state.cycle_count, state.instruction_count
        ));
    }

    fn print_integer(&self, value: u16) {
        self.print_str(&format!("0x{:04x}  ", value));
        self.print_str(&format!("{:-6}  ", value));
        self.print_str(&format!("{:-6}", value as i16));
    }

    /// Print every non-zero word inside the memory window of a snapshot.
    pub fn print_memory_window(&self, state: &Snapshot) {
        for (i, pair) in state.memory.chunks_exact(2).enumerate() {
            let word = u16::from_le_bytes([pair[0], pair[1]]);
            if word != 0 {
                self.print_str(&format!("0x{:04x}: 0x{:04x}\n", i * 2, word));
            }
        }
    }

    /// Print `count` words starting at `addr`, one per line.
    pub fn print_memory(&self, sim: &Simulator, addr: u16, count: u16) {
        for i in 0..count {
            let Ok(addr) = u16::try_from(addr as u32 + i as u32 * 2) else {
                break;
            };
            match sim.mem_word(addr) {
                Some(word) => self.print_str(&format!("0x{:04x}: 0x{:04x}\n", addr, word)),
                None => self.print_str(&format!("0x{:04x}: 0x{:02x}\n", addr, sim.mem_byte(addr))),
            }
        }
    }
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn eprint_colorless(string: &str) {
    eprint!("{}", Decolored::new(string).collect::<String>());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("abcdef").collect::<String>(), "abcdef");
        assert_eq!(
            Decolored::new("abc\x1b[0;2mdef\x1b[0m").collect::<String>(),
            "abcdef"
        );
        assert_eq!(Decolored::new("abc\x1b[0xyz").collect::<String>(), "abc");
        assert_eq!(
            Decolored::new("abc\x1bw[0bxyzmdef").collect::<String>(),
            "abcdef"
        );
    }

    #[test]
    fn minimal_flag_is_thread_local() {
        assert!(!Output::set_minimal(true));
        assert!(Output::is_minimal());
        assert!(std::thread::spawn(|| !Output::is_minimal()).join().unwrap());
        Output::set_minimal(false);
    }
}
