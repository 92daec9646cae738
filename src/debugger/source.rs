use std::io::{self, BufRead};

use crate::dprintln;

/// Where debugger commands come from.
#[derive(Debug)]
pub enum Source {
    Argument(Argument),
    Stdin(Stdin),
}

/// Commands given on the command line, separated by newlines or `;`.
#[derive(Debug)]
pub struct Argument {
    buffer: String,
    /// Byte index
    cursor: usize,
}

/// Standard input, read line by line. Each line may hold several `;`-separated commands.
#[derive(Debug)]
pub struct Stdin {
    pending: Argument,
}

impl Source {
    pub fn from(argument: Option<String>) -> Self {
        match argument {
            Some(argument) => Source::Argument(Argument::from(argument)),
            None => Source::Stdin(Stdin {
                pending: Argument::from(String::new()),
            }),
        }
    }

    /// Next command, echoed to the debugger output. `None` indicates EOF.
    ///
    /// Returned string may include leading or trailing whitespace.
    pub fn read(&mut self) -> Option<String> {
        let command = match self {
            Self::Argument(argument) => argument.read(),
            Self::Stdin(stdin) => stdin.read(),
        }?;
        dprintln!(Sometimes, "\x1b[1mCommand\x1b[0m {}", command.trim());
        Some(command)
    }
}

impl Argument {
    pub fn from(buffer: String) -> Self {
        Self { buffer, cursor: 0 }
    }

    fn read(&mut self) -> Option<String> {
        // EOF
        if self.cursor >= self.buffer.len() {
            return None;
        }

        let rest = &self.buffer[self.cursor..];
        let end = rest.find(|c: char| c == '\n' || c == ';').unwrap_or(rest.len());
        let command = rest[..end].to_string();
        // Skip delimiter
        self.cursor += end + 1;
        Some(command)
    }
}

impl Stdin {
    fn read(&mut self) -> Option<String> {
        loop {
            if let Some(command) = self.pending.read() {
                return Some(command);
            }
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => self.pending = Argument::from(line),
                Err(err) => {
                    log::warn!("failed to read debugger command: {}", err);
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(input: &str) -> Vec<String> {
        let mut argument = Argument::from(input.to_string());
        std::iter::from_fn(|| argument.read()).collect()
    }

    #[test]
    fn splits_on_newlines_and_semicolons() {
        assert_eq!(
            read_all("step 2; registers\nrun;quit"),
            ["step 2", " registers", "run", "quit"]
        );
    }

    #[test]
    fn keeps_empty_commands() {
        assert_eq!(read_all("step;;\nrun\n"), ["step", "", "", "run"]);
        assert!(read_all("").is_empty());
    }

    #[test]
    fn handles_multibyte_text() {
        assert_eq!(read_all("é;ü"), ["é", "ü"]);
    }
}
