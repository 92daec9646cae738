use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{bail, IntoDiagnostic, NamedSource, Report, Result};

use isa16::asm::{parse_immediate, LabelTable};
use isa16::decode::Instr;
use isa16::output::Output;
use isa16::{Assembly, Debugger, DebuggerOptions, Simulator, Trace};

/// isa16 assembles and simulates programs for a small 16-bit instruction set.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.asm` or binary `.bin` file and print the final machine state
    Run {
        /// `.asm` or `.bin` file to run
        name: PathBuf,
        #[command(flatten)]
        load: LoadArgs,
        /// Print every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Run text `.asm` or binary `.bin` file with the debugger
    Debug {
        /// `.asm` or `.bin` file to debug
        name: PathBuf,
        #[command(flatten)]
        load: LoadArgs,
        /// Read debugger commands from argument
        #[arg(short, long)]
        command: Option<String>,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
    /// Create binary `.bin` file to run later
    Compile {
        /// `.asm` file to compile
        name: PathBuf,
        /// Destination to output `.bin` file
        dest: Option<PathBuf>,
    },
    /// Check a `.asm` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Print the instructions of a `.asm` or `.bin` file, one word per line
    Disasm {
        /// `.asm` or `.bin` file to disassemble
        name: PathBuf,
        /// Address of the first word
        #[arg(short, long, value_parser = parse_address, default_value = "0")]
        start: u16,
    },
}

#[derive(clap::Args)]
struct LoadArgs {
    /// Address to load the program at
    #[arg(short, long, value_parser = parse_address, default_value = "0")]
    start: u16,
    /// Pause before the instruction at this address (repeatable)
    #[arg(short, long = "break", value_parser = parse_address)]
    breakpoints: Vec<u16>,
    /// Maximum instructions per run [default: $ISA16_MAX_STEPS or 10000]
    #[arg(long)]
    max_steps: Option<usize>,
}

impl LoadArgs {
    fn max_steps(&self) -> usize {
        self.max_steps.unwrap_or_else(isa16::env::max_steps)
    }
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    env_logger::init();
    isa16::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(isa16::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let Some(command) = args.command else {
        if let Some(path) = args.path {
            let load = LoadArgs {
                start: 0,
                breakpoints: Vec::new(),
                max_steps: None,
            };
            return run(&path, &load, false, false);
        }
        println!("\n~ isa16 v{VERSION} ~");
        println!("{SHORT_INFO}");
        std::process::exit(0);
    };

    match command {
        Command::Run {
            name,
            load,
            trace,
            minimal,
        } => run(&name, &load, trace, minimal),
        Command::Debug {
            name,
            load,
            command,
            minimal,
        } => {
            Output::set_minimal(minimal);
            file_message(Green, "Assembling", &name);
            let program = load_program(&name)?;

            let opts = DebuggerOptions {
                command,
                max_steps: load.max_steps(),
            };
            message(Green, "Debugging", "emitted binary");
            let mut debugger = Debugger::new(
                opts,
                program.words,
                load.start,
                program.labels,
                load.breakpoints,
            );
            debugger.run();

            file_message(Green, "Completed", &name);
            Ok(())
        }
        Command::Compile { name, dest } => {
            file_message(Green, "Assembling", &name);
            let contents = fs::read_to_string(&name).into_diagnostic()?;
            let asm = assemble(&name, contents)?;

            let out_file_name = dest.unwrap_or_else(|| name.with_extension("bin"));
            let bytes: Vec<u8> = asm.binary.iter().flat_map(|word| word.to_le_bytes()).collect();
            fs::write(&out_file_name, bytes).into_diagnostic()?;

            message(Green, "Finished", "emit binary");
            file_message(Green, "Saved", &out_file_name);
            Ok(())
        }
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let contents = fs::read_to_string(&name).into_diagnostic()?;
            let _ = assemble(&name, contents)?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Command::Disasm { name, start } => {
            let program = load_program(&name)?;
            disassemble(&program, start);
            Ok(())
        }
    }
}

enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    Output::Normal.print_str(&format!("{left:>12} {right}\n"));
}

fn run(name: &Path, load: &LoadArgs, trace: bool, minimal: bool) -> Result<()> {
    Output::set_minimal(minimal);
    file_message(MsgColor::Green, "Assembling", name);
    let program = load_program(name)?;

    let mut sim = Simulator::new();
    sim.load_program(&program.words, load.start);
    for &address in &load.breakpoints {
        sim.add_breakpoint(address);
    }

    message(MsgColor::Green, "Running", "emitted binary");
    let max_steps = load.max_steps();
    let traces = sim.run(max_steps);
    if trace {
        for trace in &traces {
            Output::Normal.print_trace(trace);
        }
    }

    match traces.last() {
        Some(Trace::Breakpoint { pc }) => {
            message(MsgColor::Cyan, "Paused", &format!("breakpoint at 0x{:04x}", pc))
        }
        _ if sim.is_halted() => message(MsgColor::Green, "Halted", "program finished"),
        _ => message(
            MsgColor::Red,
            "Stopped",
            &format!("step limit of {} reached", max_steps),
        ),
    }

    let state = sim.snapshot(isa16::env::memory_window());
    Output::Normal.print_registers(&state);
    Output::Normal.print_memory_window(&state);

    file_message(MsgColor::Green, "Completed", name);
    Ok(())
}

/// Machine words ready to load, with the labels of their source if any.
struct Program {
    words: Vec<u16>,
    labels: LabelTable,
}

fn load_program(name: &Path) -> Result<Program> {
    let Some(ext) = name.extension() else {
        bail!("File has no extension. Exiting...");
    };
    match ext.to_str() {
        Some("asm") => {
            let contents = fs::read_to_string(name).into_diagnostic()?;
            let asm = assemble(name, contents)?;
            Ok(Program {
                words: asm.binary,
                labels: asm.labels,
            })
        }
        Some("bin") | Some("obj") => Ok(Program {
            words: load_binary(name)?,
            labels: LabelTable::new(),
        }),
        _ => bail!("File has unknown extension. Exiting..."),
    }
}

/// Read little-endian words, as written by `compile`.
fn load_binary(name: &Path) -> Result<Vec<u16>> {
    let buffer = fs::read(name).into_diagnostic()?;
    if buffer.len() % 2 != 0 {
        bail!("File is not aligned to 16 bits")
    }
    Ok(buffer
        .chunks_exact(2)
        .map(|word| u16::from_le_bytes([word[0], word[1]]))
        .collect())
}

/// Assemble source file, reporting every error against the source text.
fn assemble(name: &Path, contents: String) -> Result<Assembly> {
    let asm = isa16::assemble(&contents);
    if asm.is_ok() {
        return Ok(asm);
    }

    let count = asm.errors.len();
    let file_name = name.display().to_string();
    for err in asm.errors {
        let report =
            Report::new(err).with_source_code(NamedSource::new(&file_name, contents.clone()));
        eprintln!("{:?}", report);
    }
    bail!(
        "Failed to assemble with {} error{}",
        count,
        if count == 1 { "" } else { "s" }
    )
}

fn disassemble(program: &Program, start: u16) {
    let mut labels: Vec<(u16, &str)> = program
        .labels
        .iter()
        .map(|(name, &offset)| (offset, name.as_str()))
        .collect();
    labels.sort();

    for (i, &word) in program.words.iter().enumerate() {
        let offset = i as u32 * 2;
        for (_, label) in labels.iter().filter(|(at, _)| u32::from(*at) == offset) {
            println!("{}:", label);
        }
        println!(
            "{:04x}: {:04x}  {}",
            u32::from(start) + offset,
            word,
            Instr::decode(word)
        );
    }
}

fn parse_address(value: &str) -> std::result::Result<u16, String> {
    let address = parse_immediate(value).map_err(|err| err.to_string())?;
    u16::try_from(address).map_err(|_| format!("address out of range: {}", value))
}

const SHORT_INFO: &str = r"
Welcome to isa16, an assembler and simulator for a small 16-bit instruction set
with eight registers, byte addressed memory and fixed 2 byte instructions.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
