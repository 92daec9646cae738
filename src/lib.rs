// Encoding
pub mod decode;
pub mod isa;
pub use isa::{Opcode, Register};

// Assembling
pub mod asm;
pub mod error;
pub use asm::{assemble, Assembly};
pub use error::{AsmError, ErrorKind};

// Running
pub mod breakpoint;
pub mod runtime;
pub use runtime::{Simulator, Snapshot, Trace};
pub mod debugger;
pub use debugger::{Debugger, DebuggerOptions};
pub mod output;

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 4;
