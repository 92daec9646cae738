use std::fmt;

use miette::{Diagnostic, LabeledSpan, SourceSpan};
use thiserror::Error;

/// Why a single line failed to assemble.
#[derive(Clone, PartialEq, Eq, Debug, Error, Diagnostic)]
pub enum ErrorKind {
    #[error("Unknown instruction: {0}")]
    #[diagnostic(
        code(asm::unknown_instruction),
        help("available instructions are NOP, ADD, SUB, AND, OR, ADDI, LOAD, STORE, JMP, BRZ, HALT")
    )]
    UnknownInstruction(String),

    #[error("{mnemonic} requires {expected}")]
    #[diagnostic(code(asm::operand_count), help("operands are separated by commas or whitespace"))]
    OperandCount { mnemonic: String, expected: Operands },

    #[error("{mnemonic} takes no operands")]
    #[diagnostic(code(asm::operand_count), help("remove the operands after the mnemonic"))]
    UnexpectedOperands { mnemonic: String },

    #[error("Invalid register: {0}")]
    #[diagnostic(code(asm::register), help("registers are written R0 to R7"))]
    InvalidRegister(String),

    #[error("Register out of range: {0}")]
    #[diagnostic(code(asm::register), help("only registers R0 to R7 exist"))]
    RegisterOutOfRange(String),

    #[error("Invalid immediate: {0}")]
    #[diagnostic(
        code(asm::bad_lit),
        help("literals are decimal (5, -3, #12) or hex (0x1F, #0x1F)")
    )]
    InvalidImmediate(String),

    #[error("Immediate out of range: {0} (must be -32 to 31)")]
    #[diagnostic(code(asm::imm_range), help("the immediate field is 6 bits wide"))]
    ImmediateOutOfRange(i64),

    #[error("Offset out of range: {0} (must be -32 to 31)")]
    #[diagnostic(code(asm::offset_range), help("the offset field is 6 bits wide"))]
    OffsetOutOfRange(i64),

    #[error("Jump offset out of range: {0} (must be -512 to 511)")]
    #[diagnostic(
        code(asm::jump_range),
        help("jump offsets are byte distances held in a 10 bit field")
    )]
    JumpOutOfRange(i64),

    #[error("Unknown label or invalid offset: {0}")]
    #[diagnostic(
        code(asm::unknown_label),
        help("labels are case sensitive and must be defined somewhere in the file")
    )]
    UnknownLabel(String),

    #[error("{0}")]
    #[diagnostic(code(asm::structural))]
    Structural(String),
}

/// Operand count, displayed with its noun.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Operands(pub usize);

impl fmt::Display for Operands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1 => write!(f, "1 operand"),
            n => write!(f, "{} operands", n),
        }
    }
}

/// An assembler error, located at the source line which produced it.
///
/// Structural errors abort assembly as a whole and carry no location.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AsmError {
    /// 1-based line number.
    pub line: Option<usize>,
    /// Byte span of the instruction text inside the source.
    pub span: Option<SourceSpan>,
    pub kind: ErrorKind,
}

impl AsmError {
    pub fn at(line: usize, span: impl Into<SourceSpan>, kind: ErrorKind) -> Self {
        AsmError {
            line: Some(line),
            span: Some(span.into()),
            kind,
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        AsmError {
            line: None,
            span: None,
            kind: ErrorKind::Structural(message.into()),
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Line {}: {}", line, self.kind),
            None => write!(f, "Assembly error: {}", self.kind),
        }
    }
}

impl std::error::Error for AsmError {}

impl Diagnostic for AsmError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.kind.code()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.kind.help()
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        let label = LabeledSpan::at(span, self.kind.to_string());
        Some(Box::new(std::iter::once(label)))
    }
}
