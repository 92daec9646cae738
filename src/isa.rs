//! Bit layouts of the four instruction formats and the opcode table.
//!
//! Every instruction is one 16-bit word whose top nibble is the opcode. The opcode alone selects
//! the format:
//!
//! ```text
//!            15   12 11  9 8   6 5   3 2   0
//!  R-type   | op   | rd  | rs1 | rs2 | --- |
//!  I-type   | op   | rd  | rs  |   imm6    |
//!  M-type   | op   | rd  | base|  offset6  |
//!  J-type   | op   |cond |     offset10    |
//!            15   12 11 10 9              0
//! ```
use std::fmt;
use std::str::FromStr;

/// Size of an instruction in bytes. Every instruction occupies exactly one word.
pub const WORD_BYTES: u16 = 2;

/// Inclusive range accepted by the 6-bit `imm6`/`offset6` fields.
pub const IMM6_RANGE: (i64, i64) = (-32, 31);
/// Inclusive range accepted by the 10-bit `offset10` field.
pub const OFFSET10_RANGE: (i64, i64) = (-512, 511);

const IMM6_MASK: u16 = 0x3F;
const OFFSET10_MASK: u16 = 0x3FF;

/// Closed set of operations. Discriminants are the 4-bit encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    Nop = 0x0,
    Add = 0x1,
    Sub = 0x2,
    And = 0x3,
    Or = 0x4,
    Addi = 0x5,
    Load = 0x6,
    Store = 0x7,
    Jmp = 0x8,
    Brz = 0x9,
    Halt = 0xA,
}

/// Layout of the bits following the opcode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Format {
    /// `NOP`, `HALT`: opcode only.
    Bare,
    R,
    I,
    J,
    M,
}

impl Opcode {
    pub const ALL: [Opcode; 11] = [
        Opcode::Nop,
        Opcode::Add,
        Opcode::Sub,
        Opcode::And,
        Opcode::Or,
        Opcode::Addi,
        Opcode::Load,
        Opcode::Store,
        Opcode::Jmp,
        Opcode::Brz,
        Opcode::Halt,
    ];

    /// Look up the opcode encoded by the low 4 bits of `bits`. `None` for `0xB..=0xF`.
    pub fn from_nibble(bits: u16) -> Option<Self> {
        Self::ALL.get((bits & 0xF) as usize).copied()
    }

    pub fn format(self) -> Format {
        match self {
            Opcode::Nop | Opcode::Halt => Format::Bare,
            Opcode::Add | Opcode::Sub | Opcode::And | Opcode::Or => Format::R,
            Opcode::Addi => Format::I,
            Opcode::Load | Opcode::Store => Format::M,
            Opcode::Jmp | Opcode::Brz => Format::J,
        }
    }

    /// Amount of operands expected in assembly source.
    pub fn arity(self) -> usize {
        match self.format() {
            Format::Bare => 0,
            Format::J => 1,
            Format::R | Format::I | Format::M => 3,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Addi => "ADDI",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Jmp => "JMP",
            Opcode::Brz => "BRZ",
            Opcode::Halt => "HALT",
        }
    }
}

impl FromStr for Opcode {
    type Err = ();

    /// Expects an already uppercased mnemonic.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|op| op.mnemonic() == s)
            .copied()
            .ok_or(())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// One of the 8 general purpose registers. None of them is hardwired to zero.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl Register {
    pub const ALL: [Register; 8] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
    ];

    /// Register named by the low 3 bits of `bits`.
    pub fn from_bits(bits: u16) -> Self {
        Self::ALL[(bits & 0b111) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u32> for Register {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL.get(value as usize).copied().ok_or(())
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", *self as u8)
    }
}

// Packers take range-checked fields. Signed fields are truncated to their low bits.

#[inline]
fn op_bits(opcode: Opcode) -> u16 {
    (opcode as u16) << 12
}

/// `opcode | rd | rs1 | rs2 | 000`
pub fn encode_r(opcode: Opcode, rd: Register, rs1: Register, rs2: Register) -> u16 {
    op_bits(opcode) | (rd as u16) << 9 | (rs1 as u16) << 6 | (rs2 as u16) << 3
}

/// `opcode | rd | rs | imm6`
pub fn encode_i(opcode: Opcode, rd: Register, rs: Register, imm: i16) -> u16 {
    op_bits(opcode) | (rd as u16) << 9 | (rs as u16) << 6 | (imm as u16 & IMM6_MASK)
}

/// `opcode | cond | offset10`
pub fn encode_j(opcode: Opcode, cond: u8, offset: i16) -> u16 {
    op_bits(opcode) | ((cond as u16) & 0b11) << 10 | (offset as u16 & OFFSET10_MASK)
}

/// `opcode | rd | base | offset6`
pub fn encode_m(opcode: Opcode, rd: Register, base: Register, offset: i16) -> u16 {
    op_bits(opcode) | (rd as u16) << 9 | (base as u16) << 6 | (offset as u16 & IMM6_MASK)
}

/// `opcode | 000000000000`
pub fn encode_bare(opcode: Opcode) -> u16 {
    op_bits(opcode)
}
