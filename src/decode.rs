use std::fmt;

use crate::isa::{Opcode, Register};

/// Sign extend the low `bits` of `val` into a signed 16-bit value.
#[inline]
pub fn s_ext(val: u16, bits: u32) -> i16 {
    debug_assert!(bits > 0 && bits < 16);
    // Sign bit
    let sign = val & (1u16 << (bits - 1));
    // Bits lower than sign bit
    let magnitude = val & ((1u16 << bits) - 1);
    // Negative input: sign bit and above will be set
    let sign_extension = (!sign).wrapping_add(1);
    (magnitude | sign_extension) as i16
}

#[inline]
fn opcode_bits(word: u16) -> u8 {
    (word >> 12) as u8
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RFields {
    pub opcode: u8,
    pub rd: Register,
    pub rs1: Register,
    pub rs2: Register,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IFields {
    pub opcode: u8,
    pub rd: Register,
    pub rs: Register,
    pub imm: i16,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct JFields {
    pub opcode: u8,
    /// Reserved, always assembled as 0.
    pub cond: u8,
    pub offset: i16,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MFields {
    pub opcode: u8,
    pub rd: Register,
    pub base: Register,
    pub offset: i16,
}

pub fn decode_r(word: u16) -> RFields {
    RFields {
        opcode: opcode_bits(word),
        rd: Register::from_bits(word >> 9),
        rs1: Register::from_bits(word >> 6),
        rs2: Register::from_bits(word >> 3),
    }
}

pub fn decode_i(word: u16) -> IFields {
    IFields {
        opcode: opcode_bits(word),
        rd: Register::from_bits(word >> 9),
        rs: Register::from_bits(word >> 6),
        imm: s_ext(word, 6),
    }
}

pub fn decode_j(word: u16) -> JFields {
    JFields {
        opcode: opcode_bits(word),
        cond: ((word >> 10) & 0b11) as u8,
        offset: s_ext(word, 10),
    }
}

pub fn decode_m(word: u16) -> MFields {
    MFields {
        opcode: opcode_bits(word),
        rd: Register::from_bits(word >> 9),
        base: Register::from_bits(word >> 6),
        offset: s_ext(word, 6),
    }
}

/// Fully decoded instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instr {
    Nop,
    Add(RFields),
    Sub(RFields),
    And(RFields),
    Or(RFields),
    Addi(IFields),
    Load(MFields),
    Store(MFields),
    Jmp(JFields),
    Brz(JFields),
    Halt,
    /// Opcodes `0xB..=0xF`.
    Unknown(u8),
}

impl Instr {
    pub fn decode(word: u16) -> Self {
        let Some(opcode) = Opcode::from_nibble(word >> 12) else {
            return Instr::Unknown(opcode_bits(word));
        };
        match opcode {
            Opcode::Nop => Instr::Nop,
            Opcode::Add => Instr::Add(decode_r(word)),
            Opcode::Sub => Instr::Sub(decode_r(word)),
            Opcode::And => Instr::And(decode_r(word)),
            Opcode::Or => Instr::Or(decode_r(word)),
            Opcode::Addi => Instr::Addi(decode_i(word)),
            Opcode::Load => Instr::Load(decode_m(word)),
            Opcode::Store => Instr::Store(decode_m(word)),
            Opcode::Jmp => Instr::Jmp(decode_j(word)),
            Opcode::Brz => Instr::Brz(decode_j(word)),
            Opcode::Halt => Instr::Halt,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Nop => f.write_str("NOP"),
            Instr::Halt => f.write_str("HALT"),
            Instr::Add(r) => write!(f, "ADD {}, {}, {}", r.rd, r.rs1, r.rs2),
            Instr::Sub(r) => write!(f, "SUB {}, {}, {}", r.rd, r.rs1, r.rs2),
            Instr::And(r) => write!(f, "AND {}, {}, {}", r.rd, r.rs1, r.rs2),
            Instr::Or(r) => write!(f, "OR {}, {}, {}", r.rd, r.rs1, r.rs2),
            Instr::Addi(i) => write!(f, "ADDI {}, {}, {}", i.rd, i.rs, i.imm),
            Instr::Load(m) => write!(f, "LOAD {}, {}, {}", m.rd, m.base, m.offset),
            Instr::Store(m) => write!(f, "STORE {}, {}, {}", m.rd, m.base, m.offset),
            Instr::Jmp(j) => write!(f, "JMP {:+}", j.offset),
            Instr::Brz(j) => write!(f, "BRZ {:+}", j.offset),
            Instr::Unknown(op) => write!(f, "UNKNOWN({})", op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{encode_bare, encode_i, encode_j, encode_m, encode_r};
    use Register::*;

    #[test]
    fn sign_extension() {
        #[rustfmt::skip]
        let cases: &[(u16, u32, i16)] = &[
            // (input, bits, expected)
            (0x001F, 6, 31),
            (0x0020, 6, -32),
            (0x003F, 6, -1),
            (0xFFC5, 6, 5),
            (0x01FF, 10, 511),
            (0x0200, 10, -512),
            (0x03FE, 10, -2),
            (0x8002, 10, 2),
        ];
        for (input, bits, expected) in cases {
            assert_eq!(s_ext(*input, *bits), *expected, "s_ext(0x{input:04x}, {bits})");
        }
    }

    #[test]
    fn decodes_formats() {
        assert_eq!(
            decode_r(0x1248),
            RFields { opcode: 1, rd: R1, rs1: R2, rs2: R3 }
        );
        assert_eq!(
            decode_i(0x503F),
            IFields { opcode: 5, rd: R0, rs: R0, imm: -1 }
        );
        assert_eq!(
            decode_j(0x93FE),
            JFields { opcode: 9, cond: 0, offset: -2 }
        );
        assert_eq!(
            decode_m(0x6FDF),
            MFields { opcode: 6, rd: R7, base: R7, offset: 31 }
        );
    }

    #[test]
    fn round_trips_every_field_combination() {
        let ops = [Opcode::Add, Opcode::Sub, Opcode::And, Opcode::Or];
        for op in ops {
            for rd in Register::ALL {
                for rs1 in Register::ALL {
                    for rs2 in Register::ALL {
                        let fields = decode_r(encode_r(op, rd, rs1, rs2));
                        assert_eq!(fields, RFields { opcode: op as u8, rd, rs1, rs2 });
                    }
                }
            }
        }
        for imm in -32..=31 {
            for rd in Register::ALL {
                let i = decode_i(encode_i(Opcode::Addi, rd, R6, imm));
                assert_eq!(i, IFields { opcode: 5, rd, rs: R6, imm });
                for op in [Opcode::Load, Opcode::Store] {
                    let m = decode_m(encode_m(op, rd, R3, imm));
                    assert_eq!(m, MFields { opcode: op as u8, rd, base: R3, offset: imm });
                }
            }
        }
        for offset in -512..=511 {
            for op in [Opcode::Jmp, Opcode::Brz] {
                let j = decode_j(encode_j(op, 0, offset));
                assert_eq!(j, JFields { opcode: op as u8, cond: 0, offset });
            }
        }
        assert_eq!(Instr::decode(encode_bare(Opcode::Nop)), Instr::Nop);
        assert_eq!(Instr::decode(encode_bare(Opcode::Halt)), Instr::Halt);
    }

    #[test]
    fn displays_instructions() {
        #[rustfmt::skip]
        let cases: &[(u16, &str)] = &[
            (0x0000, "NOP"),
            (0x1248, "ADD R1, R2, R3"),
            (0x4248, "OR R1, R2, R3"),
            (0x503F, "ADDI R0, R0, -1"),
            (0x7440, "STORE R2, R1, 0"),
            (0x8002, "JMP +2"),
            (0x93FE, "BRZ -2"),
            (0xA000, "HALT"),
            (0xB123, "UNKNOWN(11)"),
            (0xF000, "UNKNOWN(15)"),
        ];
        for (word, expected) in cases {
            assert_eq!(Instr::decode(*word).to_string(), *expected);
        }
    }
}
