//! Two-pass assembler.
//!
//! The first pass strips comments, binds labels to byte addresses and collects the instruction
//! text of every line. The second pass encodes each instruction, resolving jump targets against
//! the label table.
//!
//! Malformed lines are reported and skipped while the rest of the file keeps assembling, so the
//! emitted words are *not* aligned with source addresses once an error occurred.
use std::collections::HashMap;

use log::{debug, warn};

use crate::error::{AsmError, ErrorKind, Operands};
use crate::isa::{self, Format, Opcode, Register, IMM6_RANGE, OFFSET10_RANGE, WORD_BYTES};

/// Label name -> byte address of the instruction it prefixes.
pub type LabelTable = HashMap<String, u16>;

/// Highest address an instruction may start at.
const MAX_INSTR_ADDR: u32 = 0xFFFE;

/// Output of a single assembly run.
#[derive(Debug, Default)]
pub struct Assembly {
    /// Encoded words of every line which assembled successfully, in source order.
    pub binary: Vec<u16>,
    /// Errors in source order.
    pub errors: Vec<AsmError>,
    pub labels: LabelTable,
}

impl Assembly {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Plain error messages, e.g. `Line 2: Invalid register: RX`.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Instruction text left over after the first pass.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SourceLine<'a> {
    /// Byte address the instruction will occupy.
    pub addr: u16,
    /// 1-based line number.
    pub line: usize,
    /// Byte offset of `text` inside the source.
    pub offs: usize,
    pub text: &'a str,
}

impl SourceLine<'_> {
    fn error(&self, kind: ErrorKind) -> AsmError {
        AsmError::at(self.line, (self.offs, self.text.len()), kind)
    }
}

/// Assemble `src` into machine words. Never fails as a whole; see [`Assembly::errors`].
pub fn assemble(src: &str) -> Assembly {
    let mut labels = LabelTable::new();
    let lines = match preprocess(src, &mut labels) {
        Ok(lines) => lines,
        Err(err) => {
            return Assembly {
                errors: vec![err],
                labels,
                ..Default::default()
            }
        }
    };

    let mut binary = Vec::with_capacity(lines.len());
    let mut errors = Vec::new();
    for line in &lines {
        match encode_instr(line.text, line.addr, &labels) {
            Ok(word) => binary.push(word),
            Err(kind) => errors.push(line.error(kind)),
        }
    }

    debug!(
        "assembled {} words with {} errors and {} labels",
        binary.len(),
        errors.len(),
        labels.len()
    );
    Assembly {
        binary,
        errors,
        labels,
    }
}

/// First pass. Binds labels into `labels` and returns the instruction lines with their addresses.
///
/// Blank and comment-only lines consume no address. A label redefinition replaces the earlier
/// binding with a warning.
pub fn preprocess<'a>(src: &'a str, labels: &mut LabelTable) -> Result<Vec<SourceLine<'a>>, AsmError> {
    let mut res = Vec::new();
    let mut addr: u32 = 0;
    let mut line_start = 0;

    for (idx, raw) in src.split('\n').enumerate() {
        let offs = line_start;
        line_start += raw.len() + 1;

        // Strip comment
        let code = raw.split(';').next().unwrap_or_default();
        let (mut text, mut text_offs) = trim_with_offset(code, offs);
        if text.is_empty() {
            continue;
        }

        if let Some((label, rest)) = text.split_once(':') {
            let label = label.trim();
            match u16::try_from(addr) {
                Ok(addr) => bind_label(labels, label, addr, idx + 1),
                Err(_) => warn!(
                    "label '{}' on line {} lies beyond the 64 KB address space and was not bound",
                    label,
                    idx + 1
                ),
            }
            (text, text_offs) = trim_with_offset(rest, text_offs + label_len(text, rest));
        }

        if !text.is_empty() {
            res.push(SourceLine {
                addr: fit_address(addr, idx + 1)?,
                line: idx + 1,
                offs: text_offs,
                text,
            });
            addr += WORD_BYTES as u32;
        }
    }
    Ok(res)
}

fn bind_label(labels: &mut LabelTable, label: &str, addr: u16, line: usize) {
    if let Some(prev) = labels.insert(label.to_string(), addr) {
        warn!(
            "label '{}' redefined on line {} (0x{:04X} -> 0x{:04X})",
            label, line, prev, addr
        );
    } else {
        debug!("label '{}' bound to 0x{:04X}", label, addr);
    }
}

/// Bytes preceding `rest` in `text`, which must be a suffix of it.
fn label_len(text: &str, rest: &str) -> usize {
    text.len() - rest.len()
}

fn trim_with_offset(s: &str, offs: usize) -> (&str, usize) {
    let start = s.len() - s.trim_start().len();
    (s.trim(), offs + start)
}

fn fit_address(addr: u32, line: usize) -> Result<u16, AsmError> {
    if addr > MAX_INSTR_ADDR {
        return Err(AsmError::structural(format!(
            "line {} lies beyond the 64 KB address space",
            line
        )));
    }
    Ok(addr as u16)
}

/// Second pass for a single instruction placed at `addr`.
pub fn encode_instr(text: &str, addr: u16, labels: &LabelTable) -> Result<u16, ErrorKind> {
    let mut parts = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty());
    let Some(mnemonic) = parts.next() else {
        return Err(ErrorKind::UnknownInstruction(String::new()));
    };
    let mnemonic = mnemonic.to_uppercase();
    let operands: Vec<&str> = parts.collect();

    let opcode: Opcode = mnemonic
        .parse()
        .map_err(|_| ErrorKind::UnknownInstruction(mnemonic.clone()))?;

    if operands.len() != opcode.arity() {
        return Err(match opcode.format() {
            Format::Bare => ErrorKind::UnexpectedOperands { mnemonic },
            _ => ErrorKind::OperandCount {
                mnemonic,
                expected: Operands(opcode.arity()),
            },
        });
    }

    let word = match opcode.format() {
        Format::Bare => isa::encode_bare(opcode),
        Format::R => {
            let rd = parse_register(operands[0])?;
            let rs1 = parse_register(operands[1])?;
            let rs2 = parse_register(operands[2])?;
            isa::encode_r(opcode, rd, rs1, rs2)
        }
        Format::I => {
            let rd = parse_register(operands[0])?;
            let rs = parse_register(operands[1])?;
            let imm = parse_immediate(operands[2])?;
            if !in_range(imm, IMM6_RANGE) {
                return Err(ErrorKind::ImmediateOutOfRange(imm));
            }
            isa::encode_i(opcode, rd, rs, imm as i16)
        }
        Format::M => {
            let rd = parse_register(operands[0])?;
            let base = parse_register(operands[1])?;
            let offset = parse_immediate(operands[2])?;
            if !in_range(offset, IMM6_RANGE) {
                return Err(ErrorKind::OffsetOutOfRange(offset));
            }
            isa::encode_m(opcode, rd, base, offset as i16)
        }
        Format::J => {
            let target = operands[0];
            let offset = match labels.get(target) {
                // Byte distance from this instruction
                Some(&dest) => dest as i64 - addr as i64,
                None => parse_immediate(target)
                    .map_err(|_| ErrorKind::UnknownLabel(target.to_string()))?,
            };
            if !in_range(offset, OFFSET10_RANGE) {
                return Err(ErrorKind::JumpOutOfRange(offset));
            }
            // Condition field is reserved
            isa::encode_j(opcode, 0, offset as i16)
        }
    };
    Ok(word)
}

fn in_range(val: i64, (min, max): (i64, i64)) -> bool {
    (min..=max).contains(&val)
}

/// Parse `R<digits>`, case insensitive.
pub fn parse_register(tok: &str) -> Result<Register, ErrorKind> {
    let digits = tok
        .strip_prefix(|c: char| c == 'R' || c == 'r')
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| ErrorKind::InvalidRegister(tok.to_string()))?;
    digits
        .parse::<u32>()
        .ok()
        .and_then(|n| Register::try_from(n).ok())
        .ok_or_else(|| ErrorKind::RegisterOutOfRange(tok.to_string()))
}

/// Parse an integer literal.
///
/// - `0x1F`, `0X1F`: hex
/// - `#0x1F`: hex
/// - `#12`, `12`, `-12`: decimal
pub fn parse_immediate(tok: &str) -> Result<i64, ErrorKind> {
    let (digits, radix) = if let Some(hex) = tok.strip_prefix("0x").or(tok.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(rest) = tok.strip_prefix('#') {
        match rest.strip_prefix("0x") {
            Some(hex) => (hex, 16),
            None => (rest, 10),
        }
    } else {
        (tok, 10)
    };
    // Hex literals are unsigned
    if radix == 16 && digits.starts_with(|c: char| c == '-' || c == '+') {
        return Err(ErrorKind::InvalidImmediate(tok.to_string()));
    }
    i64::from_str_radix(digits, radix).map_err(|_| ErrorKind::InvalidImmediate(tok.to_string()))
}
