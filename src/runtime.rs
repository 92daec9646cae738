use std::fmt;

use log::{debug, trace};

use crate::breakpoint::{Breakpoints, Watchpoints};
use crate::decode::{decode_i, decode_j, decode_m, decode_r, Instr};
use crate::isa::{Register, WORD_BYTES};

/// 64KB of byte addressable memory.
pub const MEMORY_SIZE: usize = 0x10000;

/// Condition flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    /// Result was zero
    pub z: bool,
    /// Bit 15 of result was set
    pub n: bool,
    /// Carry out of an `ADD`. Left untouched by every other instruction.
    pub c: bool,
}

/// What happened during a single `step`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trace {
    /// An instruction was fetched and executed.
    Exec { pc: i32, word: u16, text: String },
    /// Execution paused in front of a breakpoint. Nothing was executed.
    Breakpoint { pc: u16 },
}

impl Trace {
    pub fn is_breakpoint(&self) -> bool {
        matches!(self, Trace::Breakpoint { .. })
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trace::Exec { pc, word, text } => {
                write!(f, "PC={} I={:04X} {}", Addr(*pc), word, text)
            }
            Trace::Breakpoint { pc } => write!(f, "BREAKPOINT at PC={:04X}", pc),
        }
    }
}

/// Program counter as displayed in traces. May lie outside the address space.
struct Addr(i32);

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-{:04X}", self.0.unsigned_abs())
        } else {
            write!(f, "{:04X}", self.0)
        }
    }
}

/// Copy of the observable machine state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub registers: [u16; 8],
    pub pc: i32,
    pub flags: Flags,
    pub halted: bool,
    pub cycle_count: u64,
    pub instruction_count: u64,
    /// Prefix of memory starting at address 0.
    pub memory: Vec<u8>,
}

/// How the PC moves after an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    /// Advance to the following word.
    Next,
    /// PC was already set by the instruction.
    Jump,
    Halt,
}

/// Complete machine state plus the breakpoints controlling `step` and `run`.
///
/// Each simulator exclusively owns its state; sessions must not share one.
pub struct Simulator {
    mem: Box<[u8]>,
    /// Signed so that a jump before address 0 is observable and halts on the next fetch.
    pc: i32,
    reg: [u16; 8],
    flags: Flags,
    halted: bool,
    cycle_count: u64,
    instruction_count: u64,
    breakpoints: Breakpoints,
    watchpoints: Watchpoints,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Simulator {
            mem: vec![0; MEMORY_SIZE].into_boxed_slice(),
            pc: 0,
            reg: [0; 8],
            flags: Flags::default(),
            halted: false,
            cycle_count: 0,
            instruction_count: 0,
            breakpoints: Breakpoints::new(),
            watchpoints: Watchpoints::default(),
        }
    }

    const OP_TABLE: [fn(&mut Simulator, u16) -> Flow; 16] = [
        Self::nop,     // 0x0
        Self::add,     // 0x1
        Self::sub,     // 0x2
        Self::and,     // 0x3
        Self::or,      // 0x4
        Self::addi,    // 0x5
        Self::load,    // 0x6
        Self::store,   // 0x7
        Self::jmp,     // 0x8
        Self::brz,     // 0x9
        Self::halt,    // 0xA
        Self::unknown, // 0xB
        Self::unknown, // 0xC
        Self::unknown, // 0xD
        Self::unknown, // 0xE
        Self::unknown, // 0xF
    ];

    /// Zero all state, and drop every breakpoint and watchpoint.
    pub fn reset(&mut self) {
        self.mem.fill(0);
        self.reset_cpu(0);
        self.breakpoints.clear();
        self.watchpoints.clear();
    }

    fn reset_cpu(&mut self, pc: u16) {
        self.pc = pc as i32;
        self.reg = [0; 8];
        self.flags = Flags::default();
        self.halted = false;
        self.cycle_count = 0;
        self.instruction_count = 0;
    }

    /// Write `binary` little-endian from `start`, and point the PC at it.
    ///
    /// Registers, flags and counters are cleared. Other memory and breakpoints are kept. Words
    /// which do not fit below the last byte of memory are dropped.
    pub fn load_program(&mut self, binary: &[u16], start: u16) {
        self.reset_cpu(start);
        let mut written = 0;
        for (i, &word) in binary.iter().enumerate() {
            let addr = start as usize + i * WORD_BYTES as usize;
            if addr < MEMORY_SIZE - 1 {
                self.write_word(addr, word);
                written += 1;
            }
        }
        debug!(
            "loaded {} of {} words at 0x{:04X}",
            written,
            binary.len(),
            start
        );
    }

    /// Execute one instruction.
    ///
    /// `None` once halted. A breakpoint at the PC is reported without executing anything.
    pub fn step(&mut self) -> Option<Trace> {
        if self.halted {
            return None;
        }
        if let Some(pc) = self.at_breakpoint() {
            debug!("hit breakpoint at 0x{:04X}", pc);
            return Some(Trace::Breakpoint { pc });
        }

        Some(self.exec())
    }

    /// Like [`Simulator::step`], but executes the instruction at the PC even if a breakpoint is
    /// set there. Used to resume from a breakpoint hit.
    pub fn step_over(&mut self) -> Option<Trace> {
        if self.halted {
            return None;
        }
        Some(self.exec())
    }

    fn exec(&mut self) -> Trace {
        let pc = self.pc;
        let word = self.fetch_instruction();
        let text = self.execute_instruction(word);
        self.cycle_count += 1;
        self.instruction_count += 1;

        let res = Trace::Exec { pc, word, text };
        trace!("{}", res);
        res
    }

    /// Step until halted, a breakpoint is reached or `max_steps` instructions were executed.
    pub fn run(&mut self, max_steps: usize) -> Vec<Trace> {
        self.run_until(max_steps, || false)
    }

    /// Like [`Simulator::run`], also stopping as soon as `stop` returns `true`. `stop` is checked
    /// before every instruction.
    pub fn run_until(&mut self, max_steps: usize, mut stop: impl FnMut() -> bool) -> Vec<Trace> {
        let mut log = Vec::new();
        let mut steps = 0;
        while !self.halted && steps < max_steps {
            if stop() {
                debug!("run interrupted after {} steps", steps);
                break;
            }
            let Some(trace) = self.step() else {
                break;
            };
            let is_breakpoint = trace.is_breakpoint();
            log.push(trace);
            if is_breakpoint {
                break;
            }
            steps += 1;
        }
        log
    }

    fn at_breakpoint(&self) -> Option<u16> {
        u16::try_from(self.pc)
            .ok()
            .filter(|&pc| self.breakpoints.contains(pc))
    }

    /// Read the word at the PC. Halts the machine and yields `0` if the PC is out of bounds.
    pub fn fetch_instruction(&mut self) -> u16 {
        match self.addr_in_bounds(self.pc) {
            Some(addr) => self.read_word(addr),
            None => {
                debug!("PC {} out of bounds, halting", Addr(self.pc));
                self.halted = true;
                0
            }
        }
    }

    /// Execute `word` as if fetched from the current PC and return its trace text.
    pub fn execute_instruction(&mut self, word: u16) -> String {
        let instr = Instr::decode(word);
        let flow = Self::OP_TABLE[(word >> 12) as usize](self, word);
        if flow == Flow::Next {
            self.pc += WORD_BYTES as i32;
        }
        match instr {
            Instr::Brz(j) if flow == Flow::Jump => format!("BRZ (taken) {:+}", j.offset),
            Instr::Brz(j) => format!("BRZ (not taken) {:+}", j.offset),
            _ => instr.to_string(),
        }
    }

    /// `addr` as an index if a whole word can be accessed there.
    fn addr_in_bounds(&self, addr: i32) -> Option<usize> {
        usize::try_from(addr)
            .ok()
            .filter(|&addr| addr < MEMORY_SIZE - 1)
    }

    fn read_word(&self, addr: usize) -> u16 {
        u16::from_le_bytes([self.mem[addr], self.mem[addr + 1]])
    }

    fn write_word(&mut self, addr: usize, val: u16) {
        self.mem[addr..addr + 2].copy_from_slice(&val.to_le_bytes());
    }

    #[inline]
    fn reg_mut(&mut self, reg: Register) -> &mut u16 {
        &mut self.reg[reg.index()]
    }

    #[inline]
    fn set_zn(&mut self, val: u16) {
        self.flags.z = val == 0;
        self.flags.n = val & 0x8000 != 0;
    }

    fn nop(&mut self, _instr: u16) -> Flow {
        Flow::Next
    }

    fn add(&mut self, instr: u16) -> Flow {
        let f = decode_r(instr);
        let res = self.reg(f.rs1).wrapping_add(self.reg(f.rs2));
        *self.reg_mut(f.rd) = res;
        self.set_zn(res);
        // Compared against rs1 after the write, so rd == rs1 never carries.
        self.flags.c = res < self.reg(f.rs1);
        Flow::Next
    }

    fn sub(&mut self, instr: u16) -> Flow {
        let f = decode_r(instr);
        let res = self.reg(f.rs1).wrapping_sub(self.reg(f.rs2));
        *self.reg_mut(f.rd) = res;
        self.set_zn(res);
        Flow::Next
    }

    fn and(&mut self, instr: u16) -> Flow {
        let f = decode_r(instr);
        let res = self.reg(f.rs1) & self.reg(f.rs2);
        *self.reg_mut(f.rd) = res;
        self.set_zn(res);
        Flow::Next
    }

    fn or(&mut self, instr: u16) -> Flow {
        let f = decode_r(instr);
        let res = self.reg(f.rs1) | self.reg(f.rs2);
        *self.reg_mut(f.rd) = res;
        self.set_zn(res);
        Flow::Next
    }

    fn addi(&mut self, instr: u16) -> Flow {
        let f = decode_i(instr);
        let res = self.reg(f.rs).wrapping_add(f.imm as u16);
        *self.reg_mut(f.rd) = res;
        self.set_zn(res);
        Flow::Next
    }

    fn load(&mut self, instr: u16) -> Flow {
        let f = decode_m(instr);
        let addr = self.reg(f.base).wrapping_add(f.offset as u16);
        // Out of bounds is a no-op
        if let Some(addr) = self.addr_in_bounds(addr as i32) {
            *self.reg_mut(f.rd) = self.read_word(addr);
        }
        Flow::Next
    }

    fn store(&mut self, instr: u16) -> Flow {
        let f = decode_m(instr);
        let addr = self.reg(f.base).wrapping_add(f.offset as u16);
        if let Some(addr) = self.addr_in_bounds(addr as i32) {
            self.write_word(addr, self.reg(f.rd));
        }
        Flow::Next
    }

    // Jumps are relative to the jump itself, not the following instruction.
    fn jmp(&mut self, instr: u16) -> Flow {
        self.pc += decode_j(instr).offset as i32;
        Flow::Jump
    }

    fn brz(&mut self, instr: u16) -> Flow {
        if self.flags.z {
            self.jmp(instr)
        } else {
            Flow::Next
        }
    }

    fn halt(&mut self, _instr: u16) -> Flow {
        self.halted = true;
        Flow::Halt
    }

    fn unknown(&mut self, _instr: u16) -> Flow {
        Flow::Next
    }

    pub fn reg(&self, reg: Register) -> u16 {
        self.reg[reg.index()]
    }

    pub fn set_reg(&mut self, reg: Register, val: u16) {
        *self.reg_mut(reg) = val;
    }

    pub fn pc(&self) -> i32 {
        self.pc
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn mem_byte(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    /// Little-endian word at `addr`. `None` for the final byte of memory.
    pub fn mem_word(&self, addr: u16) -> Option<u16> {
        self.addr_in_bounds(addr as i32)
            .map(|addr| self.read_word(addr))
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    /// Returns `false` if the breakpoint already existed.
    pub fn add_breakpoint(&mut self, addr: u16) -> bool {
        self.breakpoints.insert(addr)
    }

    /// Returns whether a breakpoint existed at `addr`.
    pub fn remove_breakpoint(&mut self, addr: u16) -> bool {
        self.breakpoints.remove(addr)
    }

    pub fn watchpoints(&self) -> &Watchpoints {
        &self.watchpoints
    }

    pub fn add_watchpoint(&mut self, addr: u16) {
        self.watchpoints.insert(addr);
    }

    /// Copy machine state, including the first `window` bytes of memory.
    pub fn snapshot(&self, window: usize) -> Snapshot {
        Snapshot {
            registers: self.reg,
            pc: self.pc,
            flags: self.flags,
            halted: self.halted,
            cycle_count: self.cycle_count,
            instruction_count: self.instruction_count,
            memory: self.mem[..window.min(MEMORY_SIZE)].to_vec(),
        }
    }
}
