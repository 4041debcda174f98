//! CPU register/flag state, fetch plumbing, and the top-level step loop.
//!
//! Registers are modeled as a flat 32-bit array with typed byte/word/dword
//! views (§9: a union in languages that have one, typed accessors here).
//! FLAGS is a single 32-bit word with named bit positions. Memory and port
//! collaborators are owned by the CPU as trait objects, installed once via
//! [`Cpu::set_memory`]/[`Cpu::set_port`] and dropped with it.

use serde::{Deserialize, Serialize};

use crate::memory::Memory;
use crate::port::Port;

use super::execute;

/// Index of each segment register within [`State::segs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegName {
    Es = 0,
    Cs = 1,
    Ss = 2,
    Ds = 3,
    Fs = 4,
    Gs = 5,
}

/// Architectural register/segment/flag state. Serializable on its own so a
/// host can snapshot/restore a [`Cpu`] without the core depending on a
/// specific persistence format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// EAX, ECX, EDX, EBX, ESP, EBP, ESI, EDI, in that order.
    pub regs: [u32; 8],
    /// ES, CS, SS, DS, FS, GS, in that order.
    pub segs: [u16; 6],
    pub prev_cs: u16,
    pub trace_start_cs: u16,
    pub eip: u32,
    pub prev_eip: u32,
    pub trace_start_eip: u32,
    pub eflags: u32,
}

impl Default for State {
    fn default() -> Self {
        State {
            regs: [0; 8],
            segs: [0; 6],
            prev_cs: 0,
            trace_start_cs: 0,
            eip: 0,
            prev_eip: 0,
            trace_start_eip: 0,
            eflags: 1,
        }
    }
}

/// The bytes fetched for the instruction currently being decoded, plus the
/// ModRM fields once decoded. Reset at the top of every [`Cpu::step`] and
/// discarded at the bottom; scratch operand/result values live as locals in
/// the handlers that need them instead of here (§9).
#[derive(Debug, Clone, Default)]
pub struct FetchRecord {
    pub bytes: [u8; 16],
    pub len: u8,
    pub prefix_count: u8,
    pub modrm_index: u8,
    pub mode: u8,
    pub reg: u8,
    pub rm: u8,
    pub disp: i32,
}

/// Prefix state accumulated while classifying bytes at the top of an
/// instruction: the effective segment for the current memory operand, and
/// any repeat prefix.
#[derive(Debug, Clone, Copy)]
pub struct PrefixRecord {
    pub effective_seg: SegName,
    pub override_active: bool,
    pub rep: u8,
}

impl Default for PrefixRecord {
    fn default() -> Self {
        PrefixRecord {
            effective_seg: SegName::Ds,
            override_active: false,
            rep: 0,
        }
    }
}

/// The CPU core: architectural state plus its memory/port collaborators.
pub struct Cpu {
    pub(crate) state: State,
    pub(crate) fetch: FetchRecord,
    pub(crate) prefix: PrefixRecord,
    memory: Option<Box<dyn Memory>>,
    port: Option<Box<dyn Port>>,
}

impl Cpu {
    // FLAGS bit positions (§3).
    pub const CF: u32 = 1 << 0;
    pub const PF: u32 = 1 << 2;
    pub const AF: u32 = 1 << 4;
    pub const ZF: u32 = 1 << 6;
    pub const SF: u32 = 1 << 7;
    pub const TF: u32 = 1 << 8;
    pub const IF: u32 = 1 << 9;
    pub const DF: u32 = 1 << 10;
    pub const OF: u32 = 1 << 11;
    pub const IOPL_SHIFT: u32 = 12;
    pub const IOPL_MASK: u32 = 0b11 << 12;
    pub const NT: u32 = 1 << 14;
    pub const RF: u32 = 1 << 16;
    pub const VM: u32 = 1 << 17;
    pub const AC: u32 = 1 << 18;
    pub const VIF: u32 = 1 << 19;
    pub const VIP: u32 = 1 << 20;
    pub const ID: u32 = 1 << 21;

    /// A freshly reset CPU: zeroed registers/segments, EFLAGS per hardware
    /// reset convention, no collaborators installed.
    pub fn new() -> Self {
        Cpu {
            state: State::default(),
            fetch: FetchRecord::default(),
            prefix: PrefixRecord::default(),
            memory: None,
            port: None,
        }
    }

    pub fn set_memory(&mut self, memory: Box<dyn Memory>) {
        self.memory = Some(memory);
    }

    pub fn set_port(&mut self, port: Box<dyn Port>) {
        self.port = Some(port);
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub(crate) fn memory(&self) -> &dyn Memory {
        self.memory
            .as_deref()
            .expect("memory collaborator not installed")
    }

    pub(crate) fn memory_mut(&mut self) -> &mut dyn Memory {
        self.memory
            .as_deref_mut()
            .expect("memory collaborator not installed")
    }

    pub(crate) fn port_mut(&mut self) -> &mut dyn Port {
        self.port
            .as_deref_mut()
            .expect("port collaborator not installed")
    }

    /// `(seg << 4) + off`, truncated to the 20-bit real-mode address space.
    #[inline(always)]
    pub fn linear(seg: u16, off: u16) -> u32 {
        ((seg as u32) << 4) + (off as u32)
    }

    // === Register accessors (A) ===

    /// Register encoding: 0=AL, 1=CL, 2=DL, 3=BL, 4=AH, 5=CH, 6=DH, 7=BH.
    #[inline(always)]
    pub fn read_reg8(&self, reg: u8) -> u8 {
        let idx = (reg & 0b11) as usize;
        if reg < 4 {
            self.state.regs[idx] as u8
        } else {
            (self.state.regs[idx] >> 8) as u8
        }
    }

    #[inline(always)]
    pub fn write_reg8(&mut self, reg: u8, value: u8) {
        let idx = (reg & 0b11) as usize;
        if reg < 4 {
            self.state.regs[idx] = (self.state.regs[idx] & !0xFF) | value as u32;
        } else {
            self.state.regs[idx] = (self.state.regs[idx] & !0xFF00) | ((value as u32) << 8);
        }
    }

    /// Register encoding: 0=AX, 1=CX, 2=DX, 3=BX, 4=SP, 5=BP, 6=SI, 7=DI.
    #[inline(always)]
    pub fn read_reg16(&self, reg: u8) -> u16 {
        self.state.regs[(reg & 0b111) as usize] as u16
    }

    #[inline(always)]
    pub fn write_reg16(&mut self, reg: u8, value: u16) {
        let idx = (reg & 0b111) as usize;
        self.state.regs[idx] = (self.state.regs[idx] & 0xFFFF_0000) | value as u32;
    }

    #[inline(always)]
    pub fn read_reg32(&self, reg: u8) -> u32 {
        self.state.regs[(reg & 0b111) as usize]
    }

    #[inline(always)]
    pub fn write_reg32(&mut self, reg: u8, value: u32) {
        self.state.regs[(reg & 0b111) as usize] = value;
    }

    #[inline(always)]
    pub fn read_seg(&self, seg: SegName) -> u16 {
        self.state.segs[seg as usize]
    }

    #[inline(always)]
    pub fn write_seg(&mut self, seg: SegName, value: u16) {
        self.state.segs[seg as usize] = value;
    }

    /// Segment encoding as it appears in MOV rm,sreg / MOV sreg,rm (ModRM reg
    /// field, 0..5 covering ES/CS/SS/DS/FS/GS).
    #[inline(always)]
    pub fn read_seg_n(&self, n: u8) -> u16 {
        self.state.segs[(n & 0b111).min(5) as usize]
    }

    #[inline(always)]
    pub fn write_seg_n(&mut self, n: u8, value: u16) {
        self.state.segs[(n & 0b111).min(5) as usize] = value;
    }

    #[inline(always)]
    pub fn ip(&self) -> u16 {
        self.state.eip as u16
    }

    #[inline(always)]
    pub fn set_ip(&mut self, ip: u16) {
        self.state.eip = (self.state.eip & 0xFFFF_0000) | ip as u32;
    }

    // === Flag accessors (A) ===

    #[inline(always)]
    pub fn get_flag(&self, flag: u32) -> bool {
        self.state.eflags & flag != 0
    }

    #[inline(always)]
    pub fn set_flag(&mut self, flag: u32, value: bool) {
        if value {
            self.state.eflags |= flag;
        } else {
            self.state.eflags &= !flag;
        }
    }

    #[inline(always)]
    pub fn iopl(&self) -> u8 {
        ((self.state.eflags & Self::IOPL_MASK) >> Self::IOPL_SHIFT) as u8
    }

    #[inline(always)]
    pub fn set_iopl(&mut self, value: u8) {
        self.state.eflags =
            (self.state.eflags & !Self::IOPL_MASK) | (((value & 0b11) as u32) << Self::IOPL_SHIFT);
    }

    // === Fetch (C) ===

    #[inline(always)]
    fn record_fetched_byte(&mut self, byte: u8) {
        let idx = self.fetch.len as usize;
        if idx < self.fetch.bytes.len() {
            self.fetch.bytes[idx] = byte;
            self.fetch.len += 1;
        }
    }

    /// Fetch one byte from CS:IP and advance IP, wrapping within the 16-bit
    /// real-mode offset.
    pub fn fetch_u8(&mut self) -> u8 {
        let cs = self.read_seg(SegName::Cs);
        let ip = self.ip();
        let addr = Self::linear(cs, ip);
        let byte = self.memory().read_u8(addr);
        self.set_ip(ip.wrapping_add(1));
        self.record_fetched_byte(byte);
        byte
    }

    pub fn fetch_u16(&mut self) -> u16 {
        let lo = self.fetch_u8() as u16;
        let hi = self.fetch_u8() as u16;
        (hi << 8) | lo
    }

    pub fn fetch_i8(&mut self) -> i8 {
        self.fetch_u8() as i8
    }

    pub fn fetch_i16(&mut self) -> i16 {
        self.fetch_u16() as i16
    }

    // === Stack helpers ===

    pub fn push16(&mut self, value: u16) {
        let sp = self.read_reg16(4).wrapping_sub(2);
        self.write_reg16(4, sp);
        let ss = self.read_seg(SegName::Ss);
        let addr = Self::linear(ss, sp);
        self.memory_mut().write_u16(addr, value);
    }

    pub fn pop16(&mut self) -> u16 {
        let sp = self.read_reg16(4);
        let ss = self.read_seg(SegName::Ss);
        let addr = Self::linear(ss, sp);
        let value = self.memory().read_u16(addr);
        self.write_reg16(4, sp.wrapping_add(2));
        value
    }

    // === Step (E) ===

    /// Decode and fully execute exactly one instruction (or one iteration of
    /// a REP-prefixed string instruction), then return.
    #[tracing::instrument(level = "trace", skip(self), fields(cs, ip))]
    pub fn step(&mut self) {
        self.fetch = FetchRecord::default();
        self.prefix = PrefixRecord::default();

        self.state.prev_eip = self.state.eip;
        self.state.prev_cs = self.read_seg(SegName::Cs);
        self.state.trace_start_eip = self.state.eip;
        self.state.trace_start_cs = self.state.prev_cs;

        tracing::Span::current().record("cs", self.state.trace_start_cs);
        tracing::Span::current().record("ip", self.state.trace_start_eip as u16);

        loop {
            let opcode = self.fetch_u8();
            match opcode {
                0x26 | 0x2E | 0x36 | 0x3E => {
                    let seg = match opcode {
                        0x26 => SegName::Es,
                        0x2E => SegName::Cs,
                        0x36 => SegName::Ss,
                        0x3E => SegName::Ds,
                        _ => unreachable!(),
                    };
                    self.prefix.effective_seg = seg;
                    self.prefix.override_active = true;
                    self.fetch.prefix_count += 1;
                    tracing::trace!(?seg, "segment override prefix");
                }
                0xF2 | 0xF3 => {
                    self.prefix.rep = opcode;
                    self.fetch.prefix_count += 1;
                    tracing::trace!(rep = opcode, "repeat prefix");
                }
                _ => {
                    tracing::trace!(opcode, "dispatch");
                    execute::dispatch(self, opcode);
                    break;
                }
            }
        }
    }

    /// Rewind EIP to the start of the instruction currently executing, for
    /// REP string opcodes to re-enter themselves on the next `step` call.
    pub(crate) fn rewind_to_instruction_start(&mut self) {
        self.state.eip = self.state.trace_start_eip;
    }

    /// The effective segment for the current memory operand: the prefix
    /// override if one is active, otherwise `default`.
    pub(crate) fn effective_segment(&self, default: SegName) -> u16 {
        if self.prefix.override_active {
            self.read_seg(self.prefix.effective_seg)
        } else {
            self.read_seg(default)
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
