//! ModRM byte decoding and the rm-indexed 16-bit effective-address table.

use crate::cpu::state::{Cpu, SegName};

use super::operand::Rm;

/// The three fields of a ModRM byte: `mode` (0..3), `reg` (0..7), `rm` (0..7).
#[derive(Debug, Clone, Copy)]
pub struct ModRm {
    pub mode: u8,
    pub reg: u8,
    pub rm: u8,
}

impl ModRm {
    #[inline(always)]
    pub fn decode(byte: u8) -> Self {
        ModRm {
            mode: byte >> 6,
            reg: (byte >> 3) & 0x7,
            rm: byte & 0x7,
        }
    }

    #[inline(always)]
    pub fn is_register(self) -> bool {
        self.mode == 3
    }
}

/// Fetch a ModRM byte, any trailing displacement, and resolve the rm field
/// to either a register index or an effective address. Also records the
/// fields onto the CPU's [`crate::cpu::state::FetchRecord`] and switches the
/// prefix record's effective segment to SS when the addressing mode implies
/// a BP-relative default and no override prefix is already active.
pub fn fetch_modrm(cpu: &mut Cpu) -> ModRm {
    let byte = cpu.fetch_u8();
    let modrm = ModRm::decode(byte);
    cpu.fetch.modrm_index = cpu.fetch.len.saturating_sub(1);
    cpu.fetch.mode = modrm.mode;
    cpu.fetch.reg = modrm.reg;
    cpu.fetch.rm = modrm.rm;
    modrm
}

/// Resolve a decoded [`ModRm`] to an operand location, consuming any
/// trailing displacement bytes the addressing mode requires.
pub fn decode_rm(cpu: &mut Cpu, modrm: ModRm) -> Rm {
    if modrm.is_register() {
        return Rm::Reg(modrm.rm);
    }

    let uses_bp_default = matches!(modrm.rm, 2 | 3) || (modrm.rm == 6 && modrm.mode != 0);

    let disp: i32 = match modrm.mode {
        0 => {
            if modrm.rm == 6 {
                cpu.fetch_u16() as i32
            } else {
                0
            }
        }
        1 => cpu.fetch_i8() as i32,
        2 => cpu.fetch_u16() as i32,
        _ => unreachable!("mode 3 handled above"),
    };
    cpu.fetch.disp = disp;

    if uses_bp_default && !cpu.prefix.override_active {
        cpu.prefix.effective_seg = SegName::Ss;
    }

    let base = match modrm.rm {
        0 => cpu.read_reg16(3).wrapping_add(cpu.read_reg16(6)), // BX+SI
        1 => cpu.read_reg16(3).wrapping_add(cpu.read_reg16(7)), // BX+DI
        2 => cpu.read_reg16(5).wrapping_add(cpu.read_reg16(6)), // BP+SI
        3 => cpu.read_reg16(5).wrapping_add(cpu.read_reg16(7)), // BP+DI
        4 => cpu.read_reg16(6),                                 // SI
        5 => cpu.read_reg16(7),                                 // DI
        6 => {
            if modrm.mode == 0 {
                0 // disp16 is the whole address
            } else {
                cpu.read_reg16(5) // BP
            }
        }
        7 => cpu.read_reg16(3), // BX
        _ => unreachable!(),
    };

    let offset = base.wrapping_add(disp as u16);
    let default_seg = if uses_bp_default { SegName::Ss } else { SegName::Ds };

    Rm::Mem { offset, default_seg }
}
