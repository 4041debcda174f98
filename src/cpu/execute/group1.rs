//! Opcode row 0x80-0x8F: GRP1 immediate ALU ops, TEST, XCHG, MOV, LEA, and
//! POP rm16.
//!
//! GRP1's `reg` field selects the ALU op (0=ADD 1=OR 2=ADC 3=SBB 4=AND 5=SUB
//! 6=XOR 7=CMP); 0x81/0x83 write back at 16 bits regardless of how the
//! immediate was encoded, and logical ops use the full operand width when
//! deriving ZF/SF, not a truncated 8-bit view.

use crate::cpu::alu::{eval, AluOp, OpSize};
use crate::cpu::decode::{decode_rm, fetch_modrm};
use crate::cpu::state::Cpu;

const GRP1_OPS: [AluOp; 8] = [
    AluOp::Add,
    AluOp::Or,
    AluOp::Adc,
    AluOp::Sbb,
    AluOp::And,
    AluOp::Sub,
    AluOp::Xor,
    AluOp::Cmp,
];

pub fn execute(cpu: &mut Cpu, opcode: u8) {
    match opcode {
        0x80 | 0x82 => grp1_byte(cpu),
        0x81 => grp1_word(cpu, false),
        0x83 => grp1_word(cpu, true),
        0x84 => test8(cpu),
        0x85 => test16(cpu),
        0x86 => xchg8(cpu),
        0x87 => xchg16(cpu),
        0x88 => mov_rm8_r8(cpu),
        0x89 => mov_rm16_r16(cpu),
        0x8A => mov_r8_rm8(cpu),
        0x8B => mov_r16_rm16(cpu),
        0x8C => mov_rm16_sreg(cpu),
        0x8D => lea(cpu),
        0x8E => mov_sreg_rm16(cpu),
        0x8F => pop_rm16(cpu),
        _ => unreachable!("opcode 0x{opcode:02X} does not belong to group 1"),
    }
}

fn grp1_byte(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let op = GRP1_OPS[modrm.reg as usize];
    let rm = decode_rm(cpu, modrm);
    let imm = cpu.fetch_u8();
    let op0 = rm.read8(cpu) as u32;
    let carry_in = if matches!(op, AluOp::Adc | AluOp::Sbb) {
        cpu.get_flag(Cpu::CF) as u32
    } else {
        0
    };
    let out = eval(op, OpSize::Byte, op0, imm as u32, carry_in);
    out.apply_flags(cpu);
    if op != AluOp::Cmp {
        rm.write8(cpu, out.result as u8);
    }
}

/// `sign_extend_imm8`: true for 0x83 (imm8 sign-extended to 16 bits), false
/// for 0x81 (full imm16).
fn grp1_word(cpu: &mut Cpu, sign_extend_imm8: bool) {
    let modrm = fetch_modrm(cpu);
    let op = GRP1_OPS[modrm.reg as usize];
    let rm = decode_rm(cpu, modrm);
    let imm = if sign_extend_imm8 {
        cpu.fetch_i8() as i16 as u16
    } else {
        cpu.fetch_u16()
    };
    let op0 = rm.read16(cpu) as u32;
    let carry_in = if matches!(op, AluOp::Adc | AluOp::Sbb) {
        cpu.get_flag(Cpu::CF) as u32
    } else {
        0
    };
    let out = eval(op, OpSize::Word, op0, imm as u32, carry_in);
    out.apply_flags(cpu);
    if op != AluOp::Cmp {
        // ISA-correct 16-bit writeback, regardless of immediate encoding width.
        rm.write16(cpu, out.result as u16);
    }
}

fn test8(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    let out = eval(
        AluOp::Test,
        OpSize::Byte,
        rm.read8(cpu) as u32,
        cpu.read_reg8(reg) as u32,
        0,
    );
    out.apply_flags(cpu);
}

fn test16(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    let out = eval(
        AluOp::Test,
        OpSize::Word,
        rm.read16(cpu) as u32,
        cpu.read_reg16(reg) as u32,
        0,
    );
    out.apply_flags(cpu);
}

fn xchg8(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    let reg_val = cpu.read_reg8(reg);
    let rm_val = rm.read8(cpu);
    cpu.write_reg8(reg, rm_val);
    rm.write8(cpu, reg_val);
}

fn xchg16(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    let reg_val = cpu.read_reg16(reg);
    let rm_val = rm.read16(cpu);
    cpu.write_reg16(reg, rm_val);
    rm.write16(cpu, reg_val);
}

fn mov_rm8_r8(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    rm.write8(cpu, cpu.read_reg8(reg));
}

fn mov_rm16_r16(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    rm.write16(cpu, cpu.read_reg16(reg));
}

fn mov_r8_rm8(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    let value = rm.read8(cpu);
    cpu.write_reg8(reg, value);
}

fn mov_r16_rm16(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    let value = rm.read16(cpu);
    cpu.write_reg16(reg, value);
}

fn mov_rm16_sreg(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let seg_value = cpu.read_seg_n(modrm.reg);
    let rm = decode_rm(cpu, modrm);
    rm.write16(cpu, seg_value);
}

fn mov_sreg_rm16(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    let value = rm.read16(cpu);
    cpu.write_seg_n(reg, value);
}

fn lea(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    cpu.write_reg16(reg, rm.offset());
}

fn pop_rm16(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let rm = decode_rm(cpu, modrm);
    let value = cpu.pop16();
    rm.write16(cpu, value);
}
