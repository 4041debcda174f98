//! Opcode rows 0x00-0x3F: the eight ALU groups (ADD/OR/ADC/SBB/AND/SUB/XOR/CMP),
//! segment PUSH/POP, and the BCD adjust instructions.

use crate::cpu::alu::{eval, AluOp, OpSize};
use crate::cpu::bcd;
use crate::cpu::decode::{decode_rm, fetch_modrm};
use crate::cpu::state::{Cpu, SegName};

const GROUPS: [(u8, AluOp); 8] = [
    (0x00, AluOp::Add),
    (0x08, AluOp::Or),
    (0x10, AluOp::Adc),
    (0x18, AluOp::Sbb),
    (0x20, AluOp::And),
    (0x28, AluOp::Sub),
    (0x30, AluOp::Xor),
    (0x38, AluOp::Cmp),
];

pub fn execute(cpu: &mut Cpu, opcode: u8) {
    for (base, op) in GROUPS {
        if opcode >= base && opcode <= base + 5 {
            alu_form(cpu, op, opcode - base);
            return;
        }
    }

    match opcode {
        0x06 => push_seg(cpu, SegName::Es),
        0x07 => pop_seg(cpu, SegName::Es),
        0x0E => push_seg(cpu, SegName::Cs),
        0x0F => pop_seg(cpu, SegName::Cs),
        0x16 => push_seg(cpu, SegName::Ss),
        0x17 => pop_seg(cpu, SegName::Ss),
        0x1E => push_seg(cpu, SegName::Ds),
        0x1F => pop_seg(cpu, SegName::Ds),
        0x27 => bcd::daa(cpu),
        0x2F => bcd::das(cpu),
        0x37 => bcd::aaa(cpu),
        0x3F => bcd::aas(cpu),
        _ => unreachable!("opcode 0x{opcode:02X} does not belong to the arithmetic row"),
    }
}

fn alu_form(cpu: &mut Cpu, op: AluOp, form: u8) {
    let carry_in = if matches!(op, AluOp::Adc | AluOp::Sbb) {
        cpu.get_flag(Cpu::CF) as u32
    } else {
        0
    };

    match form {
        0 => binary8(cpu, op, carry_in, false),
        1 => binary16(cpu, op, carry_in, false),
        2 => binary8(cpu, op, carry_in, true),
        3 => binary16(cpu, op, carry_in, true),
        4 => accum_imm8(cpu, op, carry_in),
        5 => accum_imm16(cpu, op, carry_in),
        _ => unreachable!(),
    }
}

/// `reg_is_dest = false`: `rm <- rm op reg`. `true`: `reg <- reg op rm`.
fn binary8(cpu: &mut Cpu, op: AluOp, carry_in: u32, reg_is_dest: bool) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    let (op0, op1) = if reg_is_dest {
        (cpu.read_reg8(reg) as u32, rm.read8(cpu) as u32)
    } else {
        (rm.read8(cpu) as u32, cpu.read_reg8(reg) as u32)
    };
    let out = eval(op, OpSize::Byte, op0, op1, carry_in);
    out.apply_flags(cpu);
    if op != AluOp::Cmp {
        if reg_is_dest {
            cpu.write_reg8(reg, out.result as u8);
        } else {
            rm.write8(cpu, out.result as u8);
        }
    }
}

fn binary16(cpu: &mut Cpu, op: AluOp, carry_in: u32, reg_is_dest: bool) {
    let modrm = fetch_modrm(cpu);
    let reg = modrm.reg;
    let rm = decode_rm(cpu, modrm);
    let (op0, op1) = if reg_is_dest {
        (cpu.read_reg16(reg) as u32, rm.read16(cpu) as u32)
    } else {
        (rm.read16(cpu) as u32, cpu.read_reg16(reg) as u32)
    };
    let out = eval(op, OpSize::Word, op0, op1, carry_in);
    out.apply_flags(cpu);
    if op != AluOp::Cmp {
        if reg_is_dest {
            cpu.write_reg16(reg, out.result as u16);
        } else {
            rm.write16(cpu, out.result as u16);
        }
    }
}

fn accum_imm8(cpu: &mut Cpu, op: AluOp, carry_in: u32) {
    let imm = cpu.fetch_u8();
    let al = cpu.read_reg8(0);
    let out = eval(op, OpSize::Byte, al as u32, imm as u32, carry_in);
    out.apply_flags(cpu);
    if op != AluOp::Cmp {
        cpu.write_reg8(0, out.result as u8);
    }
}

fn accum_imm16(cpu: &mut Cpu, op: AluOp, carry_in: u32) {
    let imm = cpu.fetch_u16();
    let ax = cpu.read_reg16(0);
    let out = eval(op, OpSize::Word, ax as u32, imm as u32, carry_in);
    out.apply_flags(cpu);
    if op != AluOp::Cmp {
        cpu.write_reg16(0, out.result as u16);
    }
}

fn push_seg(cpu: &mut Cpu, seg: SegName) {
    let value = cpu.read_seg(seg);
    cpu.push16(value);
}

fn pop_seg(cpu: &mut Cpu, seg: SegName) {
    let value = cpu.pop16();
    cpu.write_seg(seg, value);
}
