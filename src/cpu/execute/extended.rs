//! Opcode row 0x60-0x6F: PUSHA/POPA, BOUND, sign-extending IMUL, immediate
//! PUSH, and the string I/O instructions INSB/INSW/OUTSB/OUTSW.

use crate::cpu::decode::{decode_rm, fetch_modrm};
use crate::cpu::state::{Cpu, SegName};

pub fn execute(cpu: &mut Cpu, opcode: u8) {
    match opcode {
        0x60 => pusha(cpu),
        0x61 => popa(cpu),
        0x62 => bound(cpu),
        0x63..=0x67 => {}
        0x68 => {
            let imm = cpu.fetch_u16();
            cpu.push16(imm);
        }
        0x69 => imul(cpu, ImmSize::Word),
        0x6A => {
            let imm = cpu.fetch_u8() as u16;
            cpu.push16(imm);
        }
        0x6B => imul(cpu, ImmSize::Byte),
        0x6C => string_io(cpu, StringOp::In, Width::Byte),
        0x6D => string_io(cpu, StringOp::In, Width::Word),
        0x6E => string_io(cpu, StringOp::Out, Width::Byte),
        0x6F => string_io(cpu, StringOp::Out, Width::Word),
        _ => unreachable!("opcode 0x{opcode:02X} does not belong to the extended row"),
    }
}

fn pusha(cpu: &mut Cpu) {
    let sp_before = cpu.read_reg16(4);
    cpu.push16(cpu.read_reg16(0)); // AX
    cpu.push16(cpu.read_reg16(1)); // CX
    cpu.push16(cpu.read_reg16(2)); // DX
    cpu.push16(cpu.read_reg16(3)); // BX
    cpu.push16(sp_before);
    cpu.push16(cpu.read_reg16(5)); // BP
    cpu.push16(cpu.read_reg16(6)); // SI
    cpu.push16(cpu.read_reg16(7)); // DI
}

fn popa(cpu: &mut Cpu) {
    let di = cpu.pop16();
    let si = cpu.pop16();
    let bp = cpu.pop16();
    let _discarded_sp = cpu.pop16();
    let bx = cpu.pop16();
    let dx = cpu.pop16();
    let cx = cpu.pop16();
    let ax = cpu.pop16();
    cpu.write_reg16(7, di);
    cpu.write_reg16(6, si);
    cpu.write_reg16(5, bp);
    cpu.write_reg16(3, bx);
    cpu.write_reg16(2, dx);
    cpu.write_reg16(1, cx);
    cpu.write_reg16(0, ax);
}

fn bound(cpu: &mut Cpu) {
    let modrm = fetch_modrm(cpu);
    let reg_val = cpu.read_reg16(modrm.reg) as i16;
    let rm = decode_rm(cpu, modrm);
    let offset = rm.offset();
    let seg = cpu.effective_segment(SegName::Ds);
    let low = cpu.memory().read_u16(Cpu::linear(seg, offset)) as i16;
    let high = cpu.memory().read_u16(Cpu::linear(seg, offset.wrapping_add(2))) as i16;
    if reg_val < low || reg_val > high {
        // Real hardware raises INT 5 (BOUND range exceeded). Interrupt
        // delivery is outside this core's scope.
    }
}

enum ImmSize {
    Byte,
    Word,
}

/// The ModRM `reg` field is decoded (it's part of the encoding) but, per the
/// source this is grounded on, plays no role in storage: both operand and
/// result flow entirely through the rm operand.
fn imul(cpu: &mut Cpu, imm_size: ImmSize) {
    let modrm = fetch_modrm(cpu);
    let rm = decode_rm(cpu, modrm);
    let rm_val = rm.read16(cpu) as i16 as i32;
    let imm = match imm_size {
        ImmSize::Byte => cpu.fetch_i8() as i32,
        ImmSize::Word => cpu.fetch_i16() as i32,
    };

    let product = rm_val.wrapping_mul(imm);
    let overflow = (product as u32 & 0xFFFF_0000) != 0;

    rm.write16(cpu, product as u16);
    cpu.set_flag(Cpu::CF, overflow);
    cpu.set_flag(Cpu::OF, overflow);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringOp {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Byte,
    Word,
}

fn string_io(cpu: &mut Cpu, op: StringOp, width: Width) {
    if cpu.prefix.rep != 0 && cpu.read_reg16(1) == 0 {
        return;
    }

    let step: i16 = if cpu.get_flag(Cpu::DF) {
        -(width_bytes(width) as i16)
    } else {
        width_bytes(width) as i16
    };

    match op {
        StringOp::In => {
            let port = cpu.read_reg16(2); // DX
            let di = cpu.read_reg16(7);
            let addr = Cpu::linear(cpu.read_seg(SegName::Es), di);
            match width {
                Width::Byte => {
                    let value = cpu.port_mut().read(port).unwrap_or(0xFF);
                    cpu.memory_mut().write_u8(addr, value);
                }
                Width::Word => {
                    let lo = cpu.port_mut().read(port).unwrap_or(0xFF);
                    let hi = cpu.port_mut().read(port.wrapping_add(1)).unwrap_or(0xFF);
                    cpu.memory_mut()
                        .write_u16(addr, u16::from_le_bytes([lo, hi]));
                }
            }
            cpu.write_reg16(7, di.wrapping_add(step as u16));
            let si = cpu.read_reg16(6);
            cpu.write_reg16(6, si.wrapping_add(step as u16));
        }
        StringOp::Out => {
            let port = cpu.read_reg16(2); // DX
            let si = cpu.read_reg16(6);
            let seg = cpu.effective_segment(SegName::Ds);
            let addr = Cpu::linear(seg, si);
            match width {
                Width::Byte => {
                    let value = cpu.memory().read_u8(addr);
                    cpu.port_mut().write(port, value);
                }
                Width::Word => {
                    let value = cpu.memory().read_u16(addr);
                    let [lo, hi] = value.to_le_bytes();
                    cpu.port_mut().write(port, lo);
                    cpu.port_mut().write(port.wrapping_add(1), hi);
                }
            }
            cpu.write_reg16(6, si.wrapping_add(step as u16));
            let di = cpu.read_reg16(7);
            cpu.write_reg16(7, di.wrapping_add(step as u16));
        }
    }

    if cpu.prefix.rep != 0 {
        let cx = cpu.read_reg16(1).wrapping_sub(1);
        cpu.write_reg16(1, cx);
        cpu.rewind_to_instruction_start();
    }
}

fn width_bytes(width: Width) -> u16 {
    match width {
        Width::Byte => 1,
        Width::Word => 2,
    }
}
