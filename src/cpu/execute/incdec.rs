//! Opcode row 0x40-0x4F: INC/DEC on each 16-bit general register.
//!
//! INC/DEC reuse the ALU kernel with a constant operand of 1 and then
//! restore the pre-existing CF, which INC/DEC never touch.

use crate::cpu::alu::{eval, AluOp, OpSize};
use crate::cpu::state::Cpu;

pub fn execute(cpu: &mut Cpu, opcode: u8) {
    let reg = opcode & 0x07;
    let op = if opcode < 0x48 { AluOp::Add } else { AluOp::Sub };

    let cf_before = cpu.get_flag(Cpu::CF);
    let value = cpu.read_reg16(reg);
    let out = eval(op, OpSize::Word, value as u32, 1, 0);
    out.apply_flags(cpu);
    cpu.set_flag(Cpu::CF, cf_before);
    cpu.write_reg16(reg, out.result as u16);
}
