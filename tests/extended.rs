//! Opcode row 0x60-0x6F: IMUL and OUTSB (INSB/REP INSB covered in scenarios.rs).

mod support;

use i8086::cpu::state::SegName;
use i8086::Cpu;
use support::{Harness, ScriptedPort};

#[test]
fn imul_16x16_no_overflow() {
    let mut h = Harness::new();
    h.cpu.write_reg16(3, 6); // BX, the rm operand and the writeback destination
    // 69 C3 07 00 = IMUL BX, 7 (reg field of C3 is ignored for storage)
    h.load_program(&[0x69, 0xC3, 0x07, 0x00], 0);
    h.cpu.step();
    assert_eq!(h.cpu.read_reg16(3), 42);
    assert!(!h.cpu.get_flag(Cpu::CF));
    assert!(!h.cpu.get_flag(Cpu::OF));
}

#[test]
fn imul_sets_overflow_when_product_does_not_fit() {
    let mut h = Harness::new();
    h.cpu.write_reg16(3, 1000); // BX
    // 6B C3 7F = IMUL BX, 0x7F (127) -> 127000, high 16 bits non-zero
    h.load_program(&[0x6B, 0xC3, 0x7F], 0);
    h.cpu.step();
    assert!(h.cpu.get_flag(Cpu::CF));
    assert!(h.cpu.get_flag(Cpu::OF));
}

#[test]
fn imul_negative_operands() {
    let mut h = Harness::new();
    h.cpu.write_reg16(3, 0xFFFE); // BX = -2
    // 69 C3 FD FF = IMUL BX, -3 -> 6, fits, no overflow
    h.load_program(&[0x69, 0xC3, 0xFD, 0xFF], 0);
    h.cpu.step();
    assert_eq!(h.cpu.read_reg16(3), 6);
    assert!(!h.cpu.get_flag(Cpu::OF));
}

#[test]
fn outsb_writes_port_from_ds_si_and_advances_si_and_di() {
    let mut h = Harness::new();
    h.set_port(ScriptedPort::new());
    h.cpu.write_seg(SegName::Ds, 0);
    h.cpu.write_reg16(6, 0x0300); // SI
    h.cpu.write_reg16(7, 0x0500); // DI, also advances though OUTSB never touches it
    h.mem.borrow_mut().load(0x0300, &[0x42]);
    h.cpu.write_reg16(2, 0x0080); // DX = port
    h.cpu.set_flag(Cpu::DF, false);
    h.load_program(&[0x6E], 0); // OUTSB
    h.cpu.step();
    assert_eq!(h.cpu.read_reg16(6), 0x0301);
    assert_eq!(h.cpu.read_reg16(7), 0x0501);
}

#[test]
fn bound_within_range_does_not_panic() {
    let mut h = Harness::new();
    h.cpu.write_seg(SegName::Ds, 0);
    h.cpu.write_reg16(0, 5); // AX, the value to range-check
    h.mem.borrow_mut().load(0x0400, &2i16.to_le_bytes());
    h.mem.borrow_mut().load(0x0402, &10i16.to_le_bytes());
    // 62 06 00 04 = BOUND AX, [0x0400]
    h.load_program(&[0x62, 0x06, 0x00, 0x04], 0);
    h.cpu.step();
    assert_eq!(h.cpu.read_reg16(0), 5);
}

#[test]
fn bound_with_register_modrm_does_not_panic() {
    // 62 C0 = BOUND AX, AX -- mode 3, a valid if nonsensical encoding.
    let mut h = Harness::new();
    h.cpu.write_reg16(0, 5);
    h.load_program(&[0x62, 0xC0], 0);
    h.cpu.step();
    assert_eq!(h.cpu.ip(), 2);
}
