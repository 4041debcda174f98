//! I/O port collaborator interface.
//!
//! Mirrors [`crate::memory::Memory`] but for the 8086's separate 16-bit port
//! address space, as consumed by INSB/INSW/OUTSB/OUTSW.

/// A 16-bit I/O port space.
pub trait Port {
    /// Read one byte from `port`. `None` means no device answered; the core
    /// substitutes `0xFF`, matching an open bus on real hardware.
    fn read(&mut self, port: u16) -> Option<u8>;

    /// Write one byte to `port`.
    fn write(&mut self, port: u16, value: u8);
}
