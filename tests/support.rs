//! Shared test fixtures: a flat 1 MiB memory and a scriptable port space.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use i8086::memory::Memory;
use i8086::port::Port;
use i8086::Cpu;

pub const ONE_MIB: usize = 1 << 20;

/// Install a `tracing` fmt subscriber the first time any test calls this, so
/// `RUST_LOG=trace cargo test -- --nocapture` shows per-instruction decode
/// traces. Safe to call from every test; only the first call takes effect.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A flat byte-addressable RAM backing the whole 1 MiB real-mode space.
pub struct FlatMemory {
    bytes: Vec<u8>,
}

impl FlatMemory {
    pub fn new() -> Self {
        FlatMemory {
            bytes: vec![0; ONE_MIB],
        }
    }

    pub fn load(&mut self, addr: u32, data: &[u8]) {
        let start = addr as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
    }
}

impl Memory for FlatMemory {
    fn read(&self, addr: u32, out: &mut [u8]) -> u32 {
        let start = addr as usize;
        let end = (start + out.len()).min(self.bytes.len());
        let n = end.saturating_sub(start);
        out[..n].copy_from_slice(&self.bytes[start..end]);
        n as u32
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> u32 {
        let start = addr as usize;
        let end = (start + data.len()).min(self.bytes.len());
        let n = end.saturating_sub(start);
        self.bytes[start..end].copy_from_slice(&data[..n]);
        n as u32
    }
}

/// A port space that replays a fixed queue of read bytes per port and
/// records every write, for scripting string-I/O scenarios.
#[derive(Default)]
pub struct ScriptedPort {
    reads: std::collections::HashMap<u16, VecDeque<u8>>,
    pub writes: Vec<(u16, u8)>,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_read(&mut self, port: u16, value: u8) {
        self.reads.entry(port).or_default().push_back(value);
    }
}

impl Port for ScriptedPort {
    fn read(&mut self, port: u16) -> Option<u8> {
        self.reads.get_mut(&port).and_then(|q| q.pop_front())
    }

    fn write(&mut self, port: u16, value: u8) {
        self.writes.push((port, value));
    }
}

/// Shared handle so tests can inspect memory after `cpu.step()` without
/// fighting the borrow checker over the boxed trait object the CPU owns.
pub struct Harness {
    pub cpu: Cpu,
    pub mem: Rc<RefCell<FlatMemory>>,
}

struct MemoryHandle(Rc<RefCell<FlatMemory>>);

impl Memory for MemoryHandle {
    fn read(&self, addr: u32, out: &mut [u8]) -> u32 {
        self.0.borrow().read(addr, out)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> u32 {
        self.0.borrow_mut().write(addr, data)
    }
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let mem = Rc::new(RefCell::new(FlatMemory::new()));
        let mut cpu = Cpu::new();
        cpu.set_memory(Box::new(MemoryHandle(mem.clone())));
        Harness { cpu, mem }
    }

    /// Load `program` at linear address `(cs << 4) + 0`, and point CS:IP at it.
    pub fn load_program(&mut self, program: &[u8], cs: u16) {
        let addr = (cs as u32) << 4;
        self.mem.borrow_mut().load(addr, program);
        self.cpu.write_seg(i8086::cpu::state::SegName::Cs, cs);
        self.cpu.set_ip(0);
    }

    pub fn read_mem8(&self, addr: u32) -> u8 {
        self.mem.borrow().bytes[addr as usize]
    }

    pub fn read_mem16(&self, addr: u32) -> u16 {
        let lo = self.read_mem8(addr) as u16;
        let hi = self.read_mem8(addr + 1) as u16;
        (hi << 8) | lo
    }

    pub fn set_port(&mut self, port: impl Port + 'static) {
        self.cpu.set_port(Box::new(port));
    }
}
