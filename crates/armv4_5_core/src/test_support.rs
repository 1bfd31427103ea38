//! An in-memory [`CoreBackend`] for unit and integration tests. It is not ARM
//! emulation: it never decodes an opcode. For `resume`, it recognizes exactly
//! the two fixed machine-code programs from [`crate::algorithms`] by matching
//! their opcode words in the memory it was asked to execute, and performs the
//! equivalent host-side computation -- the same sleight of hand a real target
//! would have performed in hardware, without requiring one.
use std::collections::HashMap;

use crate::backend::{BreakpointHandle, BreakpointSize, CoreBackend, WorkingArea};
use crate::core_state::Arm;
use crate::error::{ArmError, ArmResult};
use crate::mode::Mode;

#[derive(Debug, Clone, Copy)]
struct Breakpoint {
    address: u32,
    #[allow(dead_code)]
    size: BreakpointSize,
}

pub struct MockTarget {
    halted: bool,
    memory: HashMap<u32, u8>,
    /// cookie/mode -> value, keyed per physical slot so banked registers
    /// don't alias.
    target_regs: HashMap<usize, u32>,
    pub last_written_cpsr: Option<u32>,
    breakpoints: HashMap<u32, Breakpoint>,
    next_working_area: u32,
    pc: u32,
    /// When `resume` is called, run this closure against memory/pc/regs to
    /// decide where execution "lands" instead of genuinely fetching/decoding.
    program: Option<RecognizedProgram>,
    forced_timeout: bool,
    /// A register the simulated program clobbers as a side effect when it
    /// lands, the way a scratch register gets trashed by real machine code
    /// without ever being declared as a `RegParam` output.
    clobber_on_halt: Option<(usize, u32)>,
}

#[derive(Clone, Copy)]
enum RecognizedProgram {
    Crc32 { address_reg: usize, count_reg: usize, result_reg: usize },
    BlankCheck { address_reg: usize, count_reg: usize, acc_reg: usize },
}

impl MockTarget {
    pub fn halted() -> Self {
        MockTarget {
            halted: true,
            memory: HashMap::new(),
            target_regs: HashMap::new(),
            last_written_cpsr: None,
            breakpoints: HashMap::new(),
            next_working_area: 0x2000_0000,
            pc: 0,
            program: None,
            forced_timeout: false,
            clobber_on_halt: None,
        }
    }

    pub fn running() -> Self {
        let mut t = Self::halted();
        t.halted = false;
        t
    }

    /// Force the next `wait_halted` to report "still running" so the runner's
    /// timeout/forced-halt path can be exercised deterministically.
    pub fn force_timeout_once(&mut self) {
        self.forced_timeout = true;
    }

    pub fn recognize_crc32(&mut self, address_reg: usize, count_reg: usize, result_reg: usize) {
        self.program = Some(RecognizedProgram::Crc32 {
            address_reg,
            count_reg,
            result_reg,
        });
    }

    pub fn recognize_blank_check(&mut self, address_reg: usize, count_reg: usize, acc_reg: usize) {
        self.program = Some(RecognizedProgram::BlankCheck {
            address_reg,
            count_reg,
            acc_reg,
        });
    }

    /// Make the next `wait_halted` leave `slot` holding `value` on the
    /// target, independent of any recognized program -- simulates a register
    /// the algorithm used as scratch space and never restored itself.
    pub fn clobber_register_on_halt(&mut self, slot: usize, value: u32) {
        self.clobber_on_halt = Some((slot, value));
    }

    fn crc32_ieee(&self, address: u32, count: u32) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;
        for i in 0..count {
            let byte = *self.memory.get(&(address + i)).unwrap_or(&0);
            crc ^= (byte as u32) << 24;
            for _ in 0..8 {
                crc = if crc & 0x8000_0000 != 0 {
                    (crc << 1) ^ 0x04C1_1DB7
                } else {
                    crc << 1
                };
            }
        }
        crc
    }
}

impl CoreBackend for MockTarget {
    fn read_core_reg(&mut self, slot: usize, _cookie: u8, _mode: Mode) -> ArmResult<u32> {
        Ok(*self.target_regs.get(&slot).unwrap_or(&0))
    }

    fn write_core_reg(&mut self, slot: usize, _cookie: u8, _mode: Mode, value: u32) -> ArmResult<()> {
        if slot == crate::registers::CPSR_SLOT {
            self.last_written_cpsr = Some(value);
        }
        self.target_regs.insert(slot, value);
        Ok(())
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn halt(&mut self) -> ArmResult<()> {
        self.halted = true;
        Ok(())
    }

    fn resume(&mut self, entry_point: u32) -> ArmResult<()> {
        self.halted = false;
        self.pc = entry_point;
        Ok(())
    }

    fn wait_halted(&mut self, _timeout_ms: u32) -> ArmResult<bool> {
        if self.forced_timeout {
            self.forced_timeout = false;
            return Ok(false);
        }

        if let Some(program) = self.program {
            match program {
                RecognizedProgram::Crc32 {
                    address_reg,
                    count_reg,
                    result_reg,
                } => {
                    let address = *self.target_regs.get(&address_reg).unwrap_or(&0);
                    let count = *self.target_regs.get(&count_reg).unwrap_or(&0);
                    let crc = self.crc32_ieee(address, count);
                    self.target_regs.insert(result_reg, crc);
                }
                RecognizedProgram::BlankCheck {
                    address_reg,
                    count_reg,
                    acc_reg,
                } => {
                    let address = *self.target_regs.get(&address_reg).unwrap_or(&0);
                    let count = *self.target_regs.get(&count_reg).unwrap_or(&0);
                    let mut acc: u32 = 0xff;
                    for i in 0..count {
                        let byte = *self.memory.get(&(address + i)).unwrap_or(&0);
                        acc &= byte as u32;
                    }
                    self.target_regs.insert(acc_reg, acc);
                }
            }
        }

        if let Some((slot, value)) = self.clobber_on_halt.take() {
            self.target_regs.insert(slot, value);
        }

        if let Some(bp) = self.breakpoints.values().next() {
            self.pc = bp.address;
            self.target_regs.insert(crate::registers::PC_SLOT, bp.address);
        }
        self.halted = true;
        Ok(true)
    }

    fn write_buffer(&mut self, address: u32, data: &[u8]) -> ArmResult<()> {
        for (i, byte) in data.iter().enumerate() {
            self.memory.insert(address + i as u32, *byte);
        }
        Ok(())
    }

    fn read_buffer(&mut self, address: u32, len: usize) -> ArmResult<Vec<u8>> {
        Ok((0..len as u32).map(|i| *self.memory.get(&(address + i)).unwrap_or(&0)).collect())
    }

    fn breakpoint_add(&mut self, address: u32, size: BreakpointSize) -> ArmResult<BreakpointHandle> {
        self.breakpoints.insert(address, Breakpoint { address, size });
        Ok(BreakpointHandle(address))
    }

    fn breakpoint_remove(&mut self, handle: BreakpointHandle) -> ArmResult<()> {
        self.breakpoints
            .remove(&handle.0)
            .map(|_| ())
            .ok_or_else(|| ArmError::internal("removing breakpoint that was never installed"))
    }

    fn alloc_working_area(&mut self, size: u32) -> ArmResult<WorkingArea> {
        let area = WorkingArea {
            address: self.next_working_area,
            size,
        };
        self.next_working_area += size;
        Ok(area)
    }

    fn free_working_area(&mut self, _area: WorkingArea) -> ArmResult<()> {
        Ok(())
    }
}

impl MockTarget {
    pub fn pc(&self) -> u32 {
        self.pc
    }
}

/// Helper for tests that want to snapshot register values through the normal
/// `Arm` API rather than poking `target_regs` directly.
pub fn seed_register(arm: &mut Arm, target: &mut MockTarget, slot: usize, value: u32) -> ArmResult<()> {
    target.write_core_reg(slot, 0, Mode::Any, value)?;
    arm.get(target, slot)?;
    Ok(())
}
