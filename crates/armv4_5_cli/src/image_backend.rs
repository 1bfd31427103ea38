//! A [`CoreBackend`] with no live JTAG transport behind it: a flat memory
//! image loaded from disk plus a register file that starts zeroed. Enough to
//! drive `disassemble` against a firmware dump and `reg`/`core_state` against
//! a target that never actually runs -- real transports are an external
//! collaborator this tool doesn't provide (see DESIGN.md).
use std::collections::HashMap;

use armv4_5_core::backend::{BreakpointHandle, BreakpointSize, CoreBackend, WorkingArea};
use armv4_5_core::error::{ArmError, ArmResult};
use armv4_5_core::mode::Mode;

pub struct ImageBackend {
    base: u32,
    image: Vec<u8>,
    regs: HashMap<usize, u32>,
    next_working_area: u32,
}

impl ImageBackend {
    pub fn new(image: Vec<u8>, base: u32) -> Self {
        ImageBackend {
            base,
            image,
            regs: HashMap::new(),
            next_working_area: 0x2000_0000,
        }
    }

    fn offset(&self, address: u32) -> Option<usize> {
        address.checked_sub(self.base).map(|o| o as usize)
    }
}

impl CoreBackend for ImageBackend {
    fn read_core_reg(&mut self, slot: usize, _cookie: u8, _mode: Mode) -> ArmResult<u32> {
        Ok(*self.regs.get(&slot).unwrap_or(&0))
    }

    fn write_core_reg(&mut self, slot: usize, _cookie: u8, _mode: Mode, value: u32) -> ArmResult<()> {
        self.regs.insert(slot, value);
        Ok(())
    }

    fn is_halted(&self) -> bool {
        true
    }

    fn halt(&mut self) -> ArmResult<()> {
        Ok(())
    }

    fn resume(&mut self, _entry_point: u32) -> ArmResult<()> {
        Err(ArmError::TargetFailure(
            "this tool has no live transport to run target code on".into(),
        ))
    }

    fn wait_halted(&mut self, _timeout_ms: u32) -> ArmResult<bool> {
        Ok(true)
    }

    fn write_buffer(&mut self, address: u32, data: &[u8]) -> ArmResult<()> {
        let start = self
            .offset(address)
            .ok_or_else(|| ArmError::invalid_arguments("address below image base"))?;
        if start + data.len() > self.image.len() {
            self.image.resize(start + data.len(), 0);
        }
        self.image[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&mut self, address: u32, len: usize) -> ArmResult<Vec<u8>> {
        let start = self
            .offset(address)
            .ok_or_else(|| ArmError::invalid_arguments("address below image base"))?;
        let mut out = vec![0u8; len];
        for (i, byte) in out.iter_mut().enumerate() {
            if let Some(b) = self.image.get(start + i) {
                *byte = *b;
            }
        }
        Ok(out)
    }

    fn breakpoint_add(&mut self, address: u32, size: BreakpointSize) -> ArmResult<BreakpointHandle> {
        let _ = size;
        Ok(BreakpointHandle(address))
    }

    fn breakpoint_remove(&mut self, _handle: BreakpointHandle) -> ArmResult<()> {
        Ok(())
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
