//! The back-end contract (§6): the interface this core consumes from the
//! core-variant / transport layer. JTAG transport, adapter drivers, and the
//! instruction decoder are all external collaborators reached through here
//! or through [`crate::decode::InstructionDecoder`].
use crate::error::ArmResult;
use crate::mode::Mode;
use crate::registers::RegisterFile;

/// Hardware breakpoint granularity, matching the two ARM instruction widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointSize {
    Arm = 4,
    Thumb = 2,
}

/// A target-RAM allocation the caller made around a [`crate::algorithm::run`]
/// call. Ownership (alloc/free) stays with the caller; the runner only ever
/// reads the address out of it.
#[derive(Debug, Clone, Copy)]
pub struct WorkingArea {
    pub address: u32,
    pub size: u32,
}

/// An installed hard breakpoint, returned so it can be uninstalled again.
/// Opaque to this crate; the back-end decides what it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointHandle(pub u32);

/// The capability set a specific ARM core variant (ARM7TDMI, ARM920T, ...)
/// must provide. This is the polymorphism boundary the design notes call out:
/// `read_core_reg`/`write_core_reg` are the mandatory single-register path,
/// `full_context` is an optional batch optimization that defaults to a loop
/// over `read_core_reg` when the back-end doesn't override it.
pub trait CoreBackend {
    /// Fetch one architectural register into `slot`; `cookie` is 0..16, `mode`
    /// may be `Any`.
    fn read_core_reg(&mut self, slot: usize, cookie: u8, mode: Mode) -> ArmResult<u32>;

    /// Push a 32-bit value to one architectural register.
    fn write_core_reg(&mut self, slot: usize, cookie: u8, mode: Mode, value: u32) -> ArmResult<()>;

    /// Whether the target is currently halted.
    fn is_halted(&self) -> bool;

    fn halt(&mut self) -> ArmResult<()>;

    /// Resume execution from `entry_point`.
    fn resume(&mut self, entry_point: u32) -> ArmResult<()>;

    /// Block until halted or `timeout_ms` elapses. Returns whether the target
    /// is halted when the call returns.
    fn wait_halted(&mut self, timeout_ms: u32) -> ArmResult<bool>;

    fn write_buffer(&mut self, address: u32, data: &[u8]) -> ArmResult<()>;
    fn read_buffer(&mut self, address: u32, len: usize) -> ArmResult<Vec<u8>>;

    fn write_u32(&mut self, address: u32, value: u32) -> ArmResult<()> {
        self.write_buffer(address, &value.to_le_bytes())
    }

    fn read_u32(&mut self, address: u32) -> ArmResult<u32> {
        let bytes = self.read_buffer(address, 4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn breakpoint_add(&mut self, address: u32, size: BreakpointSize) -> ArmResult<BreakpointHandle>;
    fn breakpoint_remove(&mut self, handle: BreakpointHandle) -> ArmResult<()>;

    fn alloc_working_area(&mut self, size: u32) -> ArmResult<WorkingArea>;
    fn free_working_area(&mut self, area: WorkingArea) -> ArmResult<()>;

    /// Optional batch fetch of every slot, writing straight into `regs`.
    /// Returning `None` tells the caller to fall back to looping
    /// `read_core_reg` over every invalid slot (the default when the core
    /// variant supplies no optimized path).
    fn full_context(&mut self, _regs: &mut RegisterFile) -> Option<ArmResult<()>> {
        None
    }
}
