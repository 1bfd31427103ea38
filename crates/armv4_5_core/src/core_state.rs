//! The register accessor (C3) and CPSR write-through protocol (C4), unified
//! behind [`Arm`]: the one piece of mutable state a target attachment keeps
//! about "where the processor currently is" (mode, instruction-set state)
//! plus the register file those fields gate access to.
use crate::backend::CoreBackend;
use crate::error::{ArmError, ArmResult};
use crate::mode::{self, InstructionSet, Mode};
use crate::registers::{RegisterFile, CPSR_SLOT};

/// The two knobs the source takes from the calling core variant: whether it
/// advertises TrustZone (exposes Secure Monitor mode), and whether it's an
/// ARMv4 core that cannot terminate an algorithm with a software `BKPT`.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct CoreConfig {
    pub has_trustzone: bool,
    pub is_armv4: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            has_trustzone: false,
            is_armv4: false,
        }
    }
}

/// The mode-aware register file plus the cached "current mode / current
/// instruction-set state" that every higher layer (GDB stub, command
/// interpreter, algorithm runner) reads through.
#[derive(Debug, Clone)]
pub struct Arm {
    pub regs: RegisterFile,
    core_mode: Mode,
    core_state: InstructionSet,
    is_armv4: bool,
}

impl Arm {
    pub fn new(config: CoreConfig) -> Self {
        Arm {
            regs: RegisterFile::new(config.has_trustzone),
            core_mode: Mode::Usr,
            core_state: InstructionSet::Arm,
            is_armv4: config.is_armv4,
        }
    }

    pub fn core_mode(&self) -> Mode {
        self.core_mode
    }

    pub fn core_state(&self) -> InstructionSet {
        self.core_state
    }

    pub fn is_armv4(&self) -> bool {
        self.is_armv4
    }

    /// Debugging escape hatch used by the `core_state` command: set the
    /// cached instruction-set state directly, without touching the CPSR.
    pub fn set_core_state_unchecked(&mut self, state: InstructionSet) {
        self.core_state = state;
    }

    pub fn set_core_mode_unchecked(&mut self, mode: Mode) {
        self.core_mode = mode;
    }

    /// View a logical register under `mode` (substituting the current mode
    /// for `Any`), returning the physical slot index.
    pub fn view(&self, mode: Mode, logical: usize) -> ArmResult<usize> {
        self.regs.view(mode, logical, self.core_mode)
    }

    /// **get(slot)**: fails with `NotHalted` if the target is not halted.
    /// Otherwise delegates to the back-end and, on success, marks the slot
    /// `valid = true, dirty = false`.
    pub fn get(&mut self, backend: &mut dyn CoreBackend, slot: usize) -> ArmResult<u32> {
        if !backend.is_halted() {
            return Err(ArmError::NotHalted);
        }

        let (cookie, mode) = {
            let s = self.regs.slot(slot)?;
            (s.cookie, s.mode)
        };
        let value = backend.read_core_reg(slot, cookie, mode)?;

        let s = self.regs.slot_mut(slot)?;
        s.value = value;
        s.valid = true;
        s.dirty = false;
        Ok(value)
    }

    /// **set(slot, value)**: fails with `NotHalted` likewise. On success,
    /// writes the writeback cache and, for the CPSR slot, triggers the
    /// write-through protocol (C4).
    pub fn set(&mut self, backend: &mut dyn CoreBackend, slot: usize, value: u32) -> ArmResult<()> {
        if !backend.is_halted() {
            return Err(ArmError::NotHalted);
        }

        {
            let s = self.regs.slot_mut(slot)?;
            s.value = value;
            s.dirty = true;
            s.valid = true;
        }

        if slot == CPSR_SLOT {
            self.cpsr_write_through(backend, value)?;
        }

        Ok(())
    }

    /// C4: a write to CPSR inspects the T bit and the mode field. A mode
    /// change is pushed to the back-end immediately (so it's visible to the
    /// next `view(Any, ...)` and to algorithm marshalling); a same-mode write
    /// stays `dirty` for the ordinary writeback path to flush later. An
    /// unrecognized mode field never fails the write -- it still reaches the
    /// back-end, same as the source, which logs "UNRECOGNIZED" and stores the
    /// raw bits rather than rejecting them; our `core_mode` cache just has
    /// nowhere to put an unrecognized encoding, so it keeps its last known
    /// mode instead.
    fn cpsr_write_through(&mut self, backend: &mut dyn CoreBackend, value: u32) -> ArmResult<()> {
        let t_bit = value & 0x20 != 0;
        match (t_bit, self.core_state) {
            (true, InstructionSet::Arm) => {
                log::debug!("changing to Thumb state");
                self.core_state = InstructionSet::Thumb;
            }
            (false, InstructionSet::Thumb) => {
                log::debug!("changing to ARM state");
                self.core_state = InstructionSet::Arm;
            }
            // Jazelle/ThumbEE (the J bit) are a known, acknowledged gap.
            _ => {}
        }

        let new_mode_bits = (value & 0x1f) as u8;
        let cached_psr = mode::psr_for_mode(self.core_mode).unwrap_or(0xff);

        if new_mode_bits != cached_psr {
            log::debug!("changing ARM core mode to '{}'", mode::mode_name(new_mode_bits));
            if let Ok(new_mode) = mode::mode_for_psr(new_mode_bits) {
                self.core_mode = new_mode;
            }

            backend.write_core_reg(CPSR_SLOT, 16, Mode::Any, value)?;
            self.regs.cpsr_mut().dirty = false;
        }

        Ok(())
    }

    /// The normal writeback path: push a `dirty` slot's cached value to the
    /// back-end and clear `dirty`, preserving `valid` (§3 invariant: a
    /// write-back flushes `dirty` and preserves `valid`). A no-op for a slot
    /// that isn't dirty.
    pub fn flush(&mut self, backend: &mut dyn CoreBackend, slot: usize) -> ArmResult<()> {
        let (dirty, cookie, mode, value) = {
            let s = self.regs.slot(slot)?;
            (s.dirty, s.cookie, s.mode, s.value)
        };
        if !dirty {
            return Ok(());
        }
        backend.write_core_reg(slot, cookie, mode, value)?;
        self.regs.slot_mut(slot)?.dirty = false;
        Ok(())
    }

    /// Push every dirty slot to the back-end. The runner calls this right
    /// before resuming the target for an algorithm call -- this core has no
    /// background thread to do it lazily, so the flush has to happen at the
    /// one place a resume is about to occur.
    pub fn flush_all_dirty(&mut self, backend: &mut dyn CoreBackend) -> ArmResult<()> {
        for slot in 0..self.regs.num_regs() {
            self.flush(backend, slot)?;
        }
        Ok(())
    }

    /// Mark a slot as needing a re-fetch on next `get`/`full_context`.
    pub fn invalidate(&mut self, slot: usize) -> ArmResult<()> {
        self.regs.slot_mut(slot)?.valid = false;
        Ok(())
    }

    /// One-line state summary: instruction-set state, mode, cpsr, pc. Doesn't
    /// touch the target -- it reports the cached view, stale slots included.
    pub fn describe_state(&self) -> String {
        format!(
            "target halted in {} state due to debug-request, current mode: {}\ncpsr: {:#010x} pc: {:#010x}",
            self.core_state.name(),
            mode::display_name(self.core_mode),
            self.regs.cpsr().value,
            self.regs.slot(crate::registers::PC_SLOT).map(|s| s.value).unwrap_or(0),
        )
    }

    /// Bulk fetch of every slot not yet `valid`. Uses the back-end's
    /// optimized path if it has one; otherwise loops `get`, stopping on the
    /// first error.
    pub fn full_context(&mut self, backend: &mut dyn CoreBackend) -> ArmResult<()> {
        if let Some(result) = backend.full_context(&mut self.regs) {
            return result;
        }

        let pending: Vec<usize> = self.regs.invalid_slots().collect();
        for slot in pending {
            self.get(backend, slot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockTarget;

    #[test]
    fn set_then_get_round_trips_without_target_execution() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();

        arm.set(&mut target, 0, 0xdead_beef).unwrap();
        assert_eq!(arm.regs.slot(0).unwrap().value, 0xdead_beef);
        assert!(arm.regs.slot(0).unwrap().dirty);

        // A flush clears dirty while the value is preserved.
        arm.flush(&mut target, 0).unwrap();
        assert_eq!(arm.get(&mut target, 0).unwrap(), 0xdead_beef);
        assert!(!arm.regs.slot(0).unwrap().dirty);
    }

    #[test]
    fn cpsr_mode_write_switches_mode_and_flushes() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();

        arm.set(&mut target, CPSR_SLOT, 0x0000_0013).unwrap();
        assert_eq!(arm.core_mode(), Mode::Svc);
        assert!(!arm.regs.cpsr().dirty);
        assert_eq!(target.last_written_cpsr, Some(0x0000_0013));
    }

    #[test]
    fn cpsr_t_bit_switches_state_independent_of_mode() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();

        arm.set(&mut target, CPSR_SLOT, 0x0000_0030).unwrap();
        assert_eq!(arm.core_state(), InstructionSet::Thumb);
        assert_eq!(arm.core_mode(), Mode::Svc);

        arm.set(&mut target, CPSR_SLOT, 0x0000_0013).unwrap();
        assert_eq!(arm.core_state(), InstructionSet::Arm);
    }

    #[test]
    fn not_halted_is_rejected() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::running();

        assert!(matches!(arm.get(&mut target, 0), Err(ArmError::NotHalted)));
        assert!(matches!(arm.set(&mut target, 0, 1), Err(ArmError::NotHalted)));
    }

    #[test]
    fn cpsr_write_with_unrecognized_mode_field_still_completes() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();

        // 0x15 isn't one of the 8 recognized PSR mode encodings.
        let result = arm.set(&mut target, CPSR_SLOT, 0x0000_0015);
        assert!(result.is_ok());

        // The write reached the back-end and the cache is fully settled --
        // no partial mutation left over from a rejected mode field.
        assert_eq!(target.last_written_cpsr, Some(0x0000_0015));
        assert_eq!(arm.regs.cpsr().value, 0x0000_0015);
        assert!(!arm.regs.cpsr().dirty);
        assert_eq!(arm.core_mode(), Mode::Usr);
    }

    #[test]
    fn describe_state_reports_cached_mode_and_cpsr() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();
        arm.set(&mut target, CPSR_SLOT, 0x0000_0013).unwrap();

        let summary = arm.describe_state();
        assert!(summary.contains("ARM"));
        assert!(summary.contains("Supervisor"));
        assert!(summary.contains("cpsr: 0x00000013"));
    }
}
