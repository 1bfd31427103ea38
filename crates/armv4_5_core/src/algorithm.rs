//! The target-algorithm runner (C6): upload short machine-code snippets,
//! marshal arguments through registers and memory, run to an exit
//! breakpoint, and restore the architectural context the call disturbed.
use crate::backend::{BreakpointSize, CoreBackend};
use crate::core_state::Arm;
use crate::error::{ArmError, ArmResult};
use crate::mode::{self, InstructionSet, Mode};
use crate::registers::{CPSR_SLOT, LOGICAL_REGS, PC_SLOT};

/// Direction of a parameter relative to the target, matching the source's
/// `PARAM_*` vocabulary: `Out` flows out to the target only (the caller
/// supplies it, it is never read back); `In` is read back after the call;
/// `InOut` is written before and read back after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    Out,
    In,
    InOut,
}

impl ParamDirection {
    fn reads_back(self) -> bool {
        self != ParamDirection::Out
    }
}

#[derive(Debug, Clone)]
pub struct MemParam {
    pub address: u32,
    pub value: Vec<u8>,
    pub direction: ParamDirection,
}

#[derive(Debug, Clone)]
pub struct RegParam {
    pub name: String,
    pub size_bits: u32,
    pub value: u32,
    pub direction: ParamDirection,
}

/// What mode and instruction-set state to run the algorithm under.
#[derive(Debug, Clone, Copy)]
pub struct RunInfo {
    pub core_mode: Mode,
    pub core_state: InstructionSet,
}

/// Timeout budget for the example algorithms in [`crate::algorithms`]: a
/// flat ceiling for the blank-check loop, and a per-megabyte allowance for
/// the byte-at-a-time CRC loop that scales with the transfer size.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct RunnerLimits {
    pub blank_check_timeout_ms: u32,
    pub crc_timeout_ms_per_mb: u32,
}

impl Default for RunnerLimits {
    fn default() -> Self {
        RunnerLimits {
            blank_check_timeout_ms: 10_000,
            crc_timeout_ms_per_mb: 20_000,
        }
    }
}

impl RunnerLimits {
    pub fn crc_timeout_ms(&self, count: u32) -> u32 {
        self.crc_timeout_ms_per_mb * (1 + count / (1024 * 1024))
    }
}

/// Where to terminate. `Breakpoint(addr)` installs a hard breakpoint at
/// `addr` and works on any ARMv4/5 core. `SelfTerminating` relies on a
/// software `BKPT` baked into the algorithm itself and requires ARMv5+.
#[derive(Debug, Clone, Copy)]
pub enum ExitPoint {
    Breakpoint(u32),
    SelfTerminating,
}

fn breakpoint_size(state: InstructionSet) -> ArmResult<BreakpointSize> {
    match state {
        InstructionSet::Arm => Ok(BreakpointSize::Arm),
        InstructionSet::Thumb => Ok(BreakpointSize::Thumb),
        _ => Err(ArmError::invalid_arguments(
            "can't execute algorithms when not in ARM or Thumb state",
        )),
    }
}

/// Snapshot of the 17 logical registers under one mode, plus the CPSR, taken
/// before an algorithm call so it can be restored afterward.
struct Context {
    logical: [u32; LOGICAL_REGS],
    cpsr: u32,
    core_mode: Mode,
    core_state: InstructionSet,
}

fn save_context(arm: &mut Arm, backend: &mut dyn CoreBackend, mode: Mode) -> ArmResult<Context> {
    let mut logical = [0u32; LOGICAL_REGS];
    for (i, slot_value) in logical.iter_mut().enumerate() {
        let slot = arm.view(mode, i)?;
        if !arm.regs.slot(slot)?.valid {
            arm.get(backend, slot)?;
        }
        *slot_value = arm.regs.slot(slot)?.value;
    }

    if !arm.regs.cpsr().valid {
        arm.get(backend, CPSR_SLOT)?;
    }

    Ok(Context {
        logical,
        cpsr: arm.regs.cpsr().value,
        core_mode: arm.core_mode(),
        core_state: arm.core_state(),
    })
}

fn restore_context(arm: &mut Arm, ctx: &Context, mode: Mode) -> ArmResult<()> {
    for (i, &saved) in ctx.logical.iter().enumerate() {
        let slot = arm.view(mode, i)?;
        if arm.regs.slot(slot)?.value != saved {
            log::debug!("restoring register '{}' with value {saved:#010x}", arm.regs.slot(slot)?.name);
            let s = arm.regs.slot_mut(slot)?;
            s.value = saved;
            s.valid = true;
            s.dirty = true;
        }
    }

    let cpsr = arm.regs.cpsr_mut();
    cpsr.value = ctx.cpsr;
    cpsr.valid = true;
    cpsr.dirty = true;

    arm.set_core_state_unchecked(ctx.core_state);
    arm.set_core_mode_unchecked(ctx.core_mode);
    Ok(())
}

fn marshal_in(arm: &mut Arm, backend: &mut dyn CoreBackend, mem_params: &[MemParam], reg_params: &[RegParam]) -> ArmResult<()> {
    for p in mem_params {
        backend.write_buffer(p.address, &p.value)?;
    }

    for p in reg_params {
        let slot = arm
            .regs
            .find_by_name(&p.name)
            .ok_or_else(|| ArmError::invalid_arguments(format!("register '{}' not found", p.name)))?;
        if arm.regs.slot(slot)?.size_bits != p.size_bits {
            return Err(ArmError::invalid_arguments(format!(
                "register '{}' size doesn't match reg_params size",
                p.name
            )));
        }
        arm.set(backend, slot, p.value)?;
    }
    Ok(())
}

/// Best-effort marshal-out: argument errors on one parameter don't stop the
/// rest from being drained, matching §4.6/§7.
fn marshal_out(
    arm: &mut Arm,
    backend: &mut dyn CoreBackend,
    mem_params: &mut [MemParam],
    reg_params: &mut [RegParam],
) -> Option<ArmError> {
    let mut first_error = None;

    for p in mem_params.iter_mut() {
        if !p.direction.reads_back() {
            continue;
        }
        match backend.read_buffer(p.address, p.value.len()) {
            Ok(bytes) => p.value = bytes,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        };
    }

    for p in reg_params.iter_mut() {
        if !p.direction.reads_back() {
            continue;
        }
        let slot = match arm.regs.find_by_name(&p.name) {
            Some(s) => s,
            None => {
                first_error.get_or_insert(ArmError::invalid_arguments(format!("register '{}' not found", p.name)));
                continue;
            }
        };
        let matches_size = arm.regs.slot(slot).map(|s| s.size_bits == p.size_bits).unwrap_or(false);
        if !matches_size {
            first_error.get_or_insert(ArmError::invalid_arguments(format!(
                "register '{}' size doesn't match reg_params size",
                p.name
            )));
            continue;
        }
        // Live read: the value the algorithm left in this register only exists
        // on the target, the host-side cache still holds what was marshaled in.
        match arm.get(backend, slot) {
            Ok(value) => p.value = value,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    first_error
}

/// Run `entry..exit` on the target, marshalling `mem_params`/`reg_params` in
/// and back out, restoring every disturbed architectural register on the way
/// back regardless of success or failure after entry.
pub fn run(
    arm: &mut Arm,
    backend: &mut dyn CoreBackend,
    mem_params: &mut [MemParam],
    reg_params: &mut [RegParam],
    entry: u32,
    exit: ExitPoint,
    timeout_ms: u32,
    info: RunInfo,
) -> ArmResult<()> {
    log::debug!("running algorithm");

    if !backend.is_halted() {
        log::warn!("target not halted");
        return Err(ArmError::NotHalted);
    }

    if matches!(exit, ExitPoint::SelfTerminating) && arm.is_armv4() {
        log::error!("ARMv4 target needs HW breakpoint location");
        return Err(ArmError::TargetFailure("ARMv4 target needs HW breakpoint location".into()));
    }

    let ctx = save_context(arm, backend, info.core_mode)?;

    marshal_in(arm, backend, mem_params, reg_params)?;

    arm.set_core_state_unchecked(info.core_state);
    let exit_bp_size = breakpoint_size(info.core_state)?;

    if !matches!(info.core_mode, Mode::Any) {
        log::debug!("setting core_mode: {:#04x}", mode::psr_for_mode(info.core_mode).unwrap_or(0));
        let mode_bits = mode::psr_for_mode(info.core_mode)
            .ok_or_else(|| ArmError::internal("info.core_mode has no PSR encoding"))? as u32;
        let cpsr = arm.regs.cpsr_mut();
        cpsr.value = (cpsr.value & !0x1f) | mode_bits;
        cpsr.dirty = true;
        cpsr.valid = true;
    }

    let installed_bp = match exit {
        ExitPoint::Breakpoint(addr) => {
            let handle = backend.breakpoint_add(addr, exit_bp_size).map_err(|e| {
                log::error!("can't add HW breakpoint to terminate algorithm");
                e
            })?;
            Some((addr, handle))
        }
        ExitPoint::SelfTerminating => None,
    };

    let remove_bp = |backend: &mut dyn CoreBackend| {
        if let Some((_, handle)) = installed_bp {
            let _ = backend.breakpoint_remove(handle);
        }
    };

    arm.flush_all_dirty(backend)?;

    if let Err(e) = backend.resume(entry) {
        remove_bp(backend);
        return Err(e);
    }

    let run_result = wait_for_completion(arm, backend, installed_bp.map(|(addr, _)| addr), timeout_ms);
    remove_bp(backend);

    if let Err(e) = run_result {
        return Err(e);
    }

    // Halt entry on these cores re-reads the general register set, so the
    // snapshotted 17 logical registers (the same 0..=16 the source re-reads
    // into `context[]` before comparing) can't be trusted from the pre-run
    // cache anymore. Invalidate and refetch them before marshal-out and the
    // restore diff look at them.
    for i in 0..LOGICAL_REGS {
        let slot = arm.view(info.core_mode, i)?;
        arm.invalidate(slot)?;
    }
    arm.full_context(backend)?;

    let marshal_err = marshal_out(arm, backend, mem_params, reg_params);

    restore_context(arm, &ctx, info.core_mode)?;

    match marshal_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn wait_for_completion(
    arm: &mut Arm,
    backend: &mut dyn CoreBackend,
    exit_point: Option<u32>,
    timeout_ms: u32,
) -> ArmResult<()> {
    let halted = backend.wait_halted(timeout_ms)?;
    if !halted {
        backend.halt()?;
        let _ = backend.wait_halted(500)?;
        return Err(ArmError::TargetTimeout);
    }

    if let Some(exit_addr) = exit_point {
        arm.invalidate(PC_SLOT)?;
        let pc = arm.get(backend, PC_SLOT)?;
        if pc != exit_addr {
            log::warn!("target reentered debug state, but not at the desired exit point: {pc:#010x}");
            return Err(ArmError::TargetTimeout);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_state::CoreConfig;
    use crate::test_support::MockTarget;

    /// Invariant 8: every snapshotted logical slot comes back to its pre-call
    /// value, including one the algorithm clobbered as scratch space and
    /// never declared as a `RegParam` output.
    #[test]
    fn run_restores_a_gpr_the_algorithm_clobbered_but_never_declared_as_output() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();

        let r4 = arm.view(Mode::Svc, 4).unwrap();
        arm.set(&mut target, r4, 0x1111_1111).unwrap();
        arm.flush_all_dirty(&mut target).unwrap();

        target.clobber_register_on_halt(r4, 0xdead_beef);

        run(
            &mut arm,
            &mut target,
            &mut [],
            &mut [],
            0x1000,
            ExitPoint::Breakpoint(0x1004),
            1000,
            RunInfo {
                core_mode: Mode::Svc,
                core_state: InstructionSet::Arm,
            },
        )
        .unwrap();

        assert_eq!(arm.regs.slot(r4).unwrap().value, 0x1111_1111);
    }

    #[test]
    fn run_rejects_unhalted_target_without_touching_saved_context() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::running();

        let err = run(
            &mut arm,
            &mut target,
            &mut [],
            &mut [],
            0x1000,
            ExitPoint::Breakpoint(0x1004),
            1000,
            RunInfo {
                core_mode: Mode::Svc,
                core_state: InstructionSet::Arm,
            },
        )
        .unwrap_err();

        assert!(matches!(err, ArmError::NotHalted));
    }

    #[test]
    fn run_marshals_a_reg_param_result_back_after_execution() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();

        let r0 = arm.view(Mode::Svc, 0).unwrap();
        target.clobber_register_on_halt(r0, 0x4242_4242);

        let mut reg_params = [RegParam {
            name: "r0".to_string(),
            size_bits: 32,
            value: 0,
            direction: ParamDirection::In,
        }];

        run(
            &mut arm,
            &mut target,
            &mut [],
            &mut reg_params,
            0x1000,
            ExitPoint::Breakpoint(0x1004),
            1000,
            RunInfo {
                core_mode: Mode::Svc,
                core_state: InstructionSet::Arm,
            },
        )
        .unwrap();

        assert_eq!(reg_params[0].value, 0x4242_4242);
    }
}
