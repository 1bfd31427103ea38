//! GDB view adapter (C5): the 26-entry register list GDB's `g`/`G` packets
//! expect, padding the eight obsolete FPA registers and the FPA status word
//! GDB's ARM target description still asks for.
use once_cell::sync::Lazy;

use crate::backend::CoreBackend;
use crate::core_state::Arm;
use crate::error::{ArmError, ArmResult};
use crate::mode::Mode;
use crate::registers::CPSR_SLOT;

pub const GDB_REG_COUNT: usize = 26;

/// A read-only, process-wide dummy register. GDB needs a value for it, but
/// nothing on the target backs it, so it's a zeroed singleton rather than a
/// per-attachment allocation.
pub struct DummyRegister {
    pub name: &'static str,
    pub size_bits: u32,
    pub value: &'static [u8],
}

static DUMMY_FPA_VALUE: [u8; 12] = [0; 12];
static DUMMY_FPA: Lazy<DummyRegister> = Lazy::new(|| DummyRegister {
    name: "GDB dummy FPA register",
    size_bits: 96,
    value: &DUMMY_FPA_VALUE,
});

static DUMMY_FPS_VALUE: [u8; 4] = [0; 4];
static DUMMY_FPS: Lazy<DummyRegister> = Lazy::new(|| DummyRegister {
    name: "GDB dummy FPA status register",
    size_bits: 32,
    value: &DUMMY_FPS_VALUE,
});

/// One entry of the GDB register list: either a live core register (fetched
/// through the ordinary accessor) or one of the shared dummies.
pub enum GdbRegister {
    Core { physical_slot: usize },
    Dummy(&'static DummyRegister),
}

/// Produce the ordered 26-entry list: 0..15 are `view(current_mode, 0..15)`,
/// 16..23 are the shared dummy FPA register, 24 is the dummy FPA status
/// register, 25 is the CPSR.
pub fn gdb_reg_list(arm: &Arm) -> ArmResult<Vec<GdbRegister>> {
    if matches!(arm.core_mode(), Mode::Any) || !crate::mode::is_valid_mode(
        crate::mode::psr_for_mode(arm.core_mode()).unwrap_or(0xff),
    ) {
        return Err(ArmError::TargetInvalid("current mode is not a valid ARM mode".into()));
    }

    let mut list = Vec::with_capacity(GDB_REG_COUNT);
    for logical in 0..16 {
        let slot = arm.view(arm.core_mode(), logical)?;
        list.push(GdbRegister::Core { physical_slot: slot });
    }
    for _ in 16..24 {
        list.push(GdbRegister::Dummy(&DUMMY_FPA));
    }
    list.push(GdbRegister::Dummy(&DUMMY_FPS));
    list.push(GdbRegister::Core { physical_slot: CPSR_SLOT });

    debug_assert_eq!(list.len(), GDB_REG_COUNT);
    Ok(list)
}

/// Resolve a [`GdbRegister`] to raw little-endian bytes, fetching from the
/// target if the underlying slot isn't `valid` yet.
pub fn gdb_reg_bytes(arm: &mut Arm, backend: &mut dyn CoreBackend, reg: &GdbRegister) -> ArmResult<Vec<u8>> {
    match reg {
        GdbRegister::Dummy(d) => Ok(d.value.to_vec()),
        GdbRegister::Core { physical_slot } => {
            let value = if arm.regs.slot(*physical_slot)?.valid {
                arm.regs.slot(*physical_slot)?.value
            } else {
                arm.get(backend, *physical_slot)?
            };
            Ok(value.to_le_bytes().to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_state::CoreConfig;

    #[test]
    fn list_has_26_entries_with_shared_dummy_and_trailing_cpsr() {
        let arm = Arm::new(CoreConfig::default());
        let list = gdb_reg_list(&arm).unwrap();
        assert_eq!(list.len(), GDB_REG_COUNT);

        let dummy_ptrs: Vec<*const DummyRegister> = list[16..24]
            .iter()
            .map(|r| match r {
                GdbRegister::Dummy(d) => *d as *const DummyRegister,
                _ => panic!("expected dummy"),
            })
            .collect();
        assert!(dummy_ptrs.windows(2).all(|w| w[0] == w[1]));

        match list[25] {
            GdbRegister::Core { physical_slot } => assert_eq!(physical_slot, CPSR_SLOT),
            _ => panic!("entry 25 should be the CPSR"),
        }
    }
}
