//! The 40-slot physical register bank (C2) and the fixed mode -> logical
//! register map that projects it into each mode's 17-register logical view.
use crate::error::{ArmError, ArmResult};
use crate::mode::{mode_to_number, Mode};

/// Physical slot holding the CPSR.
pub const CPSR_SLOT: usize = 31;
/// Physical slot always holding the PC; PC is never banked.
pub const PC_SLOT: usize = 15;
/// Number of logical registers visible in any one mode (R0..R14, PC, CPSR/SPSR).
pub const LOGICAL_REGS: usize = 17;
/// Size of the physical bank with TrustZone (Secure Monitor) support.
pub const PHYSICAL_SLOTS_MON: usize = 40;
/// Size of the physical bank without TrustZone support.
pub const PHYSICAL_SLOTS: usize = 37;

/// One physical register: a 32-bit value plus the cache-coherency bits the
/// accessor (C3) maintains, and enough identity to display or look it up by
/// name. Deliberately carries no back-reference to its owning target -- the
/// accessor borrows both the register file and the back-end together, so the
/// slot/target relation is expressed through borrowing rather than a stored
/// pointer (see DESIGN.md).
#[derive(Debug, Clone, Copy)]
pub struct RegisterSlot {
    pub name: &'static str,
    pub size_bits: u32,
    /// 0..16: which of the uniform {cookie, mode} identifies this register to
    /// the back-end's `read_core_reg`/`write_core_reg`.
    pub cookie: u8,
    /// `Any` for slots shared across modes (R0..R12, PC); the owning mode for
    /// banked GPRs and SPSRs.
    pub mode: Mode,
    pub value: u32,
    pub valid: bool,
    pub dirty: bool,
}

impl RegisterSlot {
    const fn template(name: &'static str, cookie: u8, mode: Mode) -> Self {
        RegisterSlot {
            name,
            size_bits: 32,
            cookie,
            mode,
            value: 0,
            valid: false,
            dirty: false,
        }
    }
}

// Physical slot 0..39, in the exact order and naming the source's
// `arm_core_regs` table declares them (including its r13/r14 <-> sp/lr naming
// for the banked modes, preserved bit-for-bit rather than "fixed").
const TEMPLATE: [RegisterSlot; PHYSICAL_SLOTS_MON] = [
    RegisterSlot::template("r0", 0, Mode::Any),
    RegisterSlot::template("r1", 1, Mode::Any),
    RegisterSlot::template("r2", 2, Mode::Any),
    RegisterSlot::template("r3", 3, Mode::Any),
    RegisterSlot::template("r4", 4, Mode::Any),
    RegisterSlot::template("r5", 5, Mode::Any),
    RegisterSlot::template("r6", 6, Mode::Any),
    RegisterSlot::template("r7", 7, Mode::Any),
    RegisterSlot::template("r8", 8, Mode::Any),
    RegisterSlot::template("r9", 9, Mode::Any),
    RegisterSlot::template("r10", 10, Mode::Any),
    RegisterSlot::template("r11", 11, Mode::Any),
    RegisterSlot::template("r12", 12, Mode::Any),
    RegisterSlot::template("sp_usr", 13, Mode::Usr),
    RegisterSlot::template("lr_usr", 14, Mode::Usr),
    RegisterSlot::template("pc", 15, Mode::Any),
    RegisterSlot::template("r8_fiq", 8, Mode::Fiq),
    RegisterSlot::template("r9_fiq", 9, Mode::Fiq),
    RegisterSlot::template("r10_fiq", 10, Mode::Fiq),
    RegisterSlot::template("r11_fiq", 11, Mode::Fiq),
    RegisterSlot::template("r12_fiq", 12, Mode::Fiq),
    RegisterSlot::template("lr_fiq", 13, Mode::Fiq),
    RegisterSlot::template("sp_fiq", 14, Mode::Fiq),
    RegisterSlot::template("lr_irq", 13, Mode::Irq),
    RegisterSlot::template("sp_irq", 14, Mode::Irq),
    RegisterSlot::template("lr_svc", 13, Mode::Svc),
    RegisterSlot::template("sp_svc", 14, Mode::Svc),
    RegisterSlot::template("lr_abt", 13, Mode::Abt),
    RegisterSlot::template("sp_abt", 14, Mode::Abt),
    RegisterSlot::template("lr_und", 13, Mode::Und),
    RegisterSlot::template("sp_und", 14, Mode::Und),
    RegisterSlot::template("cpsr", 16, Mode::Any),
    RegisterSlot::template("spsr_fiq", 16, Mode::Fiq),
    RegisterSlot::template("spsr_irq", 16, Mode::Irq),
    RegisterSlot::template("spsr_svc", 16, Mode::Svc),
    RegisterSlot::template("spsr_abt", 16, Mode::Abt),
    RegisterSlot::template("spsr_und", 16, Mode::Und),
    RegisterSlot::template("lr_mon", 13, Mode::Mon),
    RegisterSlot::template("sp_mon", 14, Mode::Mon),
    RegisterSlot::template("spsr_mon", 16, Mode::Mon),
];

/// `MODE_MAP[mode_number][logical_reg] -> physical slot`. Row order follows
/// `mode_to_number`: Usr, Fiq, Irq, Svc, Abt, Und, Sys, Mon.
const MODE_MAP: [[u8; LOGICAL_REGS]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 31],
    [0, 1, 2, 3, 4, 5, 6, 7, 16, 17, 18, 19, 20, 21, 22, 15, 32],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 23, 24, 15, 33],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 25, 26, 15, 34],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 27, 28, 15, 35],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 29, 30, 15, 36],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 31],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 37, 38, 15, 39],
];

/// The 40-slot physical register bank, built once per target attachment.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    slots: [RegisterSlot; PHYSICAL_SLOTS_MON],
    has_mon: bool,
}

impl RegisterFile {
    /// Build the bank. `has_mon` should be `true` only when the core variant
    /// advertises TrustZone (`core_type == MON`); MON slots otherwise exist in
    /// memory but are never handed out by [`RegisterFile::view`] or counted by
    /// [`RegisterFile::num_regs`].
    pub fn new(has_mon: bool) -> Self {
        RegisterFile {
            slots: TEMPLATE,
            has_mon,
        }
    }

    pub fn has_mon(&self) -> bool {
        self.has_mon
    }

    /// Number of slots this core configuration actually exposes.
    pub fn num_regs(&self) -> usize {
        if self.has_mon {
            PHYSICAL_SLOTS_MON
        } else {
            PHYSICAL_SLOTS
        }
    }

    fn check_slot_available(&self, slot: usize) -> ArmResult<()> {
        if slot >= self.num_regs() {
            return Err(ArmError::internal(format!(
                "physical slot {slot} is not available on this core configuration"
            )));
        }
        Ok(())
    }

    pub fn slot(&self, slot: usize) -> ArmResult<&RegisterSlot> {
        self.check_slot_available(slot)?;
        Ok(&self.slots[slot])
    }

    pub fn slot_mut(&mut self, slot: usize) -> ArmResult<&mut RegisterSlot> {
        self.check_slot_available(slot)?;
        Ok(&mut self.slots[slot])
    }

    /// A stable reference to "the CPSR" -- slot 31, always present.
    pub fn cpsr(&self) -> &RegisterSlot {
        &self.slots[CPSR_SLOT]
    }

    pub fn cpsr_mut(&mut self) -> &mut RegisterSlot {
        &mut self.slots[CPSR_SLOT]
    }

    /// `view(mode, logical) -> physical slot`. `mode = Any` substitutes
    /// `current_mode`, which the caller (C4's responsibility to maintain)
    /// supplies explicitly rather than this type tracking it itself.
    pub fn view(&self, mode: Mode, logical: usize, current_mode: Mode) -> ArmResult<usize> {
        if logical >= LOGICAL_REGS {
            return Err(ArmError::internal(format!("logical register {logical} out of range")));
        }
        let effective_mode = match mode {
            Mode::Any => current_mode,
            other => other,
        };
        if matches!(effective_mode, Mode::Mon) && !self.has_mon {
            return Err(ArmError::TargetInvalid(
                "Secure Monitor mode is not available on this core".into(),
            ));
        }
        let number = mode_to_number(effective_mode)? as usize;
        let slot = MODE_MAP[number][logical] as usize;
        self.check_slot_available(slot)?;
        Ok(slot)
    }

    /// Look up a register by its exposed name (e.g. `"r0"`, `"sp_svc"`,
    /// `"cpsr"`), used by the algorithm runner's register-parameter marshalling.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.slots[..self.num_regs()]
            .iter()
            .position(|s| s.name == name)
    }

    /// Iterate physical slots not currently `valid`.
    pub fn invalid_slots(&self) -> impl Iterator<Item = usize> + '_ {
        let n = self.num_regs();
        (0..n).filter(move |&i| !self.slots[i].valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usr_and_sys_share_view() {
        let rf = RegisterFile::new(true);
        for logical in 0..LOGICAL_REGS {
            assert_eq!(
                rf.view(Mode::Usr, logical, Mode::Usr).unwrap(),
                rf.view(Mode::Sys, logical, Mode::Usr).unwrap()
            );
        }
    }

    #[test]
    fn pc_is_never_banked() {
        let rf = RegisterFile::new(true);
        for mode in [
            Mode::Usr,
            Mode::Fiq,
            Mode::Irq,
            Mode::Svc,
            Mode::Abt,
            Mode::Und,
            Mode::Sys,
            Mode::Mon,
        ] {
            assert_eq!(rf.view(mode, PC_SLOT, Mode::Usr).unwrap(), PC_SLOT);
        }
    }

    #[test]
    fn non_usr_sys_logical_16_is_spsr_not_cpsr() {
        let rf = RegisterFile::new(true);
        for mode in [Mode::Fiq, Mode::Irq, Mode::Svc, Mode::Abt, Mode::Und, Mode::Mon] {
            let slot = rf.view(mode, 16, Mode::Usr).unwrap();
            assert_ne!(slot, CPSR_SLOT);
        }
    }

    #[test]
    fn mon_unavailable_without_trustzone() {
        let rf = RegisterFile::new(false);
        assert!(rf.view(Mode::Mon, 0, Mode::Usr).is_err());
        assert_eq!(rf.num_regs(), PHYSICAL_SLOTS);
        assert!(rf.find_by_name("sp_mon").is_none());
    }

    #[test]
    fn any_mode_uses_current_mode() {
        let rf = RegisterFile::new(true);
        assert_eq!(
            rf.view(Mode::Any, 13, Mode::Svc).unwrap(),
            rf.view(Mode::Svc, 13, Mode::Svc).unwrap()
        );
    }

    #[test]
    fn find_by_name_resolves_banked_registers() {
        let rf = RegisterFile::new(true);
        assert_eq!(rf.find_by_name("r0"), Some(0));
        assert_eq!(rf.find_by_name("sp_svc"), Some(26));
        assert_eq!(rf.find_by_name("cpsr"), Some(CPSR_SLOT));
        assert_eq!(rf.find_by_name("spsr_mon"), Some(39));
        assert_eq!(rf.find_by_name("does_not_exist"), None);
    }
}
