//! Static description of ARM operating modes: PSR encodings, display names,
//! and the physical-register slots each mode shadows. Pure lookups only; no
//! target state lives here.
use crate::error::{ArmError, ArmResult};

/// An ARM processor operating mode, plus the `Any` sentinel meaning "use the
/// current mode" wherever a mode parameter is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Usr,
    Fiq,
    Irq,
    Svc,
    Abt,
    Und,
    Sys,
    Mon,
    /// Caller does not care / use whatever the core's current mode is.
    Any,
}

/// Only the first two are producible by the CPSR write-through logic; Jazelle
/// and ThumbEE are representable but set externally (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionSet {
    Arm,
    Thumb,
    Jazelle,
    ThumbEE,
}

impl InstructionSet {
    pub fn name(self) -> &'static str {
        match self {
            InstructionSet::Arm => "ARM",
            InstructionSet::Thumb => "Thumb",
            InstructionSet::Jazelle => "Jazelle",
            InstructionSet::ThumbEE => "ThumbEE",
        }
    }
}

struct ModeEntry {
    mode: Mode,
    name: &'static str,
    psr: u8,
    /// Physical slot indices that make up this mode's distinctive register
    /// set, in display order. USR/SYS list all 17 logical registers; banked
    /// modes list only the shadowed GPRs plus the mode's SPSR.
    indices: &'static [u8],
}

// Display/iteration order matches the source's `arm_mode_data` table exactly
// (leaves-first: the modes with the fewest shadowed registers are grouped
// together, System trails User since they share indices, Monitor is last
// since it's conditional on TrustZone).
const MODE_TABLE: &[ModeEntry] = &[
    ModeEntry {
        mode: Mode::Usr,
        name: "User",
        psr: 0x10,
        indices: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 31],
    },
    ModeEntry {
        mode: Mode::Fiq,
        name: "FIQ",
        psr: 0x11,
        indices: &[16, 17, 18, 19, 20, 21, 22, 32],
    },
    ModeEntry {
        mode: Mode::Svc,
        name: "Supervisor",
        psr: 0x13,
        indices: &[25, 26, 34],
    },
    ModeEntry {
        mode: Mode::Abt,
        name: "Abort",
        psr: 0x17,
        indices: &[27, 28, 35],
    },
    ModeEntry {
        mode: Mode::Irq,
        name: "IRQ",
        psr: 0x12,
        indices: &[23, 24, 33],
    },
    ModeEntry {
        mode: Mode::Und,
        name: "Undefined instruction",
        psr: 0x1B,
        indices: &[29, 30, 36],
    },
    ModeEntry {
        mode: Mode::Sys,
        name: "System",
        psr: 0x1F,
        indices: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 31],
    },
    ModeEntry {
        mode: Mode::Mon,
        name: "Secure Monitor",
        psr: 0x16,
        indices: &[37, 38, 39],
    },
];

fn entry_for_psr(psr_mode: u8) -> Option<&'static ModeEntry> {
    MODE_TABLE.iter().find(|e| e.psr == psr_mode)
}

fn entry_for_mode(mode: Mode) -> Option<&'static ModeEntry> {
    MODE_TABLE.iter().find(|e| e.mode == mode)
}

/// Map PSR mode bits to the name of an ARM processor operating mode.
pub fn mode_name(psr_mode: u8) -> &'static str {
    match entry_for_psr(psr_mode) {
        Some(entry) => entry.name,
        None => {
            log::error!("unrecognized psr mode: {psr_mode:#04x}");
            "UNRECOGNIZED"
        }
    }
}

/// Return true iff the parameter denotes a valid ARM processor mode.
pub fn is_valid_mode(psr_mode: u8) -> bool {
    entry_for_psr(psr_mode).is_some()
}

/// The distinctive physical-slot list for `mode`, in display order.
pub fn distinctive_slots(mode: Mode) -> ArmResult<&'static [u8]> {
    entry_for_mode(mode)
        .map(|e| e.indices)
        .ok_or_else(|| ArmError::internal(format!("no mode table entry for {mode:?}")))
}

/// The PSR encoding for a real mode (`None` for the `Any` sentinel).
pub fn psr_for_mode(mode: Mode) -> Option<u8> {
    entry_for_mode(mode).map(|e| e.psr)
}

/// Reverse of [`psr_for_mode`]: the real `Mode` a PSR mode field encodes.
pub fn mode_for_psr(psr_mode: u8) -> ArmResult<Mode> {
    entry_for_psr(psr_mode)
        .map(|e| e.mode)
        .ok_or_else(|| ArmError::TargetInvalid(format!("unrecognized psr mode: {psr_mode:#04x}")))
}

/// Display name for a mode, as used by the `reg` command's mode banner.
pub fn display_name(mode: Mode) -> &'static str {
    entry_for_mode(mode).map(|e| e.name).unwrap_or("UNRECOGNIZED")
}

/// Iterate the mode table in its display order, skipping nothing. Callers
/// that need the `reg` command's System/Monitor filtering apply it themselves.
pub fn modes_in_display_order() -> impl Iterator<Item = Mode> {
    MODE_TABLE.iter().map(|e| e.mode)
}

/// Map a mode to the dense `0..7` index used to enter the 8x17 register map.
/// `Any` maps to the same index as `Usr`, matching the source's explicit
/// fallthrough ("map MODE_ANY to user mode").
pub fn mode_to_number(mode: Mode) -> ArmResult<u8> {
    match mode {
        Mode::Any | Mode::Usr => Ok(0),
        Mode::Fiq => Ok(1),
        Mode::Irq => Ok(2),
        Mode::Svc => Ok(3),
        Mode::Abt => Ok(4),
        Mode::Und => Ok(5),
        Mode::Sys => Ok(6),
        Mode::Mon => Ok(7),
    }
}

/// Map the dense `0..7` index back to a real mode (never `Any`).
pub fn number_to_mode(number: u8) -> ArmResult<Mode> {
    match number {
        0 => Ok(Mode::Usr),
        1 => Ok(Mode::Fiq),
        2 => Ok(Mode::Irq),
        3 => Ok(Mode::Svc),
        4 => Ok(Mode::Abt),
        5 => Ok(Mode::Und),
        6 => Ok(Mode::Sys),
        7 => Ok(Mode::Mon),
        other => Err(ArmError::internal(format!("mode index out of bounds {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_name_lookup() {
        assert_eq!(mode_name(0x13), "Supervisor");
        assert_eq!(mode_name(0x15), "UNRECOGNIZED");
    }

    #[test]
    fn valid_mode_set() {
        let valid = [0x10, 0x11, 0x12, 0x13, 0x16, 0x17, 0x1B, 0x1F];
        for psr in 0x10..=0x1Fu8 {
            assert_eq!(is_valid_mode(psr), valid.contains(&psr), "psr={psr:#04x}");
        }
    }

    #[test]
    fn mode_round_trip() {
        for n in 0..8u8 {
            let mode = number_to_mode(n).unwrap();
            assert_eq!(mode_to_number(mode).unwrap(), n);
        }
    }

    #[test]
    fn any_maps_to_usr_number() {
        assert_eq!(mode_to_number(Mode::Any).unwrap(), mode_to_number(Mode::Usr).unwrap());
    }
}
