//! The introspection surface (C7): `reg`, `core_state`, and `disassemble`,
//! the three commands a front-end hangs off an attached core. Each returns a
//! [`CommandStatus`] plus the human-readable lines a CLI would print, rather
//! than printing directly, so a GUI or test can consume the same calls.
use crate::backend::CoreBackend;
use crate::core_state::Arm;
use crate::decode::{DecodeMode, InstructionDecoder};
use crate::error::{ArmResult, CommandStatus};
use crate::mode::{self, Mode};

/// One line of the `reg` command's output: a mode banner followed by the
/// register values shadowed under it, already formatted the way the source's
/// `%8s: %8.8x` columns read.
#[derive(Debug, Clone)]
pub struct RegBank {
    pub banner: String,
    pub rows: Vec<String>,
}

/// Render the full `reg` dump: System/User merged, every banked mode, Monitor
/// only when the core exposes it. Lazily triggers `full_context` the first
/// time an invalid slot is seen, matching the source's "REVISIT be smarter
/// about faults" comment -- this is not smarter, just faithful to it.
pub fn reg(arm: &mut Arm, backend: &mut dyn CoreBackend) -> ArmResult<(CommandStatus, Vec<RegBank>)> {
    if !backend.is_halted() {
        log::warn!("target must be halted for register accesses");
        return Ok((CommandStatus::Fail, Vec::new()));
    }

    let mut banks = Vec::new();
    let mut context_fetched = false;

    for m in mode::modes_in_display_order() {
        if matches!(m, Mode::Sys) {
            continue;
        }
        if matches!(m, Mode::Mon) && !arm.regs.has_mon() {
            continue;
        }

        let banner = match m {
            Mode::Usr => "System and User mode registers".to_string(),
            other => format!("{} mode shadow registers", mode::display_name(other)),
        };

        let indices = mode::distinctive_slots(m)?;
        let mut rows = Vec::new();
        for chunk in indices.chunks(4) {
            let mut line = String::new();
            for &slot in chunk {
                let slot = slot as usize;
                if !arm.regs.slot(slot)?.valid && !context_fetched {
                    arm.full_context(backend)?;
                    context_fetched = true;
                }
                let s = arm.regs.slot(slot)?;
                line.push_str(&format!("{:>8}: {:08x} ", s.name, s.value));
            }
            rows.push(line.trim_end().to_string());
        }

        banks.push(RegBank { banner, rows });
    }

    Ok((CommandStatus::Ok, banks))
}

/// Get or set the cached instruction-set state without touching the CPSR --
/// a debugging escape hatch distinct from the CPSR write-through path.
pub fn core_state(arm: &mut Arm, requested: Option<mode::InstructionSet>) -> String {
    if let Some(state) = requested {
        arm.set_core_state_unchecked(state);
    }
    format!("core state: {}", arm.core_state().name())
}

/// Disassemble `count` instructions starting at `address`. `force_thumb`
/// mirrors the source's `address & 1` auto-detect: an odd address always
/// means Thumb, and the low bit is masked off before the first fetch.
pub fn disassemble(
    arm: &Arm,
    backend: &mut dyn CoreBackend,
    decoder: &dyn InstructionDecoder,
    address: u32,
    count: u32,
    force_thumb: bool,
) -> ArmResult<(CommandStatus, Vec<String>)> {
    let mut address = address;
    let mut thumb = force_thumb;
    if address & 1 != 0 {
        thumb = true;
        address &= !1;
    }

    let mode = if thumb {
        DecodeMode::Thumb
    } else {
        DecodeMode::from_state(arm.core_state())
    };

    let mut lines = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let decoded = if mode == DecodeMode::Thumb {
            let lo = backend.read_buffer(address, 2)?;
            let first = u16::from_le_bytes([lo[0], lo[1]]);
            // The decoder itself decides whether it needs the second halfword
            // for a 32-bit Thumb2 encoding; fetch it unconditionally, it's cheap.
            let hi = backend.read_buffer(address + 2, 2)?;
            let second = u16::from_le_bytes([hi[0], hi[1]]);
            decoder.decode_thumb(first, Some(second), address)
        } else {
            let opcode = backend.read_u32(address)?;
            decoder.decode_arm(opcode, address)
        };

        // Corrected double-evaluation bug: stop on the decoder's own error
        // instead of comparing a coerced boolean against ERROR_OK twice.
        let decoded = match decoded {
            Ok(d) => d,
            Err(e) => {
                log::error!("failed to disassemble opcode at {address:#010x}: {e}");
                return Ok((CommandStatus::Fail, lines));
            }
        };

        lines.push(decoded.text.clone());
        address += decoded.size_bytes;
    }

    Ok((CommandStatus::Ok, lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_state::CoreConfig;
    use crate::decode::DecodedInstruction;
    use crate::error::ArmError;
    use crate::test_support::MockTarget;

    struct StubDecoder;
    impl InstructionDecoder for StubDecoder {
        fn decode_arm(&self, opcode: u32, address: u32) -> ArmResult<DecodedInstruction> {
            Ok(DecodedInstruction {
                text: format!("{address:08x}\t{opcode:08x}\tSTUB"),
                size_bytes: 4,
            })
        }

        fn decode_thumb(&self, first: u16, _second: Option<u16>, address: u32) -> ArmResult<DecodedInstruction> {
            Ok(DecodedInstruction {
                text: format!("{address:08x}\t{first:04x}\tSTUB.T"),
                size_bytes: 2,
            })
        }
    }

    struct FailingDecoder;
    impl InstructionDecoder for FailingDecoder {
        fn decode_arm(&self, _opcode: u32, _address: u32) -> ArmResult<DecodedInstruction> {
            Err(ArmError::invalid_arguments("undefined instruction"))
        }

        fn decode_thumb(&self, _first: u16, _second: Option<u16>, _address: u32) -> ArmResult<DecodedInstruction> {
            Err(ArmError::invalid_arguments("undefined instruction"))
        }
    }

    #[test]
    fn reg_fails_fast_when_not_halted() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::running();
        let (status, banks) = reg(&mut arm, &mut target).unwrap();
        assert_eq!(status, CommandStatus::Fail);
        assert!(banks.is_empty());
    }

    #[test]
    fn reg_skips_system_and_fetches_context_once() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();
        let (status, banks) = reg(&mut arm, &mut target).unwrap();
        assert_eq!(status, CommandStatus::Ok);
        assert!(banks.iter().any(|b| b.banner == "System and User mode registers"));
        assert!(!banks.iter().any(|b| b.banner == "System mode shadow registers"));
    }

    #[test]
    fn reg_omits_monitor_without_trustzone() {
        let mut arm = Arm::new(CoreConfig {
            has_trustzone: false,
            is_armv4: false,
        });
        let mut target = MockTarget::halted();
        let (_, banks) = reg(&mut arm, &mut target).unwrap();
        assert!(!banks.iter().any(|b| b.banner.contains("Secure Monitor")));
    }

    #[test]
    fn odd_address_forces_thumb_and_masks_low_bit() {
        let arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();
        let (status, lines) = disassemble(&arm, &mut target, &StubDecoder, 0x1001, 2, false).unwrap();
        assert_eq!(status, CommandStatus::Ok);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00001000"));
        assert!(lines[1].starts_with("00001002"));
    }

    #[test]
    fn decode_failure_stops_without_double_evaluating() {
        let arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();
        let (status, lines) = disassemble(&arm, &mut target, &FailingDecoder, 0x1000, 3, false).unwrap();
        assert_eq!(status, CommandStatus::Fail);
        assert!(lines.is_empty());
    }

    #[test]
    fn core_state_set_then_get_round_trips() {
        let mut arm = Arm::new(CoreConfig::default());
        let msg = core_state(&mut arm, Some(crate::mode::InstructionSet::Thumb));
        assert!(msg.contains("Thumb"));
        assert_eq!(arm.core_state(), crate::mode::InstructionSet::Thumb);
    }
}
