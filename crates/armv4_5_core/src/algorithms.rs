//! The two example target algorithms: a CRC32 checksum and a blank-memory
//! (all-ones) check, both run through [`crate::algorithm::run`] under ARM
//! state, SVC mode, with a hardware breakpoint terminating the call.
use crate::algorithm::{self, ExitPoint, ParamDirection, RegParam, RunInfo, RunnerLimits};
use crate::backend::CoreBackend;
use crate::core_state::Arm;
use crate::error::ArmResult;
use crate::mode::Mode;

/// `mov r2, r0 / mov r0, #-1 / mov r3, r1 / mov r4, #0 / b ncomp / ...`
/// byte-for-byte IEEE CRC32 over `count` bytes starting at `r0`. The trailing
/// word is the polynomial constant the loop loads as data, not an instruction.
const CRC_CODE: [u32; 20] = [
    0xE1A02000, // mov   r2, r0
    0xE3E00000, // mov   r0, #0xffffffff
    0xE1A03001, // mov   r3, r1
    0xE3A04000, // mov   r4, #0
    0xEA00000B, // b     ncomp
    0xE7D21004, // ldrb  r1, [r2, r4]
    0xE59F7030, // ldr   r7, CRC32XOR
    0xE0200C01, // eor   r0, r0, r1, asl 24
    0xE3A05000, // mov   r5, #0
    0xE3500000, // cmp   r0, #0
    0xE1A06080, // mov   r6, r0, asl #1
    0xE2855001, // add   r5, r5, #1
    0xE1A00006, // mov   r0, r6
    0xB0260007, // eorlt r0, r6, r7
    0xE3550008, // cmp   r5, #8
    0x1AFFFFF8, // bne   loop
    0xE2844001, // add   r4, r4, #1
    0xE1540003, // cmp   r4, r3
    0x1AFFFFF1, // bne   nbyte
    0xEAFFFFFE, // b     end
];
const CRC_POLY_WORD: u32 = 0x04C1_1DB7;

const CHECK_CODE: [u32; 5] = [
    0xE4D0_3001, // ldrb r3, [r0], #1
    0xE002_2003, // and  r2, r2, r3
    0xE251_1001, // subs r1, r1, #1
    0x1AFF_FFFB, // bne  loop
    0xEAFF_FFFE, // b    end
];

fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn reg_u32(name: &str, direction: ParamDirection, value: u32) -> RegParam {
    RegParam {
        name: name.to_string(),
        size_bits: 32,
        value,
        direction,
    }
}

/// Upload [`CRC_CODE`] and run it over `count` bytes at `address`, returning
/// the IEEE CRC32. Timeout scales with transfer size, 20s per started
/// megabyte, matching the source's budget for a slow single-byte loop.
pub fn checksum_memory(arm: &mut Arm, backend: &mut dyn CoreBackend, address: u32, count: u32) -> ArmResult<u32> {
    let mut code = words_to_bytes(&CRC_CODE);
    code.extend_from_slice(&CRC_POLY_WORD.to_le_bytes());

    let area = backend.alloc_working_area(code.len() as u32)?;
    let result = (|| -> ArmResult<u32> {
        backend.write_buffer(area.address, &code)?;

        let mut reg_params = [
            reg_u32("r0", ParamDirection::InOut, address),
            reg_u32("r1", ParamDirection::Out, count),
        ];

        let timeout_ms = RunnerLimits::default().crc_timeout_ms(count);
        let exit = area.address + code.len() as u32 - 8;

        algorithm::run(
            arm,
            backend,
            &mut [],
            &mut reg_params,
            area.address,
            ExitPoint::Breakpoint(exit),
            timeout_ms,
            RunInfo {
                core_mode: Mode::Svc,
                core_state: crate::mode::InstructionSet::Arm,
            },
        )
        .map_err(|e| {
            log::error!("error executing ARM crc algorithm");
            e
        })?;

        Ok(reg_params[0].value)
    })();

    backend.free_working_area(area)?;
    result
}

/// Upload [`CHECK_CODE`] and AND together every byte of `count` bytes at
/// `address`, returning the accumulator -- `0xffffffff` (its low byte
/// `0xff`) iff the whole range is erased.
pub fn blank_check_memory(arm: &mut Arm, backend: &mut dyn CoreBackend, address: u32, count: u32) -> ArmResult<u32> {
    let code = words_to_bytes(&CHECK_CODE);

    let area = backend.alloc_working_area(code.len() as u32)?;
    let result = (|| -> ArmResult<u32> {
        backend.write_buffer(area.address, &code)?;

        let mut reg_params = [
            reg_u32("r0", ParamDirection::Out, address),
            reg_u32("r1", ParamDirection::Out, count),
            reg_u32("r2", ParamDirection::InOut, 0xff),
        ];

        let exit = area.address + code.len() as u32 - 4;

        algorithm::run(
            arm,
            backend,
            &mut [],
            &mut reg_params,
            area.address,
            ExitPoint::Breakpoint(exit),
            RunnerLimits::default().blank_check_timeout_ms,
            RunInfo {
                core_mode: Mode::Svc,
                core_state: crate::mode::InstructionSet::Arm,
            },
        )?;

        Ok(reg_params[2].value)
    })();

    backend.free_working_area(area)?;
    result
}

/// `blank_check_memory` returns the surviving AND-accumulator, not a bool.
/// Each loaded byte is zero-extended (`ldrb`) before the `and`, so the
/// accumulator never exceeds a single byte -- a fully-erased range leaves it
/// at `0xff`, not `0xffffffff`.
pub fn is_blank(acc: u32) -> bool {
    acc == 0xff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_state::CoreConfig;
    use crate::test_support::MockTarget;

    #[test]
    fn checksum_is_deterministic_and_sensitive_to_content() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();

        let data = b"123456789";
        target.write_buffer(0x1000, data).unwrap();
        target.recognize_crc32(0, 1, 0);

        let crc_a = checksum_memory(&mut arm, &mut target, 0x1000, data.len() as u32).unwrap();
        let crc_b = checksum_memory(&mut arm, &mut target, 0x1000, data.len() as u32).unwrap();
        assert_eq!(crc_a, crc_b);

        target.write_buffer(0x1000, b"123456780").unwrap();
        let crc_c = checksum_memory(&mut arm, &mut target, 0x1000, data.len() as u32).unwrap();
        assert_ne!(crc_a, crc_c);
    }

    #[test]
    fn blank_memory_is_recognized_as_all_ones() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();

        target.write_buffer(0x2000, &[0xff; 16]).unwrap();
        target.recognize_blank_check(0, 1, 2);

        let acc = blank_check_memory(&mut arm, &mut target, 0x2000, 16).unwrap();
        assert!(is_blank(acc));
    }

    #[test]
    fn non_blank_memory_clears_a_bit() {
        let mut arm = Arm::new(CoreConfig::default());
        let mut target = MockTarget::halted();

        let mut data = vec![0xff; 16];
        data[3] = 0xfe;
        target.write_buffer(0x3000, &data).unwrap();
        target.recognize_blank_check(0, 1, 2);

        let acc = blank_check_memory(&mut arm, &mut target, 0x3000, 16).unwrap();
        assert!(!is_blank(acc));
    }
}
