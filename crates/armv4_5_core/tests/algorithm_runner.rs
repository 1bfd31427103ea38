//! End-to-end exercise of the algorithm runner (C6) against the in-memory
//! `MockTarget`, covering the CRC32 example scenario and a forced timeout.
use armv4_5_core::algorithms::{blank_check_memory, checksum_memory, is_blank};
use armv4_5_core::backend::CoreBackend;
use armv4_5_core::core_state::{Arm, CoreConfig};
use armv4_5_core::error::ArmError;
use armv4_5_core::test_support::MockTarget;

#[test]
fn crc32_scenario_restores_context_after_running() {
    let mut arm = Arm::new(CoreConfig::default());
    let mut target = MockTarget::halted();

    target.write_buffer(0x8000, b"hello world").unwrap();
    target.recognize_crc32(0, 1, 0);

    let saved_mode = arm.core_mode();
    let saved_state = arm.core_state();

    let crc = checksum_memory(&mut arm, &mut target, 0x8000, 11).unwrap();
    assert_ne!(crc, 0);

    // The runner must restore the caller's mode/state once the call returns,
    // even though it ran under Svc/Arm internally.
    assert_eq!(arm.core_mode(), saved_mode);
    assert_eq!(arm.core_state(), saved_state);
}

#[test]
fn blank_check_scenario_reports_erased_flash() {
    let mut arm = Arm::new(CoreConfig::default());
    let mut target = MockTarget::halted();

    target.write_buffer(0x9000, &[0xff; 64]).unwrap();
    target.recognize_blank_check(0, 1, 2);

    let acc = blank_check_memory(&mut arm, &mut target, 0x9000, 64).unwrap();
    assert!(is_blank(acc));
}

#[test]
fn timed_out_run_surfaces_target_timeout_and_halts() {
    let mut arm = Arm::new(CoreConfig::default());
    let mut target = MockTarget::halted();

    target.write_buffer(0xa000, &[0; 16]).unwrap();
    target.recognize_crc32(0, 1, 0);
    target.force_timeout_once();

    let err = checksum_memory(&mut arm, &mut target, 0xa000, 16).unwrap_err();
    assert!(matches!(err, ArmError::TargetTimeout));
}

#[test]
fn run_against_unhalted_target_is_rejected_before_touching_registers() {
    let mut arm = Arm::new(CoreConfig::default());
    let mut target = MockTarget::running();

    let err = checksum_memory(&mut arm, &mut target, 0x8000, 4).unwrap_err();
    assert!(matches!(err, ArmError::NotHalted));
}
