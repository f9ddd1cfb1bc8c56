// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the flash program/erase driver.

mod common;

use common::{FlashOp, SimFlash, TEST_MAP};
use sdboot_common::flash::{FlashDriver, FlashFault, MediumFault};
use sdboot_common::layout::FlashRegion;

fn driver() -> FlashDriver<SimFlash> {
    FlashDriver::new(SimFlash::for_map(&TEST_MAP), TEST_MAP.application).unwrap()
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_new_rejects_unaligned_region() {
    let region = FlashRegion::new(0x1010, 1024, 8);
    let result = FlashDriver::new(SimFlash::for_map(&TEST_MAP), region);
    assert!(matches!(result, Err(FlashFault::OutOfRange)));
}

#[test]
fn test_new_rejects_region_past_capacity() {
    let region = FlashRegion::new(0x3F00, 0x200, 8);
    let result = FlashDriver::new(SimFlash::for_map(&TEST_MAP), region);
    assert!(matches!(result, Err(FlashFault::OutOfRange)));
}

#[test]
fn test_new_rejects_bad_word_size() {
    for word in [0, 2, 12, 32] {
        let region = FlashRegion::new(0x1000, 1024, word);
        let result = FlashDriver::new(SimFlash::for_map(&TEST_MAP), region);
        assert!(matches!(result, Err(FlashFault::OutOfRange)), "word {word}");
    }
}

// =============================================================================
// Erase
// =============================================================================

#[test]
fn test_erase_blanks_region_only() {
    let mut flash = SimFlash::for_map(&TEST_MAP);
    flash.data.fill(0x00);
    let mut driver = FlashDriver::new(flash, TEST_MAP.application).unwrap();

    driver.erase().unwrap();
    assert!(driver.is_blank(0, 1024).unwrap());

    let flash = driver.release();
    assert!(flash.slice(0, 0x1000).iter().all(|&b| b == 0x00));
    assert!(flash.slice(0x1400, 0x100).iter().all(|&b| b == 0x00));
    assert_eq!(
        flash.ops,
        vec![
            FlashOp::Unlock,
            FlashOp::Erase {
                from: 0x1000,
                to: 0x1400
            },
            FlashOp::Lock,
        ]
    );
}

#[test]
fn test_erase_reports_incomplete_erase() {
    let mut flash = SimFlash::for_map(&TEST_MAP);
    flash.erase_residue_at = Some(0x1234);
    let mut driver = FlashDriver::new(flash, TEST_MAP.application).unwrap();

    assert_eq!(driver.erase(), Err(FlashFault::EraseIncomplete));
    assert!(!driver.is_unlocked());
}

// =============================================================================
// Program
// =============================================================================

#[test]
fn test_program_after_erase_reads_back() {
    let mut driver = driver();
    driver.erase().unwrap();

    let word = [1, 2, 3, 4, 5, 6, 7, 8];
    {
        let mut session = driver.session().unwrap();
        session.program_word(0x10, &word).unwrap();
    }

    let mut readback = [0u8; 8];
    driver.read_at(0x10, &mut readback).unwrap();
    assert_eq!(readback, word);
}

#[test]
fn test_program_same_word_twice_is_refused() {
    let mut driver = driver();
    driver.erase().unwrap();
    let mut session = driver.session().unwrap();

    session.program_word(0, &[0xAA; 8]).unwrap();
    assert_eq!(session.program_word(0, &[0x55; 8]), Err(FlashFault::NotErased));
}

#[test]
fn test_program_rejects_misaligned_and_out_of_region() {
    let mut driver = driver();
    driver.erase().unwrap();
    let mut session = driver.session().unwrap();

    assert_eq!(session.program_word(4, &[0; 8]), Err(FlashFault::OutOfRange));
    assert_eq!(session.program_word(1024, &[0; 8]), Err(FlashFault::OutOfRange));
    assert_eq!(session.program_word(0, &[0; 4]), Err(FlashFault::OutOfRange));
}

#[test]
fn test_program_detects_corrupted_word() {
    let mut flash = SimFlash::for_map(&TEST_MAP);
    flash.corrupt_writes_at.insert(0x1008);
    let mut driver = FlashDriver::new(flash, TEST_MAP.application).unwrap();
    driver.erase().unwrap();

    let mut session = driver.session().unwrap();
    session.program_word(0, &[0x00; 8]).unwrap();
    assert_eq!(
        session.program_word(8, &[0x00; 8]),
        Err(FlashFault::VerifyMismatch)
    );
}

#[test]
fn test_program_reports_medium_fault() {
    let mut flash = SimFlash::for_map(&TEST_MAP);
    flash.fail_writes_at.insert(0x1000);
    let mut driver = FlashDriver::new(flash, TEST_MAP.application).unwrap();
    driver.erase().unwrap();

    let mut session = driver.session().unwrap();
    assert_eq!(
        session.program_word(0, &[0x12; 8]),
        Err(FlashFault::Medium(MediumFault::Other))
    );
}

// =============================================================================
// Session
// =============================================================================

#[test]
fn test_session_locks_on_drop() {
    let mut driver = driver();
    driver.erase().unwrap();
    {
        let _session = driver.session().unwrap();
    }
    assert!(!driver.is_unlocked());

    let flash = driver.release();
    assert!(!flash.unlocked);
    assert_eq!(flash.ops.last(), Some(&FlashOp::Lock));
    assert_eq!(flash.locked_writes, 0);
}

#[test]
fn test_session_locks_after_failed_word() {
    let mut flash = SimFlash::for_map(&TEST_MAP);
    flash.fail_writes_at.insert(0x1000);
    let mut driver = FlashDriver::new(flash, TEST_MAP.application).unwrap();
    driver.erase().unwrap();

    let result = (|| {
        let mut session = driver.session()?;
        session.program_word(0, &[0; 8])
    })();
    assert!(result.is_err());
    assert!(!driver.release().unlocked);
}

#[test]
fn test_session_erase_stays_writable() {
    let mut driver = driver();
    driver.erase().unwrap();
    let mut session = driver.session().unwrap();

    session.program_word(0, &[0x00; 8]).unwrap();
    session.erase().unwrap();
    session.program_word(0, &[0x11; 8]).unwrap();
}

#[test]
fn test_session_erase_failure_stays_writable() {
    let mut flash = SimFlash::for_map(&TEST_MAP);
    flash.erase_residue_at = Some(0x1100);
    let mut driver = FlashDriver::new(flash, TEST_MAP.application).unwrap();
    {
        let mut session = driver.session().unwrap();
        assert_eq!(session.erase(), Err(FlashFault::EraseIncomplete));
        session.program_word(0, &[0x22; 8]).unwrap();
    }
    assert!(!driver.is_unlocked());

    let flash = driver.release();
    assert_eq!(flash.locked_writes, 0);
    assert_eq!(flash.slice(0x1000, 8), &[0x22; 8]);
    assert_eq!(flash.ops.last(), Some(&FlashOp::Lock));
}

#[test]
fn test_read_at_is_bounded_by_region() {
    let mut driver = driver();
    let mut buf = [0u8; 16];
    assert!(driver.read_at(1008, &mut buf).is_ok());
    assert_eq!(driver.read_at(1012, &mut buf), Err(FlashFault::OutOfRange));
}
