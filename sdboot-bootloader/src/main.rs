// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! sdboot: RP2040 bootloader that updates the application from an SD card.

#![no_std]
#![no_main]

mod board;
mod boot;
mod flash;
mod peripherals;
mod sdcard;

use defmt_rtt as _;
use embedded_hal::delay::DelayNs;
use panic_probe as _;

use sdboot_common::{
    BootConfig, BootOutcome, BootSequencer, ChecksumPolicy, FlashFaultPolicy, RP2040_MAP,
};

use crate::board::Board;
use crate::sdcard::SdStorage;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

const CONFIG: BootConfig = BootConfig::new(RP2040_MAP)
    .with_checksum_policy(if cfg!(feature = "strict-checksum") {
        ChecksumPolicy::Halt
    } else {
        ChecksumPolicy::Warn
    })
    .with_fault_policy(if cfg!(feature = "abort-on-flash-fault") {
        FlashFaultPolicy::AbortAndErase
    } else {
        FlashFaultPolicy::BestEffort
    })
    .with_update_on_missing_application(cfg!(feature = "update-on-missing-app"));

/// Time for the button level to settle after power-up.
const BUTTON_SETTLE_MS: u32 = 1000;
/// Progress LED stays on this long before the jump.
const JUMP_INDICATOR_MS: u32 = 1000;
const HALT_BLINK_MS: u32 = 500;

#[entry]
fn main() -> ! {
    defmt::println!("Bootloader init");

    // Read before anything else can reuse the RAM
    let update_requested = boot::take_update_request();

    let p = peripherals::init();
    let mut timer = p.timer;
    timer.delay_ms(BUTTON_SETTLE_MS);

    let board = Board::new(
        p.button,
        p.fault_led,
        p.progress_led,
        p.idle_led,
        update_requested,
    );
    let storage = SdStorage::new(p.sd_spi, p.timer, p.peripheral_freq);

    let mut sequencer = defmt::unwrap!(BootSequencer::new(CONFIG, p.flash, storage, board));
    let outcome = sequencer.run();
    defmt::println!("Boot trace: {}", sequencer.trace());

    let (_flash, _storage, mut board) = sequencer.into_parts();

    match outcome {
        BootOutcome::Jump(app) => {
            defmt::println!(
                "Jumping to application at 0x{:08x} (entry 0x{:08x})",
                app.vector_table,
                app.entry
            );
            timer.delay_ms(JUMP_INDICATOR_MS);
            board.all_off();
            unsafe { boot::jump_to_application(&app) }
        }
        BootOutcome::Halt(reason) => {
            defmt::println!("Halted: {}", reason);
            board.halt(&mut timer, HALT_BLINK_MS)
        }
    }
}
