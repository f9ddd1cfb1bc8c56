// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Update request flag, hardware teardown and the jump into the application.

use sdboot_common::detect::ApplicationHandle;
use sdboot_common::layout::{UPDATE_REQUEST_ADDR, UPDATE_REQUEST_MAGIC};

const RESETS_BASE: u32 = 0x4000_C000;
const RESETS_RESET: *mut u32 = RESETS_BASE as *mut u32;

const IO_BANK0_RESET_BIT: u32 = 1 << 5;
const PADS_BANK0_RESET_BIT: u32 = 1 << 8;
const SPI0_RESET_BIT: u32 = 1 << 16;
const TIMER_RESET_BIT: u32 = 1 << 21;

/// Consume the RAM update flag an application may leave before resetting.
pub fn take_update_request() -> bool {
    let ram_flag = unsafe { (UPDATE_REQUEST_ADDR as *const u32).read_volatile() };
    unsafe {
        (UPDATE_REQUEST_ADDR as *mut u32).write_volatile(0);
    }
    ram_flag == UPDATE_REQUEST_MAGIC
}

/// Hand control to the application. Never returns.
///
/// # Safety
/// `app` must come from the application detector: its vector table lies in
/// the application region and both words passed the plausibility checks.
/// Nothing the bootloader brought up may be used after this call.
pub unsafe fn jump_to_application(app: &ApplicationHandle) -> ! {
    prepare_for_application_handoff();
    relocate_vector_table(app.vector_table);
    jump_to_firmware(app.initial_sp, app.entry);
}

/// Put everything the bootloader touched back to its reset state, so the
/// application starts from the same state as after a cold boot.
unsafe fn prepare_for_application_handoff() {
    // Disable all interrupts
    cortex_m::interrupt::disable();

    // Stop SysTick
    const SYST_CSR: *mut u32 = 0xE000_E010 as *mut u32;
    SYST_CSR.write_volatile(0);

    // Disable all NVIC interrupts
    const NVIC_ICER: *mut u32 = 0xE000_E180 as *mut u32;
    NVIC_ICER.write_volatile(0xFFFF_FFFF);

    // Clear all pending interrupts in NVIC
    const NVIC_ICPR: *mut u32 = 0xE000_E280 as *mut u32;
    NVIC_ICPR.write_volatile(0xFFFF_FFFF);

    // SD card SPI, GPIO and timer back into reset
    let reset = RESETS_RESET.read_volatile();
    RESETS_RESET.write_volatile(
        reset | SPI0_RESET_BIT | IO_BANK0_RESET_BIT | PADS_BANK0_RESET_BIT | TIMER_RESET_BIT,
    );

    reset_clocks_to_power_on_state();
}

/// Reset clocks to power-on reset state:
/// - clk_sys runs from clk_ref
/// - clk_ref runs from ROSC
/// - XOSC disabled
/// - PLLs in reset
/// - Watchdog tick disabled
unsafe fn reset_clocks_to_power_on_state() {
    // RP2040 clock register base addresses
    const CLOCKS_BASE: u32 = 0x4000_8000;
    const CLK_REF_CTRL: *mut u32 = (CLOCKS_BASE + 0x30) as *mut u32;
    const CLK_REF_SELECTED: *const u32 = (CLOCKS_BASE + 0x38) as *const u32;
    const CLK_SYS_CTRL: *mut u32 = (CLOCKS_BASE + 0x3C) as *mut u32;
    const CLK_SYS_SELECTED: *const u32 = (CLOCKS_BASE + 0x44) as *const u32;

    const XOSC_BASE: u32 = 0x4002_4000;
    const XOSC_CTRL: *mut u32 = XOSC_BASE as *mut u32;

    const WATCHDOG_BASE: u32 = 0x4005_8000;
    const WATCHDOG_TICK: *mut u32 = (WATCHDOG_BASE + 0x2C) as *mut u32;

    const PLL_SYS_RESET_BIT: u32 = 1 << 12;
    const PLL_USB_RESET_BIT: u32 = 1 << 13;

    // Step 1: Switch clk_sys to clk_ref (SRC=0)
    let ctrl = CLK_SYS_CTRL.read_volatile();
    CLK_SYS_CTRL.write_volatile(ctrl & !0x1);
    while CLK_SYS_SELECTED.read_volatile() != 0x1 {
        core::hint::spin_loop();
    }

    // Step 2: Switch clk_ref to ROSC (SRC=0)
    let ctrl = CLK_REF_CTRL.read_volatile();
    CLK_REF_CTRL.write_volatile(ctrl & !0x3);
    while CLK_REF_SELECTED.read_volatile() != 0x1 {
        core::hint::spin_loop();
    }

    // Step 3: Disable XOSC
    const XOSC_CTRL_DISABLE: u32 = 0xD1E << 12;
    let ctrl = XOSC_CTRL.read_volatile();
    XOSC_CTRL.write_volatile((ctrl & !0x00FFF000) | XOSC_CTRL_DISABLE);

    // Step 4: Put PLLs into reset
    let reset = RESETS_RESET.read_volatile();
    RESETS_RESET.write_volatile(reset | PLL_SYS_RESET_BIT | PLL_USB_RESET_BIT);

    // Step 5: Disable watchdog tick
    WATCHDOG_TICK.write_volatile(0);

    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

unsafe fn relocate_vector_table(vector_table: u32) {
    const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;
    SCB_VTOR.write_volatile(vector_table);

    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

unsafe fn jump_to_firmware(initial_sp: u32, reset_vector: u32) -> ! {
    core::arch::asm!(
        "msr msp, {sp}",
        "cpsie i",  // Applications expect PRIMASK=0 as after reset
        "bx {reset}",
        sp = in(reg) initial_sp,
        reset = in(reg) reset_vector,
        options(noreturn)
    );
}
