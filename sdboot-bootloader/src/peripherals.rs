// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Peripheral initialization for the bootloader.
//!
//! Pin map:
//!   GP2          update button (active low, pull-up)
//!   GP13         Fault LED
//!   GP14         Progress LED
//!   GP15         Idle LED
//!   GP16..GP19   SPI0 SD card (MISO, CS, SCK, MOSI)

use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use rp2040_hal as hal;
use rp2040_hal::fugit::{HertzU32, RateExtU32};
use rp2040_hal::gpio::{
    bank0, FunctionSioInput, FunctionSioOutput, FunctionSpi, Pin, PinState, PullDown, PullUp,
};
use rp2040_hal::Clock;

use crate::flash::{self, Rp2040Flash};

pub type FaultLed = Pin<bank0::Gpio13, FunctionSioOutput, PullDown>;
pub type ProgressLed = Pin<bank0::Gpio14, FunctionSioOutput, PullDown>;
pub type IdleLed = Pin<bank0::Gpio15, FunctionSioOutput, PullDown>;
pub type ButtonPin = Pin<bank0::Gpio2, FunctionSioInput, PullUp>;

type SdMosi = Pin<bank0::Gpio19, FunctionSpi, PullDown>;
type SdMiso = Pin<bank0::Gpio16, FunctionSpi, PullDown>;
type SdSck = Pin<bank0::Gpio18, FunctionSpi, PullDown>;
type SdCs = Pin<bank0::Gpio17, FunctionSioOutput, PullDown>;
type SdSpiBus = hal::spi::Spi<hal::spi::Enabled, hal::pac::SPI0, (SdMosi, SdMiso, SdSck), 8>;

/// SPI0 with the card's chip select, as an `embedded-hal` `SpiDevice`.
pub type SdSpi = ExclusiveDevice<SdSpiBus, SdCs, NoDelay>;

/// Card identification must run at 100-400 kHz.
const SD_INIT_BAUD_KHZ: u32 = 400;

pub struct Peripherals {
    pub button: ButtonPin,
    pub fault_led: FaultLed,
    pub progress_led: ProgressLed,
    pub idle_led: IdleLed,
    pub sd_spi: SdSpi,
    pub peripheral_freq: HertzU32,
    pub flash: Rp2040Flash,
    pub timer: hal::Timer,
}

pub fn init() -> Peripherals {
    let mut pac = hal::pac::Peripherals::take().unwrap();

    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let clocks = hal::clocks::init_clocks_and_plls(
        12_000_000u32,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let peripheral_freq = clocks.peripheral_clock.freq();
    let spi_bus = hal::spi::Spi::<_, _, _, 8>::new(
        pac.SPI0,
        (
            pins.gpio19.into_function::<FunctionSpi>(),
            pins.gpio16.into_function::<FunctionSpi>(),
            pins.gpio18.into_function::<FunctionSpi>(),
        ),
    )
    .init(
        &mut pac.RESETS,
        peripheral_freq,
        SD_INIT_BAUD_KHZ.kHz(),
        embedded_hal::spi::MODE_0,
    );
    let sd_cs = pins.gpio17.into_push_pull_output_in_state(PinState::High);
    let sd_spi = ExclusiveDevice::new_no_delay(spi_bus, sd_cs).unwrap();

    Peripherals {
        button: pins.gpio2.into_pull_up_input(),
        fault_led: pins.gpio13.into_push_pull_output(),
        progress_led: pins.gpio14.into_push_pull_output(),
        idle_led: pins.gpio15.into_push_pull_output(),
        sd_spi,
        peripheral_freq,
        flash: flash::init(pac.XIP_CTRL),
        timer,
    }
}
