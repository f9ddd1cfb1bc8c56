// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Button and LEDs behind the `BoardIo` trait.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use sdboot_common::board::{BoardIo, IndicatorKind};

use crate::peripherals::{ButtonPin, FaultLed, IdleLed, ProgressLed};

pub struct Board {
    button: ButtonPin,
    fault: FaultLed,
    progress: ProgressLed,
    idle: IdleLed,
    /// RAM update flag found at reset.
    update_requested: bool,
}

fn drive(pin: &mut impl OutputPin, on: bool) {
    if on {
        pin.set_high().ok();
    } else {
        pin.set_low().ok();
    }
}

impl Board {
    pub fn new(
        button: ButtonPin,
        fault: FaultLed,
        progress: ProgressLed,
        idle: IdleLed,
        update_requested: bool,
    ) -> Self {
        Self {
            button,
            fault,
            progress,
            idle,
            update_requested,
        }
    }

    pub fn all_off(&mut self) {
        for kind in [IndicatorKind::Fault, IndicatorKind::Progress, IndicatorKind::Idle] {
            self.set_indicator(kind, false);
        }
    }

    /// Blink the Idle LED until a hardware reset.
    pub fn halt(&mut self, timer: &mut impl DelayNs, period_ms: u32) -> ! {
        let mut on = false;
        loop {
            on = !on;
            self.set_indicator(IndicatorKind::Idle, on);
            timer.delay_ms(period_ms);
        }
    }
}

impl BoardIo for Board {
    fn button_pressed(&mut self) -> bool {
        let pressed = self.button.is_low().unwrap_or(false);
        pressed || core::mem::take(&mut self.update_requested)
    }

    fn set_indicator(&mut self, kind: IndicatorKind, on: bool) {
        match kind {
            IndicatorKind::Fault => drive(&mut self.fault, on),
            IndicatorKind::Progress => drive(&mut self.progress, on),
            IndicatorKind::Idle => drive(&mut self.idle, on),
        }
    }
}
