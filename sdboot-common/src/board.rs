// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Trigger button and indicator LEDs.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IndicatorKind {
    /// Checksum problem.
    Fault,
    /// Flashing in progress, and steady right before the jump.
    Progress,
    /// Blinks while halted.
    Idle,
}

pub trait BoardIo {
    /// Update requested (button held, or a request left by the application).
    fn button_pressed(&mut self) -> bool;

    fn set_indicator(&mut self, kind: IndicatorKind, on: bool);
}
