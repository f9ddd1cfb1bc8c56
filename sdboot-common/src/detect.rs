// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Application detector: is there something at the start of the application
//! region that looks like a Cortex-M vector table?

use embedded_storage::nor_flash::ReadNorFlash;

use crate::layout::FlashMap;
use crate::log;

/// First two words of a Cortex-M vector table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorTable {
    pub initial_sp: u32,
    pub reset_vector: u32,
}

impl VectorTable {
    pub fn from_bytes(bytes: &[u8; 8]) -> Self {
        Self {
            initial_sp: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            reset_vector: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    /// Stack pointer inside RAM and word aligned.
    pub fn stack_pointer_plausible(&self, map: &FlashMap) -> bool {
        map.ram.contains(self.initial_sp) && self.initial_sp % 4 == 0
    }

    /// Thumb entry point inside the application code, halfword aligned.
    pub fn entry_plausible(&self, map: &FlashMap) -> bool {
        if self.reset_vector & 1 == 0 {
            return false;
        }
        let target = self.reset_vector & !1;
        let (start, end) = map.app_code_range();
        (start..end).contains(&target) && target % 2 == 0
    }

    pub fn is_plausible(&self, map: &FlashMap) -> bool {
        self.stack_pointer_plausible(map) && self.entry_plausible(map)
    }
}

/// What the platform needs to hand control to the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ApplicationHandle {
    /// CPU address of the application's vector table.
    pub vector_table: u32,
    pub initial_sp: u32,
    pub entry: u32,
}

/// Look for an application at the base of `map.application`.
///
/// Absence is a normal outcome, so a failing read also yields `None`.
pub fn detect<R: ReadNorFlash>(flash: &mut R, map: &FlashMap) -> Option<ApplicationHandle> {
    let mut raw = [0u8; 8];
    if flash.read(map.application.base, &mut raw).is_err() {
        log::warn!("Vector table read failed");
        return None;
    }

    let vt = VectorTable::from_bytes(&raw);
    if !vt.is_plausible(map) {
        log::debug!(
            "No application: sp={:#x} reset={:#x}",
            vt.initial_sp,
            vt.reset_vector
        );
        return None;
    }

    Some(ApplicationHandle {
        vector_table: map.xip_address(map.application.base),
        initial_sp: vt.initial_sp,
        entry: vt.reset_vector,
    })
}
