// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot policy configuration.

use crate::layout::{FlashMap, RP2040_MAP};

pub const DEFAULT_IMAGE_NAME: &str = "image.bin";

/// What to do when the resident image fails its checksum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChecksumPolicy {
    /// Light the fault indicator and still look for an application.
    #[default]
    Warn,
    /// Refuse to boot.
    Halt,
}

/// What to do when a word fails to program during an update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashFaultPolicy {
    /// Count the failure and continue with the next word.
    #[default]
    BestEffort,
    /// Stop at the first failure and erase the region again.
    AbortAndErase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootConfig {
    pub map: FlashMap,
    pub image_name: &'static str,
    pub checksum_policy: ChecksumPolicy,
    pub fault_policy: FlashFaultPolicy,
    /// Enter update mode when no application is found and none was requested.
    pub update_on_missing_application: bool,
}

impl BootConfig {
    pub const fn new(map: FlashMap) -> Self {
        Self {
            map,
            image_name: DEFAULT_IMAGE_NAME,
            checksum_policy: ChecksumPolicy::Warn,
            fault_policy: FlashFaultPolicy::BestEffort,
            update_on_missing_application: false,
        }
    }

    pub const fn with_image_name(mut self, name: &'static str) -> Self {
        self.image_name = name;
        self
    }

    pub const fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.checksum_policy = policy;
        self
    }

    pub const fn with_fault_policy(mut self, policy: FlashFaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    pub const fn with_update_on_missing_application(mut self, enabled: bool) -> Self {
        self.update_on_missing_application = enabled;
        self
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::new(RP2040_MAP)
    }
}
