// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Core logic for sdboot, the SD-card firmware bootloader.
//!
//! Everything here is hardware independent: flash access goes through
//! `embedded-storage` NOR flash traits, removable storage and board I/O through
//! the traits in [`storage`] and [`board`]. The RP2040 binary plugs in the real
//! peripherals, the integration tests plug in RAM-backed simulators.
//!
//! This crate supports both `no_std` (embedded) and `std` (host) environments:
//! - Default: `no_std` mode for embedded targets
//! - `std` feature: Enables `std` support for host tools
//! - `defmt` feature: Routes log output to `defmt` and derives `defmt::Format`

#![cfg_attr(not(feature = "std"), no_std)]

pub mod board;
pub mod boot_fsm;
pub mod checksum;
pub mod config;
pub mod detect;
pub mod flash;
pub mod ingest;
pub mod layout;
pub mod metadata;
pub mod storage;

// Re-export commonly used types
pub use board::{BoardIo, IndicatorKind};
pub use boot_fsm::{BootDecision, BootOutcome, BootSequencer, BootState, HaltReason, UpdateOutcome};
pub use checksum::{ChecksumResult, ChecksumStatus};
pub use config::{BootConfig, ChecksumPolicy, FlashFaultPolicy};
pub use detect::ApplicationHandle;
pub use flash::{FlashControl, FlashDriver, FlashFault};
pub use ingest::{IngestError, IngestReport};
pub use layout::{FlashMap, FlashRegion, RamRange, RP2040_MAP};
pub use metadata::ImageMetadata;
pub use storage::{ByteStream, Storage, StorageError, StreamFault};

#[cfg(feature = "defmt")]
pub(crate) use defmt as log;

#[cfg(not(feature = "defmt"))]
pub(crate) mod log {
    macro_rules! debug {
        ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
    }
    pub(crate) use debug;
    macro_rules! info {
        ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
    }
    pub(crate) use info;
    // `warn` alone collides with the built-in lint attribute.
    macro_rules! warner {
        ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
    }
    pub(crate) use warner as warn;
    macro_rules! error {
        ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
    }
    pub(crate) use error;
}
