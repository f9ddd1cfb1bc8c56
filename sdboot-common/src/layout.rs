// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash region map: where the bootloader, the application and its metadata
//! trailer live, and which RAM range a valid application stack may point into.
//!
//! Region bases are offsets from the start of the flash device, which is how
//! `embedded-storage` addresses the medium. [`FlashMap::xip_base`] maps them
//! into the CPU address space for the vector table checks and the jump.

use crate::metadata::METADATA_SIZE;

// --- RP2040 flash layout constants ---

pub const FLASH_BASE: u32 = 0x1000_0000;
pub const FLASH_CAPACITY: u32 = 2 * 1024 * 1024; // W25Q16 on the Pico

pub const BOOTLOADER_OFFSET: u32 = 0x0000_0000;
pub const BOOTLOADER_SIZE: u32 = 128 * 1024;

pub const APP_OFFSET: u32 = 0x0002_0000;
pub const APP_SIZE: u32 = 1024 * 1024;

pub const FLASH_SECTOR_SIZE: u32 = 4096;
pub const FLASH_PAGE_SIZE: u32 = 256;

/// Bytes programmed per program cycle (one quad-word).
pub const PROGRAM_WORD_SIZE: u32 = 8;

/// Largest program word the driver accepts.
pub const MAX_PROGRAM_WORD_SIZE: usize = 16;

pub const RAM_START: u32 = 0x2000_0000;
pub const RAM_END: u32 = 0x2004_2000; // 264KB, end is a valid initial SP

/// Written by an application right before a reset to request update mode.
/// Lives in SCRATCH_Y, which the bootloader never touches.
pub const UPDATE_REQUEST_ADDR: u32 = 0x2004_1FF0;
pub const UPDATE_REQUEST_MAGIC: u32 = 0x5DB0_0B00;

/// A contiguous range of flash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashRegion {
    /// Offset from the flash device origin.
    pub base: u32,
    pub length: u32,
    /// Program granularity in bytes.
    pub word_size: u32,
}

impl FlashRegion {
    pub const fn new(base: u32, length: u32, word_size: u32) -> Self {
        Self {
            base,
            length,
            word_size,
        }
    }

    /// One past the last offset of the region.
    pub const fn end(&self) -> u32 {
        self.base + self.length
    }

    pub const fn overlaps(&self, other: &FlashRegion) -> bool {
        self.base < other.end() && other.base < self.end()
    }

    /// True if `[offset, offset + len)` (relative to `base`) lies inside the region.
    pub const fn contains_span(&self, offset: u32, len: u32) -> bool {
        match offset.checked_add(len) {
            Some(end) => end <= self.length,
            None => false,
        }
    }

    pub const fn is_aligned_to(&self, granule: u32) -> bool {
        granule != 0 && self.base % granule == 0 && self.length % granule == 0
    }

    /// Leading part of this region, `length` bytes long.
    pub const fn head(&self, length: u32) -> FlashRegion {
        FlashRegion::new(self.base, length, self.word_size)
    }

    /// Trailing part of this region, `length` bytes long.
    pub const fn tail(&self, length: u32) -> FlashRegion {
        FlashRegion::new(self.end() - length, length, self.word_size)
    }
}

/// RAM addresses an application's initial stack pointer may take (inclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RamRange {
    pub start: u32,
    pub end: u32,
}

impl RamRange {
    pub const fn contains(&self, addr: u32) -> bool {
        self.start <= addr && addr <= self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashMap {
    /// CPU address of flash offset 0.
    pub xip_base: u32,
    pub capacity: u32,
    pub bootloader: FlashRegion,
    pub application: FlashRegion,
    pub ram: RamRange,
}

impl FlashMap {
    /// Metadata trailer at the very end of the application region.
    pub const fn metadata(&self) -> FlashRegion {
        self.application.tail(METADATA_SIZE)
    }

    /// Bytes of the application region usable by the image payload.
    pub const fn payload_capacity(&self) -> u32 {
        self.application.length - METADATA_SIZE
    }

    /// CPU address of a flash offset.
    pub const fn xip_address(&self, offset: u32) -> u32 {
        self.xip_base + offset
    }

    /// Executable XIP range of the application, trailer excluded (end exclusive).
    pub const fn app_code_range(&self) -> (u32, u32) {
        let start = self.xip_address(self.application.base);
        (start, start + self.payload_capacity())
    }

    /// Layout invariants: non-overlapping, inside the device, sector aligned,
    /// and room for more than just the trailer.
    pub const fn is_consistent(&self, sector_size: u32) -> bool {
        !self.bootloader.overlaps(&self.application)
            && self.bootloader.end() <= self.capacity
            && self.application.end() <= self.capacity
            && self.application.is_aligned_to(sector_size)
            && self.application.length > METADATA_SIZE
            && METADATA_SIZE % self.application.word_size == 0
            && self.ram.start < self.ram.end
    }
}

pub const RP2040_MAP: FlashMap = FlashMap {
    xip_base: FLASH_BASE,
    capacity: FLASH_CAPACITY,
    bootloader: FlashRegion::new(BOOTLOADER_OFFSET, BOOTLOADER_SIZE, PROGRAM_WORD_SIZE),
    application: FlashRegion::new(APP_OFFSET, APP_SIZE, PROGRAM_WORD_SIZE),
    ram: RamRange {
        start: RAM_START,
        end: RAM_END,
    },
};

// Compile-time layout check
const _: () = assert!(RP2040_MAP.is_consistent(FLASH_SECTOR_SIZE));
const _: () = assert!(FLASH_PAGE_SIZE % PROGRAM_WORD_SIZE == 0);
const _: () = assert!(PROGRAM_WORD_SIZE as usize <= MAX_PROGRAM_WORD_SIZE);
