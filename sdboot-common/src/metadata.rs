// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Image metadata trailer (16 bytes, little endian).
//!
//! ```text
//! 0x0  magic       0x5DB0_0710
//! 0x4  image_size  payload bytes covered by the checksum
//! 0x8  image_crc   CRC-32 (ISO HDLC) of the payload
//! 0xC  header_crc  CRC-32 of bytes 0x0..0xC
//! ```
//!
//! The trailer is written by `sdboot-image pack` as the last bytes of the
//! image file, so flashing a full-size image also lands the trailer at the end
//! of the application region.

use crate::checksum;

pub const METADATA_SIZE: u32 = 16;
pub const METADATA_MAGIC: u32 = 0x5DB0_0710;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImageMetadata {
    pub image_size: u32,
    pub image_crc: u32,
}

impl ImageMetadata {
    pub const fn new(image_size: u32, image_crc: u32) -> Self {
        Self {
            image_size,
            image_crc,
        }
    }

    /// Parse a trailer. Returns `None` for an erased, torn or foreign trailer.
    pub fn parse(bytes: &[u8; METADATA_SIZE as usize]) -> Option<Self> {
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        if word(0) != METADATA_MAGIC {
            return None;
        }
        if checksum::crc32(&bytes[..12]) != word(12) {
            return None;
        }

        Some(Self {
            image_size: word(4),
            image_crc: word(8),
        })
    }

    pub fn to_bytes(&self) -> [u8; METADATA_SIZE as usize] {
        let mut out = [0u8; METADATA_SIZE as usize];
        out[0..4].copy_from_slice(&METADATA_MAGIC.to_le_bytes());
        out[4..8].copy_from_slice(&self.image_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.image_crc.to_le_bytes());
        let header_crc = checksum::crc32(&out[..12]);
        out[12..16].copy_from_slice(&header_crc.to_le_bytes());
        out
    }

    /// Declared size must be non-zero and leave room for the trailer itself.
    pub fn fits(&self, payload_capacity: u32) -> bool {
        self.image_size != 0 && self.image_size <= payload_capacity
    }
}
