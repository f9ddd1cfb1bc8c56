// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Checksum engine: CRC-32 (ISO HDLC) over a flash region.
//!
//! The same [`CRC32`] instance is used by `sdboot-image` when it writes the
//! metadata trailer, so both sides always agree on the algorithm.

use crc::{Crc, CRC_32_ISO_HDLC};
use embedded_storage::nor_flash::ReadNorFlash;

use crate::flash::MediumFault;
use crate::layout::FlashRegion;

pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

const READ_CHUNK: usize = 256;

/// Compute CRC-32 of an in-memory buffer.
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChecksumResult {
    pub computed: u32,
    pub expected: u32,
    pub matched: bool,
}

/// The flash read itself failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("flash read failed at offset {offset:#x}: {fault:?}")]
pub struct IoFault {
    pub offset: u32,
    pub fault: MediumFault,
}

/// Outcome of the checksum gate for one boot cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChecksumStatus {
    Match(ChecksumResult),
    Mismatch(ChecksumResult),
    /// Trailer erased, torn, or declaring more than the region holds.
    MissingMetadata,
    ReadFault(IoFault),
}

impl ChecksumStatus {
    pub fn is_match(&self) -> bool {
        matches!(self, ChecksumStatus::Match(_))
    }
}

impl From<Result<ChecksumResult, IoFault>> for ChecksumStatus {
    fn from(result: Result<ChecksumResult, IoFault>) -> Self {
        match result {
            Ok(r) if r.matched => ChecksumStatus::Match(r),
            Ok(r) => ChecksumStatus::Mismatch(r),
            Err(e) => ChecksumStatus::ReadFault(e),
        }
    }
}

/// CRC-32 over every byte of `region`, streamed from flash.
///
/// A mismatch is an ordinary result (`matched == false`); only a failing read
/// is an error.
pub fn verify<R: ReadNorFlash>(
    flash: &mut R,
    region: FlashRegion,
    expected: u32,
) -> Result<ChecksumResult, IoFault> {
    let mut digest = CRC32.digest();
    let mut chunk = [0u8; READ_CHUNK];
    let mut offset = region.base;
    let end = region.end();

    while offset < end {
        let n = ((end - offset) as usize).min(chunk.len());
        flash
            .read(offset, &mut chunk[..n])
            .map_err(|e| IoFault {
                offset,
                fault: MediumFault::from_error(e),
            })?;
        digest.update(&chunk[..n]);
        offset += n as u32;
    }

    let computed = digest.finalize();
    Ok(ChecksumResult {
        computed,
        expected,
        matched: computed == expected,
    })
}
