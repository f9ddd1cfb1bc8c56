// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash program/erase driver.
//!
//! Wraps a raw NOR flash medium (`embedded-storage`) and a single target
//! region. The driver validates every request before it reaches the medium and
//! checks the result afterwards:
//!   - `erase()` leaves the whole region reading as [`ERASED_BYTE`]
//!   - `program_word()` only targets aligned, erased words inside the region
//!     and reads the word back
//!
//! Programming requires a [`FlashSession`], a write-enable guard that locks
//! the medium again when it goes out of scope.

use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

use crate::layout::{FlashRegion, MAX_PROGRAM_WORD_SIZE};

/// Value of every byte after an erase.
pub const ERASED_BYTE: u8 = 0xFF;

const BLANK_CHECK_CHUNK: usize = 256;

/// Write-enable control of the flash program engine.
///
/// Media without a lock (e.g. QSPI NOR driven through ROM routines) keep the
/// default no-op implementations.
pub trait FlashControl: NorFlash {
    fn unlock(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn lock(&mut self) {}
}

/// Medium error class, reduced from `NorFlashErrorKind`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MediumFault {
    NotAligned,
    OutOfBounds,
    Other,
}

impl MediumFault {
    pub fn from_error<E: NorFlashError>(error: E) -> Self {
        match error.kind() {
            NorFlashErrorKind::NotAligned => MediumFault::NotAligned,
            NorFlashErrorKind::OutOfBounds => MediumFault::OutOfBounds,
            _ => MediumFault::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashFault {
    #[error("offset or length outside the target region, or misaligned")]
    OutOfRange,
    #[error("flash program engine is locked")]
    Locked,
    #[error("target word is not erased")]
    NotErased,
    #[error("read-back does not match the programmed word")]
    VerifyMismatch,
    #[error("region does not read as erased after erase")]
    EraseIncomplete,
    #[error("flash medium fault: {0:?}")]
    Medium(MediumFault),
}

fn medium_fault<E: NorFlashError>(error: E) -> FlashFault {
    FlashFault::Medium(MediumFault::from_error(error))
}

pub struct FlashDriver<F> {
    medium: F,
    region: FlashRegion,
    unlocked: bool,
}

impl<F: NorFlash + FlashControl> FlashDriver<F> {
    /// Take ownership of the medium and bind the driver to `region`.
    ///
    /// Fails with `OutOfRange` if the region is not sector aligned, exceeds the
    /// medium, or its word size is not a power of two multiple of the medium's
    /// write size.
    pub fn new(medium: F, region: FlashRegion) -> Result<Self, FlashFault> {
        let word = region.word_size as usize;
        if word == 0
            || word > MAX_PROGRAM_WORD_SIZE
            || !word.is_power_of_two()
            || word % F::WRITE_SIZE != 0
        {
            return Err(FlashFault::OutOfRange);
        }

        if !region.is_aligned_to(F::ERASE_SIZE as u32) || region.end() as usize > medium.capacity()
        {
            return Err(FlashFault::OutOfRange);
        }

        Ok(Self {
            medium,
            region,
            unlocked: false,
        })
    }

    pub fn region(&self) -> FlashRegion {
        self.region
    }

    /// Give the medium back (used by the platform before the jump).
    pub fn release(self) -> F {
        self.medium
    }

    /// Erase the whole target region and blank-check it.
    pub fn erase(&mut self) -> Result<(), FlashFault> {
        self.medium.unlock().map_err(medium_fault)?;
        let result = self.medium.erase(self.region.base, self.region.end());
        self.medium.lock();
        self.unlocked = false;
        result.map_err(medium_fault)?;

        if !self.is_blank(0, self.region.length)? {
            return Err(FlashFault::EraseIncomplete);
        }
        Ok(())
    }

    /// Unlock the program engine for a sequence of `program_word` calls.
    pub fn session(&mut self) -> Result<FlashSession<'_, F>, FlashFault> {
        self.medium.unlock().map_err(medium_fault)?;
        self.unlocked = true;
        Ok(FlashSession { driver: self })
    }

    /// Read `buf.len()` bytes at `offset` within the region.
    pub fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashFault> {
        if !self.region.contains_span(offset, buf.len() as u32) {
            return Err(FlashFault::OutOfRange);
        }
        self.medium
            .read(self.region.base + offset, buf)
            .map_err(medium_fault)
    }

    /// True if `[offset, offset + len)` within the region reads as erased.
    pub fn is_blank(&mut self, offset: u32, len: u32) -> Result<bool, FlashFault> {
        let mut chunk = [0u8; BLANK_CHECK_CHUNK];
        let mut pos = offset;
        let end = offset.checked_add(len).ok_or(FlashFault::OutOfRange)?;

        while pos < end {
            let n = ((end - pos) as usize).min(chunk.len());
            self.read_at(pos, &mut chunk[..n])?;
            if chunk[..n].iter().any(|&b| b != ERASED_BYTE) {
                return Ok(false);
            }
            pos += n as u32;
        }

        Ok(true)
    }

    fn program_word(&mut self, offset: u32, value: &[u8]) -> Result<(), FlashFault> {
        if !self.unlocked {
            return Err(FlashFault::Locked);
        }

        let word = self.region.word_size;
        if value.len() as u32 != word
            || offset % word != 0
            || !self.region.contains_span(offset, word)
        {
            return Err(FlashFault::OutOfRange);
        }

        // NOR can only clear bits: a word is programmed once per erase.
        let mut readback = [0u8; MAX_PROGRAM_WORD_SIZE];
        let readback = &mut readback[..word as usize];
        self.read_at(offset, readback)?;
        if readback.iter().any(|&b| b != ERASED_BYTE) {
            return Err(FlashFault::NotErased);
        }

        self.medium
            .write(self.region.base + offset, value)
            .map_err(medium_fault)?;

        self.read_at(offset, readback)?;
        if readback[..] != value[..] {
            return Err(FlashFault::VerifyMismatch);
        }

        Ok(())
    }

    fn end_session(&mut self) {
        if self.unlocked {
            self.medium.lock();
            self.unlocked = false;
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }
}

/// Read-only view of the whole device, for the checksum engine and detector.
impl<F: NorFlash + FlashControl> ErrorType for FlashDriver<F> {
    type Error = F::Error;
}

impl<F: NorFlash + FlashControl> ReadNorFlash for FlashDriver<F> {
    const READ_SIZE: usize = F::READ_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.medium.read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.medium.capacity()
    }
}

/// Write-enabled state of a [`FlashDriver`]. Dropping it locks the medium.
pub struct FlashSession<'d, F: NorFlash + FlashControl> {
    driver: &'d mut FlashDriver<F>,
}

impl<F: NorFlash + FlashControl> FlashSession<'_, F> {
    /// Program one word at `offset` within the region.
    pub fn program_word(&mut self, offset: u32, value: &[u8]) -> Result<(), FlashFault> {
        self.driver.program_word(offset, value)
    }

    pub fn region(&self) -> FlashRegion {
        self.driver.region
    }

    /// Erase the region again without leaving the session.
    pub fn erase(&mut self) -> Result<(), FlashFault> {
        let erased = self.driver.erase();
        // `erase` locks the medium on every exit; restore write enable.
        self.driver.medium.unlock().map_err(medium_fault)?;
        self.driver.unlocked = true;
        erased
    }
}

impl<F: NorFlash + FlashControl> Drop for FlashSession<'_, F> {
    fn drop(&mut self) {
        self.driver.end_session();
    }
}
