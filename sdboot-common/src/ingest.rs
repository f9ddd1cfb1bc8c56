// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Image ingest pipeline: stream an image into the application region.
//!
//! Sequence, in this order and no other:
//!   1. size check (nothing touched on failure)
//!   2. full erase of the target region
//!   3. open a write session
//!   4. one program word per chunk, cursor strictly increasing
//!   5. stop on end of stream, read fault, or end of region
//!   6. session closed on every exit path (guard drop)
//!
//! A word that fails to program is counted and skipped. Whether the result is
//! bootable is decided by the checksum on the next pass, not here.

use embedded_storage::nor_flash::NorFlash;

use crate::config::FlashFaultPolicy;
use crate::flash::{FlashControl, FlashDriver, FlashFault, ERASED_BYTE};
use crate::layout::MAX_PROGRAM_WORD_SIZE;
use crate::log;
use crate::storage::{ByteStream, StreamFault};

/// Log a progress line every this many bytes.
const PROGRESS_INTERVAL: u32 = 64 * 1024;

/// Why the session stopped reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IngestEnd {
    /// Stream returned no more data.
    Exhausted,
    /// Stream reported a read fault.
    StreamFault,
    /// Stream produced more data than the region holds.
    RegionFull,
    /// First failed word under `FlashFaultPolicy::AbortAndErase`.
    Aborted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IngestReport {
    pub image_size: u64,
    pub bytes_read: u64,
    pub words_written: u32,
    pub words_failed: u32,
    pub end: IngestEnd,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.words_failed == 0 && self.end == IngestEnd::Exhausted
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IngestError {
    #[error("image is empty")]
    EmptyImage,
    #[error("image of {size} bytes exceeds region of {capacity} bytes")]
    ImageTooLarge { size: u64, capacity: u32 },
    #[error("erase failed: {0}")]
    Erase(FlashFault),
    #[error("could not open flash write session: {0}")]
    Session(FlashFault),
    #[error("aborted after a failed word, region erased again")]
    Aborted(IngestReport),
}

impl IngestError {
    /// True if flash was touched before the error.
    pub fn mutated_flash(&self) -> bool {
        !matches!(
            self,
            IngestError::EmptyImage | IngestError::ImageTooLarge { .. }
        )
    }
}

/// Position of the write head within one flashing session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlashWriteCursor {
    pub offset: u32,
    pub words_written: u32,
    pub words_failed: u32,
}

impl FlashWriteCursor {
    fn record(&mut self, word_size: u32, result: Result<(), FlashFault>) {
        match result {
            Ok(()) => self.words_written += 1,
            Err(fault) => {
                log::warn!("Error at: {} ({:#x}): {}", self.words_written, self.offset, fault);
                self.words_failed += 1;
            }
        }
        // Advance on failure too: an offset is never programmed twice.
        self.offset += word_size;
    }
}

/// Fill `word` from the stream. Returns bytes placed; short only at the end.
fn read_word<S: ByteStream>(source: &mut S, word: &mut [u8]) -> Result<usize, StreamFault> {
    let mut filled = 0;
    while filled < word.len() {
        match source.read_chunk(&mut word[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Stream `source` into the driver's region.
pub fn ingest<S, F>(
    source: &mut S,
    flash: &mut FlashDriver<F>,
    policy: FlashFaultPolicy,
) -> Result<IngestReport, IngestError>
where
    S: ByteStream,
    F: NorFlash + FlashControl,
{
    let region = flash.region();
    let image_size = source.size();

    if image_size == 0 {
        return Err(IngestError::EmptyImage);
    }
    if image_size > region.length as u64 {
        return Err(IngestError::ImageTooLarge {
            size: image_size,
            capacity: region.length,
        });
    }

    log::info!("Flash erase starts...");
    flash.erase().map_err(IngestError::Erase)?;
    log::info!("Flash erase finished.");

    let word_size = region.word_size;
    let mut session = flash.session().map_err(IngestError::Session)?;
    let mut cursor = FlashWriteCursor::default();
    let mut bytes_read = 0u64;
    let mut buf = [ERASED_BYTE; MAX_PROGRAM_WORD_SIZE];
    let word = &mut buf[..word_size as usize];

    log::info!("Start flashing...");
    let end = loop {
        if cursor.offset >= region.length {
            // Stop only if the stream still has data past the region.
            let mut probe = [0u8; 1];
            break match source.read_chunk(&mut probe) {
                Ok(0) => IngestEnd::Exhausted,
                Ok(_) => IngestEnd::RegionFull,
                Err(_) => IngestEnd::StreamFault,
            };
        }

        word.fill(ERASED_BYTE);
        let n = match read_word(source, word) {
            Ok(0) => break IngestEnd::Exhausted,
            Ok(n) => n,
            Err(StreamFault) => break IngestEnd::StreamFault,
        };
        bytes_read += n as u64;

        let result = session.program_word(cursor.offset, word);
        let failed = result.is_err();
        cursor.record(word_size, result);

        if failed && policy == FlashFaultPolicy::AbortAndErase {
            break IngestEnd::Aborted;
        }

        if cursor.offset % PROGRESS_INTERVAL == 0 {
            log::debug!("Programmed {} bytes", cursor.offset);
        }
    };

    let report = IngestReport {
        image_size,
        bytes_read,
        words_written: cursor.words_written,
        words_failed: cursor.words_failed,
        end,
    };

    log::info!("Finished.");
    log::info!(
        "Flashed words: {}, failed: {}",
        report.words_written,
        report.words_failed
    );

    if end == IngestEnd::Aborted {
        log::warn!("Aborting update, erasing application region");
        if let Err(e) = session.erase() {
            log::error!("Erase after abort failed: {}", e);
        }
        return Err(IngestError::Aborted(report));
    }

    Ok(report)
}
