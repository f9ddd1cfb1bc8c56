// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! RAM-backed simulators shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;

use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

use sdboot_common::board::{BoardIo, IndicatorKind};
use sdboot_common::checksum::crc32;
use sdboot_common::flash::FlashControl;
use sdboot_common::layout::{FlashMap, FlashRegion, RamRange, FLASH_BASE, RAM_END, RAM_START};
use sdboot_common::metadata::{ImageMetadata, METADATA_SIZE};
use sdboot_common::storage::{ByteStream, Storage, StorageError, StreamFault};

// =============================================================================
// Flash map
// =============================================================================

/// Small map: 4 KiB bootloader, 1 KiB application, 16 KiB device.
pub const TEST_MAP: FlashMap = FlashMap {
    xip_base: FLASH_BASE,
    capacity: 16 * 1024,
    bootloader: FlashRegion::new(0, 0x1000, 8),
    application: FlashRegion::new(0x1000, 1024, 8),
    ram: RamRange {
        start: RAM_START,
        end: RAM_END,
    },
};

// =============================================================================
// SimFlash
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimError(pub NorFlashErrorKind);

impl NorFlashError for SimError {
    fn kind(&self) -> NorFlashErrorKind {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashOp {
    Unlock,
    Lock,
    Erase { from: u32, to: u32 },
    Write { offset: u32, len: u32 },
}

/// NOR flash simulator: writes can only clear bits, erase sets bytes to 0xFF.
pub struct SimFlash {
    pub data: Vec<u8>,
    pub ops: Vec<FlashOp>,
    pub unlocked: bool,
    /// Writes attempted while locked.
    pub locked_writes: u32,
    /// Absolute offsets whose write reports a medium error.
    pub fail_writes_at: HashSet<u32>,
    /// Absolute offsets whose write silently stores a corrupted value.
    pub corrupt_writes_at: HashSet<u32>,
    /// Reads touching this absolute offset fail.
    pub fail_read_at: Option<u32>,
    /// Erase leaves this absolute offset at 0x00.
    pub erase_residue_at: Option<u32>,
}

impl SimFlash {
    pub fn new(capacity: u32) -> Self {
        Self {
            data: vec![0xFF; capacity as usize],
            ops: Vec::new(),
            unlocked: false,
            locked_writes: 0,
            fail_writes_at: HashSet::new(),
            corrupt_writes_at: HashSet::new(),
            fail_read_at: None,
            erase_residue_at: None,
        }
    }

    pub fn for_map(map: &FlashMap) -> Self {
        Self::new(map.capacity)
    }

    /// Preload `bytes` at `offset`, bypassing the op log.
    pub fn preload(&mut self, offset: u32, bytes: &[u8]) {
        let start = offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn slice(&self, offset: u32, len: u32) -> &[u8] {
        &self.data[offset as usize..(offset + len) as usize]
    }

    pub fn erase_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, FlashOp::Erase { .. }))
            .count()
    }

    pub fn write_offsets(&self) -> Vec<u32> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                FlashOp::Write { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect()
    }

    /// No erase and no write was issued.
    pub fn untouched(&self) -> bool {
        self.erase_count() == 0 && self.write_offsets().is_empty()
    }

    fn check_bounds(&self, offset: u32, len: usize) -> Result<(), SimError> {
        if offset as usize + len > self.data.len() {
            return Err(SimError(NorFlashErrorKind::OutOfBounds));
        }
        Ok(())
    }
}

impl ErrorType for SimFlash {
    type Error = SimError;
}

impl ReadNorFlash for SimFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.check_bounds(offset, bytes.len())?;
        if let Some(bad) = self.fail_read_at {
            if (offset..offset + bytes.len() as u32).contains(&bad) {
                return Err(SimError(NorFlashErrorKind::Other));
            }
        }
        bytes.copy_from_slice(self.slice(offset, bytes.len() as u32));
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for SimFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = 256;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from % Self::ERASE_SIZE as u32 != 0 || to % Self::ERASE_SIZE as u32 != 0 || to < from {
            return Err(SimError(NorFlashErrorKind::NotAligned));
        }
        self.check_bounds(from, (to - from) as usize)?;
        if !self.unlocked {
            self.locked_writes += 1;
            return Err(SimError(NorFlashErrorKind::Other));
        }

        self.ops.push(FlashOp::Erase { from, to });
        self.data[from as usize..to as usize].fill(0xFF);
        if let Some(residue) = self.erase_residue_at {
            if (from..to).contains(&residue) {
                self.data[residue as usize] = 0x00;
            }
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if offset % Self::WRITE_SIZE as u32 != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(SimError(NorFlashErrorKind::NotAligned));
        }
        self.check_bounds(offset, bytes.len())?;
        if !self.unlocked {
            self.locked_writes += 1;
            return Err(SimError(NorFlashErrorKind::Other));
        }

        self.ops.push(FlashOp::Write {
            offset,
            len: bytes.len() as u32,
        });
        if self.fail_writes_at.contains(&offset) {
            return Err(SimError(NorFlashErrorKind::Other));
        }

        let corrupt = self.corrupt_writes_at.contains(&offset);
        for (i, b) in bytes.iter().enumerate() {
            let cell = &mut self.data[offset as usize + i];
            *cell &= if corrupt { b ^ 0x01 } else { *b };
        }
        Ok(())
    }
}

impl FlashControl for SimFlash {
    fn unlock(&mut self) -> Result<(), Self::Error> {
        self.ops.push(FlashOp::Unlock);
        self.unlocked = true;
        Ok(())
    }

    fn lock(&mut self) {
        self.ops.push(FlashOp::Lock);
        self.unlocked = false;
    }
}

// =============================================================================
// SimStorage
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageEvent {
    Mount,
    Open(String),
    Close,
    Unmount,
}

pub struct SimFile {
    pub name: String,
    pub data: Vec<u8>,
    /// Size reported by the container, when it differs from `data.len()`.
    pub declared_size: Option<u64>,
    /// Reads fail once the position reaches this byte.
    pub fail_at: Option<usize>,
}

pub struct SimStorage {
    pub files: Vec<SimFile>,
    pub mount_fails: bool,
    pub open_fails: bool,
    pub mounted: bool,
    pub events: RefCell<Vec<StorageEvent>>,
    /// Largest chunk handed out per `read_chunk` call.
    pub chunk_limit: usize,
}

impl SimStorage {
    pub fn empty() -> Self {
        Self {
            files: Vec::new(),
            mount_fails: false,
            open_fails: false,
            mounted: false,
            events: RefCell::new(Vec::new()),
            chunk_limit: 512,
        }
    }

    pub fn with_file(name: &str, data: Vec<u8>) -> Self {
        let mut storage = Self::empty();
        storage.files.push(SimFile {
            name: name.into(),
            data,
            declared_size: None,
            fail_at: None,
        });
        storage
    }

    pub fn events(&self) -> Vec<StorageEvent> {
        self.events.borrow().clone()
    }
}

pub struct SimStream<'a> {
    file: &'a SimFile,
    pos: usize,
    chunk_limit: usize,
    events: &'a RefCell<Vec<StorageEvent>>,
}

impl ByteStream for SimStream<'_> {
    fn size(&self) -> u64 {
        self.file
            .declared_size
            .unwrap_or(self.file.data.len() as u64)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, StreamFault> {
        if let Some(fail_at) = self.file.fail_at {
            if self.pos >= fail_at {
                return Err(StreamFault);
            }
        }
        let remaining = &self.file.data[self.pos..];
        let n = remaining.len().min(buf.len()).min(self.chunk_limit);
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Drop for SimStream<'_> {
    fn drop(&mut self) {
        self.events.borrow_mut().push(StorageEvent::Close);
    }
}

impl Storage for SimStorage {
    type Stream<'a> = SimStream<'a>;

    fn mount(&mut self) -> Result<(), StorageError> {
        if self.mount_fails {
            return Err(StorageError::Mount);
        }
        self.mounted = true;
        self.events.borrow_mut().push(StorageEvent::Mount);
        Ok(())
    }

    fn open(&mut self, name: &str) -> Result<Self::Stream<'_>, StorageError> {
        if !self.mounted {
            return Err(StorageError::Io);
        }
        if self.open_fails {
            return Err(StorageError::Io);
        }
        let file = self
            .files
            .iter()
            .find(|f| f.name == name)
            .ok_or(StorageError::NotFound)?;
        self.events.borrow_mut().push(StorageEvent::Open(name.into()));
        Ok(SimStream {
            file,
            pos: 0,
            chunk_limit: self.chunk_limit,
            events: &self.events,
        })
    }

    fn unmount(&mut self) {
        self.mounted = false;
        self.events.borrow_mut().push(StorageEvent::Unmount);
    }
}

/// A bare stream, for driving `ingest` without a storage.
pub struct VecStream {
    pub data: Vec<u8>,
    pub pos: usize,
    pub declared_size: Option<u64>,
    pub fail_at: Option<usize>,
}

impl VecStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            declared_size: None,
            fail_at: None,
        }
    }
}

impl ByteStream for VecStream {
    fn size(&self) -> u64 {
        self.declared_size.unwrap_or(self.data.len() as u64)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, StreamFault> {
        if let Some(fail_at) = self.fail_at {
            if self.pos >= fail_at {
                return Err(StreamFault);
            }
        }
        let n = (self.data.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

// =============================================================================
// SimBoard
// =============================================================================

#[derive(Default)]
pub struct SimBoard {
    pub button: bool,
    pub button_reads: u32,
    pub indicator_log: Vec<(IndicatorKind, bool)>,
}

impl SimBoard {
    pub fn pressed() -> Self {
        Self {
            button: true,
            ..Default::default()
        }
    }

    pub fn indicator(&self, kind: IndicatorKind) -> bool {
        self.indicator_log
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, on)| *on)
            .unwrap_or(false)
    }

    pub fn was_lit(&self, kind: IndicatorKind) -> bool {
        self.indicator_log.iter().any(|&(k, on)| k == kind && on)
    }
}

impl BoardIo for SimBoard {
    fn button_pressed(&mut self) -> bool {
        self.button_reads += 1;
        self.button
    }

    fn set_indicator(&mut self, kind: IndicatorKind, on: bool) {
        self.indicator_log.push((kind, on));
    }
}

// =============================================================================
// Image builders
// =============================================================================

/// Payload starting with a plausible vector table for `map`.
pub fn app_payload(map: &FlashMap, len: usize) -> Vec<u8> {
    assert!(len >= 8);
    let (code_start, _) = map.app_code_range();
    let mut payload: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
    payload[0..4].copy_from_slice(&map.ram.end.to_le_bytes());
    payload[4..8].copy_from_slice(&((code_start + 0x41) | 1).to_le_bytes());
    payload
}

/// Full-region image: payload padded with 0xFF, trailer at the end.
pub fn full_image(map: &FlashMap, payload: &[u8]) -> Vec<u8> {
    let capacity = map.payload_capacity() as usize;
    assert!(payload.len() <= capacity);
    let mut image = payload.to_vec();
    image.resize(capacity, 0xFF);
    let meta = ImageMetadata::new(payload.len() as u32, crc32(payload));
    image.extend_from_slice(&meta.to_bytes());
    assert_eq!(image.len() as u32, capacity as u32 + METADATA_SIZE);
    image
}

/// Flash with `image` already resident in the application region.
pub fn flash_with_image(map: &FlashMap, image: &[u8]) -> SimFlash {
    let mut flash = SimFlash::for_map(map);
    flash.preload(map.application.base, image);
    flash
}
