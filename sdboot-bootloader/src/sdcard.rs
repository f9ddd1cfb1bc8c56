// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! SD card (SPI mode, FAT volume) as the update image source.

use embedded_sdmmc::{
    Mode, RawDirectory, RawFile, RawVolume, SdCard, TimeSource, Timestamp, VolumeIdx,
    VolumeManager,
};
use rp2040_hal as hal;
use rp2040_hal::fugit::{HertzU32, RateExtU32};
use sdboot_common::storage::{ByteStream, Storage, StorageError, StreamFault};

use crate::peripherals::SdSpi;

/// SPI clock once the card is identified.
const SD_RUN_BAUD_MHZ: u32 = 16;

const BLOCK_SIZE: usize = 512;

type Card = SdCard<SdSpi, hal::Timer>;
type Volumes = VolumeManager<Card, FixedTime>;

/// Files are only read, so modification times never matter.
pub struct FixedTime;

impl TimeSource for FixedTime {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 56,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

pub struct SdStorage {
    volumes: Volumes,
    mounted: Option<(RawVolume, RawDirectory)>,
    peripheral_freq: HertzU32,
}

impl SdStorage {
    pub fn new(spi: SdSpi, timer: hal::Timer, peripheral_freq: HertzU32) -> Self {
        Self {
            volumes: VolumeManager::new(SdCard::new(spi, timer), FixedTime),
            mounted: None,
            peripheral_freq,
        }
    }
}

impl Storage for SdStorage {
    type Stream<'a> = SdStream<'a>;

    fn mount(&mut self) -> Result<(), StorageError> {
        if self.mounted.is_some() {
            return Ok(());
        }

        // First access runs the card init sequence at the slow clock.
        let size = self.volumes.device().num_bytes().map_err(|e| {
            defmt::warn!("SD card init failed: {}", e);
            StorageError::Mount
        })?;
        defmt::println!("SD found ({=u64} bytes)", size);

        let freq = self.peripheral_freq;
        self.volumes.device().spi(|dev| {
            dev.bus_mut().set_baudrate(freq, SD_RUN_BAUD_MHZ.MHz());
        });

        let volume = self
            .volumes
            .open_raw_volume(VolumeIdx(0))
            .map_err(|e| {
                defmt::warn!("No FAT volume: {}", e);
                StorageError::Mount
            })?;
        let root = match self.volumes.open_root_dir(volume) {
            Ok(root) => root,
            Err(e) => {
                defmt::warn!("Root directory unreadable: {}", e);
                let _ = self.volumes.close_volume(volume);
                return Err(StorageError::Mount);
            }
        };

        self.mounted = Some((volume, root));
        Ok(())
    }

    fn open(&mut self, name: &str) -> Result<SdStream<'_>, StorageError> {
        let (_, root) = self.mounted.ok_or(StorageError::Io)?;

        let file = self
            .volumes
            .open_file_in_dir(root, name, Mode::ReadOnly)
            .map_err(|e| match e {
                embedded_sdmmc::Error::NotFound => StorageError::NotFound,
                other => {
                    defmt::warn!("Open failed: {}", other);
                    StorageError::Io
                }
            })?;

        let size = match self.volumes.file_length(file) {
            Ok(size) => size,
            Err(_) => {
                let _ = self.volumes.close_file(file);
                return Err(StorageError::Io);
            }
        };

        Ok(SdStream {
            volumes: &mut self.volumes,
            file,
            size,
            block: [0; BLOCK_SIZE],
            pos: 0,
            len: 0,
        })
    }

    fn unmount(&mut self) {
        if let Some((volume, root)) = self.mounted.take() {
            let _ = self.volumes.close_dir(root);
            let _ = self.volumes.close_volume(volume);
        }
    }
}

/// An open file, read one block at a time. Dropping it closes the file.
pub struct SdStream<'a> {
    volumes: &'a mut Volumes,
    file: RawFile,
    size: u32,
    block: [u8; BLOCK_SIZE],
    pos: usize,
    len: usize,
}

impl ByteStream for SdStream<'_> {
    fn size(&self) -> u64 {
        self.size as u64
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, StreamFault> {
        if self.pos == self.len {
            self.len = self.volumes.read(self.file, &mut self.block).map_err(|e| {
                defmt::warn!("SD read failed: {}", e);
                StreamFault
            })?;
            self.pos = 0;
        }

        let n = buf.len().min(self.len - self.pos);
        buf[..n].copy_from_slice(&self.block[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Drop for SdStream<'_> {
    fn drop(&mut self) {
        let _ = self.volumes.close_file(self.file);
    }
}
