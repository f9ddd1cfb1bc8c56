// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Image file format: the application payload padded with 0xFF to the end of
//! the payload area, followed by the 16-byte metadata trailer. The file is
//! exactly as long as the application region, so flashing it lands the
//! trailer where the bootloader reads it.

use anyhow::{bail, Result};

use sdboot_common::checksum::crc32;
use sdboot_common::detect::VectorTable;
use sdboot_common::flash::ERASED_BYTE;
use sdboot_common::layout::FlashMap;
use sdboot_common::metadata::{ImageMetadata, METADATA_SIZE};

pub struct PackedImage {
    pub bytes: Vec<u8>,
    pub metadata: ImageMetadata,
    /// Payload starts with a plausible vector table for the map.
    pub vector_table_ok: bool,
}

/// What `inspect` finds in an image file.
#[derive(Debug)]
pub struct Inspection {
    pub metadata: Option<ImageMetadata>,
    pub computed_crc: Option<u32>,
    pub vector_table: VectorTable,
    pub vector_table_ok: bool,
}

impl Inspection {
    pub fn crc_ok(&self) -> bool {
        matches!(
            (self.metadata, self.computed_crc),
            (Some(meta), Some(crc)) if meta.image_crc == crc
        )
    }
}

fn vector_table(bytes: &[u8]) -> VectorTable {
    let mut raw = [ERASED_BYTE; 8];
    let n = bytes.len().min(8);
    raw[..n].copy_from_slice(&bytes[..n]);
    VectorTable::from_bytes(&raw)
}

/// Build an image file from a raw payload (e.g. `objcopy -O binary` output).
pub fn pack(payload: &[u8], map: &FlashMap) -> Result<PackedImage> {
    let capacity = map.payload_capacity() as usize;

    if payload.is_empty() {
        bail!("Payload is empty");
    }
    if payload.len() > capacity {
        bail!(
            "Payload is {} bytes, the application region holds at most {} bytes",
            payload.len(),
            capacity
        );
    }

    let metadata = ImageMetadata::new(payload.len() as u32, crc32(payload));

    let mut bytes = Vec::with_capacity(map.application.length as usize);
    bytes.extend_from_slice(payload);
    bytes.resize(capacity, ERASED_BYTE);
    bytes.extend_from_slice(&metadata.to_bytes());

    Ok(PackedImage {
        bytes,
        metadata,
        vector_table_ok: vector_table(payload).is_plausible(map),
    })
}

/// Parse an image file and check it against its own trailer.
pub fn inspect(image: &[u8], map: &FlashMap) -> Result<Inspection> {
    if image.len() != map.application.length as usize {
        bail!(
            "Image is {} bytes, expected {} (application region size)",
            image.len(),
            map.application.length
        );
    }

    let (body, trailer) = image.split_at(image.len() - METADATA_SIZE as usize);
    let trailer: &[u8; METADATA_SIZE as usize] = trailer.try_into()?;
    let metadata = ImageMetadata::parse(trailer).filter(|m| m.fits(map.payload_capacity()));
    let computed_crc = metadata.map(|m| crc32(&body[..m.image_size as usize]));
    let vector_table = vector_table(body);

    Ok(Inspection {
        metadata,
        computed_crc,
        vector_table,
        vector_table_ok: vector_table.is_plausible(map),
    })
}
