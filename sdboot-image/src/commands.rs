// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use sdboot_common::layout::RP2040_MAP;

use crate::image;

const COPY_CHUNK_SIZE: usize = 16 * 1024;

/// Build an image file from a raw payload.
pub fn pack(payload_path: &Path, output: &Path) -> Result<()> {
    let payload = fs::read(payload_path)
        .with_context(|| format!("Failed to read {}", payload_path.display()))?;

    let packed = image::pack(&payload, &RP2040_MAP)?;

    println!(
        "Payload: {} ({} bytes, CRC32: 0x{:08x})",
        payload_path.display(),
        packed.metadata.image_size,
        packed.metadata.image_crc
    );
    if !packed.vector_table_ok {
        println!(
            "Warning: payload does not start with a vector table for 0x{:08x}, the bootloader will not start it",
            RP2040_MAP.xip_address(RP2040_MAP.application.base)
        );
    }

    fs::write(output, &packed.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Image:   {} ({} bytes)", output.display(), packed.bytes.len());

    Ok(())
}

/// Display what the bootloader will see in an image file.
pub fn inspect(image_path: &Path) -> Result<()> {
    let bytes =
        fs::read(image_path).with_context(|| format!("Failed to read {}", image_path.display()))?;
    let report = image::inspect(&bytes, &RP2040_MAP)?;

    println!("Image: {}", image_path.display());
    match (report.metadata, report.computed_crc) {
        (Some(meta), Some(crc)) => {
            println!("  Payload size:  {} bytes", meta.image_size);
            println!("  Stored CRC32:  0x{:08x}", meta.image_crc);
            println!(
                "  Actual CRC32:  0x{:08x} ({})",
                crc,
                if report.crc_ok() { "ok" } else { "MISMATCH" }
            );
        }
        _ => println!("  Trailer:       missing or corrupted"),
    }
    println!(
        "  Stack pointer: 0x{:08x}",
        report.vector_table.initial_sp
    );
    println!(
        "  Reset vector:  0x{:08x} ({})",
        report.vector_table.reset_vector,
        if report.vector_table_ok {
            "plausible"
        } else {
            "NOT PLAUSIBLE"
        }
    );

    if !report.crc_ok() {
        bail!("Image would fail the checksum check");
    }

    Ok(())
}

/// Copy an image to the SD card.
pub fn deploy(image_path: &Path, mount_dir: &Path, name: &str) -> Result<()> {
    if !mount_dir.is_dir() {
        bail!("{} is not a directory", mount_dir.display());
    }

    let bytes =
        fs::read(image_path).with_context(|| format!("Failed to read {}", image_path.display()))?;
    let report = image::inspect(&bytes, &RP2040_MAP)
        .with_context(|| format!("{} is not an sdboot image", image_path.display()))?;
    if !report.crc_ok() {
        bail!(
            "{} fails its own checksum, run `sdboot-image inspect` for details",
            image_path.display()
        );
    }

    let target = mount_dir.join(name);
    copy_with_progress(&bytes, &target)?;

    println!();
    println!("Image deployed to {}", target.display());
    println!("Insert the card and hold the update button while resetting the device.");

    Ok(())
}

fn copy_with_progress(bytes: &[u8], target: &Path) -> Result<()> {
    let mut file =
        File::create(target).with_context(|| format!("Failed to create {}", target.display()))?;

    let pb = ProgressBar::new(bytes.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    for chunk in bytes.chunks(COPY_CHUNK_SIZE) {
        if let Err(e) = file.write_all(chunk) {
            pb.abandon();
            return Err(e).with_context(|| format!("Failed to write {}", target.display()));
        }
        pb.inc(chunk.len() as u64);
    }

    // The card is usually pulled right after this returns.
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", target.display()))?;
    pb.finish_with_message("Copy complete");

    // Read back what landed on the card.
    let mut written = Vec::with_capacity(bytes.len());
    File::open(target)?.read_to_end(&mut written)?;
    if written != bytes {
        bail!("Read-back of {} does not match the image", target.display());
    }

    Ok(())
}
