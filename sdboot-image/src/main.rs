// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Image tool for the sdboot SD-card bootloader.
//!
//! Usage:
//!   sdboot-image pack firmware.bin -o image.bin
//!   sdboot-image inspect image.bin
//!   sdboot-image deploy image.bin /media/sdcard

mod cli;
mod commands;
mod image;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
