// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sdboot_common::config::DEFAULT_IMAGE_NAME;

use crate::commands;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "sdboot-image")]
#[command(about = "Image tool for the sdboot SD-card bootloader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Pad a raw application binary and append the metadata trailer
    Pack {
        /// Raw application binary (objcopy -O binary)
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,

        /// Output image file
        #[arg(short, long, default_value = DEFAULT_IMAGE_NAME)]
        output: PathBuf,
    },

    /// Check an image file against its trailer
    Inspect {
        /// Image file
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },

    /// Copy an image to the root of a mounted SD card
    Deploy {
        /// Image file
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Mount point of the SD card
        #[arg(value_name = "MOUNT_DIR")]
        mount_dir: PathBuf,

        /// File name the bootloader looks for
        #[arg(short, long, default_value = DEFAULT_IMAGE_NAME)]
        name: String,
    },
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Pack { payload, output } => commands::pack(&payload, &output),
        Commands::Inspect { image } => commands::inspect(&image),
        Commands::Deploy {
            image,
            mount_dir,
            name,
        } => commands::deploy(&image, &mount_dir, &name),
    }
}
