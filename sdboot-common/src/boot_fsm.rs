// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot sequencer FSM - pure logic over the flash, storage and board traits.
//!
//! ```text
//! Start -> ChecksumCheck -> {ApplicationCheck | DegradedApplicationCheck}
//!       -> {Jump | UpdateMode} -> ... -> Jump | Halt
//! ```
//!
//! The sequencer ends in [`BootOutcome`]; the actual jump (or the halt loop)
//! is performed by the platform crate, which owns the only `unsafe` needed for
//! the control transfer.

use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};

use crate::board::{BoardIo, IndicatorKind};
use crate::checksum::{self, ChecksumStatus, IoFault};
use crate::config::{BootConfig, ChecksumPolicy};
use crate::detect::{self, ApplicationHandle};
use crate::flash::{FlashControl, FlashDriver, FlashFault, MediumFault};
use crate::ingest::{self, IngestError, IngestReport};
use crate::log;
use crate::metadata::{ImageMetadata, METADATA_SIZE};
use crate::storage::{ByteStream, Storage, StorageError};

/// Upper bound on states visited in one boot cycle.
pub const TRACE_DEPTH: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HaltReason {
    NoApplication,
    /// Only with `ChecksumPolicy::Halt`.
    ChecksumMismatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootState {
    Start,
    ChecksumCheck,
    ApplicationCheck,
    /// Application check after a failed checksum.
    DegradedApplicationCheck,
    UpdateMode,
    Jump,
    Halt(HaltReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootDecision {
    JumpToApplication,
    EnterUpdateMode,
    Halt(HaltReason),
}

/// Inputs of [`decide`], gathered by the sequencer.
#[derive(Clone, Copy, Debug)]
pub struct DecisionInputs<'a> {
    pub trigger: bool,
    pub update_attempted: bool,
    pub checksum: &'a ChecksumStatus,
    pub application: Option<&'a ApplicationHandle>,
}

/// Decide what to do from the gathered inputs (no side effects).
pub fn decide(inputs: &DecisionInputs, config: &BootConfig) -> BootDecision {
    if inputs.trigger && !inputs.update_attempted {
        return BootDecision::EnterUpdateMode;
    }

    if !inputs.checksum.is_match() && config.checksum_policy == ChecksumPolicy::Halt {
        return BootDecision::Halt(HaltReason::ChecksumMismatch);
    }

    match inputs.application {
        Some(_) => BootDecision::JumpToApplication,
        None if config.update_on_missing_application && !inputs.update_attempted => {
            BootDecision::EnterUpdateMode
        }
        None => BootDecision::Halt(HaltReason::NoApplication),
    }
}

/// Terminal result of one boot cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootOutcome {
    Jump(ApplicationHandle),
    Halt(HaltReason),
}

/// What happened in `UpdateMode`. Every fault ends up here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateOutcome {
    MountFault,
    NoImage,
    OpenFault(StorageError),
    Rejected(IngestError),
    Flashed(IngestReport),
}

impl UpdateOutcome {
    pub fn mutated_flash(&self) -> bool {
        match self {
            UpdateOutcome::Flashed(_) => true,
            UpdateOutcome::Rejected(e) => e.mutated_flash(),
            _ => false,
        }
    }
}

pub struct BootSequencer<F, S, B>
where
    F: NorFlash + FlashControl,
{
    config: BootConfig,
    flash: FlashDriver<F>,
    storage: S,
    board: B,
    triggered: bool,
    checksum: Option<ChecksumStatus>,
    application: Option<ApplicationHandle>,
    update: Option<UpdateOutcome>,
    trace: heapless::Vec<BootState, TRACE_DEPTH>,
}

impl<F, S, B> BootSequencer<F, S, B>
where
    F: NorFlash + FlashControl,
    S: Storage,
    B: BoardIo,
{
    /// Fails if the application region does not fit the flash medium.
    pub fn new(config: BootConfig, flash: F, storage: S, board: B) -> Result<Self, FlashFault> {
        let flash = FlashDriver::new(flash, config.map.application)?;
        Ok(Self {
            config,
            flash,
            storage,
            board,
            triggered: false,
            checksum: None,
            application: None,
            update: None,
            trace: heapless::Vec::new(),
        })
    }

    /// Run one boot cycle to its terminal state.
    pub fn run(&mut self) -> BootOutcome {
        let mut state = BootState::Start;

        loop {
            let _ = self.trace.push(state);
            log::debug!("State: {}", state);

            state = match state {
                BootState::Start => self.start(),
                BootState::ChecksumCheck => self.checksum_check(),
                BootState::ApplicationCheck | BootState::DegradedApplicationCheck => {
                    self.application_check()
                }
                BootState::UpdateMode => self.update_mode(),
                BootState::Jump => match self.application {
                    Some(handle) => {
                        self.board.set_indicator(IndicatorKind::Progress, true);
                        return BootOutcome::Jump(handle);
                    }
                    None => BootState::Halt(HaltReason::NoApplication),
                },
                BootState::Halt(reason) => return BootOutcome::Halt(reason),
            };
        }
    }

    fn start(&mut self) -> BootState {
        self.triggered = self.board.button_pressed();
        if self.triggered {
            log::info!("Update requested at startup");
            BootState::UpdateMode
        } else {
            BootState::ChecksumCheck
        }
    }

    fn checksum_check(&mut self) -> BootState {
        let status = self.measure_checksum();
        self.checksum = Some(status);

        match status {
            ChecksumStatus::Match(_) => {
                log::info!("Checksum ok");
                self.board.set_indicator(IndicatorKind::Fault, false);
                BootState::ApplicationCheck
            }
            other => {
                log::warn!("Checksum error: {}", other);
                self.board.set_indicator(IndicatorKind::Fault, true);
                match self.config.checksum_policy {
                    ChecksumPolicy::Warn => BootState::DegradedApplicationCheck,
                    ChecksumPolicy::Halt => BootState::Halt(HaltReason::ChecksumMismatch),
                }
            }
        }
    }

    fn measure_checksum(&mut self) -> ChecksumStatus {
        let map = self.config.map;
        let trailer = map.metadata();
        let mut raw = [0u8; METADATA_SIZE as usize];

        if let Err(e) = self.flash.read(trailer.base, &mut raw) {
            return ChecksumStatus::ReadFault(IoFault {
                offset: trailer.base,
                fault: MediumFault::from_error(e),
            });
        }

        let meta = match ImageMetadata::parse(&raw) {
            Some(meta) if meta.fits(map.payload_capacity()) => meta,
            _ => return ChecksumStatus::MissingMetadata,
        };

        let covered = map.application.head(meta.image_size);
        checksum::verify(&mut self.flash, covered, meta.image_crc).into()
    }

    fn application_check(&mut self) -> BootState {
        // Trigger path or freshly flashed: the checksum gate has not seen
        // the current contents yet.
        let Some(checksum) = self.checksum else {
            return BootState::ChecksumCheck;
        };

        self.application = detect::detect(&mut self.flash, &self.config.map);

        let inputs = DecisionInputs {
            trigger: self.triggered,
            update_attempted: self.update.is_some(),
            checksum: &checksum,
            application: self.application.as_ref(),
        };

        match decide(&inputs, &self.config) {
            BootDecision::JumpToApplication => {
                log::info!("Application found, preparing for jump...");
                BootState::Jump
            }
            BootDecision::EnterUpdateMode => {
                log::info!("No application, trying an update");
                BootState::UpdateMode
            }
            BootDecision::Halt(reason) => {
                log::warn!("Halting: {}", reason);
                BootState::Halt(reason)
            }
        }
    }

    fn update_mode(&mut self) -> BootState {
        log::info!("Entering update mode...");
        self.board.set_indicator(IndicatorKind::Progress, true);

        let outcome = self.run_update();

        self.board.set_indicator(IndicatorKind::Progress, false);
        if outcome.mutated_flash() {
            self.checksum = None;
            self.application = None;
        }
        self.update = Some(outcome);

        BootState::ApplicationCheck
    }

    fn run_update(&mut self) -> UpdateOutcome {
        if let Err(e) = self.storage.mount() {
            log::error!("Storage cannot be mounted: {}", e);
            return UpdateOutcome::MountFault;
        }
        log::info!("Storage mounted");

        let outcome = match self.storage.open(self.config.image_name) {
            Ok(mut stream) => {
                log::info!("Image found ({} bytes)", stream.size());
                match ingest::ingest(&mut stream, &mut self.flash, self.config.fault_policy) {
                    Ok(report) => UpdateOutcome::Flashed(report),
                    Err(e) => {
                        log::error!("Update rejected: {}", e);
                        UpdateOutcome::Rejected(e)
                    }
                }
            }
            Err(StorageError::NotFound) => {
                log::info!("No image on storage");
                UpdateOutcome::NoImage
            }
            Err(e) => {
                log::error!("Image cannot be opened: {}", e);
                UpdateOutcome::OpenFault(e)
            }
        };

        self.storage.unmount();
        log::info!("Storage unmounted");
        outcome
    }

    /// States visited so far, in order.
    pub fn trace(&self) -> &[BootState] {
        &self.trace
    }

    pub fn checksum_status(&self) -> Option<ChecksumStatus> {
        self.checksum
    }

    pub fn update_outcome(&self) -> Option<UpdateOutcome> {
        self.update
    }

    /// Hand the collaborators back to the platform.
    pub fn into_parts(self) -> (F, S, B) {
        (self.flash.release(), self.storage, self.board)
    }
}
