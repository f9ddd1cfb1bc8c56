// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Removable storage seen as a sequential byte source.
//!
//! Any medium that can mount, find an object by name and hand out its bytes in
//! order will do. Closing a stream is dropping it.

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    #[error("storage could not be mounted")]
    Mount,
    #[error("image not found")]
    NotFound,
    #[error("storage I/O error")]
    Io,
}

/// A read from an open stream failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("stream read failed")]
pub struct StreamFault;

pub trait ByteStream {
    /// Total size in bytes as recorded by the container (e.g. the file size).
    fn size(&self) -> u64;

    /// Fill `buf` from the current position. Returns the number of bytes read;
    /// `0` means the stream is exhausted.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, StreamFault>;
}

pub trait Storage {
    type Stream<'a>: ByteStream
    where
        Self: 'a;

    fn mount(&mut self) -> Result<(), StorageError>;

    /// Open the object `name` in the root of the mounted volume.
    fn open(&mut self, name: &str) -> Result<Self::Stream<'_>, StorageError>;

    fn unmount(&mut self);
}
