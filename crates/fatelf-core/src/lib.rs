//! # fatelf-core
//!
//! Format layer for FatELF containers.
//!
//! FatELF packs several ELF binaries, each built for a different target,
//! into one file behind a small fixed header that records every binary's
//! target tuple and absolute payload offset. This crate owns the byte-level
//! formats involved:
//!
//! - the FatELF container codec ([`container`])
//! - ELF identification and payload-extent inspection ([`elf`])
//! - Haiku resource tail location and detection ([`rsrc`])
//! - streaming `ar(1)` archive reading with BSD/GNU long names ([`ar`])
//! - leading-magic classification of inputs ([`classify`])
//!
//! The merge and glue tooling built on top lives in the `fatelf-glue` crate.

#![forbid(unsafe_code)]

pub mod ar;
pub mod classify;
pub mod container;
pub mod elf;
pub mod io;
pub mod rsrc;

pub use ar::{ArEntry, ArEntryKind, Archive};
pub use classify::{classify_bytes, classify_path, classify_stream, BinaryKind};
pub use container::{page_align, FatElfHeader, FatElfRecord, FATELF_MAGIC, PAGE_SIZE};
pub use elf::extent::{payload_extent, PayloadExtent};
pub use elf::{ElfClass, ElfData, ElfIdent};
pub use io::{align_up, Endian};
pub use rsrc::{find_rsrc, RsrcExtent};

use thiserror::Error;

/// Error type for format-layer operations.
#[derive(Debug, Error)]
pub enum FatElfError {
    /// Underlying filesystem or stream failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// ELF identification or table data failed validation.
    #[error("malformed ELF: {0}")]
    MalformedElf(String),
    /// ar global magic, entry header, or long-name data failed validation.
    #[error("malformed ar archive: {0}")]
    MalformedAr(String),
    /// Leading magic is not FatELF.
    #[error("not a FatELF file")]
    NotFatElf,
    /// FatELF format version this build does not understand.
    #[error("unsupported FatELF format version: {0}")]
    UnsupportedVersion(u16),
    /// File ends before the declared FatELF record table.
    #[error("truncated FatELF header: need {needed} bytes, have {available}")]
    Truncated { needed: u64, available: u64 },
}

/// Result type for format-layer operations.
pub type FatElfResult<T> = Result<T, FatElfError>;
