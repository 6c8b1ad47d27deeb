//! # fatelf-glue
//!
//! Merge tooling for FatELF containers: the glue engine that packs N
//! per-target ELF binaries into one container ([`glue`]), the file-set
//! merger that dispatches "same entity" paths to a merge strategy
//! ([`merge`]), and the lockstep recursive tree merger ([`walk`]).
//!
//! The byte-level formats live in `fatelf-core`; this crate owns the
//! filesystem side.

#![forbid(unsafe_code)]

pub mod glue;
pub mod merge;
pub mod walk;

pub use glue::glue;
pub use merge::merge_files;
pub use walk::merge_trees;

use std::path::PathBuf;

use fatelf_core::FatElfError;
use thiserror::Error;

/// Error type for merge and glue operations.
#[derive(Debug, Error)]
pub enum GlueError {
    /// Underlying filesystem failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Format-layer failure while inspecting or encoding an input.
    #[error(transparent)]
    Format(#[from] FatElfError),
    /// Two inputs share the same target tuple.
    #[error("'{first}' and '{second}' are for the same target", first = .first.display(), second = .second.display())]
    DuplicateTarget { first: PathBuf, second: PathBuf },
    /// A container holds between 1 and 255 records.
    #[error("cannot glue {count} binaries (a container holds 1 to 255)")]
    TooManyRecords { count: usize },
    /// Peer paths disagree on file type, or an existing merge target does.
    #[error("'{path}' does not match the file type of its peers", path = .path.display())]
    TypeMismatch { path: PathBuf },
    /// Block/char devices, fifos, and sockets cannot be merged.
    #[error("unsupported file type: '{path}'", path = .path.display())]
    UnsupportedFileType { path: PathBuf },
    /// The input cannot be merged (e.g. it is already a FatELF container).
    #[error("unsupported input '{path}': {reason}", path = .path.display())]
    UnsupportedInput { path: PathBuf, reason: &'static str },
    /// Acknowledged but not yet supported.
    #[error("unimplemented: {0}")]
    Unimplemented(&'static str),
    /// Recursive merge sources must be directories.
    #[error("'{path}' is not a directory", path = .path.display())]
    NotADirectory { path: PathBuf },
}

/// Result type for merge and glue operations.
pub type GlueResult<T> = Result<T, GlueError>;
