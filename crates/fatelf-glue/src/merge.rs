//! File-set merge: N paths that purport to be the same entity across
//! source trees, one output path.
//!
//! The first input decides the strategy: directories are created,
//! symlinks reproduced, ELF binaries glued into a container, and any
//! other regular file is required to be byte-identical across inputs.
//! Divergent peers are a warning, not an error; the output always follows
//! the first input.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::os::unix::fs::{symlink, DirBuilderExt};
use std::path::{Path, PathBuf};

use fatelf_core::ar::Archive;
use fatelf_core::classify::{classify_path, BinaryKind};

use crate::glue::glue;
use crate::{GlueError, GlueResult};

const CHUNK_SIZE: usize = 4096;

/// Merge the file set `inputs` into `out`. All inputs share one file type;
/// the first input picks the strategy. An empty set is a no-op.
pub fn merge_files(out: &Path, inputs: &[PathBuf]) -> GlueResult<()> {
    let first = match inputs.first() {
        Some(first) => first,
        None => return Ok(()),
    };

    let meta = fs::symlink_metadata(first)?;
    let ftype = meta.file_type();

    if ftype.is_dir() {
        merge_dir(out, &meta)
    } else if ftype.is_symlink() {
        merge_symlink(out, first)
    } else if ftype.is_file() {
        match classify_path(first)? {
            BinaryKind::Elf => {
                glue(out, inputs)?;
                copy_permissions(first, out)
            }
            BinaryKind::FatElf => Err(GlueError::UnsupportedInput {
                path: first.clone(),
                reason: "already a FatELF container",
            }),
            BinaryKind::Ar => merge_archives(inputs),
            BinaryKind::Other => {
                merge_identical(out, inputs)?;
                copy_permissions(first, out)
            }
        }
    } else {
        // Block/char devices, fifos, sockets.
        Err(GlueError::UnsupportedFileType {
            path: first.clone(),
        })
    }
}

/// Create (or accept) the output directory and copy the source
/// directory's permissions onto it.
fn merge_dir(out: &Path, src_meta: &fs::Metadata) -> GlueResult<()> {
    match fs::symlink_metadata(out) {
        Ok(existing) if existing.file_type().is_dir() => {}
        Ok(_) => {
            return Err(GlueError::TypeMismatch {
                path: out.to_path_buf(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::DirBuilder::new().mode(0o700).create(out)?;
        }
        Err(e) => return Err(e.into()),
    }
    fs::set_permissions(out, src_meta.permissions())?;
    Ok(())
}

/// Reproduce the first input's symlink at the output path. An existing
/// symlink at the output counts as already merged.
fn merge_symlink(out: &Path, src: &Path) -> GlueResult<()> {
    let target = fs::read_link(src)?;
    match symlink(&target, out) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let existing = fs::symlink_metadata(out)?;
            if existing.file_type().is_symlink() {
                Ok(())
            } else {
                Err(GlueError::TypeMismatch {
                    path: out.to_path_buf(),
                })
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Stream every input archive to validate its structure and long names,
/// then refuse: no fat output format exists for ar archives yet.
fn merge_archives(inputs: &[PathBuf]) -> GlueResult<()> {
    for path in inputs {
        let mut archive = Archive::open(path)?;
        while archive.read_next()?.is_some() {}
    }
    Err(GlueError::Unimplemented(
        "merging ar archives into a fat archive",
    ))
}

/// Copy the first input to the output while checking the remaining inputs
/// for byte equality. A diverging peer is reported once on stderr and
/// dropped from the comparison; the output always carries the first
/// input's bytes.
fn merge_identical(out: &Path, inputs: &[PathBuf]) -> GlueResult<()> {
    struct Peer<'a> {
        path: &'a Path,
        file: File,
        diverged: bool,
    }

    let mut primary = File::open(&inputs[0])?;
    let mut peers = Vec::with_capacity(inputs.len() - 1);
    for path in &inputs[1..] {
        peers.push(Peer {
            path: path.as_path(),
            file: File::open(path)?,
            diverged: false,
        });
    }
    let mut out_file = File::create(out)?;

    let mut buf = [0u8; CHUNK_SIZE];
    let mut peer_buf = [0u8; CHUNK_SIZE];
    loop {
        let n = primary.read(&mut buf)?;
        if n == 0 {
            // Anything left in a peer is a length divergence.
            for peer in peers.iter_mut().filter(|p| !p.diverged) {
                if peer.file.read(&mut peer_buf[..1])? != 0 {
                    report_divergence(peer.path, &inputs[0]);
                    peer.diverged = true;
                }
            }
            break;
        }
        out_file.write_all(&buf[..n])?;

        for peer in peers.iter_mut().filter(|p| !p.diverged) {
            let mut filled = 0;
            while filled < n {
                let m = peer.file.read(&mut peer_buf[filled..n])?;
                if m == 0 {
                    break;
                }
                filled += m;
            }
            if filled < n || peer_buf[..n] != buf[..n] {
                report_divergence(peer.path, &inputs[0]);
                peer.diverged = true;
            }
        }
    }

    Ok(())
}

fn report_divergence(peer: &Path, primary: &Path) {
    eprintln!(
        "fatelf-glue: warning: '{}' differs from '{}'; keeping the first",
        peer.display(),
        primary.display()
    );
}

fn copy_permissions(src: &Path, out: &Path) -> GlueResult<()> {
    let meta = fs::metadata(src)?;
    fs::set_permissions(out, meta.permissions())?;
    Ok(())
}
