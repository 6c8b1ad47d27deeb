//! Glue engine: build one FatELF container from per-target ELF inputs.
//!
//! The header region is reserved up front and written last, once every
//! payload has been copied and sized. Payloads land at page-aligned
//! offsets with zero padding between them. A Haiku resource tail found on
//! an input is stripped from its payload; the first such tail is re-placed
//! at the container's own resource offset.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use fatelf_core::container::{page_align, FatElfHeader, FatElfRecord, MAX_RECORDS};
use fatelf_core::elf::ElfIdent;
use fatelf_core::io::{copy_all, copy_range, stream_size, write_zeros};
use fatelf_core::rsrc::{find_rsrc, rsrc_offset_for_fatelf, RsrcExtent};

use crate::{GlueError, GlueResult};

/// Deletes the registered output file on drop unless disarmed.
///
/// The engine arms the guard as soon as the output exists and disarms it
/// on success, so every failure path removes the partial container before
/// the error surfaces.
struct UnlinkGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> UnlinkGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for UnlinkGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(self.path);
        }
    }
}

/// Build a FatELF container at `out` from the ELF binaries in `inputs`,
/// in input order.
pub fn glue(out: &Path, inputs: &[PathBuf]) -> GlueResult<()> {
    if inputs.is_empty() || inputs.len() > MAX_RECORDS {
        return Err(GlueError::TooManyRecords {
            count: inputs.len(),
        });
    }

    let mut out_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(out)?;
    let mut guard = UnlinkGuard::new(out);

    // Reserve the header region; the real header lands here at the end.
    let header_size = FatElfHeader::size_for(inputs.len());
    write_zeros(&mut out_file, header_size)?;

    let mut header = FatElfHeader::new();
    let mut cursor = header_size;
    let mut carried: Option<(usize, RsrcExtent)> = None;

    for (index, path) in inputs.iter().enumerate() {
        let binary_offset = page_align(cursor);
        let mut input = File::open(path)?;

        let ident = ElfIdent::read(&mut input)?;
        let mut record = FatElfRecord::from_ident(&ident);
        record.offset = binary_offset;

        for (prior_index, prior) in header.records.iter().enumerate() {
            if record.target_matches(prior) {
                return Err(GlueError::DuplicateTarget {
                    first: inputs[prior_index].clone(),
                    second: path.clone(),
                });
            }
        }

        write_zeros(&mut out_file, binary_offset - cursor)?;

        // Haiku resources ride after the container's last payload instead
        // of inside a record, so strip any tail from this input.
        match find_rsrc(&mut input)? {
            Some(rsrc) => {
                if carried.is_none() {
                    carried = Some((index, rsrc));
                }
                record.size = stream_size(&mut input)? - rsrc.size;
                copy_range(&mut input, &mut out_file, 0, record.size)?;
            }
            None => {
                record.size = copy_all(&mut input, &mut out_file)?;
            }
        }

        cursor = binary_offset + record.size;
        header.records.push(record);
    }

    header.write_to(&mut out_file)?;

    // The resources of the first carrying input win; any others were
    // dropped with their payload tails above.
    if let Some((index, rsrc)) = carried {
        if let Some(out_offset) = rsrc_offset_for_fatelf(&header) {
            let mut source = File::open(&inputs[index])?;
            out_file.seek(SeekFrom::Start(out_offset))?;
            copy_range(&mut source, &mut out_file, rsrc.offset, rsrc.size)?;
        }
    }

    guard.disarm();
    Ok(())
}
