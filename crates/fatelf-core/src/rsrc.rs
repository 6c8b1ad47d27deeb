//! Haiku resource tail location and detection.
//!
//! Haiku appends a resource blob after the ELF payload at a
//! class-dependent alignment. Only the placement and the leading magic are
//! interpreted here; the resource table itself is not parsed, so a
//! detected tail always runs to end of file and is carried verbatim.

use std::io::{Read, Seek, SeekFrom};

use crate::container::{FatElfHeader, FATELF_MAGIC};
use crate::elf::extent::payload_extent;
use crate::elf::{ElfClass, ELF_MAGIC};
use crate::io::{align_up, read_exact_at, stream_size};
use crate::FatElfResult;

/// Magic at the start of a Haiku resource blob.
pub const HAIKU_RSRC_MAGIC: u32 = 0x444f_1000;

/// Minimum resource alignment for ELF32 files; the effective alignment is
/// the larger of this and the file's biggest program-segment alignment.
pub const ELF32_RSRC_ALIGN_MIN: u64 = 32;

/// Fixed resource alignment for ELF64 files.
pub const ELF64_RSRC_ALIGN: u64 = 8;

/// Resource alignment inside a FatELF container.
pub const FAT_RSRC_ALIGN: u64 = 8;

/// Location of a detected resource tail within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsrcExtent {
    /// Absolute offset of the resource data.
    pub offset: u64,
    /// Bytes from the offset to end of file.
    pub size: u64,
}

/// Where resource data would live in the ELF file at the start of `r`.
///
/// The returned offset may lie past the end of the file; that simply means
/// no resources are present.
pub fn rsrc_offset_for_elf<R: Read + Seek>(r: &mut R) -> FatElfResult<u64> {
    let extent = payload_extent(r)?;
    let align = match extent.class {
        ElfClass::Elf64 => ELF64_RSRC_ALIGN,
        ElfClass::Elf32 => extent.max_align.max(ELF32_RSRC_ALIGN_MIN),
    };
    Ok(align_up(extent.end, align))
}

/// Where resource data would live in a FatELF container described by
/// `header`: just past the furthest record, 8-aligned. `None` when the
/// header carries no records.
pub fn rsrc_offset_for_fatelf(header: &FatElfHeader) -> Option<u64> {
    let furthest = header.furthest_record()?;
    Some(align_up(furthest.end(), FAT_RSRC_ALIGN))
}

/// Check for a resource tail at `offset` and return its size.
///
/// The tail is confirmed by the Haiku resource magic, accepted in either
/// byte order; its size is everything to end of file.
pub fn parse_rsrc_header<R: Read + Seek>(r: &mut R, offset: u64) -> FatElfResult<Option<u64>> {
    let file_size = stream_size(r)?;
    if file_size <= offset {
        return Ok(None);
    }

    let mut magic = [0u8; 4];
    read_exact_at(r, offset, &mut magic)?;
    let word = u32::from_le_bytes(magic);
    if word == HAIKU_RSRC_MAGIC || word.swap_bytes() == HAIKU_RSRC_MAGIC {
        Ok(Some(file_size - offset))
    } else {
        Ok(None)
    }
}

/// Where resource data would live in the file at the start of `r`,
/// dispatching on its leading magic. `None` for files that are neither ELF
/// nor FatELF.
pub fn rsrc_location<R: Read + Seek>(r: &mut R) -> FatElfResult<Option<u64>> {
    let mut magic = [0u8; 4];
    r.seek(SeekFrom::Start(0))?;
    r.read_exact(&mut magic)?;

    if magic == ELF_MAGIC {
        return rsrc_offset_for_elf(r).map(Some);
    }
    if u32::from_le_bytes(magic) == FATELF_MAGIC {
        let header = FatElfHeader::read_from(r)?;
        return Ok(rsrc_offset_for_fatelf(&header));
    }
    Ok(None)
}

/// Find the resource tail of the ELF or FatELF file at the start of `r`,
/// if one is present.
pub fn find_rsrc<R: Read + Seek>(r: &mut R) -> FatElfResult<Option<RsrcExtent>> {
    let offset = match rsrc_location(r)? {
        Some(offset) => offset,
        None => return Ok(None),
    };
    match parse_rsrc_header(r, offset)? {
        Some(size) => Ok(Some(RsrcExtent { offset, size })),
        None => Ok(None),
    }
}
