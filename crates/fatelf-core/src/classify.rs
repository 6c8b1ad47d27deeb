//! Leading-magic classification of input files.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::ar::AR_MAGIC;
use crate::container::FATELF_MAGIC;
use crate::elf::ELF_MAGIC;
use crate::FatElfResult;

/// What a file's leading bytes say it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    Elf,
    FatElf,
    Ar,
    Other,
}

/// Classify from a file's leading bytes. Four bytes decide ELF and FatELF;
/// the ar magic needs eight. Anything shorter, or unrecognized, is
/// [`BinaryKind::Other`].
pub fn classify_bytes(prefix: &[u8]) -> BinaryKind {
    if prefix.len() >= 4 {
        let magic: [u8; 4] = prefix[0..4].try_into().unwrap();
        if magic == ELF_MAGIC {
            return BinaryKind::Elf;
        }
        if u32::from_le_bytes(magic) == FATELF_MAGIC {
            return BinaryKind::FatElf;
        }
    }
    if prefix.len() >= 8 && &prefix[0..8] == AR_MAGIC {
        return BinaryKind::Ar;
    }
    BinaryKind::Other
}

/// Classify the stream by peeking at its first eight bytes.
pub fn classify_stream<R: Read + Seek>(r: &mut R) -> FatElfResult<BinaryKind> {
    let mut prefix = [0u8; 8];
    r.seek(SeekFrom::Start(0))?;
    let mut filled = 0;
    while filled < prefix.len() {
        let n = r.read(&mut prefix[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(classify_bytes(&prefix[..filled]))
}

/// Classify the file at `path`.
pub fn classify_path(path: &Path) -> FatElfResult<BinaryKind> {
    let mut file = File::open(path)?;
    classify_stream(&mut file)
}
