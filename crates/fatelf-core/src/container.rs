//! FatELF container header codec.
//!
//! The container starts with a fixed little-endian header: magic, format
//! version, a one-octet record count, and one 24-byte record per embedded
//! binary. Payloads follow, each aligned to [`PAGE_SIZE`]; the bytes
//! between records are zero.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::elf::{ElfClass, ElfData, ElfIdent};
use crate::io::{align_up, stream_size};
use crate::{FatElfError, FatElfResult};

/// FatELF container magic, little-endian on disk.
pub const FATELF_MAGIC: u32 = 0x1f0e_70fa;

/// On-disk format version this build reads and writes.
pub const FATELF_FORMAT_VERSION: u16 = 1;

/// Fixed bytes before the record table.
pub const HEADER_BASE_SIZE: usize = 8;

/// Bytes per record on disk.
pub const RECORD_SIZE: usize = 24;

/// Most records a container can carry; the count is a single octet.
pub const MAX_RECORDS: usize = 255;

/// Alignment of every record's payload offset.
pub const PAGE_SIZE: u64 = 4096;

/// Round `value` up to the container page alignment.
pub fn page_align(value: u64) -> u64 {
    align_up(value, PAGE_SIZE)
}

/// Map a short read to [`FatElfError::Truncated`] with the stream's real
/// length, leaving other I/O failures untouched.
fn truncation<R: Seek>(r: &mut R, e: io::Error, needed: u64) -> FatElfError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        FatElfError::Truncated {
            needed,
            available: stream_size(r).unwrap_or(0),
        }
    } else {
        FatElfError::Io(e)
    }
}

/// One embedded binary: its target tuple plus the absolute position and
/// length of its payload in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatElfRecord {
    /// ELF machine architecture.
    pub machine: u16,
    /// OS/ABI identification octet.
    pub osabi: u8,
    /// ABI version octet.
    pub osabi_version: u8,
    /// Word size of the embedded object.
    pub word_size: ElfClass,
    /// Byte order of the embedded object.
    pub byte_order: ElfData,
    /// Absolute byte position of the payload; a multiple of [`PAGE_SIZE`].
    pub offset: u64,
    /// Payload length, exclusive of trailing container padding.
    pub size: u64,
}

impl FatElfRecord {
    /// Build a record for the binary identified by `ident`, with offset
    /// and size still to be assigned.
    pub fn from_ident(ident: &ElfIdent) -> Self {
        Self {
            machine: ident.machine,
            osabi: ident.osabi,
            osabi_version: ident.osabi_version,
            word_size: ident.class,
            byte_order: ident.data,
            offset: 0,
            size: 0,
        }
    }

    /// True when `other` names the same target tuple. Offsets and sizes do
    /// not participate; two records matching here must not share a
    /// container.
    pub fn target_matches(&self, other: &FatElfRecord) -> bool {
        self.machine == other.machine
            && self.osabi == other.osabi
            && self.osabi_version == other.osabi_version
            && self.word_size == other.word_size
            && self.byte_order == other.byte_order
    }

    /// First byte past this record's payload.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0..2].copy_from_slice(&self.machine.to_le_bytes());
        bytes[2] = self.osabi;
        bytes[3] = self.osabi_version;
        bytes[4] = self.word_size as u8;
        bytes[5] = self.byte_order as u8;
        // bytes 6..8 reserved, zero
        bytes[8..16].copy_from_slice(&self.offset.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.size.to_le_bytes());
        bytes
    }

    fn decode(bytes: &[u8; RECORD_SIZE], index: usize) -> FatElfResult<Self> {
        let word_size = ElfClass::try_from(bytes[4]).map_err(|v| {
            FatElfError::MalformedElf(format!("record {index} has invalid word-size octet {v}"))
        })?;
        let byte_order = ElfData::try_from(bytes[5]).map_err(|v| {
            FatElfError::MalformedElf(format!("record {index} has invalid byte-order octet {v}"))
        })?;
        Ok(Self {
            machine: u16::from_le_bytes([bytes[0], bytes[1]]),
            osabi: bytes[2],
            osabi_version: bytes[3],
            word_size,
            byte_order,
            offset: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            size: u64::from_le_bytes(bytes[16..24].try_into().unwrap()),
        })
    }
}

/// In-memory form of a FatELF container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatElfHeader {
    /// On-disk format version.
    pub version: u16,
    /// One record per embedded binary, in container order.
    pub records: Vec<FatElfRecord>,
}

impl Default for FatElfHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl FatElfHeader {
    /// Empty header at the current format version.
    pub fn new() -> Self {
        Self {
            version: FATELF_FORMAT_VERSION,
            records: Vec::new(),
        }
    }

    /// On-disk header size for a container of `record_count` binaries.
    pub fn size_for(record_count: usize) -> u64 {
        (HEADER_BASE_SIZE + RECORD_SIZE * record_count) as u64
    }

    /// On-disk size of this header.
    pub fn on_disk_size(&self) -> u64 {
        Self::size_for(self.records.len())
    }

    /// The record whose payload ends last in the container, if any.
    pub fn furthest_record(&self) -> Option<&FatElfRecord> {
        self.records.iter().max_by_key(|r| r.end())
    }

    /// Read and validate a header from the start of `r`.
    pub fn read_from<R: Read + Seek>(r: &mut R) -> FatElfResult<Self> {
        let mut prefix = [0u8; HEADER_BASE_SIZE];
        r.seek(SeekFrom::Start(0))?;
        if let Err(e) = r.read_exact(&mut prefix) {
            return Err(truncation(r, e, HEADER_BASE_SIZE as u64));
        }

        if u32::from_le_bytes(prefix[0..4].try_into().unwrap()) != FATELF_MAGIC {
            return Err(FatElfError::NotFatElf);
        }
        let version = u16::from_le_bytes([prefix[4], prefix[5]]);
        if version != FATELF_FORMAT_VERSION {
            return Err(FatElfError::UnsupportedVersion(version));
        }
        let record_count = prefix[6] as usize;

        let mut table = vec![0u8; record_count * RECORD_SIZE];
        if let Err(e) = r.read_exact(&mut table) {
            return Err(truncation(r, e, Self::size_for(record_count)));
        }

        let mut records = Vec::with_capacity(record_count);
        for i in 0..record_count {
            let bytes: &[u8; RECORD_SIZE] =
                table[i * RECORD_SIZE..(i + 1) * RECORD_SIZE].try_into().unwrap();
            records.push(FatElfRecord::decode(bytes, i)?);
        }

        Ok(Self { version, records })
    }

    /// Serialize this header at offset 0 of `w`.
    ///
    /// The caller keeps the record count within [`MAX_RECORDS`]; the glue
    /// engine validates its input list before any record exists.
    pub fn write_to<W: Write + Seek>(&self, w: &mut W) -> FatElfResult<()> {
        debug_assert!(self.records.len() <= MAX_RECORDS);
        w.seek(SeekFrom::Start(0))?;
        w.write_all(&self.encode())?;
        Ok(())
    }

    /// On-disk byte form of this header.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.on_disk_size() as usize);
        bytes.extend_from_slice(&FATELF_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.push(self.records.len() as u8);
        bytes.push(0); // reserved
        for record in &self.records {
            bytes.extend_from_slice(&record.encode());
        }
        bytes
    }
}
