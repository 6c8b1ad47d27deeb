//! End-of-payload scan.
//!
//! Computes the offset of the first byte past the "real" ELF data: the
//! program and section header tables plus every byte of file data they
//! reference. Haiku appends its resource blob after this point, so the
//! scan also tracks the largest program-segment alignment, which decides
//! where an ELF32 resource tail sits.

use std::io::{self, Read, Seek};

use super::{ElfClass, ElfData, ElfIdent, PT_NULL, SHT_NOBITS, SHT_NULL};
use crate::io::{read_exact_at, Endian};
use crate::{FatElfError, FatElfResult};

/// Result of scanning an ELF file for its payload extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadExtent {
    /// First byte past the program/section tables and all referenced data.
    pub end: u64,
    /// Largest `p_align` over non-null program entries; 0 when the file
    /// has no program header table.
    pub max_align: u64,
    /// Word size of the scanned file.
    pub class: ElfClass,
    /// Byte order of the scanned file.
    pub data: ElfData,
}

struct TableLayout {
    offset: u64,
    entry_size: u64,
    count: u64,
}

fn field16(buf: &[u8], off: usize, en: Endian) -> u16 {
    en.read_u16([buf[off], buf[off + 1]])
}

fn field32(buf: &[u8], off: usize, en: Endian) -> u32 {
    en.read_u32([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn field64(buf: &[u8], off: usize, en: Endian) -> u64 {
    en.read_u64([
        buf[off],
        buf[off + 1],
        buf[off + 2],
        buf[off + 3],
        buf[off + 4],
        buf[off + 5],
        buf[off + 6],
        buf[off + 7],
    ])
}

fn read_table<R: Read + Seek>(
    r: &mut R,
    layout: &TableLayout,
    what: &str,
) -> FatElfResult<Vec<u8>> {
    let size = layout.entry_size.saturating_mul(layout.count);
    let mut table = vec![0u8; size as usize];
    read_exact_at(r, layout.offset, &mut table).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            FatElfError::MalformedElf(format!("truncated {what}"))
        } else {
            FatElfError::Io(e)
        }
    })?;
    Ok(table)
}

/// Scan the ELF file at the start of `r` and compute its payload extent.
///
/// The scan honors the file's declared byte order throughout and skips
/// `PT_NULL` program entries and `SHT_NULL`/`SHT_NOBITS` sections, none of
/// which occupy file space.
pub fn payload_extent<R: Read + Seek>(r: &mut R) -> FatElfResult<PayloadExtent> {
    let ident = ElfIdent::read(r)?;
    let en = ident.data.endian();

    let ehdr_size = match ident.class {
        ElfClass::Elf32 => 52,
        ElfClass::Elf64 => 64,
    };
    let mut ehdr = vec![0u8; ehdr_size];
    read_exact_at(r, 0, &mut ehdr).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            FatElfError::MalformedElf("file too short for the ELF file header".to_string())
        } else {
            FatElfError::Io(e)
        }
    })?;

    let (prog, sect) = match ident.class {
        ElfClass::Elf32 => (
            TableLayout {
                offset: field32(&ehdr, 28, en) as u64,
                entry_size: field16(&ehdr, 42, en) as u64,
                count: field16(&ehdr, 44, en) as u64,
            },
            TableLayout {
                offset: field32(&ehdr, 32, en) as u64,
                entry_size: field16(&ehdr, 46, en) as u64,
                count: field16(&ehdr, 48, en) as u64,
            },
        ),
        ElfClass::Elf64 => (
            TableLayout {
                offset: field64(&ehdr, 32, en),
                entry_size: field16(&ehdr, 54, en) as u64,
                count: field16(&ehdr, 56, en) as u64,
            },
            TableLayout {
                offset: field64(&ehdr, 40, en),
                entry_size: field16(&ehdr, 58, en) as u64,
                count: field16(&ehdr, 60, en) as u64,
            },
        ),
    };

    let mut end = 0u64;
    let mut max_align = 0u64;

    if prog.offset != 0 {
        let min_entry = match ident.class {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 56,
        };
        if prog.count > 0 && prog.entry_size < min_entry {
            return Err(FatElfError::MalformedElf(format!(
                "program header entry size {} too small",
                prog.entry_size
            )));
        }
        end = end.max(
            prog.offset
                .saturating_add(prog.entry_size.saturating_mul(prog.count)),
        );

        let table = read_table(r, &prog, "program header table")?;
        for i in 0..prog.count as usize {
            let entry = &table[i * prog.entry_size as usize..(i + 1) * prog.entry_size as usize];
            if field32(entry, 0, en) == PT_NULL {
                continue;
            }
            let (p_offset, p_filesz, p_align) = match ident.class {
                ElfClass::Elf32 => (
                    field32(entry, 4, en) as u64,
                    field32(entry, 16, en) as u64,
                    field32(entry, 28, en) as u64,
                ),
                ElfClass::Elf64 => (
                    field64(entry, 8, en),
                    field64(entry, 32, en),
                    field64(entry, 48, en),
                ),
            };
            end = end.max(p_offset.saturating_add(p_filesz));
            max_align = max_align.max(p_align);
        }
    }

    if sect.offset != 0 {
        let min_entry = match ident.class {
            ElfClass::Elf32 => 40,
            ElfClass::Elf64 => 64,
        };
        if sect.count > 0 && sect.entry_size < min_entry {
            return Err(FatElfError::MalformedElf(format!(
                "section header entry size {} too small",
                sect.entry_size
            )));
        }
        end = end.max(
            sect.offset
                .saturating_add(sect.entry_size.saturating_mul(sect.count)),
        );

        let table = read_table(r, &sect, "section header table")?;
        for i in 0..sect.count as usize {
            let entry = &table[i * sect.entry_size as usize..(i + 1) * sect.entry_size as usize];
            let sh_type = field32(entry, 4, en);
            if sh_type == SHT_NULL || sh_type == SHT_NOBITS {
                continue;
            }
            let (sh_offset, sh_size) = match ident.class {
                ElfClass::Elf32 => (field32(entry, 16, en) as u64, field32(entry, 20, en) as u64),
                ElfClass::Elf64 => (field64(entry, 24, en), field64(entry, 32, en)),
            };
            end = end.max(sh_offset.saturating_add(sh_size));
        }
    }

    Ok(PayloadExtent {
        end,
        max_align,
        class: ident.class,
        data: ident.data,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::elf::ELF_MAGIC;
    use std::io::Cursor;

    pub(crate) struct SegSpec {
        pub p_type: u32,
        pub offset: u64,
        pub filesz: u64,
        pub align: u64,
    }

    pub(crate) struct SecSpec {
        pub sh_type: u32,
        pub offset: u64,
        pub size: u64,
    }

    fn put16(buf: &mut [u8], off: usize, val: u16, en: Endian) {
        let bytes = match en {
            Endian::Little => val.to_le_bytes(),
            Endian::Big => val.to_be_bytes(),
        };
        buf[off..off + 2].copy_from_slice(&bytes);
    }

    fn put32(buf: &mut [u8], off: usize, val: u32, en: Endian) {
        let bytes = match en {
            Endian::Little => val.to_le_bytes(),
            Endian::Big => val.to_be_bytes(),
        };
        buf[off..off + 4].copy_from_slice(&bytes);
    }

    fn put64(buf: &mut [u8], off: usize, val: u64, en: Endian) {
        let bytes = match en {
            Endian::Little => val.to_le_bytes(),
            Endian::Big => val.to_be_bytes(),
        };
        buf[off..off + 8].copy_from_slice(&bytes);
    }

    /// Assemble a synthetic ELF image: file header, then the program
    /// header table, then the section header table, padded out to cover
    /// every referenced offset.
    pub(crate) fn build_elf(
        class: ElfClass,
        data: ElfData,
        machine: u16,
        segs: &[SegSpec],
        secs: &[SecSpec],
    ) -> Vec<u8> {
        let en = data.endian();
        let (ehdr_size, phent, shent) = match class {
            ElfClass::Elf32 => (52usize, 32usize, 40usize),
            ElfClass::Elf64 => (64usize, 56usize, 64usize),
        };
        let phoff = if segs.is_empty() { 0 } else { ehdr_size };
        let shoff = if secs.is_empty() {
            0
        } else {
            ehdr_size + segs.len() * phent
        };

        let mut referenced = (ehdr_size + segs.len() * phent + secs.len() * shent) as u64;
        for s in segs {
            if s.p_type != PT_NULL {
                referenced = referenced.max(s.offset + s.filesz);
            }
        }
        for s in secs {
            if s.sh_type != SHT_NOBITS {
                referenced = referenced.max(s.offset + s.size);
            }
        }

        let mut buf = vec![0u8; referenced as usize];
        buf[0..4].copy_from_slice(&ELF_MAGIC);
        buf[4] = class as u8;
        buf[5] = data as u8;
        buf[6] = 1;
        put16(&mut buf, 18, machine, en);

        match class {
            ElfClass::Elf32 => {
                put32(&mut buf, 28, phoff as u32, en);
                put32(&mut buf, 32, shoff as u32, en);
                put16(&mut buf, 40, ehdr_size as u16, en);
                put16(&mut buf, 42, phent as u16, en);
                put16(&mut buf, 44, segs.len() as u16, en);
                put16(&mut buf, 46, shent as u16, en);
                put16(&mut buf, 48, secs.len() as u16, en);
            }
            ElfClass::Elf64 => {
                put64(&mut buf, 32, phoff as u64, en);
                put64(&mut buf, 40, shoff as u64, en);
                put16(&mut buf, 52, ehdr_size as u16, en);
                put16(&mut buf, 54, phent as u16, en);
                put16(&mut buf, 56, segs.len() as u16, en);
                put16(&mut buf, 58, shent as u16, en);
                put16(&mut buf, 60, secs.len() as u16, en);
            }
        }

        for (i, s) in segs.iter().enumerate() {
            let off = phoff + i * phent;
            put32(&mut buf, off, s.p_type, en);
            match class {
                ElfClass::Elf32 => {
                    put32(&mut buf, off + 4, s.offset as u32, en);
                    put32(&mut buf, off + 16, s.filesz as u32, en);
                    put32(&mut buf, off + 28, s.align as u32, en);
                }
                ElfClass::Elf64 => {
                    put64(&mut buf, off + 8, s.offset, en);
                    put64(&mut buf, off + 32, s.filesz, en);
                    put64(&mut buf, off + 48, s.align, en);
                }
            }
        }

        for (i, s) in secs.iter().enumerate() {
            let off = shoff + i * shent;
            put32(&mut buf, off + 4, s.sh_type, en);
            match class {
                ElfClass::Elf32 => {
                    put32(&mut buf, off + 16, s.offset as u32, en);
                    put32(&mut buf, off + 20, s.size as u32, en);
                }
                ElfClass::Elf64 => {
                    put64(&mut buf, off + 24, s.offset, en);
                    put64(&mut buf, off + 32, s.size, en);
                }
            }
        }

        buf
    }

    #[test]
    fn test_extent_elf64_le() {
        // One PT_LOAD ending at 4196, one section ending at 8242.
        let image = build_elf(
            ElfClass::Elf64,
            ElfData::Lsb,
            62,
            &[SegSpec {
                p_type: 1,
                offset: 4096,
                filesz: 100,
                align: 4096,
            }],
            &[SecSpec {
                sh_type: 1,
                offset: 8192,
                size: 50,
            }],
        );
        let extent = payload_extent(&mut Cursor::new(image)).unwrap();
        assert_eq!(extent.end, 8242);
        assert_eq!(extent.max_align, 4096);
        assert_eq!(extent.class, ElfClass::Elf64);
        assert_eq!(extent.data, ElfData::Lsb);
    }

    #[test]
    fn test_extent_elf32_be() {
        let image = build_elf(
            ElfClass::Elf32,
            ElfData::Msb,
            20,
            &[
                SegSpec {
                    p_type: 1,
                    offset: 128,
                    filesz: 1000,
                    align: 32,
                },
                SegSpec {
                    p_type: 1,
                    offset: 2048,
                    filesz: 100,
                    align: 64,
                },
            ],
            &[],
        );
        let extent = payload_extent(&mut Cursor::new(image)).unwrap();
        assert_eq!(extent.end, 2148);
        assert_eq!(extent.max_align, 64);
        assert_eq!(extent.class, ElfClass::Elf32);
    }

    #[test]
    fn test_extent_skips_null_and_nobits() {
        // The PT_NULL entry and the SHT_NOBITS section must not extend the
        // payload, and PT_NULL alignment must not count.
        let image = build_elf(
            ElfClass::Elf64,
            ElfData::Lsb,
            62,
            &[
                SegSpec {
                    p_type: PT_NULL,
                    offset: 1 << 30,
                    filesz: 1,
                    align: 1 << 20,
                },
                SegSpec {
                    p_type: 1,
                    offset: 256,
                    filesz: 256,
                    align: 8,
                },
            ],
            &[SecSpec {
                sh_type: SHT_NOBITS,
                offset: 1 << 30,
                size: 4096,
            }],
        );
        let extent = payload_extent(&mut Cursor::new(image)).unwrap();
        // The live segment's end (512) beats both table ends.
        assert_eq!(extent.end, 512);
        assert_eq!(extent.max_align, 8);
    }

    #[test]
    fn test_extent_table_end_counts() {
        // No segment data, but the section table itself extends the
        // payload: ehdr 64 + shdr table 2*64 at offset 64.
        let image = build_elf(
            ElfClass::Elf64,
            ElfData::Lsb,
            62,
            &[],
            &[
                SecSpec {
                    sh_type: SHT_NULL,
                    offset: 0,
                    size: 0,
                },
                SecSpec {
                    sh_type: 1,
                    offset: 100,
                    size: 4,
                },
            ],
        );
        let extent = payload_extent(&mut Cursor::new(image)).unwrap();
        assert_eq!(extent.end, 64 + 2 * 64);
        assert_eq!(extent.max_align, 0);
    }

    #[test]
    fn test_extent_truncated_table() {
        let mut image = build_elf(
            ElfClass::Elf64,
            ElfData::Lsb,
            62,
            &[SegSpec {
                p_type: 1,
                offset: 4096,
                filesz: 100,
                align: 4096,
            }],
            &[],
        );
        image.truncate(80); // mid-way through the program header table
        assert!(matches!(
            payload_extent(&mut Cursor::new(image)),
            Err(FatElfError::MalformedElf(_))
        ));
    }
}
