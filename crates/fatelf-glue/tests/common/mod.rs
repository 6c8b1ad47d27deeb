//! Shared helpers for the merge/glue integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Fresh per-test directory under the system temp dir.
pub fn unique_tmp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after UNIX_EPOCH")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Minimal little-endian ELF32 image: file header, one PT_LOAD program
/// header, and `payload` as the segment data at offset 84.
pub fn build_elf32(machine: u16, align: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; 84 + payload.len()];
    buf[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
    buf[4] = 1; // ELFCLASS32
    buf[5] = 1; // ELFDATA2LSB
    buf[6] = 1;
    buf[18..20].copy_from_slice(&machine.to_le_bytes());
    buf[28..32].copy_from_slice(&52u32.to_le_bytes()); // e_phoff
    buf[40..42].copy_from_slice(&52u16.to_le_bytes()); // e_ehsize
    buf[42..44].copy_from_slice(&32u16.to_le_bytes()); // e_phentsize
    buf[44..46].copy_from_slice(&1u16.to_le_bytes()); // e_phnum

    buf[52..56].copy_from_slice(&1u32.to_le_bytes()); // PT_LOAD
    buf[56..60].copy_from_slice(&84u32.to_le_bytes()); // p_offset
    buf[68..72].copy_from_slice(&(payload.len() as u32).to_le_bytes()); // p_filesz
    buf[80..84].copy_from_slice(&align.to_le_bytes()); // p_align

    buf[84..].copy_from_slice(payload);
    buf
}

/// Minimal little-endian ELF64 image: file header, one PT_LOAD program
/// header, and `payload` as the segment data at offset 120.
pub fn build_elf64(machine: u16, align: u64, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; 120 + payload.len()];
    buf[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
    buf[4] = 2; // ELFCLASS64
    buf[5] = 1; // ELFDATA2LSB
    buf[6] = 1;
    buf[18..20].copy_from_slice(&machine.to_le_bytes());
    buf[32..40].copy_from_slice(&64u64.to_le_bytes()); // e_phoff
    buf[52..54].copy_from_slice(&64u16.to_le_bytes()); // e_ehsize
    buf[54..56].copy_from_slice(&56u16.to_le_bytes()); // e_phentsize
    buf[56..58].copy_from_slice(&1u16.to_le_bytes()); // e_phnum

    buf[64..68].copy_from_slice(&1u32.to_le_bytes()); // PT_LOAD
    buf[72..80].copy_from_slice(&120u64.to_le_bytes()); // p_offset
    buf[96..104].copy_from_slice(&(payload.len() as u64).to_le_bytes()); // p_filesz
    buf[112..120].copy_from_slice(&align.to_le_bytes()); // p_align

    buf[120..].copy_from_slice(payload);
    buf
}

/// Append a Haiku resource tail at `offset`: the resource magic followed
/// by `total - 4` bytes of `fill`.
pub fn append_rsrc(image: &mut Vec<u8>, offset: u64, total: usize, fill: u8) {
    assert!(total >= 4);
    assert!(offset as usize >= image.len());
    image.resize(offset as usize, 0);
    image.extend_from_slice(&0x444f_1000u32.to_le_bytes());
    image.extend(std::iter::repeat(fill).take(total - 4));
}
