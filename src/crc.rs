//! MTD-flavoured CRC-32, used to gate JFFS2 node headers and to check
//! (non-fatally) dirent name bytes and inode payloads.
//!
//! The formula in the JFFS2/MTD sources is `crc = ~update(0xFFFFFFFF, buf)`
//! followed by one more XOR against `0xFFFFFFFF`; those two inversions
//! cancel algebraically, leaving the well-known reflected CRC-32 (seed
//! `0xFFFFFFFF`, final XOR `0xFFFFFFFF`, polynomial `0xEDB88320`). A
//! plain non-inverting CRC-32 table walk will not reproduce it.

use std::sync::OnceLock;

const POLY: u32 = 0xEDB8_8320;

fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut crc = i as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLY
            } else {
                crc >> 1
            };
        }
        *slot = crc;
    }
    table
}

static TABLE: OnceLock<[u32; 256]> = OnceLock::new();

/// Computes the MTD CRC-32 of `data`.
pub fn mtd_crc(data: &[u8]) -> u32 {
    let table = TABLE.get_or_init(build_table);
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        let idx = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = table[idx] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}
