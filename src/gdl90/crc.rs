//! CRC16-CCITT for GDL90 frames
//!
//! Polynomial 0x1021, seed 0, no final XOR. The lookup table is built once
//! and shared read-only by every computation afterwards.

use std::sync::OnceLock;

/// CRC16-CCITT generator polynomial
const CRC16_POLY: u16 = 0x1021;

static CRC_TABLE: OnceLock<[u16; 256]> = OnceLock::new();

/// Build the 256-entry lookup table
pub fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];

    for (i, entry) in table.iter_mut().enumerate() {
        let mut crc = (i as u16) << 8;
        for _ in 0..8 {
            crc = (crc << 1) ^ if crc & 0x8000 != 0 { CRC16_POLY } else { 0 };
        }
        *entry = crc;
    }

    table
}

/// Build the process-wide table. Safe to call more than once.
pub fn init() {
    table();
}

/// Shared lookup table, built on first use if `init` was never called
pub fn table() -> &'static [u16; 256] {
    CRC_TABLE.get_or_init(build_table)
}

/// Compute the CRC of a byte block
pub fn crc16(block: &[u8]) -> u16 {
    let table = table();
    let mut crc: u16 = 0;

    for &b in block {
        crc = table[(crc >> 8) as usize] ^ (crc << 8) ^ b as u16;
    }

    crc
}
