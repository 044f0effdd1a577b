//! CRC-24 parity check for Mode S messages

use std::sync::OnceLock;

/// CRC-24 generator polynomial used in Mode S (0x1FFF409 without the x^24 term)
const CRC24_POLY: u32 = 0xFFF409;

static CRC24_TABLE: OnceLock<[u32; 256]> = OnceLock::new();

fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut crc = (i as u32) << 16;
        for _ in 0..8 {
            crc = if crc & 0x800000 != 0 {
                (crc << 1) ^ CRC24_POLY
            } else {
                crc << 1
            };
        }
        *entry = crc & 0xFFFFFF;
    }
    table
}

/// Build the parity table ahead of the first frame
pub fn init() {
    CRC24_TABLE.get_or_init(build_table);
}

/// Parity remainder of a whole message, PI field included.
///
/// Zero for an intact DF17/DF18 message.
pub fn crc24(msg: &[u8]) -> u32 {
    if msg.len() < 3 {
        return u32::MAX;
    }

    let table = CRC24_TABLE.get_or_init(build_table);
    let (data, parity) = msg.split_at(msg.len() - 3);

    let mut crc: u32 = 0;
    for &b in data {
        crc = ((crc << 8) ^ table[(((crc >> 16) as u8) ^ b) as usize]) & 0xFFFFFF;
    }

    crc ^ ((parity[0] as u32) << 16 | (parity[1] as u32) << 8 | parity[2] as u32)
}

/// Accept only long extended squitters whose parity checks out.
///
/// DF17 and DF18 carry pure parity; other formats overlay the address and
/// cannot be verified from a single weak frame.
pub fn check_crc(msg: &[u8]) -> bool {
    if msg.len() != 14 {
        return false;
    }
    matches!(get_df(msg), 17 | 18) && crc24(msg) == 0
}

/// Extract ICAO address from message (bytes 1-3)
pub fn get_icao(msg: &[u8]) -> u32 {
    ((msg[1] as u32) << 16) | ((msg[2] as u32) << 8) | (msg[3] as u32)
}

/// Extract downlink format from message
pub fn get_df(msg: &[u8]) -> u8 {
    (msg[0] >> 3) & 0x1F
}
