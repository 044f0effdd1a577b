//! ADS-B (1090 MHz extended squitter) decoding
//!
//! Turns demodulated DF17/DF18 frames into GDL90 Traffic Reports.

pub mod cpr;
pub mod crc;
pub mod parser;
pub mod track;
pub mod types;

pub use track::Tracker;

/// Verify CRC of a Mode S message (exposed for the demodulator)
pub fn verify_crc(data: &[u8]) -> bool {
    crc::check_crc(data)
}
