//! Demodulator boundary and I/Q sample conversion
//!
//! RTL-SDR outputs 8-bit unsigned IQ samples (I, Q pairs). A demodulator
//! first converts them into its own per-sample representation, then scans
//! the converted samples for frames.

use std::sync::OnceLock;

/// Bytes per complex sample (one I byte, one Q byte)
pub const BYTES_PER_SAMPLE: usize = 2;

static MAGNITUDE_TABLE: OnceLock<MagnitudeTable> = OnceLock::new();

/// Build the process-wide lookup tables ahead of the first buffer
pub fn init() {
    magnitude_table();
}

/// Shared magnitude table, built on first use
pub fn magnitude_table() -> &'static MagnitudeTable {
    MAGNITUDE_TABLE.get_or_init(MagnitudeTable::new)
}

/// A 1090 MHz extended squitter that passed its parity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdsbFrame {
    /// Absolute sample index of the preamble
    pub timestamp: u64,
    /// Raw bytes (14 for an extended squitter)
    pub payload: Vec<u8>,
    /// Bits repaired before the parity check passed
    pub errors: u32,
    pub signal_level: u16,
}

impl AdsbFrame {
    /// Convert to hex string (like dump1090 output)
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.payload)
    }
}

/// A UAT ground uplink block, FEC already applied
// Produced by UAT demodulators, none of which are built into this binary
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplinkFrame {
    pub timestamp: u64,
    pub payload: Vec<u8>,
    /// Symbols corrected by FEC
    pub errors: u32,
}

/// A frame handed from the demodulator to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Adsb(AdsbFrame),
    #[allow(dead_code)] // no in-tree UAT demodulator
    Uplink(UplinkFrame),
}

/// A demodulator driven by the capture worker
pub trait Demodulator: Send {
    /// Convert whole I/Q pairs from `raw` into `out`, one entry per sample.
    /// `raw.len()` is even and `out.len() == raw.len() / 2`.
    fn convert(&self, raw: &[u8], out: &mut [u16]);

    /// Scan converted samples for frames, calling `sink` once per frame.
    /// `offset` is the absolute index of `samples[0]`.
    ///
    /// Returns how many leading samples are finished with; the rest are
    /// presented again, after newer samples are appended, on the next call.
    fn process(&mut self, samples: &[u16], offset: u64, sink: &mut dyn FnMut(Frame)) -> usize;

    /// Log demodulator-specific counters alongside the worker's stats line
    fn log_stats(&self) {}
}

/// Pre-computed magnitude lookup table for fast IQ → magnitude conversion
/// Index: (I << 8) | Q where I, Q are 0-255
pub struct MagnitudeTable {
    table: Vec<u16>,
}

impl MagnitudeTable {
    /// Create a new magnitude lookup table
    /// Uses the approximation: mag ≈ max(|I|, |Q|) + 0.4 * min(|I|, |Q|)
    pub fn new() -> Self {
        let mut table = vec![0u16; 256 * 256];

        for i in 0..256u32 {
            for q in 0..256u32 {
                // Convert from unsigned (0-255) to signed around 127
                let ai = (i as i32 - 127).unsigned_abs();
                let aq = (q as i32 - 127).unsigned_abs();

                // 102/256 ≈ 0.4
                let mag = if ai > aq {
                    (ai << 8) + (aq * 102)
                } else {
                    (aq << 8) + (ai * 102)
                };

                table[(i * 256 + q) as usize] = (mag >> 8) as u16;
            }
        }

        Self { table }
    }

    /// Convert IQ sample pair to magnitude
    #[inline(always)]
    pub fn magnitude(&self, i: u8, q: u8) -> u16 {
        self.table[((i as usize) << 8) | (q as usize)]
    }

    /// Convert a buffer of IQ pairs to magnitudes
    pub fn compute_magnitudes(&self, iq_data: &[u8], output: &mut [u16]) {
        for (pair, out) in iq_data.chunks_exact(BYTES_PER_SAMPLE).zip(output.iter_mut()) {
            *out = self.magnitude(pair[0], pair[1]);
        }
    }
}

impl Default for MagnitudeTable {
    fn default() -> Self {
        Self::new()
    }
}
