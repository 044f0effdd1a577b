//! Mode S preamble detection and frame extraction
//!
//! Mode S preamble pattern (at 2 MSPS = 0.5µs per sample):
//! Pulse at 0, 1, 3.5, 4.5 µs → samples 0, 2, 7, 9
//! Each pulse is 0.5µs = 1 sample wide
//!
//! Frame structure:
//! - Preamble: 8µs (16 samples)
//! - Data: 112 bits at 1µs per bit = 2 samples per bit
//!
//! Only extended squitters (DF17/DF18) are kept; they are the only
//! formats whose parity can be checked without knowing the address.

use tracing::{debug, info, trace};

use super::demod::{magnitude_table, AdsbFrame, Demodulator, Frame};
use crate::adsb::verify_crc;

// Mode S preamble timing (in samples at 2 MSPS)
const PREAMBLE_SAMPLES: usize = 16;
const LONG_FRAME_BITS: usize = 112;
const SAMPLES_PER_BIT: usize = 2;

/// Samples a candidate preamble needs after its start
pub const FRAME_SAMPLES: usize = PREAMBLE_SAMPLES + LONG_FRAME_BITS * SAMPLES_PER_BIT;

/// Lowest-confidence bits tried in pairs during 2-bit correction
const TWO_BIT_CANDIDATES: usize = 30;

#[derive(Debug, Default, Clone)]
pub struct DetectorStats {
    pub samples_processed: u64,
    pub preambles_detected: u64,
    pub frames_decoded: u64,
    pub crc_errors: u64,
    pub corrected_frames: u64,
}

/// 1090 MHz Mode S demodulator
pub struct ModeSDemodulator {
    /// Minimum signal level to consider (noise floor threshold)
    min_signal: u16,
    stats: DetectorStats,
    /// Adaptive noise floor (moving average)
    noise_floor: u32,
    /// Noise floor sample count for moving average
    noise_samples: u64,
}

impl ModeSDemodulator {
    pub fn new() -> Self {
        Self {
            min_signal: 10,
            stats: DetectorStats::default(),
            noise_floor: 0,
            noise_samples: 0,
        }
    }

    /// Fold this buffer into the noise floor and return the detection threshold
    fn update_noise_floor(&mut self, mag: &[u16]) -> u16 {
        // Sample sparsely to save CPU
        let sample_step = 1000.min(mag.len() / 100).max(1);
        let (sum, count) = mag
            .iter()
            .step_by(sample_step)
            .fold((0u64, 0u64), |(sum, count), &m| (sum + m as u64, count + 1));

        if count > 0 {
            let buffer_avg = (sum / count) as u32;
            // Exponential moving average: new_avg = 0.9 * old_avg + 0.1 * new_sample
            if self.noise_samples == 0 {
                self.noise_floor = buffer_avg;
            } else {
                self.noise_floor = (self.noise_floor * 9 + buffer_avg) / 10;
            }
            self.noise_samples += 1;
        }

        // Adaptive threshold: 4x noise floor, never below the configured minimum
        (self.noise_floor * 4).max(self.min_signal as u32).min(u16::MAX as u32) as u16
    }

    /// Detect Mode S preamble with adaptive threshold and correlation scoring
    fn detect_preamble(&self, mag: &[u16], pos: usize, threshold: u16) -> bool {
        if pos + PREAMBLE_SAMPLES > mag.len() {
            return false;
        }

        let p0 = mag[pos] as i32;
        let p1 = mag[pos + 2] as i32;
        let p2 = mag[pos + 7] as i32;
        let p3 = mag[pos + 9] as i32;

        // Quiet periods between and after the pulses
        let s1 = mag[pos + 1] as i32;
        let s2 = mag[pos + 3] as i32;
        let s3 = mag[pos + 4] as i32;
        let s4 = mag[pos + 5] as i32;
        let s5 = mag[pos + 6] as i32;
        let s6 = mag[pos + 8] as i32;
        let s7 = mag[pos + 10] as i32;

        let pulse_sum = p0 + p1 + p2 + p3;
        let space_sum = s1 + s2 + s3 + s4 + s5 + s6 + s7;

        // Correlation against [1, 0, 1, 0, 0, 0, 0, 1, 0, 1, 0]
        if pulse_sum - space_sum < threshold as i32 * 3 {
            return false;
        }

        if pulse_sum <= space_sum * 3 {
            return false;
        }

        let high = p0.max(p1).max(p2).max(p3);
        if high < threshold as i32 {
            return false;
        }

        // Pulses within 3x of each other
        let low_pulse = p0.min(p1).min(p2).min(p3);
        if low_pulse * 3 < high {
            return false;
        }

        // Space max below 2/3 of pulse min
        let space_max = s1.max(s2).max(s3).max(s4).max(s5).max(s6).max(s7);
        if space_max * 3 > low_pulse * 2 {
            return false;
        }

        // Quiet zone after the preamble (samples 11-15)
        let quiet_zone_avg = mag[pos + 11..pos + 16].iter().map(|&m| m as i32).sum::<i32>() / 5;
        quiet_zone_avg <= pulse_sum / 4
    }

    /// Decode a frame starting at preamble position
    fn decode_frame(&mut self, mag: &[u16], preamble_pos: usize, offset: u64) -> Option<AdsbFrame> {
        let data_start = preamble_pos + PREAMBLE_SAMPLES;
        if data_start + LONG_FRAME_BITS * SAMPLES_PER_BIT > mag.len() {
            return None;
        }

        // Signal level from the preamble pulses
        let signal_level = ((mag[preamble_pos] as u32
            + mag[preamble_pos + 2] as u32
            + mag[preamble_pos + 7] as u32
            + mag[preamble_pos + 9] as u32)
            / 4) as u16;
        let timestamp = offset + preamble_pos as u64;

        let (bytes, confidence) = extract_bits(mag, data_start, LONG_FRAME_BITS);
        if verify_crc(&bytes) {
            return Some(AdsbFrame {
                timestamp,
                payload: bytes,
                errors: 0,
                signal_level,
            });
        }

        if let Some((corrected, errors)) = try_bit_correction(&bytes, &confidence) {
            self.stats.corrected_frames += 1;
            trace!("Corrected {}-bit error in long frame", errors);
            return Some(AdsbFrame {
                timestamp,
                payload: corrected,
                errors,
                signal_level,
            });
        }

        self.stats.crc_errors += 1;
        // Sampled so a noisy band does not flood the log
        if self.stats.crc_errors <= 10 || self.stats.crc_errors % 50 == 0 {
            let low_confidence_bits = confidence.iter().filter(|&&c| c < 5).count();
            debug!(
                "CRC error #{}: DF={} signal={} low_bits={} hex={}",
                self.stats.crc_errors,
                (bytes[0] >> 3) & 0x1F,
                signal_level,
                low_confidence_bits,
                hex::encode(&bytes)
            );
        }
        None
    }
}

impl Default for ModeSDemodulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Demodulator for ModeSDemodulator {
    fn convert(&self, raw: &[u8], out: &mut [u16]) {
        magnitude_table().compute_magnitudes(raw, out);
    }

    fn process(&mut self, samples: &[u16], offset: u64, sink: &mut dyn FnMut(Frame)) -> usize {
        // Keep enough lookahead that a preamble near the end is seen whole
        let scan_limit = match samples.len().checked_sub(FRAME_SAMPLES) {
            Some(limit) if limit > 0 => limit,
            _ => return 0,
        };

        let threshold = self.update_noise_floor(samples);
        let mut i = 0;

        while i < scan_limit {
            if self.detect_preamble(samples, i, threshold) {
                self.stats.preambles_detected += 1;

                if let Some(frame) = self.decode_frame(samples, i, offset) {
                    trace!("Frame detected at sample {}: hex={}", frame.timestamp, frame.to_hex());
                    self.stats.frames_decoded += 1;
                    sink(Frame::Adsb(frame));

                    // Skip past this frame
                    i += FRAME_SAMPLES;
                    continue;
                }
            }
            i += 1;
        }

        self.stats.samples_processed += i as u64;
        i
    }

    fn log_stats(&self) {
        info!(
            "[Mode S] Samples: {} | Preambles: {} | Frames: {} (corrected {}) | CRC errors: {} | Noise floor: {}",
            self.stats.samples_processed,
            self.stats.preambles_detected,
            self.stats.frames_decoded,
            self.stats.corrected_frames,
            self.stats.crc_errors,
            self.noise_floor
        );
    }
}

/// Extract bits with confidence values for error correction
///
/// Manchester coding, 2 samples per bit: high-low = 1, low-high = 0.
/// `confidence[i]` is the magnitude difference between the two halves.
fn extract_bits(mag: &[u16], start: usize, num_bits: usize) -> (Vec<u8>, Vec<i32>) {
    let mut bytes = vec![0u8; num_bits.div_ceil(8)];
    let mut confidence = vec![0i32; num_bits];

    for (bit_idx, conf) in confidence.iter_mut().enumerate() {
        let sample_pos = start + bit_idx * SAMPLES_PER_BIT;
        let diff = mag[sample_pos] as i32 - mag[sample_pos + 1] as i32;
        *conf = diff.abs();

        if diff > 0 {
            bytes[bit_idx / 8] |= 1 << (7 - (bit_idx % 8));
        }
    }

    (bytes, confidence)
}

fn flip_bit(bytes: &mut [u8], bit_idx: usize) {
    bytes[bit_idx / 8] ^= 1 << (7 - (bit_idx % 8));
}

/// Try single-bit, then 2-bit repair over the weakest bits.
/// Returns the repaired frame and the number of bits flipped.
fn try_bit_correction(bytes: &[u8], confidence: &[i32]) -> Option<(Vec<u8>, u32)> {
    let num_bits = confidence.len();

    let mut test_bytes = bytes.to_vec();
    for bit_idx in 0..num_bits {
        flip_bit(&mut test_bytes, bit_idx);
        if verify_crc(&test_bytes) {
            return Some((test_bytes, 1));
        }
        flip_bit(&mut test_bytes, bit_idx);
    }

    let mut indices: Vec<usize> = (0..num_bits).collect();
    indices.sort_by_key(|&i| confidence[i]);
    let candidates = &indices[..TWO_BIT_CANDIDATES.min(num_bits)];

    for (n, &first) in candidates.iter().enumerate() {
        for &second in &candidates[n + 1..] {
            flip_bit(&mut test_bytes, first);
            flip_bit(&mut test_bytes, second);
            if verify_crc(&test_bytes) {
                return Some((test_bytes, 2));
            }
            flip_bit(&mut test_bytes, first);
            flip_bit(&mut test_bytes, second);
        }
    }

    None
}
