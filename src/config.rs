//! Configuration loaded from environment variables

use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Serial number of the tuner to open (exact match)
    pub tuner_serial: String,

    /// Center frequency in Hz
    pub center_freq_hz: u32,

    /// Sample rate in samples per second
    pub sample_rate: u32,

    /// Manual tuner gain in dB
    pub gain_db: f32,

    /// Path to the rtl_sdr executable
    pub rtl_sdr_path: PathBuf,

    /// Consecutive failed reads tolerated before the worker gives up
    pub read_retry_limit: u32,

    /// Capture buffer size in bytes
    pub capture_buffer_bytes: usize,

    /// Aircraft tracked at once by the ADS-B decoder
    pub max_aircraft: usize,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    parse_or(std::env::var(name).ok(), default)
}

/// Parse a raw setting, falling back to `default` when absent or malformed
fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            tuner_serial: std::env::var("TUNER_SERIAL").unwrap_or_else(|_| "stx:1090:0".to_string()),

            center_freq_hz: env_or("CENTER_FREQ_HZ", 1_090_000_000),

            sample_rate: env_or("SAMPLE_RATE", 2_000_000), // 2 MSPS (required for Mode S timing)

            gain_db: env_or("TUNER_GAIN_DB", 48.0),

            rtl_sdr_path: std::env::var("RTL_SDR_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("rtl_sdr")),

            read_retry_limit: env_or("READ_RETRY_LIMIT", 5),

            capture_buffer_bytes: env_or("CAPTURE_BUFFER_BYTES", 256 * 1024),

            max_aircraft: env_or("MAX_AIRCRAFT", 256),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back() {
        assert_eq!(env_or("GDL90_RECEIVER_TEST_UNSET_VAR", 7u32), 7);
    }

    #[test]
    fn test_parse_or() {
        assert_eq!(parse_or(Some("42.5".to_string()), 0.0f32), 42.5);
        assert_eq!(parse_or(Some(" 1024 ".to_string()), 0usize), 1024);
        assert_eq!(parse_or(Some("loud".to_string()), 1.0f32), 1.0);
        assert_eq!(parse_or(None, 5u32), 5);
    }
}
