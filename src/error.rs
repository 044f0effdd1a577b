//! Error types shared by the codec and the capture pipeline

use thiserror::Error;

/// Errors raised while bringing up or running a capture pipeline.
///
/// None of these abort the process: the lifecycle logs them and runs
/// with the affected receiver disabled.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no tuner with serial '{0}' is attached")]
    DeviceNotFound(String),

    #[error("failed to open tuner '{serial}': {source}")]
    DeviceOpen {
        serial: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tuner read failed {attempts} times in a row: {source}")]
    HardwareRead {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn capture thread: {0}")]
    ThreadCreate(#[source] std::io::Error),
}

/// Errors raised by the GDL90 codec and framing layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("payload too short: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("{field} value {value} is out of range")]
    OutOfRange { field: &'static str, value: u32 },

    #[error("CRC mismatch: computed {computed:#06x}, frame carries {received:#06x}")]
    Crc { computed: u16, received: u16 },

    #[error("malformed frame: {0}")]
    Framing(&'static str),
}
