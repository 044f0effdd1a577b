//! RTL-SDR capture and demodulation
//!
//! 1. Stream raw IQ samples from the tuner on a dedicated worker thread
//! 2. Convert each sample into the demodulator's representation
//! 3. Demodulate, carrying unconsumed samples over to the next read
//! 4. Hand every frame to a `FrameSink`

pub mod demod;
mod detect;
pub mod device;
pub mod pipeline;

pub use demod::Frame;
pub use detect::ModeSDemodulator;
pub use device::open_tuner;
pub use pipeline::{spawn_worker, CaptureContext, FrameSink, PipelineState, WorkerSettings};
