//! GDL90 message codec
//!
//! Bit-packed report payloads, CRC16-CCITT, flag/escape framing and the
//! per-message-type dispatcher.

pub mod crc;
pub mod dispatch;
pub mod fields;
pub mod frame;
pub mod heartbeat;
pub mod traffic;
pub mod types;

pub use dispatch::{dispatch, Dispatched};
pub use frame::Gdl90Message;
pub use traffic::TrafficReport;
pub use types::*;
