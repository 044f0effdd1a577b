//! Message dispatcher - routes a GDL90 message by its ID byte
//!
//! Traffic and ownship reports are printed to stdout; everything else is
//! logged. Nothing is kept between messages.

use tracing::{debug, info, warn};

use super::frame::Gdl90Message;
use super::heartbeat::Heartbeat;
use super::traffic::{self, TrafficReport};
use super::types::MessageId;
use crate::error::CodecError;

/// Outcome of routing one message
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    Traffic(TrafficReport),
    Ownship(TrafficReport),
    /// `None` when the heartbeat payload was too short to decode
    Heartbeat(Option<Heartbeat>),
    Uplink { len: usize },
    Unknown(u8),
    Rejected { id: u8, error: CodecError },
}

/// Decode a message without producing any output
pub fn route(msg: &Gdl90Message) -> Dispatched {
    match msg.message_id() {
        MessageId::TrafficReport => match traffic::decode(&msg.payload) {
            Ok(report) => Dispatched::Traffic(report),
            Err(error) => Dispatched::Rejected { id: msg.id, error },
        },
        MessageId::OwnshipReport => match traffic::decode(&msg.payload) {
            Ok(report) => Dispatched::Ownship(report),
            Err(error) => Dispatched::Rejected { id: msg.id, error },
        },
        MessageId::Heartbeat => Dispatched::Heartbeat(Heartbeat::decode(&msg.payload).ok()),
        MessageId::UplinkData => Dispatched::Uplink {
            len: msg.payload.len(),
        },
        _ => Dispatched::Unknown(msg.id),
    }
}

/// Route a message and print or log the result
pub fn dispatch(msg: &Gdl90Message) -> Dispatched {
    let outcome = route(msg);

    match &outcome {
        Dispatched::Traffic(report) => {
            println!("{}", render("Traffic Report", report));
        }
        Dispatched::Ownship(report) => {
            println!("{}", render("Ownship Report", report));
        }
        Dispatched::Heartbeat(Some(hb)) => info!("Heartbeat received: {}", hb),
        Dispatched::Heartbeat(None) => info!("Heartbeat received"),
        Dispatched::Uplink { len } => debug!("Uplink data received ({} bytes)", len),
        Dispatched::Unknown(id) => info!("Unknown message type: {}", id),
        Dispatched::Rejected { id, error } => {
            warn!("Dropping message type {}: {}", id, error);
        }
    }

    outcome
}

/// Console block for one report
pub fn render(title: &str, report: &TrafficReport) -> String {
    format!(
        "=== {} @ {} ===\n{}",
        title,
        chrono::Utc::now().format("%H:%M:%S%.3fZ"),
        report
    )
}
