//! Frame sink joining the capture pipeline to the GDL90 codec
//!
//! Every frame is turned into a GDL90 message, framed as it would travel on
//! the wire, parsed back and dispatched.

use tracing::{debug, info, warn};

use crate::adsb::Tracker;
use crate::gdl90::{self, traffic, Dispatched, Gdl90Message, MessageId};
use crate::sdr::{Frame, FrameSink};

pub struct ReportSink {
    tracker: Tracker,
    frames: u64,
    dispatched: u64,
}

impl ReportSink {
    pub fn new(max_aircraft: usize) -> Self {
        Self {
            tracker: Tracker::new(max_aircraft),
            frames: 0,
            dispatched: 0,
        }
    }

    /// Process one frame; `None` when it produced no GDL90 message
    pub fn handle(&mut self, frame: Frame) -> Option<Dispatched> {
        self.frames += 1;

        let message = match frame {
            Frame::Adsb(adsb) => {
                debug!(
                    "ADS-B frame {} at sample {} (signal {}, {} bits corrected)",
                    adsb.to_hex(),
                    adsb.timestamp,
                    adsb.signal_level,
                    adsb.errors
                );
                let report = self.tracker.update(&adsb.payload)?;
                match traffic::encode(&report) {
                    Ok(payload) => Gdl90Message::new(MessageId::TrafficReport, payload.to_vec()),
                    Err(e) => {
                        warn!("Cannot encode report for {:06X}: {}", report.address, e);
                        return None;
                    }
                }
            }
            Frame::Uplink(uplink) => {
                debug!(
                    "Uplink frame at sample {} ({} bytes, {} symbols corrected)",
                    uplink.timestamp,
                    uplink.payload.len(),
                    uplink.errors
                );
                Gdl90Message::new(MessageId::UplinkData, uplink.payload)
            }
        };

        match Gdl90Message::from_frame(&message.to_frame()) {
            Ok(parsed) => {
                self.dispatched += 1;
                Some(gdl90::dispatch(&parsed))
            }
            Err(e) => {
                warn!("Dropping malformed GDL90 frame: {}", e);
                None
            }
        }
    }
}

impl FrameSink for ReportSink {
    fn deliver(&mut self, frame: Frame) {
        self.handle(frame);
    }
}

impl Drop for ReportSink {
    fn drop(&mut self) {
        info!(
            "Report sink: {} frames, {} messages dispatched, {} aircraft tracked",
            self.frames,
            self.dispatched,
            self.tracker.count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdr::demod::{AdsbFrame, UplinkFrame};

    fn adsb(hex_str: &str) -> Frame {
        Frame::Adsb(AdsbFrame {
            timestamp: 0,
            payload: hex::decode(hex_str).unwrap(),
            errors: 0,
            signal_level: 100,
        })
    }

    #[test]
    fn test_position_pair_dispatches_traffic() {
        let mut sink = ReportSink::new(16);

        assert!(sink.handle(adsb("8D4840D6202CC371C32CE0576098")).is_none());
        assert!(sink.handle(adsb("8D40621D58C382D690C8AC2863A7")).is_none());

        match sink.handle(adsb("8D40621D58C386435CC412692AD6")) {
            Some(Dispatched::Traffic(report)) => {
                assert_eq!(report.address, 0x40621D);
                assert!((report.latitude - 52.2658).abs() < 1e-3);
                assert!((report.longitude - 3.9389).abs() < 1e-3);
                assert_eq!(report.altitude_ft, Some(38000.0));
                assert!(report.airborne);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!((sink.frames, sink.dispatched), (3, 1));
    }

    #[test]
    fn test_uplink_dispatched() {
        let mut sink = ReportSink::new(16);
        let frame = Frame::Uplink(UplinkFrame {
            timestamp: 0,
            payload: vec![0x7E; 435],
            errors: 0,
        });
        assert_eq!(sink.handle(frame), Some(Dispatched::Uplink { len: 435 }));
    }

    #[test]
    fn test_corrupt_frame_ignored() {
        let mut sink = ReportSink::new(16);
        sink.deliver(adsb("8D4840D6202CC371C32CE0576099"));
        assert_eq!((sink.frames, sink.dispatched), (1, 0));
    }
}
