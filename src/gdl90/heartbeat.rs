//! GDL90 Heartbeat (message ID 0)

use std::fmt;

use crate::error::CodecError;

/// Payload size without message ID and CRC
pub const HEARTBEAT_LEN: usize = 6;

/// Decoded heartbeat status
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Heartbeat {
    pub gps_position_valid: bool,
    pub maintenance_required: bool,
    pub gps_battery_low: bool,
    pub uat_initialized: bool,
    pub utc_ok: bool,
    /// Seconds since 0000Z, 17 bits
    pub timestamp_secs: u32,
    /// Uplink messages received in the last second
    pub uplink_count: u8,
    /// Basic and Long reports received in the last second
    pub report_count: u16,
}

impl Heartbeat {
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        if payload.len() < HEARTBEAT_LEN {
            return Err(CodecError::Length {
                expected: HEARTBEAT_LEN,
                actual: payload.len(),
            });
        }

        let status1 = payload[0];
        let status2 = payload[1];

        // Timestamp is little-endian, bit 16 lives in status byte 2
        let timestamp_secs = ((status2 as u32 & 0x80) << 9)
            | ((payload[3] as u32) << 8)
            | payload[2] as u32;

        Ok(Self {
            gps_position_valid: status1 & 0x80 != 0,
            maintenance_required: status1 & 0x40 != 0,
            gps_battery_low: status1 & 0x08 != 0,
            uat_initialized: status1 & 0x01 != 0,
            utc_ok: status2 & 0x01 != 0,
            timestamp_secs,
            uplink_count: payload[4] >> 3,
            report_count: ((payload[4] as u16 & 0x03) << 8) | payload[5] as u16,
        })
    }
}

impl fmt::Display for Heartbeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.timestamp_secs;
        write!(
            f,
            "GPS {} | UTC {} | {:02}:{:02}:{:02}Z | uplinks={} reports={}",
            if self.gps_position_valid { "valid" } else { "invalid" },
            if self.utc_ok { "ok" } else { "not ok" },
            t / 3600,
            (t / 60) % 60,
            t % 60,
            self.uplink_count,
            self.report_count
        )
    }
}
