//! GDL90 Traffic Report codec (message ID 20, also used by Ownship Report)
//!
//! Payload layout, 27 bytes:
//!
//! ```text
//! byte  0      : [7..4] alert status        [3..0] address type
//! bytes 1-3    : address, 24-bit big-endian
//! bytes 4-6    : latitude, 24-bit signed, COUNTS_TO_DEGREES per count
//! bytes 7-9    : longitude, 24-bit signed, COUNTS_TO_DEGREES per count
//! byte  10     : altitude [11..4]
//! byte  11     : [7..4] altitude [3..0]     [3] airborne [2] report [1..0] track type
//! byte  12     : [7..4] NIC                 [3..0] NACp
//! byte  13     : horizontal velocity [11..4]
//! byte  14     : [7..4] h. velocity [3..0]  [3..0] vertical velocity [11..8]
//! byte  15     : vertical velocity [7..0]
//! byte  16     : track/heading, COUNTS_TO_HEADING per count
//! byte  17     : emitter category
//! bytes 18-25  : callsign, ASCII, space padded
//! byte  26     : [7..4] emergency code      [3..0] spare
//! ```

use std::fmt;

use super::fields::*;
use super::types::*;
use crate::error::CodecError;

/// Encoded payload size (message ID and CRC not included)
pub const TRAFFIC_REPORT_LEN: usize = 27;

/// Degrees per latitude/longitude count (180 / 2^23)
pub const COUNTS_TO_DEGREES: f64 = 180.0 / 8_388_608.0;
/// Altitude field offset in feet
pub const ALTITUDE_OFFSET: f64 = -1000.0;
/// Feet per altitude count
pub const ALTITUDE_FACTOR: f64 = 25.0;
/// Knots per horizontal velocity count
pub const HORZ_VELOCITY_FACTOR: f64 = 1.0;
/// Feet per minute per vertical velocity count
pub const VERT_VELOCITY_FACTOR: f64 = 64.0;
/// Degrees per track/heading count
pub const COUNTS_TO_HEADING: f64 = 360.0 / 256.0;

/// Callsign field width
pub const CALLSIGN_LEN: usize = 8;

/// Altitude field value meaning "no data"
pub const ALTITUDE_UNAVAILABLE: u16 = 0xFFF;
/// Horizontal velocity field value meaning "no data"
pub const HORZ_VELOCITY_UNAVAILABLE: u16 = 0xFFF;
/// Vertical velocity field value meaning "no data"
pub const VERT_VELOCITY_UNAVAILABLE: u16 = 0x800;

const MAX_ALTITUDE_COUNT: i64 = 0xFFE;
const MAX_HORZ_VELOCITY_COUNT: i64 = 0xFFE;
const MAX_VERT_VELOCITY_COUNT: i64 = 0x7FF;
const MAX_ADDRESS: u32 = 0xFF_FFFF;
const MIN_I24: i64 = -0x80_0000;
const MAX_I24: i64 = 0x7F_FFFF;

/// Decoded Traffic Report
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrafficReport {
    pub alert_status: AlertStatus,
    pub address_type: AddressType,
    /// ICAO or track-file address, 24 bits
    pub address: u32,
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
    /// Pressure altitude in feet, `None` when unknown
    pub altitude_ft: Option<f64>,
    pub airborne: bool,
    pub report_type: ReportType,
    pub track_type: TrackType,
    /// Navigation Integrity Category (0-11)
    pub nic: u8,
    /// Navigation Accuracy Category for Position (0-11)
    pub nacp: u8,
    /// Horizontal velocity in knots, `None` when unknown
    pub horizontal_velocity_kt: Option<f64>,
    /// Vertical velocity in feet per minute, `None` when unknown
    pub vertical_velocity_fpm: Option<f64>,
    /// Track or heading in degrees, meaning given by `track_type`
    pub heading_deg: f64,
    pub emitter: EmitterCategory,
    /// Callsign without trailing padding
    pub callsign: String,
    pub emergency: EmergencyCode,
}

/// Pack a report into its 27-byte payload
///
/// Scaled numeric fields are clamped into their field width; unknown
/// altitude and velocities are sent as the "no data" codes. Values the
/// field cannot carry at all (address wider than 24 bits, undefined NIC/NACp,
/// non-ASCII or overlong callsign) are rejected.
pub fn encode(report: &TrafficReport) -> Result<[u8; TRAFFIC_REPORT_LEN], CodecError> {
    let mut buf = [0u8; TRAFFIC_REPORT_LEN];

    if report.address > MAX_ADDRESS {
        return Err(CodecError::OutOfRange {
            field: "address",
            value: report.address,
        });
    }
    check_confidence("nic", report.nic)?;
    check_confidence("nacp", report.nacp)?;

    put_hi_nibble(&mut buf[0], report.alert_status as u8);
    put_lo_nibble(&mut buf[0], report.address_type as u8);
    put_u24(&mut buf[1..4], report.address);

    put_i24(&mut buf[4..7], encode_degrees(report.latitude));
    put_i24(&mut buf[7..10], encode_degrees(report.longitude));

    let altitude = report.altitude_ft.map_or(ALTITUDE_UNAVAILABLE, encode_altitude);
    put_u12_hi(&mut buf[10..12], altitude);
    put_lo_nibble(&mut buf[11], encode_misc(report));

    put_hi_nibble(&mut buf[12], report.nic);
    put_lo_nibble(&mut buf[12], report.nacp);

    let horizontal = report
        .horizontal_velocity_kt
        .map_or(HORZ_VELOCITY_UNAVAILABLE, encode_horizontal_velocity);
    let vertical = report
        .vertical_velocity_fpm
        .map_or(VERT_VELOCITY_UNAVAILABLE, encode_vertical_velocity);
    put_u12_hi(&mut buf[13..15], horizontal);
    put_u12_lo(&mut buf[14..16], vertical);

    buf[16] = encode_heading(report.heading_deg);
    buf[17] = report.emitter as u8;
    buf[18..26].copy_from_slice(&encode_callsign(&report.callsign)?);
    put_hi_nibble(&mut buf[26], report.emergency as u8);

    Ok(buf)
}

/// Unpack a 27-byte payload
///
/// Undefined enumerated codes and NIC/NACp above 11 are rejected.
pub fn decode(payload: &[u8]) -> Result<TrafficReport, CodecError> {
    if payload.len() < TRAFFIC_REPORT_LEN {
        return Err(CodecError::Length {
            expected: TRAFFIC_REPORT_LEN,
            actual: payload.len(),
        });
    }

    let misc = get_lo_nibble(payload[11]);
    let nic = get_hi_nibble(payload[12]);
    let nacp = get_lo_nibble(payload[12]);
    check_confidence("nic", nic)?;
    check_confidence("nacp", nacp)?;

    Ok(TrafficReport {
        alert_status: AlertStatus::try_from(get_hi_nibble(payload[0]))?,
        address_type: AddressType::try_from(get_lo_nibble(payload[0]))?,
        address: get_u24(&payload[1..4]),
        latitude: decode_degrees(get_i24(&payload[4..7])),
        longitude: decode_degrees(get_i24(&payload[7..10])),
        altitude_ft: decode_altitude(get_u12_hi(&payload[10..12])),
        airborne: misc & 0x08 != 0,
        report_type: ReportType::from_bit(misc & 0x04 != 0),
        track_type: TrackType::from_bits(misc),
        nic,
        nacp,
        horizontal_velocity_kt: decode_horizontal_velocity(get_u12_hi(&payload[13..15])),
        vertical_velocity_fpm: decode_vertical_velocity(get_u12_lo(&payload[14..16])),
        heading_deg: payload[16] as f64 * COUNTS_TO_HEADING,
        emitter: EmitterCategory::try_from(payload[17])?,
        callsign: decode_callsign(&payload[18..26])?,
        emergency: EmergencyCode::try_from(get_hi_nibble(payload[26]))?,
    })
}

fn check_confidence(field: &'static str, code: u8) -> Result<(), CodecError> {
    if code > MAX_CONFIDENCE_CODE {
        return Err(CodecError::OutOfRange {
            field,
            value: code as u32,
        });
    }
    Ok(())
}

/// Low nibble of byte 11: airborne, report type, track type
fn encode_misc(report: &TrafficReport) -> u8 {
    let mut misc = report.track_type as u8 & 0x03;
    if report.report_type.is_extrapolated() {
        misc |= 0x04;
    }
    if report.airborne {
        misc |= 0x08;
    }
    misc
}

/// Bytes 4-6 / 7-9
pub fn encode_degrees(degrees: f64) -> i32 {
    let count = (degrees / COUNTS_TO_DEGREES).round() as i64;
    count.clamp(MIN_I24, MAX_I24) as i32
}

pub fn decode_degrees(count: i32) -> f64 {
    count as f64 * COUNTS_TO_DEGREES
}

/// Byte 10 and high nibble of byte 11
pub fn encode_altitude(altitude_ft: f64) -> u16 {
    let count = ((altitude_ft - ALTITUDE_OFFSET) / ALTITUDE_FACTOR).round() as i64;
    count.clamp(0, MAX_ALTITUDE_COUNT) as u16
}

pub fn decode_altitude(count: u16) -> Option<f64> {
    (count != ALTITUDE_UNAVAILABLE).then(|| count as f64 * ALTITUDE_FACTOR + ALTITUDE_OFFSET)
}

/// Byte 13 and high nibble of byte 14
pub fn encode_horizontal_velocity(knots: f64) -> u16 {
    let count = (knots / HORZ_VELOCITY_FACTOR).round() as i64;
    count.clamp(0, MAX_HORZ_VELOCITY_COUNT) as u16
}

pub fn decode_horizontal_velocity(count: u16) -> Option<f64> {
    (count != HORZ_VELOCITY_UNAVAILABLE).then(|| count as f64 * HORZ_VELOCITY_FACTOR)
}

/// Low nibble of byte 14 and byte 15, two's complement
pub fn encode_vertical_velocity(fpm: f64) -> u16 {
    let count = (fpm / VERT_VELOCITY_FACTOR).round() as i64;
    to_u12(count.clamp(-MAX_VERT_VELOCITY_COUNT, MAX_VERT_VELOCITY_COUNT) as i16)
}

pub fn decode_vertical_velocity(count: u16) -> Option<f64> {
    (count != VERT_VELOCITY_UNAVAILABLE).then(|| sign_extend_12(count) as f64 * VERT_VELOCITY_FACTOR)
}

/// Byte 16, wraps at 360 degrees
pub fn encode_heading(degrees: f64) -> u8 {
    ((degrees / COUNTS_TO_HEADING).round() as i64).rem_euclid(256) as u8
}

/// Bytes 18-25
pub fn encode_callsign(callsign: &str) -> Result<[u8; CALLSIGN_LEN], CodecError> {
    if callsign.len() > CALLSIGN_LEN || !callsign.bytes().all(|c| c.is_ascii_graphic() || c == b' ') {
        return Err(CodecError::OutOfRange {
            field: "callsign",
            value: callsign.len() as u32,
        });
    }

    let mut out = [b' '; CALLSIGN_LEN];
    out[..callsign.len()].copy_from_slice(callsign.as_bytes());
    Ok(out)
}

pub fn decode_callsign(bytes: &[u8]) -> Result<String, CodecError> {
    if let Some(&bad) = bytes.iter().find(|&&c| !(c.is_ascii_graphic() || c == b' ')) {
        return Err(CodecError::OutOfRange {
            field: "callsign",
            value: bad as u32,
        });
    }
    // Every byte is ASCII at this point
    let callsign: String = bytes.iter().map(|&c| c as char).collect();
    Ok(callsign.trim_end().to_string())
}

impl fmt::Display for TrafficReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let caption = match self.track_type {
            TrackType::NotValid => "Track/Heading",
            TrackType::TrueTrack => "True Track",
            TrackType::MagHeading => "Magnetic Heading",
            TrackType::TrueHeading => "True Heading",
        };

        writeln!(f, "  Alert Status:     {}", self.alert_status)?;
        writeln!(f, "  Address Type:     {}", self.address_type)?;
        writeln!(f, "  Address:          {:08o} (octal)", self.address)?;
        writeln!(f, "  Latitude:         {:.5}", self.latitude)?;
        writeln!(f, "  Longitude:        {:.5}", self.longitude)?;
        match self.altitude_ft {
            Some(alt) => writeln!(f, "  Altitude:         {:.0} ft", alt)?,
            None => writeln!(f, "  Altitude:         unavailable")?,
        }
        writeln!(
            f,
            "  Airborne:         {} ({})",
            if self.airborne { "Airborne" } else { "On Ground" },
            self.track_type
        )?;
        writeln!(f, "  Report Type:      {}", self.report_type)?;
        writeln!(f, "  NIC:              {} ({})", self.nic, nic_description(self.nic))?;
        writeln!(f, "  NACp:             {} ({})", self.nacp, nacp_description(self.nacp))?;
        match self.horizontal_velocity_kt {
            Some(kt) => writeln!(f, "  Horiz. Velocity:  {:.0} kt", kt)?,
            None => writeln!(f, "  Horiz. Velocity:  unavailable")?,
        }
        match self.vertical_velocity_fpm {
            Some(fpm) => writeln!(f, "  Vert. Velocity:   {:.0} fpm", fpm)?,
            None => writeln!(f, "  Vert. Velocity:   unavailable")?,
        }
        writeln!(f, "  {:<18}{:.1} deg", format!("{}:", caption), self.heading_deg)?;
        writeln!(f, "  Emergency:        {}", self.emergency)?;
        writeln!(f, "  Emitter:          {}", self.emitter)?;
        write!(f, "  Callsign:         {}", self.callsign)
    }
}
