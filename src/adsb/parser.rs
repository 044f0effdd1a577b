//! ADS-B extended squitter parser

use super::crc::{check_crc, get_df, get_icao};
use super::types::{DecodedMessage, DownlinkFormat, MessageKind};
use crate::gdl90::{EmergencyCode, EmitterCategory, TrackType};

/// Callsign character lookup table
const CALLSIGN_CHARS: &[u8; 64] = b"#ABCDEFGHIJKLMNOPQRSTUVWXYZ##### ###############0123456789######";

/// Extended squitter length in bytes
pub const LONG_MSG_BYTES: usize = 14;

/// Parse error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    InvalidLength,
    CrcError,
    UnsupportedFormat,
}

/// Parse a 112-bit DF17/DF18 message
pub fn parse_message(msg: &[u8]) -> Result<DecodedMessage, ParseError> {
    if msg.len() != LONG_MSG_BYTES {
        return Err(ParseError::InvalidLength);
    }

    let df = get_df(msg);
    if DownlinkFormat::from(df) == DownlinkFormat::Unknown {
        return Err(ParseError::UnsupportedFormat);
    }

    if !check_crc(msg) {
        return Err(ParseError::CrcError);
    }

    let tc = (msg[4] >> 3) & 0x1F;
    let kind = match tc {
        1..=4 => MessageKind::Identification {
            callsign: decode_callsign(msg),
            emitter: decode_emitter(tc, msg[4] & 0x07),
        },
        9..=18 | 20..=22 => decode_airborne_position(msg, tc),
        19 => decode_airborne_velocity(msg),
        28 if msg[4] & 0x07 == 1 => MessageKind::Emergency {
            code: EmergencyCode::try_from(msg[5] >> 5).unwrap_or_default(),
        },
        // NACp is only defined from version 1 on
        31 if msg[9] >> 5 >= 1 => MessageKind::OperationalStatus {
            nacp: msg[9] & 0x0F,
        },
        _ => MessageKind::Other,
    };

    Ok(DecodedMessage {
        icao: get_icao(msg),
        df,
        capability: msg[0] & 0x07,
        tc,
        kind,
    })
}

/// Map the ADS-B category set (TC 4 = A, 3 = B, 2 = C) onto GDL90 codes
fn decode_emitter(tc: u8, category: u8) -> EmitterCategory {
    if category == 0 || !(2..=4).contains(&tc) {
        return EmitterCategory::NoInfo;
    }
    EmitterCategory::try_from((4 - tc) * 8 + category).unwrap_or_default()
}

/// Decode altitude from 12-bit AC code
fn decode_ac12_altitude(ac12: u16) -> Option<i32> {
    let q_bit = (ac12 >> 4) & 1;

    if q_bit == 1 {
        let n = ((ac12 & 0x0FE0) >> 1) | (ac12 & 0x000F);
        Some(n as i32 * 25 - 1000)
    } else {
        // Gillham-coded 100 ft altitudes are not decoded
        None
    }
}

/// Decode callsign from type codes 1-4
fn decode_callsign(msg: &[u8]) -> String {
    let mut chars = [0u8; 8];

    // Extract 6-bit character codes from ME field
    chars[0] = (msg[5] >> 2) & 0x3F;
    chars[1] = ((msg[5] & 0x03) << 4) | ((msg[6] >> 4) & 0x0F);
    chars[2] = ((msg[6] & 0x0F) << 2) | ((msg[7] >> 6) & 0x03);
    chars[3] = msg[7] & 0x3F;
    chars[4] = (msg[8] >> 2) & 0x3F;
    chars[5] = ((msg[8] & 0x03) << 4) | ((msg[9] >> 4) & 0x0F);
    chars[6] = ((msg[9] & 0x0F) << 2) | ((msg[10] >> 6) & 0x03);
    chars[7] = msg[10] & 0x3F;

    let callsign: String = chars
        .iter()
        .map(|&c| CALLSIGN_CHARS[c as usize] as char)
        .collect();

    callsign.trim_end().to_string()
}

/// NIC implied by the position type code (NIC supplements assumed zero)
fn nic_from_type_code(tc: u8) -> u8 {
    match tc {
        9 | 20 => 11,
        10 | 21 => 10,
        11 => 8,
        12 => 7,
        13 => 6,
        14 => 5,
        15 => 4,
        16 => 2,
        17 => 1,
        _ => 0,
    }
}

/// Decode airborne position (type codes 9-18, 20-22)
fn decode_airborne_position(msg: &[u8], tc: u8) -> MessageKind {
    let gnss = tc >= 20;

    // Altitude in bytes 5-6 (12 bits)
    let ac12 = ((msg[5] as u16) << 4) | ((msg[6] >> 4) as u16 & 0x0F);
    let altitude_ft = if gnss {
        // GNSS height is plain metres
        (ac12 != 0).then(|| (ac12 as f64 * 3.28084).round() as i32)
    } else {
        decode_ac12_altitude(ac12)
    };

    // CPR format flag (F): 0 = even, 1 = odd
    let odd = ((msg[6] >> 2) & 1) == 1;

    // CPR latitude (17 bits)
    let lat_cpr = ((msg[6] as u32 & 0x03) << 15) | ((msg[7] as u32) << 7) | ((msg[8] as u32 >> 1) & 0x7F);

    // CPR longitude (17 bits)
    let lon_cpr = ((msg[8] as u32 & 0x01) << 16) | ((msg[9] as u32) << 8) | (msg[10] as u32);

    MessageKind::AirbornePosition {
        altitude_ft,
        lat_cpr,
        lon_cpr,
        odd,
        gnss,
        nic: nic_from_type_code(tc),
    }
}

/// Decode the signed vertical rate shared by all velocity subtypes
fn decode_vertical_rate(msg: &[u8]) -> Option<i32> {
    let vr_sign = ((msg[8] >> 3) & 1) == 1;
    let vr = ((msg[8] as i32 & 0x07) << 6) | ((msg[9] >> 2) as i32 & 0x3F);
    if vr == 0 {
        return None;
    }
    let rate = (vr - 1) * 64;
    Some(if vr_sign { -rate } else { rate })
}

/// Decode airborne velocity (type code 19)
fn decode_airborne_velocity(msg: &[u8]) -> MessageKind {
    let subtype = msg[4] & 0x07;
    let vertical_rate_fpm = decode_vertical_rate(msg);

    match subtype {
        1 | 2 => {
            // Ground speed
            let dew = ((msg[5] >> 2) & 1) == 1;
            let vew = ((msg[5] as i32 & 0x03) << 8) | msg[6] as i32;
            let dns = ((msg[7] >> 7) & 1) == 1;
            let vns = ((msg[7] as i32 & 0x7F) << 3) | ((msg[8] >> 5) as i32 & 0x07);

            let (speed_kts, heading_deg) = if vew > 0 && vns > 0 {
                let multiplier = if subtype == 2 { 4 } else { 1 };
                let mut v_ew = (vew - 1) * multiplier;
                let mut v_ns = (vns - 1) * multiplier;

                if dew {
                    v_ew = -v_ew;
                }
                if dns {
                    v_ns = -v_ns;
                }

                let speed = ((v_ew * v_ew + v_ns * v_ns) as f64).sqrt();
                let mut heading = (v_ew as f64).atan2(v_ns as f64).to_degrees();
                if heading < 0.0 {
                    heading += 360.0;
                }
                (Some(speed), Some(heading))
            } else {
                (None, None)
            };

            MessageKind::Velocity {
                speed_kts,
                heading_deg,
                track_type: TrackType::TrueTrack,
                vertical_rate_fpm,
            }
        }
        3 | 4 => {
            // Airspeed
            let hdg_avail = ((msg[5] >> 2) & 1) == 1;
            let hdg = ((msg[5] as u16 & 0x03) << 8) | msg[6] as u16;

            let airspeed = ((msg[7] as u16 & 0x7F) << 3) | ((msg[8] >> 5) as u16 & 0x07);
            let speed_kts = (airspeed > 0).then(|| {
                let multiplier = if subtype == 4 { 4 } else { 1 };
                ((airspeed - 1) * multiplier) as f64
            });

            MessageKind::Velocity {
                speed_kts,
                heading_deg: hdg_avail.then(|| hdg as f64 * 360.0 / 1024.0),
                track_type: if hdg_avail {
                    TrackType::MagHeading
                } else {
                    TrackType::NotValid
                },
                vertical_rate_fpm,
            }
        }
        _ => MessageKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdl90::AddressType;

    fn parse(frame: &str) -> DecodedMessage {
        parse_message(&hex::decode(frame).unwrap()).unwrap()
    }

    #[test]
    fn test_decode_callsign() {
        let msg = hex::decode("8D4840D6202CC371C32CE0576098").unwrap();
        assert_eq!(decode_callsign(&msg), "KLM1023");
    }

    #[test]
    fn test_parse_identification() {
        let decoded = parse("8D4840D6202CC371C32CE0576098");
        assert_eq!(decoded.df, 17);
        assert_eq!(decoded.icao, 0x4840D6);
        assert_eq!(decoded.tc, 4);
        assert_eq!(decoded.address_type(), AddressType::AdsbIcao);
        assert_eq!(
            decoded.kind,
            MessageKind::Identification {
                callsign: "KLM1023".to_string(),
                emitter: EmitterCategory::NoInfo,
            }
        );
    }

    #[test]
    fn test_parse_airborne_position() {
        match parse("8D40621D58C382D690C8AC2863A7").kind {
            MessageKind::AirbornePosition {
                altitude_ft,
                lat_cpr,
                lon_cpr,
                odd,
                gnss,
                nic,
            } => {
                assert_eq!(altitude_ft, Some(38000));
                assert_eq!(lat_cpr, 93000);
                assert_eq!(lon_cpr, 51372);
                assert!(!odd);
                assert!(!gnss);
                assert_eq!(nic, 11);
            }
            other => panic!("unexpected {:?}", other),
        }

        match parse("8D40621D58C386435CC412692AD6").kind {
            MessageKind::AirbornePosition {
                lat_cpr, lon_cpr, odd, ..
            } => {
                assert_eq!((lat_cpr, lon_cpr), (74158, 50194));
                assert!(odd);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_ground_speed() {
        match parse("8D485020994409940838175B284F").kind {
            MessageKind::Velocity {
                speed_kts,
                heading_deg,
                track_type,
                vertical_rate_fpm,
            } => {
                assert!((speed_kts.unwrap() - 159.20).abs() < 0.01);
                assert!((heading_deg.unwrap() - 182.88).abs() < 0.01);
                assert_eq!(track_type, TrackType::TrueTrack);
                assert_eq!(vertical_rate_fpm, Some(-832));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_airspeed() {
        match parse("8DA05F219B06B6AF189400CBC33F").kind {
            MessageKind::Velocity {
                speed_kts,
                heading_deg,
                track_type,
                vertical_rate_fpm,
            } => {
                assert_eq!(speed_kts, Some(375.0));
                assert!((heading_deg.unwrap() - 243.98).abs() < 0.01);
                assert_eq!(track_type, TrackType::MagHeading);
                assert_eq!(vertical_rate_fpm, Some(-2304));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects() {
        let mut msg = hex::decode("8D4840D6202CC371C32CE0576098").unwrap();
        assert_eq!(parse_message(&msg[..7]), Err(ParseError::InvalidLength));

        msg[8] ^= 0x01;
        assert_eq!(parse_message(&msg), Err(ParseError::CrcError));

        msg[0] = 0xA8; // DF21
        assert_eq!(parse_message(&msg), Err(ParseError::UnsupportedFormat));
    }

    #[test]
    fn test_emitter_mapping() {
        assert_eq!(decode_emitter(4, 3), EmitterCategory::Large);
        assert_eq!(decode_emitter(4, 7), EmitterCategory::Rotorcraft);
        assert_eq!(decode_emitter(3, 1), EmitterCategory::Glider);
        assert_eq!(decode_emitter(3, 6), EmitterCategory::Uav);
        assert_eq!(decode_emitter(2, 1), EmitterCategory::SurfaceEmergencyVehicle);
        assert_eq!(decode_emitter(2, 0), EmitterCategory::NoInfo);
        assert_eq!(decode_emitter(1, 3), EmitterCategory::NoInfo);
        // B5 is reserved
        assert_eq!(decode_emitter(3, 5), EmitterCategory::NoInfo);
    }

    #[test]
    fn test_nic_from_type_code() {
        assert_eq!(nic_from_type_code(9), 11);
        assert_eq!(nic_from_type_code(12), 7);
        assert_eq!(nic_from_type_code(18), 0);
        assert_eq!(nic_from_type_code(21), 10);
    }
}
