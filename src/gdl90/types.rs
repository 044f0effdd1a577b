//! GDL90 message identifiers and enumerated report fields
//!
//! Decoding an enumerated field rejects codes the ICD leaves undefined
//! rather than folding them into a catch-all; see `CodecError::OutOfRange`.

use std::fmt;

use crate::error::CodecError;

/// GDL90 message identifiers (first byte of a message)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageId {
    Heartbeat = 0,
    Initialization = 2,
    UplinkData = 7,
    HeightAboveTerrain = 9,
    OwnshipReport = 10,
    OwnshipGeoAltitude = 11,
    TrafficReport = 20,
    BasicReport = 30,
    LongReport = 31,
    Unknown = 255,
}

impl From<u8> for MessageId {
    fn from(id: u8) -> Self {
        match id {
            0 => Self::Heartbeat,
            2 => Self::Initialization,
            7 => Self::UplinkData,
            9 => Self::HeightAboveTerrain,
            10 => Self::OwnshipReport,
            11 => Self::OwnshipGeoAltitude,
            20 => Self::TrafficReport,
            30 => Self::BasicReport,
            31 => Self::LongReport,
            _ => Self::Unknown,
        }
    }
}

/// Traffic alert status (byte 0, high nibble)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AlertStatus {
    #[default]
    NoAlert = 0,
    TrafficAlert = 1,
}

impl TryFrom<u8> for AlertStatus {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::NoAlert),
            1 => Ok(Self::TrafficAlert),
            _ => Err(out_of_range("alert status", code)),
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoAlert => "No Traffic Alert",
            Self::TrafficAlert => "Traffic Alert",
        })
    }
}

/// Address qualifier (byte 0, low nibble)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AddressType {
    #[default]
    AdsbIcao = 0,
    AdsbSelfAssigned = 1,
    TisbIcao = 2,
    TisbTrackFile = 3,
    SurfaceVehicle = 4,
    GroundStationBeacon = 5,
}

impl TryFrom<u8> for AddressType {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::AdsbIcao),
            1 => Ok(Self::AdsbSelfAssigned),
            2 => Ok(Self::TisbIcao),
            3 => Ok(Self::TisbTrackFile),
            4 => Ok(Self::SurfaceVehicle),
            5 => Ok(Self::GroundStationBeacon),
            _ => Err(out_of_range("address type", code)),
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AdsbIcao => "ADS-B with ICAO address",
            Self::AdsbSelfAssigned => "ADS-B with self-assigned address",
            Self::TisbIcao => "TIS-B with ICAO address",
            Self::TisbTrackFile => "TIS-B with track file ID",
            Self::SurfaceVehicle => "Surface Vehicle",
            Self::GroundStationBeacon => "Ground Station Beacon",
        })
    }
}

/// Report type (byte 11, bit 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportType {
    #[default]
    Updated,
    Extrapolated,
}

impl ReportType {
    pub fn from_bit(extrapolated: bool) -> Self {
        if extrapolated {
            Self::Extrapolated
        } else {
            Self::Updated
        }
    }

    pub fn is_extrapolated(self) -> bool {
        self == Self::Extrapolated
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Updated => "Updated",
            Self::Extrapolated => "Extrapolated",
        })
    }
}

/// Meaning of the track/heading byte (byte 11, bits 1..0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TrackType {
    #[default]
    NotValid = 0,
    TrueTrack = 1,
    MagHeading = 2,
    TrueHeading = 3,
}

impl TrackType {
    /// Two-bit field, every value is defined
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            1 => Self::TrueTrack,
            2 => Self::MagHeading,
            3 => Self::TrueHeading,
            _ => Self::NotValid,
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotValid => "Not Valid",
            Self::TrueTrack => "True Track Angle",
            Self::MagHeading => "Magnetic Heading",
            Self::TrueHeading => "True Heading",
        })
    }
}

/// Emitter category (byte 17)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum EmitterCategory {
    #[default]
    NoInfo = 0,
    Light = 1,
    Small = 2,
    Large = 3,
    HighVortexLarge = 4,
    Heavy = 5,
    HighlyManeuverable = 6,
    Rotorcraft = 7,
    Glider = 9,
    LighterThanAir = 10,
    Parachutist = 11,
    UltraLight = 12,
    Uav = 14,
    SpaceVehicle = 15,
    SurfaceEmergencyVehicle = 17,
    SurfaceServiceVehicle = 18,
    PointObstacle = 19,
    ClusterObstacle = 20,
    LineObstacle = 21,
}

impl TryFrom<u8> for EmitterCategory {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::NoInfo,
            1 => Self::Light,
            2 => Self::Small,
            3 => Self::Large,
            4 => Self::HighVortexLarge,
            5 => Self::Heavy,
            6 => Self::HighlyManeuverable,
            7 => Self::Rotorcraft,
            9 => Self::Glider,
            10 => Self::LighterThanAir,
            11 => Self::Parachutist,
            12 => Self::UltraLight,
            14 => Self::Uav,
            15 => Self::SpaceVehicle,
            17 => Self::SurfaceEmergencyVehicle,
            18 => Self::SurfaceServiceVehicle,
            19 => Self::PointObstacle,
            20 => Self::ClusterObstacle,
            21 => Self::LineObstacle,
            // 8, 13, 16 are unassigned and 22..=39 reserved
            _ => return Err(out_of_range("emitter category", code)),
        })
    }
}

impl fmt::Display for EmitterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoInfo => "No aircraft type information",
            Self::Light => "Light (< 15 500 lbs)",
            Self::Small => "Small (15 500 to 75 000 lbs)",
            Self::Large => "Large (75 000 to 300 000 lbs)",
            Self::HighVortexLarge => "High Vortex Large",
            Self::Heavy => "Heavy (> 300 000 lbs)",
            Self::HighlyManeuverable => "Highly Maneuverable",
            Self::Rotorcraft => "Rotorcraft",
            Self::Glider => "Glider/Sailplane",
            Self::LighterThanAir => "Lighter than air",
            Self::Parachutist => "Parachutist/Sky diver",
            Self::UltraLight => "Ultra light/Hang glider/Paraglider",
            Self::Uav => "Unmanned aerial vehicle",
            Self::SpaceVehicle => "Space/Trans-atmospheric vehicle",
            Self::SurfaceEmergencyVehicle => "Surface vehicle - emergency",
            Self::SurfaceServiceVehicle => "Surface vehicle - service",
            Self::PointObstacle => "Point obstacle",
            Self::ClusterObstacle => "Cluster obstacle",
            Self::LineObstacle => "Line obstacle",
        })
    }
}

/// Emergency/priority code (byte 26, high nibble)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum EmergencyCode {
    #[default]
    NoEmergency = 0,
    General = 1,
    Medical = 2,
    MinimumFuel = 3,
    NoCommunication = 4,
    UnlawfulInterference = 5,
    DownedAircraft = 6,
}

impl TryFrom<u8> for EmergencyCode {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::NoEmergency),
            1 => Ok(Self::General),
            2 => Ok(Self::Medical),
            3 => Ok(Self::MinimumFuel),
            4 => Ok(Self::NoCommunication),
            5 => Ok(Self::UnlawfulInterference),
            6 => Ok(Self::DownedAircraft),
            _ => Err(out_of_range("emergency code", code)),
        }
    }
}

impl fmt::Display for EmergencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoEmergency => "No emergency",
            Self::General => "General emergency",
            Self::Medical => "Medical emergency",
            Self::MinimumFuel => "Minimum fuel",
            Self::NoCommunication => "No communication",
            Self::UnlawfulInterference => "Unlawful interference",
            Self::DownedAircraft => "Downed aircraft",
        })
    }
}

/// Highest NIC/NACp code the ICD defines
pub const MAX_CONFIDENCE_CODE: u8 = 11;

/// Containment radius for a Navigation Integrity Category
pub fn nic_description(nic: u8) -> &'static str {
    match nic {
        0 => "Unknown",
        1 => "< 20.0 NM",
        2 => "< 8.0 NM",
        3 => "< 4.0 NM",
        4 => "< 2.0 NM",
        5 => "< 1.0 NM",
        6 => "< 0.6 NM",
        7 => "< 0.2 NM",
        8 => "< 0.1 NM",
        9 => "HPL < 75 m and VPL < 112 m",
        10 => "HPL < 25 m and VPL < 37.5 m",
        11 => "HPL < 7.5 m and VPL < 11 m",
        _ => "Invalid",
    }
}

/// Accuracy bound for a Navigation Accuracy Category for Position
pub fn nacp_description(nacp: u8) -> &'static str {
    match nacp {
        0 => "Unknown",
        1 => "< 10.0 NM",
        2 => "< 4.0 NM",
        3 => "< 2.0 NM",
        4 => "< 1.0 NM",
        5 => "< 0.5 NM",
        6 => "< 0.3 NM",
        7 => "< 0.1 NM",
        8 => "< 0.05 NM",
        9 => "HFOM < 30 m and VFOM < 45 m",
        10 => "HFOM < 10 m and VFOM < 15 m",
        11 => "HFOM < 3 m and VFOM < 4 m",
        _ => "Invalid",
    }
}

fn out_of_range(field: &'static str, code: u8) -> CodecError {
    CodecError::OutOfRange {
        field,
        value: code as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id() {
        assert_eq!(MessageId::from(20), MessageId::TrafficReport);
        assert_eq!(MessageId::from(0), MessageId::Heartbeat);
        assert_eq!(MessageId::from(10), MessageId::OwnshipReport);
        assert_eq!(MessageId::from(99), MessageId::Unknown);
    }

    #[test]
    fn test_emitter_codes_roundtrip() {
        for code in 0..=255u8 {
            if let Ok(cat) = EmitterCategory::try_from(code) {
                assert_eq!(cat as u8, code);
            }
        }
        assert_eq!(EmitterCategory::try_from(7), Ok(EmitterCategory::Rotorcraft));
    }

    #[test]
    fn test_undefined_codes_rejected() {
        assert!(AlertStatus::try_from(2).is_err());
        assert!(AddressType::try_from(6).is_err());
        assert!(EmergencyCode::try_from(7).is_err());
        assert_eq!(
            EmitterCategory::try_from(8),
            Err(CodecError::OutOfRange {
                field: "emitter category",
                value: 8
            })
        );
        assert!(EmitterCategory::try_from(22).is_err());
    }

    #[test]
    fn test_track_type_bits() {
        assert_eq!(TrackType::from_bits(2), TrackType::MagHeading);
        assert_eq!(TrackType::from_bits(0b110), TrackType::MagHeading);
        assert_eq!(TrackType::from_bits(0), TrackType::NotValid);
    }

    #[test]
    fn test_confidence_descriptions() {
        assert_eq!(nic_description(7), "< 0.2 NM");
        assert_eq!(nacp_description(5), "< 0.5 NM");
        assert_eq!(nic_description(12), "Invalid");
    }
}
