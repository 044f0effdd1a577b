//! ADS-B data types

use crate::gdl90::{AddressType, EmergencyCode, EmitterCategory, TrackType};

/// Downlink formats carrying extended squitters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DownlinkFormat {
    ExtendedSquitter = 17,
    ExtendedSquitterNonTransponder = 18,
    Unknown = 255,
}

impl From<u8> for DownlinkFormat {
    fn from(df: u8) -> Self {
        match df {
            17 => Self::ExtendedSquitter,
            18 => Self::ExtendedSquitterNonTransponder,
            _ => Self::Unknown,
        }
    }
}

/// One decoded extended squitter
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// ICAO 24-bit address (or TIS-B/ADS-R track address)
    pub icao: u32,
    pub df: u8,
    /// CA field for DF17, CF field for DF18
    pub capability: u8,
    /// Type code, first 5 bits of the ME field
    pub tc: u8,
    pub kind: MessageKind,
}

impl DecodedMessage {
    /// GDL90 address type implied by the downlink/control format
    pub fn address_type(&self) -> AddressType {
        match (DownlinkFormat::from(self.df), self.capability) {
            (DownlinkFormat::ExtendedSquitterNonTransponder, 1) => AddressType::AdsbSelfAssigned,
            (DownlinkFormat::ExtendedSquitterNonTransponder, 2 | 3) => AddressType::TisbIcao,
            (DownlinkFormat::ExtendedSquitterNonTransponder, 5) => AddressType::TisbTrackFile,
            _ => AddressType::AdsbIcao,
        }
    }
}

/// ME field contents by type code
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// TC 1-4
    Identification {
        callsign: String,
        emitter: EmitterCategory,
    },
    /// TC 9-18 (barometric) and 20-22 (GNSS)
    AirbornePosition {
        altitude_ft: Option<i32>,
        lat_cpr: u32,
        lon_cpr: u32,
        odd: bool,
        gnss: bool,
        nic: u8,
    },
    /// TC 19
    Velocity {
        speed_kts: Option<f64>,
        heading_deg: Option<f64>,
        track_type: TrackType,
        vertical_rate_fpm: Option<i32>,
    },
    /// TC 28 subtype 1
    Emergency { code: EmergencyCode },
    /// TC 31
    OperationalStatus { nacp: u8 },
    Other,
}
