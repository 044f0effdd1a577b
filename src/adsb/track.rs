//! Per-aircraft state
//!
//! A Traffic Report needs fields that arrive in separate squitters
//! (identification, position pairs, velocity, status), so state is kept per
//! ICAO address until the aircraft goes quiet.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use super::cpr::{self, CprFrame, TimedFrame};
use super::parser::parse_message;
use super::types::{DecodedMessage, MessageKind};
use crate::gdl90::{AddressType, EmergencyCode, EmitterCategory, TrackType, TrafficReport};

/// Maximum age for aircraft state before removal
pub const AIRCRAFT_TIMEOUT: Duration = Duration::from_secs(60);

/// Position log rate limit
const POSITION_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Local CPR decoding is trusted against a reference this recent
const LOCAL_DECODE_MAX_AGE: Duration = Duration::from_secs(30);

/// Max plausible ground speed, 900 knots = 0.25 NM per second
const MAX_NM_PER_SEC: f64 = 0.25;

/// Slack for the first fix after a long gap, in NM
const POSITION_JUMP_SLACK_NM: f64 = 5.0;

/// Aggregated aircraft state
#[derive(Debug, Clone)]
pub struct AircraftState {
    pub icao: u32,
    pub address_type: AddressType,
    pub callsign: Option<String>,
    pub emitter: EmitterCategory,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Barometric altitude in feet
    pub altitude_ft: Option<i32>,
    pub speed_kts: Option<f64>,
    pub heading_deg: Option<f64>,
    pub track_type: TrackType,
    pub vertical_rate_fpm: Option<i32>,
    pub nic: u8,
    pub nacp: u8,
    pub emergency: EmergencyCode,
    pub last_seen: Instant,
    pub messages: u64,
    even: Option<TimedFrame>,
    odd: Option<TimedFrame>,
    last_position: Option<Instant>,
    last_position_log: Option<Instant>,
}

impl AircraftState {
    pub fn new(icao: u32, now: Instant) -> Self {
        Self {
            icao,
            address_type: AddressType::AdsbIcao,
            callsign: None,
            emitter: EmitterCategory::NoInfo,
            latitude: None,
            longitude: None,
            altitude_ft: None,
            speed_kts: None,
            heading_deg: None,
            track_type: TrackType::NotValid,
            vertical_rate_fpm: None,
            nic: 0,
            nacp: 0,
            emergency: EmergencyCode::NoEmergency,
            last_seen: now,
            messages: 0,
            even: None,
            odd: None,
            last_position: None,
            last_position_log: None,
        }
    }

    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Check if aircraft state is stale
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }

    /// Fold one decoded message into the state
    fn apply(&mut self, msg: &DecodedMessage, now: Instant) {
        self.last_seen = now;
        self.messages += 1;
        self.address_type = msg.address_type();

        match &msg.kind {
            MessageKind::Identification { callsign, emitter } => {
                if !callsign.is_empty() && !callsign.contains('#') {
                    self.callsign = Some(callsign.clone());
                }
                self.emitter = *emitter;
            }
            MessageKind::AirbornePosition {
                altitude_ft,
                lat_cpr,
                lon_cpr,
                odd,
                gnss,
                nic,
            } => {
                if !gnss {
                    if let Some(alt) = altitude_ft.filter(|a| (-2000..60000).contains(a)) {
                        self.altitude_ft = Some(alt);
                    }
                }
                self.nic = *nic;

                let frame = TimedFrame {
                    frame: CprFrame {
                        lat: *lat_cpr,
                        lon: *lon_cpr,
                        odd: *odd,
                    },
                    received: now,
                };
                if *odd {
                    self.odd = Some(frame);
                } else {
                    self.even = Some(frame);
                }

                if let Some((lat, lon)) = self.resolve_position(&frame) {
                    self.accept_position(lat, lon, now);
                }
            }
            MessageKind::Velocity {
                speed_kts,
                heading_deg,
                track_type,
                vertical_rate_fpm,
            } => {
                if let Some(speed) = speed_kts.filter(|s| (0.0..4096.0).contains(s)) {
                    self.speed_kts = Some(speed);
                }
                if let Some(hdg) = heading_deg {
                    self.heading_deg = Some(*hdg);
                    self.track_type = *track_type;
                }
                if let Some(vr) = vertical_rate_fpm {
                    self.vertical_rate_fpm = Some(*vr);
                }
            }
            MessageKind::Emergency { code } => self.emergency = *code,
            MessageKind::OperationalStatus { nacp } => self.nacp = *nacp,
            MessageKind::Other => {}
        }
    }

    /// Local decode against a recent fix, otherwise global decode of the pair
    fn resolve_position(&self, frame: &TimedFrame) -> Option<(f64, f64)> {
        if let (Some(lat), Some(lon), Some(at)) = (self.latitude, self.longitude, self.last_position) {
            if frame.received.saturating_duration_since(at) <= LOCAL_DECODE_MAX_AGE {
                return Some(cpr::decode_local(&frame.frame, lat, lon));
            }
        }

        match (&self.even, &self.odd) {
            (Some(even), Some(odd)) => cpr::decode_global(even, odd),
            _ => None,
        }
    }

    fn accept_position(&mut self, lat: f64, lon: f64, now: Instant) {
        if lat.abs() > 90.0 || lon.abs() > 180.0 {
            return;
        }

        // Reasonableness check: reject jumps no aircraft could make
        if let (Some(old_lat), Some(old_lon), Some(at)) = (self.latitude, self.longitude, self.last_position) {
            let elapsed = now.saturating_duration_since(at).as_secs_f64();
            let distance_nm = haversine_distance_nm(old_lat, old_lon, lat, lon);
            if distance_nm > MAX_NM_PER_SEC * elapsed + POSITION_JUMP_SLACK_NM {
                debug!(
                    "Aircraft {:06X}: rejected position jump of {:.1} NM",
                    self.icao, distance_nm
                );
                return;
            }
        }

        self.latitude = Some(lat);
        self.longitude = Some(lon);
        self.last_position = Some(now);
    }

    /// Check if enough time has passed to log position again
    fn should_log_position(&self, now: Instant) -> bool {
        self.last_position_log
            .map_or(true, |at| now.saturating_duration_since(at) >= POSITION_LOG_INTERVAL)
    }

    /// Current state as a Traffic Report; `None` until a position is known
    pub fn to_report(&self) -> Option<TrafficReport> {
        let (latitude, longitude) = (self.latitude?, self.longitude?);

        Some(TrafficReport {
            address_type: self.address_type,
            address: self.icao,
            latitude,
            longitude,
            altitude_ft: self.altitude_ft.map(f64::from),
            airborne: true,
            track_type: if self.heading_deg.is_some() {
                self.track_type
            } else {
                TrackType::NotValid
            },
            nic: self.nic,
            nacp: self.nacp,
            horizontal_velocity_kt: self.speed_kts,
            vertical_velocity_fpm: self.vertical_rate_fpm.map(f64::from),
            heading_deg: self.heading_deg.unwrap_or(0.0),
            emitter: self.emitter,
            callsign: self.callsign.clone().unwrap_or_default(),
            emergency: self.emergency,
            ..Default::default()
        })
    }
}

/// Calculate haversine distance between two lat/lon points in nautical miles
fn haversine_distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_NM: f64 = 3440.065;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_NM * c
}

/// Tracks every aircraft heard and turns squitters into Traffic Reports
pub struct Tracker {
    aircraft: HashMap<u32, AircraftState>,
    max_aircraft: usize,
    timeout: Duration,
    last_cleanup: Option<Instant>,
}

impl Tracker {
    pub fn new(max_aircraft: usize) -> Self {
        Self::with_timeout(max_aircraft, AIRCRAFT_TIMEOUT)
    }

    pub fn with_timeout(max_aircraft: usize, timeout: Duration) -> Self {
        Self {
            aircraft: HashMap::with_capacity(max_aircraft),
            max_aircraft,
            timeout,
            last_cleanup: None,
        }
    }

    /// Feed one demodulated frame
    pub fn update(&mut self, msg: &[u8]) -> Option<TrafficReport> {
        self.update_at(msg, Instant::now())
    }

    /// Feed one frame received at `now`. Returns the aircraft's report once
    /// its position is known.
    pub fn update_at(&mut self, msg: &[u8], now: Instant) -> Option<TrafficReport> {
        let decoded = match parse_message(msg) {
            Ok(decoded) => decoded,
            Err(e) => {
                trace!("Dropping frame: {:?}", e);
                return None;
            }
        };
        let icao = decoded.icao;

        if self.last_cleanup.map_or(true, |at| now.saturating_duration_since(at) > self.timeout / 2) {
            self.expire(now);
            self.last_cleanup = Some(now);
        }

        if !self.aircraft.contains_key(&icao) {
            if self.aircraft.len() >= self.max_aircraft {
                self.expire(now);
                if self.aircraft.len() >= self.max_aircraft {
                    self.evict_oldest();
                }
            }
            self.aircraft.insert(icao, AircraftState::new(icao, now));
            debug!("New aircraft tracked: {:06X}", icao);
        }

        let state = self.aircraft.get_mut(&icao)?;
        state.apply(&decoded, now);

        if state.has_position() && state.should_log_position(now) {
            state.last_position_log = Some(now);
            info!(
                "Aircraft {:06X} {} at ({:.4}, {:.4}) alt={:?} spd={:?} hdg={:?} | msgs={}",
                icao,
                state.callsign.as_deref().unwrap_or("-"),
                state.latitude.unwrap_or(0.0),
                state.longitude.unwrap_or(0.0),
                state.altitude_ft,
                state.speed_kts,
                state.heading_deg,
                state.messages
            );
        }

        state.to_report()
    }

    /// Get count of tracked aircraft
    pub fn count(&self) -> usize {
        self.aircraft.len()
    }

    /// Remove aircraft not heard from within the timeout
    pub fn expire(&mut self, now: Instant) {
        let before = self.aircraft.len();
        let timeout = self.timeout;
        self.aircraft.retain(|_, state| !state.is_stale(now, timeout));
        let removed = before - self.aircraft.len();
        if removed > 0 {
            debug!("Cleaned up {} stale aircraft, {} remaining", removed, self.aircraft.len());
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .aircraft
            .values()
            .min_by_key(|state| state.last_seen)
            .map(|state| state.icao);
        if let Some(icao) = oldest {
            self.aircraft.remove(&icao);
            debug!("Tracker full, evicted {:06X}", icao);
        }
    }
}
