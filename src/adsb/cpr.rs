//! CPR (Compact Position Reporting) position decoding
//!
//! Airborne positions arrive as 17-bit even/odd coordinate pairs. Global
//! decoding needs one of each within `MAX_PAIR_AGE`; once a position is
//! known, single frames are resolved locally against it.

use std::time::{Duration, Instant};

/// Latitude zones per hemisphere
const NZ: f64 = 15.0;

/// 2^17, the CPR coordinate range
const CPR_MAX: f64 = 131072.0;

/// Maximum age gap between the even and odd frame of a global pair
pub const MAX_PAIR_AGE: Duration = Duration::from_secs(10);

/// One encoded position frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CprFrame {
    pub lat: u32,
    pub lon: u32,
    pub odd: bool,
}

/// A frame with its arrival time
#[derive(Debug, Clone, Copy)]
pub struct TimedFrame {
    pub frame: CprFrame,
    pub received: Instant,
}

/// Number of longitude zones at a given latitude
pub fn nl(lat: f64) -> i32 {
    let lat = lat.abs();
    if lat == 0.0 {
        return 59;
    }
    if lat >= 87.0 {
        return 1;
    }

    let a = 1.0 - (std::f64::consts::PI / (2.0 * NZ)).cos();
    let b = lat.to_radians().cos().powi(2);
    let zones = (2.0 * std::f64::consts::PI / (1.0 - a / b).acos()).floor() as i32;
    zones.max(1)
}

/// Modulo that is non-negative for a positive divisor
fn modulo(x: f64, y: f64) -> f64 {
    x - y * (x / y).floor()
}

fn normalize_lon(lon: f64) -> f64 {
    if lon >= 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Resolve an even/odd pair. The newer frame selects which zone grid
/// the result is expressed in.
pub fn decode_global(even: &TimedFrame, odd: &TimedFrame) -> Option<(f64, f64)> {
    let (newer_is_odd, gap) = if odd.received >= even.received {
        (true, odd.received - even.received)
    } else {
        (false, even.received - odd.received)
    };
    if gap > MAX_PAIR_AGE {
        return None;
    }

    let lat_even_cpr = even.frame.lat as f64 / CPR_MAX;
    let lon_even_cpr = even.frame.lon as f64 / CPR_MAX;
    let lat_odd_cpr = odd.frame.lat as f64 / CPR_MAX;
    let lon_odd_cpr = odd.frame.lon as f64 / CPR_MAX;

    let dlat_even = 360.0 / (4.0 * NZ);
    let dlat_odd = 360.0 / (4.0 * NZ - 1.0);

    let j = (59.0 * lat_even_cpr - 60.0 * lat_odd_cpr + 0.5).floor();

    let mut lat_even = dlat_even * (modulo(j, 60.0) + lat_even_cpr);
    let mut lat_odd = dlat_odd * (modulo(j, 59.0) + lat_odd_cpr);
    if lat_even >= 270.0 {
        lat_even -= 360.0;
    }
    if lat_odd >= 270.0 {
        lat_odd -= 360.0;
    }

    // Both frames must fall in the same longitude zone band
    if nl(lat_even) != nl(lat_odd) {
        return None;
    }

    let (lat, nl_lat, lon_cpr, i) = if newer_is_odd {
        (lat_odd, nl(lat_odd), lon_odd_cpr, 1)
    } else {
        (lat_even, nl(lat_even), lon_even_cpr, 0)
    };

    let ni = (nl_lat - i).max(1) as f64;
    let m = (lon_even_cpr * (nl_lat - 1) as f64 - lon_odd_cpr * nl_lat as f64 + 0.5).floor();
    let lon = normalize_lon((360.0 / ni) * (modulo(m, ni) + lon_cpr));

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }

    Some((lat, lon))
}

/// Resolve a single frame against a nearby reference (within ~180 NM)
pub fn decode_local(frame: &CprFrame, ref_lat: f64, ref_lon: f64) -> (f64, f64) {
    let i = if frame.odd { 1.0 } else { 0.0 };
    let dlat = 360.0 / (4.0 * NZ - i);

    let lat_cpr = frame.lat as f64 / CPR_MAX;
    let lon_cpr = frame.lon as f64 / CPR_MAX;

    let j = (ref_lat / dlat).floor() + (modulo(ref_lat, dlat) / dlat - lat_cpr + 0.5).floor();
    let lat = dlat * (j + lat_cpr);

    let ni = (nl(lat) - i as i32).max(1) as f64;
    let dlon = 360.0 / ni;
    let m = (ref_lon / dlon).floor() + (modulo(ref_lon, dlon) / dlon - lon_cpr + 0.5).floor();
    let lon = normalize_lon(dlon * (m + lon_cpr));

    (lat, lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 8D40621D58C382D690C8AC2863A7 / 8D40621D58C386435CC412692AD6
    const EVEN: CprFrame = CprFrame {
        lat: 93000,
        lon: 51372,
        odd: false,
    };
    const ODD: CprFrame = CprFrame {
        lat: 74158,
        lon: 50194,
        odd: true,
    };

    #[test]
    fn test_nl() {
        assert_eq!(nl(0.0), 59);
        assert_eq!(nl(45.0), 42);
        assert_eq!(nl(52.25), 36);
        assert_eq!(nl(87.0), 1);
        assert_eq!(nl(-45.0), 42);
    }

    #[test]
    fn test_global_even_newer() {
        let t0 = Instant::now();
        let odd = TimedFrame { frame: ODD, received: t0 };
        let even = TimedFrame {
            frame: EVEN,
            received: t0 + Duration::from_secs(1),
        };
        let (lat, lon) = decode_global(&even, &odd).unwrap();
        assert!((lat - 52.25720).abs() < 1e-4, "lat {}", lat);
        assert!((lon - 3.91937).abs() < 1e-4, "lon {}", lon);
    }

    #[test]
    fn test_global_stale_pair() {
        let t0 = Instant::now();
        let even = TimedFrame { frame: EVEN, received: t0 };
        let odd = TimedFrame {
            frame: ODD,
            received: t0 + Duration::from_secs(11),
        };
        assert!(decode_global(&even, &odd).is_none());
    }

    #[test]
    fn test_local_matches_global() {
        let (lat, lon) = decode_local(&EVEN, 52.258, 3.918);
        assert!((lat - 52.25720).abs() < 1e-4, "lat {}", lat);
        assert!((lon - 3.91937).abs() < 1e-4, "lon {}", lon);
    }
}
