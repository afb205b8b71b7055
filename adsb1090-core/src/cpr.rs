//! Compact Position Reporting: global decode from an even/odd frame pair.
//!
//! The most recent frame picks the reference epoch: its parity decides which
//! of the two candidate latitudes and which longitude zone count are used.
//!
//! Key constants:
//! - NZ = 15 (latitude zones per hemisphere for even frames)
//! - Nb = 17 (bits per coordinate)
//! - Airborne: Dlat_even = 360 / 60 = 6.0 degrees, Dlat_odd = 360 / 59
//! - Surface: the same zones scaled to 90 degrees, with four candidate
//!   longitudes and two candidate latitudes

use serde::{Deserialize, Serialize};

use crate::decode::{AirbornePosition, SurfacePosition};

/// Number of latitude zones per hemisphere.
const NZ: f64 = 15.0;

/// Bits per CPR coordinate.
const NB: u32 = 17;

/// 2^17 = 131072.
const CPR_MAX: f64 = (1u32 << NB) as f64;

/// Resolved WGS-84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Position {
            latitude,
            longitude,
        }
    }
}

/// The CPR-relevant part of a position message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CprFrame {
    pub odd: bool,
    pub lat: u32,
    pub lon: u32,
}

impl From<&AirbornePosition> for CprFrame {
    fn from(p: &AirbornePosition) -> Self {
        CprFrame {
            odd: p.odd,
            lat: p.cpr_lat,
            lon: p.cpr_lon,
        }
    }
}

impl From<&SurfacePosition> for CprFrame {
    fn from(p: &SurfacePosition) -> Self {
        CprFrame {
            odd: p.odd,
            lat: p.cpr_lat,
            lon: p.cpr_lon,
        }
    }
}

/// Number of longitude zones at a given latitude (NL function).
///
/// Ranges from 1 near the poles to 59 at the equator.
pub fn nl(lat: f64) -> i32 {
    let lat = lat.abs();
    if lat == 0.0 {
        return 59;
    }
    if lat == 87.0 {
        return 2;
    }
    if lat > 87.0 {
        return 1;
    }

    let a = 1.0 - (std::f64::consts::PI / (2.0 * NZ)).cos();
    let b = lat.to_radians().cos().powi(2);
    let nl_val = (2.0 * std::f64::consts::PI / (1.0 - a / b).acos()).floor() as i32;
    nl_val.max(1)
}

/// Modulo that always returns a non-negative result.
fn modulo(x: f64, y: f64) -> f64 {
    x - y * (x / y).floor()
}

/// Nearest earlier frame (scanning backwards) whose parity differs from `latest`.
fn opposite<'a>(latest: &CprFrame, history: &'a [CprFrame]) -> Option<&'a CprFrame> {
    history.iter().rev().find(|f| f.odd != latest.odd)
}

/// Resolve an airborne position from the latest frame and the frames before it.
///
/// `history` is in arrival order and must not contain `latest`. Returns `None`
/// when no opposite-parity frame exists or the pair straddles a zone boundary.
pub fn resolve(latest: &CprFrame, history: &[CprFrame]) -> Option<Position> {
    let other = opposite(latest, history)?;
    let (even, odd) = if latest.odd {
        (other, latest)
    } else {
        (latest, other)
    };
    global_decode(even, odd, latest.odd, 360.0).map(|(lat, lon)| {
        let lat = if lat >= 270.0 { lat - 360.0 } else { lat };
        Position::new(round6(lat), round6(normalize_lon(lon)))
    })
}

/// Resolve a surface position.
///
/// Surface decoding leaves a choice of two latitudes and four longitudes. With
/// a reference the closest candidate wins; without one the northern-hemisphere,
/// first-quadrant candidate is returned.
pub fn resolve_surface(
    latest: &CprFrame,
    history: &[CprFrame],
    reference: Option<Position>,
) -> Option<Position> {
    let other = opposite(latest, history)?;
    let (even, odd) = if latest.odd {
        (other, latest)
    } else {
        (latest, other)
    };
    let (lat, lon) = global_decode(even, odd, latest.odd, 90.0)?;

    let Some(reference) = reference else {
        return Some(Position::new(round6(lat), round6(normalize_lon(lon))));
    };

    let mut best: Option<(f64, Position)> = None;
    for candidate_lat in [lat, lat - 90.0] {
        for quadrant in 0..4 {
            let candidate = Position::new(candidate_lat, normalize_lon(lon + 90.0 * quadrant as f64));
            let distance = angular_distance(&candidate, &reference);
            if best.is_none_or(|(d, _)| distance < d) {
                best = Some((distance, candidate));
            }
        }
    }
    best.map(|(_, p)| Position::new(round6(p.latitude), round6(p.longitude)))
}

/// Global decode over a latitude span of 360 (airborne) or 90 (surface) degrees.
///
/// Returns raw `(lat, lon)` before hemisphere/longitude normalization.
fn global_decode(even: &CprFrame, odd: &CprFrame, use_odd: bool, span: f64) -> Option<(f64, f64)> {
    let dlat_even = span / (4.0 * NZ);
    let dlat_odd = span / (4.0 * NZ - 1.0);

    let lat_even_cpr = even.lat as f64 / CPR_MAX;
    let lon_even_cpr = even.lon as f64 / CPR_MAX;
    let lat_odd_cpr = odd.lat as f64 / CPR_MAX;
    let lon_odd_cpr = odd.lon as f64 / CPR_MAX;

    // Latitude zone index
    let j = (59.0 * lat_even_cpr - 60.0 * lat_odd_cpr + 0.5).floor();

    let lat_e = dlat_even * (modulo(j, 60.0) + lat_even_cpr);
    let lat_o = dlat_odd * (modulo(j, 59.0) + lat_odd_cpr);

    // Airborne latitudes at or above 270 degrees are in the southern hemisphere
    let (cmp_e, cmp_o) = if span >= 360.0 {
        (wrap_lat(lat_e), wrap_lat(lat_o))
    } else {
        (lat_e, lat_o)
    };
    if nl(cmp_e) != nl(cmp_o) {
        return None; // zone boundary crossing
    }

    let (lat, nl_val, n_lon, lon_cpr) = if use_odd {
        let nl_val = nl(cmp_o);
        (lat_o, nl_val, (nl_val - 1).max(1), lon_odd_cpr)
    } else {
        let nl_val = nl(cmp_e);
        (lat_e, nl_val, nl_val.max(1), lon_even_cpr)
    };

    let dlon = span / n_lon as f64;
    let m = (lon_even_cpr * (nl_val - 1) as f64 - lon_odd_cpr * nl_val as f64 + 0.5).floor();
    let lon = dlon * (modulo(m, n_lon as f64) + lon_cpr);

    if !lat.is_finite() || !lon.is_finite() {
        return None;
    }
    Some((lat, lon))
}

fn wrap_lat(lat: f64) -> f64 {
    if lat >= 270.0 {
        lat - 360.0
    } else {
        lat
    }
}

/// Normalize longitude to [-180, 180).
fn normalize_lon(lon: f64) -> f64 {
    modulo(lon + 180.0, 360.0) - 180.0
}

/// Squared angular distance with longitude wrap-around.
fn angular_distance(a: &Position, b: &Position) -> f64 {
    let dlat = a.latitude - b.latitude;
    let dlon = (a.longitude - b.longitude).abs();
    let dlon = dlon.min(360.0 - dlon);
    dlat * dlat + dlon * dlon
}

/// Round to 6 decimal places.
fn round6(val: f64) -> f64 {
    (val * 1_000_000.0).round() / 1_000_000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
