//! Shared types and the error enum for adsb1090-core.
//!
//! - `DecodeError`: every per-frame and boundary failure
//! - `AircraftAddress`: 24-bit transponder address, the key for all per-aircraft state
//! - `Squawk`, `FlightStatus`, `Category`: small typed values decoded from frames
//! - Hex helpers and the callsign alphabet

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// All errors produced by adsb1090-core.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported frame format: downlink format {df}, {len} bytes")]
    UnsupportedFormat { df: u8, len: usize },
    #[error("checksum mismatch: expected {expected:06X}, got {actual:06X}")]
    Checksum { expected: u32, actual: u32 },
    #[error("aircraft {0} not found in registry")]
    ReferenceNotFound(AircraftAddress),
    #[error("unsupported extended squitter type code: {0}")]
    UnsupportedTypeCode(u8),
    #[error("unsupported subtype {subtype} for type code {type_code}")]
    UnsupportedSubtype { type_code: u8, subtype: u8 },
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("invalid aircraft address: {0}")]
    InvalidAddress(String),
    #[error("invalid squawk: {0}")]
    InvalidSquawk(String),
    #[error("registry error: {0}")]
    Registry(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

// ---------------------------------------------------------------------------
// Aircraft address
// ---------------------------------------------------------------------------

/// 24-bit ICAO aircraft address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AircraftAddress(u32);

impl AircraftAddress {
    pub const MAX: u32 = 0xFF_FFFF;

    /// Build from a 24-bit integer. Upper bits are discarded.
    pub const fn new(value: u32) -> Self {
        AircraftAddress(value & Self::MAX)
    }

    /// Build from three big-endian bytes.
    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        AircraftAddress((bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub const fn to_bytes(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }
}

impl fmt::Display for AircraftAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}

impl FromStr for AircraftAddress {
    type Err = DecodeError;

    /// Parse 1-6 hex digits, case-insensitive. An optional `0x` prefix is accepted.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 6 {
            return Err(DecodeError::InvalidAddress(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(AircraftAddress)
            .map_err(|_| DecodeError::InvalidAddress(s.to_string()))
    }
}

impl From<AircraftAddress> for u32 {
    fn from(addr: AircraftAddress) -> u32 {
        addr.0
    }
}

impl Serialize for AircraftAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AircraftAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Squawk
// ---------------------------------------------------------------------------

/// Four-digit transponder identity code.
///
/// Stored as the decimal rendering of its octal digits, so squawk 7700 is
/// `Squawk(7700)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Squawk(u16);

impl Squawk {
    pub const HIJACKER: Squawk = Squawk(7500);
    pub const RADIO_FAILURE: Squawk = Squawk(7600);
    pub const MAYDAY: Squawk = Squawk(7700);

    /// Build from four octal digits (A, B, C, D).
    pub const fn from_digits(a: u8, b: u8, c: u8, d: u8) -> Self {
        Squawk(a as u16 * 1000 + b as u16 * 100 + c as u16 * 10 + d as u16)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    /// 7500, 7600 or 7700.
    pub fn is_emergency(self) -> bool {
        matches!(self, Squawk::HIJACKER | Squawk::RADIO_FAILURE | Squawk::MAYDAY)
    }
}

impl fmt::Display for Squawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for Squawk {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.len() > 4 {
            return Err(DecodeError::InvalidSquawk(s.to_string()));
        }
        let mut value = 0u16;
        for c in s.chars() {
            match c.to_digit(8) {
                Some(d) => value = value * 10 + d as u16,
                None => return Err(DecodeError::InvalidSquawk(s.to_string())),
            }
        }
        Ok(Squawk(value))
    }
}

impl Serialize for Squawk {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Squawk {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Flight status (DF4/5/20/21)
// ---------------------------------------------------------------------------

/// 3-bit flight status carried by surveillance and Comm-B replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlightStatus {
    Airborne,
    OnGround,
    AlertAirborne,
    AlertOnGround,
    AlertSpi,
    Spi,
    Reserved,
    NotAssigned,
}

impl FlightStatus {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => FlightStatus::Airborne,
            1 => FlightStatus::OnGround,
            2 => FlightStatus::AlertAirborne,
            3 => FlightStatus::AlertOnGround,
            4 => FlightStatus::AlertSpi,
            5 => FlightStatus::Spi,
            6 => FlightStatus::Reserved,
            _ => FlightStatus::NotAssigned,
        }
    }

    pub fn alert(self) -> bool {
        matches!(
            self,
            FlightStatus::AlertAirborne | FlightStatus::AlertOnGround | FlightStatus::AlertSpi
        )
    }

    pub fn on_ground(self) -> bool {
        matches!(self, FlightStatus::OnGround | FlightStatus::AlertOnGround)
    }

    /// Special position identification pulse active.
    pub fn spi(self) -> bool {
        matches!(self, FlightStatus::AlertSpi | FlightStatus::Spi)
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlightStatus::Airborne => "no alert, no SPI, airborne",
            FlightStatus::OnGround => "no alert, no SPI, on ground",
            FlightStatus::AlertAirborne => "alert, no SPI, airborne",
            FlightStatus::AlertOnGround => "alert, no SPI, on ground",
            FlightStatus::AlertSpi => "alert, SPI",
            FlightStatus::Spi => "no alert, SPI",
            FlightStatus::Reserved => "reserved",
            FlightStatus::NotAssigned => "not assigned",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Emitter category (TC 1-4)
// ---------------------------------------------------------------------------

/// Emitter category from an identification message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    #[default]
    NoInformation,
    SurfaceEmergencyVehicle,
    SurfaceServiceVehicle,
    GroundObstruction,
    Glider,
    LighterThanAir,
    Parachutist,
    Ultralight,
    Reserved,
    UnmannedAerialVehicle,
    SpaceVehicle,
    Light,
    Medium1,
    Medium2,
    HighVortex,
    Heavy,
    HighPerformance,
    Rotorcraft,
}

impl Category {
    /// Look up the category from a type code (1-4) and the 3-bit category field.
    pub fn from_codes(type_code: u8, ca: u8) -> Self {
        match (type_code, ca & 0x07) {
            (2, 1) => Category::SurfaceEmergencyVehicle,
            (2, 3) => Category::SurfaceServiceVehicle,
            (2, 4..=7) => Category::GroundObstruction,
            (3, 1) => Category::Glider,
            (3, 2) => Category::LighterThanAir,
            (3, 3) => Category::Parachutist,
            (3, 4) => Category::Ultralight,
            (3, 5) => Category::Reserved,
            (3, 6) => Category::UnmannedAerialVehicle,
            (3, 7) => Category::SpaceVehicle,
            (4, 1) => Category::Light,
            (4, 2) => Category::Medium1,
            (4, 3) => Category::Medium2,
            (4, 4) => Category::HighVortex,
            (4, 5) => Category::Heavy,
            (4, 6) => Category::HighPerformance,
            (4, 7) => Category::Rotorcraft,
            _ => Category::NoInformation,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::NoInformation => "No category information",
            Category::SurfaceEmergencyVehicle => "Surface emergency vehicle",
            Category::SurfaceServiceVehicle => "Surface service vehicle",
            Category::GroundObstruction => "Ground obstruction",
            Category::Glider => "Glider, sailplane",
            Category::LighterThanAir => "Lighter-than-air",
            Category::Parachutist => "Parachutist, skydiver",
            Category::Ultralight => "Ultralight, hang-glider, paraglider",
            Category::Reserved => "Reserved",
            Category::UnmannedAerialVehicle => "Unmanned aerial vehicle",
            Category::SpaceVehicle => "Space or transatmospheric vehicle",
            Category::Light => "Light (less than 7000 kg)",
            Category::Medium1 => "Medium 1 (between 7000 kg and 34000 kg)",
            Category::Medium2 => "Medium 2 (between 34000 kg to 136000 kg)",
            Category::HighVortex => "High vortex aircraft",
            Category::Heavy => "Heavy (larger than 136000 kg)",
            Category::HighPerformance => "High performance (>5 g acceleration) and high speed (>400 kt)",
            Category::Rotorcraft => "Rotorcraft",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Decode a hex string into bytes. Case-insensitive, must be even length.
pub fn hex_decode(hex: &str) -> Result<Vec<u8>> {
    let trimmed = hex.trim();
    if !trimmed.len().is_multiple_of(2) {
        return Err(DecodeError::InvalidHex(hex.to_string()));
    }
    let mut bytes = Vec::with_capacity(trimmed.len() / 2);
    for chunk in trimmed.as_bytes().chunks(2) {
        match (hex_digit(chunk[0]), hex_digit(chunk[1])) {
            (Some(high), Some(low)) => bytes.push((high << 4) | low),
            _ => return Err(DecodeError::InvalidHex(hex.to_string())),
        }
    }
    Ok(bytes)
}

/// Encode bytes as uppercase hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// ADS-B callsign character set
// ---------------------------------------------------------------------------

/// ADS-B character set for callsign encoding (6 bits per character).
pub const CALLSIGN_CHARSET: &[u8; 64] =
    b"#ABCDEFGHIJKLMNOPQRSTUVWXYZ##### ###############0123456789######";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip() {
        let addr: AircraftAddress = "4840d6".parse().unwrap();
        assert_eq!(addr.value(), 0x4840D6);
        assert_eq!(addr.to_string(), "4840D6");
        assert_eq!(addr.to_bytes(), [0x48, 0x40, 0xD6]);
        assert_eq!(AircraftAddress::from_bytes([0x48, 0x40, 0xD6]), addr);
    }

    #[test]
    fn test_address_short_and_prefixed() {
        let addr: AircraftAddress = "0x1F".parse().unwrap();
        assert_eq!(addr.to_string(), "00001F");
    }

    #[test]
    fn test_address_rejects_garbage() {
        assert!("".parse::<AircraftAddress>().is_err());
        assert!("1234567".parse::<AircraftAddress>().is_err());
        assert!("XYZ".parse::<AircraftAddress>().is_err());
    }

    #[test]
    fn test_address_new_masks_upper_bits() {
        assert_eq!(AircraftAddress::new(0x1234_5678).value(), 0x34_5678);
    }

    #[test]
    fn test_address_serde_as_hex_string() {
        let addr = AircraftAddress::new(0x346204);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"346204\"");
        let back: AircraftAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_squawk_parse() {
        assert_eq!("7123".parse::<Squawk>().unwrap(), Squawk(7123));
        assert_eq!("0012".parse::<Squawk>().unwrap().to_string(), "0012");
    }

    #[test]
    fn test_squawk_parse_too_high() {
        assert!("17123".parse::<Squawk>().is_err());
    }

    #[test]
    fn test_squawk_parse_invalid_digit() {
        assert!("8900".parse::<Squawk>().is_err());
    }

    #[test]
    fn test_squawk_emergency() {
        assert!(Squawk::from_digits(7, 5, 0, 0).is_emergency());
        assert!(Squawk::MAYDAY.is_emergency());
        assert!(!Squawk::from_digits(1, 2, 0, 0).is_emergency());
    }

    #[test]
    fn test_flight_status_flags() {
        assert!(FlightStatus::from_bits(1).on_ground());
        assert!(FlightStatus::from_bits(3).alert());
        assert!(FlightStatus::from_bits(3).on_ground());
        assert!(FlightStatus::from_bits(4).spi());
        assert!(FlightStatus::from_bits(4).alert());
        assert!(!FlightStatus::from_bits(5).alert());
        assert!(!FlightStatus::from_bits(0).on_ground());
        assert_eq!(FlightStatus::from_bits(0x0F), FlightStatus::NotAssigned);
    }

    #[test]
    fn test_category_lookup() {
        assert_eq!(Category::from_codes(4, 5), Category::Heavy);
        assert_eq!(Category::from_codes(4, 7), Category::Rotorcraft);
        assert_eq!(Category::from_codes(3, 6), Category::UnmannedAerialVehicle);
        assert_eq!(Category::from_codes(2, 6), Category::GroundObstruction);
        assert_eq!(Category::from_codes(1, 3), Category::NoInformation);
        assert_eq!(Category::from_codes(4, 0), Category::NoInformation);
        assert_eq!(Category::Heavy.to_string(), "Heavy (larger than 136000 kg)");
    }

    #[test]
    fn test_hex_decode() {
        assert_eq!(hex_decode("4840D6").unwrap(), vec![0x48, 0x40, 0xD6]);
        assert!(hex_decode("odd").is_err());
        assert!(hex_decode("ZZZZ").is_err());
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x48, 0x40, 0xD6]), "4840D6");
    }
}
