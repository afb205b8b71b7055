//! Decode qualified Mode S messages into typed payloads.
//!
//! Handles all supported Downlink Formats and ADS-B Type Codes:
//! - DF17/18/19 TC 1-4:   Aircraft identification (callsign + category)
//! - DF17/18/19 TC 5-8:   Surface position
//! - DF17/18/19 TC 9-18:  Airborne position (barometric altitude)
//! - DF17/18/19 TC 19:    Airborne velocity (ground speed or airspeed)
//! - DF17/18/19 TC 20-22: Airborne position (GNSS altitude)
//! - DF17/18/19 TC 31:    Operation status (presence only)
//! - DF0/4/16:            Surveillance altitude reply
//! - DF5:                 Surveillance identity reply
//! - DF20/21:             Comm-B altitude/identity reply
//! - DF11:                All-call reply
//! - DF24:                Comm-D (presence only)
//!
//! Values a frame marks as unavailable decode to `None`.

use serde::Serialize;

use crate::frame::QualifiedMessage;
use crate::types::*;

const FEET_PER_METER: f64 = 3.28084;

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// TC 1-4: Aircraft identification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identification {
    pub callsign: String,
    pub category: Category,
}

/// TC 9-18 / 20-22: CPR-encoded airborne position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AirbornePosition {
    pub type_code: u8,
    pub altitude_ft: Option<i32>,
    /// Altitude is barometric (TC 9-18) rather than GNSS (TC 20-22).
    pub baro_altitude: bool,
    pub surveillance_status: u8,
    pub single_antenna: bool,
    pub utc_synchronized: bool,
    pub odd: bool,
    pub cpr_lat: u32,
    pub cpr_lon: u32,
}

/// TC 5-8: CPR-encoded surface position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfacePosition {
    pub type_code: u8,
    /// Quantized ground speed, 7 bits.
    pub movement: u8,
    pub track_valid: bool,
    /// Quantized ground track, 7 bits.
    pub track_raw: u8,
    pub utc_synchronized: bool,
    pub odd: bool,
    pub cpr_lat: u32,
    pub cpr_lon: u32,
}

impl SurfacePosition {
    /// Ground speed in knots decoded from the movement field.
    pub fn ground_speed_kts(&self) -> Option<f64> {
        // (first code, speed at first code, step) for each band
        const BANDS: [(u8, f64, f64); 6] = [
            (2, 0.125, 0.125),
            (9, 1.0, 0.25),
            (13, 2.0, 0.5),
            (39, 15.0, 1.0),
            (94, 70.0, 2.0),
            (109, 100.0, 5.0),
        ];
        match self.movement {
            0 | 125..=127 => None,
            1 => Some(0.0),
            124 => Some(175.0),
            mov => BANDS
                .iter()
                .rev()
                .find(|(start, _, _)| mov >= *start)
                .map(|(start, base, step)| base + (mov - start) as f64 * step),
        }
    }

    /// Ground track in degrees when the status bit marks it valid.
    pub fn track_deg(&self) -> Option<f64> {
        self.track_valid
            .then(|| self.track_raw as f64 * 360.0 / 128.0)
    }
}

/// Velocity representation selected by the subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SpeedKind {
    /// Subtypes 1-2: east/west and north/south components.
    Ground,
    /// Subtypes 3-4: heading and airspeed.
    Air,
}

/// TC 19: Airborne velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AirborneVelocity {
    pub subtype: u8,
    pub kind: SpeedKind,
    /// Airspeed is true (TAS) rather than indicated. Always false for ground speed.
    pub true_airspeed: bool,
    pub speed_kts: Option<f64>,
    /// Ground track for ground speed, magnetic heading for airspeed.
    pub heading_deg: Option<f64>,
    pub vertical_rate_fpm: Option<i32>,
    /// Vertical rate source is barometric rather than GNSS.
    pub baro_vertical_rate: bool,
    /// GNSS minus barometric altitude, in feet.
    pub delta_baro_ft: Option<i32>,
}

impl AirborneVelocity {
    pub fn is_ground_speed(&self) -> bool {
        self.kind == SpeedKind::Ground
    }
}

/// Field carried by a surveillance or Comm-B reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplyField {
    Altitude(Option<i32>),
    Identity(Option<Squawk>),
}

/// DF0/4/5/16/20/21 reply contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub field: ReplyField,
    /// Present for DF4/5/20/21.
    pub flight_status: Option<FlightStatus>,
}

impl Reply {
    pub fn altitude_ft(&self) -> Option<i32> {
        match self.field {
            ReplyField::Altitude(alt) => alt,
            ReplyField::Identity(_) => None,
        }
    }

    pub fn squawk(&self) -> Option<Squawk> {
        match self.field {
            ReplyField::Identity(squawk) => squawk,
            ReplyField::Altitude(_) => None,
        }
    }
}

/// Decoded message contents, one variant per message kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DecodedPayload {
    Identification(Identification),
    AirbornePosition(AirbornePosition),
    SurfacePosition(SurfacePosition),
    AirborneVelocity(AirborneVelocity),
    OperationStatus,
    SurveillanceReply(Reply),
    CommBReply(Reply),
    AllCallReply { capability: u8 },
    CommD,
}

impl DecodedPayload {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedPayload::Identification(_) => "identification",
            DecodedPayload::AirbornePosition(_) => "airborne position",
            DecodedPayload::SurfacePosition(_) => "surface position",
            DecodedPayload::AirborneVelocity(_) => "airborne velocity",
            DecodedPayload::OperationStatus => "operation status",
            DecodedPayload::SurveillanceReply(_) => "surveillance reply",
            DecodedPayload::CommBReply(_) => "comm-b reply",
            DecodedPayload::AllCallReply { .. } => "all-call reply",
            DecodedPayload::CommD => "comm-d",
        }
    }
}

/// A qualified message together with its address and decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub frame: QualifiedMessage,
    pub address: AircraftAddress,
    pub payload: DecodedPayload,
}

// ---------------------------------------------------------------------------
// Altitude decoding
// ---------------------------------------------------------------------------

/// Decode the 13-bit AC field of DF0/4/16/20.
///
/// Bits: C1 A1 C2 A2 C4 A4 M B1 Q B2 D2 B4 D4
/// - all zero: unknown
/// - M=1: metric, 12 remaining bits in meters
/// - M=0, Q=1: 25-ft increments
/// - M=0, Q=0: Gillham gray code, not decoded
pub fn altitude_from_13_bits(ac: u16) -> Option<i32> {
    let ac = ac & 0x1FFF;
    if ac == 0 {
        return None;
    }

    if ac & 0x0040 != 0 {
        let meters = ((ac & 0x1F80) >> 1) | (ac & 0x003F);
        return Some(meters_to_feet(meters));
    }

    if ac & 0x0010 != 0 {
        // remove M and Q bits to get the 11-bit code
        let n = ((ac & 0x1F80) >> 2) | ((ac & 0x0020) >> 1) | (ac & 0x000F);
        return Some(n as i32 * 25 - 1000);
    }

    None
}

/// Decode the 12-bit altitude of an airborne position (TC 9-18).
///
/// Only the Q=1 (25-ft) encoding is decoded; Q=0 returns `None`.
pub fn barometric_altitude(alt: u16) -> Option<i32> {
    let alt = alt & 0x0FFF;
    if alt == 0 || alt & 0x0010 == 0 {
        return None;
    }
    let n = ((alt & 0x0FE0) >> 1) | (alt & 0x000F);
    Some(n as i32 * 25 - 1000)
}

/// Decode the 12-bit GNSS height of an airborne position (TC 20-22), in feet.
pub fn gnss_altitude(alt: u16) -> Option<i32> {
    let alt = alt & 0x0FFF;
    if alt == 0 {
        return None;
    }
    Some(meters_to_feet(alt))
}

fn meters_to_feet(meters: u16) -> i32 {
    (meters as f64 * FEET_PER_METER).round() as i32
}

// ---------------------------------------------------------------------------
// Identity decoding
// ---------------------------------------------------------------------------

/// Decode the 13-bit ID field of DF5/21 into a squawk.
///
/// Bits are labeled C1 A1 C2 A2 C4 A4 X B1 D1 B2 D2 B4 D4.
pub fn identity_from_bits(id: u16) -> Option<Squawk> {
    let id = id & 0x1FFF;
    if id == 0 {
        return None;
    }
    let bit = |n: u16| ((id >> n) & 1) as u8;

    let a = bit(11) | bit(9) << 1 | bit(7) << 2;
    let b = bit(5) | bit(3) << 1 | bit(1) << 2;
    let c = bit(12) | bit(10) << 1 | bit(8) << 2;
    let d = bit(4) | bit(2) << 1 | bit(0) << 2;

    Some(Squawk::from_digits(a, b, c, d))
}

/// Encode a squawk back into the 13-bit ID field layout.
pub fn identity_to_bits(squawk: Squawk) -> u16 {
    let v = squawk.value();
    let digit = |div: u16| (v / div % 10) & 0x07;
    let (a, b, c, d) = (digit(1000), digit(100), digit(10), digit(1));
    let bit = |digit: u16, weight: u16, pos: u16| ((digit >> weight) & 1) << pos;

    bit(c, 0, 12)
        | bit(a, 0, 11)
        | bit(c, 1, 10)
        | bit(a, 1, 9)
        | bit(c, 2, 8)
        | bit(a, 2, 7)
        | bit(b, 0, 5)
        | bit(d, 0, 4)
        | bit(b, 1, 3)
        | bit(d, 1, 2)
        | bit(b, 2, 1)
        | bit(d, 2, 0)
}

// ---------------------------------------------------------------------------
// Extended squitter decoders
// ---------------------------------------------------------------------------

/// Decode 8 six-bit characters from payload bytes 1-6.
pub fn callsign(me: &[u8; 7]) -> String {
    let bits = u64::from_be_bytes([0, 0, me[1], me[2], me[3], me[4], me[5], me[6]]);
    (0..8)
        .map(|i| CALLSIGN_CHARSET[((bits >> (42 - i * 6)) & 0x3F) as usize] as char)
        .collect()
}

/// TC 1-4: callsign and emitter category.
pub fn decode_identification(me: &[u8; 7]) -> Identification {
    Identification {
        callsign: callsign(me),
        category: Category::from_codes(me[0] >> 3, me[0] & 0x07),
    }
}

fn cpr_fields(me: &[u8; 7]) -> (bool, bool, u32, u32) {
    let utc = (me[2] >> 3) & 1 == 1;
    let odd = (me[2] >> 2) & 1 == 1;
    let lat = ((me[2] as u32 & 0x03) << 15) | (me[3] as u32) << 7 | (me[4] as u32) >> 1;
    let lon = ((me[4] as u32 & 0x01) << 16) | (me[5] as u32) << 8 | me[6] as u32;
    (utc, odd, lat, lon)
}

/// TC 9-18 / 20-22: airborne position.
pub fn decode_airborne_position(me: &[u8; 7]) -> AirbornePosition {
    let type_code = me[0] >> 3;
    let alt = (me[1] as u16) << 4 | (me[2] as u16) >> 4;
    let baro_altitude = type_code <= 18;
    let altitude_ft = if baro_altitude {
        barometric_altitude(alt)
    } else {
        gnss_altitude(alt)
    };
    let (utc_synchronized, odd, cpr_lat, cpr_lon) = cpr_fields(me);

    AirbornePosition {
        type_code,
        altitude_ft,
        baro_altitude,
        surveillance_status: (me[0] & 0x06) >> 1,
        single_antenna: me[0] & 0x01 == 1,
        utc_synchronized,
        odd,
        cpr_lat,
        cpr_lon,
    }
}

/// TC 5-8: surface position.
pub fn decode_surface_position(me: &[u8; 7]) -> SurfacePosition {
    let (utc_synchronized, odd, cpr_lat, cpr_lon) = cpr_fields(me);
    SurfacePosition {
        type_code: me[0] >> 3,
        movement: (me[0] & 0x07) << 4 | me[1] >> 4,
        track_valid: (me[1] >> 3) & 1 == 1,
        track_raw: (me[1] & 0x07) << 4 | me[2] >> 4,
        utc_synchronized,
        odd,
        cpr_lat,
        cpr_lon,
    }
}

/// TC 19: airborne velocity. Subtypes 1-4 only.
pub fn decode_velocity(me: &[u8; 7]) -> Result<AirborneVelocity> {
    let subtype = me[0] & 0x07;
    let factor = match subtype {
        1 | 3 => 1.0,
        2 | 4 => 4.0,
        _ => {
            return Err(DecodeError::UnsupportedSubtype {
                type_code: 19,
                subtype,
            })
        }
    };

    let first = ((me[1] as u16 & 0x03) << 8) | me[2] as u16;
    let second = ((me[3] as u16 & 0x7F) << 3) | (me[4] as u16) >> 5;

    let (kind, true_airspeed, speed_kts, heading_deg) = if subtype <= 2 {
        let (speed, heading) = if first == 0 || second == 0 {
            (None, None)
        } else {
            let vx = signed(me[1] & 0x04 != 0, (first - 1) as f64 * factor);
            let vy = signed(me[3] & 0x80 != 0, (second - 1) as f64 * factor);
            let heading = vx.atan2(vy).to_degrees().rem_euclid(360.0);
            (Some(vx.hypot(vy)), Some(heading))
        };
        (SpeedKind::Ground, false, speed, heading)
    } else {
        let heading = (me[1] & 0x04 != 0).then(|| first as f64 * 360.0 / 1024.0);
        let speed = (second != 0).then(|| (second - 1) as f64 * factor);
        (SpeedKind::Air, me[3] & 0x80 != 0, speed, heading)
    };

    let vr_raw = ((me[4] as i32 & 0x07) << 6) | (me[5] as i32) >> 2;
    let vertical_rate_fpm =
        (vr_raw != 0).then(|| signed_i32(me[4] & 0x08 != 0, (vr_raw - 1) * 64));

    let delta = (me[6] & 0x7F) as i32;
    let delta_baro_ft = (delta != 0).then(|| signed_i32(me[6] & 0x80 != 0, (delta - 1) * 25));

    Ok(AirborneVelocity {
        subtype,
        kind,
        true_airspeed,
        speed_kts,
        heading_deg,
        vertical_rate_fpm,
        baro_vertical_rate: me[4] & 0x10 != 0,
        delta_baro_ft,
    })
}

fn signed(negative: bool, value: f64) -> f64 {
    if negative {
        -value
    } else {
        value
    }
}

fn signed_i32(negative: bool, value: i32) -> i32 {
    if negative {
        -value
    } else {
        value
    }
}

/// Route an extended squitter payload by type code.
pub fn decode_extended(me: &[u8; 7]) -> Result<DecodedPayload> {
    match me[0] >> 3 {
        1..=4 => Ok(DecodedPayload::Identification(decode_identification(me))),
        5..=8 => Ok(DecodedPayload::SurfacePosition(decode_surface_position(me))),
        9..=18 | 20..=22 => Ok(DecodedPayload::AirbornePosition(decode_airborne_position(me))),
        19 => decode_velocity(me).map(DecodedPayload::AirborneVelocity),
        31 => Ok(DecodedPayload::OperationStatus),
        tc => Err(DecodeError::UnsupportedTypeCode(tc)),
    }
}

// ---------------------------------------------------------------------------
// Reply decoders
// ---------------------------------------------------------------------------

/// 13-bit AC/ID field, bits 20-32 of a reply.
fn reply_code(bytes: &[u8]) -> u16 {
    ((bytes[2] as u16 & 0x1F) << 8) | bytes[3] as u16
}

fn reply(bytes: &[u8], df: u8) -> Reply {
    let code = reply_code(bytes);
    let field = match df {
        5 | 21 => ReplyField::Identity(identity_from_bits(code)),
        _ => ReplyField::Altitude(altitude_from_13_bits(code)),
    };
    let flight_status = matches!(df, 4 | 5 | 20 | 21).then(|| FlightStatus::from_bits(bytes[0]));
    Reply {
        field,
        flight_status,
    }
}

// ---------------------------------------------------------------------------
// Main decode function
// ---------------------------------------------------------------------------

/// Decode a qualified message into its typed payload.
///
/// Routes on Downlink Format, then on type code for extended squitters.
pub fn decode(message: &QualifiedMessage) -> Result<DecodedPayload> {
    let bytes = message.bytes();
    let df = message.downlink_format();
    match message {
        QualifiedMessage::Extended(_) => {
            let mut me = [0u8; 7];
            me.copy_from_slice(&bytes[4..11]);
            decode_extended(&me)
        }
        QualifiedMessage::Short(_) => match df {
            11 => Ok(DecodedPayload::AllCallReply {
                capability: message.capability(),
            }),
            _ => Ok(DecodedPayload::SurveillanceReply(reply(bytes, df))),
        },
        QualifiedMessage::Long(_) => match df {
            16 => Ok(DecodedPayload::SurveillanceReply(reply(bytes, df))),
            20 | 21 => Ok(DecodedPayload::CommBReply(reply(bytes, df))),
            _ => Ok(DecodedPayload::CommD),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
