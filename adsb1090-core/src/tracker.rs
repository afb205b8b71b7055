//! Per-aircraft state aggregation.
//!
//! Folds one aircraft's decoded message history and its registry entry into
//! a single `AircraftRecord`. Pure logic: the caller owns the history (see
//! `store`) and decides where records go.
//!
//! Aggregation rules:
//! - Messages are bucketed by payload kind; scalar fields come from the last
//!   message of each bucket
//! - The kind of the most recent position message (airborne or surface)
//!   picks the authoritative position bucket, which is fed to CPR
//! - Altitude falls back to the latest altitude reply when the position
//!   bucket carries none
//! - `last_update` is the aggregation time, not a message time

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cpr::{self, CprFrame, Position};
use crate::decode::{
    AirbornePosition, AirborneVelocity, DecodedMessage, DecodedPayload, Identification, Reply,
    SpeedKind, SurfacePosition,
};
use crate::registry::RegistryEntry;
use crate::types::*;

// ---------------------------------------------------------------------------
// Aircraft record
// ---------------------------------------------------------------------------

/// Current state of a single aircraft.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AircraftRecord {
    pub address: AircraftAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_ft: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Latest position message was a surface report.
    pub surface: bool,

    // Velocity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_speed: Option<f64>,
    pub true_air_speed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_rate_fpm: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baro_vertical_rate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_baro_ft: Option<i32>,

    // Replies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squawk: Option<Squawk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_status: Option<FlightStatus>,

    // Metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_downlink_format: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_type_code: Option<u8>,
    pub operation_status: bool,
    pub message_count: usize,
    pub last_update: DateTime<Utc>,

    #[serde(flatten)]
    pub registry: RegistryEntry,
}

impl AircraftRecord {
    /// Empty record for `address`, stamped now.
    pub fn new(address: AircraftAddress, registry: RegistryEntry) -> Self {
        AircraftRecord {
            address,
            identification: None,
            category: None,
            altitude_ft: None,
            position: None,
            surface: false,
            ground_speed: None,
            air_speed: None,
            true_air_speed: false,
            heading_deg: None,
            vertical_rate_fpm: None,
            baro_vertical_rate: None,
            delta_baro_ft: None,
            squawk: None,
            flight_status: None,
            last_downlink_format: None,
            last_type_code: None,
            operation_status: false,
            message_count: 0,
            last_update: Utc::now(),
            registry,
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Squawking 7500, 7600 or 7700.
    pub fn emergency(&self) -> bool {
        self.squawk.is_some_and(Squawk::is_emergency)
    }

    pub fn alert(&self) -> bool {
        self.flight_status.is_some_and(FlightStatus::alert)
    }

    /// Flight status says on ground, or the latest position was a surface report.
    pub fn on_ground(&self) -> bool {
        self.surface || self.flight_status.is_some_and(FlightStatus::on_ground)
    }

    pub fn spi(&self) -> bool {
        self.flight_status.is_some_and(FlightStatus::spi)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Messages of one history, bucketed by kind. Single pass, arrival order kept.
#[derive(Default)]
struct Buckets<'a> {
    identification: Option<&'a Identification>,
    airborne: Vec<&'a AirbornePosition>,
    surface: Vec<&'a SurfacePosition>,
    velocity: Option<&'a AirborneVelocity>,
    operation_status: bool,
    altitude_reply: Option<i32>,
    squawk: Option<Squawk>,
    flight_status: Option<FlightStatus>,
    // None until a position message arrives
    latest_is_surface: Option<bool>,
}

impl<'a> Buckets<'a> {
    fn collect(history: &'a [DecodedMessage]) -> Self {
        let mut b = Buckets::default();
        for msg in history {
            match &msg.payload {
                DecodedPayload::Identification(id) => b.identification = Some(id),
                DecodedPayload::AirbornePosition(p) => {
                    b.airborne.push(p);
                    b.latest_is_surface = Some(false);
                }
                DecodedPayload::SurfacePosition(p) => {
                    b.surface.push(p);
                    b.latest_is_surface = Some(true);
                }
                DecodedPayload::AirborneVelocity(v) => b.velocity = Some(v),
                DecodedPayload::OperationStatus => b.operation_status = true,
                DecodedPayload::SurveillanceReply(r) | DecodedPayload::CommBReply(r) => {
                    b.reply(r)
                }
                DecodedPayload::AllCallReply { .. } | DecodedPayload::CommD => {}
            }
        }
        b
    }

    fn reply(&mut self, reply: &Reply) {
        if let Some(alt) = reply.altitude_ft() {
            self.altitude_reply = Some(alt);
        }
        if let Some(squawk) = reply.squawk() {
            self.squawk = Some(squawk);
        }
        if let Some(fs) = reply.flight_status {
            self.flight_status = Some(fs);
        }
    }
}

/// Split a position bucket into (latest, earlier) CPR frames.
fn cpr_frames<P>(bucket: &[&P]) -> Option<(CprFrame, Vec<CprFrame>)>
where
    for<'p> &'p P: Into<CprFrame>,
{
    let (latest, earlier) = bucket.split_last()?;
    let earlier = earlier.iter().map(|p| (*p).into()).collect();
    Some(((*latest).into(), earlier))
}

/// Build the current record for `address` from its history and registry entry.
///
/// `reference` is the receiver position, used to pick among surface CPR
/// candidates.
pub fn build_aircraft(
    address: AircraftAddress,
    history: &[DecodedMessage],
    entry: &RegistryEntry,
    reference: Option<Position>,
) -> AircraftRecord {
    let mut record = AircraftRecord::new(address, entry.clone());
    let b = Buckets::collect(history);

    record.message_count = history.len();
    record.last_downlink_format = history.last().map(|m| m.frame.downlink_format());
    record.last_type_code = history.iter().rev().find_map(|m| m.frame.type_code());
    record.operation_status = b.operation_status;

    if let Some(id) = b.identification {
        record.identification = Some(id.callsign.clone());
        record.category = Some(id.category);
    }

    if let Some(v) = b.velocity {
        match v.kind {
            SpeedKind::Ground => record.ground_speed = v.speed_kts,
            SpeedKind::Air => record.air_speed = v.speed_kts,
        }
        record.true_air_speed = v.true_airspeed;
        record.heading_deg = v.heading_deg;
        record.vertical_rate_fpm = v.vertical_rate_fpm;
        record.baro_vertical_rate = Some(v.baro_vertical_rate);
        record.delta_baro_ft = v.delta_baro_ft;
    }

    match b.latest_is_surface {
        Some(false) => {
            record.altitude_ft = b.airborne.last().and_then(|p| p.altitude_ft);
            if let Some((latest, earlier)) = cpr_frames(&b.airborne) {
                record.position = cpr::resolve(&latest, &earlier);
            }
        }
        Some(true) => {
            record.surface = true;
            if let Some(p) = b.surface.last() {
                // Surface movement supersedes airborne velocity
                if let Some(speed) = p.ground_speed_kts() {
                    record.ground_speed = Some(speed);
                    record.air_speed = None;
                    record.true_air_speed = false;
                }
                if let Some(track) = p.track_deg() {
                    record.heading_deg = Some(track);
                }
            }
            if let Some((latest, earlier)) = cpr_frames(&b.surface) {
                record.position = cpr::resolve_surface(&latest, &earlier, reference);
            }
        }
        None => {}
    }

    record.altitude_ft = record.altitude_ft.or(b.altitude_reply);
    record.squawk = b.squawk;
    record.flight_status = b.flight_status;
    record
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
