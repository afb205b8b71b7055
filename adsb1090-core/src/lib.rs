//! adsb1090-core: Mode S / ADS-B decoding and per-aircraft aggregation.
//!
//! The decode path is synchronous: classify, verify, look up, decode,
//! store, aggregate. The only async pieces are the store eviction task and
//! the channel-driven run loop in `processor`.

pub mod config;
pub mod cpr;
pub mod crc;
pub mod decode;
pub mod frame;
pub mod processor;
pub mod registry;
pub mod store;
pub mod tracker;
pub mod types;

// Re-export commonly used types at crate root
pub use cpr::Position;
pub use crc::CrcTable;
pub use decode::{decode, DecodedMessage, DecodedPayload};
pub use frame::{classify, QualifiedMessage, RawFrame};
pub use processor::{run, MessageStore, Processor, RunStats, Sink, SinkError};
pub use registry::{AcceptAll, InMemoryRegistry, Registry, RegistryEntry};
pub use store::ExpiringStore;
pub use tracker::{build_aircraft, AircraftRecord};
pub use types::*;
