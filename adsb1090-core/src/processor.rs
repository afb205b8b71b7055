//! Frame ingress: classify, verify, look up, decode, store, aggregate, emit.
//!
//! `Processor::process_frame` is the synchronous decode path for one frame.
//! `run` drives it from a channel until the channel closes or the shutdown
//! token fires. Per-frame failures are logged and counted, never fatal.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::cpr::Position;
use crate::crc::CrcTable;
use crate::decode::{decode, DecodedMessage};
use crate::frame::{classify, RawFrame};
use crate::registry::Registry;
use crate::store::ExpiringStore;
use crate::tracker::{build_aircraft, AircraftRecord};
use crate::types::*;

/// Error type returned by sinks.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Destination for aggregated aircraft records.
pub trait Sink: Send {
    fn name(&self) -> &str;
    fn emit(&mut self, record: &AircraftRecord) -> std::result::Result<(), SinkError>;
}

/// Per-address message history shared with the eviction task.
pub type MessageStore = ExpiringStore<AircraftAddress, DecodedMessage>;

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct Processor {
    table: Arc<CrcTable>,
    store: Arc<MessageStore>,
    registry: Arc<dyn Registry>,
    reference: Option<Position>,
    sinks: Vec<Box<dyn Sink>>,
}

impl Processor {
    pub fn new(
        table: Arc<CrcTable>,
        store: Arc<MessageStore>,
        registry: Arc<dyn Registry>,
        reference: Option<Position>,
    ) -> Self {
        Processor {
            table,
            store,
            registry,
            reference,
            sinks: Vec::new(),
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    /// Decode one frame and hand the updated record to every sink.
    ///
    /// Frames from addresses unknown to the registry fail with
    /// `ReferenceNotFound` and are not stored.
    pub fn process_frame(&mut self, bytes: &[u8]) -> Result<()> {
        let frame = classify(RawFrame::new(bytes)?)?;
        frame.verify(&self.table)?;

        let address = frame.address(&self.table);
        let entry = self
            .registry
            .lookup(address)
            .ok_or(DecodeError::ReferenceNotFound(address))?;

        let payload = decode(&frame)?;
        trace!(address = %address, kind = payload.kind(), "decoded");

        let history = self.store.add_and_snapshot(
            address,
            DecodedMessage {
                frame,
                address,
                payload,
            },
        );
        let record = build_aircraft(address, &history, &entry, self.reference);

        for sink in &mut self.sinks {
            if let Err(e) = sink.emit(&record) {
                error!(sink = sink.name(), address = %address, "sink failed: {e}");
            }
        }
        Ok(())
    }

    /// Current record for `address`, or `None` if it has no live history or
    /// is unknown to the registry.
    pub fn aircraft(&self, address: AircraftAddress) -> Option<AircraftRecord> {
        let history = self.store.elements(&address);
        if history.is_empty() {
            return None;
        }
        let entry = self.registry.lookup(address)?;
        Some(build_aircraft(address, &history, &entry, self.reference))
    }

    /// Current records for every address in the store, sorted by address.
    pub fn all_aircraft(&self) -> Vec<AircraftRecord> {
        let mut keys = self.store.keys();
        keys.sort();
        keys.into_iter().filter_map(|a| self.aircraft(a)).collect()
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

/// Counters from one `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub received: u64,
    pub processed: u64,
    pub unsupported: u64,
    pub checksum_failures: u64,
    pub unknown_aircraft: u64,
    pub other_failures: u64,
}

impl RunStats {
    pub fn failed(&self) -> u64 {
        self.unsupported + self.checksum_failures + self.unknown_aircraft + self.other_failures
    }

    fn record(&mut self, result: &Result<()>) {
        self.received += 1;
        match result {
            Ok(()) => self.processed += 1,
            Err(
                DecodeError::UnsupportedFormat { .. }
                | DecodeError::UnsupportedTypeCode(_)
                | DecodeError::UnsupportedSubtype { .. },
            ) => self.unsupported += 1,
            Err(DecodeError::Checksum { .. }) => self.checksum_failures += 1,
            Err(DecodeError::ReferenceNotFound(_)) => self.unknown_aircraft += 1,
            Err(_) => self.other_failures += 1,
        }
    }
}

fn log_failure(err: &DecodeError) {
    match err {
        DecodeError::UnsupportedFormat { df, len } => debug!(df, len, "unsupported frame"),
        DecodeError::Checksum { .. }
        | DecodeError::UnsupportedTypeCode(_)
        | DecodeError::UnsupportedSubtype { .. } => debug!("dropped frame: {err}"),
        DecodeError::ReferenceNotFound(address) => {
            trace!(address = %address, "aircraft not in registry")
        }
        _ => warn!("frame failed: {err}"),
    }
}

/// Feed frames from `rx` through `processor` until `rx` closes or `cancel` fires.
pub async fn run(
    processor: &mut Processor,
    mut rx: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
) -> RunStats {
    let mut stats = RunStats::default();
    info!("frame processing started");

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                info!("frame processing cancelled");
                break;
            }
            frame = rx.recv() => frame,
        };

        let Some(bytes) = frame else {
            info!("frame source closed");
            break;
        };

        let result = processor.process_frame(&bytes);
        if let Err(e) = &result {
            log_failure(e);
        }
        stats.record(&result);
    }

    info!(
        received = stats.received,
        processed = stats.processed,
        failed = stats.failed(),
        "frame processing stopped"
    );
    stats
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AcceptAll, InMemoryRegistry, RegistryEntry};
    use parking_lot::Mutex;
    use std::time::Duration;

    const IDENT: &str = "8D4840D6202CC371C32CE0576098";
    const EVEN: &str = "8D40621D58C382D690C8AC2863A7";
    const ODD: &str = "8D40621D58C386435CC412692AD6";
    const CORRUPT: &str = "8D40621D59C382D690C8AC2863A7";

    struct Collect(Arc<Mutex<Vec<AircraftRecord>>>);

    impl Sink for Collect {
        fn name(&self) -> &str {
            "collect"
        }

        fn emit(&mut self, record: &AircraftRecord) -> std::result::Result<(), SinkError> {
            self.0.lock().push(record.clone());
            Ok(())
        }
    }

    struct Failing;

    impl Sink for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn emit(&mut self, _record: &AircraftRecord) -> std::result::Result<(), SinkError> {
            Err("transport down".into())
        }
    }

    fn bytes(hex: &str) -> Vec<u8> {
        hex_decode(hex).unwrap()
    }

    fn registry() -> Arc<dyn Registry> {
        let mut reg = InMemoryRegistry::new();
        reg.insert(
            AircraftAddress::new(0x40621D),
            RegistryEntry {
                registration: "TEST-1".into(),
                ..RegistryEntry::default()
            },
        );
        Arc::new(reg)
    }

    fn processor(registry: Arc<dyn Registry>) -> (Processor, Arc<Mutex<Vec<AircraftRecord>>>) {
        let store = Arc::new(MessageStore::new(Duration::from_secs(60)));
        let mut p = Processor::new(CrcTable::mode_s(), store, registry, None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        p.add_sink(Box::new(Collect(Arc::clone(&seen))));
        (p, seen)
    }

    #[test]
    fn test_process_frame_emits_record() {
        let (mut p, seen) = processor(registry());
        p.process_frame(&bytes(EVEN)).unwrap();
        p.process_frame(&bytes(ODD)).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].position.is_none());
        assert!(seen[1].position.is_some());
        assert_eq!(seen[1].registry.registration, "TEST-1");
        assert_eq!(seen[1].message_count, 2);
    }

    #[test]
    fn test_unknown_address_not_stored() {
        let (mut p, seen) = processor(registry());
        let err = p.process_frame(&bytes(IDENT)).unwrap_err();
        assert!(matches!(err, DecodeError::ReferenceNotFound(a) if a.value() == 0x4840D6));
        assert!(seen.lock().is_empty());
        assert!(p.store().is_empty());
    }

    #[test]
    fn test_checksum_failure_rejected() {
        let (mut p, seen) = processor(Arc::new(AcceptAll));
        let err = p.process_frame(&bytes(CORRUPT)).unwrap_err();
        assert!(matches!(err, DecodeError::Checksum { .. }));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_bad_length_rejected() {
        let (mut p, _) = processor(Arc::new(AcceptAll));
        let err = p.process_frame(&[0x8D, 0x40, 0x62]).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat { len: 3, .. }));
    }

    #[test]
    fn test_failing_sink_does_not_stop_others() {
        let store = Arc::new(MessageStore::new(Duration::from_secs(60)));
        let mut p = Processor::new(CrcTable::mode_s(), store, Arc::new(AcceptAll), None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        p.add_sink(Box::new(Failing));
        p.add_sink(Box::new(Collect(Arc::clone(&seen))));

        p.process_frame(&bytes(IDENT)).unwrap();
        p.process_frame(&bytes(IDENT)).unwrap();
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_aircraft_query() {
        let (mut p, _) = processor(registry());
        let address = AircraftAddress::new(0x40621D);
        assert!(p.aircraft(address).is_none());

        p.process_frame(&bytes(EVEN)).unwrap();
        p.process_frame(&bytes(ODD)).unwrap();
        let rec = p.aircraft(address).unwrap();
        assert!(rec.has_position());
        assert_eq!(rec.altitude_ft, Some(38000));
        assert_eq!(p.all_aircraft().len(), 1);
    }

    #[tokio::test]
    async fn test_run_until_channel_closes() {
        let (mut p, seen) = processor(registry());
        let (tx, rx) = mpsc::channel(16);
        for hex in [EVEN, IDENT, CORRUPT, ODD] {
            tx.send(bytes(hex)).await.unwrap();
        }
        tx.send(vec![0x00]).await.unwrap();
        drop(tx);

        let stats = run(&mut p, rx, CancellationToken::new()).await;
        assert_eq!(stats.received, 5);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.unknown_aircraft, 1);
        assert_eq!(stats.checksum_failures, 1);
        assert_eq!(stats.unsupported, 1);
        assert_eq!(stats.failed(), 3);
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (mut p, _) = processor(registry());
        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = run(&mut p, rx, cancel).await;
        assert_eq!(stats, RunStats::default());
        drop(tx);
    }
}
