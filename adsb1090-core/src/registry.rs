//! Aircraft registry lookup.
//!
//! The registry attaches static metadata (registration, airframe, operator)
//! to an address. Frames from addresses the registry does not know are not
//! aggregated.
//!
//! `InMemoryRegistry` loads the OpenSky aircraft database CSV. Only the
//! columns below are read; any others are ignored:
//! - `icao24`: hex address (required)
//! - `registration`, `manufacturername`, `model`, `operator`, `owner`
//! - `built`: `YYYY-MM-DD`, empty or malformed means unknown

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{AircraftAddress, DecodeError, Result};

/// Static metadata for one airframe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub registration: String,
    pub manufacturer: String,
    pub model: String,
    pub operator: String,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built: Option<NaiveDate>,
}

/// Address to metadata lookup.
pub trait Registry: Send + Sync {
    fn lookup(&self, address: AircraftAddress) -> Option<RegistryEntry>;
}

/// Registry that knows every address and has nothing to say about any of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Registry for AcceptAll {
    fn lookup(&self, _address: AircraftAddress) -> Option<RegistryEntry> {
        Some(RegistryEntry::default())
    }
}

// ---------------------------------------------------------------------------
// In-memory registry
// ---------------------------------------------------------------------------

/// One row of the OpenSky aircraft database.
#[derive(Debug, Deserialize)]
struct OpenSkyRow {
    icao24: String,
    #[serde(default)]
    registration: String,
    #[serde(default)]
    manufacturername: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    operator: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    built: String,
}

impl From<OpenSkyRow> for RegistryEntry {
    fn from(row: OpenSkyRow) -> Self {
        let built = row.built.trim();
        RegistryEntry {
            registration: row.registration,
            manufacturer: row.manufacturername,
            model: row.model,
            operator: row.operator,
            owner: row.owner,
            built: (!built.is_empty())
                .then(|| NaiveDate::parse_from_str(built, "%Y-%m-%d").ok())
                .flatten(),
        }
    }
}

/// Registry held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    entries: HashMap<AircraftAddress, RegistryEntry>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an OpenSky CSV file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            DecodeError::Registry(format!("cannot open {}: {e}", path.display()))
        })?;
        let registry = Self::from_reader(file)?;
        debug!(path = %path.display(), entries = registry.len(), "registry loaded");
        Ok(registry)
    }

    /// Load OpenSky CSV data with a header row.
    ///
    /// Rows with an unparsable address or a malformed record are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let mut registry = Self::new();
        for (index, row) in csv.deserialize::<OpenSkyRow>().enumerate() {
            // Header is line 1
            let line = index + 2;
            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_io_error() => {
                    return Err(DecodeError::Registry(format!("line {line}: {e}")))
                }
                Err(e) => {
                    warn!(line, error = %e, "skipping malformed registry row");
                    continue;
                }
            };
            let address: AircraftAddress = match row.icao24.trim().parse() {
                Ok(address) => address,
                Err(_) => {
                    warn!(line, icao24 = %row.icao24, "skipping registry row with bad address");
                    continue;
                }
            };
            registry.insert(address, row.into());
        }
        Ok(registry)
    }

    pub fn insert(&mut self, address: AircraftAddress, entry: RegistryEntry) {
        self.entries.insert(address, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose registration matches `registration`, ignoring case.
    pub fn search_registration(&self, registration: &str) -> Vec<(AircraftAddress, &RegistryEntry)> {
        let wanted = registration.trim();
        let mut found: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.registration.eq_ignore_ascii_case(wanted))
            .map(|(a, e)| (*a, e))
            .collect();
        found.sort_by_key(|(a, _)| *a);
        found
    }
}

impl Registry for InMemoryRegistry {
    fn lookup(&self, address: AircraftAddress) -> Option<RegistryEntry> {
        self.entries.get(&address).cloned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "\
icao24,registration,manufacturericao,manufacturername,model,typecode,operator,owner,built
4840d6,PH-BXA,BOEING,Boeing,737-8K2,B738,KLM,KLM Royal Dutch Airlines,1999-03-01
406b90,G-EZAB,AIRBUS,Airbus,A319-111,A319,easyJet,easyJet Airline Company,
zzzzzz,BAD-ROW,,,,,,,
346204,EC-JFN,,Airbus,A320,,,,not-a-date
";

    fn registry() -> InMemoryRegistry {
        InMemoryRegistry::from_reader(CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_load_skips_bad_address() {
        let reg = registry();
        assert_eq!(reg.len(), 3);
        assert!(!reg.is_empty());
    }

    #[test]
    fn test_lookup() {
        let reg = registry();
        let entry = reg.lookup(AircraftAddress::new(0x4840D6)).unwrap();
        assert_eq!(entry.registration, "PH-BXA");
        assert_eq!(entry.manufacturer, "Boeing");
        assert_eq!(entry.model, "737-8K2");
        assert_eq!(entry.operator, "KLM");
        assert_eq!(entry.owner, "KLM Royal Dutch Airlines");
        assert_eq!(entry.built, NaiveDate::from_ymd_opt(1999, 3, 1));

        assert!(reg.lookup(AircraftAddress::new(0x123456)).is_none());
    }

    #[test]
    fn test_built_empty_or_malformed_is_none() {
        let reg = registry();
        assert!(reg.lookup(AircraftAddress::new(0x406B90)).unwrap().built.is_none());
        assert!(reg.lookup(AircraftAddress::new(0x346204)).unwrap().built.is_none());
    }

    #[test]
    fn test_missing_optional_columns() {
        let reg = InMemoryRegistry::from_reader("icao24,registration\nabcdef,N12345\n".as_bytes())
            .unwrap();
        let entry = reg.lookup(AircraftAddress::new(0xABCDEF)).unwrap();
        assert_eq!(entry.registration, "N12345");
        assert!(entry.model.is_empty());
    }

    #[test]
    fn test_search_registration_case_insensitive() {
        let reg = registry();
        let found = reg.search_registration("ph-bxa");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, AircraftAddress::new(0x4840D6));
        assert!(reg.search_registration("X-NONE").is_empty());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();
        let reg = InMemoryRegistry::from_path(file.path()).unwrap();
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = InMemoryRegistry::from_path("/nonexistent/aircraft.csv").unwrap_err();
        assert!(matches!(err, DecodeError::Registry(_)));
    }

    #[test]
    fn test_accept_all() {
        let entry = AcceptAll.lookup(AircraftAddress::new(0x000001)).unwrap();
        assert_eq!(entry, RegistryEntry::default());
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let reg = registry();
        let json = serde_json::to_value(reg.lookup(AircraftAddress::new(0x4840D6))).unwrap();
        assert_eq!(json["registration"], "PH-BXA");
        assert_eq!(json["built"], "1999-03-01");
    }
}
