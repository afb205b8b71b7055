//! Output sinks for aircraft records.
//!
//! - `JsonSink`: one camelCase JSON object per line
//! - `TextSink`: one table row per record, header on the first record

use std::io::Write;

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, Table};

use adsb1090_core::config::OutputFormat;
use adsb1090_core::{AircraftAddress, AircraftRecord, RegistryEntry, Sink, SinkError};

/// Sink writing the selected format to `out`.
pub fn for_format<W: Write + Send + 'static>(format: OutputFormat, out: W) -> Box<dyn Sink> {
    match format {
        OutputFormat::Json => Box::new(JsonSink::new(out)),
        OutputFormat::Text => Box::new(TextSink::new(out)),
    }
}

// ---------------------------------------------------------------------------
// JSON lines
// ---------------------------------------------------------------------------

pub struct JsonSink<W> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        JsonSink { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Sink for JsonSink<W> {
    fn name(&self) -> &str {
        "json"
    }

    fn emit(&mut self, record: &AircraftRecord) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Text table
// ---------------------------------------------------------------------------

const HEADER: [&str; 11] = [
    "ICAO", "Callsign", "Squawk", "Alt (ft)", "Speed", "Hdg", "V/S", "Lat", "Lon", "Reg", "Msgs",
];

pub struct TextSink<W> {
    out: W,
    header_written: bool,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        TextSink {
            out,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Sink for TextSink<W> {
    fn name(&self) -> &str {
        "text"
    }

    fn emit(&mut self, record: &AircraftRecord) -> Result<(), SinkError> {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        if !self.header_written {
            table.set_header(HEADER.to_vec());
            self.header_written = true;
        }
        table.add_row(record_row(record));
        writeln!(self.out, "{table}")?;
        self.out.flush()?;
        Ok(())
    }
}

fn or_dash<T>(value: Option<T>, f: impl FnOnce(T) -> String) -> String {
    value.map(f).unwrap_or_else(|| "-".into())
}

/// Table cells for one record, in `HEADER` order.
pub fn record_row(ac: &AircraftRecord) -> Vec<Cell> {
    let speed = ac.ground_speed.or(ac.air_speed);
    let registration = if ac.registry.registration.is_empty() {
        "-"
    } else {
        ac.registry.registration.as_str()
    };
    vec![
        Cell::new(ac.address),
        Cell::new(ac.identification.as_deref().map(str::trim).unwrap_or("-")),
        Cell::new(or_dash(ac.squawk, |s| s.to_string())),
        Cell::new(or_dash(ac.altitude_ft, |a| a.to_string())),
        Cell::new(or_dash(speed, |s| format!("{s:.0}"))),
        Cell::new(or_dash(ac.heading_deg, |h| format!("{h:.1}"))),
        Cell::new(or_dash(ac.vertical_rate_fpm, |v| v.to_string())),
        Cell::new(or_dash(ac.position, |p| format!("{:.4}", p.latitude))),
        Cell::new(or_dash(ac.position, |p| format!("{:.4}", p.longitude))),
        Cell::new(registration),
        Cell::new(ac.message_count),
    ]
}

/// Summary table of several records.
pub fn records_table(records: &[AircraftRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(HEADER.to_vec());
    for ac in records {
        table.add_row(record_row(ac));
    }
    table
}

/// Registry lookup results.
pub fn registry_table(rows: &[(AircraftAddress, RegistryEntry)]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ICAO",
        "Registration",
        "Manufacturer",
        "Model",
        "Operator",
        "Owner",
        "Built",
    ]);
    for (address, e) in rows {
        table.add_row(vec![
            Cell::new(address),
            Cell::new(&e.registration),
            Cell::new(&e.manufacturer),
            Cell::new(&e.model),
            Cell::new(&e.operator),
            Cell::new(&e.owner),
            Cell::new(or_dash(e.built, |d| d.to_string())),
        ]);
    }
    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use adsb1090_core::registry::NaiveDate;
    use adsb1090_core::{Position, Squawk};

    fn record() -> AircraftRecord {
        let mut rec = AircraftRecord::new(
            AircraftAddress::new(0x4840D6),
            RegistryEntry {
                registration: "PH-BXA".into(),
                ..RegistryEntry::default()
            },
        );
        rec.identification = Some("KLM1023 ".into());
        rec.altitude_ft = Some(38000);
        rec.squawk = Some(Squawk::from_digits(1, 2, 0, 0));
        rec.position = Some(Position::new(52.2572, 3.9194));
        rec.message_count = 3;
        rec
    }

    #[test]
    fn test_json_sink_writes_lines() {
        let mut sink = JsonSink::new(Vec::new());
        sink.emit(&record()).unwrap();
        sink.emit(&record()).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let json: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(json["address"], "4840D6");
        assert_eq!(json["squawk"], "1200");
        assert_eq!(json["altitudeFt"], 38000);
        assert_eq!(json["registration"], "PH-BXA");
    }

    #[test]
    fn test_text_sink_header_once() {
        let mut sink = TextSink::new(Vec::new());
        sink.emit(&record()).unwrap();
        sink.emit(&record()).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.matches("Callsign").count(), 1);
        assert_eq!(text.matches("4840D6").count(), 2);
        assert!(text.contains("KLM1023"));
        assert!(text.contains("52.2572"));
    }

    #[test]
    fn test_record_row_placeholders() {
        let rec = AircraftRecord::new(AircraftAddress::new(0xABCDEF), RegistryEntry::default());
        let table = records_table(&[rec]);
        let text = table.to_string();
        assert!(text.contains("ABCDEF"));
        assert!(text.contains('-'));
    }

    #[test]
    fn test_registry_table() {
        let rows = vec![(
            AircraftAddress::new(0x4840D6),
            RegistryEntry {
                registration: "PH-BXA".into(),
                model: "737-8K2".into(),
                built: NaiveDate::from_ymd_opt(1999, 3, 1),
                ..RegistryEntry::default()
            },
        )];
        let text = registry_table(&rows).to_string();
        assert!(text.contains("PH-BXA"));
        assert!(text.contains("737-8K2"));
        assert!(text.contains("1999-03-01"));
    }

    #[test]
    fn test_for_format() {
        assert_eq!(for_format(OutputFormat::Json, Vec::new()).name(), "json");
        assert_eq!(for_format(OutputFormat::Text, Vec::new()).name(), "text");
    }
}
