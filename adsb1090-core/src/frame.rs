//! Classify raw byte frames into Mode S message shapes.
//!
//! Responsibilities:
//! - Enforce the two legal frame sizes (56 and 112 bits)
//! - Read the Downlink Format (DF) from the top 5 bits of byte 0
//! - Map (DF, length) to `Short`, `Long` or `Extended`
//! - Expose the aircraft address, explicit or recovered from parity
//! - Expose ADS-B type code and subtype for extended squitters

use std::fmt;

use crate::crc::CrcTable;
use crate::types::{hex_decode, hex_encode, AircraftAddress, DecodeError, Result};

/// 56-bit frame size in bytes.
pub const SHORT_FRAME_LEN: usize = 7;

/// 112-bit frame size in bytes.
pub const LONG_FRAME_LEN: usize = 14;

// DFs where the address is explicit in bytes 1-3
const DF_EXPLICIT_ADDRESS: &[u8] = &[11, 17, 18, 19];

// DFs whose parity field must match the checksum exactly
const DF_CHECKED: &[u8] = &[11, 17, 18];

/// Human-readable Downlink Format name.
pub fn downlink_format_name(df: u8) -> &'static str {
    match df {
        0 => "Short air-air surveillance",
        4 => "Surveillance altitude reply",
        5 => "Surveillance identity reply",
        11 => "All-call reply",
        16 => "Long air-air surveillance",
        17 => "ADS-B extended squitter",
        18 => "TIS-B / ADS-R",
        19 => "Military extended squitter",
        20 => "Comm-B altitude reply",
        21 => "Comm-B identity reply",
        24 => "Comm-D extended length message",
        _ => "Unknown",
    }
}

// ---------------------------------------------------------------------------
// RawFrame
// ---------------------------------------------------------------------------

/// Immutable frame bytes, exactly 7 or 14 long.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RawFrame(Box<[u8]>);

impl RawFrame {
    /// Wrap bytes, rejecting any length other than 7 or 14.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        match bytes.len() {
            SHORT_FRAME_LEN | LONG_FRAME_LEN => Ok(RawFrame(bytes.into_boxed_slice())),
            len => Err(DecodeError::UnsupportedFormat {
                df: bytes.first().map(|b| b >> 3).unwrap_or(0),
                len,
            }),
        }
    }

    /// Parse a 14 or 28 character hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        RawFrame::new(hex_decode(hex)?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Downlink Format, top 5 bits of byte 0.
    pub fn downlink_format(&self) -> u8 {
        self.0[0] >> 3
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawFrame({})", self.to_hex())
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// QualifiedMessage
// ---------------------------------------------------------------------------

/// A frame whose shape has been recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualifiedMessage {
    /// DF0/4/5/11, 56 bits.
    Short(RawFrame),
    /// DF16/20/21/24, 112 bits.
    Long(RawFrame),
    /// DF17/18/19, 112 bits.
    Extended(RawFrame),
}

/// Select the message shape from (DF, length).
pub fn classify(frame: RawFrame) -> Result<QualifiedMessage> {
    let df = frame.downlink_format();
    match (df, frame.len()) {
        (0 | 4 | 5 | 11, SHORT_FRAME_LEN) => Ok(QualifiedMessage::Short(frame)),
        (16 | 20 | 21 | 24, LONG_FRAME_LEN) => Ok(QualifiedMessage::Long(frame)),
        (17..=19, LONG_FRAME_LEN) => Ok(QualifiedMessage::Extended(frame)),
        (df, len) => Err(DecodeError::UnsupportedFormat { df, len }),
    }
}

impl QualifiedMessage {
    pub fn raw(&self) -> &RawFrame {
        match self {
            QualifiedMessage::Short(f) | QualifiedMessage::Long(f) | QualifiedMessage::Extended(f) => f,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        self.raw().bytes()
    }

    pub fn downlink_format(&self) -> u8 {
        self.raw().downlink_format()
    }

    /// Low 3 bits of byte 0: capability (DF11/17), flight status (DF4/5/20/21),
    /// or control field (DF18).
    pub fn capability(&self) -> u8 {
        self.bytes()[0] & 0x07
    }

    /// True for formats whose parity field is a pure checksum.
    pub fn is_checked(&self) -> bool {
        DF_CHECKED.contains(&self.downlink_format())
    }

    /// Verify the parity field. Formats carrying an overlaid address always pass.
    pub fn verify(&self, table: &CrcTable) -> Result<()> {
        if self.is_checked() {
            table.verify(self.bytes())
        } else {
            Ok(())
        }
    }

    /// Explicit address (bytes 1-3) or address recovered from the parity field.
    pub fn address(&self, table: &CrcTable) -> AircraftAddress {
        let bytes = self.bytes();
        if DF_EXPLICIT_ADDRESS.contains(&self.downlink_format()) {
            AircraftAddress::from_bytes([bytes[1], bytes[2], bytes[3]])
        } else {
            table.recover_address(bytes)
        }
    }

    /// 56-bit ME/MB field (bytes 4-10) for 112-bit frames.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            QualifiedMessage::Short(_) => None,
            QualifiedMessage::Long(f) | QualifiedMessage::Extended(f) => Some(&f.bytes()[4..11]),
        }
    }

    /// ADS-B type code (top 5 bits of the payload). Extended squitters only.
    pub fn type_code(&self) -> Option<u8> {
        match self {
            QualifiedMessage::Extended(f) => Some(f.bytes()[4] >> 3),
            _ => None,
        }
    }

    /// ADS-B subtype (low 3 bits of the first payload byte). Extended squitters only.
    pub fn subtype(&self) -> Option<u8> {
        match self {
            QualifiedMessage::Extended(f) => Some(f.bytes()[4] & 0x07),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        downlink_format_name(self.downlink_format())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
