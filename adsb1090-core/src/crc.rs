//! CRC-24 checksum engine for Mode S frames.
//!
//! Generator polynomial: x^24 + x^23 + ... + x^12 + x^10 + x^3 + 1 (0x1FFF409).
//!
//! The table holds one 24-bit XOR mask per bit position of a 256-bit
//! reference frame. The checksum of an input is the XOR of the masks selected
//! by its set bits, aligned so that the input's last bit lands on position 255.
//!
//! - DF11/17/18: the trailing 24 bits must equal the checksum of the rest.
//! - DF0/4/5/16/20/21/24: the trailing 24 bits are the checksum XOR'd with
//!   the aircraft address, so XOR-ing them again recovers the address.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

use crate::types::{AircraftAddress, DecodeError, Result};

/// Mode S generator polynomial, 25 bits.
pub const MODE_S_POLYNOMIAL: u32 = 0x01FF_F409;

/// Bit positions covered by a table.
const TABLE_BITS: usize = 256;

/// Size of the parity field in bytes.
pub const PARITY_BYTES: usize = 3;

const MASK_24: u32 = 0xFF_FFFF;

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Per-bit XOR masks for one generator polynomial.
#[derive(Clone, PartialEq, Eq)]
pub struct CrcTable {
    polynomial: u32,
    masks: [u32; TABLE_BITS],
}

impl std::fmt::Debug for CrcTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrcTable")
            .field("polynomial", &format_args!("{:#09X}", self.polynomial))
            .finish_non_exhaustive()
    }
}

impl CrcTable {
    /// Build the table for a 25-bit generator polynomial.
    ///
    /// The last position holds x^24 mod P; each earlier position is the
    /// previous mask multiplied by x and reduced.
    pub fn build(polynomial: u32) -> Self {
        let mut masks = [0u32; TABLE_BITS];
        let mut mask = polynomial & MASK_24;
        masks[TABLE_BITS - 1] = mask;
        for slot in masks[..TABLE_BITS - 1].iter_mut().rev() {
            mask <<= 1;
            if mask & 0x100_0000 != 0 {
                mask ^= polynomial;
            }
            mask &= MASK_24;
            *slot = mask;
        }
        CrcTable { polynomial, masks }
    }

    /// Shared table for the Mode S polynomial.
    pub fn mode_s() -> Arc<CrcTable> {
        cached(MODE_S_POLYNOMIAL)
    }

    pub fn polynomial(&self) -> u32 {
        self.polynomial
    }

    /// 24-bit remainder of `input`. At most 32 bytes are considered; longer
    /// inputs keep their trailing 32 bytes.
    pub fn checksum(&self, input: &[u8]) -> u32 {
        let input = &input[input.len().saturating_sub(TABLE_BITS / 8)..];
        let offset = TABLE_BITS - input.len() * 8;
        let mut crc = 0u32;
        for (byte_idx, &byte) in input.iter().enumerate() {
            if byte == 0 {
                continue;
            }
            for bit in 0..8 {
                if byte & (0x80 >> bit) != 0 {
                    crc ^= self.masks[offset + byte_idx * 8 + bit];
                }
            }
        }
        crc
    }

    /// Check that the trailing parity field equals the checksum of the rest.
    pub fn verify(&self, frame: &[u8]) -> Result<()> {
        let (payload, _) = split_parity(frame);
        let expected = self.checksum(payload);
        let actual = parity(frame);
        if expected == actual {
            Ok(())
        } else {
            Err(DecodeError::Checksum { expected, actual })
        }
    }

    /// Recover an implicit address: parity field XOR checksum, byte by byte.
    pub fn recover_address(&self, frame: &[u8]) -> AircraftAddress {
        let (payload, _) = split_parity(frame);
        AircraftAddress::new(parity(frame) ^ self.checksum(payload))
    }
}

/// Split a frame into payload and trailing parity bytes.
fn split_parity(frame: &[u8]) -> (&[u8], &[u8]) {
    frame.split_at(frame.len().saturating_sub(PARITY_BYTES))
}

/// Trailing 24-bit parity field of a frame.
pub fn parity(frame: &[u8]) -> u32 {
    split_parity(frame)
        .1
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

// ---------------------------------------------------------------------------
// Process-wide cache
// ---------------------------------------------------------------------------

static TABLES: LazyLock<Mutex<HashMap<u32, Arc<CrcTable>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Table for `polynomial`, built on first use and shared afterwards.
pub fn cached(polynomial: u32) -> Arc<CrcTable> {
    let mut tables = TABLES.lock();
    Arc::clone(
        tables
            .entry(polynomial)
            .or_insert_with(|| Arc::new(CrcTable::build(polynomial))),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hex_decode;

    fn frame(hex: &str) -> Vec<u8> {
        hex_decode(hex).unwrap()
    }

    #[test]
    fn test_table_last_entry_is_generator() {
        let table = CrcTable::build(MODE_S_POLYNOMIAL);
        assert_eq!(table.masks[255], 0xFFF409);
        assert_eq!(table.masks[254], ((0xFFF409 << 1) ^ MODE_S_POLYNOMIAL) & MASK_24);
    }

    #[test]
    fn test_checksum_of_zeros_is_zero() {
        let table = CrcTable::mode_s();
        assert_eq!(table.checksum(&[0u8; 11]), 0);
    }

    #[test]
    fn test_verify_df17_identification() {
        let table = CrcTable::mode_s();
        assert!(table.verify(&frame("8D4840D6202CC371C32CE0576098")).is_ok());
        assert!(table.verify(&frame("8D406B902015A678D4D220AA4BDA")).is_ok());
    }

    #[test]
    fn test_verify_df11_short() {
        let table = CrcTable::mode_s();
        assert!(table.verify(&frame("5D4CA92BF0802F")).is_ok());
        assert!(table.verify(&frame("5D4AC9C46451EB")).is_err());
    }

    #[test]
    fn test_verify_corrupted() {
        let table = CrcTable::mode_s();
        let err = table
            .verify(&frame("8D40621D59C382D690C8AC2863A7"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Checksum { actual: 0x2863A7, .. }));
    }

    #[test]
    fn test_verify_single_bit_flip_fails() {
        let table = CrcTable::mode_s();
        let good = frame("8D485020994409940838175B284F");
        for bit in 0..(good.len() - PARITY_BYTES) * 8 {
            let mut bad = good.clone();
            bad[bit / 8] ^= 0x80 >> (bit % 8);
            assert!(table.verify(&bad).is_err(), "bit {bit} flip not detected");
        }
    }

    #[test]
    fn test_recover_address_short() {
        let table = CrcTable::mode_s();
        assert_eq!(
            table.recover_address(&frame("02E61838FB04F6")),
            AircraftAddress::new(0x346204)
        );
        assert_eq!(
            table.recover_address(&frame("2000191052962C")),
            AircraftAddress::new(0x4CA92B)
        );
        assert_eq!(
            table.recover_address(&frame("28000426550278")),
            AircraftAddress::new(0x4CA92B)
        );
    }

    #[test]
    fn test_recover_address_long() {
        let table = CrcTable::mode_s();
        assert_eq!(
            table.recover_address(&frame("A0001839CA380030AA0000C8B28A")),
            AircraftAddress::new(0x346204)
        );
        assert_eq!(
            table.recover_address(&frame("A8000CAC80105938BFF4DC616BB7")),
            AircraftAddress::new(0x346204)
        );
    }

    #[test]
    fn test_recover_address_independent_of_build_order() {
        let _other = cached(0x0100_0007);
        let _again = cached(0x01FF_0001);
        let shared = cached(MODE_S_POLYNOMIAL);
        let fresh = CrcTable::build(MODE_S_POLYNOMIAL);
        assert_eq!(*shared, fresh);

        let f = frame("02E61838FB04F6");
        assert_eq!(shared.recover_address(&f), fresh.recover_address(&f));
    }

    #[test]
    fn test_cache_returns_same_table() {
        let a = cached(MODE_S_POLYNOMIAL);
        let b = CrcTable::mode_s();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_parity() {
        assert_eq!(parity(&frame("8D4840D6202CC371C32CE0576098")), 0x576098);
        assert_eq!(parity(&[0x01, 0x02]), 0x0102);
    }
}
