//! CRC-16 checksum
//!
//! Reflected CRC-16 (polynomial 0xA001, initial value 0), table driven.

/// Reflected form of the 0x8005 generator polynomial
pub const POLYNOMIAL: u16 = 0xA001;

/// Table-driven CRC-16 engine
///
/// The lookup table is computed once at construction and owned by the
/// instance; checksumming itself is pure.
#[derive(Debug, Clone)]
pub struct Crc16 {
    table: [u16; 256],
}

impl Crc16 {
    /// Build the engine and its 256-entry lookup table
    pub const fn new() -> Self {
        let mut table = [0u16; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u16;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 != 0 { (crc >> 1) ^ POLYNOMIAL } else { crc >> 1 };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        Self { table }
    }

    /// Checksum over `data`; the empty input yields 0
    pub fn checksum(&self, data: &[u8]) -> u16 {
        data.iter().fold(0u16, |crc, &byte| {
            self.table[((crc ^ byte as u16) & 0xFF) as usize] ^ (crc >> 8)
        })
    }

    /// Raw table access (for diagnostics and tests)
    pub fn table(&self) -> &[u16; 256] {
        &self.table
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}
