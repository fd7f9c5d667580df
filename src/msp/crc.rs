//! # MSP Checksum
//!
//! XOR-8 checksum calculation for the MSP serial protocol.
//!
//! **Algorithm**: bitwise XOR of every byte, starting from 0x00.
//! The checksum covers the size byte, the message ID, and the payload.

/// Calculate the XOR-8 checksum over a byte slice in one pass
///
/// # Arguments
///
/// * `data` - Byte slice to checksum (size + id + payload)
///
/// # Returns
///
/// * `u8` - Calculated checksum
///
/// # Examples
///
/// ```
/// use msp_link::msp::crc::checksum;
///
/// // Zero-payload ATTITUDE_RADIANS request: size 0x00, id 0x7A
/// assert_eq!(checksum(&[0x00, 0x7A]), 0x7A);
/// ```
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &byte| crc ^ byte)
}

/// Incremental XOR-8 accumulator
///
/// The stream parser feeds bytes one at a time as they arrive off the
/// wire, so it cannot checksum a complete slice. Accumulating byte by
/// byte yields the same value as [`checksum`] over the same sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc8Xor {
    crc: u8,
}

impl Crc8Xor {
    /// Create a fresh accumulator (initial value 0x00)
    pub fn new() -> Self {
        Self { crc: 0 }
    }

    /// Fold one byte into the running checksum
    pub fn update(&mut self, byte: u8) {
        self.crc ^= byte;
    }

    /// Current checksum value
    pub fn value(&self) -> u8 {
        self.crc
    }
}
