//! KISS ESC telemetry wire format.
//!
//! One response is 10 bytes at 115200 baud:
//!
//! | Byte | Field                          |
//! |------|--------------------------------|
//! | 0    | Temperature                    |
//! | 1-2  | Voltage (big endian)           |
//! | 3-4  | Current (big endian)           |
//! | 5-6  | Consumption (big endian)       |
//! | 7-8  | Rpm (big endian)               |
//! | 9    | CRC-8 over bytes 0-8           |

use crate::store::TelemetryReading;

/// Length of one telemetry frame in bytes.
pub const FRAME_LEN: usize = 10;

/// Number of bytes covered by the checksum.
pub const PAYLOAD_LEN: usize = FRAME_LEN - 1;

const CRC_POLYNOMIAL: u8 = 0x07;

// Const helper functions for CRC computation
const fn update_crc8(crc: u8, byte: u8) -> u8 {
    let mut crc = crc ^ byte;
    let mut bit = 0;

    while bit < 8 {
        crc = if crc & 0x80 != 0 {
            (crc << 1) ^ CRC_POLYNOMIAL
        } else {
            crc << 1
        };
        bit += 1;
    }

    crc
}

/// Computes the CRC-8 (poly 0x07, MSB first, zero seed) the ESC appends to each frame.
pub const fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0;
    let mut i = 0;

    while i < data.len() {
        crc = update_crc8(crc, data[i]);
        i += 1;
    }

    crc
}

/// A complete, not yet validated, 10 byte telemetry frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryFrame {
    raw: [u8; FRAME_LEN],
}

impl TelemetryFrame {
    /// Wraps raw bytes as received from the wire.
    pub const fn from_bytes(raw: [u8; FRAME_LEN]) -> Self {
        Self { raw }
    }

    /// Builds a frame carrying `reading`, checksum included.
    ///
    /// The stale flag is not part of the wire format and is ignored.
    pub const fn from_reading(reading: &TelemetryReading) -> Self {
        let voltage = reading.voltage.to_be_bytes();
        let current = reading.current.to_be_bytes();
        let consumption = reading.consumption.to_be_bytes();
        let rpm = reading.rpm.to_be_bytes();

        let mut raw = [
            reading.temperature,
            voltage[0],
            voltage[1],
            current[0],
            current[1],
            consumption[0],
            consumption[1],
            rpm[0],
            rpm[1],
            0,
        ];
        raw[PAYLOAD_LEN] = Self::compute_crc(&raw);

        Self { raw }
    }

    /// Computes the checksum over the first [`PAYLOAD_LEN`] bytes of `data`.
    ///
    /// Shorter slices are checksummed in full.
    pub const fn compute_crc(data: &[u8]) -> u8 {
        if data.len() > PAYLOAD_LEN {
            let (payload, _) = data.split_at(PAYLOAD_LEN);
            crc8(payload)
        } else {
            crc8(data)
        }
    }

    /// Returns the checksum byte carried by the frame.
    pub const fn crc(&self) -> u8 {
        self.raw[PAYLOAD_LEN]
    }

    /// Returns true if the carried checksum matches the payload.
    pub const fn is_valid(&self) -> bool {
        Self::compute_crc(&self.raw) == self.crc()
    }

    /// Decodes the frame into a fresh (non stale) reading.
    ///
    /// Returns [`None`] if the checksum does not match.
    pub const fn reading(&self) -> Option<TelemetryReading> {
        if !self.is_valid() {
            return None;
        }

        let raw = &self.raw;
        Some(TelemetryReading {
            stale: false,
            temperature: raw[0],
            voltage: u16::from_be_bytes([raw[1], raw[2]]),
            current: u16::from_be_bytes([raw[3], raw[4]]),
            consumption: u16::from_be_bytes([raw[5], raw[6]]),
            rpm: u16::from_be_bytes([raw[7], raw[8]]),
        })
    }

    /// Returns the raw frame bytes.
    pub const fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.raw
    }
}
