//! KISS ESC serial telemetry acquisition.
//!
//! ESCs share one half-duplex telemetry wire, so they are polled one at a time: the
//! scheduler flags a motor for telemetry through the motor output, waits for the 10 byte
//! response assembled by the byte-arrival side, validates its CRC-8 and files the reading.
//! Silent motors are retried and then skipped; a silent link is torn down for good.
//!
//! The byte-arrival side (an interrupt or another core) only ever touches a [`FrameWriter`];
//! everything else is owned by the periodic tick through [`EscSensor`].

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod macros;

pub mod debug;
pub mod exchange;
pub mod frame;
pub mod link;
pub mod scheduler;
pub mod sensor;
pub mod store;

pub use debug::{DebugSink, DebugSlot};
pub use exchange::{FrameCell, FrameReader, FrameWriter};
pub use frame::TelemetryFrame;
pub use link::{PortId, PortMode, PortOptions, SerialService};
pub use scheduler::{MotorOutput, Phase, Timing};
pub use sensor::EscSensor;
pub use store::{Channel, ESC_SENSOR_COMBINED, MAX_SUPPORTED_MOTORS, TelemetryReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No serial port is assigned to ESC telemetry in the board configuration.
    #[error("No serial port is assigned to ESC telemetry")]
    NoPortConfigured,
    /// The assigned port exists but could not be opened.
    #[error("Serial port {port} could not be opened")]
    PortUnavailable { port: u8 },
    /// The port cannot run with the requested options.
    #[error("Serial port does not support {baud_rate} baud receive-only")]
    UnsupportedOptions { baud_rate: u32 },
    /// The link was opened twice without a teardown in between.
    #[error("ESC telemetry link is already open")]
    AlreadyOpen,
    /// The frame cell was already split for another sensor.
    #[error("Telemetry frame cell is already in use")]
    FrameCellTaken,
    /// The serial driver did not hand the frame writer back when the port was closed.
    #[error("Serial driver did not return the frame writer")]
    SinkLost,
}
