//! Serial channel lifetime.

use crate::Error;
use crate::exchange::FrameWriter;

/// Board identifier of a serial port.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortId(pub u8);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortMode {
    Rx,
    Tx,
    RxTx,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortOptions {
    pub baud_rate: u32,
    pub mode: PortMode,
    pub inverted: bool,
}

impl PortOptions {
    /// KISS telemetry line: 115200 baud, the FC only listens.
    pub const KISS: Self = Self {
        baud_rate: 115_200,
        mode: PortMode::Rx,
        inverted: false,
    };
}

/// Serial driver the telemetry link runs on.
pub trait SerialService<'a> {
    /// Whatever the driver needs back to close the port.
    type Handle;

    /// Looks up the port the board configuration assigns to ESC telemetry.
    fn find_port(&self) -> Option<PortId>;

    /// Opens `port` with `options`.
    fn open(&mut self, port: PortId, options: PortOptions) -> Result<Self::Handle, Error>;

    /// Starts feeding every byte received on the open port into `sink`.
    fn attach(&mut self, handle: &Self::Handle, sink: FrameWriter<'a>);

    /// Closes the port and hands back the sink given to [`SerialService::attach`].
    fn close(&mut self, handle: Self::Handle) -> Option<FrameWriter<'a>>;
}

/// Owns the serial port used for telemetry, and the frame writer while the port is closed.
pub struct Link<'a, S: SerialService<'a>> {
    service: S,
    writer: Option<FrameWriter<'a>>,
    handle: Option<S::Handle>,
}

impl<'a, S: SerialService<'a>> Link<'a, S> {
    pub fn new(service: S, writer: FrameWriter<'a>) -> Self {
        Self {
            service,
            writer: Some(writer),
            handle: None,
        }
    }

    /// Opens the configured port at the KISS baud rate and hands it the frame writer.
    ///
    /// No retry: if this fails the link stays closed until the next call.
    pub fn open(&mut self) -> Result<(), Error> {
        if self.handle.is_some() {
            return Err(Error::AlreadyOpen);
        }
        if self.writer.is_none() {
            return Err(Error::SinkLost);
        }

        let port = self.service.find_port().ok_or(Error::NoPortConfigured)?;
        let handle = self.service.open(port, PortOptions::KISS)?;
        if let Some(writer) = self.writer.take() {
            self.service.attach(&handle, writer);
        }
        self.handle = Some(handle);

        info!("ESC telemetry link opened on port {}", port.0);
        Ok(())
    }

    /// Closes the port and takes the frame writer back. Safe to call on a closed link.
    pub fn teardown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.writer = self.service.close(handle);
        if self.writer.is_none() {
            error!("Serial driver kept the ESC telemetry frame writer, the link cannot reopen");
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}
