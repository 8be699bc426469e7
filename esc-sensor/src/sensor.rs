use embassy_time::Instant;

use crate::Error;
use crate::debug::{DebugSink, DebugSlot};
use crate::exchange::{FrameCell, FrameReader};
use crate::link::{Link, SerialService};
use crate::scheduler::{LinkStatus, MotorOutput, Phase, Scheduler, Timing, active_motor_count};
use crate::store::{Channel, TelemetryReading, TelemetryStore};

/// ESC telemetry subsystem.
///
/// Built inert by [`EscSensor::new`]; [`EscSensor::init`] opens the link and starts the boot
/// delay. Afterwards [`EscSensor::process`] is called at the control loop cadence. Dropping the
/// sensor releases the serial port.
pub struct EscSensor<'a, S, M, D = ()>
where
    S: SerialService<'a>,
    M: MotorOutput,
    D: DebugSink,
{
    link: Link<'a, S>,
    reader: FrameReader<'a>,
    store: TelemetryStore,
    scheduler: Scheduler,
    motors: M,
    debug: D,
}

impl<'a, S, M, D> EscSensor<'a, S, M, D>
where
    S: SerialService<'a>,
    M: MotorOutput,
    D: DebugSink,
{
    /// Builds the sensor around `cell`.
    ///
    /// Fails with [`Error::FrameCellTaken`] if `cell` already serves another sensor.
    pub fn new(
        cell: &'a FrameCell,
        serial: S,
        motors: M,
        debug: D,
        timing: Timing,
    ) -> Result<Self, Error> {
        let (reader, writer) = cell.split().ok_or(Error::FrameCellTaken)?;

        Ok(Self {
            link: Link::new(serial, writer),
            reader,
            store: TelemetryStore::new(),
            scheduler: Scheduler::new(timing),
            motors,
            debug,
        })
    }

    /// Opens the telemetry port and resets all readings to stale.
    ///
    /// Returns false if no port is configured or it could not be opened; the sensor then stays
    /// inactive. Also used to bring the sensor back after a link teardown.
    pub fn init(&mut self, now: Instant) -> bool {
        self.link.teardown();
        self.reader.disarm();
        self.store.reset_all();
        self.scheduler.restart(now);

        match self.link.open() {
            Ok(()) => true,
            Err(err) => {
                error!("ESC telemetry disabled: {}", err);
                false
            }
        }
    }

    /// Runs one scheduler step. Does nothing while the link is down.
    pub fn process(&mut self, now: Instant) {
        if !self.link.is_open() {
            return;
        }

        let status = self.scheduler.tick(
            now,
            &mut self.reader,
            &mut self.store,
            &mut self.motors,
            &self.debug,
        );

        if status == LinkStatus::Lost {
            error!(
                "ESCs silent for {} ms, shutting down telemetry",
                now.saturating_duration_since(self.scheduler.last_response()).as_millis()
            );
            self.teardown();
        }
    }

    /// Closes the port and marks every reading stale. Idempotent.
    pub fn teardown(&mut self) {
        self.link.teardown();
        self.reader.disarm();
        self.store.reset_all();
    }

    pub fn is_active(&self) -> bool {
        self.link.is_open()
    }

    /// Returns the reading of one motor or the combined reading.
    pub fn reading(&self, channel: impl Into<Channel>) -> TelemetryReading {
        let channel = channel.into();
        let reading = self.store.read(channel, active_motor_count(&self.motors));

        if channel == Channel::Combined && !reading.stale {
            self.debug.set(DebugSlot::Temperature, i16::from(reading.temperature));
            #[allow(clippy::cast_possible_wrap)]
            let rpm = reading.rpm as i16;
            self.debug.set(DebugSlot::Rpm, rpm);
        }

        reading
    }

    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    pub fn total_timeouts(&self) -> u16 {
        self.scheduler.total_timeouts()
    }

    /// Bytes the receive side had to drop because a frame was left unread.
    pub fn dropped_bytes(&self) -> u32 {
        self.reader.dropped()
    }
}

impl<'a, S, M, D> Drop for EscSensor<'a, S, M, D>
where
    S: SerialService<'a>,
    M: MotorOutput,
    D: DebugSink,
{
    fn drop(&mut self) {
        self.link.teardown();
        self.reader.disarm();
    }
}
