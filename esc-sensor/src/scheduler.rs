//! Round-robin telemetry request state machine.

use embassy_time::{Duration, Instant};

use crate::debug::{DebugSink, DebugSlot};
use crate::exchange::FrameReader;
use crate::frame::TelemetryFrame;
use crate::store::{MAX_SUPPORTED_MOTORS, TelemetryReading, TelemetryStore};

/// Motor output driver, which carries telemetry requests to the ESCs.
pub trait MotorOutput {
    /// Number of motors currently driven. May change between ticks.
    fn motor_count(&self) -> u8;

    /// Asks `motor`'s ESC to send one telemetry frame.
    fn request_telemetry(&mut self, motor: u8);
}

impl<M: MotorOutput> MotorOutput for &mut M {
    fn motor_count(&self) -> u8 {
        (**self).motor_count()
    }

    fn request_telemetry(&mut self, motor: u8) {
        (**self).request_telemetry(motor);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Time after start during which ESCs are left alone to boot.
    pub boot_delay: Duration,
    /// How long a request may go unanswered. A frame only takes ~900us on the wire.
    pub request_timeout: Duration,
    /// Silence across all motors after which the link is declared dead.
    pub link_timeout: Duration,
    /// Consecutive timeouts after which a motor is skipped.
    pub timeout_limit: u8,
}

impl Timing {
    pub const KISS: Self = Self {
        boot_delay: Duration::from_millis(5000),
        request_timeout: Duration::from_millis(100),
        link_timeout: Duration::from_millis(10_000),
        timeout_limit: 4,
    };
}

impl Default for Timing {
    fn default() -> Self {
        Self::KISS
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// ESCs are booting. Received bytes are discarded.
    Wait,
    /// A request for `motor` goes out on the next tick.
    Ready { motor: u8, timeouts: u8 },
    /// Waiting for `motor` to answer.
    Pending {
        motor: u8,
        timeouts: u8,
        requested_at: Instant,
        deadline: Instant,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    Up,
    /// No motor answered within the link timeout.
    Lost,
}

pub struct Scheduler {
    timing: Timing,
    phase: Phase,
    started_at: Instant,
    last_response: Instant,
    total_timeouts: u16,
}

impl Scheduler {
    pub const fn new(timing: Timing) -> Self {
        Self {
            timing,
            phase: Phase::Wait,
            started_at: Instant::from_ticks(0),
            last_response: Instant::from_ticks(0),
            total_timeouts: 0,
        }
    }

    /// Goes back to [`Phase::Wait`], counting the boot delay from `now`.
    pub fn restart(&mut self, now: Instant) {
        self.phase = Phase::Wait;
        self.started_at = now;
        self.last_response = now;
    }

    /// Runs one step of the state machine.
    pub fn tick<M: MotorOutput, D: DebugSink>(
        &mut self,
        now: Instant,
        reader: &mut FrameReader<'_>,
        store: &mut TelemetryStore,
        motors: &mut M,
        debug: &D,
    ) -> LinkStatus {
        let motor_count = active_motor_count(motors);

        match self.phase {
            Phase::Wait => {
                if now.saturating_duration_since(self.started_at) < self.timing.boot_delay {
                    return LinkStatus::Up;
                }

                info!("ESC boot delay elapsed, requesting telemetry");
                reader.arm();
                self.last_response = now;
                self.phase = Phase::Ready { motor: 0, timeouts: 0 };
            }
            Phase::Ready { motor, timeouts } => {
                if motor_count > 0 {
                    // The motor count may have shrunk under us. Motor 0 starts its own count.
                    let (motor, timeouts) = if motor < motor_count {
                        (motor, timeouts)
                    } else {
                        (0, 0)
                    };

                    // Only bytes sent after this request belong to the answer
                    reader.restart();
                    motors.request_telemetry(motor);
                    debug.set(DebugSlot::MotorIndex, i16::from(motor) + 1);

                    self.phase = Phase::Pending {
                        motor,
                        timeouts,
                        requested_at: now,
                        deadline: now + self.timing.request_timeout,
                    };
                }
            }
            Phase::Pending {
                motor,
                timeouts,
                requested_at,
                deadline,
            } => {
                // Checked before the deadline so a late but valid answer is not penalised.
                if let Some(reading) = take_reading(reader) {
                    debug!(
                        "ESC {} answered after {} us",
                        motor,
                        now.saturating_duration_since(requested_at).as_micros()
                    );
                    store.update(motor, reading);
                    self.last_response = now;
                    self.phase = Phase::Ready {
                        motor: next_motor(motor, motor_count),
                        timeouts: 0,
                    };
                } else if now > deadline {
                    self.total_timeouts = self.total_timeouts.wrapping_add(1);
                    #[allow(clippy::cast_possible_wrap)]
                    let total_timeouts = self.total_timeouts as i16;
                    debug.set(DebugSlot::NumTimeouts, total_timeouts);

                    let timeouts = timeouts.saturating_add(1);
                    self.phase = if timeouts >= self.timing.timeout_limit {
                        warn!("ESC {} did not answer {} requests, skipping it", motor, timeouts);
                        store.invalidate(motor);
                        Phase::Ready {
                            motor: next_motor(motor, motor_count),
                            timeouts: 0,
                        }
                    } else {
                        Phase::Ready { motor, timeouts }
                    };
                }
            }
        }

        if now > self.last_response + self.timing.link_timeout {
            LinkStatus::Lost
        } else {
            LinkStatus::Up
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Timestamp of the last valid frame, or of leaving [`Phase::Wait`].
    pub fn last_response(&self) -> Instant {
        self.last_response
    }

    pub fn total_timeouts(&self) -> u16 {
        self.total_timeouts
    }
}

/// Motor count as reported by `motors`, limited to what the store can hold.
pub(crate) fn active_motor_count<M: MotorOutput>(motors: &M) -> u8 {
    #[allow(clippy::cast_possible_truncation)]
    let max = MAX_SUPPORTED_MOTORS as u8;
    motors.motor_count().min(max)
}

fn next_motor(motor: u8, motor_count: u8) -> u8 {
    if motor_count == 0 {
        return 0;
    }
    motor.wrapping_add(1) % motor_count
}

/// Takes a completed frame and validates it. Corrupt frames are dropped here.
fn take_reading(reader: &mut FrameReader<'_>) -> Option<TelemetryReading> {
    let frame = reader.take()?;
    let reading = frame.reading();

    if reading.is_none() {
        warn!(
            "Telemetry CRC mismatch! Expected {:08b}, got {:08b}. Invalid telemetry frame: {}",
            TelemetryFrame::compute_crc(frame.as_bytes()),
            frame.crc(),
            frame.as_bytes()
        );
    }

    reading
}
