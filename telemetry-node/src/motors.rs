use defmt::{error, info};
use embassy_rp::peripherals::{PIO0, PIO1};
use embassy_time::{Duration, Ticker};
use esc_sensor::{DebugSink, DebugSlot, MAX_SUPPORTED_MOTORS, MotorOutput};
use portable_atomic::{AtomicBool, AtomicI16, Ordering};
use rp2040_dshot::driver::{DShotDriver, StandardDShotDriver};
use rp2040_dshot::encoder::Command as DShotCommand;

use crate::config::dshot::MOTOR_COUNT;

/// Telemetry requests waiting for the next DShot frame of each motor.
static TELEMETRY_REQUESTS: [AtomicBool; MAX_SUPPORTED_MOTORS] =
    [const { AtomicBool::new(false) }; MAX_SUPPORTED_MOTORS];

static DEBUG_VALUES: [AtomicI16; 4] = [const { AtomicI16::new(0) }; 4];

/// DShot frames go out at 1kHz, well inside the ESC failsafe window.
const FRAME_PERIOD: Duration = Duration::from_millis(1);

pub struct SmDriverBatch {
    pub pio0_sm0: StandardDShotDriver<'static, PIO0, 0>,
    pub pio0_sm1: StandardDShotDriver<'static, PIO0, 1>,
    pub pio0_sm2: StandardDShotDriver<'static, PIO0, 2>,
    pub pio0_sm3: StandardDShotDriver<'static, PIO0, 3>,
    pub pio1_sm0: StandardDShotDriver<'static, PIO1, 0>,
    pub pio1_sm1: StandardDShotDriver<'static, PIO1, 1>,
    pub pio1_sm2: StandardDShotDriver<'static, PIO1, 2>,
    pub pio1_sm3: StandardDShotDriver<'static, PIO1, 3>,
}

#[macro_export]
macro_rules! create_sm_driver_batch {
    ($pio0:ident, $pio1:ident) => {
        motors::SmDriverBatch {
            pio0_sm0: StandardDShotDriver::new($pio0.sm0),
            pio0_sm1: StandardDShotDriver::new($pio0.sm1),
            pio0_sm2: StandardDShotDriver::new($pio0.sm2),
            pio0_sm3: StandardDShotDriver::new($pio0.sm3),
            pio1_sm0: StandardDShotDriver::new($pio1.sm0),
            pio1_sm1: StandardDShotDriver::new($pio1.sm1),
            pio1_sm2: StandardDShotDriver::new($pio1.sm2),
            pio1_sm3: StandardDShotDriver::new($pio1.sm3),
        }
    };
}

/// Runs `$body` for every state machine, with `$motor` set to the motor it drives.
macro_rules! for_each_driver {
    ($batch: expr, |$motor: ident, $driver: ident| $body:expr) => {{
        let ($motor, $driver) = (0u8, &mut $batch.pio0_sm0); $body;
        let ($motor, $driver) = (1u8, &mut $batch.pio0_sm1); $body;
        let ($motor, $driver) = (2u8, &mut $batch.pio0_sm2); $body;
        let ($motor, $driver) = (3u8, &mut $batch.pio0_sm3); $body;
        let ($motor, $driver) = (4u8, &mut $batch.pio1_sm0); $body;
        let ($motor, $driver) = (5u8, &mut $batch.pio1_sm1); $body;
        let ($motor, $driver) = (6u8, &mut $batch.pio1_sm2); $body;
        let ($motor, $driver) = (7u8, &mut $batch.pio1_sm3); $body;
    }};
}

/// Motor output service handed to the ESC sensor. Requests are carried by the telemetry bit of
/// the next frame [`dshot_output_task`] sends to that motor.
pub struct DShotOutputs;

impl MotorOutput for DShotOutputs {
    fn motor_count(&self) -> u8 {
        MOTOR_COUNT
    }

    fn request_telemetry(&mut self, motor: u8) {
        if let Some(request) = TELEMETRY_REQUESTS.get(usize::from(motor)) {
            request.store(true, Ordering::Release);
        }
    }
}

/// Keeps the ESCs armed at zero throttle and delivers telemetry requests.
#[embassy_executor::task]
pub async fn dshot_output_task(mut sms: SmDriverBatch) {
    info!("Spawned DShot output task!");

    let mut ticker = Ticker::every(FRAME_PERIOD);
    loop {
        ticker.next().await;

        for_each_driver!(sms, |motor, driver| {
            let request = TELEMETRY_REQUESTS[usize::from(motor)].swap(false, Ordering::AcqRel);

            match driver.write_command(DShotCommand::MotorStop, request).await {
                Ok(()) if request => telemetry_requested(motor),
                Ok(()) => {}
                Err(_) => error!("Write DShot command timeout error on motor {}!", motor),
            }
        });
    }
}

#[cfg(feature = "dummy-telemetry")]
fn telemetry_requested(motor: u8) {
    if crate::telemetry::dummy::REQUESTS.try_send(motor).is_err() {
        error!("Dummy ESC request queue full, dropping request for motor {}", motor);
    }
}

#[cfg(not(feature = "dummy-telemetry"))]
fn telemetry_requested(_motor: u8) {}

/// Debug values published by the ESC sensor, read back by the status task.
pub struct DebugValues;

impl DebugValues {
    pub fn get(slot: DebugSlot) -> i16 {
        DEBUG_VALUES[usize::from(u8::from(slot))].load(Ordering::Relaxed)
    }
}

impl DebugSink for DebugValues {
    fn set(&self, slot: DebugSlot, value: i16) {
        DEBUG_VALUES[usize::from(u8::from(slot))].store(value, Ordering::Relaxed);
    }
}
