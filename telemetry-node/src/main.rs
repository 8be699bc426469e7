//! ESC telemetry node: drives up to eight DShot ESCs from the PIOs and polls their KISS
//! telemetry over a shared UART wire.
//!
//! Core1 does nothing but receive telemetry bytes. Core0 runs the DShot outputs and the ESC
//! sensor.

#![no_std]
#![no_main]

mod config;
mod motors;
mod telemetry;

use core::ptr::addr_of_mut;

use defmt::{error, info, unwrap, warn};
use embassy_executor::Executor;
use embassy_rp::bind_interrupts;
use embassy_rp::clocks::ClockConfig;
use embassy_rp::config::Config as EmbassyConfig;
use embassy_rp::multicore::{Stack, spawn_core1};
use embassy_rp::peripherals::{PIO0, PIO1};
use embassy_rp::pio::{self, Pio};
use embassy_rp::uart::UartRx;
use embassy_time::{Duration, Instant, Ticker};
use esc_sensor::{Channel, DebugSlot, EscSensor, FrameCell, Timing};
use rp2040_dshot::StandardDShotTimings;
use rp2040_dshot::driver::StandardDShotDriver;
use rp2040_dshot::program::generate_standard_dshot_program;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::config::dshot::{DSHOT_SPEED, PIO_CLOCK_HZ, UPDATE_RATE_HZ};
use crate::motors::{DShotOutputs, DebugValues};
use crate::telemetry::UartPort;

static mut CORE1_STACK: Stack<4096> = Stack::new();
static CORE0_THREAD_EXECUTOR: StaticCell<Executor> = StaticCell::new();
static CORE1_THREAD_EXECUTOR: StaticCell<Executor> = StaticCell::new();

/// Frame exchange between the UART receiver on core1 and the ESC sensor on core0.
static FRAME_CELL: FrameCell = FrameCell::new();

/// Control loop cadence the ESC sensor is ticked at.
const SENSOR_PERIOD: Duration = Duration::from_millis(1);
const REPORT_PERIOD: Duration = Duration::from_secs(1);

bind_interrupts!(struct PioIrqs {
    PIO0_IRQ_0 => pio::InterruptHandler<PIO0>;
    PIO1_IRQ_0 => pio::InterruptHandler<PIO1>;
});
bind_telemetry_interrupt!();

#[embassy_executor::task]
async fn esc_sensor_task() {
    let mut sensor =
        match EscSensor::new(&FRAME_CELL, UartPort, DShotOutputs, DebugValues, Timing::KISS) {
            Ok(sensor) => sensor,
            Err(err) => {
                error!("ESC sensor not started: {}", err);
                return;
            }
        };

    if !sensor.init(Instant::now()) {
        return;
    }

    let mut ticker = Ticker::every(SENSOR_PERIOD);
    let mut last_report = Instant::now();
    loop {
        ticker.next().await;
        let now = Instant::now();

        sensor.process(now);
        if !sensor.is_active() {
            error!("ESC telemetry stays disabled until the next reset");
            return;
        }

        if now.saturating_duration_since(last_report) < REPORT_PERIOD {
            continue;
        }
        last_report = now;

        let combined = sensor.reading(Channel::Combined);
        if combined.stale {
            warn!(
                "No fresh ESC telemetry (target motor {}, {} timeouts)",
                DebugValues::get(DebugSlot::MotorIndex),
                sensor.total_timeouts()
            );
        } else {
            info!(
                "ESCs: {} C, {} cV, {} cA, {} mAh, {} erpm/100 ({} bytes dropped)",
                combined.temperature,
                combined.voltage,
                combined.current,
                combined.consumption,
                combined.rpm,
                sensor.dropped_bytes()
            );
        }
    }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let embassy_config = EmbassyConfig::new(ClockConfig::rosc());
    let p = embassy_rp::init(embassy_config);

    let timings = StandardDShotTimings::new(DSHOT_SPEED, PIO_CLOCK_HZ, UPDATE_RATE_HZ);
    let program = generate_standard_dshot_program(&timings);
    let mut pio0 = Pio::new(p.PIO0, PioIrqs);
    let mut pio1 = Pio::new(p.PIO1, PioIrqs);
    pio0.common.load_program(&program);
    pio1.common.load_program(&program);

    let (m0, m1, m2, m3, m4, m5, m6, m7) = get_dshot_pins!(p);
    config::dshot::set_pio_config(&mut pio0, &mut pio1, m0, m1, m2, m3, m4, m5, m6, m7);

    pio0.sm0.set_enable(true);
    pio0.sm1.set_enable(true);
    pio0.sm2.set_enable(true);
    pio0.sm3.set_enable(true);
    pio1.sm0.set_enable(true);
    pio1.sm1.set_enable(true);
    pio1.sm2.set_enable(true);
    pio1.sm3.set_enable(true);
    let sm_drivers = create_sm_driver_batch!(pio0, pio1);

    #[cfg(not(feature = "dummy-telemetry"))]
    let (uart_peri, telemetry_pin, rx_dma) = get_telemetry_peripherals!(p);

    #[cfg(feature = "dummy-telemetry")]
    let (uart_peri, telemetry_pin, rx_dma, tx_uart_peri, tx_pin, tx_dma) =
        get_telemetry_peripherals!(p);

    let uart_rx = UartRx::new(
        uart_peri,
        telemetry_pin,
        UartIrq,
        rx_dma,
        config::telemetry::get_uart_config(),
    );

    #[cfg(feature = "dummy-telemetry")]
    let dummy_tx = embassy_rp::uart::UartTx::new(
        tx_uart_peri,
        tx_pin,
        tx_dma,
        config::telemetry::get_uart_config(),
    );

    spawn_core1(
        p.CORE1,
        unsafe { &mut *addr_of_mut!(CORE1_STACK) },
        move || {
            let core1_thread_executor = CORE1_THREAD_EXECUTOR.init(Executor::new());

            core1_thread_executor.run(|spawner| {
                spawner.spawn(unwrap!(telemetry::telemetry_rx_task(uart_rx)));
            })
        },
    );

    info!("Telemetry node up, {} motors configured", config::dshot::MOTOR_COUNT);

    let core0_thread_executor = CORE0_THREAD_EXECUTOR.init(Executor::new());
    core0_thread_executor.run(|spawner| {
        spawner.spawn(unwrap!(motors::dshot_output_task(sm_drivers)));
        spawner.spawn(unwrap!(esc_sensor_task()));

        #[cfg(feature = "dummy-telemetry")]
        spawner.spawn(unwrap!(telemetry::dummy::dummy_esc_task(dummy_tx)));
    })
}
