use core::cell::RefCell;

use defmt::{error, info, warn};
use embassy_rp::uart::{self, UartRx};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use esc_sensor::{Error, FrameWriter, PortId, PortMode, PortOptions, SerialService};

use crate::config::telemetry::{ESC_SENSOR_PORT, TELEMETRY_PORT};

/// Where core1 pushes received bytes. Empty while the ESC sensor has the port closed.
static RX_SINK: Mutex<CriticalSectionRawMutex, RefCell<Option<FrameWriter<'static>>>> =
    Mutex::new(RefCell::new(None));

/// The telemetry UART as seen by the ESC sensor. The hardware is owned by [`telemetry_rx_task`];
/// opening the port only attaches the frame writer to it.
pub struct UartPort;

impl SerialService<'static> for UartPort {
    type Handle = PortId;

    fn find_port(&self) -> Option<PortId> {
        ESC_SENSOR_PORT
    }

    fn open(&mut self, port: PortId, options: PortOptions) -> Result<PortId, Error> {
        if port != TELEMETRY_PORT {
            return Err(Error::PortUnavailable { port: port.0 });
        }
        // Line settings are fixed in `get_uart_config`
        if options.baud_rate != PortOptions::KISS.baud_rate
            || options.mode != PortMode::Rx
            || options.inverted
        {
            return Err(Error::UnsupportedOptions {
                baud_rate: options.baud_rate,
            });
        }

        Ok(port)
    }

    fn attach(&mut self, _handle: &PortId, sink: FrameWriter<'static>) {
        RX_SINK.lock(|cell| cell.replace(Some(sink)));
    }

    fn close(&mut self, _handle: PortId) -> Option<FrameWriter<'static>> {
        RX_SINK.lock(|cell| cell.replace(None))
    }
}

/// Byte-arrival side of the ESC sensor. Runs alone on core1.
#[embassy_executor::task]
pub async fn telemetry_rx_task(mut uart: UartRx<'static, uart::Async>) {
    info!("Spawned Core1 and telemetry executor!");

    let mut byte = [0u8; 1];

    info!("Reading ESC telemetry...");
    loop {
        if let Err(read_error) = uart.read(&mut byte).await {
            handle_uart_error(read_error);
            continue;
        }

        RX_SINK.lock(|cell| {
            if let Some(sink) = cell.borrow_mut().as_mut() {
                sink.push(byte[0]);
            }
        });
    }
}

/// Logs a failed read or write on the telemetry wire.
fn handle_uart_error(err: uart::Error) {
    match err {
        uart::Error::Overrun => warn!("ESC telemetry byte lost: UART receive FIFO overrun"),
        uart::Error::Break => warn!("ESC telemetry line held low (break), is an ESC rebooting?"),
        uart::Error::Framing => warn!("ESC telemetry byte without stop bit, check the 115200 baud wiring"),
        // Line runs 8N1, see config.rs
        uart::Error::Parity => warn!("ESC telemetry parity error on an 8N1 line"),
        _ => error!("ESC telemetry UART failed with an unknown error"),
    }
}

#[cfg(feature = "dummy-telemetry")]
pub mod dummy {
    use defmt::info;
    use embassy_rp::uart::{self, UartTx};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::channel::Channel;
    use embassy_time::{Duration, Timer};
    use esc_sensor::{TelemetryFrame, TelemetryReading};

    /// Motors whose telemetry bit went out on the DShot line.
    pub static REQUESTS: Channel<CriticalSectionRawMutex, u8, 8> = Channel::new();

    /// Plays every ESC on the looped-back telemetry wire.
    #[embassy_executor::task]
    pub async fn dummy_esc_task(mut tx: UartTx<'static, uart::Async>) {
        info!("Writing dummy ESC telemetry...");

        let mut answered: u16 = 0;
        loop {
            let motor = REQUESTS.receive().await;

            // A real ESC needs a moment to notice the request bit
            Timer::after(Duration::from_micros(200)).await;

            answered = answered.wrapping_add(1);
            let frame = TelemetryFrame::from_reading(&reading(motor, answered));
            if let Err(write_error) = tx.write(frame.as_bytes()).await {
                super::handle_uart_error(write_error);
            }
        }
    }

    fn reading(motor: u8, answered: u16) -> TelemetryReading {
        TelemetryReading {
            stale: false,
            temperature: 25 + motor,
            voltage: 1680,
            current: 120 + u16::from(motor) * 10,
            consumption: answered / 100,
            rpm: 900 + u16::from(motor) * 25,
        }
    }
}
