pub mod telemetry {
    use embassy_rp::uart;
    use esc_sensor::PortId;
    use static_assertions::assert_impl_all as assert_impl;

    #[allow(clippy::wildcard_imports)]
    use embassy_rp::peripherals::*;

    pub fn get_uart_config() -> uart::Config {
        let mut config = uart::Config::default();

        // KISS telemetry line settings, 8N1
        config.baudrate = esc_sensor::PortOptions::KISS.baud_rate;
        config.data_bits = uart::DataBits::DataBits8;
        config.stop_bits = uart::StopBits::STOP1;
        config.parity = uart::Parity::ParityNone;

        config
    }

    macro_rules! define_telemetry_config {
        (
            port_id: $port_id:expr,
            rx_peripheral: $uart_rx:ident,
            rx_telemetry_pin: $rx_pin:ident,
            rx_dma_channel: $dma_channel_rx:ident,
            tx_peripheral: $uart_tx:ident,
            tx_telemetry_pin: $tx_pin:ident,
            tx_dma_channel: $dma_channel_tx:ident
        ) => {
            // Assert that given telemetry pin(s) is valid
            assert_impl!($rx_pin: uart::RxPin<$uart_rx>);
            assert_impl!($tx_pin: uart::TxPin<$uart_tx>);

            /// Board identifier of the UART the ESC telemetry wire is soldered to.
            pub const TELEMETRY_PORT: PortId = PortId($port_id);

            #[cfg(not(feature = "dummy-telemetry"))]
            #[macro_export]
            macro_rules! get_telemetry_peripherals {
                ($peripherals:ident) => {
                    ::pastey::paste!{ ($peripherals.[<$uart_rx>], $peripherals.[<$rx_pin>], $peripherals.[<$dma_channel_rx>]) }
                }
            }

            #[cfg(feature = "dummy-telemetry")]
            #[macro_export]
            macro_rules! get_telemetry_peripherals {
                ($peripherals:ident) => {
                    ::pastey::paste!{(
                        $peripherals.[<$uart_rx>], $peripherals.[<$rx_pin>], $peripherals.[<$dma_channel_rx>],
                        $peripherals.[<$uart_tx>], $peripherals.[<$tx_pin>], $peripherals.[<$dma_channel_tx>],
                    )}
                }
            }

            /// Binds the UART interrupts of the receiving (and, for the dummy ESC, transmitting) peripheral.
            #[cfg(not(feature = "dummy-telemetry"))]
            #[macro_export]
            macro_rules! bind_telemetry_interrupt {
                () => {
                    ::pastey::paste! {
                        ::embassy_rp::bind_interrupts!(struct UartIrq {
                            [<$uart_rx _IRQ>] => ::embassy_rp::uart::InterruptHandler<::embassy_rp::peripherals::$uart_rx>;
                        });
                    }
                }
            }

            #[cfg(feature = "dummy-telemetry")]
            #[macro_export]
            macro_rules! bind_telemetry_interrupt {
                () => {
                    ::pastey::paste! {
                        ::embassy_rp::bind_interrupts!(struct UartIrq {
                            [<$uart_rx _IRQ>] => ::embassy_rp::uart::InterruptHandler<::embassy_rp::peripherals::$uart_rx>;
                            [<$uart_tx _IRQ>] => ::embassy_rp::uart::InterruptHandler<::embassy_rp::peripherals::$uart_tx>;
                        });
                    }
                }
            }
        };
    }

    define_telemetry_config! {
        port_id: 1,
        rx_peripheral: UART1,
        rx_telemetry_pin: PIN_5,
        rx_dma_channel: DMA_CH0,

        // The following three are only used when dummy telemetry feature is enabled.
        // Wire PIN_12 to PIN_5.
        tx_peripheral: UART0,
        tx_telemetry_pin: PIN_12,
        tx_dma_channel: DMA_CH1
    }

    /// Port the ESC sensor looks up on init. `None` leaves telemetry disabled.
    pub const ESC_SENSOR_PORT: Option<PortId> = Some(TELEMETRY_PORT);
}

pub mod dshot {
    use embassy_rp::Peri;
    use embassy_rp::pio::{self, Instance, Pin, Pio, PioPin, StateMachine};
    use fixed::FixedU32;
    use fixed::types::extra::U8;
    use rp2040_dshot::encoder::DShotSpeed;
    use static_assertions::{assert_impl_all as assert_impl, const_assert};

    #[allow(clippy::wildcard_imports)]
    use embassy_rp::peripherals::*;

    macro_rules! define_dshot_config {
        (
            motor_pins: [$m0:ident, $m1:ident, $m2:ident, $m3:ident, $m4:ident, $m5:ident, $m6:ident, $m7:ident],
            motor_count: $motor_count:expr,
            dshot_speed: $dshot_speed:expr,
            pio_clock_hz: $pio_clock:expr,
            update_rate_hz: $update_rate:expr
        ) => {
            // Ensure that all provided pins are valid.
            assert_impl!($m0: PioPin);
            assert_impl!($m1: PioPin);
            assert_impl!($m2: PioPin);
            assert_impl!($m3: PioPin);
            assert_impl!($m4: PioPin);
            assert_impl!($m5: PioPin);
            assert_impl!($m6: PioPin);
            assert_impl!($m7: PioPin);

            /// Gets the motor pins in motor order, as defined by [`define_dshot_config!`]
            #[macro_export]
            macro_rules! get_dshot_pins {
                ($peripherals:ident) => {
                    ::pastey::paste! {(
                        $peripherals.[<$m0>],
                        $peripherals.[<$m1>],
                        $peripherals.[<$m2>],
                        $peripherals.[<$m3>],
                        $peripherals.[<$m4>],
                        $peripherals.[<$m5>],
                        $peripherals.[<$m6>],
                        $peripherals.[<$m7>],
                    )}
                }
            }

            /// Motors 0-3 run on PIO0, motors 4-7 on PIO1.
            #[allow(clippy::too_many_arguments)]
            pub fn set_pio_config<'d>(
                pio0: &mut Pio<'d, PIO0>,
                pio1: &mut Pio<'d, PIO1>,
                m0: Peri<'d, $m0>,
                m1: Peri<'d, $m1>,
                m2: Peri<'d, $m2>,
                m3: Peri<'d, $m3>,
                m4: Peri<'d, $m4>,
                m5: Peri<'d, $m5>,
                m6: Peri<'d, $m6>,
                m7: Peri<'d, $m7>,
            ) {
                let m0 = pio0.common.make_pio_pin(m0);
                let m1 = pio0.common.make_pio_pin(m1);
                let m2 = pio0.common.make_pio_pin(m2);
                let m3 = pio0.common.make_pio_pin(m3);
                let m4 = pio1.common.make_pio_pin(m4);
                let m5 = pio1.common.make_pio_pin(m5);
                let m6 = pio1.common.make_pio_pin(m6);
                let m7 = pio1.common.make_pio_pin(m7);

                set_sm_config(&mut pio0.sm0, &m0);
                set_sm_config(&mut pio0.sm1, &m1);
                set_sm_config(&mut pio0.sm2, &m2);
                set_sm_config(&mut pio0.sm3, &m3);
                set_sm_config(&mut pio1.sm0, &m4);
                set_sm_config(&mut pio1.sm1, &m5);
                set_sm_config(&mut pio1.sm2, &m6);
                set_sm_config(&mut pio1.sm3, &m7);
            }

            pub const MOTOR_COUNT: u8 = $motor_count;
            const_assert!(MOTOR_COUNT as usize <= esc_sensor::MAX_SUPPORTED_MOTORS);

            pub const DSHOT_SPEED: DShotSpeed = $dshot_speed;
            pub const PIO_CLOCK_HZ: u32 = $pio_clock;
            pub const UPDATE_RATE_HZ: u32 = $update_rate;
        };
    }

    fn set_sm_config<'d, PIO: Instance, const SM: usize>(
        sm: &mut StateMachine<'d, PIO, SM>,
        pin: &Pin<'d, PIO>,
    ) {
        let mut config = pio::Config::<PIO>::default();
        config.clock_divider = PIO_CLOCK_DIVIDER;

        config.set_set_pins(&[pin]);
        config.set_out_pins(&[pin]);

        sm.set_config(&config);
    }

    define_dshot_config! {
        motor_pins: [PIN_13, PIN_14, PIN_15, PIN_16, PIN_17, PIN_18, PIN_19, PIN_20],
        motor_count: 4,
        dshot_speed: DShotSpeed::DShot300,
        pio_clock_hz: 8_000_000,
        update_rate_hz: 8_000
    }

    pub const PIO_CLOCK_DIVIDER: FixedU32<U8> = FixedU32::unwrapped_div(
        FixedU32::<U8>::const_from_int(PIO_CLOCK_HZ),
        FixedU32::<U8>::const_from_int(DSHOT_SPEED.bit_rate_hz()),
    );
}
