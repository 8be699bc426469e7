/// Most motors the store keeps readings for.
pub const MAX_SUPPORTED_MOTORS: usize = 8;

/// Reserved motor index that selects the combined reading.
pub const ESC_SENSOR_COMBINED: u8 = 255;

/// One ESC's telemetry.
///
/// Units are those of the KISS protocol: voltage in 10mV, current in 10mA, consumption in mAh and
/// rpm in 100 ERPM. When `stale` is set the numeric fields carry no meaning.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryReading {
    pub stale: bool,
    /// Degrees C
    pub temperature: u8,
    pub voltage: u16,
    pub current: u16,
    pub consumption: u16,
    pub rpm: u16,
}

impl TelemetryReading {
    pub const STALE: Self = Self {
        stale: true,
        temperature: 0,
        voltage: 0,
        current: 0,
        consumption: 0,
        rpm: 0,
    };
}

impl Default for TelemetryReading {
    fn default() -> Self {
        Self::STALE
    }
}

/// Which reading to fetch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Motor(u8),
    /// Aggregate over all motors with fresh data.
    Combined,
}

impl From<u8> for Channel {
    fn from(index: u8) -> Self {
        match index {
            ESC_SENSOR_COMBINED => Channel::Combined,
            motor => Channel::Motor(motor),
        }
    }
}

/// Last validated reading per motor.
#[derive(Clone, Debug)]
pub struct TelemetryStore {
    readings: [TelemetryReading; MAX_SUPPORTED_MOTORS],
}

impl TelemetryStore {
    pub const fn new() -> Self {
        Self {
            readings: [TelemetryReading::STALE; MAX_SUPPORTED_MOTORS],
        }
    }

    /// Stores a freshly decoded reading for `motor`.
    pub fn update(&mut self, motor: u8, reading: TelemetryReading) {
        if let Some(slot) = self.readings.get_mut(usize::from(motor)) {
            *slot = TelemetryReading { stale: false, ..reading };
        }
    }

    pub fn invalidate(&mut self, motor: u8) {
        if let Some(slot) = self.readings.get_mut(usize::from(motor)) {
            slot.stale = true;
        }
    }

    pub fn reset_all(&mut self) {
        for reading in &mut self.readings {
            reading.stale = true;
        }
    }

    /// Returns the reading for `channel` given `motor_count` active motors.
    ///
    /// Motors at or beyond `motor_count` read as [`TelemetryReading::STALE`].
    pub fn read(&self, channel: Channel, motor_count: u8) -> TelemetryReading {
        match channel {
            Channel::Motor(motor) if motor < motor_count => self
                .readings
                .get(usize::from(motor))
                .copied()
                .unwrap_or(TelemetryReading::STALE),
            Channel::Motor(_) => TelemetryReading::STALE,
            Channel::Combined => self.combined(motor_count),
        }
    }

    /// Aggregates the fresh readings of the first `motor_count` motors.
    ///
    /// Hottest temperature, mean voltage and rpm, summed current and consumption. Stale if no
    /// motor has fresh data.
    pub fn combined(&self, motor_count: u8) -> TelemetryReading {
        let count = usize::from(motor_count).min(MAX_SUPPORTED_MOTORS);

        let mut active = 0u32;
        let mut temperature = 0u8;
        let mut voltage = 0u32;
        let mut current = 0u32;
        let mut consumption = 0u32;
        let mut rpm = 0u32;

        for reading in self.readings[..count].iter().filter(|reading| !reading.stale) {
            temperature = temperature.max(reading.temperature);
            voltage += u32::from(reading.voltage);
            current += u32::from(reading.current);
            consumption += u32::from(reading.consumption);
            rpm += u32::from(reading.rpm);
            active += 1;
        }

        if active == 0 {
            return TelemetryReading::STALE;
        }

        TelemetryReading {
            stale: false,
            temperature,
            voltage: saturate(voltage / active),
            current: saturate(current),
            consumption: saturate(consumption),
            rpm: saturate(rpm / active),
        }
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn saturate(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}
