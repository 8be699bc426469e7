#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embassy_time::Instant;
use esc_sensor::{
    DebugSink, DebugSlot, Error, EscSensor, FrameCell, FrameWriter, MotorOutput, PortId,
    PortOptions, SerialService, TelemetryFrame, TelemetryReading, Timing,
};

/// How a simulated ESC answers a telemetry request.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Answer {
    Silent,
    Valid,
    Corrupt,
}

pub struct RigState<'a> {
    pub port: Option<PortId>,
    pub port_works: bool,
    /// Driver that holds on to the frame writer when the port closes.
    pub keeps_sink: bool,
    pub sink: Option<FrameWriter<'a>>,
    pub opened_with: Option<PortOptions>,
    pub opens: usize,
    pub closes: usize,
    pub motor_count: u8,
    pub answers: [Answer; 8],
    pub requests: Vec<u8>,
    pub debug: [i16; 4],
}

/// A bench with ESCs wired to a serial port, shared by the mock services.
#[derive(Clone)]
pub struct Rig<'a>(Rc<RefCell<RigState<'a>>>);

pub struct TestPort<'a>(Rig<'a>);
pub struct TestMotors<'a>(Rig<'a>);
pub struct TestDebug<'a>(Rig<'a>);

pub type TestSensor<'a> = EscSensor<'a, TestPort<'a>, TestMotors<'a>, TestDebug<'a>>;

/// Reading that simulated motor `motor` reports.
pub fn esc_reading(motor: u8) -> TelemetryReading {
    TelemetryReading {
        stale: false,
        temperature: 30 + motor,
        voltage: 1600,
        current: 100 * u16::from(motor + 1),
        consumption: 10 * u16::from(motor + 1),
        rpm: 1000 + u16::from(motor),
    }
}

pub fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

impl<'a> Rig<'a> {
    pub fn new(motor_count: u8) -> Self {
        Rig(Rc::new(RefCell::new(RigState {
            port: Some(PortId(2)),
            port_works: true,
            keeps_sink: false,
            sink: None,
            opened_with: None,
            opens: 0,
            closes: 0,
            motor_count,
            answers: [Answer::Valid; 8],
            requests: Vec::new(),
            debug: [0; 4],
        })))
    }

    pub fn sensor(&self, cell: &'a FrameCell) -> TestSensor<'a> {
        self.try_sensor(cell).unwrap()
    }

    pub fn try_sensor(&self, cell: &'a FrameCell) -> Result<TestSensor<'a>, Error> {
        EscSensor::new(
            cell,
            TestPort(self.clone()),
            TestMotors(self.clone()),
            TestDebug(self.clone()),
            Timing::KISS,
        )
    }

    pub fn state(&self) -> std::cell::RefMut<'_, RigState<'a>> {
        self.0.borrow_mut()
    }

    pub fn set_answer(&self, motor: u8, answer: Answer) {
        self.state().answers[usize::from(motor)] = answer;
    }

    pub fn requests(&self) -> Vec<u8> {
        self.state().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }

    pub fn debug_value(&self, slot: DebugSlot) -> i16 {
        self.state().debug[usize::from(u8::from(slot))]
    }

    /// Pushes raw bytes through the serial port, as the receive interrupt would.
    pub fn send(&self, bytes: &[u8]) {
        let mut state = self.state();
        if let Some(sink) = state.sink.as_mut() {
            for byte in bytes {
                sink.push(*byte);
            }
        }
    }
}

impl<'a> SerialService<'a> for TestPort<'a> {
    type Handle = PortId;

    fn find_port(&self) -> Option<PortId> {
        self.0.state().port
    }

    fn open(&mut self, port: PortId, options: PortOptions) -> Result<PortId, Error> {
        let mut state = self.0.state();
        if !state.port_works {
            return Err(Error::PortUnavailable { port: port.0 });
        }
        state.opened_with = Some(options);
        state.opens += 1;
        Ok(port)
    }

    fn attach(&mut self, _handle: &PortId, sink: FrameWriter<'a>) {
        self.0.state().sink = Some(sink);
    }

    fn close(&mut self, _handle: PortId) -> Option<FrameWriter<'a>> {
        let mut state = self.0.state();
        state.closes += 1;
        if state.keeps_sink {
            None
        } else {
            state.sink.take()
        }
    }
}

impl MotorOutput for TestMotors<'_> {
    fn motor_count(&self) -> u8 {
        self.0.state().motor_count
    }

    fn request_telemetry(&mut self, motor: u8) {
        let answer = {
            let mut state = self.0.state();
            state.requests.push(motor);
            state.answers[usize::from(motor)]
        };

        let mut bytes = *TelemetryFrame::from_reading(&esc_reading(motor)).as_bytes();
        match answer {
            Answer::Silent => return,
            Answer::Valid => {}
            Answer::Corrupt => bytes[9] ^= 0xFF,
        }
        self.0.send(&bytes);
    }
}

impl DebugSink for TestDebug<'_> {
    fn set(&self, slot: DebugSlot, value: i16) {
        self.0.state().debug[usize::from(u8::from(slot))] = value;
    }
}

/// Calls `process` once per millisecond over `from..to`.
pub fn run(sensor: &mut TestSensor<'_>, from: u64, to: u64) {
    for ms in from..to {
        sensor.process(at(ms));
    }
}
