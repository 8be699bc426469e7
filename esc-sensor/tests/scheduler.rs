mod common;

use common::{Answer, Rig, at, esc_reading, run};
use esc_sensor::{Channel, DebugSlot, ESC_SENSOR_COMBINED, FrameCell, Phase, TelemetryFrame};

#[test]
fn test_no_request_before_boot_delay() {
    let cell = FrameCell::new();
    let rig = Rig::new(4);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));

    run(&mut sensor, 0, 5000);
    assert_eq!(sensor.phase(), Phase::Wait);
    assert!(rig.requests().is_empty());

    sensor.process(at(5000));
    assert_eq!(sensor.phase(), Phase::Ready { motor: 0, timeouts: 0 });
    assert!(rig.requests().is_empty());

    sensor.process(at(5001));
    assert_eq!(rig.requests(), vec![0]);
    assert!(matches!(sensor.phase(), Phase::Pending { motor: 0, timeouts: 0, .. }));
    assert_eq!(rig.debug_value(DebugSlot::MotorIndex), 1);
}

#[test]
fn test_boot_delay_counts_from_init() {
    let cell = FrameCell::new();
    let rig = Rig::new(1);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(2000)));

    run(&mut sensor, 2000, 7000);
    assert_eq!(sensor.phase(), Phase::Wait);

    sensor.process(at(7000));
    assert_eq!(sensor.phase(), Phase::Ready { motor: 0, timeouts: 0 });
}

#[test]
fn test_round_robin_visits_every_motor_in_order() {
    let cell = FrameCell::new();
    let rig = Rig::new(4);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));

    // One request every other tick, starting at 5001
    run(&mut sensor, 0, 5025);

    assert_eq!(rig.requests(), vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3]);
    for motor in 0..4 {
        assert_eq!(sensor.reading(Channel::Motor(motor)), esc_reading(motor));
    }
    assert_eq!(sensor.total_timeouts(), 0);
}

#[test]
fn test_silent_motor_skipped_after_timeout_limit() {
    let cell = FrameCell::new();
    let rig = Rig::new(3);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));

    run(&mut sensor, 0, 5007);
    assert!(!sensor.reading(Channel::Motor(1)).stale);

    rig.set_answer(1, Answer::Silent);
    rig.clear_requests();

    // Motor 1 is requested at 5009 and retried on every timeout
    run(&mut sensor, 5007, 5416);
    assert!(!sensor.reading(Channel::Motor(1)).stale);
    assert!(matches!(sensor.phase(), Phase::Pending { motor: 1, timeouts: 3, .. }));

    sensor.process(at(5416));
    assert!(sensor.reading(Channel::Motor(1)).stale);
    assert_eq!(sensor.phase(), Phase::Ready { motor: 2, timeouts: 0 });
    assert_eq!(rig.requests(), vec![0, 1, 1, 1, 1]);
    assert_eq!(sensor.total_timeouts(), 4);
    assert_eq!(rig.debug_value(DebugSlot::NumTimeouts), 4);

    sensor.process(at(5417));
    assert_eq!(rig.requests().last(), Some(&2));
    assert!(sensor.is_active());
}

#[test]
fn test_success_resets_timeout_count() {
    let cell = FrameCell::new();
    let rig = Rig::new(1);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));
    rig.set_answer(0, Answer::Silent);

    // Request at 5001, timeout at 5102, retry at 5103
    run(&mut sensor, 0, 5104);
    assert!(matches!(sensor.phase(), Phase::Pending { motor: 0, timeouts: 1, .. }));

    rig.send(TelemetryFrame::from_reading(&esc_reading(0)).as_bytes());
    sensor.process(at(5104));
    assert_eq!(sensor.phase(), Phase::Ready { motor: 0, timeouts: 0 });
    assert_eq!(sensor.reading(0u8), esc_reading(0));
}

#[test]
fn test_answer_on_deadline_tick_is_accepted() {
    let cell = FrameCell::new();
    let rig = Rig::new(1);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));
    rig.set_answer(0, Answer::Silent);

    // Request at 5001, deadline 5101
    run(&mut sensor, 0, 5102);
    assert!(matches!(sensor.phase(), Phase::Pending { timeouts: 0, .. }));

    rig.send(TelemetryFrame::from_reading(&esc_reading(0)).as_bytes());
    sensor.process(at(5102));

    assert_eq!(sensor.phase(), Phase::Ready { motor: 0, timeouts: 0 });
    assert_eq!(sensor.total_timeouts(), 0);
    assert!(!sensor.reading(0u8).stale);
}

#[test]
fn test_corrupt_frame_treated_as_no_answer() {
    let cell = FrameCell::new();
    let rig = Rig::new(1);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));
    rig.set_answer(0, Answer::Corrupt);

    run(&mut sensor, 0, 5102);
    assert!(sensor.reading(0u8).stale);
    assert!(matches!(sensor.phase(), Phase::Pending { motor: 0, timeouts: 0, .. }));

    sensor.process(at(5102));
    assert_eq!(sensor.phase(), Phase::Ready { motor: 0, timeouts: 1 });
}

#[test]
fn test_boot_chatter_is_not_taken_as_an_answer() {
    let cell = FrameCell::new();
    let rig = Rig::new(1);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));
    rig.set_answer(0, Answer::Silent);

    run(&mut sensor, 0, 100);
    rig.send(TelemetryFrame::from_reading(&esc_reading(0)).as_bytes());
    run(&mut sensor, 100, 5050);

    assert!(sensor.reading(0u8).stale);
    assert!(matches!(sensor.phase(), Phase::Pending { .. }));
}

#[test]
fn test_shrinking_motor_count_wraps_target() {
    let cell = FrameCell::new();
    let rig = Rig::new(4);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));

    run(&mut sensor, 0, 5007);
    assert_eq!(sensor.phase(), Phase::Ready { motor: 3, timeouts: 0 });

    rig.state().motor_count = 2;
    rig.clear_requests();
    run(&mut sensor, 5007, 5011);

    assert_eq!(rig.requests(), vec![0, 1]);
    assert!(sensor.reading(Channel::Motor(3)).stale);
}

#[test]
fn test_wrapped_target_starts_own_timeout_count() {
    let cell = FrameCell::new();
    let rig = Rig::new(4);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));
    rig.set_answer(3, Answer::Silent);

    // Motor 3 is requested at 5007 and times out at 5108 and 5210
    run(&mut sensor, 0, 5211);
    assert_eq!(sensor.phase(), Phase::Ready { motor: 3, timeouts: 2 });

    rig.state().motor_count = 2;
    rig.set_answer(0, Answer::Silent);
    rig.clear_requests();

    run(&mut sensor, 5211, 5618);
    assert!(matches!(sensor.phase(), Phase::Pending { motor: 0, timeouts: 3, .. }));
    assert_eq!(rig.requests(), vec![0, 0, 0, 0]);
    assert!(!sensor.reading(0u8).stale);

    sensor.process(at(5618));
    assert_eq!(sensor.phase(), Phase::Ready { motor: 1, timeouts: 0 });
    assert!(sensor.reading(0u8).stale);
}

#[test]
fn test_no_requests_without_motors() {
    let cell = FrameCell::new();
    let rig = Rig::new(0);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));

    run(&mut sensor, 0, 6000);
    assert!(rig.requests().is_empty());
    assert_eq!(sensor.phase(), Phase::Ready { motor: 0, timeouts: 0 });
}

#[test]
fn test_combined_reading_over_fresh_motors() {
    let cell = FrameCell::new();
    let rig = Rig::new(3);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));
    rig.set_answer(2, Answer::Silent);

    run(&mut sensor, 0, 5005);

    let combined = sensor.reading(ESC_SENSOR_COMBINED);
    assert!(!combined.stale);
    assert_eq!(combined.temperature, 31);
    assert_eq!(combined.voltage, 1600);
    assert_eq!(combined.current, 300);
    assert_eq!(combined.consumption, 30);
    assert_eq!(combined.rpm, 1000);

    assert_eq!(rig.debug_value(DebugSlot::Temperature), 31);
    assert_eq!(rig.debug_value(DebugSlot::Rpm), 1000);
}

#[test]
fn test_link_torn_down_after_prolonged_silence() {
    let cell = FrameCell::new();
    let rig = Rig::new(4);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));

    // Last answer is taken at 5010
    run(&mut sensor, 0, 5010);
    for motor in 0..4 {
        rig.set_answer(motor, Answer::Silent);
    }

    run(&mut sensor, 5010, 15011);
    assert!(sensor.is_active());

    sensor.process(at(15011));
    assert!(!sensor.is_active());
    assert_eq!(rig.state().closes, 1);
    assert!(sensor.reading(Channel::Combined).stale);
    for motor in 0..4u8 {
        assert!(sensor.reading(motor).stale);
    }

    rig.clear_requests();
    run(&mut sensor, 15012, 25000);
    assert!(rig.requests().is_empty());
}

#[test]
fn test_link_never_answering_is_torn_down() {
    let cell = FrameCell::new();
    let rig = Rig::new(2);
    let mut sensor = rig.sensor(&cell);
    assert!(sensor.init(at(0)));
    rig.set_answer(0, Answer::Silent);
    rig.set_answer(1, Answer::Silent);

    run(&mut sensor, 0, 15001);
    assert!(sensor.is_active());

    sensor.process(at(15001));
    assert!(!sensor.is_active());
}
