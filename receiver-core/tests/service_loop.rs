use core::ops::Add;
use core::time::Duration;
use std::collections::VecDeque;

use receiver_core::alarm::AlarmKind;
use receiver_core::channels::{ALL_CHANNELS, Channel};
use receiver_core::config::ReceiverConfig;
use receiver_core::service::Receiver;
use receiver_core::supervisor::SupervisorState;
use receiver_core::telemetry::{MonitorSink, TelemetryEventKind};
use receiver_core::tuner::{
    AlertOutputs, ExtPowerSource, LedColor, QualitySample, TunerDriver, TunerError, TunerEvent,
};

static CONFIG: ReceiverConfig = ReceiverConfig::DEFAULT;

const HEADER: &[u8] = b"ZCZC-WXR-TOR-039173+0030-1181503-KCLE/NWS-";

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct MockInstant(u64);

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.as_micros() as u64)
    }
}

struct ScriptedTuner {
    quality: QualitySample,
    events: VecDeque<TunerEvent>,
    tuned: Option<Channel>,
    fail: bool,
}

impl ScriptedTuner {
    fn strong() -> Self {
        Self {
            quality: QualitySample::new(8.0, 20.0),
            events: VecDeque::new(),
            tuned: None,
            fail: false,
        }
    }

    fn queue_burst(&mut self, payload: &[u8]) {
        self.events.push_back(TunerEvent::PreambleSync);
        for byte in payload {
            self.events.push_back(TunerEvent::Byte(*byte));
        }
        self.events.push_back(TunerEvent::BurstEnd);
    }

    fn queue_message(&mut self, payload: &[u8]) {
        for _ in 0..3 {
            self.queue_burst(payload);
        }
    }
}

impl TunerDriver for ScriptedTuner {
    fn tune(&mut self, channel: Channel) -> Result<(), TunerError> {
        if self.fail {
            return Err(TunerError::Unresponsive);
        }
        self.tuned = Some(channel);
        Ok(())
    }

    fn read_quality(&mut self) -> Result<QualitySample, TunerError> {
        if self.fail {
            return Err(TunerError::Unresponsive);
        }
        Ok(self.quality)
    }

    fn poll_event(&mut self) -> Result<Option<TunerEvent>, TunerError> {
        if self.fail {
            return Err(TunerError::Unresponsive);
        }
        Ok(self.events.pop_front())
    }

    fn pause(&mut self, _interval: Duration) {}
}

#[derive(Copy, Clone, Debug)]
struct RecordingOutputs {
    buzzer: bool,
    signal: LedColor,
    power: LedColor,
    charge: bool,
}

impl RecordingOutputs {
    fn new() -> Self {
        Self {
            buzzer: false,
            signal: LedColor::Off,
            power: LedColor::Off,
            charge: false,
        }
    }
}

impl AlertOutputs for RecordingOutputs {
    fn set_buzzer(&mut self, on: bool) {
        self.buzzer = on;
    }

    fn set_signal_led(&mut self, color: LedColor) {
        self.signal = color;
    }

    fn set_power_led(&mut self, color: LedColor) {
        self.power = color;
    }

    fn set_charge_enable(&mut self, on: bool) {
        self.charge = on;
    }
}

struct FixedPower {
    raw: u16,
}

impl ExtPowerSource for FixedPower {
    fn read_raw(&mut self) -> u16 {
        self.raw
    }
}

#[derive(Default)]
struct RecordingMonitor {
    events: Vec<TelemetryEventKind>,
    lines: Vec<String>,
}

impl MonitorSink for RecordingMonitor {
    fn event(&mut self, event: TelemetryEventKind) {
        self.events.push(event);
    }

    fn status_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

struct Bench {
    receiver:
        Receiver<'static, MockInstant, ScriptedTuner, RecordingOutputs, FixedPower, RecordingMonitor>,
    now: MockInstant,
}

impl Bench {
    fn new() -> Self {
        Self::with_power(700)
    }

    fn with_power(raw: u16) -> Self {
        let receiver = Receiver::new(
            &CONFIG,
            ScriptedTuner::strong(),
            RecordingOutputs::new(),
            FixedPower { raw },
            RecordingMonitor::default(),
        );
        Self {
            receiver,
            now: MockInstant(0),
        }
    }

    fn tick(&mut self, pressed: bool) {
        self.now = self.now + CONFIG.service_period();
        self.receiver.service(self.now, pressed);
    }

    fn run(&mut self, ticks: u32, pressed: bool) {
        for _ in 0..ticks {
            self.tick(pressed);
        }
    }

    fn events(&self) -> &[TelemetryEventKind] {
        &self.receiver.monitor().events
    }

    fn count(&self, event: TelemetryEventKind) -> usize {
        self.events().iter().filter(|seen| **seen == event).count()
    }
}

#[test]
fn startup_scan_locks_and_reports() {
    let mut bench = Bench::new();
    bench.tick(false);

    assert!(bench.receiver.supervisor().state().is_locked());
    assert_eq!(bench.count(TelemetryEventKind::ScanStarted), 1);
    assert_eq!(bench.count(TelemetryEventKind::ChannelTuned(0)), 1);
    assert_eq!(bench.receiver.outputs().signal, LedColor::Green);
}

#[test]
fn accepted_header_sounds_the_alarm_for_alarm_time() {
    let mut bench = Bench::new();
    bench.tick(false);

    bench.receiver.tuner_mut().queue_message(HEADER);
    bench.tick(false);

    assert_eq!(bench.count(TelemetryEventKind::HeaderAccepted), 1);
    assert_eq!(
        bench.count(TelemetryEventKind::AlarmStarted(AlarmKind::Alert)),
        1
    );
    let session = bench.receiver.sequencer().active().expect("alarm missing");
    assert_eq!(session.kind, AlarmKind::Alert);
    assert_eq!(session.duration, CONFIG.alarm_time);
    assert!(bench.receiver.outputs().buzzer);

    // The session expires on its own and silences the buzzer.
    let ticks = u32::try_from(
        CONFIG.alarm_time.as_micros() / CONFIG.service_period().as_micros(),
    )
    .unwrap();
    bench.run(ticks + 1, false);
    assert!(bench.receiver.sequencer().active().is_none());
    assert_eq!(
        bench.count(TelemetryEventKind::AlarmEnded(AlarmKind::Alert)),
        1
    );
    assert!(!bench.receiver.outputs().buzzer);
}

#[test]
fn held_button_arms_exactly_one_self_test() {
    let mut bench = Bench::new();
    bench.tick(false);

    // Hold far past the threshold: the request is edge-triggered.
    bench.run(CONFIG.button_test_delay_ticks() * 3, true);
    assert_eq!(bench.count(TelemetryEventKind::SelfTestRequested), 1);

    // The test window opens only after the arming delay.
    bench.run(25, false);
    assert_eq!(bench.count(TelemetryEventKind::SelfTestArmed), 1);
    assert_eq!(
        bench.count(TelemetryEventKind::AlarmStarted(AlarmKind::SelfTest)),
        1
    );
    let session = bench.receiver.sequencer().active().expect("session missing");
    assert_eq!(session.kind, AlarmKind::SelfTest);
    assert!(bench.receiver.decoder().test_window_open());
    assert!(bench.receiver.outputs().buzzer);

    // The self-test runs its course and closes the window.
    let ticks = u32::try_from(
        CONFIG.test_time.as_micros() / CONFIG.service_period().as_micros(),
    )
    .unwrap();
    bench.run(ticks + 1, false);
    assert_eq!(
        bench.count(TelemetryEventKind::AlarmEnded(AlarmKind::SelfTest)),
        1
    );
    assert!(!bench.receiver.decoder().test_window_open());
}

#[test]
fn alert_preempts_running_self_test() {
    let mut bench = Bench::new();
    bench.tick(false);

    bench.run(CONFIG.button_test_delay_ticks() + 2, true);
    bench.run(25, false);
    assert_eq!(
        bench.receiver.sequencer().active().map(|s| s.kind),
        Some(AlarmKind::SelfTest)
    );

    bench.receiver.tuner_mut().queue_message(HEADER);
    bench.tick(false);

    let session = bench.receiver.sequencer().active().expect("alarm missing");
    assert_eq!(session.kind, AlarmKind::Alert);
    assert_eq!(session.started_at, bench.now);
    assert_eq!(session.duration, CONFIG.alarm_time);
    assert_eq!(bench.count(TelemetryEventKind::SelfTestPreempted), 1);
    assert!(!bench.receiver.decoder().test_window_open());
}

#[test]
fn sustained_quality_failure_forces_a_rescan() {
    let mut bench = Bench::new();
    bench.tick(false);
    assert!(bench.receiver.supervisor().state().is_locked());

    bench.receiver.tuner_mut().quality = QualitySample::new(0.0, -20.0);
    let ticks = u32::try_from(
        CONFIG.tune_lost_delay.as_micros() / CONFIG.service_period().as_micros(),
    )
    .unwrap();
    bench.run(ticks + 2, false);

    assert_eq!(bench.count(TelemetryEventKind::ChannelLost(0)), 1);

    // Signal comes back; the rescan locks again.
    bench.receiver.tuner_mut().quality = QualitySample::new(8.0, 20.0);
    bench.run(CONFIG.button_test_delay_ticks(), false);
    assert!(bench.receiver.supervisor().state().is_locked());
    assert_eq!(bench.count(TelemetryEventKind::ChannelTuned(0)), 2);
}

#[test]
fn unresponsive_tuner_latches_fault_and_blinks() {
    let mut bench = Bench::new();
    bench.receiver.tuner_mut().fail = true;
    bench.tick(false);

    assert!(bench.receiver.supervisor().state().is_fault());
    assert_eq!(bench.count(TelemetryEventKind::TunerFault), 1);

    // Tuning halts for good; the signal LED alternates at the refresh
    // cadence so the fault reads differently from plain signal loss.
    let mut seen_red = false;
    let mut seen_green = false;
    for _ in 0..40 {
        bench.tick(false);
        match bench.receiver.outputs().signal {
            LedColor::Red => seen_red = true,
            LedColor::Green => seen_green = true,
            LedColor::Off => {}
        }
    }
    assert!(seen_red && seen_green);
    assert_eq!(bench.receiver.tuner_mut().tuned, None);
    assert_eq!(bench.count(TelemetryEventKind::ScanStarted), 1);
}

#[test]
fn power_transition_updates_charge_and_led() {
    let mut bench = Bench::with_power(700);
    bench.tick(false);

    assert_eq!(bench.count(TelemetryEventKind::ExternalPowerChanged(true)), 1);
    assert!(bench.receiver.outputs().charge);
    assert_eq!(bench.receiver.outputs().power, LedColor::Green);

    bench.receiver.power_source_mut().raw = 300;
    bench.run(20, false);

    assert_eq!(
        bench.count(TelemetryEventKind::ExternalPowerChanged(false)),
        1
    );
    assert!(!bench.receiver.outputs().charge);
    assert_eq!(bench.receiver.outputs().power, LedColor::Red);
}

#[test]
fn short_press_requests_a_status_refresh() {
    let mut bench = Bench::new();
    bench.tick(false);
    let lines_before = bench.receiver.monitor().lines.len();

    bench.run(CONFIG.button_debounce_ticks() + 1, true);
    bench.run(CONFIG.button_debounce_ticks() + 1, false);

    assert_eq!(bench.count(TelemetryEventKind::StatusRequested), 1);
    assert!(bench.receiver.monitor().lines.len() > lines_before);
    let tuner_line = bench
        .receiver
        .monitor()
        .lines
        .iter()
        .rev()
        .find(|line| line.starts_with("tuner "))
        .expect("tuner status line missing");
    assert!(tuner_line.contains("state=locked"));
}

#[test]
fn partial_bursts_never_start_a_session() {
    let mut bench = Bench::new();
    bench.tick(false);

    // Two copies only; the deadline then expires with no alarm.
    bench.receiver.tuner_mut().queue_burst(HEADER);
    bench.receiver.tuner_mut().queue_burst(HEADER);
    bench.tick(false);

    let ticks = u32::try_from(
        CONFIG.same_timeout.as_micros() / CONFIG.service_period().as_micros(),
    )
    .unwrap();
    bench.run(ticks + 1, false);

    assert_eq!(bench.count(TelemetryEventKind::HeaderAccepted), 0);
    assert!(bench.receiver.sequencer().active().is_none());
    assert_eq!(
        bench.count(TelemetryEventKind::HeaderDiscarded(
            receiver_core::decoder::DiscardReason::DeadlineExpired
        )),
        1
    );
}
