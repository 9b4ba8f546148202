//! Scripted broadcast scenarios replayed against the shared receiver core.
//!
//! Each scenario wires the core to a scripted tuner, a simulated clock, and
//! transcript-recording outputs, then drives the service tick exactly as the
//! firmware would. The transcript interleaves telemetry events, status lines,
//! and indicator transitions so a full run reads like a bench log.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ops::Add;
use std::rc::Rc;
use std::time::Duration;

use receiver_core::channels::{CHANNEL_COUNT, Channel, channel_index};
use receiver_core::config::ReceiverConfig;
use receiver_core::service::Receiver;
use receiver_core::telemetry::{MonitorSink, TelemetryEventKind};
use receiver_core::tuner::{
    AlertOutputs, ExtPowerSource, LedColor, QualitySample, TunerDriver, TunerError, TunerEvent,
};

static CONFIG: ReceiverConfig = ReceiverConfig::DEFAULT;

const TORNADO_HEADER: &[u8] = b"ZCZC-WXR-TOR-039173+0030-1181503-KCLE/NWS-";

const RAW_EXTERNAL: u16 = 700;
const RAW_BATTERY: u16 = 300;

/// Which broadcast script to replay.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Scenario {
    /// A live tornado-warning burst arrives on the locked channel.
    Alert,
    /// The user holds the button and rehearses the alarm path.
    SelfTest,
    /// The locked channel fades until the receiver rescans.
    ChannelLoss,
    /// The tuner stops answering mid-operation.
    TunerFault,
}

impl Scenario {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        match tag {
            "alert" => Ok(Scenario::Alert),
            "self-test" | "selftest" => Ok(Scenario::SelfTest),
            "channel-loss" => Ok(Scenario::ChannelLoss),
            "tuner-fault" => Ok(Scenario::TunerFault),
            other => Err(format!("Unknown scenario `{other}`")),
        }
    }

    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Scenario::Alert => "alert",
            Scenario::SelfTest => "self-test",
            Scenario::ChannelLoss => "channel-loss",
            Scenario::TunerFault => "tuner-fault",
        }
    }
}

/// Runs one scenario to completion and returns its transcript.
pub fn run(scenario: Scenario) -> Vec<String> {
    let mut session = Session::new();
    match scenario {
        Scenario::Alert => session.play_alert(),
        Scenario::SelfTest => session.play_self_test(),
        Scenario::ChannelLoss => session.play_channel_loss(),
        Scenario::TunerFault => session.play_tuner_fault(),
    }
    session.into_transcript()
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
struct HostInstant(u64);

impl Add<Duration> for HostInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.as_micros() as u64)
    }
}

/// Simulated microsecond clock shared by every collaborator.
#[derive(Clone)]
struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    fn new() -> Self {
        Self(Rc::new(Cell::new(0)))
    }

    fn now(&self) -> HostInstant {
        HostInstant(self.0.get())
    }

    fn advance(&self, interval: Duration) {
        self.0.set(self.0.get() + interval.as_micros() as u64);
    }
}

/// Transcript accumulator stamped with simulation time.
#[derive(Clone)]
struct Transcript {
    clock: SimClock,
    lines: Rc<RefCell<Vec<String>>>,
}

impl Transcript {
    fn new(clock: SimClock) -> Self {
        Self {
            clock,
            lines: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn push(&self, text: &str) {
        let micros = self.clock.now().0;
        let line = format!("[{:>9.3}s] {text}", micros as f64 / 1_000_000.0);
        self.lines.borrow_mut().push(line);
    }

    fn into_lines(self) -> Vec<String> {
        self.lines.take()
    }
}

struct TunerScript {
    qualities: [QualitySample; CHANNEL_COUNT],
    events: VecDeque<TunerEvent>,
    tuned: Option<usize>,
    fail: bool,
}

impl TunerScript {
    fn strong_on(index: usize) -> Self {
        let mut qualities = [QualitySample::new(1.0, -20.0); CHANNEL_COUNT];
        qualities[index] = QualitySample::new(8.0, 24.0);
        Self {
            qualities,
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

/// Tuner whose readings and tone events follow the scenario script.
struct ScriptedTuner {
    clock: SimClock,
    script: Rc<RefCell<TunerScript>>,
}

impl TunerDriver for ScriptedTuner {
    fn tune(&mut self, channel: Channel) -> Result<(), TunerError> {
        let mut script = self.script.borrow_mut();
        if script.fail {
            return Err(TunerError::Unresponsive);
        }
        script.tuned = channel_index(channel);
        Ok(())
    }

    fn read_quality(&mut self) -> Result<QualitySample, TunerError> {
        let script = self.script.borrow();
        if script.fail {
            return Err(TunerError::Unresponsive);
        }
        let index = script.tuned.unwrap_or(0);
        Ok(script.qualities[index])
    }

    fn poll_event(&mut self) -> Result<Option<TunerEvent>, TunerError> {
        let mut script = self.script.borrow_mut();
        if script.fail {
            return Err(TunerError::Unresponsive);
        }
        Ok(script.events.pop_front())
    }

    fn pause(&mut self, interval: Duration) {
        self.clock.advance(interval);
    }
}

/// Outputs that log every indicator transition.
struct LoggingOutputs {
    transcript: Transcript,
    buzzer: bool,
    signal: Option<LedColor>,
    power: Option<LedColor>,
    charge: Option<bool>,
}

impl LoggingOutputs {
    fn new(transcript: Transcript) -> Self {
        Self {
            transcript,
            buzzer: false,
            signal: None,
            power: None,
            charge: None,
        }
    }
}

fn led_label(color: LedColor) -> &'static str {
    match color {
        LedColor::Off => "off",
        LedColor::Red => "red",
        LedColor::Green => "green",
    }
}

impl AlertOutputs for LoggingOutputs {
    fn set_buzzer(&mut self, on: bool) {
        if self.buzzer != on {
            self.buzzer = on;
            self.transcript
                .push(if on { "buzzer on" } else { "buzzer off" });
        }
    }

    fn set_signal_led(&mut self, color: LedColor) {
        if self.signal != Some(color) {
            self.signal = Some(color);
            self.transcript
                .push(&format!("signal led {}", led_label(color)));
        }
    }

    fn set_power_led(&mut self, color: LedColor) {
        if self.power != Some(color) {
            self.power = Some(color);
            self.transcript
                .push(&format!("power led {}", led_label(color)));
        }
    }

    fn set_charge_enable(&mut self, on: bool) {
        if self.charge != Some(on) {
            self.charge = Some(on);
            self.transcript
                .push(if on { "charger enabled" } else { "charger disabled" });
        }
    }
}

struct ScriptedPower {
    raw: Rc<Cell<u16>>,
}

impl ExtPowerSource for ScriptedPower {
    fn read_raw(&mut self) -> u16 {
        self.raw.get()
    }
}

/// Monitor sink that folds telemetry into the transcript.
struct TranscriptMonitor {
    transcript: Transcript,
}

impl MonitorSink for TranscriptMonitor {
    fn event(&mut self, event: TelemetryEventKind) {
        self.transcript.push(&format!("event {event}"));
    }

    fn status_line(&mut self, line: &str) {
        self.transcript.push(line);
    }
}

struct Session {
    clock: SimClock,
    transcript: Transcript,
    script: Rc<RefCell<TunerScript>>,
    raw_power: Rc<Cell<u16>>,
    receiver: Receiver<'static, HostInstant, ScriptedTuner, LoggingOutputs, ScriptedPower, TranscriptMonitor>,
}

impl Session {
    fn new() -> Self {
        let clock = SimClock::new();
        let transcript = Transcript::new(clock.clone());
        let script = Rc::new(RefCell::new(TunerScript::strong_on(0)));
        let raw_power = Rc::new(Cell::new(RAW_EXTERNAL));

        let receiver = Receiver::new(
            &CONFIG,
            ScriptedTuner {
                clock: clock.clone(),
                script: Rc::clone(&script),
            },
            LoggingOutputs::new(transcript.clone()),
            ScriptedPower {
                raw: Rc::clone(&raw_power),
            },
            TranscriptMonitor {
                transcript: transcript.clone(),
            },
        );

        Self {
            clock,
            transcript,
            script,
            raw_power,
            receiver,
        }
    }

    fn tick(&mut self, pressed: bool) {
        self.clock.advance(CONFIG.service_period());
        self.receiver.service(self.clock.now(), pressed);
    }

    fn run_for(&mut self, interval: Duration, pressed: bool) {
        let ticks = interval.as_micros() / CONFIG.service_period().as_micros();
        for _ in 0..=ticks {
            self.tick(pressed);
        }
    }

    fn play_alert(&mut self) {
        self.tick(false);
        self.run_for(Duration::from_secs(2), false);

        self.script.borrow_mut().queue_message(TORNADO_HEADER);
        self.run_for(CONFIG.alarm_time + Duration::from_secs(1), false);
    }

    fn play_self_test(&mut self) {
        self.tick(false);

        self.run_for(CONFIG.user_button_test_delay + Duration::from_millis(200), true);
        self.run_for(
            CONFIG.selftest_delay + CONFIG.test_time + Duration::from_secs(1),
            false,
        );
    }

    fn play_channel_loss(&mut self) {
        self.tick(false);
        self.run_for(Duration::from_secs(2), false);

        // The locked channel fades; a neighbor stays strong for the rescan.
        {
            let mut script = self.script.borrow_mut();
            script.qualities[0] = QualitySample::new(0.5, -30.0);
            script.qualities[2] = QualitySample::new(7.0, 18.0);
        }
        self.run_for(CONFIG.tune_lost_delay + Duration::from_secs(2), false);
    }

    fn play_tuner_fault(&mut self) {
        self.tick(false);
        self.run_for(Duration::from_secs(1), false);

        // Supply drops to battery around the same time the chip dies.
        self.raw_power.set(RAW_BATTERY);
        self.script.borrow_mut().fail = true;
        self.run_for(Duration::from_secs(3), false);
    }

    fn into_transcript(self) -> Vec<String> {
        let Session { transcript, .. } = self;
        transcript.into_lines()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(lines: &[String], needle: &str) -> bool {
        lines.iter().any(|line| line.contains(needle))
    }

    #[test]
    fn alert_scenario_sounds_and_silences_the_alarm() {
        let lines = run(Scenario::Alert);
        assert!(contains(&lines, "event header-accepted"));
        assert!(contains(&lines, "event alarm-started alert"));
        assert!(contains(&lines, "buzzer on"));
        assert!(contains(&lines, "event alarm-ended alert"));
        assert!(contains(&lines, "buzzer off"));
    }

    #[test]
    fn self_test_scenario_opens_and_closes_the_window() {
        let lines = run(Scenario::SelfTest);
        assert!(contains(&lines, "event self-test-requested"));
        assert!(contains(&lines, "event alarm-started self-test"));
        assert!(contains(&lines, "event alarm-ended self-test"));
        assert!(!contains(&lines, "event header-accepted"));
    }

    #[test]
    fn channel_loss_scenario_relocks_on_a_neighbor() {
        let lines = run(Scenario::ChannelLoss);
        assert!(contains(&lines, "event channel-lost 0"));
        assert!(contains(&lines, "event channel-tuned 2"));
    }

    #[test]
    fn tuner_fault_scenario_latches_and_goes_dark() {
        let lines = run(Scenario::TunerFault);
        assert!(contains(&lines, "event tuner-fault"));
        assert!(contains(&lines, "event external-power off"));
        assert!(contains(&lines, "power led red"));
    }
}
