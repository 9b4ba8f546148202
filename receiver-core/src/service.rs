//! The periodic service tick and the process-wide receiver context.
//!
//! [`Receiver`] owns every component and all collaborator handles; one
//! instance exists for the life of the process. [`Receiver::service`] runs
//! the fixed transition order once per tick: button debounce, self-test
//! arming, tuner supervision, decoder deadlines and event polling, alarm
//! expiry, power sampling, then the user-facing refresh on its own cadence.

use heapless::String;

use crate::Monotonic;
use crate::alarm::{AlarmKind, AlertSequencer, AlertStart, SelfTestStart};
use crate::config::ReceiverConfig;
use crate::decoder::{BurstDecoder, DecoderOutput};
use crate::input::{ButtonAction, ButtonMonitor};
use crate::power::{PowerDecision, PowerMonitor};
use crate::status::{StatusFormatter, StatusSnapshot};
use crate::supervisor::{SupervisionEvent, SupervisorState, TunerSupervisor};
use crate::telemetry::{MonitorSink, TelemetryEventKind};
use crate::tuner::{AlertOutputs, ExtPowerSource, LedColor, TunerDriver, TunerEvent};

/// The one receiver instance: components plus collaborator handles.
pub struct Receiver<'c, I, T, O, P, M> {
    config: &'c ReceiverConfig,
    tuner: T,
    outputs: O,
    power_source: P,
    monitor: M,
    supervisor: TunerSupervisor<I>,
    decoder: BurstDecoder<I>,
    sequencer: AlertSequencer<I>,
    button: ButtonMonitor,
    power: PowerMonitor,
    last_power: Option<PowerDecision>,
    charge_known: Option<bool>,
    selftest_opens_at: Option<I>,
    next_refresh: Option<I>,
    fault_led_red: bool,
}

impl<'c, I, T, O, P, M> Receiver<'c, I, T, O, P, M>
where
    I: Monotonic,
    T: TunerDriver,
    O: AlertOutputs,
    P: ExtPowerSource,
    M: MonitorSink,
{
    #[must_use]
    pub fn new(config: &'c ReceiverConfig, tuner: T, outputs: O, power_source: P, monitor: M) -> Self {
        Self {
            config,
            tuner,
            outputs,
            power_source,
            monitor,
            supervisor: TunerSupervisor::new(),
            decoder: BurstDecoder::new(),
            sequencer: AlertSequencer::new(),
            button: ButtonMonitor::new(),
            power: PowerMonitor::new(),
            last_power: None,
            charge_known: None,
            selftest_opens_at: None,
            next_refresh: None,
            fault_led_red: false,
        }
    }

    /// Runs one service tick.
    ///
    /// `button_pressed` is the raw level of the user button this tick; the
    /// firmware samples the pin, the tests script it.
    pub fn service(&mut self, now: I, button_pressed: bool) {
        match self.button.update(button_pressed, self.config) {
            Some(ButtonAction::SelfTestRequested) => {
                self.monitor.event(TelemetryEventKind::SelfTestRequested);
                self.selftest_opens_at = Some(now + self.config.selftest_delay);
            }
            Some(ButtonAction::StatusRequested) => {
                self.monitor.event(TelemetryEventKind::StatusRequested);
                // Pull the next refresh forward to this tick.
                self.next_refresh = Some(now);
            }
            None => {}
        }

        if let Some(opens_at) = self.selftest_opens_at
            && now >= opens_at
        {
            self.selftest_opens_at = None;
            self.open_self_test(now);
        }

        match self
            .supervisor
            .service(now, &mut self.tuner, &mut self.monitor, self.config)
        {
            SupervisionEvent::Tuned(_)
            | SupervisionEvent::ChannelLost(_)
            | SupervisionEvent::FaultRaised => {
                // A channel change or halted tuner cancels any decode in
                // progress.
                self.decoder.reset();
            }
            SupervisionEvent::Idle | SupervisionEvent::NoChannelFound => {}
        }

        if let Some(output) = self.decoder.check_deadline(now) {
            self.apply_decoder_output(output, now);
        }

        if self.supervisor.state().is_locked() {
            self.poll_tuner_events(now);
        }

        if let Some(ended) = self.sequencer.tick(now) {
            self.monitor.event(TelemetryEventKind::AlarmEnded(ended));
            if ended == AlarmKind::SelfTest {
                self.decoder.set_test_window(false);
            }
            self.outputs.set_buzzer(false);
        }

        self.sample_power();

        let refresh_due = self.next_refresh.is_none_or(|at| now >= at);
        if refresh_due {
            self.next_refresh = Some(now + self.config.update_delay);
            self.refresh_outputs();
            self.emit_status();
        }
    }

    /// Current snapshot for the monitor relay.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            supervisor: self.supervisor.state(),
            channel: self.supervisor.current_channel(),
            decoder: self.decoder.state(),
            alarm: self.sequencer.active().map(|session| session.kind),
            test_window_open: self.decoder.test_window_open(),
            power_mv: self.power.estimate_mv(),
            charge_enable: self.charge_known.unwrap_or(false),
        }
    }

    #[must_use]
    pub fn supervisor(&self) -> &TunerSupervisor<I> {
        &self.supervisor
    }

    #[must_use]
    pub fn decoder(&self) -> &BurstDecoder<I> {
        &self.decoder
    }

    #[must_use]
    pub fn sequencer(&self) -> &AlertSequencer<I> {
        &self.sequencer
    }

    #[must_use]
    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut M {
        &mut self.monitor
    }

    pub fn tuner_mut(&mut self) -> &mut T {
        &mut self.tuner
    }

    #[must_use]
    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    pub fn power_source_mut(&mut self) -> &mut P {
        &mut self.power_source
    }

    fn open_self_test(&mut self, now: I) {
        match self.sequencer.start_self_test(now, self.config) {
            SelfTestStart::Started => {
                self.decoder.set_test_window(true);
                self.monitor.event(TelemetryEventKind::SelfTestArmed);
                self.monitor
                    .event(TelemetryEventKind::AlarmStarted(AlarmKind::SelfTest));
                self.outputs.set_buzzer(true);
            }
            // A live alert owns the alarm; the rehearsal is skipped.
            SelfTestStart::RefusedAlertActive => {}
        }
    }

    fn poll_tuner_events(&mut self, now: I) {
        loop {
            match self.tuner.poll_event() {
                Err(_) => {
                    self.supervisor.raise_fault(&mut self.monitor);
                    self.decoder.reset();
                    return;
                }
                Ok(None) => return,
                Ok(Some(event)) => {
                    if event == TunerEvent::PreambleSync {
                        self.monitor.event(TelemetryEventKind::PreambleDetected);
                    }
                    if let Some(output) = self.decoder.handle_event(event, now, self.config) {
                        self.apply_decoder_output(output, now);
                    }
                }
            }
        }
    }

    fn apply_decoder_output(&mut self, output: DecoderOutput, now: I) {
        match output {
            DecoderOutput::HeaderAccepted(_header) => {
                self.monitor.event(TelemetryEventKind::HeaderAccepted);
                match self.sequencer.start_alert(now, self.config) {
                    AlertStart::PreemptedSelfTest => {
                        self.monitor.event(TelemetryEventKind::SelfTestPreempted);
                        self.monitor
                            .event(TelemetryEventKind::AlarmStarted(AlarmKind::Alert));
                    }
                    AlertStart::Started => {
                        self.monitor
                            .event(TelemetryEventKind::AlarmStarted(AlarmKind::Alert));
                    }
                    AlertStart::AlreadyActive => {}
                }
                self.decoder.set_test_window(false);
                self.outputs.set_buzzer(true);
            }
            DecoderOutput::EndOfMessage => {
                self.monitor.event(TelemetryEventKind::EndOfMessage);
            }
            DecoderOutput::Discarded(reason) => {
                self.monitor
                    .event(TelemetryEventKind::HeaderDiscarded(reason));
            }
        }
    }

    fn sample_power(&mut self) {
        let decision = self.power.sample(self.power_source.read_raw(), self.config);
        if self.charge_known != Some(decision.charge_enable) {
            self.charge_known = Some(decision.charge_enable);
            self.monitor
                .event(TelemetryEventKind::ExternalPowerChanged(decision.charge_enable));
            self.outputs.set_charge_enable(decision.charge_enable);
        }
        self.last_power = Some(decision);
    }

    fn refresh_outputs(&mut self) {
        self.outputs.set_buzzer(self.sequencer.active().is_some());

        let signal = match self.supervisor.state() {
            SupervisorState::Locked => LedColor::Green,
            SupervisorState::Unlocked | SupervisorState::Lost => LedColor::Red,
            SupervisorState::Fault => {
                // Alternate red/green so a dead tuner reads differently from
                // plain loss of signal.
                self.fault_led_red = !self.fault_led_red;
                if self.fault_led_red {
                    LedColor::Red
                } else {
                    LedColor::Green
                }
            }
        };
        self.outputs.set_signal_led(signal);

        if let Some(decision) = self.last_power {
            self.outputs.set_power_led(decision.led_color());
        }
    }

    fn emit_status(&mut self) {
        let snapshot = self.snapshot();
        let formatter = StatusFormatter::new(&snapshot);

        let mut line = String::<64>::new();
        if formatter.write_tuner_line(&mut line).is_ok() {
            self.monitor.status_line(&line);
        }

        line.clear();
        if formatter.write_alarm_line(&mut line).is_ok() {
            self.monitor.status_line(&line);
        }

        line.clear();
        if formatter.write_power_line(&mut line).is_ok() {
            self.monitor.status_line(&line);
        }
    }
}
