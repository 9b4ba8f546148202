//! Tuning supervision: lock, re-validate, declare lost, rescan.
//!
//! The supervisor walks `Unlocked → Locked → Lost → Unlocked`. Losing a
//! channel requires quality to stay below threshold for the whole
//! `tune_lost_delay` window; one good check resets the window. A tuner that
//! stops answering latches the terminal `Fault` state, which halts tuning
//! entirely and is signalled on the LEDs instead of retried.

use crate::Monotonic;
use crate::channels::{Channel, channel_index};
use crate::config::ReceiverConfig;
use crate::scan::{ScanOutcome, scan_channels};
use crate::telemetry::{MonitorSink, TelemetryEventKind};
use crate::tuner::TunerDriver;

/// Supervisor phases.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SupervisorState {
    /// No channel committed; scanning (or waiting to rescan).
    Unlocked,
    /// Locked to a channel and re-validating its quality.
    Locked,
    /// Sustained quality failure recognized; rescan follows immediately.
    Lost,
    /// The tuner stopped responding. Terminal.
    Fault,
}

impl SupervisorState {
    /// Returns `true` while a channel is committed.
    #[must_use]
    pub const fn is_locked(self) -> bool {
        matches!(self, SupervisorState::Locked)
    }

    /// Returns `true` once the supervisor has given up on the hardware.
    #[must_use]
    pub const fn is_fault(self) -> bool {
        matches!(self, SupervisorState::Fault)
    }
}

/// State change reported by one supervision pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SupervisionEvent {
    /// Nothing changed this pass.
    Idle,
    /// A scan selected and committed this channel.
    Tuned(Channel),
    /// A full scan found nothing acceptable; a retry is scheduled.
    NoChannelFound,
    /// The committed channel failed for the full lost window.
    ChannelLost(Channel),
    /// The tuner stopped responding; tuning is halted.
    FaultRaised,
}

/// Owns the tuned-channel state and drives scanning.
#[derive(Copy, Clone, Debug)]
pub struct TunerSupervisor<I> {
    state: SupervisorState,
    current: Option<Channel>,
    last_good_at: Option<I>,
    failing_deadline: Option<I>,
    retry_at: Option<I>,
}

impl<I: Monotonic> TunerSupervisor<I> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SupervisorState::Unlocked,
            current: None,
            last_good_at: None,
            failing_deadline: None,
            retry_at: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SupervisorState {
        self.state
    }

    /// Channel currently committed to the tuner, if any.
    #[must_use]
    pub const fn current_channel(&self) -> Option<Channel> {
        self.current
    }

    /// Timestamp of the last quality check that met thresholds.
    #[must_use]
    pub const fn last_good_at(&self) -> Option<I> {
        self.last_good_at
    }

    /// Runs one supervision pass. Call once per service tick.
    pub fn service<T, M>(
        &mut self,
        now: I,
        tuner: &mut T,
        monitor: &mut M,
        config: &ReceiverConfig,
    ) -> SupervisionEvent
    where
        T: TunerDriver,
        M: MonitorSink,
    {
        match self.state {
            SupervisorState::Fault => SupervisionEvent::Idle,
            SupervisorState::Unlocked => self.service_unlocked(now, tuner, monitor, config),
            SupervisorState::Locked => self.service_locked(now, tuner, monitor, config),
            SupervisorState::Lost => {
                self.state = SupervisorState::Unlocked;
                self.current = None;
                self.retry_at = None;
                SupervisionEvent::Idle
            }
        }
    }

    fn service_unlocked<T, M>(
        &mut self,
        now: I,
        tuner: &mut T,
        monitor: &mut M,
        config: &ReceiverConfig,
    ) -> SupervisionEvent
    where
        T: TunerDriver,
        M: MonitorSink,
    {
        if let Some(retry_at) = self.retry_at
            && now < retry_at
        {
            return SupervisionEvent::Idle;
        }
        self.retry_at = None;

        monitor.event(TelemetryEventKind::ScanStarted);
        match scan_channels(tuner, monitor, config) {
            Err(_) => self.raise_fault(monitor),
            Ok(ScanOutcome::NoAcceptableChannel) => {
                monitor.event(TelemetryEventKind::ScanNoChannel);
                self.retry_at = Some(now + config.scan_delay);
                SupervisionEvent::NoChannelFound
            }
            Ok(ScanOutcome::Selected(quality)) => {
                if tuner.tune(quality.channel).is_err() {
                    return self.raise_fault(monitor);
                }
                self.state = SupervisorState::Locked;
                self.current = Some(quality.channel);
                self.last_good_at = Some(now);
                self.failing_deadline = None;
                if let Some(index) = channel_index(quality.channel) {
                    monitor.event(TelemetryEventKind::ChannelTuned(index as u8));
                }
                SupervisionEvent::Tuned(quality.channel)
            }
        }
    }

    fn service_locked<T, M>(
        &mut self,
        now: I,
        tuner: &mut T,
        monitor: &mut M,
        config: &ReceiverConfig,
    ) -> SupervisionEvent
    where
        T: TunerDriver,
        M: MonitorSink,
    {
        let Ok(sample) = tuner.read_quality() else {
            return self.raise_fault(monitor);
        };

        if sample.snr_db >= config.tune_min_snr && sample.rssi_dbuv >= config.tune_min_rssi {
            self.last_good_at = Some(now);
            self.failing_deadline = None;
            return SupervisionEvent::Idle;
        }

        match self.failing_deadline {
            None => {
                self.failing_deadline = Some(now + config.tune_lost_delay);
                SupervisionEvent::Idle
            }
            Some(deadline) if now >= deadline => {
                self.state = SupervisorState::Lost;
                self.failing_deadline = None;
                let lost = self.current.take();
                if let Some(channel) = lost {
                    if let Some(index) = channel_index(channel) {
                        monitor.event(TelemetryEventKind::ChannelLost(index as u8));
                    }
                    SupervisionEvent::ChannelLost(channel)
                } else {
                    SupervisionEvent::Idle
                }
            }
            Some(_) => SupervisionEvent::Idle,
        }
    }

    /// Latches the terminal fault state.
    ///
    /// Also invoked by the service loop when the tuner fails outside a
    /// supervision pass (e.g. while polling tone events).
    pub fn raise_fault<M: MonitorSink>(&mut self, monitor: &mut M) -> SupervisionEvent {
        self.state = SupervisorState::Fault;
        self.current = None;
        self.failing_deadline = None;
        self.retry_at = None;
        monitor.event(TelemetryEventKind::TunerFault);
        SupervisionEvent::FaultRaised
    }
}

impl<I: Monotonic> Default for TunerSupervisor<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ALL_CHANNELS;
    use crate::telemetry::NullMonitor;
    use crate::tuner::{QualitySample, TunerError, TunerEvent};
    use core::ops::Add;
    use core::time::Duration;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

    impl MockInstant {
        fn micros(value: u64) -> Self {
            Self(value)
        }
    }

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + rhs.as_micros() as u64)
        }
    }

    struct FakeTuner {
        quality: QualitySample,
        tuned: Option<Channel>,
        fail: bool,
    }

    impl FakeTuner {
        fn strong() -> Self {
            Self {
                quality: QualitySample::new(8.0, 20.0),
                tuned: None,
                fail: false,
            }
        }
    }

    impl TunerDriver for FakeTuner {
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
            Ok(None)
        }

        fn pause(&mut self, _interval: Duration) {}
    }

    fn config() -> ReceiverConfig {
        ReceiverConfig::DEFAULT
    }

    #[test]
    fn scan_success_locks_to_a_channel() {
        let config = config();
        let mut tuner = FakeTuner::strong();
        let mut monitor = NullMonitor;
        let mut supervisor = TunerSupervisor::<MockInstant>::new();

        let event = supervisor.service(MockInstant::micros(0), &mut tuner, &mut monitor, &config);

        // Equal readings everywhere tie-break to the first catalog entry.
        assert_eq!(event, SupervisionEvent::Tuned(ALL_CHANNELS[0]));
        assert!(supervisor.state().is_locked());
        assert_eq!(tuner.tuned, Some(ALL_CHANNELS[0]));
    }

    #[test]
    fn sustained_failure_walks_lost_then_unlocked() {
        let config = config();
        let mut tuner = FakeTuner::strong();
        let mut monitor = NullMonitor;
        let mut supervisor = TunerSupervisor::<MockInstant>::new();

        supervisor.service(MockInstant::micros(0), &mut tuner, &mut monitor, &config);
        assert!(supervisor.state().is_locked());

        tuner.quality = QualitySample::new(0.0, -10.0);
        let step = config.service_period();
        let mut now = MockInstant::micros(1);
        let mut lost = None;
        for _ in 0..u32::try_from(
            config.tune_lost_delay.as_micros() / config.service_period().as_micros(),
        )
        .unwrap()
            + 2
        {
            let event = supervisor.service(now, &mut tuner, &mut monitor, &config);
            if let SupervisionEvent::ChannelLost(channel) = event {
                lost = Some(channel);
                break;
            }
            now = now + step;
        }

        assert_eq!(lost, Some(ALL_CHANNELS[0]));
        assert_eq!(supervisor.state(), SupervisorState::Lost);

        // The next pass returns to Unlocked and clears the committed channel.
        supervisor.service(now, &mut tuner, &mut monitor, &config);
        assert_eq!(supervisor.state(), SupervisorState::Unlocked);
        assert_eq!(supervisor.current_channel(), None);
    }

    #[test]
    fn one_good_check_resets_the_lost_window() {
        let config = config();
        let mut tuner = FakeTuner::strong();
        let mut monitor = NullMonitor;
        let mut supervisor = TunerSupervisor::<MockInstant>::new();

        supervisor.service(MockInstant::micros(0), &mut tuner, &mut monitor, &config);

        // Fail for most of the window, recover once, then fail again just as
        // the original window would have expired.
        tuner.quality = QualitySample::new(0.0, -10.0);
        let almost = MockInstant::micros(config.tune_lost_delay.as_micros() as u64 - 1);
        supervisor.service(MockInstant::micros(1), &mut tuner, &mut monitor, &config);
        supervisor.service(almost, &mut tuner, &mut monitor, &config);
        assert!(supervisor.state().is_locked());

        tuner.quality = QualitySample::new(8.0, 20.0);
        supervisor.service(almost, &mut tuner, &mut monitor, &config);

        tuner.quality = QualitySample::new(0.0, -10.0);
        let past_original = almost + Duration::from_micros(2);
        let event = supervisor.service(past_original, &mut tuner, &mut monitor, &config);
        assert_eq!(event, SupervisionEvent::Idle);
        assert!(supervisor.state().is_locked());
    }

    #[test]
    fn empty_scan_schedules_a_retry() {
        let config = config();
        let mut tuner = FakeTuner::strong();
        tuner.quality = QualitySample::new(0.0, -10.0);
        let mut monitor = NullMonitor;
        let mut supervisor = TunerSupervisor::<MockInstant>::new();

        let event = supervisor.service(MockInstant::micros(0), &mut tuner, &mut monitor, &config);
        assert_eq!(event, SupervisionEvent::NoChannelFound);
        assert_eq!(supervisor.state(), SupervisorState::Unlocked);

        // Before the retry delay elapses, no scan runs.
        let early = MockInstant::micros(1_000);
        assert_eq!(
            supervisor.service(early, &mut tuner, &mut monitor, &config),
            SupervisionEvent::Idle
        );

        // Once it does, the supervisor scans again.
        tuner.quality = QualitySample::new(8.0, 20.0);
        let retry = MockInstant::micros(0) + config.scan_delay;
        assert_eq!(
            supervisor.service(retry, &mut tuner, &mut monitor, &config),
            SupervisionEvent::Tuned(ALL_CHANNELS[0])
        );
    }

    #[test]
    fn unresponsive_tuner_latches_fault() {
        let config = config();
        let mut tuner = FakeTuner::strong();
        tuner.fail = true;
        let mut monitor = NullMonitor;
        let mut supervisor = TunerSupervisor::<MockInstant>::new();

        let event = supervisor.service(MockInstant::micros(0), &mut tuner, &mut monitor, &config);
        assert_eq!(event, SupervisionEvent::FaultRaised);
        assert!(supervisor.state().is_fault());

        // Further passes stay put even if the hardware recovers.
        tuner.fail = false;
        let event = supervisor.service(MockInstant::micros(10), &mut tuner, &mut monitor, &config);
        assert_eq!(event, SupervisionEvent::Idle);
        assert!(supervisor.state().is_fault());
        assert_eq!(tuner.tuned, None);
    }
}
