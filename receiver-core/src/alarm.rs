//! Alarm and self-test session lifecycle.
//!
//! The sequencer owns the single [`AlarmSession`] slot. Accepted headers
//! always win: an alert pre-empts a running self-test, never the other way
//! around. Sessions run to completion; the only early exit is pre-emption.

use core::time::Duration;

use crate::Monotonic;
use crate::config::ReceiverConfig;

/// What a session is rehearsing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AlarmKind {
    /// A decoded emergency broadcast.
    Alert,
    /// A user-requested rehearsal of the alarm path.
    SelfTest,
}

/// The one active alarm, while it lasts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AlarmSession<I> {
    pub kind: AlarmKind,
    pub started_at: I,
    pub duration: Duration,
}

impl<I: Monotonic> AlarmSession<I> {
    #[must_use]
    pub fn new(kind: AlarmKind, started_at: I, duration: Duration) -> Self {
        Self {
            kind,
            started_at,
            duration,
        }
    }

    /// Instant at which the session has run its course.
    #[must_use]
    pub fn expires_at(&self) -> I {
        self.started_at + self.duration
    }

    #[must_use]
    pub fn is_expired(&self, now: I) -> bool {
        now >= self.expires_at()
    }
}

/// Outcome of starting an alert session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AlertStart {
    Started,
    /// A running self-test was cut short to make room.
    PreemptedSelfTest,
    /// An alert was already sounding; its session keeps running.
    AlreadyActive,
}

/// Outcome of a self-test request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SelfTestStart {
    Started,
    /// A real alert owns the alarm; the self-test is refused.
    RefusedAlertActive,
}

/// Arbitrates the alarm slot between decoder alerts and user self-tests.
#[derive(Copy, Clone, Debug, Default)]
pub struct AlertSequencer<I> {
    session: Option<AlarmSession<I>>,
}

impl<I: Monotonic> AlertSequencer<I> {
    #[must_use]
    pub const fn new() -> Self {
        Self { session: None }
    }

    /// Currently running session, if any.
    #[must_use]
    pub fn active(&self) -> Option<&AlarmSession<I>> {
        self.session.as_ref()
    }

    /// Returns `true` while a real alert is sounding.
    #[must_use]
    pub fn alert_active(&self) -> bool {
        matches!(
            self.session,
            Some(AlarmSession {
                kind: AlarmKind::Alert,
                ..
            })
        )
    }

    /// Starts an alert session. Never refused: an accepted header must sound
    /// the alarm no matter what else is running.
    pub fn start_alert(&mut self, now: I, config: &ReceiverConfig) -> AlertStart {
        let outcome = match self.session {
            Some(AlarmSession {
                kind: AlarmKind::Alert,
                ..
            }) => return AlertStart::AlreadyActive,
            Some(AlarmSession {
                kind: AlarmKind::SelfTest,
                ..
            }) => AlertStart::PreemptedSelfTest,
            None => AlertStart::Started,
        };

        self.session = Some(AlarmSession::new(AlarmKind::Alert, now, config.alarm_time));
        outcome
    }

    /// Starts a self-test session unless a real alert is active.
    pub fn start_self_test(&mut self, now: I, config: &ReceiverConfig) -> SelfTestStart {
        if self.alert_active() {
            return SelfTestStart::RefusedAlertActive;
        }

        self.session = Some(AlarmSession::new(AlarmKind::SelfTest, now, config.test_time));
        SelfTestStart::Started
    }

    /// Clears an expired session, reporting what just ended.
    pub fn tick(&mut self, now: I) -> Option<AlarmKind> {
        let expired = self.session.filter(|session| session.is_expired(now))?;
        self.session = None;
        Some(expired.kind)
    }
}
