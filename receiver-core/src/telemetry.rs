//! Telemetry event catalog shared by firmware and host targets.
//!
//! Events carry the metadata the monitor relay and the emulator need while
//! staying `no_std` compatible, and serialize to compact numeric codes for
//! transport over diagnostics channels.

use core::fmt;

use crate::alarm::AlarmKind;
use crate::channels::CHANNEL_COUNT;
use crate::decoder::DiscardReason;

/// Discriminated telemetry events emitted by the receiver core.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    /// Tuned and locked to the catalog channel at this index.
    ChannelTuned(u8),
    /// Sustained quality failure; the catalog channel at this index was
    /// abandoned.
    ChannelLost(u8),
    /// A full scan pass is starting.
    ScanStarted,
    /// A full scan pass found no channel above thresholds.
    ScanNoChannel,
    /// The tuner reported preamble synchronization.
    PreambleDetected,
    /// An end-of-message burst was recognized.
    EndOfMessage,
    /// A consistent alert header was assembled.
    HeaderAccepted,
    /// A partial or corrupt burst was dropped.
    HeaderDiscarded(DiscardReason),
    /// An alarm session began.
    AlarmStarted(AlarmKind),
    /// An alarm session ran its full duration.
    AlarmEnded(AlarmKind),
    /// A running self-test was cut short by a real alert.
    SelfTestPreempted,
    /// The button hold threshold was crossed.
    SelfTestRequested,
    /// The arming delay elapsed and the test window opened.
    SelfTestArmed,
    /// The filtered supply estimate crossed the charge threshold.
    ExternalPowerChanged(bool),
    /// The tuner stopped responding; tuning is halted.
    TunerFault,
    /// A short button press asked for a status refresh.
    StatusRequested,
    /// Escape hatch for codes minted after this catalog was frozen.
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::ChannelTuned(index) => write!(f, "channel-tuned {index}"),
            TelemetryEventKind::ChannelLost(index) => write!(f, "channel-lost {index}"),
            TelemetryEventKind::ScanStarted => f.write_str("scan-started"),
            TelemetryEventKind::ScanNoChannel => f.write_str("scan-no-channel"),
            TelemetryEventKind::PreambleDetected => f.write_str("preamble-detected"),
            TelemetryEventKind::EndOfMessage => f.write_str("end-of-message"),
            TelemetryEventKind::HeaderAccepted => f.write_str("header-accepted"),
            TelemetryEventKind::HeaderDiscarded(reason) => {
                write!(f, "header-discarded {reason}")
            }
            TelemetryEventKind::AlarmStarted(kind) => {
                write!(f, "alarm-started {}", alarm_label(*kind))
            }
            TelemetryEventKind::AlarmEnded(kind) => write!(f, "alarm-ended {}", alarm_label(*kind)),
            TelemetryEventKind::SelfTestPreempted => f.write_str("self-test-preempted"),
            TelemetryEventKind::SelfTestRequested => f.write_str("self-test-requested"),
            TelemetryEventKind::SelfTestArmed => f.write_str("self-test-armed"),
            TelemetryEventKind::ExternalPowerChanged(present) => {
                write!(f, "external-power {}", if *present { "on" } else { "off" })
            }
            TelemetryEventKind::TunerFault => f.write_str("tuner-fault"),
            TelemetryEventKind::StatusRequested => f.write_str("status-requested"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

fn alarm_label(kind: AlarmKind) -> &'static str {
    match kind {
        AlarmKind::Alert => "alert",
        AlarmKind::SelfTest => "self-test",
    }
}

impl TelemetryEventKind {
    const CHANNEL_TUNED_BASE: u16 = 0x0000;
    const CHANNEL_LOST_BASE: u16 = 0x0008;
    const SCAN_STARTED_CODE: u16 = 0x0010;
    const SCAN_NO_CHANNEL_CODE: u16 = 0x0011;
    const PREAMBLE_CODE: u16 = 0x0012;
    const EOM_CODE: u16 = 0x0013;
    const HEADER_ACCEPTED_CODE: u16 = 0x0014;
    const HEADER_DISCARDED_BASE: u16 = 0x0018;
    const ALARM_STARTED_BASE: u16 = 0x0020;
    const ALARM_ENDED_BASE: u16 = 0x0022;
    const SELF_TEST_PREEMPTED_CODE: u16 = 0x0024;
    const SELF_TEST_REQUESTED_CODE: u16 = 0x0025;
    const SELF_TEST_ARMED_CODE: u16 = 0x0026;
    const EXTERNAL_POWER_BASE: u16 = 0x0028;
    const TUNER_FAULT_CODE: u16 = 0x002A;
    const STATUS_REQUESTED_CODE: u16 = 0x002B;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::ChannelTuned(index) => Self::CHANNEL_TUNED_BASE + index as u16,
            TelemetryEventKind::ChannelLost(index) => Self::CHANNEL_LOST_BASE + index as u16,
            TelemetryEventKind::ScanStarted => Self::SCAN_STARTED_CODE,
            TelemetryEventKind::ScanNoChannel => Self::SCAN_NO_CHANNEL_CODE,
            TelemetryEventKind::PreambleDetected => Self::PREAMBLE_CODE,
            TelemetryEventKind::EndOfMessage => Self::EOM_CODE,
            TelemetryEventKind::HeaderAccepted => Self::HEADER_ACCEPTED_CODE,
            TelemetryEventKind::HeaderDiscarded(reason) => {
                Self::HEADER_DISCARDED_BASE + discard_index(reason)
            }
            TelemetryEventKind::AlarmStarted(kind) => Self::ALARM_STARTED_BASE + alarm_index(kind),
            TelemetryEventKind::AlarmEnded(kind) => Self::ALARM_ENDED_BASE + alarm_index(kind),
            TelemetryEventKind::SelfTestPreempted => Self::SELF_TEST_PREEMPTED_CODE,
            TelemetryEventKind::SelfTestRequested => Self::SELF_TEST_REQUESTED_CODE,
            TelemetryEventKind::SelfTestArmed => Self::SELF_TEST_ARMED_CODE,
            TelemetryEventKind::ExternalPowerChanged(present) => {
                Self::EXTERNAL_POWER_BASE + present as u16
            }
            TelemetryEventKind::TunerFault => Self::TUNER_FAULT_CODE,
            TelemetryEventKind::StatusRequested => Self::STATUS_REQUESTED_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`Custom`].
    ///
    /// [`Custom`]: TelemetryEventKind::Custom
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::SCAN_STARTED_CODE => TelemetryEventKind::ScanStarted,
            Self::SCAN_NO_CHANNEL_CODE => TelemetryEventKind::ScanNoChannel,
            Self::PREAMBLE_CODE => TelemetryEventKind::PreambleDetected,
            Self::EOM_CODE => TelemetryEventKind::EndOfMessage,
            Self::HEADER_ACCEPTED_CODE => TelemetryEventKind::HeaderAccepted,
            Self::SELF_TEST_PREEMPTED_CODE => TelemetryEventKind::SelfTestPreempted,
            Self::SELF_TEST_REQUESTED_CODE => TelemetryEventKind::SelfTestRequested,
            Self::SELF_TEST_ARMED_CODE => TelemetryEventKind::SelfTestArmed,
            Self::TUNER_FAULT_CODE => TelemetryEventKind::TunerFault,
            Self::STATUS_REQUESTED_CODE => TelemetryEventKind::StatusRequested,
            value if channel_range(Self::CHANNEL_TUNED_BASE).contains(&value) => {
                TelemetryEventKind::ChannelTuned((value - Self::CHANNEL_TUNED_BASE) as u8)
            }
            value if channel_range(Self::CHANNEL_LOST_BASE).contains(&value) => {
                TelemetryEventKind::ChannelLost((value - Self::CHANNEL_LOST_BASE) as u8)
            }
            value
                if (Self::HEADER_DISCARDED_BASE..Self::HEADER_DISCARDED_BASE + 3)
                    .contains(&value) =>
            {
                discard_from_index(value - Self::HEADER_DISCARDED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), |reason| {
                        TelemetryEventKind::HeaderDiscarded(reason)
                    })
            }
            value if (Self::ALARM_STARTED_BASE..Self::ALARM_STARTED_BASE + 2).contains(&value) => {
                TelemetryEventKind::AlarmStarted(alarm_from_index(
                    value - Self::ALARM_STARTED_BASE,
                ))
            }
            value if (Self::ALARM_ENDED_BASE..Self::ALARM_ENDED_BASE + 2).contains(&value) => {
                TelemetryEventKind::AlarmEnded(alarm_from_index(value - Self::ALARM_ENDED_BASE))
            }
            value
                if (Self::EXTERNAL_POWER_BASE..Self::EXTERNAL_POWER_BASE + 2).contains(&value) =>
            {
                TelemetryEventKind::ExternalPowerChanged(value != Self::EXTERNAL_POWER_BASE)
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

const fn channel_range(base: u16) -> core::ops::Range<u16> {
    base..base + CHANNEL_COUNT as u16
}

const fn alarm_index(kind: AlarmKind) -> u16 {
    match kind {
        AlarmKind::Alert => 0,
        AlarmKind::SelfTest => 1,
    }
}

const fn alarm_from_index(index: u16) -> AlarmKind {
    if index == 0 {
        AlarmKind::Alert
    } else {
        AlarmKind::SelfTest
    }
}

const fn discard_index(reason: DiscardReason) -> u16 {
    match reason {
        DiscardReason::DeadlineExpired => 0,
        DiscardReason::PrefixNotFound => 1,
        DiscardReason::InconsistentBursts => 2,
    }
}

const fn discard_from_index(index: u16) -> Option<DiscardReason> {
    match index {
        0 => Some(DiscardReason::DeadlineExpired),
        1 => Some(DiscardReason::PrefixNotFound),
        2 => Some(DiscardReason::InconsistentBursts),
        _ => None,
    }
}

/// Fire-and-forget sink for telemetry events and status lines.
///
/// Implementations must never block the service tick; a relay that cannot
/// keep up simply drops lines.
pub trait MonitorSink {
    /// Records one telemetry event.
    fn event(&mut self, event: TelemetryEventKind);

    /// Forwards one formatted status line.
    fn status_line(&mut self, line: &str);
}

/// Sink that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullMonitor;

impl MonitorSink for NullMonitor {
    fn event(&mut self, _event: TelemetryEventKind) {}

    fn status_line(&mut self, _line: &str) {}
}
