//! Shared status surface for the monitor relay.
//!
//! The service loop captures a [`StatusSnapshot`] on the user-refresh
//! cadence; [`StatusFormatter`] keeps the textual rendering consistent
//! between the firmware monitor relay and the host emulator.

use core::fmt;

use crate::alarm::AlarmKind;
use crate::channels::Channel;
use crate::decoder::DecoderState;
use crate::supervisor::SupervisorState;

/// Point-in-time summary of the receiver.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub supervisor: SupervisorState,
    pub channel: Option<Channel>,
    pub decoder: DecoderState,
    pub alarm: Option<AlarmKind>,
    pub test_window_open: bool,
    pub power_mv: Option<f32>,
    pub charge_enable: bool,
}

impl StatusSnapshot {
    /// Builds a snapshot with nothing known yet.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            supervisor: SupervisorState::Unlocked,
            channel: None,
            decoder: DecoderState::AwaitingEndOfMessage,
            alarm: None,
            test_window_open: false,
            power_mv: None,
            charge_enable: false,
        }
    }
}

/// Helper that renders a [`StatusSnapshot`] into compact monitor lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the tuner line (e.g. `tuner state=locked channel=162.400MHz`).
    pub fn write_tuner_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("tuner state=")?;
        writer.write_str(supervisor_label(self.snapshot.supervisor))?;
        writer.write_str(" channel=")?;
        match self.snapshot.channel {
            Some(channel) => write!(writer, "{channel}")?,
            None => writer.write_str("none")?,
        }
        Ok(())
    }

    /// Writes the alarm line (e.g. `alarm session=alert decoder=awaiting-header`).
    pub fn write_alarm_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("alarm session=")?;
        writer.write_str(match self.snapshot.alarm {
            Some(AlarmKind::Alert) => "alert",
            Some(AlarmKind::SelfTest) => "self-test",
            None => "none",
        })?;
        writer.write_str(" decoder=")?;
        writer.write_str(decoder_label(self.snapshot.decoder))?;
        if self.snapshot.test_window_open {
            writer.write_str(" test-window=open")?;
        }
        Ok(())
    }

    /// Writes the power line (e.g. `power ext=4512mV charge=on`).
    pub fn write_power_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("power ext=")?;
        match self.snapshot.power_mv {
            Some(mv) => write!(writer, "{}mV", mv as u32)?,
            None => writer.write_str("unknown")?,
        }
        writer.write_str(" charge=")?;
        writer.write_str(if self.snapshot.charge_enable { "on" } else { "off" })?;
        Ok(())
    }
}

fn supervisor_label(state: SupervisorState) -> &'static str {
    match state {
        SupervisorState::Unlocked => "scanning",
        SupervisorState::Locked => "locked",
        SupervisorState::Lost => "lost",
        SupervisorState::Fault => "fault",
    }
}

fn decoder_label(state: DecoderState) -> &'static str {
    match state {
        DecoderState::AwaitingEndOfMessage => "idle",
        DecoderState::AwaitingPreamble => "awaiting-preamble",
        DecoderState::AwaitingHeader => "awaiting-header",
        DecoderState::HeaderReady => "header-ready",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ALL_CHANNELS;
    use heapless::String;

    #[test]
    fn tuner_line_reports_lock_and_channel() {
        let mut snapshot = StatusSnapshot::unknown();
        snapshot.supervisor = SupervisorState::Locked;
        snapshot.channel = Some(ALL_CHANNELS[4]);

        let mut line = String::<64>::new();
        StatusFormatter::new(&snapshot)
            .write_tuner_line(&mut line)
            .unwrap();
        assert_eq!(line.as_str(), "tuner state=locked channel=162.500MHz");
    }

    #[test]
    fn alarm_line_mentions_open_test_window() {
        let mut snapshot = StatusSnapshot::unknown();
        snapshot.alarm = Some(AlarmKind::SelfTest);
        snapshot.test_window_open = true;

        let mut line = String::<64>::new();
        StatusFormatter::new(&snapshot)
            .write_alarm_line(&mut line)
            .unwrap();
        assert_eq!(
            line.as_str(),
            "alarm session=self-test decoder=idle test-window=open"
        );
    }

    #[test]
    fn power_line_handles_unknown_estimate() {
        let snapshot = StatusSnapshot::unknown();
        let mut line = String::<64>::new();
        StatusFormatter::new(&snapshot)
            .write_power_line(&mut line)
            .unwrap();
        assert_eq!(line.as_str(), "power ext=unknown charge=off");
    }

    #[test]
    fn power_line_truncates_to_whole_millivolts() {
        let mut snapshot = StatusSnapshot::unknown();
        snapshot.power_mv = Some(4512.7);
        snapshot.charge_enable = true;

        let mut line = String::<64>::new();
        StatusFormatter::new(&snapshot)
            .write_power_line(&mut line)
            .unwrap();
        assert_eq!(line.as_str(), "power ext=4512mV charge=on");
    }
}
