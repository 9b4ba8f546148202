//! Monitor relay queue and on-device telemetry ring.
//!
//! The service task must never block on observability, so its [`MonitorSink`]
//! hands frames to a bounded channel and drops them when the relay falls
//! behind. A dedicated task drains the channel, appends events to a
//! fixed-capacity ring for post-mortem inspection, and mirrors everything to
//! the log transport.

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use embassy_time::Instant;
use heapless::{HistoryBuffer, String};

use receiver_core::telemetry::{MonitorSink, TelemetryEventKind};

/// Depth of the queue between the service task and the relay task.
pub const MONITOR_QUEUE_DEPTH: usize = 16;

/// Longest status line the relay carries; longer lines are truncated.
pub const MAX_LINE_LENGTH: usize = 64;

/// Number of events retained in the on-device ring.
pub const MONITOR_RING_CAPACITY: usize = 128;

#[cfg(target_os = "none")]
type MonitorMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type MonitorMutex = NoopRawMutex;

/// One unit of monitor traffic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MonitorFrame {
    Event(TelemetryEventKind),
    Line(String<MAX_LINE_LENGTH>),
}

/// Queue coordinating the service task with the relay task.
pub type MonitorQueue = Channel<MonitorMutex, MonitorFrame, MONITOR_QUEUE_DEPTH>;

/// Sender half used by the service task.
pub type MonitorSender<'a> = Sender<'a, MonitorMutex, MonitorFrame, MONITOR_QUEUE_DEPTH>;

/// Receiver half drained by the relay task.
pub type MonitorReceiver<'a> = Receiver<'a, MonitorMutex, MonitorFrame, MONITOR_QUEUE_DEPTH>;

/// Fire-and-forget sink feeding the relay queue.
pub struct QueueMonitor<'a> {
    sender: MonitorSender<'a>,
    dropped: u32,
}

impl<'a> QueueMonitor<'a> {
    #[must_use]
    pub const fn new(sender: MonitorSender<'a>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// Frames discarded because the relay could not keep up.
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    fn push(&mut self, frame: MonitorFrame) {
        match self.sender.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.dropped = self.dropped.saturating_add(1),
        }
    }
}

impl MonitorSink for QueueMonitor<'_> {
    fn event(&mut self, event: TelemetryEventKind) {
        self.push(MonitorFrame::Event(event));
    }

    fn status_line(&mut self, line: &str) {
        let mut copied = String::new();
        // Truncation keeps the frame bounded; a cut line still identifies
        // itself by its prefix.
        for c in line.chars() {
            if copied.push(c).is_err() {
                break;
            }
        }
        self.push(MonitorFrame::Line(copied));
    }
}

/// Telemetry entry stored in the ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MonitorRecord {
    pub id: u32,
    pub timestamp: Instant,
    pub code: u16,
}

/// Fixed-capacity history of relayed events.
pub struct MonitorLog {
    ring: HistoryBuffer<MonitorRecord, MONITOR_RING_CAPACITY>,
    next_id: u32,
}

impl MonitorLog {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuffer::new(),
            next_id: 0,
        }
    }

    /// Appends one event, returning its sequence id.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp: Instant) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.ring.write(MonitorRecord {
            id,
            timestamp,
            code: event.to_raw(),
        });
        id
    }

    /// Most recent entry, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&MonitorRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }
}

impl Default for MonitorLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_monitor_drops_when_full_without_blocking() {
        static QUEUE: MonitorQueue = Channel::new();
        let mut monitor = QueueMonitor::new(QUEUE.sender());

        for _ in 0..MONITOR_QUEUE_DEPTH + 3 {
            monitor.event(TelemetryEventKind::ScanStarted);
        }

        assert_eq!(monitor.dropped(), 3);
        let mut drained = 0;
        while QUEUE.try_receive().is_ok() {
            drained += 1;
        }
        assert_eq!(drained, MONITOR_QUEUE_DEPTH);
    }

    #[test]
    fn long_status_lines_are_truncated_not_lost() {
        static QUEUE: MonitorQueue = Channel::new();
        let mut monitor = QueueMonitor::new(QUEUE.sender());

        let long = "x".repeat(MAX_LINE_LENGTH + 20);
        monitor.status_line(&long);

        match QUEUE.try_receive().unwrap() {
            MonitorFrame::Line(line) => assert_eq!(line.len(), MAX_LINE_LENGTH),
            MonitorFrame::Event(_) => panic!("expected a line frame"),
        }
    }

    #[test]
    fn ring_assigns_sequential_ids_and_keeps_the_newest() {
        let mut log = MonitorLog::new();

        for index in 0..MONITOR_RING_CAPACITY as u32 + 5 {
            let id = log.record(
                TelemetryEventKind::ChannelTuned(0),
                Instant::from_micros(u64::from(index)),
            );
            assert_eq!(id, index);
        }

        assert_eq!(log.len(), MONITOR_RING_CAPACITY);
        assert_eq!(
            log.latest().map(|record| record.id),
            Some(MONITOR_RING_CAPACITY as u32 + 4)
        );
    }
}
