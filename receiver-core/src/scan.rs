//! Channel quality sampling and scan selection.
//!
//! The sampler averages repeated SNR/RSSI readings for one channel; the
//! scanner sweeps the catalog in table order and picks the strongest channel
//! that clears both acceptance thresholds. Selection is pure; the only side
//! effects are tuner reads and the bounded pauses between them.

use core::fmt::Write as _;

use heapless::String;

use crate::channels::{ALL_CHANNELS, Channel};
use crate::config::ReceiverConfig;
use crate::telemetry::MonitorSink;
use crate::tuner::{TunerDriver, TunerError};

/// Averaged quality figure for one channel, produced fresh each scan pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChannelQuality {
    pub channel: Channel,
    pub snr_db: f32,
    pub rssi_dbuv: f32,
    pub sample_count: u16,
}

impl ChannelQuality {
    /// Returns `true` when both acceptance thresholds are met.
    #[must_use]
    pub fn meets_thresholds(&self, config: &ReceiverConfig) -> bool {
        self.snr_db >= config.tune_min_snr && self.rssi_dbuv >= config.tune_min_rssi
    }
}

/// Result of a full catalog sweep.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ScanOutcome {
    /// Strongest acceptable channel, ties broken toward the earlier table
    /// position.
    Selected(ChannelQuality),
    /// No channel cleared the thresholds; retry after the scan delay.
    NoAcceptableChannel,
}

/// Averages `scan_times × scan_samples` quality readings for one channel.
///
/// A tuner failure aborts immediately; a failed read is never averaged in.
pub fn sample_channel<T, M>(
    tuner: &mut T,
    monitor: &mut M,
    config: &ReceiverConfig,
    channel: Channel,
) -> Result<ChannelQuality, TunerError>
where
    T: TunerDriver,
    M: MonitorSink,
{
    tuner.tune(channel)?;

    let mut snr_sum = 0.0_f32;
    let mut rssi_sum = 0.0_f32;
    let mut count: u16 = 0;

    for _ in 0..config.scan_times {
        for _ in 0..config.scan_samples {
            tuner.pause(config.scan_sample_delay);
            let sample = tuner.read_quality()?;
            snr_sum += sample.snr_db;
            rssi_sum += sample.rssi_dbuv;
            count += 1;

            if config.scan_sample_log {
                let mut line = String::<64>::new();
                let _ = write!(
                    line,
                    "sample {channel} snr={:.1} rssi={:.1}",
                    sample.snr_db, sample.rssi_dbuv
                );
                monitor.status_line(&line);
            }
        }
    }

    let divisor = f32::from(count.max(1));
    Ok(ChannelQuality {
        channel,
        snr_db: snr_sum / divisor,
        rssi_dbuv: rssi_sum / divisor,
        sample_count: count,
    })
}

/// Sweeps every catalog channel and selects the best acceptable one.
pub fn scan_channels<T, M>(
    tuner: &mut T,
    monitor: &mut M,
    config: &ReceiverConfig,
) -> Result<ScanOutcome, TunerError>
where
    T: TunerDriver,
    M: MonitorSink,
{
    let mut best: Option<ChannelQuality> = None;

    for (index, channel) in ALL_CHANNELS.iter().enumerate() {
        if index > 0 {
            tuner.pause(config.scan_delay);
        }

        let quality = sample_channel(tuner, monitor, config, *channel)?;
        if !quality.meets_thresholds(config) {
            continue;
        }

        // Strict comparison keeps the earlier table position on ties.
        let improves = best
            .as_ref()
            .is_none_or(|current| quality.rssi_dbuv > current.rssi_dbuv);
        if improves {
            best = Some(quality);
        }
    }

    Ok(best.map_or(ScanOutcome::NoAcceptableChannel, ScanOutcome::Selected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::NullMonitor;
    use crate::tuner::{QualitySample, TunerEvent};
    use core::time::Duration;

    // Tuner whose quality readings follow a per-channel script.
    struct ScriptedTuner {
        qualities: [QualitySample; 7],
        tuned: Option<Channel>,
        reads: u32,
        fail_reads: bool,
    }

    impl ScriptedTuner {
        fn with_rssi(rssi: [f32; 7]) -> Self {
            let mut qualities = [QualitySample::new(5.0, 0.0); 7];
            for (slot, value) in qualities.iter_mut().zip(rssi) {
                slot.rssi_dbuv = value;
            }
            Self {
                qualities,
                tuned: None,
                reads: 0,
                fail_reads: false,
            }
        }
    }

    impl TunerDriver for ScriptedTuner {
        fn tune(&mut self, channel: Channel) -> Result<(), TunerError> {
            self.tuned = Some(channel);
            Ok(())
        }

        fn read_quality(&mut self) -> Result<QualitySample, TunerError> {
            if self.fail_reads {
                return Err(TunerError::Unresponsive);
            }
            self.reads += 1;
            let tuned = self.tuned.expect("read before tune");
            let index = crate::channels::channel_index(tuned).expect("unknown channel");
            Ok(self.qualities[index])
        }

        fn poll_event(&mut self) -> Result<Option<TunerEvent>, TunerError> {
            Ok(None)
        }

        fn pause(&mut self, _interval: Duration) {}
    }

    #[test]
    fn sampler_averages_all_readings() {
        let config = ReceiverConfig::DEFAULT;
        let mut tuner = ScriptedTuner::with_rssi([12.0; 7]);
        let mut monitor = NullMonitor;

        let quality =
            sample_channel(&mut tuner, &mut monitor, &config, ALL_CHANNELS[2]).unwrap();

        assert_eq!(quality.sample_count, config.scan_average_count() as u16);
        assert_eq!(tuner.reads, config.scan_average_count());
        assert!((quality.rssi_dbuv - 12.0).abs() < f32::EPSILON);
        assert!((quality.snr_db - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn scanner_selects_strongest_acceptable_channel() {
        let config = ReceiverConfig::DEFAULT;
        let mut tuner = ScriptedTuner::with_rssi([10.0, 25.0, 18.0, -50.0, -50.0, -50.0, -50.0]);
        let mut monitor = NullMonitor;

        let outcome = scan_channels(&mut tuner, &mut monitor, &config).unwrap();
        match outcome {
            ScanOutcome::Selected(quality) => {
                assert_eq!(quality.channel, ALL_CHANNELS[1]);
            }
            ScanOutcome::NoAcceptableChannel => panic!("expected a selection"),
        }
    }

    #[test]
    fn scanner_breaks_ties_toward_lower_frequency() {
        let config = ReceiverConfig::DEFAULT;
        let mut tuner = ScriptedTuner::with_rssi([10.0, 25.0, 25.0, 10.0, 10.0, 10.0, 10.0]);
        let mut monitor = NullMonitor;

        let outcome = scan_channels(&mut tuner, &mut monitor, &config).unwrap();
        match outcome {
            ScanOutcome::Selected(quality) => {
                assert_eq!(quality.channel, ALL_CHANNELS[1]);
            }
            ScanOutcome::NoAcceptableChannel => panic!("expected a selection"),
        }
    }

    #[test]
    fn scanner_never_selects_below_both_thresholds() {
        let mut config = ReceiverConfig::DEFAULT;
        config.tune_min_rssi = 30.0;
        let mut tuner = ScriptedTuner::with_rssi([10.0, 25.0, 18.0, 5.0, 5.0, 5.0, 5.0]);
        let mut monitor = NullMonitor;

        let outcome = scan_channels(&mut tuner, &mut monitor, &config).unwrap();
        assert_eq!(outcome, ScanOutcome::NoAcceptableChannel);
    }

    #[test]
    fn tuner_failure_aborts_the_scan() {
        let config = ReceiverConfig::DEFAULT;
        let mut tuner = ScriptedTuner::with_rssi([10.0; 7]);
        tuner.fail_reads = true;
        let mut monitor = NullMonitor;

        let result = scan_channels(&mut tuner, &mut monitor, &config);
        assert_eq!(result, Err(TunerError::Unresponsive));
    }
}
