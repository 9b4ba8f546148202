//! Operating parameters for the receiver.
//!
//! One immutable [`ReceiverConfig`] is constructed at startup and passed by
//! reference to every component, so unit tests can tighten or relax
//! thresholds without touching the production values.

use core::time::Duration;

/// Complete set of tunable operating parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReceiverConfig {
    /// Outer averaging passes per channel during a scan.
    pub scan_times: u16,
    /// Quality readings per pass.
    pub scan_samples: u16,
    /// Pause between consecutive quality readings.
    pub scan_sample_delay: Duration,
    /// Pause between finishing one channel and starting the next, and the
    /// retry interval after a scan that found no acceptable channel.
    pub scan_delay: Duration,
    /// Report every individual quality reading to the monitor relay.
    pub scan_sample_log: bool,
    /// Minimum averaged signal-to-noise ratio to accept a channel, in dB.
    pub tune_min_snr: f32,
    /// Minimum averaged received signal strength to accept a channel, in dBµV.
    pub tune_min_rssi: f32,
    /// How long quality must stay below threshold before the channel is
    /// declared lost.
    pub tune_lost_delay: Duration,
    /// Duration of an alert alarm session.
    pub alarm_time: Duration,
    /// Duration of a self-test alarm session.
    pub test_time: Duration,
    /// Decoder per-state deadline during normal reception.
    pub same_timeout: Duration,
    /// Decoder per-state deadline while a self-test window is open.
    pub same_test_timeout: Duration,
    /// Service tick rate, in hertz.
    pub service_user_freq: u32,
    /// Raw button level must hold this long before the debounced level flips.
    pub user_button_debounce: Duration,
    /// Debounced hold time that requests a self-test.
    pub user_button_test_delay: Duration,
    /// Arming delay between the self-test request and the test window opening.
    pub selftest_delay: Duration,
    /// Filtered external voltage at or above this enables battery charging.
    pub charge_voltage_mv: f32,
    /// Weight of each new voltage sample in the running estimate (0 to 1).
    pub ext_power_k_rel: f32,
    /// Cadence of user-facing refresh (LEDs, status lines).
    pub update_delay: Duration,
}

impl ReceiverConfig {
    /// Production values, matching the deployed configuration.
    pub const DEFAULT: Self = Self {
        scan_times: 3,
        scan_samples: 3,
        scan_sample_delay: Duration::from_millis(300),
        scan_delay: Duration::from_millis(1_000),
        scan_sample_log: false,
        tune_min_snr: 2.0,
        tune_min_rssi: 0.0,
        tune_lost_delay: Duration::from_secs(300),
        alarm_time: Duration::from_secs(60),
        test_time: Duration::from_secs(10),
        same_timeout: Duration::from_secs(6),
        // Required test transmissions arrive on a much sparser cadence than
        // live alerts, so the test window tolerates 3 h 10 min.
        same_test_timeout: Duration::from_secs(11_400),
        service_user_freq: 20,
        user_button_debounce: Duration::from_millis(100),
        user_button_test_delay: Duration::from_secs(3),
        selftest_delay: Duration::from_millis(1_000),
        charge_voltage_mv: 3_750.0,
        ext_power_k_rel: 0.60,
        update_delay: Duration::from_millis(500),
    };

    /// Interval between service ticks.
    #[must_use]
    pub const fn service_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.service_user_freq as u64)
    }

    /// Debounce interval expressed in whole service ticks.
    #[must_use]
    pub const fn button_debounce_ticks(&self) -> u32 {
        duration_to_ticks(self.user_button_debounce, self.service_user_freq)
    }

    /// Self-test hold threshold expressed in whole service ticks.
    #[must_use]
    pub const fn button_test_delay_ticks(&self) -> u32 {
        duration_to_ticks(self.user_button_test_delay, self.service_user_freq)
    }

    /// Total readings folded into one averaged quality figure.
    #[must_use]
    pub const fn scan_average_count(&self) -> u32 {
        self.scan_times as u32 * self.scan_samples as u32
    }

    /// Decoder deadline for the current mode.
    #[must_use]
    pub const fn decoder_timeout(&self, test_window_open: bool) -> Duration {
        if test_window_open {
            self.same_test_timeout
        } else {
            self.same_timeout
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const fn duration_to_ticks(interval: Duration, freq_hz: u32) -> u32 {
    (interval.as_millis() as u32 * freq_hz) / 1_000
}

/// Millivolts represented by one raw unit of the external-power ADC.
pub const EXT_POWER_MV_PER_UNIT: f32 = 3_300.0 / 512.0;
