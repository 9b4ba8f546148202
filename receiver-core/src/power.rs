//! External-supply voltage estimation and charge control.
//!
//! A first-order exponential filter smooths the noisy analog readings; the
//! filtered estimate against the charge threshold yields a single boolean
//! that drives both the charger and the power LED. Deliberately cheap: no
//! hysteresis is needed because the decision feeds slow user-facing outputs.

use crate::config::{EXT_POWER_MV_PER_UNIT, ReceiverConfig};
use crate::tuner::LedColor;

/// Decision derived from one power sample.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PowerDecision {
    /// Smoothed external-supply estimate, in millivolts.
    pub filtered_mv: f32,
    /// Whether the external supply can charge the internal battery.
    pub charge_enable: bool,
}

impl PowerDecision {
    /// Power LED color for this decision.
    #[must_use]
    pub const fn led_color(&self) -> LedColor {
        if self.charge_enable {
            LedColor::Green
        } else {
            LedColor::Red
        }
    }
}

/// Running estimate of the external supply voltage.
#[derive(Copy, Clone, Debug, Default)]
pub struct PowerMonitor {
    filtered_mv: Option<f32>,
}

impl PowerMonitor {
    #[must_use]
    pub const fn new() -> Self {
        Self { filtered_mv: None }
    }

    /// Latest filtered estimate, if a sample has been taken.
    #[must_use]
    pub const fn estimate_mv(&self) -> Option<f32> {
        self.filtered_mv
    }

    /// Folds one raw ADC reading into the estimate.
    ///
    /// The very first sample seeds the filter exactly; afterwards each sample
    /// contributes with weight `ext_power_k_rel`.
    pub fn sample(&mut self, raw: u16, config: &ReceiverConfig) -> PowerDecision {
        let sample_mv = f32::from(raw) * EXT_POWER_MV_PER_UNIT;
        let filtered = match self.filtered_mv {
            None => sample_mv,
            Some(previous) => {
                config.ext_power_k_rel * sample_mv + (1.0 - config.ext_power_k_rel) * previous
            }
        };
        self.filtered_mv = Some(filtered);

        PowerDecision {
            filtered_mv: filtered,
            charge_enable: filtered >= config.charge_voltage_mv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReceiverConfig {
        ReceiverConfig::DEFAULT
    }

    // Raw unit that maps to roughly 4.5 V, comfortably above the charge
    // threshold.
    const RAW_EXTERNAL: u16 = 700;
    // Roughly 1.9 V, well below it.
    const RAW_BATTERY: u16 = 300;

    #[test]
    fn first_sample_seeds_the_filter_exactly() {
        let config = config();
        let mut monitor = PowerMonitor::new();

        let decision = monitor.sample(RAW_EXTERNAL, &config);
        assert_eq!(
            decision.filtered_mv,
            f32::from(RAW_EXTERNAL) * EXT_POWER_MV_PER_UNIT
        );
    }

    #[test]
    fn estimate_converges_monotonically_without_overshoot() {
        let config = config();
        let mut monitor = PowerMonitor::new();
        monitor.sample(RAW_BATTERY, &config);

        let target = f32::from(RAW_EXTERNAL) * EXT_POWER_MV_PER_UNIT;
        let mut previous = monitor.estimate_mv().unwrap();
        for _ in 0..50 {
            let decision = monitor.sample(RAW_EXTERNAL, &config);
            assert!(decision.filtered_mv >= previous);
            assert!(decision.filtered_mv <= target);
            previous = decision.filtered_mv;
        }
        assert!((target - previous).abs() < 1.0);
    }

    #[test]
    fn charge_decision_follows_threshold() {
        let config = config();
        let mut monitor = PowerMonitor::new();

        let external = monitor.sample(RAW_EXTERNAL, &config);
        assert!(external.charge_enable);
        assert_eq!(external.led_color(), LedColor::Green);

        let mut monitor = PowerMonitor::new();
        let battery = monitor.sample(RAW_BATTERY, &config);
        assert!(!battery.charge_enable);
        assert_eq!(battery.led_color(), LedColor::Red);
    }
}
