//! Hardware collaborator boundaries.
//!
//! Everything the receiver logic needs from the outside world crosses one of
//! the traits in this module: the weather-band tuner chip, the LED/buzzer
//! outputs, and the external-power ADC. Firmware supplies real drivers; the
//! emulator and the test suites supply scripted ones. No-op implementations
//! exist for wiring partial setups.

use core::fmt;
use core::time::Duration;

use crate::channels::Channel;

/// Instantaneous receive-quality reading for the currently tuned channel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QualitySample {
    /// Signal-to-noise ratio, in dB.
    pub snr_db: f32,
    /// Received signal strength, in dBµV.
    pub rssi_dbuv: f32,
}

impl QualitySample {
    #[must_use]
    pub const fn new(snr_db: f32, rssi_dbuv: f32) -> Self {
        Self { snr_db, rssi_dbuv }
    }
}

/// Tone-symbol event polled from the tuner while locked to a channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TunerEvent {
    /// Preamble pattern acquired; the byte stream that follows is aligned to
    /// symbol boundaries.
    PreambleSync,
    /// Next decoded byte of the current data burst.
    Byte(u8),
    /// Carrier dropped; the current data burst has ended.
    BurstEnd,
}

/// Failure reported by the tuner collaborator.
///
/// Distinct from poor reception: any of these indicates the chip itself is
/// not answering and tuning must stop rather than retry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TunerError {
    /// The chip did not acknowledge a command within its timeout.
    Unresponsive,
    /// The bus transaction failed outright.
    Bus,
}

impl fmt::Display for TunerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunerError::Unresponsive => f.write_str("tuner unresponsive"),
            TunerError::Bus => f.write_str("tuner bus failure"),
        }
    }
}

/// Driver for the weather-band tuner chip.
///
/// `pause` lives here because every bounded wait in the core (inter-sample
/// spacing, inter-channel settling) happens around tuner transactions; the
/// firmware maps it to a busy delay and tests advance their fake clock.
pub trait TunerDriver {
    /// Programs the tuner to the given channel and waits for it to settle.
    fn tune(&mut self, channel: Channel) -> Result<(), TunerError>;

    /// Reads one instantaneous quality sample for the tuned channel.
    fn read_quality(&mut self) -> Result<QualitySample, TunerError>;

    /// Polls for the next tone-symbol event, if one is pending.
    fn poll_event(&mut self) -> Result<Option<TunerEvent>, TunerError>;

    /// Blocks for the requested interval.
    fn pause(&mut self, interval: Duration);
}

/// Color of a bi-color status LED.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LedColor {
    Off,
    Red,
    Green,
}

/// GPIO-level actuation for the alarm and status indicators.
pub trait AlertOutputs {
    /// Switches the buzzer on or off.
    fn set_buzzer(&mut self, on: bool);

    /// Sets the signal LED (green = locked, red = searching).
    fn set_signal_led(&mut self, color: LedColor);

    /// Sets the power LED (green = external supply, red = battery).
    fn set_power_led(&mut self, color: LedColor);

    /// Enables or disables the internal battery charger.
    fn set_charge_enable(&mut self, on: bool);
}

/// Analog read of the external-power pin, in raw ADC units.
pub trait ExtPowerSource {
    fn read_raw(&mut self) -> u16;
}

/// Tuner driver that reports no signal and never fails.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopTuner;

impl TunerDriver for NoopTuner {
    fn tune(&mut self, _channel: Channel) -> Result<(), TunerError> {
        Ok(())
    }

    fn read_quality(&mut self) -> Result<QualitySample, TunerError> {
        Ok(QualitySample::new(0.0, 0.0))
    }

    fn poll_event(&mut self) -> Result<Option<TunerEvent>, TunerError> {
        Ok(None)
    }

    fn pause(&mut self, _interval: Duration) {}
}

/// Output driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopOutputs;

impl AlertOutputs for NoopOutputs {
    fn set_buzzer(&mut self, _on: bool) {}

    fn set_signal_led(&mut self, _color: LedColor) {}

    fn set_power_led(&mut self, _color: LedColor) {}

    fn set_charge_enable(&mut self, _on: bool) {}
}

/// Power source that always reads zero.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopPowerSource;

impl ExtPowerSource for NoopPowerSource {
    fn read_raw(&mut self) -> u16 {
        0
    }
}
