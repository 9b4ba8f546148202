//! Monotonic timestamp wrapper binding the receiver core to Embassy time.

use core::ops::Add;
use core::time::Duration;

use embassy_time::Instant;

/// Firmware-side instant satisfying the core's monotonic clock bound.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    /// Microseconds since boot.
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + embassy_time::Duration::from_micros(rhs.as_micros() as u64))
    }
}
