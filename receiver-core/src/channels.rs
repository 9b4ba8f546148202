//! Fixed catalog of monitored weather-band channels.
//!
//! Seven frequencies, 162.400 MHz through 162.550 MHz in 25 kHz steps. The
//! table is compile-time data; the scanner walks it in order and the
//! supervisor refers to entries by index.

/// A single monitored frequency.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Channel {
    pub frequency_khz: u32,
}

impl Channel {
    #[must_use]
    pub const fn new(frequency_khz: u32) -> Self {
        Self { frequency_khz }
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mhz = self.frequency_khz / 1_000;
        let khz = self.frequency_khz % 1_000;
        write!(f, "{mhz}.{khz:03}MHz")
    }
}

/// Number of channels in the catalog.
pub const CHANNEL_COUNT: usize = 7;

/// Compile-time catalog of every monitored channel, lowest frequency first.
pub const ALL_CHANNELS: [Channel; CHANNEL_COUNT] = [
    Channel::new(162_400),
    Channel::new(162_425),
    Channel::new(162_450),
    Channel::new(162_475),
    Channel::new(162_500),
    Channel::new(162_525),
    Channel::new(162_550),
];

/// Deterministic index of a catalog channel, if it is one.
#[must_use]
pub fn channel_index(channel: Channel) -> Option<usize> {
    ALL_CHANNELS.iter().position(|entry| *entry == channel)
}
