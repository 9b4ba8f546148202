#![no_std]

// Shared logic for the weather-band alert receiver.
//
// This crate stays portable across MCU firmware and host tooling by avoiding
// the Rust standard library. Hardware collaborators (tuner chip, LEDs and
// buzzer, external-power ADC, monitor relay) are traits; time is a generic
// monotonic instant so host tests can inject a fake clock.

pub mod alarm;
pub mod channels;
pub mod config;
pub mod decoder;
pub mod input;
pub mod power;
pub mod scan;
pub mod service;
pub mod status;
pub mod supervisor;
pub mod telemetry;
pub mod tuner;

use core::ops::Add;
use core::time::Duration;

/// Bound for the monotonic timestamps threaded through every state machine.
///
/// Firmware satisfies this with a wrapper around the HAL instant; tests use a
/// plain microsecond counter.
pub trait Monotonic: Copy + Ord + Add<Duration, Output = Self> {}

impl<T> Monotonic for T where T: Copy + Ord + Add<Duration, Output = T> {}
