//! Board wiring for the receiver collaborators.
//!
//! Everything here is a thin adapter between STM32 peripherals and the trait
//! boundaries in `receiver-core`: the Si4707 weather-band tuner on I2C, the
//! two bi-color status LEDs, the buzzer and charger-enable lines, the user
//! button, and the external-supply ADC input.

#![cfg(target_os = "none")]

pub mod power;
pub mod tuner;

use embassy_stm32::gpio::{Input, Output};

use receiver_core::tuner::{AlertOutputs, LedColor};

/// Two GPIO lines driving one bi-color LED.
pub struct BiColorLed<'d> {
    red: Output<'d>,
    green: Output<'d>,
}

impl<'d> BiColorLed<'d> {
    #[must_use]
    pub fn new(red: Output<'d>, green: Output<'d>) -> Self {
        Self { red, green }
    }

    pub fn set(&mut self, color: LedColor) {
        match color {
            LedColor::Off => {
                self.red.set_low();
                self.green.set_low();
            }
            LedColor::Red => {
                self.red.set_high();
                self.green.set_low();
            }
            LedColor::Green => {
                self.red.set_low();
                self.green.set_high();
            }
        }
    }
}

/// GPIO actuation for the alarm and status indicators.
pub struct ReceiverOutputs<'d> {
    buzzer: Output<'d>,
    signal: BiColorLed<'d>,
    power: BiColorLed<'d>,
    charge: Output<'d>,
}

impl<'d> ReceiverOutputs<'d> {
    #[must_use]
    pub fn new(
        buzzer: Output<'d>,
        signal: BiColorLed<'d>,
        power: BiColorLed<'d>,
        charge: Output<'d>,
    ) -> Self {
        Self {
            buzzer,
            signal,
            power,
            charge,
        }
    }
}

impl AlertOutputs for ReceiverOutputs<'_> {
    fn set_buzzer(&mut self, on: bool) {
        if on {
            self.buzzer.set_high();
        } else {
            self.buzzer.set_low();
        }
    }

    fn set_signal_led(&mut self, color: LedColor) {
        self.signal.set(color);
    }

    fn set_power_led(&mut self, color: LedColor) {
        self.power.set(color);
    }

    fn set_charge_enable(&mut self, on: bool) {
        if on {
            self.charge.set_high();
        } else {
            self.charge.set_low();
        }
    }
}

/// The physical user button, active low.
pub struct UserButton<'d> {
    input: Input<'d>,
}

impl<'d> UserButton<'d> {
    #[must_use]
    pub fn new(input: Input<'d>) -> Self {
        Self { input }
    }

    /// Raw pin level this instant; debouncing happens in the core.
    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.input.is_low()
    }
}
