//! External-supply sensing on the ADC.

use embassy_stm32::Peri;
use embassy_stm32::adc::Adc;
use embassy_stm32::peripherals::{ADC1, PA0};

use receiver_core::tuner::ExtPowerSource;

/// ADC wrapper sampling the external-power divider.
pub struct ExtPowerAdc<'d> {
    adc: Adc<'d, ADC1>,
    pin: Peri<'d, PA0>,
}

impl<'d> ExtPowerAdc<'d> {
    #[must_use]
    pub fn new(adc: Adc<'d, ADC1>, pin: Peri<'d, PA0>) -> Self {
        Self { adc, pin }
    }
}

impl ExtPowerSource for ExtPowerAdc<'_> {
    fn read_raw(&mut self) -> u16 {
        // The 12-bit conversion is scaled down to the 9-bit units the power
        // filter's millivolt factor expects.
        self.adc.blocking_read(&mut self.pin) >> 3
    }
}
