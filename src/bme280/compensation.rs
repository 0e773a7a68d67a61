//! Floating-point compensation formulas from the BME280 datasheet, section 8.1.
//!
//! Temperature has to be compensated first in every cycle: it yields the
//! [`FineTemperature`] that the pressure and humidity formulas take as input.

use thiserror::Error;

use super::calibration::CalibrationSet;
use super::{RawHumidity, RawPressure, RawTemperature};
use crate::fault::Fault;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[error("pressure compensation divides by zero")]
    DivisionByZero,
}

impl Error {
    pub fn fault(&self) -> Fault {
        Fault::Computation
    }
}

/// Fine-resolution temperature carried from temperature compensation into
/// the pressure and humidity formulas of the same cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FineTemperature(i32);

impl FineTemperature {
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i32 {
        self.0
    }
}

/// Returns degrees Celsius and the fine temperature.
pub fn compensate_temperature(
    calib: &CalibrationSet,
    raw: RawTemperature,
) -> (f64, FineTemperature) {
    let adc_t = f64::from(raw.adc());
    let t1 = f64::from(calib.dig_t1);
    let t2 = f64::from(calib.dig_t2);
    let t3 = f64::from(calib.dig_t3);

    let var1 = (adc_t / 16384.0 - t1 / 1024.0) * t2;
    let var2 = (adc_t / 131072.0 - t1 / 8192.0) * (adc_t / 131072.0 - t1 / 8192.0) * t3;

    let fine = FineTemperature((var1 + var2) as i32);
    ((var1 + var2) / 5120.0, fine)
}

/// Returns hectopascal.
pub fn compensate_pressure(
    calib: &CalibrationSet,
    fine: FineTemperature,
    raw: RawPressure,
) -> Result<f64, Error> {
    let adc_p = f64::from(raw.adc());
    let p1 = f64::from(calib.dig_p1);
    let p2 = f64::from(calib.dig_p2);
    let p3 = f64::from(calib.dig_p3);
    let p4 = f64::from(calib.dig_p4);
    let p5 = f64::from(calib.dig_p5);
    let p6 = f64::from(calib.dig_p6);
    let p7 = f64::from(calib.dig_p7);
    let p8 = f64::from(calib.dig_p8);
    let p9 = f64::from(calib.dig_p9);

    let mut var1 = f64::from(fine.value()) / 2.0 - 64000.0;
    let mut var2 = var1 * var1 * p6 / 32768.0;
    var2 += var1 * p5 * 2.0;
    var2 = var2 / 4.0 + p4 * 65536.0;
    var1 = (p3 * var1 * var1 / 524288.0 + p2 * var1) / 524288.0;
    var1 = (1.0 + var1 / 32768.0) * p1;

    if var1 == 0.0 {
        return Err(Error::DivisionByZero);
    }

    let mut pascal = 1048576.0 - adc_p;
    pascal = (pascal - var2 / 4096.0) * 6250.0 / var1;
    var1 = p9 * pascal * pascal / 2147483648.0;
    var2 = pascal * p8 / 32768.0;
    pascal += (var1 + var2 + p7) / 16.0;

    Ok(pascal / 100.0)
}

/// Returns relative humidity in percent, clamped to `0.0..=100.0`.
pub fn compensate_humidity(calib: &CalibrationSet, fine: FineTemperature, raw: RawHumidity) -> f64 {
    let adc_h = f64::from(raw.adc());
    let h1 = f64::from(calib.dig_h1);
    let h2 = f64::from(calib.dig_h2);
    let h3 = f64::from(calib.dig_h3);
    let h4 = f64::from(calib.dig_h4);
    let h5 = f64::from(calib.dig_h5);
    let h6 = f64::from(calib.dig_h6);

    let mut var = f64::from(fine.value()) - 76800.0;
    var = (adc_h - (h4 * 64.0 + h5 / 16384.0 * var))
        * (h2 / 65536.0 * (1.0 + h6 / 67108864.0 * var * (1.0 + h3 / 67108864.0 * var)));
    var *= 1.0 - h1 * var / 524288.0;

    if var.is_nan() { 0.0 } else { var.clamp(0.0, 100.0) }
}
