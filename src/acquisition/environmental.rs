use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use super::{CycleSummary, Outcome, Sequencer, run_cycle};
use crate::bme280::compensation::{self, compensate_humidity, compensate_pressure, compensate_temperature};
use crate::bme280::{
    Bme280, CalibrationSet, FineTemperature, RawHumidity, RawPressure, RawTemperature,
    Error, Settings, registers,
};
use crate::config::Timing;
use crate::fault::Fault;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnvironmentalState {
    Reset,
    Init,
    ReadId,
    GetCalibration,
    ForceMode,
    MeasureHumidity,
    MeasureTemperature,
    MeasurePressure,
    CompensateTemperature,
    CompensateHumidity,
    CompensatePressure,
    Done,
}

impl EnvironmentalState {
    pub const fn next(self, outcome: Outcome) -> Self {
        match outcome {
            Outcome::Failure => self,
            Outcome::Success => match self {
                Self::Reset => Self::Init,
                Self::Init => Self::ReadId,
                Self::ReadId => Self::GetCalibration,
                Self::GetCalibration => Self::ForceMode,
                Self::ForceMode => Self::MeasureHumidity,
                Self::MeasureHumidity => Self::MeasureTemperature,
                Self::MeasureTemperature => Self::MeasurePressure,
                Self::MeasurePressure => Self::CompensateTemperature,
                Self::CompensateTemperature => Self::CompensateHumidity,
                Self::CompensateHumidity => Self::CompensatePressure,
                Self::CompensatePressure | Self::Done => Self::Done,
            },
        }
    }
}

/// Compensated readings: °C, %RH and hPa.
///
/// Pressure is `None` when the calibration makes its formula undefined.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Environment {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: Option<f64>,
}

impl Environment {
    pub const ZERO: Self = Self {
        temperature: 0.0,
        humidity: 0.0,
        pressure: None,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawMeasurement {
    pub humidity: RawHumidity,
    pub temperature: RawTemperature,
    pub pressure: RawPressure,
}

/// Values that only live for one conversion.
#[derive(Clone, Copy, Debug, Default)]
struct CycleContext {
    fine: Option<FineTemperature>,
}

/// Acquisition sequence for the BME280.
///
/// The first cycle resets, configures and identifies the chip and reads its
/// calibration. Later cycles go straight to a forced conversion.
pub struct EnvironmentalMachine<I2C, D> {
    sensor: Bme280<I2C>,
    delay: D,
    settings: Settings,
    timing: Timing,
    state: EnvironmentalState,
    calibration: Option<CalibrationSet>,
    cycle: CycleContext,
    raw: RawMeasurement,
    reading: Environment,
}

impl<I2C, D> EnvironmentalMachine<I2C, D> {
    pub fn new(sensor: Bme280<I2C>, delay: D, settings: Settings, timing: Timing) -> Self {
        Self {
            sensor,
            delay,
            settings,
            timing,
            state: EnvironmentalState::Reset,
            calibration: None,
            cycle: CycleContext::default(),
            raw: RawMeasurement::default(),
            reading: Environment::ZERO,
        }
    }

    /// Forgets the calibration; the next cycle starts from a chip reset.
    pub fn reset(&mut self) {
        self.calibration = None;
        self.state = EnvironmentalState::Reset;
    }

    pub fn reading(&self) -> Environment {
        self.reading
    }

    pub fn raw(&self) -> RawMeasurement {
        self.raw
    }

    pub fn calibration(&self) -> Option<&CalibrationSet> {
        self.calibration.as_ref()
    }

    pub fn release(self) -> (I2C, D) {
        (self.sensor.release(), self.delay)
    }
}

impl<I2C, D> EnvironmentalMachine<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// One acquisition cycle followed by the hand-off pause.
    pub async fn cycle(&mut self) -> CycleSummary {
        let summary = run_cycle(self).await;
        self.delay.delay_ms(self.timing.handoff_ms).await;
        summary
    }

    async fn execute(&mut self) -> Result<(), Error<I2C::Error>> {
        match self.state {
            EnvironmentalState::Reset => {
                self.sensor.reset().await?;
                self.calibration = None;
            }
            EnvironmentalState::Init => self.sensor.configure(&self.settings).await?,
            EnvironmentalState::ReadId => {
                let id = self.sensor.read_id().await?;
                if id != registers::CHIP_ID {
                    return Err(Error::UnexpectedId(id));
                }
            }
            EnvironmentalState::GetCalibration => {
                self.calibration = Some(self.sensor.read_calibration().await?);
            }
            EnvironmentalState::ForceMode => {
                self.sensor.trigger_force_mode(&self.settings).await?;
                self.cycle = CycleContext::default();
                let wait = self.timing.conversion_wait_ms(&self.settings);
                self.delay.delay_ms(wait).await;
            }
            EnvironmentalState::MeasureHumidity => {
                self.raw.humidity = self.sensor.read_humidity_raw().await?;
            }
            EnvironmentalState::MeasureTemperature => {
                self.raw.temperature = self.sensor.read_temperature_raw().await?;
            }
            EnvironmentalState::MeasurePressure => {
                self.raw.pressure = self.sensor.read_pressure_raw().await?;
            }
            EnvironmentalState::CompensateTemperature => {
                let calib = self.calibration.as_ref().ok_or(Error::<I2C::Error>::MissingCalibration)?;
                let (celsius, fine) = compensate_temperature(calib, self.raw.temperature);
                self.cycle.fine = Some(fine);
                self.reading.temperature = celsius;
            }
            EnvironmentalState::CompensateHumidity => {
                let calib = self.calibration.as_ref().ok_or(Error::<I2C::Error>::MissingCalibration)?;
                let fine = self.cycle.fine.ok_or(Error::<I2C::Error>::MissingFineTemperature)?;
                self.reading.humidity = compensate_humidity(calib, fine, self.raw.humidity);
            }
            EnvironmentalState::CompensatePressure => {
                let calib = self.calibration.as_ref().ok_or(Error::<I2C::Error>::MissingCalibration)?;
                let fine = self.cycle.fine.ok_or(Error::<I2C::Error>::MissingFineTemperature)?;
                self.reading.pressure = match compensate_pressure(calib, fine, self.raw.pressure) {
                    Ok(hpa) => Some(hpa),
                    Err(compensation::Error::DivisionByZero) => {
                        error!("pressure undefined for this calibration");
                        None
                    }
                };
                info!(
                    "temp {} hum {} press {}",
                    self.reading.temperature, self.reading.humidity, self.reading.pressure
                );
            }
            EnvironmentalState::Done => {}
        }

        Ok(())
    }
}

impl<I2C, D> Sequencer for EnvironmentalMachine<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    type State = EnvironmentalState;

    fn state(&self) -> EnvironmentalState {
        self.state
    }

    fn is_done(&self) -> bool {
        self.state == EnvironmentalState::Done
    }

    async fn step(&mut self) -> Result<(), Fault> {
        let state = self.state;
        let result = self.execute().await;
        let outcome = match result {
            Ok(()) => Outcome::Success,
            Err(_) => Outcome::Failure,
        };
        self.state = state.next(outcome);
        trace!("bme280 {} -> {}", state, self.state);

        result.map_err(|err| {
            warn!("bme280 {} failed: {}", state, err.fault());
            err.fault()
        })
    }

    fn restart(&mut self) {
        self.state = if self.calibration.is_some() {
            EnvironmentalState::ForceMode
        } else {
            EnvironmentalState::Reset
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{CycleSummary, MAX_FAILURES, run_cycle};
    use crate::debug_utils::{RecordingDelay, RegisterBus};
    use embassy_futures::block_on;

    fn tp_block(p1: u16) -> std::vec::Vec<u8> {
        let words: [u16; 12] = [
            27504,
            26435,
            -1000i16 as u16,
            p1,
            -10685i16 as u16,
            3024,
            2855,
            140,
            -7i16 as u16,
            15500,
            -14600i16 as u16,
            6000,
        ];
        words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    /// Datasheet worked example: 25.08 °C, 1006.53 hPa, 38.28 %RH.
    fn sensor_bus(p1: u16) -> RegisterBus {
        let mut bus = RegisterBus::default();
        bus.load(registers::ID, &[registers::CHIP_ID]);
        bus.load(registers::CALIB_TP, &tp_block(p1));
        bus.load(registers::CALIB_H1, &[75]);
        bus.load(registers::CALIB_H2, &[0x6a, 0x01, 0x00, 0x13, 0x29, 0x03, 0x1e]);
        bus.load(
            registers::PRESS_MSB,
            &[0x65, 0x5a, 0xc0, 0x7e, 0xed, 0x00, 0x69, 0x78],
        );
        bus
    }

    fn machine(
        bus: &mut RegisterBus,
    ) -> EnvironmentalMachine<&mut RegisterBus, RecordingDelay> {
        EnvironmentalMachine::new(
            Bme280::new(bus),
            RecordingDelay::default(),
            Settings::default(),
            Timing::DEFAULT,
        )
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(((actual - expected) / expected).abs() < 1e-6, "{actual} vs {expected}");
    }

    #[test]
    fn test_first_cycle_visits_every_state_once() {
        use EnvironmentalState::*;

        let mut bus = sensor_bus(36477);
        let mut machine = machine(&mut bus);
        let mut visited = std::vec::Vec::new();
        while !machine.is_done() {
            visited.push(machine.state());
            block_on(machine.step()).unwrap();
        }

        assert_eq!(
            visited,
            [
                Reset,
                Init,
                ReadId,
                GetCalibration,
                ForceMode,
                MeasureHumidity,
                MeasureTemperature,
                MeasurePressure,
                CompensateTemperature,
                CompensateHumidity,
                CompensatePressure,
            ]
        );
        assert_eq!(machine.raw().pressure.adc(), 415148);
        assert_eq!(machine.raw().temperature.adc(), 519888);
        assert_eq!(machine.raw().humidity.adc(), 27000);

        let reading = machine.reading();
        assert_close(reading.temperature, 25.08247793081682);
        assert_close(reading.humidity, 38.275054276373446);
        assert_close(reading.pressure.unwrap(), 1006.5325814481472);

        let (_, delay) = machine.release();
        assert_eq!(delay.ms, [15]);
    }

    #[test]
    fn test_mid_sequence_failure_repeats_the_state() {
        use EnvironmentalState::*;

        let mut bus = sensor_bus(36477);
        bus.fail_once = Some(registers::TEMP_MSB);
        let mut machine = machine(&mut bus);
        let mut attempted = std::vec::Vec::new();
        let mut failures = 0;
        while !machine.is_done() {
            attempted.push(machine.state());
            if block_on(machine.step()).is_err() {
                failures += 1;
            }
        }

        assert_eq!(failures, 1);
        assert_eq!(
            attempted,
            [
                Reset,
                Init,
                ReadId,
                GetCalibration,
                ForceMode,
                MeasureHumidity,
                MeasureTemperature,
                MeasureTemperature,
                MeasurePressure,
                CompensateTemperature,
                CompensateHumidity,
                CompensatePressure,
            ]
        );
        let reading = machine.reading();
        assert_close(reading.temperature, 25.08247793081682);
        assert_close(reading.humidity, 38.275054276373446);
        assert_close(reading.pressure.unwrap(), 1006.5325814481472);
    }

    #[test]
    fn test_later_cycles_skip_initialisation() {
        let mut bus = sensor_bus(36477);
        let mut machine = machine(&mut bus);

        let first = block_on(run_cycle(&mut machine));
        assert!(first.completed);
        assert_eq!(machine.state(), EnvironmentalState::ForceMode);
        let second = block_on(run_cycle(&mut machine));
        assert!(second.completed);
        drop(machine);

        let written: std::vec::Vec<u8> = bus.writes.iter().map(|(reg, _)| *reg).collect();
        assert_eq!(
            written,
            [
                registers::RESET,
                registers::CTRL_HUM,
                registers::CTRL_MEAS,
                registers::CONFIG,
                registers::CTRL_MEAS,
                registers::CTRL_MEAS,
            ]
        );
        assert_eq!(bus.reads.iter().filter(|&&reg| reg == registers::ID).count(), 1);
    }

    #[test]
    fn test_transient_failure_is_retried_in_place() {
        let mut bus = sensor_bus(36477);
        bus.fail_next = 1;
        let mut machine = machine(&mut bus);

        let summary = block_on(run_cycle(&mut machine));
        assert_eq!(
            summary,
            CycleSummary {
                completed: true,
                failures: 1
            }
        );
        drop(machine);
        assert_eq!(bus.writes[0].0, registers::RESET);
        assert_eq!(bus.writes.len(), 5);
    }

    #[test]
    fn test_wrong_chip_exhausts_budget_and_restarts_uncalibrated_at_reset() {
        let mut bus = sensor_bus(36477);
        bus.load(registers::ID, &[0x58]);
        let mut machine = machine(&mut bus);

        let summary = block_on(run_cycle(&mut machine));
        assert_eq!(
            summary,
            CycleSummary {
                completed: false,
                failures: MAX_FAILURES
            }
        );
        assert!(machine.calibration().is_none());
        assert_eq!(machine.state(), EnvironmentalState::Reset);
        drop(machine);
        assert_eq!(bus.reads, [registers::ID; 5]);
    }

    #[test]
    fn test_failing_measurement_never_advances_and_restarts_at_force_mode() {
        let mut bus = sensor_bus(36477);
        bus.fail_register = Some(registers::HUM_MSB);
        let mut machine = machine(&mut bus);

        let summary = block_on(run_cycle(&mut machine));
        assert!(!summary.completed);
        assert_eq!(summary.failures, MAX_FAILURES);
        assert!(machine.calibration().is_some());
        assert_eq!(machine.state(), EnvironmentalState::ForceMode);
        assert_eq!(machine.reading(), Environment::ZERO);
        drop(machine);
        assert!(!bus.reads.contains(&registers::TEMP_MSB));
    }

    #[test]
    fn test_undefined_pressure_is_dropped() {
        let mut bus = sensor_bus(0);
        let mut machine = machine(&mut bus);

        let summary = block_on(run_cycle(&mut machine));
        assert_eq!(
            summary,
            CycleSummary {
                completed: true,
                failures: 0
            }
        );
        let reading = machine.reading();
        assert_eq!(reading.pressure, None);
        assert_close(reading.temperature, 25.08247793081682);
    }

    #[test]
    fn test_cycle_ends_with_hand_off_pause() {
        let mut bus = sensor_bus(36477);
        let mut machine = machine(&mut bus);

        assert!(block_on(machine.cycle()).completed);
        let (_, delay) = machine.release();
        assert_eq!(delay.ms, [15, 500]);
    }

    #[test]
    fn test_reset_forgets_calibration() {
        let mut bus = sensor_bus(36477);
        let mut machine = machine(&mut bus);

        block_on(run_cycle(&mut machine));
        assert!(machine.calibration().is_some());
        machine.reset();
        assert!(machine.calibration().is_none());
        assert_eq!(machine.state(), EnvironmentalState::Reset);
    }

    #[test]
    fn test_compensation_requires_fine_temperature() {
        let mut bus = sensor_bus(36477);
        let mut machine = machine(&mut bus);
        machine.calibration = Some(CalibrationSet::default());
        machine.state = EnvironmentalState::CompensateHumidity;

        assert_eq!(block_on(machine.step()), Err(Fault::Protocol));
        assert_eq!(machine.state(), EnvironmentalState::CompensateHumidity);
    }
}
