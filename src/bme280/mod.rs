use embedded_hal_async::i2c::I2c;
use thiserror::Error;

use crate::fault::Fault;

mod calibration;
pub mod compensation;
pub mod registers;

pub use calibration::CalibrationSet;
pub use compensation::FineTemperature;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error<I2cError> {
    #[error("unexpected chip id {0:#04x}")]
    UnexpectedId(u8),
    #[error("calibration has not been read")]
    MissingCalibration,
    #[error("temperature has not been compensated this cycle")]
    MissingFineTemperature,
    #[error(transparent)]
    Bus(#[from] I2cError),
}

impl<E> Error<E> {
    pub fn fault(&self) -> Fault {
        match self {
            Self::Bus(_) => Fault::Transport,
            _ => Fault::Protocol,
        }
    }
}

impl<E> embedded_hal::i2c::Error for Error<E>
where
    E: embedded_hal::i2c::Error,
{
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        match self {
            Self::Bus(err) => err.kind(),
            _ => embedded_hal::i2c::ErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oversampling {
    Skipped,
    #[default]
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl Oversampling {
    const fn bits(self) -> u8 {
        match self {
            Self::Skipped => 0,
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 3,
            Self::X8 => 4,
            Self::X16 => 5,
        }
    }

    const fn samples(self) -> u32 {
        match self {
            Self::Skipped => 0,
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
            Self::X16 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Sleep,
    #[default]
    Forced,
    Normal,
}

impl Mode {
    const fn bits(self) -> u8 {
        match self {
            Self::Sleep => 0b00,
            Self::Forced => 0b01,
            Self::Normal => 0b11,
        }
    }
}

/// Measurement configuration. The default suits weather monitoring: single
/// oversampling everywhere, forced mode, no IIR filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    pub humidity: Oversampling,
    pub temperature: Oversampling,
    pub pressure: Oversampling,
    pub mode: Mode,
    /// Raw `config` register: standby time, IIR filter, SPI 3-wire enable.
    pub config: u8,
}

impl Settings {
    pub const fn ctrl_hum(&self) -> u8 {
        self.humidity.bits()
    }

    pub const fn ctrl_meas(&self) -> u8 {
        (self.temperature.bits() << 5) | (self.pressure.bits() << 2) | self.mode.bits()
    }

    /// Worst-case conversion time, datasheet section 9.1.
    pub const fn max_measurement_time_us(&self) -> u32 {
        let mut time = 1250 + 2300 * self.temperature.samples();
        if self.pressure.samples() > 0 {
            time += 2300 * self.pressure.samples() + 575;
        }
        if self.humidity.samples() > 0 {
            time += 2300 * self.humidity.samples() + 575;
        }
        time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    pub measuring: bool,
    pub im_update: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawHumidity {
    pub msb: u8,
    pub lsb: u8,
}

impl RawHumidity {
    pub fn adc(&self) -> u16 {
        u16::from_be_bytes([self.msb, self.lsb])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawTemperature {
    pub msb: u8,
    pub lsb: u8,
    pub xlsb: u8,
}

impl RawTemperature {
    /// 20-bit reading.
    pub fn adc(&self) -> u32 {
        adc20(self.msb, self.lsb, self.xlsb)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawPressure {
    pub msb: u8,
    pub lsb: u8,
    pub xlsb: u8,
}

impl RawPressure {
    /// 20-bit reading.
    pub fn adc(&self) -> u32 {
        adc20(self.msb, self.lsb, self.xlsb)
    }
}

fn adc20(msb: u8, lsb: u8, xlsb: u8) -> u32 {
    (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
}

/// BME280 temperature, humidity and pressure sensor.
///
/// Every method is a single bus transaction or a short fixed sequence of
/// them, and returns nothing unless all of them succeeded.
#[derive(Debug)]
pub struct Bme280<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C> Bme280<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, registers::ADDR_PRIMARY)
    }

    pub fn with_address(i2c: I2C, addr: u8) -> Self {
        Self { i2c, addr }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> Bme280<I2C> {
    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c.write(self.addr, &[reg, value]).await?;
        Ok(())
    }

    async fn read_registers<const N: usize>(&mut self, reg: u8) -> Result<[u8; N], Error<I2C::Error>> {
        let mut buf = [0u8; N];
        self.i2c.write_read(self.addr, &[reg], &mut buf).await?;
        Ok(buf)
    }

    /// Soft reset; the device reloads its calibration NVM afterwards.
    pub async fn reset(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_register(registers::RESET, registers::RESET_WORD)
            .await
    }

    /// Writes `ctrl_hum`, `ctrl_meas` and `config`, in that order:
    /// `ctrl_hum` only takes effect once `ctrl_meas` is written.
    pub async fn configure(&mut self, settings: &Settings) -> Result<(), Error<I2C::Error>> {
        self.write_register(registers::CTRL_HUM, settings.ctrl_hum())
            .await?;
        self.write_register(registers::CTRL_MEAS, settings.ctrl_meas())
            .await?;
        self.write_register(registers::CONFIG, settings.config)
            .await
    }

    pub async fn read_id(&mut self) -> Result<u8, Error<I2C::Error>> {
        let [id] = self.read_registers::<1>(registers::ID).await?;
        Ok(id)
    }

    /// Starts a single forced-mode conversion.
    pub async fn trigger_force_mode(&mut self, settings: &Settings) -> Result<(), Error<I2C::Error>> {
        let settings = Settings {
            mode: Mode::Forced,
            ..*settings
        };
        self.write_register(registers::CTRL_MEAS, settings.ctrl_meas())
            .await
    }

    pub async fn read_status(&mut self) -> Result<Status, Error<I2C::Error>> {
        let [status] = self.read_registers::<1>(registers::STATUS).await?;
        Ok(Status {
            measuring: status & registers::STATUS_MEASURING != 0,
            im_update: status & registers::STATUS_IM_UPDATE != 0,
        })
    }

    pub async fn read_humidity_raw(&mut self) -> Result<RawHumidity, Error<I2C::Error>> {
        let [msb, lsb] = self.read_registers::<2>(registers::HUM_MSB).await?;
        Ok(RawHumidity { msb, lsb })
    }

    pub async fn read_temperature_raw(&mut self) -> Result<RawTemperature, Error<I2C::Error>> {
        let [msb, lsb, xlsb] = self.read_registers::<3>(registers::TEMP_MSB).await?;
        Ok(RawTemperature {
            msb,
            lsb,
            xlsb: xlsb & 0xf0,
        })
    }

    pub async fn read_pressure_raw(&mut self) -> Result<RawPressure, Error<I2C::Error>> {
        let [msb, lsb, xlsb] = self.read_registers::<3>(registers::PRESS_MSB).await?;
        Ok(RawPressure {
            msb,
            lsb,
            xlsb: xlsb & 0xf0,
        })
    }

    pub async fn read_calibration(&mut self) -> Result<CalibrationSet, Error<I2C::Error>> {
        let tp = self.read_registers(registers::CALIB_TP).await?;
        let [h1] = self.read_registers::<1>(registers::CALIB_H1).await?;
        let h = self.read_registers(registers::CALIB_H2).await?;

        Ok(CalibrationSet::from_registers(&tp, h1, &h))
    }
}
