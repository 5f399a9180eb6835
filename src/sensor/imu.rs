//! Runtime IMU selection
//!
//! The board may carry either part. [`ImuDevice::probe`] reads both
//! identification registers and configures whichever one answers.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use super::lsm6dsr::{self, Lsm6dsr};
use super::mpu6500::{self, Mpu6500};
use super::{Imu, ImuError, Vector3};

/// Identification attempts before giving up
const PROBE_ATTEMPTS: u8 = 5;

/// Supported part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImuKind {
    Lsm6dsr,
    Mpu6500,
}

/// One of the supported IMUs, chosen by probing
pub enum ImuDevice<SPI> {
    Lsm6dsr(Lsm6dsr<SPI>),
    Mpu6500(Mpu6500<SPI>),
}

impl<SPI: SpiDevice> ImuDevice<SPI> {
    /// Identifies and configures the IMU on `spi`
    ///
    /// The LSM6DSR powers up in I2C mode and needs one SPI transfer before it
    /// answers, so the first read is discarded and identification is retried.
    pub fn probe(mut spi: SPI, delay: &mut impl DelayNs) -> Result<Self, ImuError<SPI::Error>> {
        Lsm6dsr::who_am_i(&mut spi).map_err(ImuError::Spi)?;
        delay.delay_ms(10);

        let mut last_id = 0;
        for _ in 0..PROBE_ATTEMPTS {
            let id = Lsm6dsr::who_am_i(&mut spi).map_err(ImuError::Spi)?;
            if id == lsm6dsr::DEVICE_ID {
                info!("LSM6DSR found");
                return Ok(Self::Lsm6dsr(Lsm6dsr::new(spi, delay)?));
            }

            let id = Mpu6500::who_am_i(&mut spi).map_err(ImuError::Spi)?;
            if id == mpu6500::DEVICE_ID {
                info!("MPU6500 found");
                return Ok(Self::Mpu6500(Mpu6500::new(spi, delay)?));
            }

            last_id = id;
            delay.delay_ms(10);
        }

        warn!("no supported IMU answered, last id {}", last_id);
        Err(ImuError::UnknownDevice(last_id))
    }

    pub fn kind(&self) -> ImuKind {
        match self {
            Self::Lsm6dsr(_) => ImuKind::Lsm6dsr,
            Self::Mpu6500(_) => ImuKind::Mpu6500,
        }
    }
}

impl<SPI: SpiDevice> Imu for ImuDevice<SPI> {
    type Error = SPI::Error;

    fn read_accel(&mut self) -> Result<Vector3, SPI::Error> {
        match self {
            Self::Lsm6dsr(imu) => imu.read_accel(),
            Self::Mpu6500(imu) => imu.read_accel(),
        }
    }

    fn read_gyro(&mut self) -> Result<Vector3, SPI::Error> {
        match self {
            Self::Lsm6dsr(imu) => imu.read_gyro(),
            Self::Mpu6500(imu) => imu.read_gyro(),
        }
    }
}
