//! MPU6500 6-axis IMU over SPI
//!
//! Woken from sleep on the PLL clock with ±8 g and ±2000 dps full scale. Samples
//! are big-endian.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use super::{read_register, read_registers, write_register, Imu, ImuError, Vector3};

pub const WHO_AM_I: u8 = 0x75;
/// Identification value of the part
pub const DEVICE_ID: u8 = 0x70;

const PWR_MGMT_1: u8 = 0x6B;
const USER_CTRL: u8 = 0x6A;
const GYRO_CONFIG: u8 = 0x1B;
const ACCEL_CONFIG: u8 = 0x1C;
const ACCEL_XOUT_H: u8 = 0x3B;
const GYRO_XOUT_H: u8 = 0x43;

const DEVICE_RESET: u8 = 0x80;
/// Awake, clock from the gyro PLL
const CLOCK_PLL: u8 = 0x01;
/// Disable the I2C slave interface
const I2C_IF_DIS: u8 = 0x10;
const GYRO_2000DPS: u8 = 0x18;
const ACCEL_8G: u8 = 0x10;

pub struct Mpu6500<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Mpu6500<SPI> {
    /// Resets and configures a part already known to answer with [`DEVICE_ID`]
    pub fn new(mut spi: SPI, delay: &mut impl DelayNs) -> Result<Self, ImuError<SPI::Error>> {
        write_register(&mut spi, PWR_MGMT_1, DEVICE_RESET).map_err(ImuError::Spi)?;
        delay.delay_ms(100);
        write_register(&mut spi, PWR_MGMT_1, CLOCK_PLL).map_err(ImuError::Spi)?;
        write_register(&mut spi, USER_CTRL, I2C_IF_DIS).map_err(ImuError::Spi)?;
        write_register(&mut spi, GYRO_CONFIG, GYRO_2000DPS).map_err(ImuError::Spi)?;
        write_register(&mut spi, ACCEL_CONFIG, ACCEL_8G).map_err(ImuError::Spi)?;
        delay.delay_ms(10);
        Ok(Self { spi })
    }

    pub fn who_am_i(spi: &mut SPI) -> Result<u8, SPI::Error> {
        read_register(spi, WHO_AM_I)
    }

    fn read_vector(&mut self, register: u8) -> Result<Vector3, SPI::Error> {
        let mut raw = [0u8; 6];
        read_registers(&mut self.spi, register, &mut raw)?;
        Ok(Vector3::from_be(&raw))
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> Imu for Mpu6500<SPI> {
    type Error = SPI::Error;

    fn read_accel(&mut self) -> Result<Vector3, SPI::Error> {
        self.read_vector(ACCEL_XOUT_H)
    }

    fn read_gyro(&mut self) -> Result<Vector3, SPI::Error> {
        self.read_vector(GYRO_XOUT_H)
    }
}
