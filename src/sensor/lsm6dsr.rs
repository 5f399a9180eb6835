//! LSM6DSR 6-axis IMU over SPI
//!
//! Configured for 104 Hz output, ±8 g and ±2000 dps with block data update and
//! register auto-increment, so one burst read returns a consistent sample.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use super::{read_register, read_registers, write_register, Imu, ImuError, Vector3};

pub const WHO_AM_I: u8 = 0x0F;
/// Identification value of the part
pub const DEVICE_ID: u8 = 0x6B;

const CTRL1_XL: u8 = 0x10;
const CTRL2_G: u8 = 0x11;
const CTRL3_C: u8 = 0x12;
const OUTX_L_G: u8 = 0x22;
const OUTX_L_A: u8 = 0x28;

const SW_RESET: u8 = 0x01;
/// BDU | IF_INC
const CTRL3_BDU_IF_INC: u8 = 0x44;
/// ODR 104 Hz, ±8 g
const ACCEL_104HZ_8G: u8 = 0x4C;
/// ODR 104 Hz, ±2000 dps
const GYRO_104HZ_2000DPS: u8 = 0x4C;

pub struct Lsm6dsr<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Lsm6dsr<SPI> {
    /// Resets and configures a part already known to answer with [`DEVICE_ID`]
    pub fn new(mut spi: SPI, delay: &mut impl DelayNs) -> Result<Self, ImuError<SPI::Error>> {
        write_register(&mut spi, CTRL3_C, SW_RESET).map_err(ImuError::Spi)?;
        delay.delay_ms(20);
        write_register(&mut spi, CTRL3_C, CTRL3_BDU_IF_INC).map_err(ImuError::Spi)?;
        write_register(&mut spi, CTRL1_XL, ACCEL_104HZ_8G).map_err(ImuError::Spi)?;
        write_register(&mut spi, CTRL2_G, GYRO_104HZ_2000DPS).map_err(ImuError::Spi)?;
        delay.delay_ms(10);
        Ok(Self { spi })
    }

    /// Reads the identification register
    pub fn who_am_i(spi: &mut SPI) -> Result<u8, SPI::Error> {
        read_register(spi, WHO_AM_I)
    }

    fn read_vector(&mut self, register: u8) -> Result<Vector3, SPI::Error> {
        let mut raw = [0u8; 6];
        read_registers(&mut self.spi, register, &mut raw)?;
        Ok(Vector3::from_le(&raw))
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> Imu for Lsm6dsr<SPI> {
    type Error = SPI::Error;

    fn read_accel(&mut self) -> Result<Vector3, SPI::Error> {
        self.read_vector(OUTX_L_A)
    }

    fn read_gyro(&mut self) -> Result<Vector3, SPI::Error> {
        self.read_vector(OUTX_L_G)
    }
}
