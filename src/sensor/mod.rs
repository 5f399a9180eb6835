//! Inertial sensing
//!
//! The control tick needs two numbers from the IMU: yaw rate and pitch. Boards
//! carry one of two parts on the same SPI bus, so the driver is picked at
//! start-up by probing the identification registers (see [`imu::ImuDevice`]).

use embedded_hal::spi::{Operation, SpiDevice};

pub mod attitude;
pub mod imu;
pub mod lsm6dsr;
pub mod mpu6500;

/// Raw three-axis sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vector3 {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Vector3 {
    fn from_le(bytes: &[u8; 6]) -> Self {
        Self {
            x: i16::from_le_bytes([bytes[0], bytes[1]]),
            y: i16::from_le_bytes([bytes[2], bytes[3]]),
            z: i16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }

    fn from_be(bytes: &[u8; 6]) -> Self {
        Self {
            x: i16::from_be_bytes([bytes[0], bytes[1]]),
            y: i16::from_be_bytes([bytes[2], bytes[3]]),
            z: i16::from_be_bytes([bytes[4], bytes[5]]),
        }
    }
}

/// IMU failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImuError<E> {
    /// Bus transfer failed
    Spi(E),
    /// No supported part answered; carries the last identification byte read
    UnknownDevice(u8),
}

/// Accelerometer and gyroscope access
pub trait Imu {
    type Error;

    fn read_accel(&mut self) -> Result<Vector3, Self::Error>;
    fn read_gyro(&mut self) -> Result<Vector3, Self::Error>;
}

/// Read flag in the SPI address byte, shared by both supported parts
const SPI_READ: u8 = 0x80;

fn read_registers<SPI: SpiDevice>(spi: &mut SPI, register: u8, buffer: &mut [u8]) -> Result<(), SPI::Error> {
    spi.transaction(&mut [Operation::Write(&[register | SPI_READ]), Operation::Read(buffer)])
}

fn read_register<SPI: SpiDevice>(spi: &mut SPI, register: u8) -> Result<u8, SPI::Error> {
    let mut value = [0u8; 1];
    read_registers(spi, register, &mut value)?;
    Ok(value[0])
}

fn write_register<SPI: SpiDevice>(spi: &mut SPI, register: u8, value: u8) -> Result<(), SPI::Error> {
    spi.write(&[register & !SPI_READ, value])
}
