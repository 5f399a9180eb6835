//! Pitch and yaw rate for the control tick

use core::f32::consts::PI;

use super::{Imu, Vector3};

/// Attitude inputs of one control tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attitude {
    /// Degrees, positive nose up
    pub pitch: i16,
    /// Raw gyro z
    pub yaw_rate: i16,
}

impl Attitude {
    pub fn from_samples(accel: Vector3, gyro: Vector3) -> Self {
        Self {
            pitch: pitch_degrees(accel),
            yaw_rate: gyro.z,
        }
    }

    /// Reads both sensors and composes the attitude
    pub fn sample<I: Imu>(imu: &mut I) -> Result<Self, I::Error> {
        let accel = imu.read_accel()?;
        let gyro = imu.read_gyro()?;
        Ok(Self::from_samples(accel, gyro))
    }
}

/// Pitch from the gravity vector, in whole degrees
pub fn pitch_degrees(accel: Vector3) -> i16 {
    let radians = libm::atan2f(accel.x as f32, accel.z as f32);
    libm::roundf(radians * 180.0 / PI) as i16
}
