//! Electromagnetic sensor fusion
//!
//! Turns the four inductor intensities into a steering error using the
//! ratio-difference law.
//!
//! # Pipeline
//! ```text
//! raw (ADC counts) -> normalize (0..100) -> vector magnitude per side (0..100)
//!                  -> error = -(L - R) * 100 / (L + R + 1)
//! ```
//!
//! Each side carries a horizontal (X) and a vertical (Y) inductor. Taking the
//! vector magnitude of the pair keeps the reading stable for any wire angle
//! under the sensor. The ratio makes the error independent of the overall field
//! strength, which changes with height above the track.

use crate::config::FusionConfig;

/// Inductor channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::LeftX, Channel::LeftY, Channel::RightX, Channel::RightY];

    const fn index(self) -> usize {
        match self {
            Channel::LeftX => 0,
            Channel::LeftY => 1,
            Channel::RightX => 2,
            Channel::RightY => 3,
        }
    }
}

/// Raw bounds for one channel, `max > min`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationPair {
    min: u16,
    max: u16,
}

impl CalibrationPair {
    /// Creates a pair, rejecting bounds that would divide by zero or invert the scale
    pub fn new(min: u16, max: u16) -> Result<Self, CalibrationError> {
        if max > min {
            Ok(Self { min, max })
        } else {
            Err(CalibrationError::InvertedBounds { min, max })
        }
    }

    pub fn min(&self) -> u16 {
        self.min
    }

    pub fn max(&self) -> u16 {
        self.max
    }
}

/// Recalibration failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// `max` must be strictly greater than `min`
    InvertedBounds { min: u16, max: u16 },
}

/// One set of pre-filtered raw inductor samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    pub left_x: u16,
    pub left_y: u16,
    pub right_x: u16,
    pub right_y: u16,
}

/// Result of one fusion pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FusedReading {
    /// Left vector magnitude (0..100)
    pub left_magnitude: u8,
    /// Right vector magnitude (0..100)
    pub right_magnitude: u8,
    /// Ratio-difference error (-100..100); positive when the right side is stronger
    pub steering_error: i16,
    /// `left_magnitude + right_magnitude`
    pub signal_sum: u8,
    /// False when `signal_sum` is below the offline threshold
    pub is_online: bool,
}

impl FusedReading {
    /// Applies the ratio-difference law to already computed magnitudes
    ///
    /// Magnitudes above 100 are saturated first.
    pub fn from_magnitudes(left: u8, right: u8, offline_threshold: u8) -> Self {
        let left = left.min(100);
        let right = right.min(100);
        let sum = left as i16 + right as i16;
        let diff = left as i16 - right as i16;

        if sum < offline_threshold as i16 {
            return Self {
                left_magnitude: left,
                right_magnitude: right,
                steering_error: 0,
                signal_sum: sum as u8,
                is_online: false,
            };
        }

        Self {
            left_magnitude: left,
            right_magnitude: right,
            steering_error: -(diff * 100) / (sum + 1),
            signal_sum: sum as u8,
            is_online: true,
        }
    }
}

/// Clamps `raw` into `[min, max]` and rescales it to 0..100
pub fn normalize(raw: u16, pair: CalibrationPair) -> u8 {
    let clamped = raw.clamp(pair.min, pair.max);
    ((clamped - pair.min) as u32 * 100 / (pair.max - pair.min) as u32) as u8
}

/// Integer square root by Newton iteration
///
/// Three refinement steps from a magnitude-banded seed keep the result within
/// one unit of the real root for every 16-bit input.
pub fn fast_sqrt(value: u32) -> u16 {
    if value < 2 {
        return value as u16;
    }

    let mut root: u32 = if value < 256 {
        8
    } else if value < 4096 {
        32
    } else if value < 65536 {
        128
    } else {
        256
    };

    for _ in 0..3 {
        root = (root + value / root) >> 1;
    }

    root as u16
}

/// Vector magnitude of two normalized components, saturated at 100
fn magnitude(x: u8, y: u8) -> u8 {
    let squared = x as u32 * x as u32 + y as u32 * y as u32;
    fast_sqrt(squared).min(100) as u8
}

/// Sensor fusion unit holding the per-channel calibration
#[derive(Debug, Clone)]
pub struct SensorFusion {
    calibration: [CalibrationPair; 4],
    offline_threshold: u8,
}

impl SensorFusion {
    /// Builds the unit from configuration
    ///
    /// Channels whose configured bounds are not strictly increasing fall back to
    /// the full 12-bit ADC range.
    pub fn new(config: &FusionConfig) -> Self {
        let mut calibration = [CalibrationPair { min: 0, max: 4095 }; 4];
        for channel in Channel::ALL {
            let i = channel.index();
            match CalibrationPair::new(config.raw_min[i], config.raw_max[i]) {
                Ok(pair) => calibration[i] = pair,
                Err(e) => warn!("channel {:?}: {:?}, using full range", channel, e),
            }
        }
        Self {
            calibration,
            offline_threshold: config.offline_threshold,
        }
    }

    /// Replaces the bounds of one channel
    pub fn set_calibration(&mut self, channel: Channel, min: u16, max: u16) -> Result<(), CalibrationError> {
        let pair = CalibrationPair::new(min, max)?;
        self.calibration[channel.index()] = pair;
        info!("channel {:?} recalibrated to {}..{}", channel, min, max);
        Ok(())
    }

    pub fn calibration(&self, channel: Channel) -> CalibrationPair {
        self.calibration[channel.index()]
    }

    pub fn offline_threshold(&self) -> u8 {
        self.offline_threshold
    }

    /// Runs the full fusion pipeline on one set of samples
    pub fn compute(&self, sample: &RawSample) -> FusedReading {
        let left_x = normalize(sample.left_x, self.calibration[Channel::LeftX.index()]);
        let left_y = normalize(sample.left_y, self.calibration[Channel::LeftY.index()]);
        let right_x = normalize(sample.right_x, self.calibration[Channel::RightX.index()]);
        let right_y = normalize(sample.right_y, self.calibration[Channel::RightY.index()]);

        FusedReading::from_magnitudes(
            magnitude(left_x, left_y),
            magnitude(right_x, right_y),
            self.offline_threshold,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unit() -> SensorFusion {
        SensorFusion::new(&FusionConfig::default())
    }

    #[test]
    fn sqrt_is_within_one_unit_over_u16() {
        for value in 0..=u16::MAX as u32 {
            let exact = (value as f64).sqrt();
            let approx = fast_sqrt(value) as f64;
            assert!((approx - exact).abs() <= 1.0, "sqrt({value}) = {approx}, exact {exact}");
        }
    }

    #[test]
    fn sqrt_small_values() {
        assert_eq!(fast_sqrt(0), 0);
        assert_eq!(fast_sqrt(1), 1);
        assert_eq!(fast_sqrt(100), 10);
        assert_eq!(fast_sqrt(10_000), 100);
        assert_eq!(fast_sqrt(20_000), 141);
    }

    #[test]
    fn normalize_clamps_outside_bounds() {
        let pair = CalibrationPair::new(100, 1100).unwrap();
        assert_eq!(normalize(0, pair), 0);
        assert_eq!(normalize(100, pair), 0);
        assert_eq!(normalize(600, pair), 50);
        assert_eq!(normalize(1100, pair), 100);
        assert_eq!(normalize(u16::MAX, pair), 100);
    }

    #[test]
    fn inverted_calibration_is_rejected() {
        let mut fusion = unit();
        let before = fusion.calibration(Channel::RightY);
        assert_eq!(
            fusion.set_calibration(Channel::RightY, 500, 500),
            Err(CalibrationError::InvertedBounds { min: 500, max: 500 })
        );
        assert_eq!(fusion.calibration(Channel::RightY), before);

        fusion.set_calibration(Channel::RightY, 200, 900).unwrap();
        assert_eq!(fusion.calibration(Channel::RightY).min(), 200);
        assert_eq!(fusion.calibration(Channel::RightY).max(), 900);
    }

    #[test]
    fn balanced_signal_is_centered() {
        let sample = RawSample {
            left_x: 2000,
            left_y: 1000,
            right_x: 2000,
            right_y: 1000,
        };
        let reading = unit().compute(&sample);
        assert!(reading.is_online);
        assert_eq!(reading.steering_error, 0);
        assert_eq!(reading.left_magnitude, reading.right_magnitude);
    }

    #[test]
    fn stronger_right_gives_positive_error() {
        let sample = RawSample {
            left_x: 800,
            left_y: 400,
            right_x: 3000,
            right_y: 1500,
        };
        let reading = unit().compute(&sample);
        assert!(reading.is_online);
        assert!(reading.steering_error > 0);
        assert!(reading.right_magnitude > reading.left_magnitude);
    }

    #[test]
    fn saturated_channels_cap_magnitude() {
        let sample = RawSample {
            left_x: 4000,
            left_y: 4000,
            right_x: 4000,
            right_y: 4000,
        };
        let reading = unit().compute(&sample);
        assert_eq!(reading.left_magnitude, 100);
        assert_eq!(reading.right_magnitude, 100);
        assert_eq!(reading.signal_sum, 200);
    }

    #[test]
    fn weak_signal_goes_offline() {
        let reading = unit().compute(&RawSample::default());
        assert!(!reading.is_online);
        assert_eq!(reading.steering_error, 0);

        let reading = FusedReading::from_magnitudes(15, 3, OFFLINE);
        assert!(!reading.is_online);
        assert_eq!(reading.steering_error, 0);
    }

    const OFFLINE: u8 = crate::config::OFFLINE_THRESHOLD;

    proptest! {
        #[test]
        fn normalize_stays_in_range(raw in any::<u16>(), min in 0u16..4000, span in 1u16..4000) {
            let pair = CalibrationPair::new(min, min + span).unwrap();
            prop_assert!(normalize(raw, pair) <= 100);
        }

        #[test]
        fn sqrt_matches_exact_root(value in 0u32..=65_535) {
            let exact = (value as f64).sqrt();
            prop_assert!((fast_sqrt(value) as f64 - exact).abs() <= 1.0);
        }

        #[test]
        fn online_error_is_bounded_and_signed(left in 0u8..=100, right in 0u8..=100) {
            let reading = FusedReading::from_magnitudes(left, right, OFFLINE);
            let sum = left as u16 + right as u16;
            if sum >= OFFLINE as u16 {
                prop_assert!(reading.is_online);
                prop_assert!((-100..=100).contains(&reading.steering_error));
                if left > right {
                    prop_assert!(reading.steering_error <= 0);
                } else if right > left {
                    prop_assert!(reading.steering_error >= 0);
                } else {
                    prop_assert_eq!(reading.steering_error, 0);
                }
            } else {
                prop_assert!(!reading.is_online);
                prop_assert_eq!(reading.steering_error, 0);
            }
        }
    }
}
