//! Wheel target shaping and fan duty curve

use crate::config::DriveConfig;

/// Per-wheel speed targets, encoder pulses per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WheelTargets {
    pub left: i16,
    pub right: i16,
}

/// Scales the base target speed by a percentage
pub fn scale_speed(target_speed: i16, scale_percent: u8) -> i16 {
    (target_speed as i32 * scale_percent as i32 / 100) as i16
}

/// Splits the base speed into wheel targets
///
/// `direction` and `offset` both push the left wheel forward and hold the right one
/// back, so a positive value turns right. Each target is clamped to `±max`.
pub fn split_targets(base: i16, direction: i32, offset: i16, max: i16) -> WheelTargets {
    let max = max.unsigned_abs() as i32;
    let steer = direction.saturating_add(offset as i32);
    WheelTargets {
        left: (base as i32).saturating_add(steer).clamp(-max, max) as i16,
        right: (base as i32).saturating_sub(steer).clamp(-max, max) as i16,
    }
}

/// Fan duty that holds the vehicle against the surface at `pitch` degrees
///
/// Grows linearly with the absolute pitch and saturates at `fan_duty_max`.
pub fn fan_duty(pitch: i16, config: &DriveConfig) -> u16 {
    let duty = config.fan_base_duty as u32 + pitch.unsigned_abs() as u32 * config.fan_duty_per_degree as u32;
    duty.min(config.fan_duty_max as u32) as u16
}

/// Converts a fan override in percent into a duty
pub fn percent_duty(percent: u8, config: &DriveConfig) -> u16 {
    (percent.min(100) as u32 * config.fan_duty_max as u32 / 100) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scale_is_a_percentage() {
        assert_eq!(scale_speed(50, 100), 50);
        assert_eq!(scale_speed(50, 70), 35);
        assert_eq!(scale_speed(200, 85), 170);
        assert_eq!(scale_speed(-40, 50), -20);
    }

    #[test]
    fn steering_is_antisymmetric() {
        let targets = split_targets(50, 10, 0, 200);
        assert_eq!(targets, WheelTargets { left: 60, right: 40 });

        let targets = split_targets(50, -10, 80, 200);
        assert_eq!(targets, WheelTargets { left: 120, right: -20 });
    }

    #[test]
    fn targets_are_clamped() {
        let targets = split_targets(200, 120, 80, 200);
        assert_eq!(targets, WheelTargets { left: 200, right: 0 });
        let targets = split_targets(0, i32::MIN, -80, 200);
        assert_eq!(targets, WheelTargets { left: -200, right: 200 });
    }

    #[test]
    fn fan_curve_saturates() {
        let config = DriveConfig::default();
        assert_eq!(fan_duty(0, &config), 3000);
        assert_eq!(fan_duty(10, &config), 3800);
        assert_eq!(fan_duty(-10, &config), 3800);
        assert_eq!(fan_duty(90, &config), 10_000);
        assert_eq!(fan_duty(i16::MIN, &config), 10_000);
    }

    #[test]
    fn override_percent_maps_to_duty() {
        let config = DriveConfig::default();
        assert_eq!(percent_duty(0, &config), 0);
        assert_eq!(percent_duty(45, &config), 4500);
        assert_eq!(percent_duty(250, &config), 10_000);
    }

    proptest! {
        #[test]
        fn fan_duty_is_monotonic_in_pitch(a in 0i16..=i16::MAX, b in 0i16..=i16::MAX) {
            let config = DriveConfig::default();
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(fan_duty(low, &config) <= fan_duty(high, &config));
            prop_assert!(fan_duty(high, &config) <= config.fan_duty_max);
        }
    }
}
