//! Track element entry detectors
//!
//! Each detector is a predicate over the current fused reading (plus yaw rate or
//! error history where it needs them). Detectors that need evidence over several
//! ticks own their counters. Only the recognizer's `Idle` state runs them, in the
//! fixed priority order of [`Detectors::scan`].

use crate::config::{RecognizerConfig, RoundaboutPolarity};
use crate::control::fusion::FusedReading;

/// Roundabout turning direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RoundaboutDirection {
    None,
    /// Counter-clockwise
    Left,
    /// Clockwise
    Right,
}

/// Positive detector outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Detection {
    Roundabout(RoundaboutDirection),
    Crossing,
    Turn90,
    Zigzag,
}

/// Short-window error jump with enough signal behind it
fn zigzag(jump: i16, reading: &FusedReading, config: &RecognizerConfig) -> bool {
    jump.unsigned_abs() > config.zigzag_jump_threshold.unsigned_abs()
        && reading.left_magnitude as u16 + reading.right_magnitude as u16 > config.zigzag_min_sum as u16
}

/// One side dark, the other lit, and the chassis not yet rotating
fn turn90(reading: &FusedReading, gyro_z: i16, config: &RecognizerConfig) -> bool {
    let left = reading.left_magnitude;
    let right = reading.right_magnitude;
    let left_low = left < config.turn_low_threshold;
    let right_low = right < config.turn_low_threshold;
    let left_high = left > config.turn_high_threshold;
    let right_high = right > config.turn_high_threshold;

    let split = (left_low && right_high) || (right_low && left_high);
    let yaw_rate = (gyro_z / 16).unsigned_abs();

    split && yaw_rate < config.turn_yaw_rate_threshold.unsigned_abs()
}

/// Strong combined signal held over a window, side decided by the accumulated imbalance
#[derive(Debug, Clone, Default)]
pub struct RoundaboutDetector {
    entry_ticks: u8,
    side_accumulator: i32,
}

impl RoundaboutDetector {
    pub fn check(&mut self, reading: &FusedReading, config: &RecognizerConfig) -> Option<RoundaboutDirection> {
        if reading.signal_sum <= config.roundabout_entry_sum {
            self.reset();
            return None;
        }

        self.entry_ticks = self.entry_ticks.saturating_add(1);
        self.side_accumulator += reading.left_magnitude as i32 - reading.right_magnitude as i32;

        if self.entry_ticks <= config.roundabout_entry_ticks {
            return None;
        }

        let threshold = config.roundabout_side_threshold as i32;
        let left_strong = if self.side_accumulator > threshold {
            Some(true)
        } else if self.side_accumulator < -threshold {
            Some(false)
        } else {
            None
        };
        // Window elapsed: start over whether or not a side was decided
        self.reset();

        left_strong.map(|left_strong| match (config.roundabout_polarity, left_strong) {
            (RoundaboutPolarity::LeftStrongIsRight, true) => RoundaboutDirection::Right,
            (RoundaboutPolarity::LeftStrongIsRight, false) => RoundaboutDirection::Left,
            (RoundaboutPolarity::LeftStrongIsLeft, true) => RoundaboutDirection::Left,
            (RoundaboutPolarity::LeftStrongIsLeft, false) => RoundaboutDirection::Right,
        })
    }

    pub fn reset(&mut self) {
        self.entry_ticks = 0;
        self.side_accumulator = 0;
    }
}

/// Both sides saturated for several consecutive ticks
#[derive(Debug, Clone, Default)]
pub struct CrossingDetector {
    held_ticks: u8,
}

impl CrossingDetector {
    pub fn check(&mut self, reading: &FusedReading, config: &RecognizerConfig) -> bool {
        let both_high = reading.left_magnitude > config.crossing_high_threshold
            && reading.right_magnitude > config.crossing_high_threshold;

        if !both_high {
            self.held_ticks = 0;
            return false;
        }

        self.held_ticks = self.held_ticks.saturating_add(1);
        if self.held_ticks >= config.crossing_hold_ticks {
            self.held_ticks = 0;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.held_ticks = 0;
    }
}

/// All entry detectors with their persistent counters
#[derive(Debug, Clone, Default)]
pub struct Detectors {
    roundabout: RoundaboutDetector,
    crossing: CrossingDetector,
}

impl Detectors {
    /// Runs the detectors in priority order and returns the first hit
    ///
    /// Roundabout and crossing carry the most distinctive signatures and go first;
    /// the zigzag heuristic is the loosest and goes last. Detectors after a hit do
    /// not run, so their counters do not advance on that tick.
    pub fn scan(
        &mut self,
        reading: &FusedReading,
        gyro_z: i16,
        error_jump: i16,
        config: &RecognizerConfig,
    ) -> Option<Detection> {
        if let Some(direction) = self.roundabout.check(reading, config) {
            return Some(Detection::Roundabout(direction));
        }
        if self.crossing.check(reading, config) {
            return Some(Detection::Crossing);
        }
        if turn90(reading, gyro_z, config) {
            return Some(Detection::Turn90);
        }
        if zigzag(error_jump, reading, config) {
            return Some(Detection::Zigzag);
        }
        None
    }

    pub fn reset(&mut self) {
        self.roundabout.reset();
        self.crossing.reset();
    }
}
