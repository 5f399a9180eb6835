//! Track element recognition
//!
//! The recognizer runs once per control tick after fusion and overlays special
//! behavior on the base control loop while the vehicle passes a track element.
//!
//! # States
//! ```text
//! Idle --detector hit--> Enter --> Running --exit criterion--> Exit --> Recover --> Idle
//! ```
//! - `Idle`: detectors run in priority order, the first hit selects the element
//! - `Enter`: odometry (distance, yaw integral) is zeroed
//! - `Running`: odometry accumulates, the element sets its steering offset and
//!   checks its exit criterion
//! - `Exit`, `Recover`: one tick each, then the overlay is cleared
//!
//! Independent of the state machine, loss of the track signal is tracked every
//! tick. A vehicle that has been offline for a while and is pitched up is taken to
//! be falling off the wall: the emergency flag is raised and the state machine is
//! frozen until the signal comes back.

use crate::config::RecognizerConfig;
use crate::control::detector::{Detection, Detectors, RoundaboutDirection};
use crate::control::fusion::FusedReading;
use crate::control::history::RingBuffer;
use crate::control::orchestrator::MotionSnapshot;

/// Steering error history depth
pub const HISTORY_LEN: usize = 8;

/// Neutral speed scale, in percent
const FULL_SPEED: u8 = 100;

/// Track element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElementKind {
    None,
    Zigzag,
    Turn90,
    Roundabout,
    Crossing,
}

/// Recognizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ElementState {
    Idle,
    Enter,
    Running,
    Exit,
    Recover,
}

/// Element recognizer state machine
#[derive(Debug, Clone)]
pub struct Recognizer {
    config: RecognizerConfig,
    detectors: Detectors,
    history: RingBuffer<i16, HISTORY_LEN>,

    element: ElementKind,
    state: ElementState,
    roundabout_direction: RoundaboutDirection,
    steering_offset: i16,
    speed_scale: u8,

    yaw_integral: i32,
    distance: i32,

    offline_ticks: u8,
    last_valid_error: i16,
    emergency: bool,
}

impl Recognizer {
    pub fn new(config: RecognizerConfig) -> Self {
        Self {
            config,
            detectors: Detectors::default(),
            history: RingBuffer::new(),
            element: ElementKind::None,
            state: ElementState::Idle,
            roundabout_direction: RoundaboutDirection::None,
            steering_offset: 0,
            speed_scale: FULL_SPEED,
            yaw_integral: 0,
            distance: 0,
            offline_ticks: 0,
            last_valid_error: 0,
            emergency: false,
        }
    }

    /// Returns every field to its initial value, keeping the configuration
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }

    /// Advances the recognizer by one tick
    pub fn update(&mut self, reading: &FusedReading, motion: &MotionSnapshot) {
        self.history.push(reading.steering_error);

        if reading.is_online {
            self.offline_ticks = 0;
            self.last_valid_error = reading.steering_error;
            if self.emergency {
                info!("track signal back, emergency cleared");
            }
            self.emergency = false;
        } else {
            self.offline_ticks = self.offline_ticks.saturating_add(1);
            let pitched = motion.pitch_angle.unsigned_abs() > self.config.wall_pitch_threshold.unsigned_abs();
            if !self.emergency && self.offline_ticks > self.config.offline_emergency_ticks && pitched {
                warn!(
                    "emergency: offline for {} ticks at pitch {}",
                    self.offline_ticks, motion.pitch_angle
                );
                self.emergency = true;
            }
        }

        if self.emergency {
            return;
        }

        match self.state {
            ElementState::Idle => self.detect(reading, motion.gyro_z),
            ElementState::Enter => {
                self.distance = 0;
                self.yaw_integral = 0;
                self.state = ElementState::Running;
            }
            ElementState::Running => {
                self.distance = self.distance.saturating_add(motion.encoder_delta() as i32);
                self.yaw_integral = self.yaw_integral.saturating_add((motion.gyro_z / 16) as i32);
                if self.run_element(reading) {
                    info!("{:?} finished", self.element);
                    self.state = ElementState::Exit;
                }
            }
            ElementState::Exit => self.state = ElementState::Recover,
            ElementState::Recover => self.clear_element(),
        }
    }

    fn detect(&mut self, reading: &FusedReading, gyro_z: i16) {
        let jump = self
            .history
            .newest()
            .saturating_sub(self.history.back(self.config.zigzag_jump_window));

        let Some(detection) = self.detectors.scan(reading, gyro_z, jump, &self.config) else {
            return;
        };

        let (element, speed_scale) = match detection {
            Detection::Roundabout(direction) => {
                self.roundabout_direction = direction;
                (ElementKind::Roundabout, self.config.roundabout_speed_scale)
            }
            Detection::Crossing => (ElementKind::Crossing, self.config.crossing_speed_scale),
            Detection::Turn90 => (ElementKind::Turn90, self.config.turn_speed_scale),
            Detection::Zigzag => (ElementKind::Zigzag, self.config.zigzag_speed_scale),
        };

        info!("{:?} entered, speed scale {}", element, speed_scale);
        self.element = element;
        self.speed_scale = speed_scale;
        self.state = ElementState::Enter;
        self.detectors.reset();
    }

    /// Applies the running element's overlay; returns true once it may be left
    fn run_element(&mut self, reading: &FusedReading) -> bool {
        let error = reading.steering_error.unsigned_abs();
        match self.element {
            ElementKind::Zigzag => {
                let jump = self
                    .history
                    .newest()
                    .saturating_sub(self.history.back(self.config.zigzag_jump_window));
                jump.unsigned_abs() < self.config.zigzag_jump_threshold.unsigned_abs() / 2
            }
            ElementKind::Turn90 => {
                self.steering_offset = if reading.left_magnitude > reading.right_magnitude {
                    -self.config.turn_step_offset
                } else {
                    self.config.turn_step_offset
                };
                error < self.config.turn_exit_error.unsigned_abs()
                    && reading.left_magnitude > self.config.turn_exit_magnitude
                    && reading.right_magnitude > self.config.turn_exit_magnitude
            }
            ElementKind::Roundabout => {
                self.steering_offset = match self.roundabout_direction {
                    RoundaboutDirection::Left => -self.config.roundabout_bias,
                    RoundaboutDirection::Right => self.config.roundabout_bias,
                    RoundaboutDirection::None => 0,
                };
                let circled = self.yaw_integral.unsigned_abs() > self.config.roundabout_yaw_complete.unsigned_abs() * 16;
                circled
                    && error < self.config.roundabout_exit_error.unsigned_abs()
                    && reading.signal_sum > self.config.roundabout_exit_sum
            }
            ElementKind::Crossing => {
                self.steering_offset = 0;
                self.distance > self.config.crossing_exit_distance
            }
            // Running always has an element; leave at once if that ever breaks
            ElementKind::None => true,
        }
    }

    fn clear_element(&mut self) {
        self.element = ElementKind::None;
        self.state = ElementState::Idle;
        self.roundabout_direction = RoundaboutDirection::None;
        self.steering_offset = 0;
        self.speed_scale = FULL_SPEED;
        self.distance = 0;
        self.yaw_integral = 0;
    }

    pub fn element(&self) -> ElementKind {
        self.element
    }

    pub fn state(&self) -> ElementState {
        self.state
    }

    /// Offset added to the left wheel target and subtracted from the right one
    pub fn steering_offset(&self) -> i16 {
        self.steering_offset
    }

    /// Base speed scale in percent
    pub fn speed_scale(&self) -> u8 {
        self.speed_scale
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    /// Steering error of the most recent online tick
    pub fn last_valid_error(&self) -> i16 {
        self.last_valid_error
    }

    /// Consecutive offline ticks, saturating
    pub fn offline_ticks(&self) -> u8 {
        self.offline_ticks
    }

    pub fn roundabout_direction(&self) -> RoundaboutDirection {
        self.roundabout_direction
    }

    /// Accumulated encoder distance since the element was entered
    pub fn distance(&self) -> i32 {
        self.distance
    }

    /// Accumulated scaled yaw since the element was entered
    pub fn yaw_integral(&self) -> i32 {
        self.yaw_integral
    }

    pub fn history(&self) -> &RingBuffer<i16, HISTORY_LEN> {
        &self.history
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RoundaboutPolarity, OFFLINE_THRESHOLD};

    fn reading(left: u8, right: u8) -> FusedReading {
        FusedReading::from_magnitudes(left, right, OFFLINE_THRESHOLD)
    }

    fn level() -> MotionSnapshot {
        MotionSnapshot::default()
    }

    fn rotating(gyro_z: i16) -> MotionSnapshot {
        MotionSnapshot {
            gyro_z,
            ..MotionSnapshot::default()
        }
    }

    fn rolling(delta: i16) -> MotionSnapshot {
        MotionSnapshot {
            left_encoder_delta: delta,
            right_encoder_delta: delta,
            ..MotionSnapshot::default()
        }
    }

    fn with_error(error: i16) -> FusedReading {
        FusedReading {
            left_magnitude: 50,
            right_magnitude: 50,
            steering_error: error,
            signal_sum: 100,
            is_online: true,
        }
    }

    #[test]
    fn starts_idle_with_neutral_overlay() {
        let recognizer = Recognizer::new(RecognizerConfig::default());
        assert_eq!(recognizer.state(), ElementState::Idle);
        assert_eq!(recognizer.element(), ElementKind::None);
        assert_eq!(recognizer.speed_scale(), 100);
        assert_eq!(recognizer.steering_offset(), 0);
        assert!(!recognizer.is_emergency());
    }

    #[test]
    fn zigzag_holds_while_swinging_and_releases_once_damped() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        // Threshold + 10, sign flipping every two ticks
        let swing = |tick: usize, amplitude: i16| if (tick / 2) % 2 == 0 { amplitude } else { -amplitude };

        recognizer.update(&with_error(swing(0, 50)), &level());
        assert_eq!(recognizer.state(), ElementState::Enter);
        recognizer.update(&with_error(swing(1, 50)), &level());
        assert_eq!(recognizer.state(), ElementState::Running);

        for tick in 2..40 {
            recognizer.update(&with_error(swing(tick, 50)), &level());
            assert_eq!(recognizer.state(), ElementState::Running, "tick {tick}");
            assert_eq!(recognizer.element(), ElementKind::Zigzag);
            assert_eq!(recognizer.speed_scale(), 85);
        }

        // Damped below half the threshold
        let mut seen = std::vec::Vec::new();
        for tick in 40..52 {
            recognizer.update(&with_error(swing(tick, 8)), &level());
            seen.push(recognizer.state());
        }
        let exit = seen.iter().position(|s| *s == ElementState::Exit).unwrap();
        assert!(seen[..exit].iter().all(|s| *s == ElementState::Running));
        assert_eq!(seen[exit + 1], ElementState::Recover);
        assert!(seen[exit + 2..].iter().all(|s| *s == ElementState::Idle));
        assert_eq!(recognizer.element(), ElementKind::None);
        assert_eq!(recognizer.speed_scale(), 100);
    }

    #[test]
    fn zigzag_sets_its_speed_scale() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        recognizer.update(&with_error(50), &level());
        assert_eq!(recognizer.element(), ElementKind::Zigzag);
        assert_eq!(recognizer.speed_scale(), 85);
    }

    #[test]
    fn offline_on_the_wall_raises_emergency() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        let pitched = MotionSnapshot {
            pitch_angle: 30,
            ..MotionSnapshot::default()
        };
        for tick in 1..=30u8 {
            recognizer.update(&reading(0, 0), &pitched);
            assert_eq!(recognizer.is_emergency(), tick > 20, "tick {tick}");
        }
        assert_eq!(recognizer.offline_ticks(), 30);

        recognizer.update(&reading(50, 50), &pitched);
        assert!(!recognizer.is_emergency());
        assert_eq!(recognizer.offline_ticks(), 0);
    }

    #[test]
    fn offline_on_flat_ground_is_not_an_emergency() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        for _ in 0..100 {
            recognizer.update(&reading(0, 0), &level());
        }
        assert!(!recognizer.is_emergency());
        assert_eq!(recognizer.offline_ticks(), 100);
    }

    #[test]
    fn last_valid_error_survives_signal_loss() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        recognizer.update(&reading(30, 60), &level());
        let held = recognizer.last_valid_error();
        assert!(held > 0);
        recognizer.update(&reading(0, 0), &level());
        recognizer.update(&reading(0, 0), &level());
        assert_eq!(recognizer.last_valid_error(), held);
    }

    #[test]
    fn emergency_freezes_the_state_machine() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        recognizer.update(&reading(10, 90), &level());
        assert_eq!(recognizer.state(), ElementState::Enter);

        let pitched = MotionSnapshot {
            pitch_angle: -40,
            ..MotionSnapshot::default()
        };
        for _ in 0..25 {
            recognizer.update(&reading(0, 0), &pitched);
        }
        assert!(recognizer.is_emergency());
        // Enter -> Running happened on the first offline tick, before the emergency
        assert_eq!(recognizer.state(), ElementState::Running);
        assert_eq!(recognizer.element(), ElementKind::Turn90);
    }

    #[test]
    fn turn_steers_toward_the_strong_side_and_exits_centered() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        for _ in 0..3 {
            recognizer.update(&reading(10, 90), &level());
        }
        assert_eq!(recognizer.element(), ElementKind::Turn90);
        assert_eq!(recognizer.state(), ElementState::Running);
        assert_eq!(recognizer.speed_scale(), 70);
        assert_eq!(recognizer.steering_offset(), 80);

        recognizer.update(&reading(60, 60), &level());
        assert_eq!(recognizer.state(), ElementState::Exit);
        recognizer.update(&reading(60, 60), &level());
        assert_eq!(recognizer.state(), ElementState::Recover);
        recognizer.update(&reading(60, 60), &level());
        assert_eq!(recognizer.state(), ElementState::Idle);
        assert_eq!(recognizer.steering_offset(), 0);
        assert_eq!(recognizer.speed_scale(), 100);
    }

    #[test]
    fn left_turn_gets_negative_offset() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        for _ in 0..3 {
            recognizer.update(&reading(90, 10), &level());
        }
        assert_eq!(recognizer.steering_offset(), -80);
    }

    #[test]
    fn crossing_exits_after_distance() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        for _ in 0..4 {
            recognizer.update(&reading(90, 90), &rolling(30));
        }
        assert_eq!(recognizer.element(), ElementKind::Crossing);
        assert_eq!(recognizer.speed_scale(), 90);

        // Enter -> Running
        recognizer.update(&reading(90, 90), &rolling(30));
        for _ in 0..3 {
            recognizer.update(&reading(50, 50), &rolling(30));
            assert_eq!(recognizer.state(), ElementState::Running);
        }
        assert_eq!(recognizer.distance(), 90);
        recognizer.update(&reading(50, 50), &rolling(30));
        assert_eq!(recognizer.state(), ElementState::Exit);
    }

    #[test]
    fn roundabout_needs_full_circle_and_straight_exit() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        for _ in 0..6 {
            recognizer.update(&reading(100, 70), &level());
        }
        assert_eq!(recognizer.element(), ElementKind::Roundabout);
        assert_eq!(recognizer.roundabout_direction(), RoundaboutDirection::Right);
        assert_eq!(recognizer.speed_scale(), 75);

        // Straight signal alone is not enough while the yaw integral is short
        for _ in 0..45 {
            recognizer.update(&reading(50, 50), &rotating(1600));
        }
        assert_eq!(recognizer.state(), ElementState::Running);
        assert_eq!(recognizer.steering_offset(), 32);

        for _ in 0..10 {
            recognizer.update(&reading(50, 50), &rotating(1600));
        }
        assert_eq!(recognizer.state(), ElementState::Idle);
        assert_eq!(recognizer.roundabout_direction(), RoundaboutDirection::None);
    }

    #[test]
    fn roundabout_does_not_exit_off_center_after_circling() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        for _ in 0..6 {
            recognizer.update(&reading(100, 70), &level());
        }
        for _ in 0..80 {
            recognizer.update(&reading(20, 90), &rotating(1600));
        }
        assert_eq!(recognizer.state(), ElementState::Running);
        assert!(recognizer.yaw_integral() > 300 * 16);
    }

    #[test]
    fn roundabout_polarity_flips_direction() {
        let config = RecognizerConfig {
            roundabout_polarity: RoundaboutPolarity::LeftStrongIsLeft,
            ..RecognizerConfig::default()
        };
        let mut recognizer = Recognizer::new(config);
        for _ in 0..8 {
            recognizer.update(&reading(100, 70), &level());
        }
        assert_eq!(recognizer.roundabout_direction(), RoundaboutDirection::Left);
        assert_eq!(recognizer.state(), ElementState::Running);
        assert_eq!(recognizer.steering_offset(), -32);
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        for _ in 0..3 {
            recognizer.update(&reading(10, 90), &level());
        }
        recognizer.update(&reading(0, 0), &level());
        recognizer.reset();
        assert_eq!(recognizer.state(), ElementState::Idle);
        assert_eq!(recognizer.element(), ElementKind::None);
        assert_eq!(recognizer.offline_ticks(), 0);
        assert_eq!(recognizer.last_valid_error(), 0);
        assert!(recognizer.history().iter_oldest_first().all(|e| e == 0));
    }

    #[test]
    fn idle_always_means_no_element() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        let inputs = [(10, 90), (90, 90), (100, 70), (50, 50), (0, 0), (90, 10), (40, 60)];
        for step in 0..400usize {
            let (left, right) = inputs[(step * 7 + step / 3) % inputs.len()];
            recognizer.update(&reading(left, right), &rotating(((step % 5) as i16 - 2) * 900));
            assert_eq!(
                recognizer.state() == ElementState::Idle,
                recognizer.element() == ElementKind::None
            );
        }
    }

    #[test]
    fn odometry_saturates_on_an_endless_element() {
        let mut recognizer = Recognizer::new(RecognizerConfig::default());
        for _ in 0..6 {
            recognizer.update(&reading(100, 70), &level());
        }
        recognizer.update(&reading(20, 90), &level());
        assert_eq!(recognizer.state(), ElementState::Running);

        recognizer.distance = i32::MAX - 10;
        recognizer.yaw_integral = i32::MAX - 10;
        let spinning = MotionSnapshot {
            left_encoder_delta: 200,
            right_encoder_delta: 200,
            gyro_z: 1600,
            ..MotionSnapshot::default()
        };
        for _ in 0..3 {
            recognizer.update(&reading(20, 90), &spinning);
        }
        assert_eq!(recognizer.distance(), i32::MAX);
        assert_eq!(recognizer.yaw_integral(), i32::MAX);
        assert_eq!(recognizer.state(), ElementState::Running);
    }
}
