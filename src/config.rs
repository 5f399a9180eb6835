//! Tunables
//!
//! Every threshold the control core depends on lives here as a named constant,
//! grouped into per-component configuration structs. The `Default` impls use the
//! constants, so a board only overrides what it has measured.
//!
//! Units follow the data path:
//! - magnitudes and steering error are normalized (0..100, -100..100)
//! - speeds are encoder pulses per 5ms tick
//! - duties are in 1/100 % (10 000 = full duty)
//! - angles are degrees, raw gyro counts are scaled by 1/16 where noted

/// Control tick period in milliseconds
pub const CONTROL_PERIOD_MS: u64 = 5;

// ---------------------------------------------------------------------------
// Sensor fusion
// ---------------------------------------------------------------------------

/// Magnitude sum below which the track wire is considered lost
pub const OFFLINE_THRESHOLD: u8 = 20;

/// Default raw ADC lower bound for every inductor channel (12-bit ADC)
pub const INDUCTOR_RAW_MIN: u16 = 100;

/// Default raw ADC upper bound for every inductor channel (12-bit ADC)
pub const INDUCTOR_RAW_MAX: u16 = 3800;

// ---------------------------------------------------------------------------
// PID engines
// ---------------------------------------------------------------------------

/// Wheel speed loop gains (incremental form)
pub const SPEED_KP: f32 = 8.0;
pub const SPEED_KI: f32 = 2.0;
pub const SPEED_KD: f32 = 0.5;

/// Wheel speed loop output clamp, in duty units
pub const SPEED_OUTPUT_MAX: i32 = 9000;

/// Direction loop gains (positional form)
pub const DIRECTION_KP: f32 = 1.5;
pub const DIRECTION_KI: f32 = 0.0;
pub const DIRECTION_KD: f32 = 3.0;

/// Direction loop output clamp, in wheel speed units
pub const DIRECTION_OUTPUT_MAX: i32 = 120;

// ---------------------------------------------------------------------------
// Element recognition
// ---------------------------------------------------------------------------

/// Error jump (newest minus `ZIGZAG_JUMP_WINDOW` ticks back) that marks a zigzag
pub const ZIGZAG_JUMP_THRESHOLD: i16 = 40;
/// Ticks between the two samples compared for a jump
///
/// A zigzag swings the error every two ticks, so a two-tick lookback always
/// straddles a swing while the pattern lasts.
pub const ZIGZAG_JUMP_WINDOW: usize = 2;
/// Minimum magnitude sum for a jump to count as a zigzag and not as signal loss
pub const ZIGZAG_MIN_SUM: u8 = 40;

/// Magnitude below which a side counts as "dark" at a right-angle turn
pub const TURN_LOW_THRESHOLD: u8 = 15;
/// Magnitude above which a side counts as "lit" at a right-angle turn
pub const TURN_HIGH_THRESHOLD: u8 = 70;
/// Scaled yaw rate (`gyro_z / 16`) above which the vehicle is already turning
pub const TURN_YAW_RATE_THRESHOLD: i16 = 50;
/// Steering offset applied while running through a right-angle turn
pub const TURN_STEP_OFFSET: i16 = 80;
/// Error bound under which the turn counts as completed
pub const TURN_EXIT_ERROR: i16 = 30;
/// Both magnitudes must exceed this to leave the turn
pub const TURN_EXIT_MAGNITUDE: u8 = 30;

/// Magnitude sum that must be held to recognize a roundabout entry
pub const ROUNDABOUT_ENTRY_SUM: u8 = 75;
/// Ticks the entry sum must be held before the direction is decided
pub const ROUNDABOUT_ENTRY_TICKS: u8 = 5;
/// Accumulated left-right imbalance needed to decide a direction
pub const ROUNDABOUT_SIDE_THRESHOLD: i16 = 100;
/// Steering bias held while circling
pub const ROUNDABOUT_BIAS: i16 = 32;
/// Degrees of accumulated yaw before the exit may be taken
pub const ROUNDABOUT_YAW_COMPLETE: i32 = 300;
/// Error bound that marks the straight exit section
pub const ROUNDABOUT_EXIT_ERROR: i16 = 30;
/// Magnitude sum that marks the straight exit section
pub const ROUNDABOUT_EXIT_SUM: u8 = 40;

/// Magnitude both sides must exceed at a crossing
pub const CROSSING_HIGH_THRESHOLD: u8 = 80;
/// Consecutive ticks both sides must stay high
pub const CROSSING_HOLD_TICKS: u8 = 4;
/// Encoder distance after which the crossing is considered passed
pub const CROSSING_EXIT_DISTANCE: i32 = 100;

/// Speed scale per element, in percent
pub const ZIGZAG_SPEED_SCALE: u8 = 85;
pub const TURN_SPEED_SCALE: u8 = 70;
pub const ROUNDABOUT_SPEED_SCALE: u8 = 75;
pub const CROSSING_SPEED_SCALE: u8 = 90;

/// Offline ticks the last valid error is held for steering (50ms)
pub const OFFLINE_HOLD_TICKS: u8 = 10;
/// Offline ticks before the emergency check arms (100ms)
pub const OFFLINE_EMERGENCY_TICKS: u8 = 20;
/// Pitch above which the vehicle is considered to be on the wall
pub const WALL_PITCH_THRESHOLD: i16 = 20;

// ---------------------------------------------------------------------------
// Drive
// ---------------------------------------------------------------------------

/// Base target speed used until the tuning side sets another one
pub const DEFAULT_TARGET_SPEED: i16 = 50;
/// Upper bound accepted for the base target speed
pub const TARGET_SPEED_MAX: i16 = 200;
/// Clamp for per-wheel speed targets
pub const WHEEL_TARGET_MAX: i16 = 200;
/// Base speed scale once the hold window of an offline phase has expired
pub const OFFLINE_SPEED_SCALE: u8 = 50;

/// Full-scale duty for motors and fan
pub const PWM_DUTY_MAX: u16 = 10_000;
/// Fan duty on flat ground
pub const FAN_BASE_DUTY: u16 = 3000;
/// Extra fan duty per degree of pitch
pub const FAN_DUTY_PER_DEGREE: u16 = 80;

/// Which way a roundabout turns relative to the side that lit up first
///
/// The entry imbalance depends on how the inductors are mounted, so the mapping
/// is configuration rather than logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RoundaboutPolarity {
    /// A stronger left signal at the entry means a right-hand roundabout
    LeftStrongIsRight,
    /// A stronger left signal at the entry means a left-hand roundabout
    LeftStrongIsLeft,
}

/// Gains for one PID loop
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Gains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Gains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

/// Inductor calibration defaults and the offline threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FusionConfig {
    pub raw_min: [u16; 4],
    pub raw_max: [u16; 4],
    pub offline_threshold: u8,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            raw_min: [INDUCTOR_RAW_MIN; 4],
            raw_max: [INDUCTOR_RAW_MAX; 4],
            offline_threshold: OFFLINE_THRESHOLD,
        }
    }
}

/// Gains and clamps for the three control loops
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidConfig {
    pub speed: Gains,
    pub speed_output_max: i32,
    pub direction: Gains,
    pub direction_output_max: i32,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            speed: Gains::new(SPEED_KP, SPEED_KI, SPEED_KD),
            speed_output_max: SPEED_OUTPUT_MAX,
            direction: Gains::new(DIRECTION_KP, DIRECTION_KI, DIRECTION_KD),
            direction_output_max: DIRECTION_OUTPUT_MAX,
        }
    }
}

/// Element recognizer thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognizerConfig {
    pub zigzag_jump_threshold: i16,
    pub zigzag_jump_window: usize,
    pub zigzag_min_sum: u8,
    pub zigzag_speed_scale: u8,

    pub turn_low_threshold: u8,
    pub turn_high_threshold: u8,
    pub turn_yaw_rate_threshold: i16,
    pub turn_step_offset: i16,
    pub turn_exit_error: i16,
    pub turn_exit_magnitude: u8,
    pub turn_speed_scale: u8,

    pub roundabout_entry_sum: u8,
    pub roundabout_entry_ticks: u8,
    pub roundabout_side_threshold: i16,
    pub roundabout_bias: i16,
    pub roundabout_yaw_complete: i32,
    pub roundabout_exit_error: i16,
    pub roundabout_exit_sum: u8,
    pub roundabout_speed_scale: u8,
    pub roundabout_polarity: RoundaboutPolarity,

    pub crossing_high_threshold: u8,
    pub crossing_hold_ticks: u8,
    pub crossing_exit_distance: i32,
    pub crossing_speed_scale: u8,

    pub offline_emergency_ticks: u8,
    pub wall_pitch_threshold: i16,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            zigzag_jump_threshold: ZIGZAG_JUMP_THRESHOLD,
            zigzag_jump_window: ZIGZAG_JUMP_WINDOW,
            zigzag_min_sum: ZIGZAG_MIN_SUM,
            zigzag_speed_scale: ZIGZAG_SPEED_SCALE,

            turn_low_threshold: TURN_LOW_THRESHOLD,
            turn_high_threshold: TURN_HIGH_THRESHOLD,
            turn_yaw_rate_threshold: TURN_YAW_RATE_THRESHOLD,
            turn_step_offset: TURN_STEP_OFFSET,
            turn_exit_error: TURN_EXIT_ERROR,
            turn_exit_magnitude: TURN_EXIT_MAGNITUDE,
            turn_speed_scale: TURN_SPEED_SCALE,

            roundabout_entry_sum: ROUNDABOUT_ENTRY_SUM,
            roundabout_entry_ticks: ROUNDABOUT_ENTRY_TICKS,
            roundabout_side_threshold: ROUNDABOUT_SIDE_THRESHOLD,
            roundabout_bias: ROUNDABOUT_BIAS,
            roundabout_yaw_complete: ROUNDABOUT_YAW_COMPLETE,
            roundabout_exit_error: ROUNDABOUT_EXIT_ERROR,
            roundabout_exit_sum: ROUNDABOUT_EXIT_SUM,
            roundabout_speed_scale: ROUNDABOUT_SPEED_SCALE,
            roundabout_polarity: RoundaboutPolarity::LeftStrongIsRight,

            crossing_high_threshold: CROSSING_HIGH_THRESHOLD,
            crossing_hold_ticks: CROSSING_HOLD_TICKS,
            crossing_exit_distance: CROSSING_EXIT_DISTANCE,
            crossing_speed_scale: CROSSING_SPEED_SCALE,

            offline_emergency_ticks: OFFLINE_EMERGENCY_TICKS,
            wall_pitch_threshold: WALL_PITCH_THRESHOLD,
        }
    }
}

/// Wheel target shaping, offline behavior and fan curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveConfig {
    pub wheel_target_max: i16,
    pub offline_hold_ticks: u8,
    pub offline_speed_scale: u8,
    pub fan_base_duty: u16,
    pub fan_duty_per_degree: u16,
    pub fan_duty_max: u16,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            wheel_target_max: WHEEL_TARGET_MAX,
            offline_hold_ticks: OFFLINE_HOLD_TICKS,
            offline_speed_scale: OFFLINE_SPEED_SCALE,
            fan_base_duty: FAN_BASE_DUTY,
            fan_duty_per_degree: FAN_DUTY_PER_DEGREE,
            fan_duty_max: PWM_DUTY_MAX,
        }
    }
}

/// Complete configuration of the control core
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlConfig {
    pub fusion: FusionConfig,
    pub pid: PidConfig,
    pub recognizer: RecognizerConfig,
    pub drive: DriveConfig,
}
