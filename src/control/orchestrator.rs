//! Control Orchestrator
//!
//! The fixed-period routine run by the control tick. Each call to
//! [`Orchestrator::tick`] goes through, in order:
//! - pending run requests and gain updates from the [`ControlLink`]
//! - element recognition
//! - emergency override (brake, fan at full duty)
//! - direction loop on the steering error, or the held/neutral error while offline
//! - wheel target split with the recognizer overlay
//! - wheel speed loops against the encoder deltas
//! - fan duty from pitch, unless overridden
//!
//! The orchestrator owns every piece of cross-tick control state. It never blocks
//! and never allocates.

use crate::config::{ControlConfig, DriveConfig};
use crate::control::drive::{self, WheelTargets};
use crate::control::element::{ElementKind, ElementState, Recognizer};
use crate::control::fusion::FusedReading;
use crate::control::pid::{IncrementalPid, PositionalPid};
use crate::system::link::{ControlLink, RunRequest};

/// Odometry and attitude sampled at the start of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionSnapshot {
    /// Signed encoder pulses since the previous tick
    pub left_encoder_delta: i16,
    pub right_encoder_delta: i16,
    /// Raw yaw rate
    pub gyro_z: i16,
    /// Degrees, positive nose up
    pub pitch_angle: i16,
}

impl MotionSnapshot {
    /// Mean distance travelled by both wheels this tick
    pub fn encoder_delta(&self) -> i16 {
        ((self.left_encoder_delta as i32 + self.right_encoder_delta as i32) / 2) as i16
    }
}

/// Output of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorCommand {
    /// Signed duty, `PWM_DUTY_MAX` is full forward
    pub left_pwm: i16,
    pub right_pwm: i16,
    pub fan_duty: u16,
    /// Short-brake both motors, duties are ignored
    pub brake: bool,
}

impl ActuatorCommand {
    /// Both motors unpowered and free running
    pub const fn coast(fan_duty: u16) -> Self {
        Self {
            left_pwm: 0,
            right_pwm: 0,
            fan_duty,
            brake: false,
        }
    }
}

/// Whether the control loops drive the motors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    /// Powered up, never started
    Idle,
    Running,
    Stopped,
}

/// Everything worth reporting about the last tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    pub tick: u32,
    pub run_state: RunState,
    pub element: ElementKind,
    pub element_state: ElementState,
    pub is_online: bool,
    pub emergency: bool,
    pub left_magnitude: u8,
    pub right_magnitude: u8,
    /// Error fed to the direction loop (held or neutral while offline)
    pub steering_error: i16,
    pub direction_output: i16,
    pub targets: WheelTargets,
    pub command: ActuatorCommand,
}

impl Default for TickReport {
    fn default() -> Self {
        Self {
            tick: 0,
            run_state: RunState::Idle,
            element: ElementKind::None,
            element_state: ElementState::Idle,
            is_online: false,
            emergency: false,
            left_magnitude: 0,
            right_magnitude: 0,
            steering_error: 0,
            direction_output: 0,
            targets: WheelTargets::default(),
            command: ActuatorCommand::default(),
        }
    }
}

/// Narrows a loop output to `i16`, saturating instead of wrapping
fn saturate(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Runs the whole control pipeline once per tick
pub struct Orchestrator<'a, L: ControlLink> {
    link: &'a L,
    drive: DriveConfig,
    recognizer: Recognizer,
    direction_pid: PositionalPid,
    left_speed_pid: IncrementalPid,
    right_speed_pid: IncrementalPid,
    run_state: RunState,
    report: TickReport,
}

impl<'a, L: ControlLink> Orchestrator<'a, L> {
    pub fn new(config: &ControlConfig, link: &'a L) -> Self {
        let pid = &config.pid;
        Self {
            link,
            drive: config.drive,
            recognizer: Recognizer::new(config.recognizer),
            direction_pid: PositionalPid::new(pid.direction, pid.direction_output_max),
            left_speed_pid: IncrementalPid::new(pid.speed, pid.speed_output_max),
            right_speed_pid: IncrementalPid::new(pid.speed, pid.speed_output_max),
            run_state: RunState::Idle,
            report: TickReport::default(),
        }
    }

    /// Advances the control loops by one period
    pub fn tick(&mut self, motion: &MotionSnapshot, reading: &FusedReading) -> ActuatorCommand {
        self.poll_link();

        self.report = TickReport {
            tick: self.report.tick.wrapping_add(1),
            run_state: self.run_state,
            is_online: reading.is_online,
            left_magnitude: reading.left_magnitude,
            right_magnitude: reading.right_magnitude,
            ..TickReport::default()
        };

        let command = if self.run_state == RunState::Running {
            self.drive(motion, reading)
        } else {
            ActuatorCommand::coast(self.fan_override_duty().unwrap_or(0))
        };

        self.report.element = self.recognizer.element();
        self.report.element_state = self.recognizer.state();
        self.report.emergency = self.recognizer.is_emergency();
        self.report.command = command;
        command
    }

    fn poll_link(&mut self) {
        match self.link.take_run_request() {
            Some(RunRequest::Start) if self.run_state != RunState::Running => {
                self.reset_loops();
                self.run_state = RunState::Running;
                info!("control loops started");
            }
            Some(RunRequest::Stop) if self.run_state == RunState::Running => {
                self.reset_loops();
                self.run_state = RunState::Stopped;
                info!("control loops stopped");
            }
            _ => {}
        }

        if let Some(gains) = self.link.take_direction_gains() {
            self.direction_pid.set_params(gains.kp, gains.ki, gains.kd);
            debug!("direction gains applied");
        }
    }

    /// Drops all loop and maneuver state; gains stay
    fn reset_loops(&mut self) {
        self.direction_pid.reset();
        self.left_speed_pid.reset();
        self.right_speed_pid.reset();
        self.recognizer.reset();
    }

    fn fan_override_duty(&self) -> Option<u16> {
        self.link
            .fan_override()
            .map(|percent| drive::percent_duty(percent, &self.drive))
    }

    fn drive(&mut self, motion: &MotionSnapshot, reading: &FusedReading) -> ActuatorCommand {
        self.recognizer.update(reading, motion);

        if self.recognizer.is_emergency() {
            return ActuatorCommand {
                left_pwm: 0,
                right_pwm: 0,
                fan_duty: self.drive.fan_duty_max,
                brake: true,
            };
        }

        let (steering_error, offline_scale) = if reading.is_online {
            (reading.steering_error, 100)
        } else if self.recognizer.offline_ticks() <= self.drive.offline_hold_ticks {
            (self.recognizer.last_valid_error(), 100)
        } else {
            (0, self.drive.offline_speed_scale)
        };

        let direction = self.direction_pid.compute(0, steering_error);

        let base = drive::scale_speed(self.link.target_speed(), self.recognizer.speed_scale());
        let base = drive::scale_speed(base, offline_scale);
        let targets = drive::split_targets(
            base,
            direction,
            self.recognizer.steering_offset(),
            self.drive.wheel_target_max,
        );

        let left_pwm = self.left_speed_pid.compute(targets.left, motion.left_encoder_delta);
        let right_pwm = self.right_speed_pid.compute(targets.right, motion.right_encoder_delta);

        let fan_duty = self
            .fan_override_duty()
            .unwrap_or_else(|| drive::fan_duty(motion.pitch_angle, &self.drive));

        self.report.steering_error = steering_error;
        self.report.direction_output = saturate(direction);
        self.report.targets = targets;

        ActuatorCommand {
            left_pwm: saturate(left_pwm),
            right_pwm: saturate(right_pwm),
            fan_duty,
            brake: false,
        }
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn recognizer(&self) -> &Recognizer {
        &self.recognizer
    }

    pub fn direction_pid(&self) -> &PositionalPid {
        &self.direction_pid
    }

    pub fn left_speed_pid(&self) -> &IncrementalPid {
        &self.left_speed_pid
    }

    pub fn right_speed_pid(&self) -> &IncrementalPid {
        &self.right_speed_pid
    }

    /// Summary of the last tick
    pub fn report(&self) -> TickReport {
        self.report
    }
}
