//! Motor and fan outputs
//!
//! Both drive motors hang off a TB6612FNG; the fan ESC takes a plain PWM input.
//! All outputs run at 10kHz. Commands arrive as duties in 1/100 % from the
//! control core.

use defmt::warn;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::pwm::{self, Pwm};
use tb6612fng::{DriveCommand, Motor, Tb6612fng};
use wall_racer::config::PWM_DUTY_MAX;
use wall_racer::control::ActuatorCommand;

use crate::task::resources::{FanResources, MotorDriverResources};

/// PWM frequency for motors and fan
const PWM_FREQUENCY_HZ: u32 = 10_000;

type MotorDriver = Tb6612fng<
    Output<'static>,
    Output<'static>,
    Pwm<'static>,
    Output<'static>,
    Output<'static>,
    Pwm<'static>,
    Output<'static>,
>;

/// PWM configuration for [`PWM_FREQUENCY_HZ`] at the current system clock
fn pwm_config() -> pwm::Config {
    let clock_freq_hz = embassy_rp::clocks::clk_sys_freq();

    // Smallest divider that keeps the period within the 16-bit counter
    let divider = ((clock_freq_hz / PWM_FREQUENCY_HZ) / 65535 + 1) as u8;
    let period = (clock_freq_hz / (PWM_FREQUENCY_HZ * divider as u32)) as u16 - 1;

    let mut config = pwm::Config::default();
    config.divider = divider.into();
    config.top = period;
    config
}

/// Maps a signed duty onto a driver command, percent resolution
fn motor_command(duty: i16) -> DriveCommand {
    let percent = (duty.unsigned_abs() as u32 * 100 / PWM_DUTY_MAX as u32).min(100) as u8;
    match duty {
        0 => DriveCommand::Stop,
        d if d > 0 => DriveCommand::Forward(percent),
        _ => DriveCommand::Backward(percent),
    }
}

/// Owns every actuator the control tick drives
pub struct Actuators {
    driver: MotorDriver,
    fan: Pwm<'static>,
    fan_config: pwm::Config,
}

impl Actuators {
    pub fn new(motors: MotorDriverResources, fan: FanResources) -> Self {
        let config = pwm_config();

        let standby = Output::new(motors.standby_pin, Level::Low);

        // motor A, here defined to be the left motor
        let left_forward = Output::new(motors.left_forward_pin, Level::Low);
        let left_backward = Output::new(motors.left_backward_pin, Level::Low);
        let left_pwm = Pwm::new_output_a(motors.left_slice, motors.left_pwm_pin, config.clone());
        let left_motor = Motor::new(left_forward, left_backward, left_pwm).unwrap();

        // motor B, here defined to be the right motor
        let right_forward = Output::new(motors.right_forward_pin, Level::Low);
        let right_backward = Output::new(motors.right_backward_pin, Level::Low);
        let right_pwm = Pwm::new_output_b(motors.right_slice, motors.right_pwm_pin, config.clone());
        let right_motor = Motor::new(right_forward, right_backward, right_pwm).unwrap();

        let mut driver = Tb6612fng::new(left_motor, right_motor, standby).unwrap();
        driver.disable_standby().unwrap();

        let mut fan_config = config;
        fan_config.compare_a = 0;
        let fan = Pwm::new_output_a(fan.slice, fan.pin, fan_config.clone());

        Self {
            driver,
            fan,
            fan_config,
        }
    }

    /// Drives the outputs; a failed pin write is logged and retried on the next tick
    pub fn apply(&mut self, command: &ActuatorCommand) {
        let (left, right) = if command.brake {
            (DriveCommand::Brake, DriveCommand::Brake)
        } else {
            (motor_command(command.left_pwm), motor_command(command.right_pwm))
        };
        let left_result = self.driver.motor_a.drive(left);
        let right_result = self.driver.motor_b.drive(right);
        if left_result.is_err() || right_result.is_err() {
            warn!("motor driver write failed");
        }

        let top = self.fan_config.top as u32;
        self.fan_config.compare_a = (command.fan_duty.min(PWM_DUTY_MAX) as u32 * top / PWM_DUTY_MAX as u32) as u16;
        self.fan.set_config(&self.fan_config);
    }
}
