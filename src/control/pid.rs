//! PID engines
//!
//! Two control laws over integer errors with floating point gains:
//! - [`IncrementalPid`] accumulates an output delta each call. Retuning only
//!   changes future deltas, so a wheel speed loop keeps running smoothly when
//!   its gains are swapped.
//! - [`PositionalPid`] computes an absolute command from P, clamped I and D
//!   terms. The direction loop needs an absolute steering command.
//!
//! Both clamp their output to `±output_max` after every computation.

use crate::config::Gains;

/// Converts a gain-weighted term back to integer units, saturating at the i32 range
fn term(gain: f32, value: i32) -> i32 {
    (gain * value as f32) as i32
}

/// Incremental (velocity form) PID
///
/// `Δu = Kp·(e(k) − e(k−1)) + Ki·e(k) + Kd·(e(k) − 2e(k−1) + e(k−2))`
#[derive(Debug, Clone)]
pub struct IncrementalPid {
    gains: Gains,
    error_now: i32,
    error_last: i32,
    error_prev: i32,
    output: i32,
    output_max: i32,
}

impl IncrementalPid {
    pub fn new(gains: Gains, output_max: i32) -> Self {
        Self {
            gains,
            error_now: 0,
            error_last: 0,
            error_prev: 0,
            output: 0,
            output_max: output_max.abs(),
        }
    }

    /// Advances the loop one step and returns the accumulated output
    pub fn compute(&mut self, target: i16, feedback: i16) -> i32 {
        self.error_prev = self.error_last;
        self.error_last = self.error_now;
        self.error_now = target as i32 - feedback as i32;

        let p = term(self.gains.kp, self.error_now - self.error_last);
        let i = term(self.gains.ki, self.error_now);
        let d = term(self.gains.kd, self.error_now - 2 * self.error_last + self.error_prev);

        let delta = p.saturating_add(i).saturating_add(d);
        self.output = self.output.saturating_add(delta).clamp(-self.output_max, self.output_max);
        self.output
    }

    /// Clears error history and the accumulated output; gains and clamp stay
    pub fn reset(&mut self) {
        self.error_now = 0;
        self.error_last = 0;
        self.error_prev = 0;
        self.output = 0;
    }

    /// Swaps gains in place, keeping the in-flight error history
    pub fn set_params(&mut self, kp: f32, ki: f32, kd: f32) {
        self.gains = Gains::new(kp, ki, kd);
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn output(&self) -> i32 {
        self.output
    }

    pub fn output_max(&self) -> i32 {
        self.output_max
    }
}

/// Positional PID with integral anti-windup
///
/// `u = Kp·e(k) + Ki·Σe + Kd·(e(k) − e(k−1))`, where `Σe` is clamped to
/// `±integral_max` (half the output clamp by default, leaving headroom for P and D).
#[derive(Debug, Clone)]
pub struct PositionalPid {
    gains: Gains,
    error_now: i32,
    error_last: i32,
    integral: i32,
    integral_max: i32,
    output: i32,
    output_max: i32,
}

impl PositionalPid {
    pub fn new(gains: Gains, output_max: i32) -> Self {
        let output_max = output_max.abs();
        Self::with_integral_limit(gains, output_max, output_max / 2)
    }

    pub fn with_integral_limit(gains: Gains, output_max: i32, integral_max: i32) -> Self {
        Self {
            gains,
            error_now: 0,
            error_last: 0,
            integral: 0,
            integral_max: integral_max.abs(),
            output: 0,
            output_max: output_max.abs(),
        }
    }

    /// Computes the absolute command for this step
    pub fn compute(&mut self, target: i16, feedback: i16) -> i32 {
        self.error_last = self.error_now;
        self.error_now = target as i32 - feedback as i32;

        self.integral = self
            .integral
            .saturating_add(self.error_now)
            .clamp(-self.integral_max, self.integral_max);

        let p = term(self.gains.kp, self.error_now);
        let i = term(self.gains.ki, self.integral);
        let d = term(self.gains.kd, self.error_now - self.error_last);

        self.output = p
            .saturating_add(i)
            .saturating_add(d)
            .clamp(-self.output_max, self.output_max);
        self.output
    }

    /// Clears error history, integral and output; gains and clamps stay
    pub fn reset(&mut self) {
        self.error_now = 0;
        self.error_last = 0;
        self.integral = 0;
        self.output = 0;
    }

    /// Swaps gains in place, keeping the integral and error history
    pub fn set_params(&mut self, kp: f32, ki: f32, kd: f32) {
        self.gains = Gains::new(kp, ki, kd);
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn integral(&self) -> i32 {
        self.integral
    }

    pub fn integral_max(&self) -> i32 {
        self.integral_max
    }

    pub fn output(&self) -> i32 {
        self.output
    }

    pub fn output_max(&self) -> i32 {
        self.output_max
    }
}
