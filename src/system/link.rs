//! Control Link
//!
//! The seam between the control tick and the cooperative side of the firmware.
//!
//! The cooperative loop is the only writer of tuning parameters and run
//! requests; the tick is the only reader that consumes them. Everything is a
//! single-word atomic so the tick never waits on the writer:
//! - run requests are latched and taken with a swap
//! - target speed and fan override are plain stores
//! - direction gains are three words, published under a sequence counter that is
//!   odd while a write is in flight. A tick that observes an odd or changed
//!   sequence skips the gains and picks them up on the next tick.

use core::sync::atomic::{fence, AtomicI16, AtomicU32, AtomicU8, Ordering};

use crate::config::{Gains, DEFAULT_TARGET_SPEED, TARGET_SPEED_MAX};

/// Pending change of the run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunRequest {
    Start,
    Stop,
}

/// Tuning and command interface consumed by the orchestrator
pub trait ControlLink {
    /// Publishes new direction loop gains
    fn set_params(&self, kp: f32, ki: f32, kd: f32);
    /// Sets the base target speed, clamped to `0..=TARGET_SPEED_MAX`
    fn set_target_speed(&self, speed: i16);
    fn request_start(&self);
    fn request_stop(&self);

    /// Requests a start, restoring the default target speed if it was set to zero
    fn start(&self) {
        if self.target_speed() == 0 {
            self.set_target_speed(DEFAULT_TARGET_SPEED);
        }
        self.request_start();
    }

    /// Forces the fan to a fixed percentage, or hands it back to the pitch curve
    fn set_fan_override(&self, percent: Option<u8>);

    /// Takes the latest run request, if any
    fn take_run_request(&self) -> Option<RunRequest>;
    /// Takes direction gains published since the last call, if a complete set is available
    fn take_direction_gains(&self) -> Option<Gains>;
    fn target_speed(&self) -> i16;
    fn fan_override(&self) -> Option<u8>;
}

/// Link between the firmware's cooperative loop and its control tick
pub static LINK: AtomicLink = AtomicLink::new();

const NO_REQUEST: u8 = 0;
const START: u8 = 1;
const STOP: u8 = 2;

const NO_OVERRIDE: i16 = -1;

/// Lock-free [`ControlLink`] usable from a `static`
pub struct AtomicLink {
    run_request: AtomicU8,
    target_speed: AtomicI16,
    fan_override: AtomicI16,
    gains_sequence: AtomicU32,
    applied_sequence: AtomicU32,
    kp: AtomicU32,
    ki: AtomicU32,
    kd: AtomicU32,
}

impl AtomicLink {
    pub const fn new() -> Self {
        Self {
            run_request: AtomicU8::new(NO_REQUEST),
            target_speed: AtomicI16::new(DEFAULT_TARGET_SPEED),
            fan_override: AtomicI16::new(NO_OVERRIDE),
            gains_sequence: AtomicU32::new(0),
            applied_sequence: AtomicU32::new(0),
            kp: AtomicU32::new(0),
            ki: AtomicU32::new(0),
            kd: AtomicU32::new(0),
        }
    }
}

impl Default for AtomicLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlLink for AtomicLink {
    fn set_params(&self, kp: f32, ki: f32, kd: f32) {
        let sequence = self.gains_sequence.load(Ordering::Relaxed).wrapping_add(1);
        self.gains_sequence.store(sequence, Ordering::Relaxed);
        fence(Ordering::Release);

        self.kp.store(kp.to_bits(), Ordering::Relaxed);
        self.ki.store(ki.to_bits(), Ordering::Relaxed);
        self.kd.store(kd.to_bits(), Ordering::Relaxed);

        self.gains_sequence.store(sequence.wrapping_add(1), Ordering::Release);
    }

    fn set_target_speed(&self, speed: i16) {
        self.target_speed
            .store(speed.clamp(0, TARGET_SPEED_MAX), Ordering::Relaxed);
    }

    fn request_start(&self) {
        self.run_request.store(START, Ordering::Release);
    }

    fn request_stop(&self) {
        self.run_request.store(STOP, Ordering::Release);
    }

    fn set_fan_override(&self, percent: Option<u8>) {
        let raw = percent.map_or(NO_OVERRIDE, |p| p.min(100) as i16);
        self.fan_override.store(raw, Ordering::Relaxed);
    }

    fn take_run_request(&self) -> Option<RunRequest> {
        match self.run_request.swap(NO_REQUEST, Ordering::Acquire) {
            START => Some(RunRequest::Start),
            STOP => Some(RunRequest::Stop),
            _ => None,
        }
    }

    fn take_direction_gains(&self) -> Option<Gains> {
        let before = self.gains_sequence.load(Ordering::Acquire);
        if before & 1 == 1 || before == self.applied_sequence.load(Ordering::Relaxed) {
            return None;
        }

        let gains = Gains::new(
            f32::from_bits(self.kp.load(Ordering::Relaxed)),
            f32::from_bits(self.ki.load(Ordering::Relaxed)),
            f32::from_bits(self.kd.load(Ordering::Relaxed)),
        );

        fence(Ordering::Acquire);
        if self.gains_sequence.load(Ordering::Relaxed) != before {
            return None;
        }

        self.applied_sequence.store(before, Ordering::Relaxed);
        Some(gains)
    }

    fn target_speed(&self) -> i16 {
        self.target_speed.load(Ordering::Relaxed)
    }

    fn fan_override(&self) -> Option<u8> {
        match self.fan_override.load(Ordering::Relaxed) {
            NO_OVERRIDE => None,
            percent => Some(percent as u8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let link = AtomicLink::new();
        assert_eq!(link.target_speed(), DEFAULT_TARGET_SPEED);
        assert_eq!(link.fan_override(), None);
        assert_eq!(link.take_run_request(), None);
        assert_eq!(link.take_direction_gains(), None);
    }

    #[test]
    fn run_request_is_taken_once() {
        let link = AtomicLink::new();
        link.request_start();
        assert_eq!(link.take_run_request(), Some(RunRequest::Start));
        assert_eq!(link.take_run_request(), None);

        // Latest request wins
        link.request_start();
        link.request_stop();
        assert_eq!(link.take_run_request(), Some(RunRequest::Stop));
    }

    #[test]
    fn start_restores_default_speed() {
        let link = AtomicLink::new();
        link.set_target_speed(0);
        link.start();
        assert_eq!(link.target_speed(), DEFAULT_TARGET_SPEED);
        assert_eq!(link.take_run_request(), Some(RunRequest::Start));

        link.set_target_speed(80);
        link.start();
        assert_eq!(link.target_speed(), 80);
    }

    #[test]
    fn target_speed_is_clamped() {
        let link = AtomicLink::new();
        link.set_target_speed(500);
        assert_eq!(link.target_speed(), 200);
        link.set_target_speed(-3);
        assert_eq!(link.target_speed(), 0);
        link.set_target_speed(120);
        assert_eq!(link.target_speed(), 120);
    }

    #[test]
    fn fan_override_round_trips() {
        let link = AtomicLink::new();
        link.set_fan_override(Some(40));
        assert_eq!(link.fan_override(), Some(40));
        link.set_fan_override(Some(180));
        assert_eq!(link.fan_override(), Some(100));
        link.set_fan_override(None);
        assert_eq!(link.fan_override(), None);
    }

    #[test]
    fn gains_are_applied_once_and_newest_wins() {
        let link = AtomicLink::new();
        link.set_params(1.0, 0.0, 2.0);
        link.set_params(2.5, 0.1, 4.0);
        assert_eq!(link.take_direction_gains(), Some(Gains::new(2.5, 0.1, 4.0)));
        assert_eq!(link.take_direction_gains(), None);
    }

    #[test]
    fn write_in_flight_is_skipped() {
        let link = AtomicLink::new();
        link.set_params(1.0, 0.0, 2.0);

        // Writer preempted between the opening and closing sequence stores
        let sequence = link.gains_sequence.load(Ordering::Relaxed);
        link.gains_sequence.store(sequence + 1, Ordering::Relaxed);
        link.kp.store(9.0f32.to_bits(), Ordering::Relaxed);
        assert_eq!(link.take_direction_gains(), None);

        link.ki.store(0.5f32.to_bits(), Ordering::Relaxed);
        link.kd.store(7.0f32.to_bits(), Ordering::Relaxed);
        link.gains_sequence.store(sequence + 2, Ordering::Release);
        assert_eq!(link.take_direction_gains(), Some(Gains::new(9.0, 0.5, 7.0)));
    }
}
