//! Telemetry
//!
//! Latest tick report, written by the control tick and read by the cooperative
//! loop for logging. Fields are stored as separate atomics under a sequence
//! counter that is odd while a report is being written, the same scheme the
//! control link uses for gains. The writer never waits; a reader that overlaps a
//! write gets nothing for that attempt and retries.

use core::sync::atomic::{fence, AtomicBool, AtomicI16, AtomicU16, AtomicU32, AtomicU8, Ordering};

use crate::control::drive::WheelTargets;
use crate::control::element::{ElementKind, ElementState};
use crate::control::orchestrator::{ActuatorCommand, RunState, TickReport};

/// Telemetry published by the firmware's control tick
pub static TELEMETRY: Telemetry = Telemetry::new();

/// Read attempts before [`Telemetry::snapshot`] gives up
const SNAPSHOT_ATTEMPTS: usize = 4;

pub struct Telemetry {
    sequence: AtomicU32,
    tick: AtomicU32,
    run_state: AtomicU8,
    element: AtomicU8,
    element_state: AtomicU8,
    is_online: AtomicBool,
    emergency: AtomicBool,
    left_magnitude: AtomicU8,
    right_magnitude: AtomicU8,
    steering_error: AtomicI16,
    direction_output: AtomicI16,
    left_target: AtomicI16,
    right_target: AtomicI16,
    left_pwm: AtomicI16,
    right_pwm: AtomicI16,
    fan_duty: AtomicU16,
    brake: AtomicBool,
}

impl Telemetry {
    pub const fn new() -> Self {
        Self {
            sequence: AtomicU32::new(0),
            tick: AtomicU32::new(0),
            run_state: AtomicU8::new(0),
            element: AtomicU8::new(0),
            element_state: AtomicU8::new(0),
            is_online: AtomicBool::new(false),
            emergency: AtomicBool::new(false),
            left_magnitude: AtomicU8::new(0),
            right_magnitude: AtomicU8::new(0),
            steering_error: AtomicI16::new(0),
            direction_output: AtomicI16::new(0),
            left_target: AtomicI16::new(0),
            right_target: AtomicI16::new(0),
            left_pwm: AtomicI16::new(0),
            right_pwm: AtomicI16::new(0),
            fan_duty: AtomicU16::new(0),
            brake: AtomicBool::new(false),
        }
    }

    /// Stores a report; only the control tick calls this
    pub fn publish(&self, report: &TickReport) {
        let sequence = self.sequence.load(Ordering::Relaxed).wrapping_add(1);
        self.sequence.store(sequence, Ordering::Relaxed);
        fence(Ordering::Release);

        let r = Ordering::Relaxed;
        self.tick.store(report.tick, r);
        self.run_state.store(encode_run_state(report.run_state), r);
        self.element.store(encode_element(report.element), r);
        self.element_state.store(encode_element_state(report.element_state), r);
        self.is_online.store(report.is_online, r);
        self.emergency.store(report.emergency, r);
        self.left_magnitude.store(report.left_magnitude, r);
        self.right_magnitude.store(report.right_magnitude, r);
        self.steering_error.store(report.steering_error, r);
        self.direction_output.store(report.direction_output, r);
        self.left_target.store(report.targets.left, r);
        self.right_target.store(report.targets.right, r);
        self.left_pwm.store(report.command.left_pwm, r);
        self.right_pwm.store(report.command.right_pwm, r);
        self.fan_duty.store(report.command.fan_duty, r);
        self.brake.store(report.command.brake, r);

        self.sequence.store(sequence.wrapping_add(1), Ordering::Release);
    }

    /// Latest complete report, or `None` if every attempt overlapped a write
    pub fn snapshot(&self) -> Option<TickReport> {
        (0..SNAPSHOT_ATTEMPTS).find_map(|_| self.try_snapshot())
    }

    fn try_snapshot(&self) -> Option<TickReport> {
        let before = self.sequence.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }

        let report = self.load_fields();

        fence(Ordering::Acquire);
        if self.sequence.load(Ordering::Relaxed) != before {
            return None;
        }
        Some(report)
    }

    fn load_fields(&self) -> TickReport {
        let r = Ordering::Relaxed;
        TickReport {
            tick: self.tick.load(r),
            run_state: decode_run_state(self.run_state.load(r)),
            element: decode_element(self.element.load(r)),
            element_state: decode_element_state(self.element_state.load(r)),
            is_online: self.is_online.load(r),
            emergency: self.emergency.load(r),
            left_magnitude: self.left_magnitude.load(r),
            right_magnitude: self.right_magnitude.load(r),
            steering_error: self.steering_error.load(r),
            direction_output: self.direction_output.load(r),
            targets: WheelTargets {
                left: self.left_target.load(r),
                right: self.right_target.load(r),
            },
            command: ActuatorCommand {
                left_pwm: self.left_pwm.load(r),
                right_pwm: self.right_pwm.load(r),
                fan_duty: self.fan_duty.load(r),
                brake: self.brake.load(r),
            },
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_run_state(state: RunState) -> u8 {
    match state {
        RunState::Idle => 0,
        RunState::Running => 1,
        RunState::Stopped => 2,
    }
}

fn decode_run_state(raw: u8) -> RunState {
    match raw {
        1 => RunState::Running,
        2 => RunState::Stopped,
        _ => RunState::Idle,
    }
}

fn encode_element(element: ElementKind) -> u8 {
    match element {
        ElementKind::None => 0,
        ElementKind::Zigzag => 1,
        ElementKind::Turn90 => 2,
        ElementKind::Roundabout => 3,
        ElementKind::Crossing => 4,
    }
}

fn decode_element(raw: u8) -> ElementKind {
    match raw {
        1 => ElementKind::Zigzag,
        2 => ElementKind::Turn90,
        3 => ElementKind::Roundabout,
        4 => ElementKind::Crossing,
        _ => ElementKind::None,
    }
}

fn encode_element_state(state: ElementState) -> u8 {
    match state {
        ElementState::Idle => 0,
        ElementState::Enter => 1,
        ElementState::Running => 2,
        ElementState::Exit => 3,
        ElementState::Recover => 4,
    }
}

fn decode_element_state(raw: u8) -> ElementState {
    match raw {
        1 => ElementState::Enter,
        2 => ElementState::Running,
        3 => ElementState::Exit,
        4 => ElementState::Recover,
        _ => ElementState::Idle,
    }
}
