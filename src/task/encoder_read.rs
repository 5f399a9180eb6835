//! Wheel encoders
//!
//! Each wheel's pulse line feeds channel B of a PWM slice configured as an edge
//! counter; the encoder's direction line is read as a plain input. The control
//! tick reads and clears both counters once per period.

use embassy_rp::gpio::{Input, Level, Pull};
use embassy_rp::pwm::{Config, InputMode, Pwm};

use crate::task::resources::EncoderResources;

/// One wheel's pulse counter and direction input
struct Encoder {
    counter: Pwm<'static>,
    direction: Input<'static>,
    /// Level of the direction line while the wheel turns forward
    forward_level: Level,
}

impl Encoder {
    fn take_delta(&mut self) -> i16 {
        let pulses = self.counter.counter();
        self.counter.set_counter(0);
        let pulses = pulses.min(i16::MAX as u16) as i16;
        if self.direction.get_level() == self.forward_level {
            pulses
        } else {
            -pulses
        }
    }
}

/// Both wheel encoders
pub struct Encoders {
    left: Encoder,
    right: Encoder,
}

impl Encoders {
    pub fn new(r: EncoderResources) -> Self {
        let config = Config::default();
        let left = Encoder {
            counter: Pwm::new_input(
                r.left_slice,
                r.left_pulse_pin,
                Pull::None,
                InputMode::RisingEdge,
                config.clone(),
            ),
            direction: Input::new(r.left_direction_pin, Pull::Up),
            forward_level: Level::High,
        };
        // Mirrored mounting: the right encoder reports forward as low
        let right = Encoder {
            counter: Pwm::new_input(
                r.right_slice,
                r.right_pulse_pin,
                Pull::None,
                InputMode::RisingEdge,
                config,
            ),
            direction: Input::new(r.right_direction_pin, Pull::Up),
            forward_level: Level::Low,
        };
        Self { left, right }
    }

    /// Signed pulses per wheel since the previous call
    pub fn take_deltas(&mut self) -> (i16, i16) {
        (self.left.take_delta(), self.right.take_delta())
    }
}
