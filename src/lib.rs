//! Wall racer motion-control core
//!
//! Everything the 5ms control tick needs, free of any hardware access:
//! - `control`: sensor fusion, PID engines, element recognition and the orchestrator
//! - `sensor`: IMU capability trait and attitude helpers
//! - `system`: cross-task seams (command link, telemetry, event channel)
//!
//! The firmware binary in `main.rs` wires these to the RP2350 peripherals.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod logging;

pub mod config;
pub mod control;
pub mod sensor;
pub mod system;
