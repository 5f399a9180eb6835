//! Control core: fusion, PID engines, element recognition and the per-tick orchestrator
pub mod detector;
pub mod drive;
pub mod element;
pub mod fusion;
pub mod history;
pub mod orchestrator;
pub mod pid;

pub use element::{ElementKind, ElementState, Recognizer};
pub use fusion::{FusedReading, RawSample, SensorFusion};
pub use orchestrator::{ActuatorCommand, MotionSnapshot, Orchestrator, RunState, TickReport};
