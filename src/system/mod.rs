//! Cross-task seams between the control tick and the cooperative side
pub mod event;
pub mod link;
pub mod telemetry;
