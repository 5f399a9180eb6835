//! System Events
//!
//! Commands from collaborator tasks (start button, tuning front ends) to the
//! cooperative loop, which forwards them to the control link.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use crate::config::Gains;
use crate::control::orchestrator::RunState;
use crate::system::link::ControlLink;

/// Multi-producer, single-consumer event channel with capacity of 8
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, Events, 8> = Channel::new();

/// Sends an event to the system channel
pub async fn send(event: Events) {
    EVENT_CHANNEL.sender().send(event).await;
}

/// Sends an event without waiting, handing it back if the channel is full
pub fn try_send(event: Events) -> Result<(), Events> {
    EVENT_CHANNEL.try_send(event).map_err(|TrySendError::Full(event)| event)
}

/// Receives the next event from the system channel
pub async fn wait() -> Events {
    EVENT_CHANNEL.receiver().receive().await
}

/// System-wide events
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Events {
    /// Start button pressed: start when not running, stop otherwise
    StartStopToggled,
    StartRequested,
    StopRequested,
    /// New base target speed
    TargetSpeedSet(i16),
    /// New direction loop gains
    DirectionGainsSet(Gains),
    /// Fixed fan percentage, `None` returns the fan to the pitch curve
    FanOverride(Option<u8>),
}

/// Applies an event to the control link
///
/// `run_state` is the last state reported by the control tick, used to resolve
/// the start/stop toggle.
pub fn forward<L: ControlLink>(event: Events, link: &L, run_state: RunState) {
    match event {
        Events::StartStopToggled if run_state == RunState::Running => link.request_stop(),
        Events::StartStopToggled | Events::StartRequested => link.start(),
        Events::StopRequested => link.request_stop(),
        Events::TargetSpeedSet(speed) => link.set_target_speed(speed),
        Events::DirectionGainsSet(gains) => link.set_params(gains.kp, gains.ki, gains.kd),
        Events::FanOverride(percent) => link.set_fan_override(percent),
    }
}
