pub mod actuators;
pub mod control_tick;
pub mod encoder_read;
pub mod inductor_read;
pub mod orchestrate;
pub mod resources;
pub mod start_button;
