//! Wall racer firmware entry point
//!
//! Brings up the peripherals, then splits the work across two executors:
//! - an interrupt executor on `SWI_IRQ_1` for the 5ms control tick
//! - the thread executor for sampling, the start button and orchestration

#![no_std]
#![no_main]

use crate::task::{
    actuators::Actuators,
    control_tick::{control_tick, init_imu, ControlHardware},
    encoder_read::Encoders,
    inductor_read::inductor_read,
    orchestrate::orchestrate,
    start_button::start_button,
};
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::block::ImageDef;
use embassy_rp::config::Config;
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use task::resources::{
    AssignedResources, EncoderResources, FanResources, ImuResources, InductorResources,
    MotorDriverResources, StartButtonResources,
};
use {defmt_rtt as _, panic_probe as _};

/// Firmware image type for bootloader
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// Task implementations
mod task;

/// Executor for the control tick, preempts the thread executor
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HIGH.on_interrupt()
}

/// Firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());
    let r = split_resources!(p);

    // Hardware owned by the control tick is set up before it starts
    let hw = ControlHardware {
        encoders: Encoders::new(r.encoders),
        actuators: Actuators::new(r.motor_driver, r.fan),
        imu: init_imu(r.imu),
    };

    // Inductor samples must be flowing before the first tick reads them
    spawner.spawn(inductor_read(r.inductors)).unwrap();

    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    high.spawn(control_tick(hw)).unwrap();

    spawner.spawn(start_button(r.start_button)).unwrap();
    spawner.spawn(orchestrate()).unwrap();
}
