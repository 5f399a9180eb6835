//! Control tick
//!
//! The hard real-time part of the firmware. Runs on the interrupt executor every
//! 5ms, so it preempts everything on the thread executor. Each period it:
//! - samples inductors, encoders and the IMU
//! - runs sensor fusion and the orchestrator
//! - drives motors and fan
//! - publishes telemetry
//!
//! Nothing in here awaits anything but the ticker.

use core::cell::RefCell;

use defmt::{info, warn};
use embassy_embedded_hal::shared_bus::blocking::spi::SpiDevice;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::SPI0;
use embassy_rp::spi::{self, Blocking, Spi};
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_time::{Delay, Duration, Ticker};
use static_cell::StaticCell;
use wall_racer::config::{ControlConfig, CONTROL_PERIOD_MS};
use wall_racer::control::{MotionSnapshot, Orchestrator, SensorFusion};
use wall_racer::sensor::attitude::Attitude;
use wall_racer::sensor::imu::ImuDevice;
use wall_racer::system::link::LINK;
use wall_racer::system::telemetry::TELEMETRY;

use crate::task::actuators::Actuators;
use crate::task::encoder_read::Encoders;
use crate::task::inductor_read;
use crate::task::resources::ImuResources;

/// SPI clock for the IMU
const IMU_SPI_FREQUENCY_HZ: u32 = 8_000_000;

type ImuBus = Mutex<CriticalSectionRawMutex, RefCell<Spi<'static, SPI0, Blocking>>>;
type ImuSpi = SpiDevice<'static, CriticalSectionRawMutex, Spi<'static, SPI0, Blocking>, Output<'static>>;

static IMU_BUS: StaticCell<ImuBus> = StaticCell::new();

/// Everything the control tick owns
pub struct ControlHardware {
    pub encoders: Encoders,
    pub actuators: Actuators,
    pub imu: Option<ImuDevice<ImuSpi>>,
}

/// Brings up the IMU bus and probes for a supported part
///
/// The vehicle still runs without an IMU, only without pitch and yaw rate.
pub fn init_imu(r: ImuResources) -> Option<ImuDevice<ImuSpi>> {
    let mut config = spi::Config::default();
    config.frequency = IMU_SPI_FREQUENCY_HZ;
    config.polarity = spi::Polarity::IdleHigh;
    config.phase = spi::Phase::CaptureOnSecondTransition;

    let spi = Spi::new_blocking(r.spi, r.clk, r.mosi, r.miso, config);
    let bus = IMU_BUS.init(Mutex::new(RefCell::new(spi)));
    let device = SpiDevice::new(bus, Output::new(r.cs, Level::High));

    match ImuDevice::probe(device, &mut Delay) {
        Ok(imu) => {
            info!("IMU ready: {:?}", imu.kind());
            Some(imu)
        }
        Err(e) => {
            warn!("IMU probe failed: {:?}, running without attitude", e);
            None
        }
    }
}

#[embassy_executor::task]
pub async fn control_tick(mut hw: ControlHardware) {
    let config = ControlConfig::default();
    let fusion = SensorFusion::new(&config.fusion);
    let mut orchestrator = Orchestrator::new(&config, &LINK);
    let mut attitude = Attitude::default();
    let mut imu_fault_logged = false;

    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_PERIOD_MS));
    info!("control tick running every {}ms", CONTROL_PERIOD_MS);

    loop {
        ticker.next().await;

        let (left_delta, right_delta) = hw.encoders.take_deltas();
        if let Some(imu) = hw.imu.as_mut() {
            match Attitude::sample(imu) {
                Ok(sample) => {
                    attitude = sample;
                    imu_fault_logged = false;
                }
                // Keep the previous attitude; one log line per fault streak
                Err(e) if !imu_fault_logged => {
                    warn!("IMU read failed: {:?}", e);
                    imu_fault_logged = true;
                }
                Err(_) => {}
            }
        }

        let motion = MotionSnapshot {
            left_encoder_delta: left_delta,
            right_encoder_delta: right_delta,
            gyro_z: attitude.yaw_rate,
            pitch_angle: attitude.pitch,
        };
        let reading = fusion.compute(&inductor_read::latest());

        let command = orchestrator.tick(&motion, &reading);
        hw.actuators.apply(&command);
        TELEMETRY.publish(&orchestrator.report());
    }
}
