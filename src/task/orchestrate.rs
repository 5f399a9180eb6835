//! Orchestrate task
//!
//! The cooperative side of the firmware. Forwards command events to the control
//! link and periodically logs what the control tick reports. It never touches
//! control state directly.

use defmt::info;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker};
use wall_racer::control::TickReport;
use wall_racer::system::event;
use wall_racer::system::link::LINK;
use wall_racer::system::telemetry::TELEMETRY;

/// Interval between telemetry log lines
const TELEMETRY_INTERVAL: Duration = Duration::from_millis(500);

#[embassy_executor::task]
pub async fn orchestrate() {
    info!("Orchestrator started");
    let mut telemetry_ticker = Ticker::every(TELEMETRY_INTERVAL);
    // Last complete report; kept when a read keeps colliding with the tick
    let mut report = TickReport::default();

    loop {
        let woken = select(event::wait(), telemetry_ticker.next()).await;
        if let Some(latest) = TELEMETRY.snapshot() {
            report = latest;
        }

        match woken {
            Either::First(event) => {
                info!("Handling {:?} while {:?}", event, report.run_state);
                event::forward(event, &LINK, report.run_state);
            }
            Either::Second(()) => {
                info!(
                    "tick {} {:?} {:?}/{:?} L{} R{} err {} pwm {}/{} fan {}",
                    report.tick,
                    report.run_state,
                    report.element,
                    report.element_state,
                    report.left_magnitude,
                    report.right_magnitude,
                    report.steering_error,
                    report.command.left_pwm,
                    report.command.right_pwm,
                    report.command.fan_duty
                );
                if report.emergency {
                    info!("emergency active, motors braked");
                }
            }
        }
    }
}
