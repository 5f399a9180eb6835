//! Start button handling
//!
//! A short press toggles between running and stopped. Holding the button always
//! stops, so a runaway vehicle can be halted without knowing its state.

use embassy_futures::select::{select, Either};
use embassy_rp::gpio::{Input, Level, Pull};
use embassy_time::{Duration, Timer};
use wall_racer::system::event::{self, Events};

use crate::task::resources::StartButtonResources;

/// Button hold threshold
const HOLD_DURATION: Duration = Duration::from_millis(700);

/// Button debounce delay
const DEBOUNCE_DURATION: Duration = Duration::from_millis(30);

#[embassy_executor::task]
pub async fn start_button(r: StartButtonResources) {
    let mut button = Input::new(r.pin, Pull::Down);
    loop {
        if debounce(&mut button).await != Level::High {
            continue;
        }

        match select(Timer::after(HOLD_DURATION), debounce(&mut button)).await {
            Either::First(()) => {
                event::send(Events::StopRequested).await;
                button.wait_for_low().await;
            }
            Either::Second(_) => {
                event::send(Events::StartStopToggled).await;
            }
        }
    }
}

/// Waits for an edge that is still there after the debounce delay
async fn debounce(button: &mut Input<'static>) -> Level {
    loop {
        let start_level = button.get_level();
        button.wait_for_any_edge().await;
        Timer::after(DEBOUNCE_DURATION).await;
        let end_level = button.get_level();
        if start_level != end_level {
            break end_level;
        }
    }
}
