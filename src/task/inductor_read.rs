//! Inductor sampling
//!
//! Reads the four inductor channels every millisecond and keeps a short median
//! per channel to knock out single-sample spikes from motor noise. The control
//! tick picks up the latest filtered set with [`latest`] without waiting.

use core::cell::Cell;

use embassy_rp::adc::{Adc, Channel, Config};
use embassy_rp::gpio::Pull;
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_time::{Duration, Ticker};
use moving_median::MovingMedian;
use wall_racer::control::fusion::RawSample;

use crate::task::resources::{InductorResources, Irqs};

/// Time between two conversions of all four channels
const SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

/// Median window per channel
const MEDIAN_WINDOW_SIZE: usize = 5;

/// Latest filtered sample set
static LATEST: Mutex<CriticalSectionRawMutex, Cell<RawSample>> = Mutex::new(Cell::new(RawSample {
    left_x: 0,
    left_y: 0,
    right_x: 0,
    right_y: 0,
}));

/// Returns the most recent filtered inductor readings
pub fn latest() -> RawSample {
    LATEST.lock(|sample| sample.get())
}

#[embassy_executor::task]
pub async fn inductor_read(r: InductorResources) {
    let mut adc = Adc::new(r.adc, Irqs, Config::default());
    let mut channels = [
        Channel::new_pin(r.left_x, Pull::None),
        Channel::new_pin(r.left_y, Pull::None),
        Channel::new_pin(r.right_x, Pull::None),
        Channel::new_pin(r.right_y, Pull::None),
    ];
    let mut filters = [
        MovingMedian::<f32, MEDIAN_WINDOW_SIZE>::new(),
        MovingMedian::<f32, MEDIAN_WINDOW_SIZE>::new(),
        MovingMedian::<f32, MEDIAN_WINDOW_SIZE>::new(),
        MovingMedian::<f32, MEDIAN_WINDOW_SIZE>::new(),
    ];

    let mut ticker = Ticker::every(SAMPLE_INTERVAL);
    loop {
        ticker.next().await;

        let mut filtered = [0u16; 4];
        for ((channel, filter), out) in channels.iter_mut().zip(filters.iter_mut()).zip(filtered.iter_mut()) {
            // A failed conversion repeats the previous value instead of injecting a zero
            if let Ok(raw) = adc.read(channel).await {
                filter.add_value(f32::from(raw));
            }
            *out = filter.median() as u16;
        }

        let sample = RawSample {
            left_x: filtered[0],
            left_y: filtered[1],
            right_x: filtered[2],
            right_y: filtered[3],
        };
        LATEST.lock(|latest| latest.set(sample));
    }
}
