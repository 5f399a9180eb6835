//! Fixed-capacity sample history

/// Circular buffer that always holds the most recent `N` samples
///
/// Starts filled with `T::default()`, so lookbacks are valid from the first push.
/// `N` must be a power of two; the write index wraps with a mask.
#[derive(Debug, Clone)]
pub struct RingBuffer<T, const N: usize> {
    samples: [T; N],
    next: usize,
}

impl<T: Copy + Default, const N: usize> RingBuffer<T, N> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "ring buffer capacity must be a power of two");
        N - 1
    };

    pub fn new() -> Self {
        Self {
            samples: [T::default(); N],
            next: 0,
        }
    }

    /// Stores a sample, overwriting the oldest one
    pub fn push(&mut self, sample: T) {
        self.samples[self.next] = sample;
        self.next = (self.next + 1) & Self::MASK;
    }

    /// Most recently pushed sample
    pub fn newest(&self) -> T {
        self.back(0)
    }

    /// Sample pushed `ticks` pushes before the newest one (`back(0)` is the newest)
    ///
    /// Lookbacks beyond the capacity wrap around.
    pub fn back(&self, ticks: usize) -> T {
        let index = (self.next + N - 1 - (ticks & Self::MASK)) & Self::MASK;
        self.samples[index]
    }

    /// Sample that will be overwritten by the next push
    pub fn oldest(&self) -> T {
        self.samples[self.next]
    }

    /// Iterates from the oldest to the newest sample
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = T> + '_ {
        (0..N).map(move |i| self.samples[(self.next + i) & Self::MASK])
    }

    /// Refills with `T::default()`
    pub fn clear(&mut self) {
        self.samples = [T::default(); N];
        self.next = 0;
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
