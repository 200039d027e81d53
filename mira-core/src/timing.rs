//! Device-to-source timing hand-off.
//!
//! The device callback posts one [`DeviceTick`] per period, after its ring
//! buffer consume, so a tick is never visible before the consume that
//! produced it. The source thread drains every pending tick at the top of
//! each submit.

use crate::ring;

/// Ticks buffered before the device starts dropping them. The source
/// drains the channel every period, so hitting this means the source has
/// stalled and offset tracking is the least of our problems.
pub const TIMING_CHANNEL_CAPACITY: usize = 16;

/// A snapshot of the device PLL taken in the device callback.
#[derive(Debug, Copy, Clone, Default)]
pub struct DeviceTick {
    pub period_frames: usize,
    pub next_time: i64,
    pub next_position: i64,
}

pub struct TimingTx {
    inner: ring::Producer<DeviceTick>,
}

pub struct TimingRx {
    inner: ring::Consumer<DeviceTick>,
}

pub fn channel() -> (TimingTx, TimingRx) {
    let (tx, rx) = ring::bounded(TIMING_CHANNEL_CAPACITY);
    (TimingTx { inner: tx }, TimingRx { inner: rx })
}

impl TimingTx {
    /// Posts one tick; returns false if the channel is full and the tick
    /// was dropped.
    pub fn post(&mut self, tick: DeviceTick) -> bool {
        self.inner.append(&[tick]) == 1
    }
}

impl TimingRx {
    pub fn poll(&mut self) -> Option<DeviceTick> {
        self.inner.pop()
    }
}
