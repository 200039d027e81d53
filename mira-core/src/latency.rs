//! Buffered-latency tracking and the PI ratio controller.
//!
//! Runs on the source thread. Device ticks interpolate the device's read
//! position at the source PLL's predicted event time; the difference to the
//! source's write position is the buffered latency. The controller filters
//! the error against a target and emits a resampling ratio that nudges the
//! buffer back toward the target without audible pitch movement.

use crate::pll::Pll;
use crate::timing::DeviceTick;

/// Worst-case burst jitter of the remote source, in milliseconds.
pub const REMOTE_JITTER_MS: f64 = 13.0;

/// Headroom factor on the device's advertised maximum period.
const MAX_PERIOD_HEADROOM: f64 = 1.1;

// gains are deliberately tiny: ratio excursions stay well below the
// threshold of pitch perception
const KP: f64 = 0.5e-6;
const KI: f64 = 1.0e-16;

pub struct LatencyController {
    sample_rate: f64,

    dev_last_time: i64,
    dev_last_position: i64,
    dev_next_time: i64,
    dev_next_position: i64,
    dev_period_frames: usize,
    ticks_seen: u32,

    offset_error: f64,
    offset_error_integral: f64,
    ratio_integral: f64,
}

#[derive(Debug, Copy, Clone)]
pub struct LatencyUpdate {
    /// SRC ratio for this period.
    pub ratio: f64,
    /// Raw buffered latency in frames, before smoothing.
    pub actual_offset: f64,
    pub target_latency: f64,
}

impl LatencyController {
    pub fn new(sample_rate: u32) -> Self {
        LatencyController {
            sample_rate: sample_rate as f64,
            dev_last_time: 0,
            dev_last_position: 0,
            dev_next_time: 0,
            dev_next_position: 0,
            dev_period_frames: 0,
            ticks_seen: 0,
            offset_error: 0.0,
            offset_error_integral: 0.0,
            ratio_integral: 0.0,
        }
    }

    /// Folds one device tick into the two-point interpolation history.
    pub fn observe_tick(&mut self, tick: DeviceTick) {
        self.dev_last_time = self.dev_next_time;
        self.dev_last_position = self.dev_next_position;
        self.dev_next_time = tick.next_time;
        self.dev_next_position = tick.next_position;
        self.dev_period_frames = tick.period_frames;
        self.ticks_seen = self.ticks_seen.saturating_add(1);
    }

    /// Desired buffered latency in frames.
    ///
    /// The third term compensates the double-buffered transition asymmetry:
    /// while the device runs below its advertised maximum period, extra
    /// frames are transiently banked in the ring buffer; without it the
    /// controller would chase a false offset and underrun when the device
    /// returns to the maximum period.
    pub fn target_latency(&self, device_max_period: usize) -> f64 {
        REMOTE_JITTER_MS * self.sample_rate / 1000.0
            + device_max_period as f64 * MAX_PERIOD_HEADROOM
            + device_max_period.saturating_sub(self.dev_period_frames) as f64
    }

    /// Runs one controller period. `cur_time`/`cur_position` are the source
    /// PLL's pre-filter prediction for this submit; `pll` supplies the loop
    /// coefficients used to smooth the offset error. Returns `None` until
    /// two device ticks have been observed.
    pub fn update(
        &mut self,
        cur_time: i64,
        cur_position: i64,
        pll: &Pll,
        device_max_period: usize,
    ) -> Option<LatencyUpdate> {
        if self.ticks_seen < 2 {
            return None;
        }

        let span = self.dev_next_time - self.dev_last_time;
        if span <= 0 {
            return None;
        }

        let progress = (cur_time - self.dev_last_time) as f64 / span as f64;
        let dev_position = self.dev_last_position as f64
            + (self.dev_next_position - self.dev_last_position) as f64 * progress;

        let target_latency = self.target_latency(device_max_period);
        let actual_offset = cur_position as f64 - dev_position;
        let actual_offset_error = -(actual_offset - target_latency);

        // smooth the raw error with the source loop's own coefficients
        let err = actual_offset_error - self.offset_error;
        self.offset_error += pll.b() * err + self.offset_error_integral;
        self.offset_error_integral += pll.c() * err;

        self.ratio_integral += self.offset_error * pll.period_sec();
        let ratio = 1.0 + KP * self.offset_error + KI * self.ratio_integral;

        Some(LatencyUpdate {
            ratio,
            actual_offset,
            target_latency,
        })
    }

    pub fn offset_error(&self) -> f64 {
        self.offset_error
    }

    pub fn device_period_frames(&self) -> usize {
        self.dev_period_frames
    }
}
