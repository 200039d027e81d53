//! Second-order type-II phase-locked loop.
//!
//! Turns a stream of callback events `(arrival time, frame count)` into a
//! smoothed model `(next_time, next_position, period_sec)` that is robust
//! to millisecond-scale scheduling jitter. One instance runs on the device
//! thread, one on the source thread; neither touches the other.

/// Loop bandwidth in Hz. An order of magnitude below audible modulation;
/// converges within a few seconds.
pub const BANDWIDTH_HZ: f64 = 0.05;

/// Accumulated clock error beyond this is corrected by inserting or
/// dropping frames instead of through the loop filter.
pub const SLEW_THRESHOLD_SEC: f64 = 0.2;

const NANOS_PER_SEC: f64 = 1e9;

pub struct Pll {
    sample_rate: f64,
    period_frames: usize,
    period_sec: f64,
    next_time: i64,
    next_position: i64,
    b: f64,
    c: f64,
}

/// Result of one update. `cur_time`/`cur_position` are the model's
/// prediction for this event *before* the filter ran, which is what the
/// latency offset computation wants.
#[derive(Debug, Copy, Clone)]
pub struct PllEvent {
    pub cur_time: i64,
    pub cur_position: i64,
    /// Non-zero when the error crossed the slew threshold: the number of
    /// frames the owner must insert (source side) or drop (device side)
    /// to keep position and time consistent.
    pub slew_frames: i64,
}

impl Pll {
    pub fn new(sample_rate: u32) -> Self {
        Pll {
            sample_rate: sample_rate as f64,
            period_frames: 0,
            period_sec: 0.0,
            next_time: 0,
            next_position: 0,
            b: 0.0,
            c: 0.0,
        }
    }

    /// Feeds one callback event into the loop.
    ///
    /// `next_position` is *not* advanced by `frames` here: the device side
    /// advances it by the frames it consumed, the source side by the frames
    /// the resampler generated. A slew advances it by the slew amount
    /// before this returns.
    pub fn update(&mut self, now: i64, frames: usize) -> PllEvent {
        if self.period_frames == 0 {
            let event = PllEvent {
                cur_time: now,
                cur_position: self.next_position,
                slew_frames: 0,
            };
            self.set_period(frames);
            self.next_time = now + secs_to_nanos(self.period_sec);
            return event;
        }

        if frames != self.period_frames {
            let event = PllEvent {
                cur_time: self.next_time,
                cur_position: self.next_position,
                slew_frames: 0,
            };
            // double-buffered devices request the new period size one
            // callback before the previous period finishes playing, so the
            // predicted wake-time still advances by the old period
            self.next_time += secs_to_nanos(self.period_sec);
            self.set_period(frames);
            return event;
        }

        let error = (now - self.next_time) as f64 / NANOS_PER_SEC;

        if error.abs() >= SLEW_THRESHOLD_SEC {
            let slew_frames = (error * self.sample_rate).round() as i64;
            let event = PllEvent {
                cur_time: now,
                cur_position: self.next_position + slew_frames,
                slew_frames,
            };
            self.period_sec = frames as f64 / self.sample_rate;
            self.next_time = now + secs_to_nanos(self.period_sec);
            self.next_position += slew_frames;
            return event;
        }

        let event = PllEvent {
            cur_time: self.next_time,
            cur_position: self.next_position,
            slew_frames: 0,
        };
        self.next_time += secs_to_nanos(self.b * error + self.period_sec);
        self.period_sec += self.c * error;
        event
    }

    /// Advances the position timeline by frames actually moved through the
    /// stream this period.
    pub fn advance(&mut self, frames: usize) {
        self.next_position += frames as i64;
    }

    pub fn reset(&mut self) {
        *self = Pll::new(self.sample_rate as u32);
    }

    fn set_period(&mut self, frames: usize) {
        self.period_frames = frames;
        self.period_sec = frames as f64 / self.sample_rate;

        let omega = std::f64::consts::TAU * BANDWIDTH_HZ * self.period_sec;
        self.b = std::f64::consts::SQRT_2 * omega;
        self.c = omega * omega;
    }

    pub fn period_frames(&self) -> usize {
        self.period_frames
    }

    pub fn period_sec(&self) -> f64 {
        self.period_sec
    }

    pub fn next_time(&self) -> i64 {
        self.next_time
    }

    pub fn next_position(&self) -> i64 {
        self.next_position
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn c(&self) -> f64 {
        self.c
    }
}

fn secs_to_nanos(secs: f64) -> i64 {
    (secs * NANOS_PER_SEC) as i64
}
