//! The audio device capability.
//!
//! A [`Backend`] bundles an optional playback port and an optional record
//! port. Optional device operations (volume, mute, latency query) are
//! modelled as capability accessors returning `Option`, so a missing
//! operation is an absence rather than a null check at every call site.
//!
//! Back-end selection is one-shot: the first factory in the ordered list
//! that initialises wins.

pub mod cpal;
pub mod env;
pub mod thread;
pub mod time;

use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StreamShape {
    pub channels: usize,
    pub sample_rate: u32,
}

impl StreamShape {
    /// Samples per interleaved f32 buffer of `frames` frames.
    pub fn samples(&self, frames: usize) -> usize {
        frames * self.channels
    }
}

/// Pull callback: invoked on the device thread with the callback arrival
/// time in monotonic nanoseconds and the interleaved output buffer to
/// fill. Returns the number of frames produced.
pub type PullFn = Box<dyn FnMut(i64, &mut [f32]) -> usize + Send>;

/// Push callback: invoked on the device thread with captured interleaved
/// s16 frames.
pub type PushFn = Box<dyn FnMut(i64, &[i16]) + Send>;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no audio device available")]
    NoDeviceAvailable,
    #[error("no supported stream config")]
    NoSupportedStreamConfig,
    #[error("enumerating stream configs: {0}")]
    StreamConfigs(#[from] ::cpal::SupportedStreamConfigsError),
    #[error("building stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),
    #[error("starting stream: {0}")]
    StartStream(#[from] ::cpal::PlayStreamError),
    #[error("audio device thread died")]
    ThreadDied,
    #[error("port has not been set up")]
    NotSetUp,
}

pub trait VolumeControl {
    /// Per-channel levels, full scale = `u16::MAX`.
    fn set_volume(&mut self, levels: &[u16]);
}

pub trait MuteControl {
    fn set_mute(&mut self, mute: bool);
}

pub trait PlaybackPort: Send {
    /// Configures the output stream and registers the pull callback.
    /// Returns the maximum period (frames per callback) the device may
    /// request. The stream does not run until [`PlaybackPort::start`].
    fn setup(&mut self, shape: StreamShape, pull: PullFn) -> Result<usize, DeviceError>;

    fn start(&mut self) -> Result<(), DeviceError>;

    /// Synchronous: no further pull callbacks once this returns.
    fn stop(&mut self);

    fn volume(&mut self) -> Option<&mut dyn VolumeControl> {
        None
    }

    fn mute(&mut self) -> Option<&mut dyn MuteControl> {
        None
    }

    /// Frames of latency downstream of the pull callback, if known.
    fn latency_frames(&self) -> Option<usize> {
        None
    }
}

pub trait RecordPort: Send {
    /// Opens the capture stream and starts delivering to `push`.
    fn start(&mut self, shape: StreamShape, push: PushFn) -> Result<(), DeviceError>;

    /// Synchronous: no further push callbacks once this returns.
    fn stop(&mut self);

    fn volume(&mut self) -> Option<&mut dyn VolumeControl> {
        None
    }

    fn mute(&mut self) -> Option<&mut dyn MuteControl> {
        None
    }
}

pub trait Backend: Send {
    fn name(&self) -> &'static str;

    fn playback(&mut self) -> Option<&mut dyn PlaybackPort>;

    fn record(&mut self) -> Option<&mut dyn RecordPort>;
}

pub type BackendFactory = fn() -> Result<Box<dyn Backend>, DeviceError>;

/// Ordered list of back-ends to try at init.
pub const DEFAULT_BACKENDS: &[(&str, BackendFactory)] = &[("cpal", cpal::open)];

/// Returns the first back-end that initialises, or `None`.
pub fn open_first(factories: &[(&str, BackendFactory)]) -> Option<Box<dyn Backend>> {
    for (name, factory) in factories {
        match factory() {
            Ok(backend) => {
                log::info!("audio back-end: {}", backend.name());
                return Some(backend);
            }
            Err(err) => {
                log::warn!("audio back-end {name} unavailable: {err}");
            }
        }
    }

    log::error!("no working audio back-end, audio is disabled");
    None
}
