//! Variable-ratio sample-rate conversion.
//!
//! Wraps a streaming sinc resampler working in planar chunks of one source
//! period. The latency controller hands a fresh ratio in every period; a
//! period-size change requires rebuilding the engine (the one sanctioned
//! allocation point on the submit path).

use rubato::{
    Resampler as _, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};
use thiserror::Error;

/// Legal ratio band of the engine. Controller excursions are orders of
/// magnitude smaller; the clamp only matters against a runaway integrator.
pub const MAX_RATIO_RELATIVE: f64 = 1.1;

#[derive(Debug, Error)]
pub enum ResamplerError {
    #[error("resampler construction failed: {0}")]
    Construct(#[from] rubato::ResamplerConstructionError),
    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

pub struct Resampler {
    inner: SincFixedIn<f32>,
    channels: usize,
    chunk_frames: usize,
}

impl Resampler {
    pub fn new(channels: usize, chunk_frames: usize) -> Result<Self, ResamplerError> {
        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };

        let inner = SincFixedIn::new(1.0, MAX_RATIO_RELATIVE, params, chunk_frames, channels)?;

        Ok(Resampler {
            inner,
            channels,
            chunk_frames,
        })
    }

    /// Applies the controller's ratio for the coming period, ramped across
    /// the chunk. Out-of-band ratios are clamped to the legal band.
    pub fn set_ratio(&mut self, ratio: f64) -> Result<(), ResamplerError> {
        let clamped = ratio.clamp(1.0 / MAX_RATIO_RELATIVE, MAX_RATIO_RELATIVE);
        if clamped != ratio {
            log::warn!("resample ratio {ratio} outside the legal band, using {clamped}");
        }

        self.inner.set_resample_ratio(clamped, true)?;
        Ok(())
    }

    /// Resamples one period of planar input into `output`, returning
    /// `(frames_consumed, frames_generated)`.
    pub fn process(
        &mut self,
        input: &[Vec<f32>],
        output: &mut [Vec<f32>],
    ) -> Result<(usize, usize), ResamplerError> {
        Ok(self.inner.process_into_buffer(input, output, None)?)
    }

    /// Planar input scratch sized for one period.
    pub fn input_scratch(&self) -> Vec<Vec<f32>> {
        self.inner.input_buffer_allocate(true)
    }

    /// Planar output scratch sized for the worst-case ratio.
    pub fn output_scratch(&self) -> Vec<Vec<f32>> {
        self.inner.output_buffer_allocate(true)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }
}
