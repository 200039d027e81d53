use ::cpal::traits::DeviceTrait;
use ::cpal::{BufferSize, Device, SampleFormat, SampleRate, StreamConfig, SupportedBufferSize};

use crate::{DeviceError, StreamShape};

pub const SAMPLE_FORMAT: SampleFormat = SampleFormat::F32;

/// Preferred playback period, clamped into the device's supported range.
pub const DEFAULT_PERIOD_FRAMES: u32 = 1024;

pub struct OutputConfig {
    pub stream: StreamConfig,
    pub period_frames: usize,
}

pub fn for_output(device: &Device, shape: StreamShape) -> Result<OutputConfig, DeviceError> {
    let configs = device.supported_output_configs()?;

    let config = configs
        .filter(|config| config.sample_format() == SAMPLE_FORMAT)
        .filter(|config| usize::from(config.channels()) == shape.channels)
        .nth(0)
        .ok_or(DeviceError::NoSupportedStreamConfig)?;

    let period_frames = match config.buffer_size() {
        SupportedBufferSize::Range { min, max } => DEFAULT_PERIOD_FRAMES.clamp(*min, *max),
        SupportedBufferSize::Unknown => DEFAULT_PERIOD_FRAMES,
    };

    Ok(OutputConfig {
        stream: StreamConfig {
            channels: shape.channels as u16,
            sample_rate: SampleRate(shape.sample_rate),
            buffer_size: BufferSize::Fixed(period_frames),
        },
        period_frames: period_frames as usize,
    })
}

pub fn for_input(device: &Device, shape: StreamShape) -> Result<StreamConfig, DeviceError> {
    let configs = device.supported_input_configs()?;

    configs
        .filter(|config| config.sample_format() == SAMPLE_FORMAT)
        .filter(|config| usize::from(config.channels()) == shape.channels)
        .nth(0)
        .ok_or(DeviceError::NoSupportedStreamConfig)?;

    Ok(StreamConfig {
        channels: shape.channels as u16,
        sample_rate: SampleRate(shape.sample_rate),
        buffer_size: BufferSize::Default,
    })
}
