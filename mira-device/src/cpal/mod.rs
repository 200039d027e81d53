//! cpal-backed audio device.
//!
//! cpal streams are not `Send` on every platform, so each stream is built
//! and dropped on a dedicated thread; commands and teardown travel over
//! channels. Dropping the command channel ends the thread, and joining it
//! guarantees no callback runs afterwards.

pub mod config;
mod input;
mod output;

use ::cpal::traits::HostTrait;

use crate::{Backend, DeviceError, PlaybackPort, RecordPort};

pub struct CpalBackend {
    playback: output::Output,
    record: input::Input,
}

pub fn open() -> Result<Box<dyn Backend>, DeviceError> {
    let host = ::cpal::default_host();

    if host.default_output_device().is_none() && host.default_input_device().is_none() {
        return Err(DeviceError::NoDeviceAvailable);
    }

    Ok(Box::new(CpalBackend {
        playback: output::Output::new(),
        record: input::Input::new(),
    }))
}

impl Backend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn playback(&mut self) -> Option<&mut dyn PlaybackPort> {
        Some(&mut self.playback)
    }

    fn record(&mut self) -> Option<&mut dyn RecordPort> {
        Some(&mut self.record)
    }
}
