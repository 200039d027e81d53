//! Capture pass-through.
//!
//! The record path has no clock recovery: the device thread hands us
//! captured frames and we forward them to the remote protocol as s16le
//! bytes. Only the stream lifecycle and retained volume state live here.

use std::sync::Arc;

use mira_core::audio::MAX_CHANNELS;
use mira_device::{Backend, PushFn, StreamShape};

use crate::RemoteSink;

pub(crate) struct Record {
    shape: Option<StreamShape>,
    volume: Option<Vec<u16>>,
    mute: Option<bool>,
}

impl Record {
    pub fn new() -> Self {
        Record {
            shape: None,
            volume: None,
            mute: None,
        }
    }

    pub fn start(
        &mut self,
        backend: &mut dyn Backend,
        playback_volume: Option<&[u16]>,
        playback_mute: Option<bool>,
        remote: Arc<dyn RemoteSink>,
        shape: StreamShape,
    ) {
        if self.shape == Some(shape) {
            // already capturing with these parameters
            return;
        }

        let Some(port) = backend.record() else {
            log::warn!("record requested but back-end has no record port");
            return;
        };

        port.stop();
        self.shape = None;

        let push: PushFn = Box::new(move |_now, samples: &[i16]| {
            remote.write_audio(bytemuck::cast_slice(samples));
        });

        if let Err(err) = port.start(shape, push) {
            log::error!("starting record device: {err}");
            return;
        }
        self.shape = Some(shape);

        // the playback-retained volume and mute are what gets applied to a
        // restarted record device
        if let Some(levels) = playback_volume {
            if let Some(control) = port.volume() {
                control.set_volume(levels);
            }
        }
        if let Some(mute) = playback_mute {
            if let Some(control) = port.mute() {
                control.set_mute(mute);
            }
        }
    }

    pub fn stop(&mut self, backend: &mut dyn Backend) {
        if self.shape.take().is_some() {
            if let Some(port) = backend.record() {
                port.stop();
            }
        }
    }

    pub fn set_volume(&mut self, backend: &mut dyn Backend, levels: &[u16]) {
        if levels.len() > MAX_CHANNELS {
            log::warn!("ignoring record volume for {} channels", levels.len());
            return;
        }

        self.volume = Some(levels.to_vec());

        if self.shape.is_some() {
            if let Some(control) = backend.record().and_then(|port| port.volume()) {
                control.set_volume(levels);
            }
        }
    }

    pub fn set_mute(&mut self, backend: &mut dyn Backend, mute: bool) {
        self.mute = Some(mute);

        if self.shape.is_some() {
            if let Some(control) = backend.record().and_then(|port| port.mute()) {
                control.set_mute(mute);
            }
        }
    }
}
