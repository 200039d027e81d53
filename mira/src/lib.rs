//! Bidirectional audio bridge between a remote PCM source and a local
//! audio device.
//!
//! The remote side delivers signed-16 interleaved PCM in network-paced
//! bursts; the local device pulls float frames on its own hardware clock.
//! Neither clock is ours, so the playback path runs a phase-locked loop on
//! each thread, measures the buffered latency between them, and steers a
//! variable-ratio resampler until the latency converges on a target that
//! survives worst-case jitter.
//!
//! The host owns an [`AudioSystem`] value; back-end selection is injected
//! at construction and happens once.

pub mod config;
pub mod graph;
#[cfg(test)]
pub(crate) mod mock;
mod playback;
mod record;

use std::sync::Arc;

pub use mira_core::audio::SampleFormat;
pub use mira_device::{Backend, BackendFactory, StreamShape, DEFAULT_BACKENDS};
pub use playback::PlaybackStats;

use graph::GraphRegistry;
use playback::Playback;
use record::Record;

/// Where captured audio goes: the remote protocol's write side.
pub trait RemoteSink: Send + Sync {
    /// Interleaved s16le bytes, whole frames.
    fn write_audio(&self, pcm: &[u8]);
}

pub struct AudioSystem {
    backend: Option<Box<dyn Backend>>,
    playback: Playback,
    record: Record,
    graphs: Arc<GraphRegistry>,
    remote: Arc<dyn RemoteSink>,
}

impl AudioSystem {
    pub fn new(remote: Arc<dyn RemoteSink>) -> Self {
        Self::with_backends(remote, DEFAULT_BACKENDS)
    }

    /// Initialises with an ordered list of back-end factories; the first
    /// one that opens wins. With no working back-end every operation is a
    /// no-op and `supports_*` report false.
    pub fn with_backends(
        remote: Arc<dyn RemoteSink>,
        factories: &[(&str, BackendFactory)],
    ) -> Self {
        if let Some(config) = config::read() {
            config::apply(&config);
        }

        let backend = mira_device::open_first(factories);
        let graphs = Arc::new(GraphRegistry::new());

        AudioSystem {
            backend,
            playback: Playback::new(graphs.clone()),
            record: Record::new(),
            graphs,
            remote,
        }
    }

    pub fn supports_playback(&mut self) -> bool {
        match &mut self.backend {
            Some(backend) => backend.playback().is_some(),
            None => false,
        }
    }

    pub fn supports_record(&mut self) -> bool {
        match &mut self.backend {
            Some(backend) => backend.record().is_some(),
            None => false,
        }
    }

    /// Begins a playback stream. `format` must be s16le; other formats are
    /// ignored. `start_time` is the remote's stream timestamp, kept for
    /// diagnostics only.
    pub fn playback_start(
        &mut self,
        channels: usize,
        sample_rate: u32,
        format: SampleFormat,
        start_time: i64,
    ) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };

        log::debug!(
            "playback start: channels={channels} rate={sample_rate} \
             format={format} time={start_time}"
        );

        let shape = StreamShape {
            channels,
            sample_rate,
        };
        self.playback.start(backend, shape, format);
    }

    /// Initiates drain; buffered audio keeps playing until exhausted.
    pub fn playback_stop(&mut self) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        self.playback.stop(backend);
    }

    /// Feeds one burst of remote PCM. `data` must hold a whole number of
    /// frames.
    pub fn playback_data(&mut self, data: &[u8]) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        let now = mira_device::time::now();
        self.playback.data(backend, now, data);
    }

    /// Per-channel playback volume, retained across stream restarts.
    pub fn playback_volume(&mut self, levels: &[u16]) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        self.playback.set_volume(backend, levels);
    }

    /// Playback mute, retained across stream restarts.
    pub fn playback_mute(&mut self, mute: bool) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        self.playback.set_mute(backend, mute);
    }

    /// Starts capture. Calling again with the same parameters is a no-op;
    /// changed parameters restart the device.
    pub fn record_start(&mut self, channels: usize, sample_rate: u32) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };

        let shape = StreamShape {
            channels,
            sample_rate,
        };
        self.record.start(
            backend,
            self.playback.retained_volume(),
            self.playback.retained_mute(),
            self.remote.clone(),
            shape,
        );
    }

    pub fn record_stop(&mut self) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        self.record.stop(backend);
    }

    pub fn record_volume(&mut self, levels: &[u16]) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        self.record.set_volume(backend, levels);
    }

    pub fn record_mute(&mut self, mute: bool) {
        let Some(backend) = self.backend.as_deref_mut() else {
            return;
        };
        self.record.set_mute(backend, mute);
    }

    /// Latency graphs and any other registered stats sinks.
    pub fn graphs(&self) -> &GraphRegistry {
        &self.graphs
    }

    /// Counters of the active playback stream, if any.
    pub fn playback_stats(&self) -> Option<Arc<PlaybackStats>> {
        self.playback.stats()
    }

    /// Stops both directions and releases the back-end. Runs on drop.
    pub fn free(&mut self) {
        if let Some(backend) = self.backend.as_deref_mut() {
            self.playback.teardown(backend);
            self.record.stop(backend);
        }
        // back-end goes last, after both directions are quiet
        self.backend = None;
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        self.free();
    }
}
