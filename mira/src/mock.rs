//! In-memory back-end for exercising the stream paths without a device.
//! Tests drive the registered pull callback by hand with synthetic clocks.

use std::sync::{Arc, Mutex};

use mira_device::{
    Backend, DeviceError, MuteControl, PlaybackPort, PullFn, PushFn, RecordPort, StreamShape,
    VolumeControl,
};

pub struct MockBackend {
    pub playback: MockPlayback,
    pub record: MockRecord,
    log: Arc<Mutex<Vec<String>>>,
}

/// Routes library log output through the test harness capture.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

impl MockBackend {
    pub fn new(max_period: usize) -> Self {
        init_logging();

        let log = Arc::new(Mutex::new(Vec::new()));

        MockBackend {
            playback: MockPlayback {
                pull: None,
                max_period,
                device_latency: 0,
                started: false,
                log: log.clone(),
            },
            record: MockRecord {
                push: None,
                shape: None,
                log: log.clone(),
            },
            log,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn playback(&mut self) -> Option<&mut dyn PlaybackPort> {
        Some(&mut self.playback)
    }

    fn record(&mut self) -> Option<&mut dyn RecordPort> {
        Some(&mut self.record)
    }
}

pub struct MockPlayback {
    pub pull: Option<PullFn>,
    pub max_period: usize,
    pub device_latency: usize,
    started: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockPlayback {
    fn note(&self, event: impl Into<String>) {
        self.log.lock().unwrap().push(event.into());
    }

    pub fn started(&self) -> bool {
        self.started
    }

    /// Invokes the registered pull callback as the device thread would.
    pub fn run_callback(&mut self, now: i64, data: &mut [f32]) -> usize {
        let pull = self.pull.as_mut().expect("no pull callback registered");
        pull(now, data)
    }
}

impl PlaybackPort for MockPlayback {
    fn setup(&mut self, _shape: StreamShape, pull: PullFn) -> Result<usize, DeviceError> {
        self.note("playback setup");
        self.pull = Some(pull);
        self.started = false;
        Ok(self.max_period)
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        self.note("playback start");
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.pull.take().is_some() {
            self.note("playback stop");
        }
        self.started = false;
    }

    fn volume(&mut self) -> Option<&mut dyn VolumeControl> {
        Some(self)
    }

    fn mute(&mut self) -> Option<&mut dyn MuteControl> {
        Some(self)
    }

    fn latency_frames(&self) -> Option<usize> {
        Some(self.device_latency)
    }
}

impl VolumeControl for MockPlayback {
    fn set_volume(&mut self, levels: &[u16]) {
        self.note(format!("playback volume {levels:?}"));
    }
}

impl MuteControl for MockPlayback {
    fn set_mute(&mut self, mute: bool) {
        self.note(format!("playback mute {mute}"));
    }
}

pub struct MockRecord {
    pub push: Option<PushFn>,
    pub shape: Option<StreamShape>,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockRecord {
    fn note(&self, event: impl Into<String>) {
        self.log.lock().unwrap().push(event.into());
    }
}

impl RecordPort for MockRecord {
    fn start(&mut self, shape: StreamShape, push: PushFn) -> Result<(), DeviceError> {
        self.note(format!(
            "record start {}ch@{}",
            shape.channels, shape.sample_rate
        ));
        self.push = Some(push);
        self.shape = Some(shape);
        Ok(())
    }

    fn stop(&mut self) {
        if self.push.take().is_some() {
            self.note("record stop");
        }
        self.shape = None;
    }

    fn volume(&mut self) -> Option<&mut dyn VolumeControl> {
        Some(self)
    }

    fn mute(&mut self) -> Option<&mut dyn MuteControl> {
        Some(self)
    }
}

impl VolumeControl for MockRecord {
    fn set_volume(&mut self, levels: &[u16]) {
        self.note(format!("record volume {levels:?}"));
    }
}

impl MuteControl for MockRecord {
    fn set_mute(&mut self, mute: bool) {
        self.note(format!("record mute {mute}"));
    }
}
