//! The playback engine.
//!
//! Two threads meet here. The source thread owns the decode, the source
//! PLL, the latency controller and the resampler, and writes audio into
//! the ring buffer. The device thread owns the device PLL, reads from the
//! ring buffer, and posts timing ticks back. Each side's mutable state
//! lives on its own cache line and is never touched by the other; the only
//! shared structures are the two SPSC queues and the stream state cell.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use static_assertions::const_assert;

use mira_core::audio::{self, SampleFormat, MAX_CHANNELS};
use mira_core::latency::LatencyController;
use mira_core::pll::Pll;
use mira_core::resample::Resampler;
use mira_core::ring::{self, History};
use mira_core::timing::{self, DeviceTick, TimingRx, TimingTx};
use mira_device::{Backend, PullFn, StreamShape};

use crate::graph::{GraphHandle, GraphRegistry};

/// Seconds of audio the ring buffer is provisioned for up front.
const BUFFER_SECONDS: usize = 1;

/// Latency graph window and display range.
const LATENCY_GRAPH_CAPACITY: usize = 1200;
const LATENCY_GRAPH_RANGE_MS: f32 = 200.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
enum StreamState {
    Stop = 0,
    Setup = 1,
    Run = 2,
    Drain = 3,
}

struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: StreamState) -> Self {
        StateCell(AtomicU8::new(state as u8))
    }

    fn load(&self) -> StreamState {
        match self.0.load(Ordering::Acquire) {
            0 => StreamState::Stop,
            1 => StreamState::Setup,
            2 => StreamState::Run,
            _ => StreamState::Drain,
        }
    }

    fn store(&self, state: StreamState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Per-stream counters, readable from any thread.
#[derive(Default)]
pub struct PlaybackStats {
    /// Frames accepted from the remote source.
    pub frames_submitted: AtomicU64,
    /// Frames appended to the ring buffer after resampling.
    pub frames_resampled: AtomicU64,
    /// Frames delivered to the device.
    pub frames_pulled: AtomicU64,
    pub underrun_periods: AtomicU64,
    pub source_slews: AtomicU64,
    pub device_slews: AtomicU64,
}

/// Source-thread state. Alignment keeps it off the device side's cache
/// lines; the assertions below pin that property.
#[repr(align(64))]
struct SourceSide {
    pll: Pll,
    control: LatencyController,
    resampler: Resampler,
    decode: audio::Decoder,
    period_frames: usize,
    in_planar: Vec<Vec<f32>>,
    out_planar: Vec<Vec<f32>>,
    interleaved: Vec<f32>,
}

/// Device-thread state, moved into the pull callback.
#[repr(align(64))]
struct DeviceSide {
    pll: Pll,
    state: Arc<StateCell>,
    consumer: ring::Consumer<f32>,
    timing: TimingTx,
    stats: Arc<PlaybackStats>,
    channels: usize,
}

const_assert!(std::mem::align_of::<SourceSide>() >= 64);
const_assert!(std::mem::align_of::<DeviceSide>() >= 64);

impl DeviceSide {
    /// The realtime pull path: wait-free and allocation-free.
    fn pull(&mut self, now: i64, data: &mut [f32]) -> usize {
        let frames = data.len() / self.channels;

        match self.state.load() {
            StreamState::Stop | StreamState::Setup => {
                data.fill(0.0);
                return 0;
            }
            StreamState::Run | StreamState::Drain => {}
        }

        let event = self.pll.update(now, frames);

        if event.slew_frames > 0 {
            // late callbacks left stale audio behind: drop it
            let want = event.slew_frames as usize * self.channels;
            let dropped = self.consumer.discard(want);
            if dropped < want {
                log::warn!("device slew outran the buffer: dropped {dropped} of {want} samples");
            }
            self.stats.device_slews.fetch_add(1, Ordering::Relaxed);
        } else if event.slew_frames < 0 {
            self.stats.device_slews.fetch_add(1, Ordering::Relaxed);
        }

        self.pll.advance(frames);

        let taken = self.consumer.consume(data);
        data[taken..].fill(0.0);

        let state = self.state.load();

        if taken < data.len() && state == StreamState::Run {
            self.stats.underrun_periods.fetch_add(1, Ordering::Relaxed);
        }

        self.stats
            .frames_pulled
            .fetch_add((taken / self.channels) as u64, Ordering::Relaxed);

        // posted after the consume so a tick is never visible before the
        // read position it reports
        self.timing.post(DeviceTick {
            period_frames: frames,
            next_time: self.pll.next_time(),
            next_position: self.pll.next_position(),
        });

        if state == StreamState::Drain && self.consumer.is_empty() {
            self.state.store(StreamState::Stop);
        }

        taken / self.channels
    }
}

struct Engine {
    shape: StreamShape,
    stride: usize,
    state: Arc<StateCell>,
    producer: ring::Producer<f32>,
    timing: TimingRx,
    device_max_period: usize,
    stats: Arc<PlaybackStats>,
    latency_graph: Arc<History>,
    graph_handle: GraphHandle,
    source: Box<SourceSide>,
}

pub(crate) struct Playback {
    graphs: Arc<GraphRegistry>,
    engine: Option<Engine>,
    volume: Option<Vec<u16>>,
    mute: Option<bool>,
}

impl Playback {
    pub fn new(graphs: Arc<GraphRegistry>) -> Self {
        Playback {
            graphs,
            engine: None,
            volume: None,
            mute: None,
        }
    }

    pub fn retained_volume(&self) -> Option<&[u16]> {
        self.volume.as_deref()
    }

    pub fn retained_mute(&self) -> Option<bool> {
        self.mute
    }

    pub fn stats(&self) -> Option<Arc<PlaybackStats>> {
        self.engine.as_ref().map(|engine| engine.stats.clone())
    }

    pub fn start(&mut self, backend: &mut dyn Backend, shape: StreamShape, format: SampleFormat) {
        // starting over an active stream discards it outright
        self.teardown(backend);

        if shape.channels == 0 || shape.channels > MAX_CHANNELS {
            log::error!("unsupported channel count {}", shape.channels);
            return;
        }

        let Some(decode) = format.decoder() else {
            log::warn!("unsupported playback format {format}, ignoring stream");
            return;
        };

        let Some(port) = backend.playback() else {
            log::warn!("playback requested but back-end has no playback port");
            return;
        };

        // nominal 10ms chunk until the first submit reveals the period
        let nominal_period = (shape.sample_rate / 100).max(1) as usize;
        let resampler = match Resampler::new(shape.channels, nominal_period) {
            Ok(resampler) => resampler,
            Err(err) => {
                log::error!("creating resampler: {err}");
                return;
            }
        };

        let state = Arc::new(StateCell::new(StreamState::Stop));
        let stats = Arc::new(PlaybackStats::default());

        let (producer, consumer) =
            ring::growable::<f32>(shape.samples(shape.sample_rate as usize * BUFFER_SECONDS));
        let (timing_tx, timing_rx) = timing::channel();

        let mut device = DeviceSide {
            pll: Pll::new(shape.sample_rate),
            state: state.clone(),
            consumer,
            timing: timing_tx,
            stats: stats.clone(),
            channels: shape.channels,
        };
        let pull: PullFn = Box::new(move |now, data| device.pull(now, data));

        let device_max_period = match port.setup(shape, pull) {
            Ok(frames) => frames,
            Err(err) => {
                log::error!("setting up playback device: {err}");
                return;
            }
        };

        // retained volume and mute are applied on every setup
        if let Some(levels) = &self.volume {
            if let Some(control) = port.volume() {
                control.set_volume(levels);
            }
        }
        if let Some(mute) = self.mute {
            if let Some(control) = port.mute() {
                control.set_mute(mute);
            }
        }

        let latency_graph = Arc::new(History::new(LATENCY_GRAPH_CAPACITY));
        let graph_handle = self.graphs.register(
            "playback latency",
            latency_graph.clone(),
            0.0,
            LATENCY_GRAPH_RANGE_MS,
            latency_formatter,
        );

        let in_planar = resampler.input_scratch();
        let out_planar = resampler.output_scratch();
        let period_frames = resampler.chunk_frames();

        state.store(StreamState::Setup);

        self.engine = Some(Engine {
            shape,
            stride: shape.channels * format.sample_bytes(),
            state,
            producer,
            timing: timing_rx,
            device_max_period,
            stats,
            latency_graph,
            graph_handle,
            source: Box::new(SourceSide {
                pll: Pll::new(shape.sample_rate),
                control: LatencyController::new(shape.sample_rate),
                resampler,
                decode,
                period_frames,
                in_planar,
                out_planar,
                interleaved: Vec::new(),
            }),
        });

        log::info!(
            "playback stream set up: {} channels at {}Hz, device period <= {} frames",
            shape.channels,
            shape.sample_rate,
            device_max_period,
        );
    }

    /// The source-thread push path: one remote burst in, one resampled
    /// period appended to the ring buffer.
    pub fn data(&mut self, backend: &mut dyn Backend, now: i64, bytes: &[u8]) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        match engine.state.load() {
            StreamState::Setup | StreamState::Run => {}
            StreamState::Stop | StreamState::Drain => return,
        }

        if bytes.len() % engine.stride != 0 {
            log::error!(
                "playback data is not a whole number of frames ({} bytes, stride {})",
                bytes.len(),
                engine.stride,
            );
            return;
        }

        let frames = bytes.len() / engine.stride;
        if frames == 0 {
            return;
        }

        let src = &mut *engine.source;
        let channels = engine.shape.channels;

        // period change: the one place the submit path may allocate
        if frames != src.period_frames {
            match Resampler::new(channels, frames) {
                Ok(resampler) => {
                    src.in_planar = resampler.input_scratch();
                    src.out_planar = resampler.output_scratch();
                    src.resampler = resampler;
                    src.period_frames = frames;
                }
                Err(err) => {
                    log::error!("reallocating resampler for period {frames}: {err}");
                    engine.state.store(StreamState::Stop);
                    return;
                }
            }
        }

        (src.decode)(bytes, &mut src.in_planar);
        engine
            .stats
            .frames_submitted
            .fetch_add(frames as u64, Ordering::Relaxed);

        // fold in everything the device reported since the last burst
        while let Some(tick) = engine.timing.poll() {
            src.control.observe_tick(tick);
        }

        let event = src.pll.update(now, frames);

        if event.slew_frames > 0 {
            // the source clock jumped forwards: backfill the gap with
            // silence so position and time stay consistent
            engine
                .producer
                .append_zeroed(event.slew_frames as usize * channels);
            engine.stats.source_slews.fetch_add(1, Ordering::Relaxed);
        } else if event.slew_frames < 0 {
            engine.stats.source_slews.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(update) =
            src.control
                .update(event.cur_time, event.cur_position, &src.pll, engine.device_max_period)
        {
            if let Err(err) = src.resampler.set_ratio(update.ratio) {
                log::warn!("applying resample ratio {}: {err}", update.ratio);
            }

            let device_latency = backend
                .playback()
                .and_then(|port| port.latency_frames())
                .unwrap_or(0);

            let latency_ms = (update.actual_offset + device_latency as f64) * 1000.0
                / engine.shape.sample_rate as f64;
            engine.latency_graph.push(latency_ms as f32);
        }

        match src.resampler.process(&src.in_planar, &mut src.out_planar) {
            Ok((_consumed, generated)) => {
                audio::interleave_into(&src.out_planar, generated, &mut src.interleaved);
                engine.producer.append(&src.interleaved);
                // the source position advances by what actually reached
                // the buffer
                src.pll.advance(generated);
                engine
                    .stats
                    .frames_resampled
                    .fetch_add(generated as u64, Ordering::Relaxed);
            }
            Err(err) => {
                log::warn!("resampling failed, dropping this period: {err}");
                return;
            }
        }

        if engine.state.load() == StreamState::Setup {
            // enough buffered to survive the device's worst-case initial
            // double pull plus one burst of source jitter
            let threshold = 2 * frames + 2 * engine.device_max_period;
            if src.pll.next_position() >= threshold as i64 {
                match backend.playback() {
                    Some(port) => match port.start() {
                        Ok(()) => engine.state.store(StreamState::Run),
                        Err(err) => {
                            log::error!("starting playback device: {err}");
                            engine.state.store(StreamState::Stop);
                        }
                    },
                    None => engine.state.store(StreamState::Stop),
                }
            }
        }
    }

    pub fn stop(&mut self, backend: &mut dyn Backend) {
        let state = match self.engine.as_ref() {
            Some(engine) => engine.state.load(),
            None => return,
        };

        match state {
            StreamState::Run => {
                // no new data; the device drains what is buffered
                if let Some(engine) = self.engine.as_ref() {
                    engine.state.store(StreamState::Drain);
                }
            }
            StreamState::Setup => {
                // never ran, nothing worth draining
                self.teardown(backend);
            }
            StreamState::Stop => {
                // a previous drain finished; release the device now
                self.teardown(backend);
            }
            StreamState::Drain => {}
        }
    }

    pub fn set_volume(&mut self, backend: &mut dyn Backend, levels: &[u16]) {
        if levels.len() > MAX_CHANNELS {
            log::warn!("ignoring volume for {} channels", levels.len());
            return;
        }

        self.volume = Some(levels.to_vec());

        if self.engine.is_some() {
            if let Some(control) = backend.playback().and_then(|port| port.volume()) {
                control.set_volume(levels);
            }
        }
    }

    pub fn set_mute(&mut self, backend: &mut dyn Backend, mute: bool) {
        self.mute = Some(mute);

        if self.engine.is_some() {
            if let Some(control) = backend.playback().and_then(|port| port.mute()) {
                control.set_mute(mute);
            }
        }
    }

    /// Immediate stop: discards buffered audio and releases the stream.
    /// Retained volume and mute survive.
    pub fn teardown(&mut self, backend: &mut dyn Backend) {
        if let Some(engine) = self.engine.take() {
            // flip the state first so the callback goes quiet, then stop
            // the device, which guarantees no further callbacks
            engine.state.store(StreamState::Stop);
            if let Some(port) = backend.playback() {
                port.stop();
            }
            self.graphs.invalidate(engine.graph_handle);
        }
    }
}

fn latency_formatter(min: f32, max: f32, avg: f32, freq: f32, last: f32) -> String {
    format!("min:{min:6.2}ms max:{max:6.2}ms avg:{avg:6.2}ms {freq:5.1}/s cur:{last:6.2}ms")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    const RATE: u32 = 48000;
    const SOURCE_PERIOD: usize = 480;
    const SOURCE_PERIOD_NS: i64 = 10_000_000;
    const DEVICE_PERIOD: usize = 1024;
    const DEVICE_PERIOD_NS: i64 = 21_333_333;

    fn shape() -> StreamShape {
        StreamShape {
            channels: 2,
            sample_rate: RATE,
        }
    }

    fn silence_burst(frames: usize) -> Vec<u8> {
        vec![0u8; frames * 4]
    }

    fn fresh() -> (Playback, MockBackend) {
        let playback = Playback::new(Arc::new(GraphRegistry::new()));
        let backend = MockBackend::new(DEVICE_PERIOD);
        (playback, backend)
    }

    /// Starts a stream and submits bursts until the device is told to run.
    fn primed(playback: &mut Playback, backend: &mut MockBackend) -> i64 {
        playback.start(backend, shape(), SampleFormat::S16Le);
        let bytes = silence_burst(SOURCE_PERIOD);

        for k in 0..20i64 {
            playback.data(backend, k * SOURCE_PERIOD_NS, &bytes);
            if backend.playback.started() {
                return (k + 1) * SOURCE_PERIOD_NS;
            }
        }
        panic!("stream never primed");
    }

    #[test]
    fn run_begins_only_past_the_priming_threshold() {
        let (mut playback, mut backend) = fresh();
        playback.start(&mut backend, shape(), SampleFormat::S16Le);

        let bytes = silence_burst(SOURCE_PERIOD);
        let threshold = (2 * SOURCE_PERIOD + 2 * DEVICE_PERIOD) as u64;

        for k in 0..20i64 {
            playback.data(&mut backend, k * SOURCE_PERIOD_NS, &bytes);
            let resampled = playback
                .stats()
                .unwrap()
                .frames_resampled
                .load(Ordering::Relaxed);

            if backend.playback.started() {
                assert!(resampled >= threshold, "primed early at {resampled}");
                assert_eq!(
                    playback.engine.as_ref().unwrap().state.load(),
                    StreamState::Run
                );
                return;
            }
            assert!(resampled < threshold, "not primed at {resampled}");
        }
        panic!("stream never primed");
    }

    #[test]
    fn retained_volume_is_applied_on_setup_before_start() {
        let (mut playback, mut backend) = fresh();

        // set while stopped: retained, nothing touches the device
        playback.set_volume(&mut backend, &[0x8000, 0x8000]);
        playback.set_mute(&mut backend, false);
        assert!(backend.events().is_empty());

        playback.start(&mut backend, shape(), SampleFormat::S16Le);
        assert_eq!(
            backend.events(),
            vec![
                "playback setup",
                "playback volume [32768, 32768]",
                "playback mute false",
            ],
        );

        // a restart applies the same retained state again
        playback.start(&mut backend, shape(), SampleFormat::S16Le);
        assert_eq!(
            backend.events()[3..],
            [
                "playback stop",
                "playback setup",
                "playback volume [32768, 32768]",
                "playback mute false",
            ],
        );
    }

    #[test]
    fn drain_delivers_every_buffered_frame_then_stops() {
        let (mut playback, mut backend) = fresh();
        let mut now = primed(&mut playback, &mut backend);

        let bytes = silence_burst(SOURCE_PERIOD);
        for _ in 0..3 {
            playback.data(&mut backend, now, &bytes);
            now += SOURCE_PERIOD_NS;
        }

        playback.stop(&mut backend);

        let engine = playback.engine.as_ref().unwrap();
        assert_eq!(engine.state.load(), StreamState::Drain);
        let buffered_frames = engine.producer.len() / 2;
        let submitted = engine.stats.frames_submitted.load(Ordering::Relaxed);

        // no new data is accepted once draining
        playback.data(&mut backend, now, &bytes);
        assert_eq!(
            playback
                .stats()
                .unwrap()
                .frames_submitted
                .load(Ordering::Relaxed),
            submitted,
        );

        let mut buf = vec![0f32; DEVICE_PERIOD * 2];
        let mut delivered = 0;
        for i in 0..200i64 {
            delivered += backend.playback.run_callback(i * DEVICE_PERIOD_NS, &mut buf);
            if playback.engine.as_ref().unwrap().state.load() == StreamState::Stop {
                break;
            }
        }

        assert_eq!(delivered, buffered_frames);
        assert_eq!(
            playback.engine.as_ref().unwrap().state.load(),
            StreamState::Stop
        );

        // the source-side stop after drain completion releases the device
        playback.stop(&mut backend);
        assert!(playback.engine.is_none());
        assert_eq!(backend.events().last().unwrap(), "playback stop");
    }

    #[test]
    fn source_clock_step_backfills_exact_silence() {
        let (mut playback, mut backend) = fresh();
        playback.start(&mut backend, shape(), SampleFormat::S16Le);

        let bytes = silence_burst(SOURCE_PERIOD);
        for k in 0..5i64 {
            playback.data(&mut backend, k * SOURCE_PERIOD_NS, &bytes);
        }

        let engine = playback.engine.as_ref().unwrap();
        let position_before = engine.source.pll.next_position();
        let buffered_before = engine.producer.len();
        let resampled_before = engine.stats.frames_resampled.load(Ordering::Relaxed);

        // the next burst arrives 0.3s late
        playback.data(
            &mut backend,
            5 * SOURCE_PERIOD_NS + 300_000_000,
            &bytes,
        );

        let engine = playback.engine.as_ref().unwrap();
        let stats = &engine.stats;
        assert_eq!(stats.source_slews.load(Ordering::Relaxed), 1);

        let generated =
            (stats.frames_resampled.load(Ordering::Relaxed) - resampled_before) as i64;
        assert_eq!(
            engine.source.pll.next_position() - position_before,
            14400 + generated,
        );
        assert_eq!(
            (engine.producer.len() - buffered_before) as i64,
            (14400 + generated) * 2,
        );
    }

    #[test]
    fn stop_during_setup_releases_immediately() {
        let (mut playback, mut backend) = fresh();
        playback.start(&mut backend, shape(), SampleFormat::S16Le);

        let bytes = silence_burst(SOURCE_PERIOD);
        playback.data(&mut backend, 0, &bytes);

        playback.stop(&mut backend);
        assert!(playback.engine.is_none());
        assert_eq!(backend.events().last().unwrap(), "playback stop");

        // idempotent
        playback.stop(&mut backend);
        assert!(playback.engine.is_none());
    }

    #[test]
    fn restart_discards_the_active_stream() {
        let (mut playback, mut backend) = fresh();
        primed(&mut playback, &mut backend);

        playback.start(&mut backend, shape(), SampleFormat::S16Le);

        let events = backend.events();
        let stop_at = events.iter().position(|e| e == "playback stop").unwrap();
        assert!(events[stop_at + 1..].contains(&"playback setup".to_owned()));

        // counters start over with the new stream
        assert_eq!(
            playback
                .stats()
                .unwrap()
                .frames_submitted
                .load(Ordering::Relaxed),
            0,
        );
        assert!(!backend.playback.started());
    }

    #[test]
    fn unsupported_format_is_ignored() {
        let (mut playback, mut backend) = fresh();
        playback.start(&mut backend, shape(), SampleFormat::F32Le);

        assert!(playback.engine.is_none());
        assert!(backend.events().is_empty());
    }

    #[test]
    fn partial_frames_are_rejected() {
        let (mut playback, mut backend) = fresh();
        playback.start(&mut backend, shape(), SampleFormat::S16Le);

        playback.data(&mut backend, 0, &[0u8; 5]);

        let stats = playback.stats().unwrap();
        assert_eq!(stats.frames_submitted.load(Ordering::Relaxed), 0);
        assert_eq!(
            playback.engine.as_ref().unwrap().state.load(),
            StreamState::Setup
        );
    }

    #[test]
    fn device_period_step_raises_the_target_without_slewing() {
        let (mut playback, mut backend) = fresh();
        let now = primed(&mut playback, &mut backend);

        let mut big = vec![0f32; DEVICE_PERIOD * 2];
        let mut small = vec![0f32; 256 * 2];

        backend.playback.run_callback(now, &mut big);
        backend.playback.run_callback(now + DEVICE_PERIOD_NS, &mut big);

        // the device drops to a 256-frame period mid-stream
        let small_period_ns = 256 * 1_000_000_000 / 48000;
        let mut t = now + 2 * DEVICE_PERIOD_NS;
        for _ in 0..4 {
            backend.playback.run_callback(t, &mut small);
            t += small_period_ns;
        }

        // next burst folds the ticks in
        let bytes = silence_burst(SOURCE_PERIOD);
        playback.data(&mut backend, now + SOURCE_PERIOD_NS, &bytes);

        let engine = playback.engine.as_ref().unwrap();
        assert_eq!(engine.stats.device_slews.load(Ordering::Relaxed), 0);

        let control = &engine.source.control;
        assert_eq!(control.device_period_frames(), 256);

        let expect = 13.0 * 48.0 + 1024.0 * 1.1 + 768.0;
        assert!((control.target_latency(DEVICE_PERIOD) - expect).abs() < 1e-9);
    }

    #[test]
    fn steady_clocks_converge_toward_the_target_latency() {
        let (mut playback, mut backend) = fresh();
        playback.start(&mut backend, shape(), SampleFormat::S16Le);

        let bytes = silence_burst(SOURCE_PERIOD);
        let mut pull_buf = vec![0f32; DEVICE_PERIOD * 2];

        let end = 30_000_000_000i64;
        let mut t_submit = 0i64;
        let mut t_pull = i64::MAX;

        while t_submit < end {
            if t_pull <= t_submit {
                backend.playback.run_callback(t_pull, &mut pull_buf);
                t_pull += DEVICE_PERIOD_NS;
            } else {
                playback.data(&mut backend, t_submit, &bytes);
                t_submit += SOURCE_PERIOD_NS;

                if t_pull == i64::MAX && backend.playback.started() {
                    t_pull = t_submit;
                }
            }
        }

        let stats = playback.stats().unwrap();
        assert_eq!(stats.underrun_periods.load(Ordering::Relaxed), 0);
        assert_eq!(stats.source_slews.load(Ordering::Relaxed), 0);
        assert_eq!(stats.device_slews.load(Ordering::Relaxed), 0);

        let engine = playback.engine.as_ref().unwrap();
        let offset_error = engine.source.control.offset_error();
        assert!(
            offset_error.abs() < 600.0,
            "offset error {offset_error} frames"
        );

        let buffered = engine.producer.len() as f64 / 2.0;
        let target = engine.source.control.target_latency(DEVICE_PERIOD);
        assert!(
            (buffered - target).abs() < 1600.0,
            "buffered {buffered} frames vs target {target}"
        );

        // one latency sample was emitted per controlled period
        assert!(engine.latency_graph.push_count() > 2000);
    }
}

