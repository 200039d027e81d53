use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use ::cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ::cpal::OutputCallbackInfo;

use crate::cpal::config;
use crate::{thread as thread_util, time};
use crate::{DeviceError, PlaybackPort, PullFn, StreamShape};

pub struct Output {
    worker: Option<Worker>,
    /// Device-side latency in frames, written from the callback.
    latency: Arc<AtomicUsize>,
}

struct Worker {
    commands: mpsc::Sender<Command>,
    replies: mpsc::Receiver<Result<(), DeviceError>>,
    handle: thread::JoinHandle<()>,
}

enum Command {
    Play,
}

impl Output {
    pub fn new() -> Self {
        Output {
            worker: None,
            latency: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PlaybackPort for Output {
    fn setup(&mut self, shape: StreamShape, pull: PullFn) -> Result<usize, DeviceError> {
        self.stop();

        let (command_tx, command_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let (setup_tx, setup_rx) = mpsc::sync_channel(0);

        let latency = self.latency.clone();

        // the stream must be built, played and dropped on one thread
        let handle = thread::spawn(move || {
            thread_util::set_name("mira/device");

            let (stream, period_frames) = match build_stream(shape, pull, latency) {
                Ok(built) => built,
                Err(err) => {
                    let _ = setup_tx.send(Err(err));
                    return;
                }
            };

            let _ = setup_tx.send(Ok(period_frames));

            loop {
                match command_rx.recv() {
                    Ok(Command::Play) => {
                        let result = stream.play().map_err(DeviceError::from);
                        let _ = reply_tx.send(result);
                    }
                    // hung up: owner wants the stream gone
                    Err(_) => break,
                }
            }

            drop(stream);
        });

        let period_frames = match setup_rx.recv() {
            Ok(Ok(period_frames)) => period_frames,
            Ok(Err(err)) => {
                let _ = handle.join();
                return Err(err);
            }
            Err(_) => return Err(DeviceError::ThreadDied),
        };

        self.worker = Some(Worker {
            commands: command_tx,
            replies: reply_rx,
            handle,
        });

        Ok(period_frames)
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        let worker = self.worker.as_ref().ok_or(DeviceError::NotSetUp)?;

        worker
            .commands
            .send(Command::Play)
            .map_err(|_| DeviceError::ThreadDied)?;

        worker.replies.recv().map_err(|_| DeviceError::ThreadDied)?
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            drop(worker.commands);
            // joining guarantees no further pull callbacks
            let _ = worker.handle.join();
        }
    }

    fn latency_frames(&self) -> Option<usize> {
        self.worker
            .as_ref()
            .map(|_| self.latency.load(Ordering::Relaxed))
    }
}

fn build_stream(
    shape: StreamShape,
    mut pull: PullFn,
    latency: Arc<AtomicUsize>,
) -> Result<(::cpal::Stream, usize), DeviceError> {
    let host = ::cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or(DeviceError::NoDeviceAvailable)?;

    let config = config::for_output(&device, shape)?;
    let sample_rate = shape.sample_rate as f64;
    let channels = shape.channels;

    let stream = device.build_output_stream(
        &config.stream,
        {
            let mut initialized_thread = false;

            move |data: &mut [f32], info: &OutputCallbackInfo| {
                // take arrival time before anything else
                let now = time::now();

                // on first call, promote this thread to realtime:
                if !initialized_thread {
                    thread_util::promote("mira/audio");
                    initialized_thread = true;
                }

                let ts = info.timestamp();
                let output_latency = ts
                    .playback
                    .duration_since(&ts.callback)
                    .unwrap_or_default();
                latency.store(
                    (output_latency.as_secs_f64() * sample_rate) as usize,
                    Ordering::Relaxed,
                );

                debug_assert!(data.len() % channels == 0);
                pull(now, data);
            }
        },
        move |err| {
            log::error!("output stream error: {err:?}");
        },
        None,
    )?;

    Ok((stream, config.period_frames))
}
