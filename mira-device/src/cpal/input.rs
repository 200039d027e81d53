use std::sync::mpsc;
use std::thread;

use ::cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ::cpal::InputCallbackInfo;

use mira_core::audio;

use crate::cpal::config;
use crate::{thread as thread_util, time};
use crate::{DeviceError, PushFn, RecordPort, StreamShape};

pub struct Input {
    worker: Option<Worker>,
}

struct Worker {
    // we use this channel as a drop guard: hanging up tells the stream
    // thread to stop the stream and terminate
    guard: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl Input {
    pub fn new() -> Self {
        Input { worker: None }
    }
}

impl RecordPort for Input {
    fn start(&mut self, shape: StreamShape, push: PushFn) -> Result<(), DeviceError> {
        self.stop();

        let (guard_tx, guard_rx) = mpsc::channel::<()>();
        let (setup_tx, setup_rx) = mpsc::sync_channel(0);

        let handle = thread::spawn(move || {
            thread_util::set_name("mira/device");

            let stream = match build_stream(shape, push) {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = setup_tx.send(Err(err));
                    return;
                }
            };

            if let Err(err) = stream.play() {
                let _ = setup_tx.send(Err(err.into()));
                return;
            }

            let _ = setup_tx.send(Ok(()));

            // hold the stream alive until the owner hangs up
            let _ = guard_rx.recv();
            drop(stream);
        });

        match setup_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(Worker {
                    guard: guard_tx,
                    handle,
                });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => Err(DeviceError::ThreadDied),
        }
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            drop(worker.guard);
            // joining guarantees no further push callbacks
            let _ = worker.handle.join();
        }
    }
}

fn build_stream(shape: StreamShape, mut push: PushFn) -> Result<::cpal::Stream, DeviceError> {
    let host = ::cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or(DeviceError::NoDeviceAvailable)?;

    let config = config::for_input(&device, shape)?;
    let channels = shape.channels;

    let stream = device.build_input_stream(
        &config,
        {
            let mut initialized_thread = false;
            let mut scratch: Vec<i16> = Vec::new();

            move |data: &[f32], _: &InputCallbackInfo| {
                let now = time::now();

                if !initialized_thread {
                    thread_util::promote("mira/audio");
                    initialized_thread = true;
                }

                debug_assert!(data.len() % channels == 0);

                scratch.clear();
                scratch.extend(data.iter().copied().map(audio::f32_to_s16));
                push(now, &scratch);
            }
        },
        move |err| {
            log::error!("input stream error: {err:?}");
        },
        None,
    )?;

    Ok(stream)
}
