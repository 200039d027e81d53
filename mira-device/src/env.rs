//! Device selection by environment variable. cpal exposes no API to pick a
//! specific sink or source, only a general audio subsystem, so we lean on
//! the influential environment variables the PulseAudio/PipeWire client
//! libraries honour.

pub fn set_sink(device: &str) {
    log::info!("requesting audio sink: {device}");
    std::env::set_var("PULSE_SINK", device);
}

pub fn set_source(device: &str) {
    log::info!("requesting audio source: {device}");
    std::env::set_var("PULSE_SOURCE", device);
}
