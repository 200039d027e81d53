use std::path::{Path, PathBuf};

use serde::Deserialize;

const CONFIG_FILE: &str = "mira.toml";

#[derive(Deserialize)]
pub struct Config {
    #[serde(default)]
    playback: Device,
    #[serde(default)]
    record: Device,
}

#[derive(Deserialize, Default)]
pub struct Device {
    device: Option<String>,
}

/// Exports device preferences for the back-end to consult.
pub fn apply(config: &Config) {
    if let Some(device) = &config.playback.device {
        mira_device::env::set_sink(device);
    }
    if let Some(device) = &config.record.device {
        mira_device::env::set_source(device);
    }
}

/// Locates and parses `mira.toml`. The working directory takes precedence
/// over the XDG config dirs; a malformed file is skipped so a bad edit
/// cannot take the host's audio down with it.
pub fn read() -> Option<Config> {
    candidates().into_iter().find_map(|path| parse(&path))
}

fn candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE)];

    if let Ok(dirs) = xdg::BaseDirectories::new() {
        paths.extend(dirs.find_config_file(CONFIG_FILE));
    }

    paths
}

fn parse(path: &Path) -> Option<Config> {
    let contents = std::fs::read_to_string(path).ok()?;

    match toml::from_str(&contents) {
        Ok(config) => {
            log::info!("audio config loaded from {}", path.display());
            Some(config)
        }
        Err(err) => {
            log::error!("ignoring malformed {}: {err}", path.display());
            None
        }
    }
}
