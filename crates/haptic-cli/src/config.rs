//! Configuration vault – reads/writes the rig's `haptic.toml`.

use haptic_runtime::SessionConfig;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "haptic.toml";

/// Path of the config file: the first command-line argument, or
/// `./haptic.toml`.
pub fn config_path(arg: Option<&str>) -> PathBuf {
    arg.map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load the config from `path`, falling back to defaults when the file does
/// not exist, then apply environment overrides.
pub fn load_from(path: &Path) -> Result<SessionConfig, String> {
    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?
    } else {
        SessionConfig::default()
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `HAPTIC_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `HAPTIC_LISTEN_PORT` | `sensor.listen_addr` (port only) |
/// | `HAPTIC_TELEMETRY_ADDR` | `recorder.telemetry_addr` |
/// | `HAPTIC_LOG_DIR` | `recorder.log_dir` |
/// | `HAPTIC_SEED` | `experiment.seed` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut SessionConfig) {
    if let Ok(v) = std::env::var("HAPTIC_LISTEN_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.sensor.listen_addr.set_port(port);
    }
    if let Ok(v) = std::env::var("HAPTIC_TELEMETRY_ADDR")
        && let Ok(addr) = v.parse::<SocketAddr>()
    {
        cfg.recorder.telemetry_addr = addr;
    }
    if let Ok(v) = std::env::var("HAPTIC_LOG_DIR")
        && !v.is_empty()
    {
        cfg.recorder.log_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("HAPTIC_SEED")
        && let Ok(seed) = v.parse::<u64>()
    {
        cfg.experiment.seed = Some(seed);
    }
}

/// Write `cfg` to `path`, creating parent directories.
pub fn save_to(cfg: &SessionConfig, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
