pub mod ask;
pub mod doctor;
pub mod init;
pub mod search;
pub mod serve;

use std::path::{Path, PathBuf};

use coursemate_config::AppConfig;

/// The config file a command reads: the explicit `--config` path or the default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load config with environment overrides applied.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit);
    AppConfig::load_with_env(&path).map_err(|e| format!("Failed to load config: {e}").into())
}
