use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data_dir;

#[derive(Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub game_install_dir: Option<PathBuf>,
}

pub fn config_path() -> PathBuf {
    data_dir::data_root().join("config.json")
}

pub fn load_config() -> AppConfig {
    read_config_from(&config_path())
}

pub fn save_config(config: &AppConfig) -> Result<(), String> {
    write_config_to(&config_path(), config)
}

fn read_config_from(path: &Path) -> AppConfig {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn write_config_to(path: &Path, config: &AppConfig) -> Result<(), String> {
    let json = serde_json::to_string_pretty(config).map_err(|e| e.to_string())?;
    std::fs::write(path, json).map_err(|e| e.to_string())
}
