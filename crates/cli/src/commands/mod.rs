pub mod config_cmd;
pub mod generate;
pub mod history;
pub mod init;
pub mod models;

use bolty_config::{AppConfig, ConfigError};
use bolty_core::store::ConversationStore;
use bolty_store::{FileStore, InMemoryStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Path of the config file in use.
pub fn config_file(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load the config from `explicit` (or the default location) with env overrides applied.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match explicit {
        None => AppConfig::load(),
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
    }
}

/// Open the configured conversation store.
pub fn open_store(
    config: &AppConfig,
) -> Result<Arc<dyn ConversationStore>, Box<dyn std::error::Error>> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        _ => Ok(Arc::new(FileStore::open(config.store_path())?)),
    }
}
