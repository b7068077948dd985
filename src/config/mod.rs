// Configuration management module
// Secrets come from the environment, tuning knobs from config.toml

pub mod display;
pub mod secrets;
pub mod settings;


pub use display::{init_config, render_config, show_config};
pub use secrets::Secrets;
pub use settings::{
    Config, ConfigError, IngestConfig, OpenAiConfig, ServerConfig, StoreBackend,
    VectorStoreConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
