// Configuration management module
// TOML settings plus the interactive setup flow

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    BoundaryConfig, Config, ConfigError, GeocoderConfig, HttpConfig, LlmConfig, OllamaConfig,
    TieBreak,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
