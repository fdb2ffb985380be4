//! Config file source: an explicit TOML file, or ./checkoutfs.toml when present

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::{File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file picked up from the working directory when none is given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("checkoutfs.toml")
}

/// Add the config file source to builder.
///
/// An explicitly named file must exist; the default file is optional.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    explicit: Option<&Path>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            debug!(config_path = %path.display(), "Loading configuration file");
            Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(true)))
        }
        None => {
            let path = default_config_path();
            if path.exists() {
                debug!(config_path = %path.display(), "Loading configuration file");
            }
            Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(false)))
        }
    }
}
