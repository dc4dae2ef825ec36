use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::CanopyOptions;
use crate::config::ModuleId;

/// Errors raised while building the module tree or loading options.
///
/// All of them are fatal at startup; none can occur during dispatch.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },

    #[error("Invalid module tree configuration: no root module identified")]
    NoRoot,

    #[error("Invalid module tree configuration: multiple unparented modules {modules:?}")]
    MultipleRoots { modules: Vec<ModuleId> },

    #[error("Module '{module}' is registered more than once")]
    DuplicateModule { module: ModuleId },

    #[error("Module '{parent}' declares unregistered child '{child}'")]
    UnregisteredChild { parent: ModuleId, child: ModuleId },

    #[error("Module '{child}' is declared as a child of both '{first}' and '{second}'")]
    MultipleParents {
        child: ModuleId,
        first: ModuleId,
        second: ModuleId,
    },

    #[error("Modules {modules:?} are not reachable from the root (cyclic children?)")]
    Unreachable { modules: Vec<ModuleId> },

    #[error("Child module name '{module}' is reserved")]
    ReservedName { module: ModuleId },

    #[error("Malformed action spec at '{path}': {reason}")]
    MalformedActionSpec { path: String, reason: String },

    #[error("Module '{module}': {source}")]
    InvalidModule {
        module: ModuleId,
        #[source]
        source: Box<ConfigError>,
    },
}

impl CanopyOptions {
    /// Returns the path to the options file.
    ///
    /// Uses `~/.config/canopy/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("canopy").join("config.toml")
    }

    /// Loads options from the default file, or defaults when it is absent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(CanopyOptions::default());
        }

        Self::load_from(&path)
    }

    /// Loads and validates options from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let options: CanopyOptions =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

        options.validate()?;
        Ok(options)
    }

    /// Validates the options.
    ///
    /// Checks:
    /// - The inspector history keeps at least one action
    /// - The instance name is not blank
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devtools.max_age == 0 {
            return Err(ConfigError::ValidationError {
                message: "devtools.max_age must be at least 1".to_string(),
            });
        }

        if self.devtools.name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "devtools.name must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
