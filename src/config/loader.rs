//! Deployment option loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::DeploymentOptions;
use crate::config::validation::{validate_options, ValidationError};

/// Error type for option loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate deployment options from TOML text.
pub fn parse_options(content: &str) -> Result<DeploymentOptions, ConfigError> {
    let opts: DeploymentOptions = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_options(&opts).map_err(ConfigError::Validation)?;
    Ok(opts)
}

/// Load and validate deployment options from a TOML file.
pub fn load_options(path: &Path) -> Result<DeploymentOptions, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_options(&content)
}
