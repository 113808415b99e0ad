use std::path::PathBuf;
use thiserror::Error;

/// Failure to build a simulation from its configuration.
///
/// Every variant is fatal at construction: a configuration is either
/// applied in full or rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("invalid driver correlation matrix: {reason}")]
    Correlation { reason: String },

    #[error("failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field, when the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::InvalidField { field, .. } => Some(field),
            ConfigError::Correlation { .. } => Some("drivers.correlation"),
            _ => None,
        }
    }
}
