//! Error types for the core crate.

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for configuration loading and action tree construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or inconsistent configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A mapper could not be built from its parameters
    #[error("Invalid {kind} mapper: {message}")]
    InvalidMapper { kind: &'static str, message: String },

    /// A trusted expression failed to compile
    #[error("Expression error: {0}")]
    Expression(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn mapper(kind: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidMapper {
            kind,
            message: message.into(),
        }
    }
}
