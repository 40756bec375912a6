use thiserror::Error;

/// Errors raised while loading or validating client settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// An environment override could not be parsed.
    #[error("Invalid value '{value}' for {key}")]
    InvalidOverride { key: String, value: String },

    /// A setting holds a value the client cannot work with.
    #[error("Invalid setting '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}
