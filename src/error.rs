// Error types for configuration, creature loading, spawning and score persistence.

use std::path::PathBuf;

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The platform auth token is absent or empty.
    #[error("BOT_TOKEN is not set")]
    MissingToken,

    /// A configuration value could not be parsed or is out of range.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Errors raised while loading creature definitions.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The creature directory (or a file in it) could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A creature file is not valid JSON for a creature definition.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A creature file is missing a required field (or it is empty).
    #[error("{path} is missing required field `{field}`")]
    MissingField { path: PathBuf, field: &'static str },

    /// Two creature files declare the same name.
    #[error("duplicate creature name {0:?}")]
    DuplicateName(String),
}

/// Errors returned by spawn triggers. These are reported to the invoking
/// channel and never stop the bot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    /// No spawn channel has been configured yet.
    #[error("no spawn channel configured")]
    NotConfigured,

    /// A creature is already out and has not been caught.
    #[error("a {0} penguin is already active")]
    AlreadyActive(String),

    /// The registry holds no creatures to choose from.
    #[error("no creatures are registered")]
    EmptyRegistry,

    /// The configured channel could not be resolved by the sink.
    #[error("spawn channel {0} is unreachable")]
    Unreachable(String),
}

/// Score persistence errors. The in-memory scores stay authoritative.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("score file I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("score file serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors delivering an outbound message to the chat gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("channel {0} is unknown to the gateway")]
    UnknownChannel(String),

    #[error("no gateway is connected")]
    Disconnected,
}
