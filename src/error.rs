use miette::Diagnostic;
use thiserror::Error;

/// Main error type for wordwatch operations
#[derive(Error, Debug, Diagnostic)]
pub enum WatchError {
    #[error("Storage error")]
    #[diagnostic(help("Check the watch file path and its permissions"))]
    Store(#[from] StoreError),

    #[error("Discord error")]
    #[diagnostic(help("Check Discord bot token and permissions"))]
    Discord(#[from] DiscordError),

    #[error("Configuration error")]
    #[diagnostic(help("Check your configuration file"))]
    Config(#[from] ConfigError),
}

/// Errors from the registration store
#[derive(Error, Debug, Diagnostic)]
pub enum StoreError {
    #[error("Failed to read watch file at {path}")]
    #[diagnostic(
        code(wordwatch::store::read_failed),
        help("Ensure the file is readable; a missing file is fine, an unreadable one is not")
    )]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Watch file at {path} is not valid JSON")]
    #[diagnostic(
        code(wordwatch::store::parse_failed),
        help("The file may have been edited by hand; fix or delete it")
    )]
    ParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write watch file at {path}")]
    #[diagnostic(
        code(wordwatch::store::write_failed),
        help("Ensure the directory exists and is writable")
    )]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize registration table")]
    #[diagnostic(code(wordwatch::store::serialize_failed))]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },
}

/// Discord-specific errors
#[derive(Error, Debug, Diagnostic)]
pub enum DiscordError {
    #[error("Discord bot token not configured")]
    #[diagnostic(
        code(wordwatch::discord::no_token),
        help("Set DISCORD_TOKEN in .env or config file")
    )]
    NoToken,

    #[error("Failed to connect to Discord")]
    #[diagnostic(
        code(wordwatch::discord::connection_failed),
        help("Check bot token and network connection")
    )]
    ConnectionFailed {
        #[source]
        source: serenity::Error,
    },

    #[error("Discord error: {0}")]
    #[diagnostic()]
    Other(#[from] serenity::Error),
}

/// Configuration errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Configuration file not found at {path}")]
    #[diagnostic(
        code(wordwatch::config::not_found),
        help("Create a config file or use environment variables")
    )]
    NotFound { path: String },

    #[error("Invalid configuration")]
    #[diagnostic(
        code(wordwatch::config::invalid),
        help("Check configuration format and required fields")
    )]
    Invalid { field: String, reason: String },

    #[error("Failed to parse configuration")]
    #[diagnostic(
        code(wordwatch::config::parse_failed),
        help("Check TOML syntax and field types")
    )]
    ParseFailed {
        #[source]
        source: toml::de::Error,
    },
}

/// Type alias for Results in wordwatch
pub type Result<T> = std::result::Result<T, WatchError>;
