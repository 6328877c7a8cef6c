use thiserror::Error;

/// Application-level errors using thiserror for structured error handling.
///
/// These errors represent domain-specific failures that can occur during
/// application operation. They provide context and can be chained with anyhow.
/// A rejected audio link is not an error; see [`crate::link_resolver::ResolvedLink`].

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Failed to load audio from {uri}: {message}")]
    LoadFailed { uri: String, message: String },

    #[error("Failed to decode audio from {uri}: {message}")]
    DecodeFailed { uri: String, message: String },

    #[error("Failed to initialize audio output stream: {0}")]
    StreamInitFailed(String),

    #[error("Audio playback failed: {0}")]
    PlaybackFailed(String),

    #[error("No audio resource is loaded")]
    NotLoaded,
}

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse response from {url}")]
    Parse {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to write download to {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Audio link was rejected: {0}")]
    Rejected(String),

    #[error("Failed to create cache directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Download into cache failed")]
    DownloadFailed(#[source] HttpError),

    #[error("Failed to move finished download into {path}")]
    PersistFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("A content type is required (e.g. music, sermons)")]
    MissingKind,

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch {kind}")]
    FetchFailed {
        kind: String,
        #[source]
        source: HttpError,
    },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to create download directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Download failed")]
    DownloadFailed(#[source] HttpError),

    #[error("Failed to hand {path} to the share action: {message}")]
    ShareFailed { path: String, message: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine the platform config directory")]
    NoConfigDir,

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
