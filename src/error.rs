//! Error types for loading and playback

/// Error type for player operations
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    /// IO error from filesystem, network or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive or compressed stream could not be read
    #[error("Archive error: {0}")]
    Archive(String),

    /// Decoder rejected the file body
    #[error("Format error: {0}")]
    Format(String),

    /// No decoder matches the file name
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Audio sink could not be opened or written
    #[error("Audio device error: {0}")]
    Device(String),

    /// Invalid configuration or argument
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Operation needs a loaded file
    #[error("No file loaded")]
    NotLoaded,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PlayerError {
    /// True for errors caused by an unreachable or unreadable source.
    pub fn is_io(&self) -> bool {
        matches!(self, PlayerError::Io(_) | PlayerError::Archive(_))
    }
}

impl From<String> for PlayerError {
    fn from(msg: String) -> Self {
        PlayerError::Other(msg)
    }
}

impl From<&str> for PlayerError {
    fn from(msg: &str) -> Self {
        PlayerError::Other(msg.to_string())
    }
}

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;
