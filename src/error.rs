//! Error types for punar-io

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// punar-io error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or incomplete configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Transport failed to open
    #[error("Connection to {target} failed: {source}")]
    Connection {
        /// Target the transport was opened towards
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Transport send failure
    #[error("Send to {target} failed: {source}")]
    Send {
        /// Target the payload was addressed to
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Record could not be encoded for the wire
    #[error("Encode error: {0}")]
    Encode(String),

    /// Source file line could not be parsed
    #[error("Parse error in {file} line {line}: {reason}")]
    Parse {
        /// Source file being read
        file: String,
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
