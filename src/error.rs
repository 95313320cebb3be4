//! Error types for the client library.
//!
//! Three failure classes exist: transport errors (fatal to the connection),
//! parse errors (skippable, the read loop stays alive), and membership
//! errors (recoverable, the caller decides).

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol and transport errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream.
    #[error("connection reset by peer")]
    ConnectionReset,

    /// A received line was not valid UTF-8.
    #[error("decode error: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// Line exceeded the maximum allowed length.
    #[error("message too long: {actual} bytes (limit: {limit})")]
    MessageTooLong {
        /// Actual line length in bytes.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Failed to parse a line as an IRC message.
    #[error("invalid message: {string:?}")]
    InvalidMessage {
        /// The offending line.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },
}

impl ProtocolError {
    /// Whether the read loop may skip past this error and keep going.
    ///
    /// Parse-class errors poison a single line, not the stream; I/O errors
    /// and end-of-stream are fatal to the connection.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::Decode(_)
                | ProtocolError::MessageTooLong { .. }
                | ProtocolError::InvalidMessage { .. }
        )
    }
}

/// Errors encountered when parsing a single IRC line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// The line was empty after trimming CR/LF and leading spaces.
    #[error("empty message")]
    EmptyMessage,

    /// The command token was missing or malformed.
    ///
    /// A command must be a run of ASCII letters or exactly three digits.
    #[error("invalid or missing command")]
    InvalidCommand,
}

/// Errors returned by channel membership operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChannelError {
    /// The referenced channel is not tracked.
    ///
    /// Distinguishes "never joined" from "joined but empty", which returns
    /// an empty, non-error snapshot.
    #[error("channel not found: {0}")]
    NotFound(String),
}

/// Error from a batch send that failed partway through.
///
/// `sent` reports how many messages were fully written before the failure.
#[derive(Debug, Error)]
#[error("batch send failed after {sent} messages")]
pub struct SendError {
    /// Number of messages fully sent before the failure.
    pub sent: usize,
    /// The error that stopped the batch.
    #[source]
    pub source: ProtocolError,
}
