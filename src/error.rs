//! Error types for the stepctl library.
//!
//! Validation findings are deliberately *not* errors: the settings fix pass
//! always succeeds and reports its repairs as warning strings instead (see
//! [`crate::settings::Settings::fix`]).

use thiserror::Error;

/// Result type alias using the library's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all stepctl operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A USB request failed.  The context says which operation was being
    /// attempted; the message is the transport's own description.
    #[error("{context}  {message}")]
    Transport {
        /// What the library was doing when the transfer failed.
        context: String,
        /// The underlying transport error message.
        message: String,
    },

    /// A read returned fewer bytes than the fixed wire layout requires.
    /// Treated like a transport failure: it indicates a firmware mismatch
    /// or communication corruption.
    #[error("{context}  Expected {expected} bytes, got {actual}.")]
    ProtocolSize {
        /// What the library was reading when the short transfer happened.
        context: String,
        /// Number of bytes the layout requires.
        expected: usize,
        /// Number of bytes actually transferred.
        actual: usize,
    },

    /// An operation that needs an open device was invoked while the session
    /// is disconnected or in the connection-error state.
    #[error("Not connected to a device.")]
    NotConnected,

    /// No device matching the selection criteria was found.
    #[error("No device was found matching the specified criteria.")]
    NoDeviceFound,

    /// The settings document could not be parsed at all (malformed TOML).
    /// Unknown keys and out-of-range values never produce this; they are
    /// reported as warnings instead.
    #[error("Failed to parse the settings file: {0}")]
    SettingsParse(String),

    /// A file could not be read or written.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
