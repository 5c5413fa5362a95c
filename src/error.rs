//! # Error Types
//!
//! One error enum for the whole crate. Every variant belongs to a diagnostic
//! [`ErrorCategory`], and the CLI turns the category into a process exit code.

use thiserror::Error;

/// Main error type for thermy operations
#[derive(Debug, Error)]
pub enum ThermyError {
    /// Bad user input: unreadable file, undecodable image, out-of-range flag.
    /// Raised before any Bluetooth activity.
    #[error("Input error: {0}")]
    Input(String),

    /// Bluetooth radio unavailable or scan failure
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Address unreachable, pairing failure or connection timeout
    #[error("Connection error: {0}")]
    Connection(String),

    /// Missing write characteristic, malformed frame or failed CRC self-check
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Writes kept failing after the retry budget was spent
    #[error("Transmission error: {0}")]
    Transmission(String),

    /// The job was interrupted before it completed
    #[error("Print job cancelled")]
    Cancelled,

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Diagnostic category of a [`ThermyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Discovery,
    Connection,
    Protocol,
    Transmission,
    Cancelled,
}

impl ThermyError {
    /// The diagnostic category this error reports under.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Input(_) | Self::Io(_) | Self::Image(_) => ErrorCategory::Input,
            Self::Discovery(_) => ErrorCategory::Discovery,
            Self::Connection(_) => ErrorCategory::Connection,
            Self::Protocol(_) => ErrorCategory::Protocol,
            Self::Transmission(_) => ErrorCategory::Transmission,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Process exit code for this error. Never zero.
    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }
}

impl ErrorCategory {
    /// Exit code used by the CLI for this category.
    ///
    /// | Category | Code |
    /// |----------|------|
    /// | Input | 2 |
    /// | Discovery | 3 |
    /// | Connection | 4 |
    /// | Protocol | 5 |
    /// | Transmission | 6 |
    /// | Cancelled | 130 |
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Input => 2,
            Self::Discovery => 3,
            Self::Connection => 4,
            Self::Protocol => 5,
            Self::Transmission => 6,
            Self::Cancelled => 130,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_input_errors() {
        let err = ThermyError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.category(), ErrorCategory::Input);
    }

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero() {
        let errors = [
            ThermyError::Input("x".into()),
            ThermyError::Discovery("x".into()),
            ThermyError::Connection("x".into()),
            ThermyError::Protocol("x".into()),
            ThermyError::Transmission("x".into()),
            ThermyError::Cancelled,
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_display_includes_category() {
        let err = ThermyError::Protocol("characteristic not found".into());
        assert_eq!(err.to_string(), "Protocol error: characteristic not found");
    }
}
