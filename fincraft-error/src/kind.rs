//! Error kinds for fincraft operations

use std::fmt;

/// The kind of error that occurred.
///
/// This enum categorizes errors to help users write clear error handling logic.
/// Users can match on ErrorKind to decide how to handle specific error cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or format is not supported
    Unsupported,

    /// Invalid configuration or parameters
    ConfigInvalid,

    // =========================================================================
    // Completion gateway errors
    // =========================================================================
    /// LLM inference failed (API returned an error status)
    InferenceFailed,

    /// The model returned no choices
    EmptyResponse,

    /// Provider not available or unknown
    ProviderUnavailable,

    /// Rate limit exceeded
    RateLimited,

    /// API key missing or rejected
    AuthenticationFailed,

    /// Network error
    NetworkFailed,

    // =========================================================================
    // Tool errors
    // =========================================================================
    /// A tool implementation failed
    ToolFailed,

    /// The model asked for a tool that is not registered
    ToolUnknown,

    /// Invalid argument passed to a tool or function
    InvalidArgument,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    // =========================================================================
    // Parse errors
    // =========================================================================
    /// Failed to parse input
    ParseFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",

            // Gateway
            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::EmptyResponse => "EmptyResponse",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",

            // Tool
            ErrorKind::ToolFailed => "ToolFailed",
            ErrorKind::ToolUnknown => "ToolUnknown",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",

            // Parse
            ErrorKind::ParseFailed => "ParseFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InferenceFailed
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
                | ErrorKind::ProviderUnavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::FileNotFound.to_string(), "FileNotFound");
        assert_eq!(ErrorKind::ToolUnknown.to_string(), "ToolUnknown");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::NetworkFailed.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::FileNotFound.is_retryable());
        assert!(!ErrorKind::AuthenticationFailed.is_retryable());
    }
}
