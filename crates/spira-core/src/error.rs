use std::fmt;

use thiserror::Error;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotConfigured,
    ConfigParseError,
    ArtifactNotFound,
    InvalidArtifactKey,
    FetchFailed,
    TotalFetchFailure,
    TaskCreateFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotConfigured => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ArtifactNotFound => "E2001",
            Self::InvalidArtifactKey => "E2002",
            Self::FetchFailed => "E3001",
            Self::TotalFetchFailure => "E3002",
            Self::TaskCreateFailed => "E4001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotConfigured => "Spira credentials not configured",
            Self::ConfigParseError => "Config file parse error",
            Self::ArtifactNotFound => "Artifact not found",
            Self::InvalidArtifactKey => "Invalid artifact key",
            Self::FetchFailed => "Failed to fetch artifacts",
            Self::TotalFetchFailure => "Unable to reach Spira",
            Self::TaskCreateFailed => "New task failed to beam up",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotConfigured => Some(
                "Run `spira config set credentials.url <URL>` (and username / api_key) first.",
            ),
            Self::ConfigParseError => Some("Fix syntax in the spira config.toml and retry."),
            Self::ArtifactNotFound => None,
            Self::InvalidArtifactKey => Some("Use TOKEN:ID, for example `TK:42` or `IN:7`."),
            Self::FetchFailed => Some("Check the Spira URL and that the server is reachable."),
            Self::TotalFetchFailure => Some(
                "Check the URL, username and RSS token (api key), then refresh manually.",
            ),
            Self::TaskCreateFailed => Some("Check that the project exists and you may add tasks."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure of one remote collection fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The server answered with an error status.
    #[error("server returned HTTP {0}")]
    Status(u16),
    /// The response carried no usable body.
    #[error("response body missing or not a JSON array")]
    MissingBody,
    /// The body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Machine-readable code associated with this fetch error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::FetchFailed
    }
}

/// A remote record that cannot become an [`Artifact`](crate::Artifact).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record field `{field}` is missing or not a positive integer")]
    BadId { field: &'static str },
}

/// Task creation did not produce the requested task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task name must not be empty")]
    EmptyName,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("server created '{actual}' instead of '{expected}'")]
    NameMismatch { expected: String, actual: String },
    #[error("server returned an unusable task: {0}")]
    Record(#[from] RecordError),
}

impl TaskError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::TaskCreateFailed
    }
}

/// A composite artifact key (`TK:42`) that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid artifact key '{raw}': expected TOKEN:ID with TOKEN one of RQ, TK, IN")]
pub struct KeyParseError {
    pub raw: String,
}

impl KeyParseError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidArtifactKey
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, FetchError, KeyParseError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotConfigured,
            ErrorCode::ConfigParseError,
            ErrorCode::ArtifactNotFound,
            ErrorCode::InvalidArtifactKey,
            ErrorCode::FetchFailed,
            ErrorCode::TotalFetchFailure,
            ErrorCode::TaskCreateFailed,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::TotalFetchFailure.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn fetch_error_display_mentions_status() {
        assert_eq!(FetchError::Status(503).to_string(), "server returned HTTP 503");
        assert_eq!(FetchError::Status(503).code(), ErrorCode::FetchFailed);
    }

    #[test]
    fn key_parse_error_carries_input() {
        let err = KeyParseError { raw: "XX:1".into() };
        assert!(err.to_string().contains("XX:1"));
        assert_eq!(err.code(), ErrorCode::InvalidArtifactKey);
    }
}
