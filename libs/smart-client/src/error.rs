//! Error types for the SMART client

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// SMART client errors
///
/// Variants hold plain strings so an error can be cloned into the state of a
/// callback handler or fetcher and read by several callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Missing iss or launch parameters")]
    MissingLaunchParameters,

    #[error("Failed to fetch SMART configuration: {0}")]
    DiscoveryFailure(String),

    #[error("State mismatch. Possible CSRF attack.")]
    CsrfMismatch,

    #[error("Authorization code is missing from the callback URL.")]
    MissingAuthorizationCode,

    #[error("Failed to exchange code for token: {message}")]
    TokenExchangeFailure {
        status: Option<u16>,
        message: String,
    },

    #[error("Missing credentials: {}", keys.join(", "))]
    MissingCredentials { keys: Vec<String> },

    #[error("Unsupported vital type: {0}")]
    UnsupportedVitalType(String),

    #[error("Invalid value for {code}: {value:?}")]
    InvalidVitalValue { code: String, value: String },

    #[error("Failed to fetch {resource}: {message}")]
    FetchFailure {
        resource: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to create Observation: {message}")]
    CreateFailure {
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP client error: {0}")]
    Http(String),
}

impl Error {
    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::TokenExchangeFailure { status, .. }
            | Error::FetchFailure { status, .. }
            | Error::CreateFailure { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn storage(err: impl std::fmt::Display) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

/// `"<code> <reason>"` for a non-success response
pub(crate) fn status_line(status: reqwest::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
