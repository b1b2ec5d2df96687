//! Error types
//!
//! Two layers of errors live here:
//!
//! - [`EmulatorError`] - failures raised inside the emulator (store, adapters, harness)
//! - [`Error`] - failures seen by code calling the SDK-shaped clients
//!
//! Adapters never hand an [`EmulatorError`] straight to client code. They render it as
//! the provider's own HTTP error body, which the clients decode back into
//! [`Error::Api`], so tests observe the same failure shape a real cloud would produce.

use crate::store::Provider;
use serde_json::Value;
use thiserror::Error;

/// Failures raised by the resource store, the provider adapters and the harness.
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// An instance with the same identity already exists in the scope.
    #[error("resource '{identity}' already exists in {scope}")]
    DuplicateIdentity { scope: String, identity: String },

    /// No resource with this identity exists in the scope.
    #[error("resource '{identity}' was not found in {scope}")]
    NotFound { scope: String, identity: String },

    /// The call is not modeled by the adapter.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The provider's dispatch slot already has a transport installed.
    #[error("{provider} interception is already active")]
    AlreadyActive { provider: Provider },

    /// The call arguments are malformed or incomplete.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The emulator could not produce a response.
    #[error("internal emulator error: {0}")]
    Internal(String),
}

impl EmulatorError {
    /// HTTP status code the adapters report for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            EmulatorError::DuplicateIdentity { .. } => 409,
            EmulatorError::NotFound { .. } => 404,
            EmulatorError::UnsupportedOperation(_) => 501,
            EmulatorError::InvalidArgument(_) => 400,
            EmulatorError::AlreadyActive { .. } | EmulatorError::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for EmulatorError {
    fn from(err: serde_json::Error) -> Self {
        EmulatorError::Internal(format!("serialization failed: {}", err))
    }
}

/// Failures seen by callers of the SDK-shaped clients.
#[derive(Debug, Error)]
pub enum Error {
    /// The API (real or emulated) answered with a non-success status.
    #[error("{provider} API error {status} ({code}): {message}")]
    Api {
        provider: Provider,
        status: u16,
        code: String,
        message: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded into the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// An access token could not be obtained.
    #[error("credential error: {0}")]
    Credential(String),

    /// A request URL could not be built.
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    /// The emulator itself refused the call.
    #[error(transparent)]
    Emulator(#[from] EmulatorError),
}

impl Error {
    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Provider error code of an API error (e.g. `ResourceNotFound`)
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// The call reached an emulator that does not model it
    pub fn is_unsupported(&self) -> bool {
        self.status() == Some(501)
    }

    /// API error for a failed response whose body is not the provider's error shape
    pub(crate) fn unrecognized(provider: Provider, status: u16, body: Option<&Value>) -> Self {
        let code = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown")
            .to_string();
        let message = match body {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Error::Api {
            provider,
            status,
            code,
            message,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
