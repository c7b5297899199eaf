//! Error taxonomy for batch requests and remote calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while serving a batch.
///
/// Only `MalformedInput` ever aborts a whole batch; every other variant is
/// scoped to the single task that produced it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown marketplace '{0}'")]
    UnknownMarketplace(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Invalid request: {0}")]
    MalformedInput(String),

    #[error("Failed to set up client for {region}: {message}")]
    ClientSetup { region: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure reported by the remote marketplace API or the transport under it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Request failed with status {status}{}: {message}", code_suffix(.code))]
    Status { status: u16, code: Option<String>, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Host unreachable: {0}")]
    Unreachable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response body: {0}")]
    Decode(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({})", c)).unwrap_or_default()
}

/// Failure classes that are worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientSignature {
    RateLimited,
    ServerError,
    Timeout,
    Unreachable,
}

impl fmt::Display for TransientSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransientSignature::RateLimited => "rate limited",
            TransientSignature::ServerError => "server error",
            TransientSignature::Timeout => "timeout",
            TransientSignature::Unreachable => "unreachable",
        };
        write!(f, "{}", name)
    }
}

/// API error codes that mean "slow down" regardless of the HTTP status.
const THROTTLE_CODES: &[&str] = &["QuotaExceeded", "TooManyRequests", "RequestThrottled"];

/// API error codes that mean the service itself failed.
const SERVER_FAULT_CODES: &[&str] = &["InternalFailure", "ServiceUnavailable"];

impl RemoteError {
    /// Classifies this failure against the enumerated transient signatures.
    /// `None` means the failure is permanent and must not be retried.
    pub fn transient_signature(&self) -> Option<TransientSignature> {
        match self {
            RemoteError::Status { status, code, .. } => {
                let code = code.as_deref().unwrap_or_default();
                if *status == 429 || THROTTLE_CODES.contains(&code) {
                    Some(TransientSignature::RateLimited)
                } else if (500..=599).contains(status) || SERVER_FAULT_CODES.contains(&code) {
                    Some(TransientSignature::ServerError)
                } else {
                    None
                }
            }
            RemoteError::Timeout(_) => Some(TransientSignature::Timeout),
            RemoteError::Unreachable(_) => Some(TransientSignature::Unreachable),
            RemoteError::Transport(_) | RemoteError::Decode(_) => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.transient_signature().is_some()
    }

    /// HTTP status, when the failure came back as a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Kind tag carried by a failed task outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownMarketplace,
    RetriesExhausted,
    Remote,
    ClientSetup,
    MalformedInput,
    WorkerPanic,
}

/// Captured failure of a single task: what went wrong, never thrown further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), status: None }
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<RemoteError> for Failure {
    fn from(err: RemoteError) -> Self {
        // Transient failures only reach a task outcome once retries ran out
        let kind =
            if err.is_transient() { FailureKind::RetriesExhausted } else { FailureKind::Remote };
        Failure::new(kind, err.to_string()).with_status(err.status())
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        match err {
            Error::UnknownMarketplace(_) => {
                Failure::new(FailureKind::UnknownMarketplace, err.to_string())
            }
            Error::Remote(remote) => remote.into(),
            Error::MalformedInput(_) => Failure::new(FailureKind::MalformedInput, err.to_string()),
            Error::ClientSetup { .. } | Error::Config(_) => {
                Failure::new(FailureKind::ClientSetup, err.to_string())
            }
        }
    }
}
