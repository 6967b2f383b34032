use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a remote query service call.
///
/// Transport-neutral: implementations of [`crate::traits::QueryService`]
/// translate their own client errors into this shape so nothing
/// transport-specific crosses the library boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{name}: {message}")]
pub struct ServiceError {
    pub name: String,
    pub message: String,
    pub request_id: Option<String>,
    pub status_code: Option<u16>,
}

impl ServiceError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into(), request_id: None, status_code: None }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Value '{value}' cannot be bound as {type_name}")]
    TypeCoercion { type_name: String, value: String },

    #[error("Query submission rejected: {0}")]
    RemoteSubmission(String),

    #[error("Query execution {handle} failed: {reason}")]
    RemoteExecutionFailure { handle: String, reason: String },

    #[error("Query execution {handle} was cancelled: {reason}")]
    RemoteExecutionCancelled { handle: String, reason: String },

    #[error("Unrecognized query execution state: {0}")]
    UnknownRemoteStatus(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl Error {
    /// Stable error name used in serialized payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Error::TypeCoercion { .. } => "TypeCoercionError",
            Error::RemoteSubmission(_) => "RemoteSubmissionError",
            Error::RemoteExecutionFailure { .. } => "RemoteExecutionFailure",
            Error::RemoteExecutionCancelled { .. } => "RemoteExecutionCancelled",
            Error::UnknownRemoteStatus(_) => "UnknownRemoteStatus",
            Error::Service(_) => "RemoteServiceError",
            Error::InvalidConfig(_) => "InvalidConfiguration",
            Error::UnknownAction(_) => "UnknownAction",
            Error::InvalidMessage(_) => "InvalidMessage",
        }
    }

    fn detail(&self) -> String {
        match self {
            Error::TypeCoercion { type_name, .. } => format!("Entity value is not a valid {type_name}"),
            Error::RemoteSubmission(msg) => msg.clone(),
            Error::RemoteExecutionFailure { reason, .. } | Error::RemoteExecutionCancelled { reason, .. } => reason.clone(),
            Error::UnknownRemoteStatus(state) => format!("Remote service reported state '{state}'"),
            Error::Service(e) => e.name.clone(),
            Error::InvalidConfig(msg) | Error::InvalidMessage(msg) => msg.clone(),
            Error::UnknownAction(action) => format!("Unknown action '{action}'"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Flat, serialization-safe error shape handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub name: String,
    pub message: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl From<&Error> for ErrorPayload {
    fn from(err: &Error) -> Self {
        let (request_id, status_code) = match err {
            Error::Service(e) => (e.request_id.clone(), e.status_code),
            _ => (None, None),
        };
        Self { name: err.name().to_string(), message: err.to_string(), detail: err.detail(), request_id, status_code }
    }
}

impl From<Error> for ErrorPayload {
    fn from(err: Error) -> Self { Self::from(&err) }
}
