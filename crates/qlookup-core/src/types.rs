//! Domain types shared by the query, formatting and orchestration crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Opaque identifier of one remote execution.
pub type ExecutionHandle = String;

/// One result row keyed by column name.
///
/// Materialized values are always `Value::String` (or `Value::Null` for SQL
/// NULL); the remote service reports every scalar as text.
pub type RowObject = serde_json::Map<String, serde_json::Value>;

/// A search input for which a query is executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub value: String,
}

impl Entity {
    pub fn new(value: impl Into<String>) -> Self { Self { value: value.into() } }
}

impl From<&str> for Entity {
    fn from(value: &str) -> Self { Self::new(value) }
}

/// Remote execution states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    pub fn is_pending(self) -> bool { matches!(self, QueryState::Queued | QueryState::Running) }
}

impl FromStr for QueryState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(QueryState::Queued),
            "RUNNING" => Ok(QueryState::Running),
            "SUCCEEDED" => Ok(QueryState::Succeeded),
            "FAILED" => Ok(QueryState::Failed),
            "CANCELLED" => Ok(QueryState::Cancelled),
            _ => Err(Error::UnknownRemoteStatus(s.to_string())),
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryState::Queued => "QUEUED",
            QueryState::Running => "RUNNING",
            QueryState::Succeeded => "SUCCEEDED",
            QueryState::Failed => "FAILED",
            QueryState::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Engine-reported counters. Every field is optional because the engine
/// only fills them in as the execution progresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatistics {
    pub data_scanned_bytes: Option<u64>,
    pub engine_execution_ms: Option<u64>,
    pub queue_ms: Option<u64>,
    pub planning_ms: Option<u64>,
    pub service_processing_ms: Option<u64>,
    pub total_execution_ms: Option<u64>,
}

/// Answer to a status request.
///
/// `state` stays raw text so that unrecognized values can be reported
/// instead of being silently mapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub state: String,
    pub reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub statistics: EngineStatistics,
}

/// Header row plus data rows as returned by the service. `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub rows: Vec<Vec<Option<String>>>,
}

/// Remote prepared statement as reported by an existence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedStatementInfo {
    pub name: String,
    pub query_text: String,
}

/// A request to start one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub query: String,
    pub workgroup: String,
    pub output_location: Option<String>,
}

/// Execution statistics surfaced to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub data_scanned_bytes: Option<u64>,
    pub engine_execution_ms: Option<u64>,
    pub queue_ms: Option<u64>,
    pub planning_ms: Option<u64>,
    pub service_processing_ms: Option<u64>,
    /// Wall-clock runtime: the engine's total when reported, otherwise
    /// completion minus submission time.
    pub runtime_ms: Option<u64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&ExecutionStatus> for ExecutionStats {
    fn from(status: &ExecutionStatus) -> Self {
        let s = &status.statistics;
        let derived = match (status.submitted_at, status.completed_at) {
            (Some(start), Some(end)) => u64::try_from((end - start).num_milliseconds()).ok(),
            _ => None,
        };
        Self {
            data_scanned_bytes: s.data_scanned_bytes,
            engine_execution_ms: s.engine_execution_ms,
            queue_ms: s.queue_ms,
            planning_ms: s.planning_ms,
            service_processing_ms: s.service_processing_ms,
            runtime_ms: s.total_execution_ms.or(derived),
            submitted_at: status.submitted_at,
            completed_at: status.completed_at,
        }
    }
}

/// Where an execution ended up after polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ExecutionOutcome {
    Completed { handle: ExecutionHandle, rows: Vec<RowObject>, stats: ExecutionStats },
    /// Poll budget exhausted while still queued or running. Not an error.
    Suspended { handle: ExecutionHandle, stats: ExecutionStats },
    Failed { handle: ExecutionHandle, reason: String, cancelled: bool },
}

impl ExecutionOutcome {
    pub fn handle(&self) -> &str {
        match self {
            ExecutionOutcome::Completed { handle, .. }
            | ExecutionOutcome::Suspended { handle, .. }
            | ExecutionOutcome::Failed { handle, .. } => handle,
        }
    }

    /// Converts a terminal failure into the matching error; other outcomes pass through.
    pub fn into_result(self) -> crate::error::Result<Self> {
        match self {
            ExecutionOutcome::Failed { handle, reason, cancelled: true } => Err(Error::RemoteExecutionCancelled { handle, reason }),
            ExecutionOutcome::Failed { handle, reason, cancelled: false } => Err(Error::RemoteExecutionFailure { handle, reason }),
            other => Ok(other),
        }
    }
}
