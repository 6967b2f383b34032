use serde::Serialize;

use qlookup_core::error::{ErrorPayload, Result};
use qlookup_core::types::{Entity, ExecutionHandle, ExecutionOutcome, ExecutionStats};
use qlookup_format::{Details, Projector};

pub const RUNNING_TAG: &str = "Query still running";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsPayload {
    pub show_as_json: bool,
    pub results: Details,
    /// False while the execution is suspended and must be resumed later.
    pub complete: bool,
    pub execution_handle: ExecutionHandle,
    pub execution_stats: ExecutionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultData {
    pub summary: Vec<String>,
    pub details: DetailsPayload,
}

/// Outcome for one entity. `data` is `None` when the query returned no rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityResult {
    pub entity: Entity,
    pub data: Option<ResultData>,
}

/// Per-entity outcome when failures are isolated instead of failing the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityLookup {
    pub entity: Entity,
    pub result: std::result::Result<Option<ResultData>, ErrorPayload>,
}

/// Renders an execution outcome. Fresh lookups and resumptions share this path.
pub fn format_outcome(projector: &Projector, outcome: ExecutionOutcome) -> Result<Option<ResultData>> {
    match outcome {
        ExecutionOutcome::Completed { rows, .. } if rows.is_empty() => Ok(None),
        ExecutionOutcome::Completed { handle, rows, stats } => {
            let details = projector.details(&rows);
            Ok(Some(ResultData {
                summary: projector.summary_tags(&rows),
                details: DetailsPayload {
                    show_as_json: details.show_as_json(),
                    results: details,
                    complete: true,
                    execution_handle: handle,
                    execution_stats: stats,
                },
            }))
        }
        ExecutionOutcome::Suspended { handle, stats } => Ok(Some(ResultData {
            summary: vec![RUNNING_TAG.to_string()],
            details: DetailsPayload {
                show_as_json: false,
                results: Details::Documents(Vec::new()),
                complete: false,
                execution_handle: handle,
                execution_stats: stats,
            },
        })),
        failed @ ExecutionOutcome::Failed { .. } => failed.into_result().map(|_| None),
    }
}
