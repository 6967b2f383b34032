//! Submit-then-poll execution driver.
//!
//! Executions are driven purely by status polling. A run checks status at most
//! `max_attempts` times, sleeping `interval` between checks, so a caller blocks
//! for no longer than `max_attempts * interval` plus the remote call latency.
//! When the budget runs out the run yields [`ExecutionOutcome::Suspended`] with
//! the handle, which [`QueryRunner::resume`] accepts in any later invocation.

use std::time::Duration;
use tracing::{debug, warn};

use qlookup_core::config::LookupOptions;
use qlookup_core::error::{Error, Result, ServiceError};
use qlookup_core::traits::QueryService;
use qlookup_core::types::{ExecutionHandle, ExecutionOutcome, ExecutionStats, QueryState, SubmitRequest};

use crate::materialize::materialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self { Self { max_attempts: 10, interval: Duration::from_secs(3) } }
}

impl PollPolicy {
    pub fn from_options(options: &LookupOptions) -> Self {
        Self { max_attempts: options.poll_attempts.max(1), interval: options.poll_interval() }
    }

    /// Upper bound on time spent sleeping between status checks.
    pub fn max_blocking(&self) -> Duration { self.interval * self.max_attempts }
}

enum PollStep {
    Pending(ExecutionStats),
    Done(ExecutionOutcome),
}

pub struct QueryRunner<'a> {
    service: &'a dyn QueryService,
    row_limit: usize,
    policy: PollPolicy,
}

impl<'a> QueryRunner<'a> {
    pub fn new(service: &'a dyn QueryService, row_limit: usize, policy: PollPolicy) -> Self {
        Self { service, row_limit, policy }
    }

    /// Submits `query` and polls it to a terminal or suspended outcome.
    pub async fn run(&self, query: String, workgroup: &str, output_location: Option<&str>) -> Result<ExecutionOutcome> {
        let handle = self.submit(query, workgroup, output_location).await?;
        self.poll(handle).await
    }

    pub async fn submit(&self, query: String, workgroup: &str, output_location: Option<&str>) -> Result<ExecutionHandle> {
        let request = SubmitRequest { query, workgroup: workgroup.to_string(), output_location: output_location.map(str::to_string) };
        match self.service.submit_execution(&request).await {
            Ok(handle) => {
                debug!(%handle, workgroup, "submitted query execution");
                Ok(handle)
            }
            Err(e) => {
                warn!(error = %e, "query submission rejected");
                Err(submission_error(&e, output_location))
            }
        }
    }

    /// Polls an already submitted execution within the attempt budget.
    pub async fn poll(&self, handle: ExecutionHandle) -> Result<ExecutionOutcome> {
        let mut stats = ExecutionStats::default();
        for attempt in 1..=self.policy.max_attempts {
            match self.check(&handle).await? {
                PollStep::Done(outcome) => return Ok(outcome),
                PollStep::Pending(partial) => {
                    debug!(%handle, attempt, max_attempts = self.policy.max_attempts, "query execution still pending");
                    stats = partial;
                }
            }
            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.interval).await;
            }
        }
        warn!(%handle, attempts = self.policy.max_attempts, "poll budget exhausted, suspending");
        Ok(ExecutionOutcome::Suspended { handle, stats })
    }

    /// One status check on an existing handle, without resubmitting.
    pub async fn resume(&self, handle: ExecutionHandle) -> Result<ExecutionOutcome> {
        match self.check(&handle).await? {
            PollStep::Done(outcome) => Ok(outcome),
            PollStep::Pending(stats) => Ok(ExecutionOutcome::Suspended { handle, stats }),
        }
    }

    async fn check(&self, handle: &str) -> Result<PollStep> {
        let status = self.service.get_execution_status(handle).await?;
        let state: QueryState = status.state.parse()?;
        let stats = ExecutionStats::from(&status);
        let reason = || status.reason.clone().unwrap_or_else(|| format!("query {}", state.to_string().to_lowercase()));
        let step = match state {
            QueryState::Queued | QueryState::Running => PollStep::Pending(stats),
            QueryState::Succeeded => {
                let result = self.service.get_results(handle, self.row_limit).await?;
                let mut rows = materialize(result);
                rows.truncate(self.row_limit);
                debug!(%handle, rows = rows.len(), "query execution succeeded");
                PollStep::Done(ExecutionOutcome::Completed { handle: handle.to_string(), rows, stats })
            }
            QueryState::Failed => PollStep::Done(ExecutionOutcome::Failed { handle: handle.to_string(), reason: reason(), cancelled: false }),
            QueryState::Cancelled => PollStep::Done(ExecutionOutcome::Failed { handle: handle.to_string(), reason: reason(), cancelled: true }),
        };
        Ok(step)
    }
}

/// Turns a rejected submission into an actionable message where possible.
fn submission_error(err: &ServiceError, output_location: Option<&str>) -> Error {
    let lower = err.message.to_ascii_lowercase();
    if let Some(bucket) = bucket_name(&err.message) {
        return Error::RemoteSubmission(format!(
            "Output bucket '{bucket}' does not exist or is not accessible; check the output_location setting ({})",
            err.message
        ));
    }
    if output_location.is_none() && lower.contains("output location") {
        return Error::RemoteSubmission(format!(
            "No output location is configured and the workgroup provides none; set output_location ({})",
            err.message
        ));
    }
    Error::RemoteSubmission(err.to_string())
}

fn bucket_name(message: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets valid for slicing `message`.
    let lower = message.to_ascii_lowercase();
    let idx = lower.find("bucket ")?;
    let token = message[idx + "bucket ".len()..].split_whitespace().next()?;
    let name = token.trim_start_matches("s3://").trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_'));
    (!name.is_empty()).then(|| name.split('/').next().unwrap_or(name).to_string())
}
