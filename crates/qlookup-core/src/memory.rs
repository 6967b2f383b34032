//! Deterministic in-process `QueryService`.
//!
//! Executions follow a [`Script`] chosen by matching the submitted query text:
//! a number of pending polls, then a terminal state. Every operation is counted
//! so tests can assert how many remote calls a code path made.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::ConnectionSettings;
use crate::error::ServiceError;
use crate::traits::{QueryService, ServiceFactory, ServiceResult};
use crate::types::{EngineStatistics, ExecutionStatus, PreparedStatementInfo, ResultSet, SubmitRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// Header row first, then data rows.
    Succeeded(Vec<Vec<Option<String>>>),
    Failed(String),
    Cancelled(String),
    /// Reports an arbitrary state string once pending polls are used up.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub pending_polls: usize,
    pub terminal: Terminal,
    pub statistics: EngineStatistics,
}

impl Script {
    pub fn succeed(header: &[&str], rows: &[&[&str]]) -> Self {
        let mut all = Vec::with_capacity(rows.len() + 1);
        if !header.is_empty() { all.push(header.iter().map(|h| Some((*h).to_string())).collect()); }
        for row in rows { all.push(row.iter().map(|v| Some((*v).to_string())).collect()); }
        Self::with_terminal(Terminal::Succeeded(all))
    }

    pub fn fail(reason: &str) -> Self { Self::with_terminal(Terminal::Failed(reason.to_string())) }
    pub fn cancel(reason: &str) -> Self { Self::with_terminal(Terminal::Cancelled(reason.to_string())) }
    pub fn raw_state(state: &str) -> Self { Self::with_terminal(Terminal::Raw(state.to_string())) }

    pub fn after_polls(mut self, pending_polls: usize) -> Self { self.pending_polls = pending_polls; self }
    pub fn with_statistics(mut self, statistics: EngineStatistics) -> Self { self.statistics = statistics; self }

    fn with_terminal(terminal: Terminal) -> Self { Self { pending_polls: 0, terminal, statistics: EngineStatistics::default() } }
}

/// Number of calls made per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub submit: usize,
    pub status: usize,
    pub results: usize,
    pub get_statement: usize,
    pub create_statement: usize,
    pub update_statement: usize,
}

struct Execution {
    script: Script,
    polls: usize,
    submitted_at: DateTime<Utc>,
}

struct State {
    next_id: u64,
    default_script: Script,
    scripts: Vec<(String, Script)>,
    submit_failures: Vec<(String, ServiceError)>,
    executions: HashMap<String, Execution>,
    statements: HashMap<(String, String), String>,
    submitted: Vec<SubmitRequest>,
    calls: CallCounts,
}

pub struct InMemoryQueryService {
    state: Mutex<State>,
}

impl Default for InMemoryQueryService {
    fn default() -> Self { Self::new() }
}

impl InMemoryQueryService {
    /// Every query succeeds immediately with an empty result set.
    pub fn new() -> Self { Self::with_default(Script::succeed(&[], &[])) }

    pub fn with_default(default_script: Script) -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 0,
                default_script,
                scripts: Vec::new(),
                submit_failures: Vec::new(),
                executions: HashMap::new(),
                statements: HashMap::new(),
                submitted: Vec::new(),
                calls: CallCounts::default(),
            }),
        }
    }

    /// Queries containing `needle` follow `script`. First registered match wins.
    pub fn on_query_containing(&self, needle: &str, script: Script) {
        self.lock().scripts.push((needle.to_string(), script));
    }

    /// Submissions of queries containing `needle` are rejected with `error`.
    pub fn reject_submission_containing(&self, needle: &str, error: ServiceError) {
        self.lock().submit_failures.push((needle.to_string(), error));
    }

    pub fn insert_statement(&self, name: &str, workgroup: &str, text: &str) {
        self.lock().statements.insert((workgroup.to_string(), name.to_string()), text.to_string());
    }

    pub fn statement_text(&self, name: &str, workgroup: &str) -> Option<String> {
        self.lock().statements.get(&(workgroup.to_string(), name.to_string())).cloned()
    }

    pub fn calls(&self) -> CallCounts { self.lock().calls }

    pub fn submitted(&self) -> Vec<SubmitRequest> { self.lock().submitted.clone() }

    fn lock(&self) -> MutexGuard<'_, State> { self.state.lock().unwrap_or_else(PoisonError::into_inner) }
}

fn not_found(execution_id: &str) -> ServiceError {
    ServiceError::new("InvalidRequestException", format!("QueryExecution {execution_id} was not found")).with_status_code(400)
}

#[async_trait]
impl QueryService for InMemoryQueryService {
    async fn submit_execution(&self, request: &SubmitRequest) -> ServiceResult<String> {
        let mut state = self.lock();
        state.calls.submit += 1;
        if let Some((_, err)) = state.submit_failures.iter().find(|(needle, _)| request.query.contains(needle.as_str())) {
            return Err(err.clone());
        }
        state.next_id += 1;
        let id = format!("exec-{:04}", state.next_id);
        let script = state
            .scripts
            .iter()
            .find(|(needle, _)| request.query.contains(needle.as_str()))
            .map_or_else(|| state.default_script.clone(), |(_, s)| s.clone());
        state.executions.insert(id.clone(), Execution { script, polls: 0, submitted_at: Utc::now() });
        state.submitted.push(request.clone());
        Ok(id)
    }

    async fn get_execution_status(&self, execution_id: &str) -> ServiceResult<ExecutionStatus> {
        let mut state = self.lock();
        state.calls.status += 1;
        let exec = state.executions.get_mut(execution_id).ok_or_else(|| not_found(execution_id))?;
        exec.polls += 1;
        let pending = exec.polls <= exec.script.pending_polls;
        let (state_name, reason) = if pending {
            (if exec.polls == 1 { "QUEUED" } else { "RUNNING" }.to_string(), None)
        } else {
            match &exec.script.terminal {
                Terminal::Succeeded(_) => ("SUCCEEDED".to_string(), None),
                Terminal::Failed(r) => ("FAILED".to_string(), Some(r.clone())),
                Terminal::Cancelled(r) => ("CANCELLED".to_string(), Some(r.clone())),
                Terminal::Raw(s) => (s.clone(), None),
            }
        };
        let completed_at = (!pending).then(|| exec.submitted_at + Duration::milliseconds(250));
        Ok(ExecutionStatus {
            state: state_name,
            reason,
            submitted_at: Some(exec.submitted_at),
            completed_at,
            statistics: exec.script.statistics.clone(),
        })
    }

    async fn get_results(&self, execution_id: &str, max_rows: usize) -> ServiceResult<ResultSet> {
        let mut state = self.lock();
        state.calls.results += 1;
        let exec = state.executions.get(execution_id).ok_or_else(|| not_found(execution_id))?;
        match &exec.script.terminal {
            Terminal::Succeeded(rows) if exec.polls > exec.script.pending_polls => {
                Ok(ResultSet { rows: rows.iter().take(max_rows.saturating_add(1)).cloned().collect() })
            }
            _ => Err(ServiceError::new("InvalidRequestException", format!("Query has not yet finished: {execution_id}"))),
        }
    }

    async fn get_prepared_statement(&self, name: &str, workgroup: &str) -> ServiceResult<Option<PreparedStatementInfo>> {
        let mut state = self.lock();
        state.calls.get_statement += 1;
        Ok(state
            .statements
            .get(&(workgroup.to_string(), name.to_string()))
            .map(|text| PreparedStatementInfo { name: name.to_string(), query_text: text.clone() }))
    }

    async fn create_prepared_statement(&self, name: &str, text: &str, workgroup: &str) -> ServiceResult<()> {
        let mut state = self.lock();
        state.calls.create_statement += 1;
        let key = (workgroup.to_string(), name.to_string());
        if state.statements.contains_key(&key) {
            return Err(ServiceError::new("InvalidRequestException", format!("Prepared statement {name} already exists")));
        }
        state.statements.insert(key, text.to_string());
        Ok(())
    }

    async fn update_prepared_statement(&self, name: &str, text: &str, workgroup: &str) -> ServiceResult<()> {
        let mut state = self.lock();
        state.calls.update_statement += 1;
        match state.statements.get_mut(&(workgroup.to_string(), name.to_string())) {
            Some(existing) => { *existing = text.to_string(); Ok(()) }
            None => Err(ServiceError::new("ResourceNotFoundException", format!("Prepared statement {name} not found"))),
        }
    }
}

/// Hands out the same shared service for every connection, counting connects.
pub struct InMemoryFactory {
    service: Arc<InMemoryQueryService>,
    connects: AtomicUsize,
}

impl InMemoryFactory {
    pub fn new(service: Arc<InMemoryQueryService>) -> Self { Self { service, connects: AtomicUsize::new(0) } }
    pub fn connects(&self) -> usize { self.connects.load(Ordering::SeqCst) }
}

impl ServiceFactory for InMemoryFactory {
    fn connect(&self, settings: &ConnectionSettings) -> anyhow::Result<Arc<dyn QueryService>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(region = %settings.region, "connecting in-memory query service");
        Ok(self.service.clone())
    }
}
