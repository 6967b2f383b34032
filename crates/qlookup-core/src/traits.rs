use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ConnectionSettings;
use crate::error::ServiceError;
use crate::types::{ExecutionStatus, PreparedStatementInfo, ResultSet, SubmitRequest};

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Remote interactive query service: submit, poll, fetch, and manage
/// named prepared statements.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Starts an execution and returns its handle.
    async fn submit_execution(&self, request: &SubmitRequest) -> ServiceResult<String>;
    async fn get_execution_status(&self, execution_id: &str) -> ServiceResult<ExecutionStatus>;
    /// First row is the header; at most `max_rows` data rows follow.
    async fn get_results(&self, execution_id: &str, max_rows: usize) -> ServiceResult<ResultSet>;
    /// `Ok(None)` when no statement with that name exists in the workgroup.
    async fn get_prepared_statement(&self, name: &str, workgroup: &str) -> ServiceResult<Option<PreparedStatementInfo>>;
    async fn create_prepared_statement(&self, name: &str, text: &str, workgroup: &str) -> ServiceResult<()>;
    async fn update_prepared_statement(&self, name: &str, text: &str, workgroup: &str) -> ServiceResult<()>;
}

/// Builds service clients for a set of connection settings.
pub trait ServiceFactory: Send + Sync {
    fn connect(&self, settings: &ConnectionSettings) -> anyhow::Result<Arc<dyn QueryService>>;
}
