//! Get-or-create-or-update lifecycle for the one live prepared statement.
//!
//! The remote statement name is derived from a scope string. A local record of
//! the text last bound to that name short-circuits repeated calls; otherwise the
//! remote object is checked and created or repointed in place. Replaced
//! statements are never deleted remotely.

use std::hash::Hasher;
use tokio::sync::Mutex;
use tracing::{debug, info};
use twox_hash::XxHash64;

use qlookup_core::error::Result;
use qlookup_core::traits::QueryService;

const NAME_PREFIX: &str = "qlookup";
const MAX_SCOPE_CHARS: usize = 64;

/// Deterministic statement name for `scope`, restricted to `[a-z0-9_]`.
pub fn statement_name(scope: &str) -> String {
    let sanitized: String = scope
        .chars()
        .take(MAX_SCOPE_CHARS)
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(scope.as_bytes());
    format!("{}_{}_{:016x}", NAME_PREFIX, sanitized.trim_matches('_'), hasher.finish())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BoundStatement {
    workgroup: String,
    text: String,
}

pub struct PreparedStatementManager {
    name: String,
    // Held across the remote calls: one writer per scope at a time.
    bound: Mutex<Option<BoundStatement>>,
}

impl PreparedStatementManager {
    pub fn new(scope: &str) -> Self { Self { name: statement_name(scope), bound: Mutex::new(None) } }

    pub fn name(&self) -> &str { &self.name }

    /// Makes the remote statement represent `canonical` and returns its name.
    pub async fn ensure(&self, service: &dyn QueryService, workgroup: &str, canonical: &str) -> Result<&str> {
        let mut bound = self.bound.lock().await;
        let wanted = BoundStatement { workgroup: workgroup.to_string(), text: canonical.to_string() };
        if bound.as_ref() == Some(&wanted) {
            debug!(statement = %self.name, "prepared statement is current");
            return Ok(&self.name);
        }

        match service.get_prepared_statement(&self.name, workgroup).await? {
            Some(existing) if existing.query_text == canonical => {
                debug!(statement = %self.name, "remote prepared statement already matches");
            }
            Some(_) => {
                service.update_prepared_statement(&self.name, canonical, workgroup).await?;
                info!(statement = %self.name, workgroup, "updated prepared statement");
            }
            None => {
                service.create_prepared_statement(&self.name, canonical, workgroup).await?;
                info!(statement = %self.name, workgroup, "created prepared statement");
            }
        }
        *bound = Some(wanted);
        Ok(&self.name)
    }

    /// Forgets what the remote statement holds, e.g. after switching clients.
    pub fn invalidate(&mut self) { *self.bound.get_mut() = None; }

    /// `EXECUTE` statement running this prepared statement with `literals`.
    pub fn execute_statement(&self, literals: &[String]) -> String {
        if literals.is_empty() {
            format!("EXECUTE {}", self.name)
        } else {
            format!("EXECUTE {} USING {}", self.name, literals.join(", "))
        }
    }
}
