use serde::Deserialize;
use serde_json::Value;

use qlookup_core::error::{Error, Result};
use qlookup_core::types::ExecutionHandle;

pub const CHECK_QUERY_STATUS: &str = "CHECK_QUERY_STATUS";

/// Messages a host sends back into a session after a lookup returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Re-check a suspended execution.
    CheckQueryStatus { execution_id: ExecutionHandle },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckQueryStatusBody {
    execution_id: ExecutionHandle,
}

impl InboundMessage {
    pub fn parse(message: &Value) -> Result<Self> {
        let action = message
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidMessage("message has no string 'action' field".into()))?;
        match action {
            CHECK_QUERY_STATUS => {
                let body = CheckQueryStatusBody::deserialize(message)
                    .map_err(|e| Error::InvalidMessage(format!("{CHECK_QUERY_STATUS}: {e}")))?;
                if body.execution_id.trim().is_empty() {
                    return Err(Error::InvalidMessage(format!("{CHECK_QUERY_STATUS}: executionId must not be empty")));
                }
                Ok(InboundMessage::CheckQueryStatus { execution_id: body.execution_id })
            }
            other => Err(Error::UnknownAction(other.to_string())),
        }
    }
}
