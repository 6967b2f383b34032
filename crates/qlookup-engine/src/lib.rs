//! Lookup orchestration: one explicitly owned session per configuration that
//! fans queries out across entities and resumes suspended executions.

pub mod message;
pub mod result;
pub mod session;

pub use message::InboundMessage;
pub use result::{DetailsPayload, EntityLookup, EntityResult, ResultData};
pub use session::LookupSession;
