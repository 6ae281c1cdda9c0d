//! JSON wire messages exchanged with the hub relay.
//!
//! Every frame is a JSON object with a `type` tag. Outbound commands carry
//! a numeric `id` that the hub echoes back in its `result` frame.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fallback failure text when the hub omits `error.message`.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Command failed";

/// Event type forwarded to the frontend.
pub const STATE_CHANGED: &str = "state_changed";

// ── Outbound ─────────────────────────────────────────────────────────

/// Login handshake, sent once right after the socket opens.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "authenticate")]
pub(crate) struct Authenticate<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub site_name: &'a str,
}

/// A request to the hub. Each one gets exactly one `result` frame back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    CallService {
        domain: String,
        service: String,
        service_data: Map<String, Value>,
    },
    GetStates,
    GetConfig,
}

impl Command {
    pub fn call_service(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: Map<String, Value>,
    ) -> Self {
        Self::CallService {
            domain: domain.into(),
            service: service.into(),
            service_data,
        }
    }

    /// Wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CallService { .. } => "call_service",
            Self::GetStates => "get_states",
            Self::GetConfig => "get_config",
        }
    }
}

/// A command stamped with its correlation id.
#[derive(Debug, Serialize)]
pub(crate) struct CommandFrame<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub command: &'a Command,
}

// ── Inbound ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Inbound {
    AuthSuccess,
    Result(CommandResult),
    Event { event: EventPayload },
    #[serde(other)]
    Other,
}

/// Reply to a previously sent [`Command`].
///
/// `error` is kept loose: the hub may send an object with any field types,
/// or a bare string. A `success: false` reply always rejects its waiter.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResult {
    pub id: u64,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventPayload {
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl CommandResult {
    /// Collapse the reply into the payload or a [`CommandFailed`](crate::Error::CommandFailed).
    pub fn into_result(self) -> Result<Value, crate::Error> {
        if self.success {
            return Ok(self.result.unwrap_or(Value::Null));
        }

        let error = self.error.unwrap_or(Value::Null);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_FAILURE_MESSAGE)
            .to_owned();
        let code = error.get("code").and_then(|c| match c {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Err(crate::Error::CommandFailed {
            id: self.id,
            message,
            code,
        })
    }
}
