// ── Core error types ──
//
// User-facing errors from haremote-core. Consumers never see raw socket
// or JSON failures; the `From<haremote_api::Error>` impl translates
// transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Not connected to the hub")]
    NotConnected,

    #[error("Connection to the hub failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Invalid entity id {value:?}: expected <domain>.<object_id>")]
    InvalidEntityId { value: String },

    #[error("Entity not found: {entity_id}")]
    EntityNotFound { entity_id: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Rejected by hub: {message}")]
    Rejected {
        message: String,
        /// The hub-provided error code, if any.
        code: Option<String>,
    },

    #[error("{entity_id} has no active {control} control")]
    InertControl { entity_id: String, control: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<haremote_api::Error> for CoreError {
    fn from(err: haremote_api::Error) -> Self {
        use haremote_api::Error as Api;

        match err {
            Api::NotConnected => CoreError::NotConnected,
            Api::CommandFailed { message, code, .. } => CoreError::Rejected { message, code },
            Api::CommandTimeout { timeout_ms, .. } => CoreError::Timeout { timeout_ms },
            Api::ConnectionLost { id } => CoreError::ConnectionFailed {
                reason: format!("connection lost before command {id} completed"),
            },
            Api::WebSocketConnect(reason) => CoreError::ConnectionFailed { reason },
            Api::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                reason: format!("socket closed (code {code}): {reason}"),
            },
            Api::GaveUp { attempts } => CoreError::ConnectionFailed {
                reason: format!("gave up after {attempts} reconnection attempts"),
            },
            Api::Credentials { message } => CoreError::ConnectionFailed {
                reason: format!("credentials unavailable: {message}"),
            },
            Api::Encode(e) => CoreError::Internal(format!("failed to encode frame: {e}")),
        }
    }
}
