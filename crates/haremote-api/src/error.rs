use thiserror::Error;

/// Top-level error type for the `haremote-api` crate.
///
/// Covers the connection lifecycle (socket, handshake credentials) and
/// every way a correlated command can settle without a result.
/// `haremote-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// WebSocket connection failed (refused, DNS, upgrade rejected, I/O).
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the peer.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The credential collaborator could not produce login material.
    #[error("Credentials unavailable: {message}")]
    Credentials { message: String },

    /// The reconnect budget is spent; no further attempts will be made.
    #[error("Gave up after {attempts} reconnection attempts")]
    GaveUp { attempts: u32 },

    // ── Commands ────────────────────────────────────────────────────
    /// A command was attempted while the channel was not authenticated.
    #[error("Not connected")]
    NotConnected,

    /// The hub answered with `success: false`.
    #[error("Command {id} failed: {message}")]
    CommandFailed {
        id: u64,
        message: String,
        code: Option<String>,
    },

    /// No response arrived within the command timeout.
    #[error("Command {id} timed out after {timeout_ms}ms")]
    CommandTimeout { id: u64, timeout_ms: u64 },

    /// The socket carrying the command was torn down before a reply arrived.
    #[error("Connection lost before command {id} completed")]
    ConnectionLost { id: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// A frame could not be encoded as JSON.
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if retrying the same operation later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_)
                | Self::WebSocketClosed { .. }
                | Self::NotConnected
                | Self::CommandTimeout { .. }
                | Self::ConnectionLost { .. }
        )
    }

    /// The correlation id of the command this error settled, if any.
    pub fn command_id(&self) -> Option<u64> {
        match self {
            Self::CommandFailed { id, .. }
            | Self::CommandTimeout { id, .. }
            | Self::ConnectionLost { id } => Some(*id),
            _ => None,
        }
    }
}
