// haremote-api: WebSocket relay client for a home-automation hub.

pub mod auth;
pub mod connection;
pub mod error;
pub mod frontend;
pub mod protocol;

pub use auth::{CredentialSource, Credentials};
pub use connection::{Connection, ConnectionConfig, ConnectionState, ReconnectConfig};
pub use error::Error;
pub use frontend::{Frontend, HassOptions};
pub use protocol::Command;
