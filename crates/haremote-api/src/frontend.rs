//! The host-side collaborator the connection feeds.
//!
//! A frontend receives a [`HassOptions`] after every successful handshake
//! (its way of issuing service calls) and every pushed `state_changed`
//! payload. It is handed to [`Connection::connect`](crate::Connection::connect)
//! explicitly rather than located globally.

use serde_json::{Map, Value};

use crate::connection::Connection;
use crate::error::Error;
use crate::protocol::Command;

/// Host element wired to a [`Connection`].
pub trait Frontend: Send + Sync + 'static {
    /// Install the command entry points. Called after each authentication.
    fn set_options(&self, options: HassOptions);

    /// Apply a `state_changed` event's `data` object, verbatim.
    fn update_state(&self, data: Value);

    /// The connection has stopped for good; drop any held [`HassOptions`].
    fn detach(&self) {}
}

/// Command entry points handed to the frontend.
///
/// Each method routes through [`Connection::send_command`] and so shares
/// its fail-fast semantics.
#[derive(Clone)]
pub struct HassOptions {
    connection: Connection,
}

impl HassOptions {
    pub(crate) fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        service_data: Map<String, Value>,
    ) -> Result<Value, Error> {
        self.connection
            .send_command(Command::call_service(domain, service, service_data))
            .await
    }

    pub async fn get_states(&self) -> Result<Value, Error> {
        self.connection.send_command(Command::GetStates).await
    }

    pub async fn get_config(&self) -> Result<Value, Error> {
        self.connection.send_command(Command::GetConfig).await
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl std::fmt::Debug for HassOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = *self.connection.state().borrow();
        f.debug_struct("HassOptions").field("state", &state).finish()
    }
}
