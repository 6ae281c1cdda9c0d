use secrecy::SecretString;

use crate::error::Error;

/// Login material sent in the `authenticate` handshake.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Where handshake credentials come from.
///
/// Resolved on every (re)connection, so a source backed by the keyring or
/// the environment picks up rotated secrets without restarting the relay.
pub trait CredentialSource: Send + Sync {
    fn credentials(&self) -> Result<Credentials, Error>;
}

impl CredentialSource for Credentials {
    fn credentials(&self) -> Result<Credentials, Error> {
        Ok(self.clone())
    }
}
