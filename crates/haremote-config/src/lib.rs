//! Shared configuration for the haremote CLI.
//!
//! TOML profiles, password resolution (env + keyring + plaintext), and
//! translation to `haremote_api::ConnectionConfig`. The CLI layers its
//! flag overrides on top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use haremote_api::{ConnectionConfig, CredentialSource, Credentials, ReconnectConfig};

const KEYRING_SERVICE: &str = "haremote";
const ENV_PREFIX: &str = "HAREMOTE_";
const PASSWORD_ENV: &str = "HAREMOTE_PASSWORD";
const EMAIL_ENV: &str = "HAREMOTE_EMAIL";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {what} configured for profile '{profile}'")]
    NoCredentials { profile: String, what: &'static str },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named relay profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name.to_owned(), p))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Seconds a command waits for its reply.
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,

    /// Seconds the CLI waits for the first authenticated session.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Linear backoff unit; attempt `n` waits `n` times this.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            command_timeout: default_command_timeout(),
            connect_timeout: default_connect_timeout(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_command_timeout() -> u64 {
    10
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_max_reconnect_attempts() -> u32 {
    5
}

/// A named relay profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Relay WebSocket URL (e.g., "wss://relay.example.com/ws/hub/").
    pub url: String,

    /// Site identifier sent with the handshake.
    #[serde(default = "default_site")]
    pub site_name: String,

    /// Login email.
    pub email: Option<String>,

    /// Password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Override the command timeout (seconds).
    pub command_timeout: Option<u64>,
}

fn default_site() -> String {
    "default".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "openpeerpower", "haremote").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("haremote");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file: defaults, then the file, then
/// `HAREMOTE_*` variables (`__` separates nested keys).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

fn keyring_password(profile_name: &str) -> Option<String> {
    keyring_entry(profile_name).ok()?.get_password().ok()
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password.expose_secret())?;
    Ok(())
}

/// Resolve the password: `password_env`, then `HAREMOTE_PASSWORD`, then
/// the keyring, then the plaintext entry.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |var| std::env::var(var).ok(),
        keyring_password,
    )
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(pw) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(pw));
    }

    // 2. Global env var
    if let Some(pw) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 3. System keyring
    if let Some(pw) = keyring(profile_name) {
        return Ok(SecretString::from(pw));
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
        what: "password",
    })
}

/// Resolve the full login (email + password) for a profile.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    let email = profile
        .email
        .clone()
        .or_else(|| std::env::var(EMAIL_ENV).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
            what: "email",
        })?;
    let password = resolve_password(profile, profile_name)?;
    Ok(Credentials { email, password })
}

/// Credential source bound to one profile.
///
/// The chain is re-run on every handshake, so a password rotated in the
/// keyring is picked up by the next reconnect.
#[derive(Debug, Clone)]
pub struct ProfileCredentials {
    name: String,
    profile: Profile,
}

impl ProfileCredentials {
    pub fn new(name: impl Into<String>, profile: Profile) -> Self {
        Self {
            name: name.into(),
            profile,
        }
    }
}

impl CredentialSource for ProfileCredentials {
    fn credentials(&self) -> Result<Credentials, haremote_api::Error> {
        resolve_credentials(&self.profile, &self.name).map_err(|e| {
            haremote_api::Error::Credentials {
                message: e.to_string(),
            }
        })
    }
}

// ── Connection config ───────────────────────────────────────────────

/// Build a `ConnectionConfig` from a profile and the global defaults.
pub fn profile_to_connection_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ConnectionConfig, ConfigError> {
    let url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {}", profile.url),
    })?;

    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("expected a ws:// or wss:// URL, got '{}'", url.scheme()),
        });
    }

    let mut config = ConnectionConfig::new(url, profile.site_name.clone());
    config.command_timeout =
        Duration::from_secs(profile.command_timeout.unwrap_or(defaults.command_timeout));
    config.connect_timeout = Duration::from_secs(defaults.connect_timeout);
    config.reconnect = ReconnectConfig {
        base_delay: Duration::from_millis(defaults.reconnect_delay_ms),
        max_attempts: defaults.max_reconnect_attempts,
    };
    Ok(config)
}
