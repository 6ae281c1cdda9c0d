//! CLI-side profile selection: applies global flag overrides on top of
//! what `haremote_config` loads, and builds the connection inputs.

use std::sync::Arc;

use haremote_api::{ConnectionConfig, CredentialSource};
use haremote_config::{Config, Profile, ProfileCredentials};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use haremote_config::{config_path, load_config_or_default, save_config};

/// Everything needed to open a relay connection.
pub struct Session {
    pub profile: String,
    pub connection: ConnectionConfig,
    pub credentials: Arc<dyn CredentialSource>,
}

/// `--profile`, then the config's default, then "default".
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Resolve the active profile with flag overrides applied.
///
/// Without a stored profile, `--url` alone is enough to build one.
pub fn resolve_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, cfg);

    let mut profile = match (cfg.profiles.get(&name), &global.url) {
        (Some(stored), _) => stored.clone(),
        (None, Some(_)) => Profile {
            site_name: "default".into(),
            ..Profile::default()
        },
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound { name });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(ref url) = global.url {
        profile.url.clone_from(url);
    }
    if let Some(ref site) = global.site {
        profile.site_name.clone_from(site);
    }
    if let Some(ref email) = global.email {
        profile.email = Some(email.clone());
    }

    Ok((name, profile))
}

/// Build the connection config and credential source for this run.
///
/// Credentials are resolved once up front so a missing password fails
/// immediately instead of exhausting the reconnect budget.
pub fn build_session(global: &GlobalOpts) -> Result<Session, CliError> {
    let cfg = load_config_or_default();
    let (name, profile) = resolve_profile(global, &cfg)?;

    let connection = haremote_config::profile_to_connection_config(&profile, &cfg.defaults)?;
    haremote_config::resolve_credentials(&profile, &name)?;

    tracing::debug!(
        profile = %name,
        url = %connection.url,
        site = %connection.site_name,
        "resolved session"
    );

    Ok(Session {
        profile: name.clone(),
        connection,
        credentials: Arc::new(ProfileCredentials::new(name, profile)),
    })
}
