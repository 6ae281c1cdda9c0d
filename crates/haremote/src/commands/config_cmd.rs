//! Config subcommand handlers.

use dialoguer::{Input, Select};
use secrecy::SecretString;

use haremote_config::{Config, Defaults, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_password(label: &str) -> Result<String, CliError> {
    let secret = rpassword::prompt_password(label).map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(secret)
}

/// Copy of `cfg` with plaintext passwords masked.
fn redacted(cfg: &Config) -> Config {
    let mut shown = cfg.clone();
    for profile in shown.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    shown
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("haremote -- configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let url: String = Input::new()
                .with_prompt("Relay URL")
                .default("wss://relay.example.com/ws/hub/".into())
                .interact_text()
                .map_err(prompt_err)?;

            let site_name: String = Input::new()
                .with_prompt("Site name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let email: String = Input::new()
                .with_prompt("Email")
                .interact_text()
                .map_err(prompt_err)?;

            let password = prompt_password("Password: ")?;

            let store_choices = &[
                "Store password in system keyring (recommended)",
                "Save to config file (plaintext)",
            ];
            let store_selection = Select::new()
                .with_prompt("Where to store the password?")
                .items(store_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            let password = if store_selection == 0 {
                haremote_config::store_password(&profile_name, &SecretString::from(password))?;
                eprintln!("   ✓ Password stored in system keyring");
                None
            } else {
                Some(password)
            };

            let profile = Profile {
                url,
                site_name,
                email: Some(email),
                password,
                password_env: None,
                command_timeout: None,
            };

            // Probe the URL before anything is written.
            haremote_config::profile_to_connection_config(&profile, &Defaults::default())?;

            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(profile_name.clone(), profile);
            cfg.default_profile = Some(profile_name.clone());

            config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: haremote states");

            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|_| format!("{c:#?}")),
                |c| {
                    let mut names: Vec<_> = c.profiles.keys().cloned().collect();
                    names.sort();
                    names.join("\n")
                },
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── SetPassword ─────────────────────────────────────────────
        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name =
                profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));

            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound { name: profile_name });
            }

            let password = prompt_password("Password: ")?;
            haremote_config::store_password(&profile_name, &SecretString::from(password))?;

            eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_plaintext_passwords() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                url: "ws://hub.local/ws/".into(),
                password: Some("hunter2".into()),
                ..Profile::default()
            },
        );

        let shown = redacted(&cfg);
        assert_eq!(shown.profiles["home"].password.as_deref(), Some(REDACTED));
        assert_eq!(cfg.profiles["home"].password.as_deref(), Some("hunter2"));
    }
}
