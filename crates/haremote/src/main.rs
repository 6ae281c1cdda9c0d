mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use haremote_api::Connection;
use haremote_core::Dashboard;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a relay connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "haremote", &mut std::io::stdout());
            Ok(())
        }

        // All other commands go through the relay
        cmd => {
            let session = config::build_session(&cli.global)?;
            let dashboard = Arc::new(Dashboard::new());
            let connection = Connection::connect(
                session.connection,
                session.credentials,
                dashboard.clone(),
                CancellationToken::new(),
            );

            let result = async {
                authenticate(&connection, &session.profile, &cli.global).await?;
                if commands::needs_states(&cmd) {
                    dashboard.load_states().await?;
                }
                tracing::debug!(command = ?cmd, "dispatching command");
                commands::dispatch(cmd, &dashboard, &cli.global).await
            }
            .await;

            connection.shutdown();
            result
        }
    }
}

/// Wait for the first authenticated session, with a spinner on a TTY.
async fn authenticate(
    connection: &Connection,
    profile: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let spinner = (!global.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Connecting to {}", connection.config().url));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let waited = tokio::time::timeout(
        Duration::from_secs(global.timeout),
        connection.wait_authenticated(),
    )
    .await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match waited {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(CliError::ConnectionFailed {
            url: connection.config().url.to_string(),
            source: Box::new(e),
        }),
        Err(_) => Err(CliError::AuthTimeout {
            seconds: global.timeout,
            profile: profile.to_owned(),
        }),
    }
}
