//! Command dispatch: bridges CLI args -> dashboard operations -> output.

pub mod call;
pub mod cards;
pub mod config_cmd;
pub mod set;
pub mod states;

use haremote_core::Dashboard;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a relay-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    dashboard: &Dashboard,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::States(args) => states::handle(dashboard, &args, global),
        Command::Card { entity_id } => cards::card(dashboard, &entity_id, global),
        Command::Cards(args) => cards::cards(dashboard, &args, global),
        Command::Watch(args) => cards::watch(dashboard, &args, global).await,
        Command::Call(args) => call::handle(dashboard, &args, global).await,
        Command::Set(args) => set::handle(dashboard, args, global).await,
        // Config and Completions never open a connection
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "does not use the relay".into(),
        }),
    }
}

/// Whether `cmd` renders from the entity store, so states must be loaded first.
pub fn needs_states(cmd: &Command) -> bool {
    !matches!(cmd, Command::Call(_))
}
