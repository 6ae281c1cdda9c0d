//! `set` handler: activate a control on an entity's card.

use haremote_core::{Dashboard, Interaction};

use crate::cli::{GlobalOpts, SetAction, SetArgs};
use crate::error::CliError;
use crate::output;

impl From<SetAction> for Interaction {
    fn from(action: SetAction) -> Self {
        match action {
            SetAction::On => Interaction::Toggle(true),
            SetAction::Off => Interaction::Toggle(false),
            SetAction::Brightness { value } => Interaction::Brightness(value),
            SetAction::Mode { mode } => Interaction::Mode(mode),
            SetAction::Temperature { value } => Interaction::Temperature(value),
        }
    }
}

pub async fn handle(dashboard: &Dashboard, args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let card = dashboard.card(&args.entity_id)?;
    let call = card.interact(&args.action.into())?;

    // Rendered before sending; the hub confirms later via state_changed.
    let out = output::render_single(
        &global.output,
        &call,
        |c| format!("✓ {}.{} {}", c.domain, c.service, args.entity_id),
        |c| format!("{}.{}", c.domain, c.service),
    )?;

    dashboard.activate(call).await?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_map_to_interactions() {
        assert_eq!(Interaction::from(SetAction::Off), Interaction::Toggle(false));
        assert_eq!(
            Interaction::from(SetAction::Mode { mode: "cool".into() }),
            Interaction::Mode("cool".into())
        );
    }
}
