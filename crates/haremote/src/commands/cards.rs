//! `card`, `cards`, and `watch` handlers.

use tokio_stream::StreamExt;

use haremote_core::Dashboard;
use haremote_core::dashboard::in_domain;

use crate::cli::{DomainFilter, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn card(dashboard: &Dashboard, entity_id: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let card = dashboard.card(entity_id)?;
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &card,
        |c| output::card_text(c, color),
        |c| c.entity_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn cards(dashboard: &Dashboard, args: &DomainFilter, global: &GlobalOpts) -> Result<(), CliError> {
    let cards = dashboard.cards(args.domain.as_deref());
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        cards.as_slice(),
        |all| {
            all.iter()
                .map(|c| output::card_text(c, color))
                .collect::<Vec<_>>()
                .join("\n\n")
        },
        |all| {
            all.iter()
                .map(|c| c.entity_id.clone())
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Print the card of every entity whose state changes, until Ctrl-C.
pub async fn watch(dashboard: &Dashboard, args: &DomainFilter, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut changes = Box::pin(dashboard.changes());

    if !global.quiet {
        eprintln!("Watching for state changes (Ctrl-C to stop)...");
    }

    loop {
        let change = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = changes.next() => match next {
                Some(change) => change,
                None => break,
            },
        };

        if args
            .domain
            .as_deref()
            .is_some_and(|d| !in_domain(&change.entity_id, d))
        {
            continue;
        }

        let Some(ref state) = change.new_state else {
            output::print_output(&format!("{} removed", change.entity_id), global.quiet);
            continue;
        };

        let card = haremote_core::render(state);
        let out = output::render_single(
            &global.output,
            &card,
            |c| output::card_text(c, color),
            |c| format!("{} {}", c.entity_id, state.state),
        )?;
        output::print_output(&out, global.quiet);
    }
    Ok(())
}
