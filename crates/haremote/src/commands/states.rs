//! `states` handler.

use std::sync::Arc;

use tabled::Tabled;

use haremote_core::dashboard::in_domain;
use haremote_core::{Dashboard, EntityState};

use crate::cli::{DomainFilter, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Entity")]
    entity_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Last Changed")]
    last_changed: String,
}

impl From<&Arc<EntityState>> for StateRow {
    fn from(s: &Arc<EntityState>) -> Self {
        Self {
            entity_id: s.entity_id.clone(),
            name: s.friendly_name().to_owned(),
            state: s.state.clone(),
            last_changed: s
                .last_changed
                .map(|t| {
                    t.with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string()
                })
                .unwrap_or_default(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(dashboard: &Dashboard, args: &DomainFilter, global: &GlobalOpts) -> Result<(), CliError> {
    let states: Vec<_> = dashboard
        .store()
        .snapshot()
        .into_iter()
        .filter(|s| {
            args.domain
                .as_deref()
                .is_none_or(|d| in_domain(&s.entity_id, d))
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &states,
        |s| StateRow::from(s),
        |s| s.entity_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
