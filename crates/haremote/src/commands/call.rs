//! `call` handler: raw service invocation.

use serde_json::{Map, Value};

use haremote_core::Dashboard;

use crate::cli::{CallArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

fn service_data(args: &CallArgs) -> Result<Map<String, Value>, CliError> {
    let mut data = match args.data.as_deref() {
        Some(raw) => match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            other => {
                return Err(CliError::Validation {
                    field: "--data".into(),
                    reason: format!("expected a JSON object, got {other}"),
                });
            }
        },
        None => Map::new(),
    };
    if let Some(ref entity) = args.entity {
        data.insert("entity_id".into(), Value::String(entity.clone()));
    }
    Ok(data)
}

pub async fn handle(dashboard: &Dashboard, args: &CallArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let data = service_data(args)?;
    let result = dashboard
        .call_service(&args.domain, &args.service, data)
        .await?;

    let out = output::render_single(
        &global.output,
        &result,
        |v| serde_json::to_string_pretty(v).unwrap_or_default(),
        Value::to_string,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
