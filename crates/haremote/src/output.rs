//! Output formatting: table, JSON, plain, and card text.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use haremote_core::{Card, Element, Slider};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false)?,
        OutputFormat::JsonCompact => render_json(data, true)?,
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views don't use
/// the `Tabled` derive.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false)?,
        OutputFormat::JsonCompact => render_json(data, true)?,
        OutputFormat::Plain => id_fn(data),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let out = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(out)
}

// ── Cards ────────────────────────────────────────────────────────────

/// Text view of a card: a title line plus one indented line per element.
pub fn card_text(card: &Card, color: bool) -> String {
    let mut out = if color {
        format!("{} {}", card.title.bold(), card.entity_id.dimmed())
    } else {
        format!("{} ({})", card.title, card.entity_id)
    };

    for element in &card.elements {
        out.push_str("\n  ");
        let line = match element {
            Element::Toggle(t) => {
                let mark = if t.checked { "[on ]" } else { "[off]" };
                if color && t.checked {
                    format!("{} toggle", mark.green())
                } else {
                    format!("{mark} toggle")
                }
            }
            Element::Slider(s) => slider_text(s, color),
            Element::ModeSelect(m) => {
                let options: Vec<String> = m
                    .options
                    .iter()
                    .map(|o| match (o.selected, color) {
                        (true, true) => format!("{}", o.label.cyan().bold()),
                        (true, false) => format!("{}*", o.label),
                        (false, _) => o.label.clone(),
                    })
                    .collect();
                format!("Mode: {}", options.join(" | "))
            }
            Element::Reading { text } => format!("Current: {text}"),
            Element::StateText { text } => format!("State: {text}"),
        };
        out.push_str(&line);
    }
    out
}

fn slider_text(slider: &Slider, color: bool) -> String {
    let mut line = format!(
        "{}: {} ({}-{}, step {})",
        slider.label,
        number(slider.value),
        number(slider.min),
        number(slider.max),
        number(slider.step),
    );
    if slider.disabled {
        if color {
            let _ = write!(line, " {}", "disabled".dimmed());
        } else {
            line.push_str(" disabled");
        }
    }
    line
}

/// Integers without a trailing `.0`.
fn number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        v.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use haremote_core::{EntityState, render};
    use serde_json::json;

    #[test]
    fn light_card_text() {
        let card = render(
            &EntityState::new("light.kitchen", "off")
                .with_attribute("friendly_name", "Kitchen")
                .with_attribute("brightness", 128),
        );
        assert_eq!(
            card_text(&card, false),
            "Kitchen (light.kitchen)\n  [off] toggle\n  Brightness: 128 (0-255, step 1) disabled"
        );
    }

    #[test]
    fn climate_card_marks_selected_mode() {
        let card = render(
            &EntityState::new("climate.hall", "cool")
                .with_attribute("hvac_modes", json!(["heat", "cool"]))
                .with_attribute("current_temperature", 22)
                .with_attribute("temperature_unit", "C"),
        );
        let text = card_text(&card, false);
        assert!(text.contains("Current: 22°C"));
        assert!(text.contains("Mode: Heat | Cool*"));
    }

    #[test]
    fn plain_list_is_one_id_per_line() {
        #[derive(Tabled)]
        struct Row {
            id: String,
        }
        let ids = ["a".to_string(), "b".to_string()];
        let out = render_list(
            &OutputFormat::Plain,
            &ids,
            |s| Row { id: s.clone() },
            Clone::clone,
        )
        .unwrap();
        assert_eq!(out, "a\nb");
    }
}
