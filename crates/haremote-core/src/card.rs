// ── Entity cards ──
//
// `render` maps one entity snapshot to a card: a title plus a list of
// controls. Controls carry their own binding and turn a user interaction
// into a `ServiceCall`. Nothing here touches the connection, and the
// displayed state only moves when the hub pushes a new snapshot.

use serde::Serialize;
use serde_json::{Map, Value, json};

use haremote_api::Command;

use crate::error::CoreError;
use crate::model::{Domain, EntityState};

const BRIGHTNESS_MIN: f64 = 0.0;
const BRIGHTNESS_MAX: f64 = 255.0;
const TEMPERATURE_STEP: f64 = 0.5;
const MISSING_READING: &str = "--";

// ── Service calls ───────────────────────────────────────────────────

/// Hub services a card control can issue.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Service {
    TurnOn,
    TurnOff,
    SetHvacMode,
    SetTemperature,
}

/// A service invocation produced by a control interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCall {
    #[serde(serialize_with = "serialize_domain")]
    pub domain: Domain,
    pub service: Service,
    pub data: Map<String, Value>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_domain<S: serde::Serializer>(domain: &Domain, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(domain.as_ref())
}

impl ServiceCall {
    fn new(domain: Domain, service: Service, entity_id: &str) -> Self {
        let mut data = Map::new();
        data.insert("entity_id".into(), Value::String(entity_id.to_owned()));
        Self {
            domain,
            service,
            data,
        }
    }

    fn with(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// The `entity_id` this call targets.
    pub fn entity_id(&self) -> Option<&str> {
        self.data.get("entity_id").and_then(Value::as_str)
    }
}

impl From<ServiceCall> for Command {
    fn from(call: ServiceCall) -> Self {
        Command::call_service(call.domain.as_ref(), call.service.as_ref(), call.data)
    }
}

// ── Controls ────────────────────────────────────────────────────────

/// On/off switch for lights and switches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toggle {
    pub entity_id: String,
    #[serde(serialize_with = "serialize_domain")]
    pub domain: Domain,
    pub checked: bool,
}

impl Toggle {
    /// The call issued when the user flips the toggle to `checked`.
    pub fn change(&self, checked: bool) -> ServiceCall {
        let service = if checked {
            Service::TurnOn
        } else {
            Service::TurnOff
        };
        ServiceCall::new(self.domain, service, &self.entity_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SliderKind {
    Brightness,
    Temperature,
}

/// Bounded numeric control.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slider {
    pub entity_id: String,
    pub kind: SliderKind,
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub value: f64,
    pub disabled: bool,
}

impl Slider {
    /// Clamps `value` into `[min, max]`. Never panics, even when the hub
    /// reports inverted bounds.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    /// The call issued when the user releases the slider at `value`.
    ///
    /// Returns `None` for a disabled slider.
    pub fn change(&self, value: f64) -> Option<ServiceCall> {
        if self.disabled {
            return None;
        }
        let value = self.clamp(value);
        let call = match self.kind {
            SliderKind::Brightness => {
                #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
                let level = value.round() as i64;
                ServiceCall::new(Domain::Light, Service::TurnOn, &self.entity_id)
                    .with("brightness", json!(level))
            }
            SliderKind::Temperature => {
                ServiceCall::new(Domain::Climate, Service::SetTemperature, &self.entity_id)
                    .with("temperature", json!(value))
            }
        };
        Some(call)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// HVAC mode picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeSelect {
    pub entity_id: String,
    pub options: Vec<ModeOption>,
}

impl ModeSelect {
    pub fn selected(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.selected)
            .map(|o| o.value.as_str())
    }

    /// The call issued when the user picks `mode`. Modes that are not
    /// offered yield `None`.
    pub fn change(&self, mode: &str) -> Option<ServiceCall> {
        self.options.iter().find(|o| o.value == mode).map(|o| {
            ServiceCall::new(Domain::Climate, Service::SetHvacMode, &self.entity_id)
                .with("hvac_mode", Value::String(o.value.clone()))
        })
    }
}

// ── Card ────────────────────────────────────────────────────────────

/// A user interaction addressed to whichever control on a card handles it.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Toggle(bool),
    Brightness(f64),
    Mode(String),
    Temperature(f64),
}

impl Interaction {
    fn control(&self) -> &'static str {
        match self {
            Self::Toggle(_) => "toggle",
            Self::Brightness(_) => "brightness",
            Self::Mode(_) => "mode",
            Self::Temperature(_) => "temperature",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum Element {
    Toggle(Toggle),
    Slider(Slider),
    ModeSelect(ModeSelect),
    /// Read-only measurement, e.g. the current temperature.
    Reading { text: String },
    /// Raw state string for entities without a dedicated card.
    StateText { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub entity_id: String,
    pub title: String,
    pub elements: Vec<Element>,
}

impl Card {
    pub fn toggle(&self) -> Option<&Toggle> {
        self.elements.iter().find_map(|e| match e {
            Element::Toggle(t) => Some(t),
            _ => None,
        })
    }

    pub fn brightness(&self) -> Option<&Slider> {
        self.slider(SliderKind::Brightness)
    }

    pub fn temperature(&self) -> Option<&Slider> {
        self.slider(SliderKind::Temperature)
    }

    pub fn mode_select(&self) -> Option<&ModeSelect> {
        self.elements.iter().find_map(|e| match e {
            Element::ModeSelect(m) => Some(m),
            _ => None,
        })
    }

    /// Route `interaction` to the matching control.
    ///
    /// Fails with `InertControl` when the card has no such control, the
    /// control is disabled, or the requested mode is not offered.
    pub fn interact(&self, interaction: &Interaction) -> Result<ServiceCall, CoreError> {
        let call = match interaction {
            Interaction::Toggle(on) => self.toggle().map(|t| t.change(*on)),
            Interaction::Brightness(v) => self.brightness().and_then(|s| s.change(*v)),
            Interaction::Mode(m) => self.mode_select().and_then(|s| s.change(m)),
            Interaction::Temperature(v) => self.temperature().and_then(|s| s.change(*v)),
        };
        call.ok_or_else(|| CoreError::InertControl {
            entity_id: self.entity_id.clone(),
            control: interaction.control().into(),
        })
    }

    fn slider(&self, kind: SliderKind) -> Option<&Slider> {
        self.elements.iter().find_map(|e| match e {
            Element::Slider(s) if s.kind == kind => Some(s),
            _ => None,
        })
    }
}

// ── Rendering ───────────────────────────────────────────────────────

/// Builds the card for one entity snapshot.
pub fn render(state: &EntityState) -> Card {
    let domain = state.id().ok().and_then(|id| id.known_domain());
    let elements = match domain {
        Some(Domain::Light) => light_elements(state),
        Some(Domain::Switch) => vec![Element::Toggle(toggle(state, Domain::Switch))],
        Some(Domain::Climate) => climate_elements(state),
        None => vec![Element::StateText {
            text: state.state.clone(),
        }],
    };

    Card {
        entity_id: state.entity_id.clone(),
        title: state.friendly_name().to_owned(),
        elements,
    }
}

fn toggle(state: &EntityState, domain: Domain) -> Toggle {
    Toggle {
        entity_id: state.entity_id.clone(),
        domain,
        checked: state.is_on(),
    }
}

fn light_elements(state: &EntityState) -> Vec<Element> {
    let mut elements = vec![Element::Toggle(toggle(state, Domain::Light))];

    // Key presence decides, even when the hub sends `null`.
    if state.attribute("brightness").is_some() {
        elements.push(Element::Slider(Slider {
            entity_id: state.entity_id.clone(),
            kind: SliderKind::Brightness,
            label: "Brightness".into(),
            min: BRIGHTNESS_MIN,
            max: BRIGHTNESS_MAX,
            step: 1.0,
            value: state.number("brightness").unwrap_or(0.0),
            disabled: !state.is_on(),
        }));
    }
    elements
}

fn climate_elements(state: &EntityState) -> Vec<Element> {
    let mut elements = vec![Element::Reading {
        text: current_temperature(state),
    }];

    if let Some(Value::Array(modes)) = state.attribute("hvac_modes") {
        let options = modes
            .iter()
            .filter_map(Value::as_str)
            .map(|mode| ModeOption {
                value: mode.to_owned(),
                label: capitalize(mode),
                selected: mode == state.state,
            })
            .collect();
        elements.push(Element::ModeSelect(ModeSelect {
            entity_id: state.entity_id.clone(),
            options,
        }));
    }

    if let (Some(min), Some(max)) = (state.number("min_temp"), state.number("max_temp")) {
        let value = state
            .number("temperature")
            .or_else(|| state.number("current_temperature"))
            .unwrap_or(min);
        elements.push(Element::Slider(Slider {
            entity_id: state.entity_id.clone(),
            kind: SliderKind::Temperature,
            label: "Target".into(),
            min,
            max,
            step: TEMPERATURE_STEP,
            value,
            disabled: state.state == "off",
        }));
    }
    elements
}

fn current_temperature(state: &EntityState) -> String {
    let reading = match state.attribute("current_temperature") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => MISSING_READING.to_owned(),
    };
    let unit = state.text("temperature_unit").unwrap_or_default();
    format!("{reading}°{unit}")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
