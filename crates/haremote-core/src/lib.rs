// haremote-core: Entity model, card rendering, and dashboard state
// between haremote-api and the CLI.

pub mod card;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use card::{
    Card, Element, Interaction, ModeOption, ModeSelect, Service, ServiceCall, Slider, SliderKind,
    Toggle, render,
};
pub use dashboard::Dashboard;
pub use error::CoreError;
pub use model::{Domain, EntityId, EntityState, StateChange};
pub use store::EntityStore;
