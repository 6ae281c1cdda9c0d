// ── Entity domain model ──
//
// Snapshots of hub entities as the relay reports them. A snapshot is
// never patched: every update replaces it wholesale.

pub mod entity;
pub mod entity_id;

pub use entity::{EntityState, StateChange};
pub use entity_id::{Domain, EntityId};
