// ── Entity store ──
//
// Concurrent map of the latest snapshot per entity. Writers replace whole
// snapshots; readers get cheap `Arc` clones. Applied changes are fanned
// out on a broadcast channel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::model::{EntityState, StateChange};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Latest known state of every hub entity, keyed by entity id.
pub struct EntityStore {
    entities: DashMap<String, Arc<EntityState>>,
    changes: broadcast::Sender<Arc<StateChange>>,
}

impl EntityStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entities: DashMap::new(),
            changes,
        }
    }

    /// Swap in a full `get_states` snapshot. Entities missing from
    /// `states` are dropped.
    pub fn replace_all(&self, states: Vec<EntityState>) {
        self.entities.clear();
        for state in states {
            self.entities
                .insert(state.entity_id.clone(), Arc::new(state));
        }
        debug!(count = self.entities.len(), "entity snapshot replaced");
    }

    /// Replace or remove one entity and notify subscribers.
    pub fn apply(&self, change: StateChange) {
        match &change.new_state {
            Some(state) => {
                self.entities
                    .insert(change.entity_id.clone(), Arc::new(state.clone()));
            }
            None => {
                self.entities.remove(&change.entity_id);
            }
        }
        // No receivers is fine.
        let _ = self.changes.send(Arc::new(change));
    }

    pub fn get(&self, entity_id: &str) -> Option<Arc<EntityState>> {
        self.entities.get(entity_id).map(|e| Arc::clone(e.value()))
    }

    /// All entities, sorted by id.
    pub fn snapshot(&self) -> Vec<Arc<EntityState>> {
        let mut all: Vec<_> = self.entities.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        all
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StateChange>> {
        self.changes.subscribe()
    }

    /// Applied changes as a `Stream`. Lagged receivers skip what they
    /// missed and keep going.
    pub fn changes(&self) -> impl Stream<Item = Arc<StateChange>> + Send + 'static {
        BroadcastStream::new(self.changes.subscribe()).filter_map(|item| match item {
            Ok(change) => Some(change),
            Err(e) => {
                warn!(error = %e, "state change subscriber lagged");
                None
            }
        })
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
