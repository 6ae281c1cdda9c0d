// ── Dashboard ──
//
// The host element the connection feeds. It keeps the entity store in
// sync with pushed `state_changed` events and turns card interactions
// into commands through whatever `HassOptions` the last handshake
// installed.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde_json::{Map, Value};
use tokio_stream::Stream;
use tracing::{debug, info, warn};

use haremote_api::{Frontend, HassOptions};

use crate::card::{Card, ServiceCall, render};
use crate::error::CoreError;
use crate::model::{EntityState, StateChange};
use crate::store::EntityStore;

/// Entity store plus command entry points, wired to one connection.
pub struct Dashboard {
    store: EntityStore,
    options: ArcSwapOption<HassOptions>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(),
            options: ArcSwapOption::empty(),
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Whether a handshake has installed command entry points.
    pub fn is_attached(&self) -> bool {
        self.options.load().is_some()
    }

    fn options(&self) -> Result<Arc<HassOptions>, CoreError> {
        self.options.load_full().ok_or(CoreError::NotConnected)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Fetch every entity and replace the store's contents.
    pub async fn load_states(&self) -> Result<usize, CoreError> {
        let raw = self.options()?.get_states().await?;
        let states: Vec<EntityState> = serde_json::from_value(raw)
            .map_err(|e| CoreError::Internal(format!("malformed get_states result: {e}")))?;
        let count = states.len();
        self.store.replace_all(states);
        info!(count, "loaded entity states");
        Ok(count)
    }

    /// The hub's configuration object, as returned by `get_config`.
    pub async fn config(&self) -> Result<Value, CoreError> {
        Ok(self.options()?.get_config().await?)
    }

    /// Send a card control's service call.
    ///
    /// The store is not touched; the card changes once the hub pushes
    /// the resulting `state_changed` event.
    pub async fn activate(&self, call: ServiceCall) -> Result<Value, CoreError> {
        let options = self.options()?;
        debug!(
            domain = %call.domain,
            service = %call.service,
            entity_id = call.entity_id().unwrap_or_default(),
            "activating control"
        );
        Ok(options.connection().send_command(call.into()).await?)
    }

    /// Arbitrary service call, outside any card.
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        service_data: Map<String, Value>,
    ) -> Result<Value, CoreError> {
        Ok(self
            .options()?
            .call_service(domain, service, service_data)
            .await?)
    }

    // ── Cards ────────────────────────────────────────────────────────

    pub fn card(&self, entity_id: &str) -> Result<Card, CoreError> {
        self.store
            .get(entity_id)
            .map(|state| render(&state))
            .ok_or_else(|| CoreError::EntityNotFound {
                entity_id: entity_id.to_owned(),
            })
    }

    /// Cards for every stored entity, optionally limited to one domain.
    pub fn cards(&self, domain: Option<&str>) -> Vec<Card> {
        self.store
            .snapshot()
            .iter()
            .filter(|s| domain.is_none_or(|d| in_domain(&s.entity_id, d)))
            .map(|s| render(s))
            .collect()
    }

    pub fn changes(&self) -> impl Stream<Item = Arc<StateChange>> + Send + 'static {
        self.store.changes()
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

/// `true` if `entity_id` is `<domain>.<anything>`.
pub fn in_domain(entity_id: &str, domain: &str) -> bool {
    entity_id
        .split_once('.')
        .is_some_and(|(prefix, _)| prefix == domain)
}

impl Frontend for Dashboard {
    fn set_options(&self, options: HassOptions) {
        debug!("dashboard attached");
        self.options.store(Some(Arc::new(options)));
    }

    fn update_state(&self, data: Value) {
        match serde_json::from_value::<StateChange>(data) {
            Ok(change) => self.store.apply(change),
            Err(e) => warn!(error = %e, "dropping malformed state_changed payload"),
        }
    }

    fn detach(&self) {
        debug!("dashboard detached");
        self.options.store(None);
    }
}
