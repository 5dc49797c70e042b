/**
 * RACK DIRECTORY - Room index and the rack currently shown
 *
 * ROLE: Sole owner of the canonical Rack. Loads the room -> rack index and one
 * rack's full layout; every successful load replaces the held rack wholesale.
 *
 * ORDERING: responses can come back in any order. Each `load` takes a
 * generation number and its response is applied only if no later `load`
 * was issued in the meantime; older responses come back as `Superseded`.
 * `refresh` re-reads the requested rack in place and never changes which
 * rack is requested.
 *
 * FAILURES: a failed load leaves the held state untouched (stale but valid
 * beats blank). Unauthorized is handed back untouched for the auth gate.
 */

use crate::api::ConchApi;
use crate::error::{ConchError, Result};
use crate::models::{Rack, RoomIndex};
use crate::state::{new_state, Shared};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a load that may lose a race against a newer one.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    Applied(T),
    Superseded,
}

impl<T> Loaded<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Loaded::Applied(value) => Some(value),
            Loaded::Superseded => None,
        }
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    rooms: RoomIndex,
    current: Option<Rack>,
    requested: Option<String>,
    generation: u64,
}

pub struct RackDirectory {
    api: Arc<dyn ConchApi>,
    workspace: String,
    state: Shared<DirectoryState>,
}

fn log_load_failure(what: &str, err: &ConchError) {
    if !err.is_unauthorized() {
        warn!(error = %err, "failed to load {what}, keeping previous state");
    }
}

impl RackDirectory {
    pub fn new(api: Arc<dyn ConchApi>, workspace: impl Into<String>) -> Self {
        Self {
            api,
            workspace: workspace.into(),
            state: new_state(DirectoryState::default()),
        }
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub async fn load_rooms(&self) -> Result<RoomIndex> {
        match self.api.rack_rooms(&self.workspace).await {
            Ok(rooms) => {
                info!(rooms = rooms.len(), "loaded rack rooms");
                self.state.lock().rooms = rooms.clone();
                Ok(rooms)
            }
            Err(e) => {
                log_load_failure("rack rooms", &e);
                Err(e)
            }
        }
    }

    /// Navigation load: `rack_id` becomes the requested rack.
    pub async fn load(&self, rack_id: &str) -> Result<Loaded<Rack>> {
        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.requested = Some(rack_id.to_string());
            state.generation
        };
        self.fetch(rack_id, generation).await
    }

    /// Re-fetches `rack_id` without navigating. Does nothing once another
    /// rack has been requested; never changes the requested rack.
    pub async fn refresh(&self, rack_id: &str) -> Result<Loaded<Rack>> {
        let generation = {
            let mut state = self.state.lock();
            if state.requested.as_deref() != Some(rack_id) {
                debug!(rack_id, requested = ?state.requested, "skipping refresh, another rack was requested");
                return Ok(Loaded::Superseded);
            }
            state.generation += 1;
            state.generation
        };
        self.fetch(rack_id, generation).await
    }

    async fn fetch(&self, rack_id: &str, generation: u64) -> Result<Loaded<Rack>> {
        let result = self.api.rack(&self.workspace, rack_id).await;

        let mut state = self.state.lock();
        let stale = state.generation != generation;
        match result {
            Err(ConchError::Unauthorized) => Err(ConchError::Unauthorized),
            _ if stale => {
                debug!(rack_id, generation, latest = state.generation, "discarding superseded rack response");
                Ok(Loaded::Superseded)
            }
            Ok(rack) => {
                debug!(rack_id, slots = rack.slots.len(), "rack loaded");
                state.current = Some(rack.clone());
                Ok(Loaded::Applied(rack))
            }
            Err(e) => {
                log_load_failure(&format!("rack {rack_id}"), &e);
                Err(e)
            }
        }
    }

    pub fn current(&self) -> Option<Rack> {
        self.state.lock().current.clone()
    }

    /// The held rack, only if it is `rack_id`.
    pub fn current_for(&self, rack_id: &str) -> Option<Rack> {
        self.state.lock().current.as_ref().filter(|r| r.id == rack_id).cloned()
    }

    pub fn current_id(&self) -> Option<String> {
        self.state.lock().current.as_ref().map(|r| r.id.clone())
    }

    /// Rack id of the most recent `load` call, whether or not it has answered.
    pub fn requested(&self) -> Option<String> {
        self.state.lock().requested.clone()
    }

    pub fn rooms(&self) -> RoomIndex {
        self.state.lock().rooms.clone()
    }
}
