/**
 * DASHBOARD - Per-workspace controller behind the rack pages
 *
 * ROLE: Owns the rack directory, the relay overlay and the auth gate for one
 * workspace, and hands out a fresh `RackSession` on every navigation to a
 * rack. Nothing here is global: two dashboards never share state.
 *
 * FLOW: opening a rack loads the rack and the active relays in parallel.
 * A relay failure is logged and the page still opens; a rack failure is
 * returned to the caller. Unauthorized anywhere ends in `Access::Redirect`.
 */

use crate::api::ConchApi;
use crate::auth::{Access, AuthGate};
use crate::config::ConchConfig;
use crate::directory::RackDirectory;
use crate::error::Result;
use crate::models::{DeviceLocation, Workspace};
use crate::relay::RelayOverlay;
use crate::view::{RackSession, SessionParts};
use crate::workspace::resolve_workspace;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSettings {
    pub success_window: Duration,
    pub active_window: time::Duration,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self::from(&ConchConfig::default())
    }
}

impl From<&ConchConfig> for ViewSettings {
    fn from(cfg: &ConchConfig) -> Self {
        Self {
            success_window: cfg.assign_success_window(),
            active_window: cfg.active_window(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RackListItem {
    pub id: String,
    pub name: String,
    pub role: Option<String>,
    pub size: Option<u32>,
    /// The rack the directory currently holds.
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomListing {
    pub room: String,
    pub racks: Vec<RackListItem>,
}

pub struct Dashboard {
    api: Arc<dyn ConchApi>,
    gate: Arc<AuthGate>,
    workspace: Workspace,
    directory: Arc<RackDirectory>,
    relays: Arc<RelayOverlay>,
    settings: ViewSettings,
}

impl Dashboard {
    pub fn new(api: Arc<dyn ConchApi>, gate: Arc<AuthGate>, workspace: Workspace, settings: ViewSettings) -> Self {
        let directory = Arc::new(RackDirectory::new(api.clone(), workspace.id.clone()));
        let relays = Arc::new(RelayOverlay::new(api.clone(), workspace.id.clone()));
        Self { api, gate, workspace, directory, relays, settings }
    }

    /// Resolves the workspace behind the login gate and builds the dashboard for it.
    pub async fn connect(api: Arc<dyn ConchApi>, gate: Arc<AuthGate>, cfg: &ConchConfig) -> Result<Access<Self>> {
        let preferred = cfg.workspace.as_deref();
        let access = gate.require_login(|| resolve_workspace(api.as_ref(), preferred)).await?;
        Ok(access.map(|workspace| {
            info!(workspace = %workspace.name, "dashboard ready");
            Self::new(api.clone(), gate.clone(), workspace, ViewSettings::from(cfg))
        }))
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    pub fn directory(&self) -> &RackDirectory {
        &self.directory
    }

    pub fn relays(&self) -> &RelayOverlay {
        &self.relays
    }

    /// Rack list page: active relays and the room index, loaded side by side.
    pub async fn load_rack_list(&self) -> Result<Access<Vec<RoomListing>>> {
        let access = self
            .gate
            .require_login(|| async {
                let (relays, rooms) =
                    tokio::join!(self.relays.load_active_relays(), self.directory.load_rooms());
                if let Err(e) = relays {
                    if e.is_unauthorized() {
                        return Err(e);
                    }
                }
                rooms.map(|_| ())
            })
            .await?;
        Ok(access.map(|()| self.rack_list()))
    }

    /// Rooms in name order with the held rack marked active.
    pub fn rack_list(&self) -> Vec<RoomListing> {
        let current = self.directory.current_id();
        self.directory
            .rooms()
            .into_iter()
            .map(|(room, racks)| RoomListing {
                room,
                racks: racks
                    .into_iter()
                    .map(|r| RackListItem {
                        active: current.as_deref() == Some(r.id.as_str()),
                        id: r.id,
                        name: r.name,
                        role: r.role,
                        size: r.size,
                    })
                    .collect(),
            })
            .collect()
    }

    /// Navigation to a rack page. `highlight` is the `device` deep-link parameter.
    pub async fn open_rack(&self, rack_id: &str, highlight: Option<String>) -> Result<Access<RackSession>> {
        let access = self
            .gate
            .require_login(|| async {
                let (rack, relays) =
                    tokio::join!(self.directory.load(rack_id), self.relays.load_active_relays());
                if let Err(e) = relays {
                    if e.is_unauthorized() {
                        return Err(e);
                    }
                }
                rack
            })
            .await?;

        Ok(access.map(|loaded| {
            debug!(rack_id, applied = loaded.applied().is_some(), "rack page opened");
            RackSession::new(rack_id, highlight, self.session_parts())
        }))
    }

    /// `None` when the device has no location; that is not an error.
    pub async fn locate_device(&self, device_id: &str) -> Result<Access<Option<DeviceLocation>>> {
        self.gate.require_login(|| self.api.device_location(device_id)).await
    }

    /// Opens the rack a device sits in, with that device highlighted.
    pub async fn open_device(&self, device_id: &str) -> Result<Access<Option<RackSession>>> {
        let location = match self.locate_device(device_id).await? {
            Access::Granted(location) => location,
            Access::Redirect => return Ok(Access::Redirect),
        };
        let Some(location) = location else {
            debug!(device_id, "device has no rack location");
            return Ok(Access::Granted(None));
        };
        let session = self.open_rack(&location.rack.id, Some(device_id.to_string())).await?;
        Ok(session.map(Some))
    }

    fn session_parts(&self) -> SessionParts {
        SessionParts {
            api: self.api.clone(),
            gate: self.gate.clone(),
            directory: self.directory.clone(),
            relays: self.relays.clone(),
            success_window: self.settings.success_window,
            active_window: self.settings.active_window,
        }
    }
}
