//! Rack layout view model.
//!
//! `RackSession` is built per navigation to a rack. It owns the transient
//! overlays (edit buffer, success notice) and turns the directory's rack,
//! the relay overlay and those overlays into rows ready for a table renderer.
//! Dropping the session discards its edits.

use crate::api::ConchApi;
use crate::auth::{Access, AuthGate};
use crate::directory::{Loaded, RackDirectory};
use crate::edit_buffer::{next_slot, SlotEditBuffer};
use crate::error::{ConchError, Result};
use crate::health::{classify, is_reporting, HealthCategory};
use crate::models::{Feedback, Health, Rack, Slot, SlotNumber};
use crate::relay::RelayOverlay;
use crate::state::{new_state, Shared};
use crate::submit::{AssignmentSubmitter, SubmitReport, SuccessFlag};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const UNASSIGNED_PLACEHOLDER: &str = "Unassigned";
pub const ASSET_TAG_DISABLED: &str = "Must first assign device";
pub const FLAG_SUBJECT: &str = "[NOTICE] User Flagged Device";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "device", rename_all = "snake_case")]
pub enum ReportLink {
    DeviceReport(String),
    Problem(String),
    NoReport,
}

impl ReportLink {
    fn for_device(id: &str, health: Option<Health>) -> Self {
        match health {
            Some(Health::Pass) => ReportLink::DeviceReport(id.to_string()),
            Some(Health::Fail) => ReportLink::Problem(id.to_string()),
            Some(Health::Unknown) | None => ReportLink::NoReport,
        }
    }

    pub fn href(&self) -> Option<String> {
        match self {
            ReportLink::DeviceReport(id) => Some(format!("/device/{id}")),
            ReportLink::Problem(id) => Some(format!("/problem/{id}")),
            ReportLink::NoReport => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusIndicator {
    pub health: HealthCategory,
    pub reporting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetTagCell {
    /// Empty slot: the field is disabled with [`ASSET_TAG_DISABLED`].
    Disabled,
    Tag(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRow {
    pub slot: SlotNumber,
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub size: Option<u32>,
    pub status: Option<StatusIndicator>,
    pub device_input: String,
    pub placeholder: Option<&'static str>,
    pub highlighted: bool,
    pub dirty: bool,
    pub report: Option<ReportLink>,
    pub asset_tag: AssetTagCell,
    pub flaggable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayBadge {
    pub relay_id: String,
    pub label: String,
}

impl RelayBadge {
    pub fn href(&self) -> String {
        format!("/relay/{}", self.relay_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RackHeader {
    pub id: String,
    pub datacenter: Option<String>,
    pub name: String,
    pub role: Option<String>,
    pub relay: Option<RelayBadge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RackLayout {
    pub header: RackHeader,
    pub rows: Vec<SlotRow>,
    pub assign_success: bool,
    pub has_edits: bool,
}

fn slot_row(
    number: SlotNumber,
    slot: &Slot,
    buffer: &SlotEditBuffer,
    now: OffsetDateTime,
    active_window: time::Duration,
) -> SlotRow {
    let device = slot.occupant.device();
    SlotRow {
        slot: number,
        name: slot.name.clone(),
        vendor: slot.vendor.clone(),
        size: slot.size,
        status: device.map(|d| StatusIndicator {
            health: classify(d),
            reporting: is_reporting(d, now, active_window),
        }),
        device_input: buffer.display_value(number, slot),
        placeholder: device.is_none().then_some(UNASSIGNED_PLACEHOLDER),
        highlighted: buffer.is_highlighted(number, slot),
        dirty: buffer.is_dirty(number),
        report: device.map(|d| ReportLink::for_device(&d.id, d.health)),
        asset_tag: match device {
            Some(d) => AssetTagCell::Tag(d.asset_tag.clone()),
            None => AssetTagCell::Disabled,
        },
        flaggable: device.is_some(),
    }
}

pub struct RackSession {
    rack_id: String,
    api: Arc<dyn ConchApi>,
    gate: Arc<AuthGate>,
    directory: Arc<RackDirectory>,
    relays: Arc<RelayOverlay>,
    buffer: Shared<SlotEditBuffer>,
    submitter: AssignmentSubmitter,
    active_window: time::Duration,
}

pub(crate) struct SessionParts {
    pub api: Arc<dyn ConchApi>,
    pub gate: Arc<AuthGate>,
    pub directory: Arc<RackDirectory>,
    pub relays: Arc<RelayOverlay>,
    pub success_window: Duration,
    pub active_window: time::Duration,
}

impl RackSession {
    pub(crate) fn new(rack_id: &str, highlight: Option<String>, parts: SessionParts) -> Self {
        let mut buffer = SlotEditBuffer::new(highlight);
        if let Some(rack) = parts.directory.current_for(rack_id) {
            buffer.observe(&rack);
        }
        let submitter = AssignmentSubmitter::new(
            parts.api.clone(),
            parts.directory.workspace(),
            parts.success_window,
        );
        Self {
            rack_id: rack_id.to_string(),
            api: parts.api,
            gate: parts.gate,
            directory: parts.directory,
            relays: parts.relays,
            buffer: new_state(buffer),
            submitter,
            active_window: parts.active_window,
        }
    }

    pub fn rack_id(&self) -> &str {
        &self.rack_id
    }

    /// The rack this session shows, once the directory holds it.
    pub fn rack(&self) -> Option<Rack> {
        self.directory.current_for(&self.rack_id)
    }

    pub fn input(&self, slot: SlotNumber, value: impl Into<String>) {
        self.buffer.lock().input(slot, value);
    }

    pub fn pending(&self, slot: SlotNumber) -> Option<String> {
        self.buffer.lock().pending(slot).map(String::from)
    }

    pub fn dirty_slots(&self) -> Vec<SlotNumber> {
        self.buffer.lock().dirty_slots()
    }

    pub fn discard_edits(&self) {
        self.buffer.lock().discard();
    }

    /// Enter in a slot's field: the slot whose field takes focus next, if any.
    pub fn on_enter(&self, slot: SlotNumber) -> Option<SlotNumber> {
        self.rack().and_then(|rack| next_slot(&rack, slot))
    }

    pub fn set_highlight(&self, device_id: Option<String>) {
        self.buffer.lock().set_highlight(device_id);
    }

    pub fn success_flag(&self) -> &SuccessFlag {
        self.submitter.success_flag()
    }

    pub fn assign_success(&self) -> bool {
        self.submitter.success_flag().is_raised()
    }

    pub fn layout(&self) -> Option<RackLayout> {
        self.layout_at(OffsetDateTime::now_utc())
    }

    pub fn layout_at(&self, now: OffsetDateTime) -> Option<RackLayout> {
        let rack = self.rack()?;
        let mut buffer = self.buffer.lock();
        buffer.observe(&rack);

        let rows = rack
            .display_order()
            .map(|(number, slot)| slot_row(number, slot, &buffer, now, self.active_window))
            .collect();
        let relay = self.relays.relay_for(&rack.id).map(|r| RelayBadge {
            relay_id: r.id.clone(),
            label: r.label().to_string(),
        });

        Some(RackLayout {
            header: RackHeader {
                id: rack.id.clone(),
                datacenter: rack.datacenter.clone(),
                name: rack.name.clone(),
                role: rack.role.clone(),
                relay,
            },
            rows,
            assign_success: self.assign_success(),
            has_edits: buffer.has_edits(),
        })
    }

    pub async fn submit(&self) -> Result<Access<SubmitReport>> {
        self.gate
            .require_login(|| async {
                let rack = self.rack().ok_or_else(|| ConchError::RackNotLoaded(self.rack_id.clone()))?;
                self.submitter.assign_devices(&rack, &self.buffer, &self.directory).await
            })
            .await
    }

    /// User-initiated reload. Pending edits stay in place.
    pub async fn reload(&self) -> Result<Access<Loaded<Rack>>> {
        self.gate.require_login(|| self.directory.load(&self.rack_id)).await
    }

    /// Notifies administrators about the device in `slot`. Fire-and-forget:
    /// the handle is returned only so callers can wait if they want to.
    pub fn flag_device(&self, slot: SlotNumber) -> Option<JoinHandle<()>> {
        let rack = self.rack()?;
        let device_id = rack.slot(slot)?.occupant.id()?.to_string();
        let feedback = Feedback {
            subject: FLAG_SUBJECT.to_string(),
            message: format!("Device {device_id} in slot {slot} was flagged by the user."),
        };
        let api = self.api.clone();
        Some(tokio::spawn(async move {
            match api.send_feedback(&feedback).await {
                Ok(()) => info!(device = %device_id, slot, "administrators notified about device"),
                Err(e) => warn!(device = %device_id, slot, error = %e, "failed to flag device"),
            }
        }))
    }
}

impl Drop for RackSession {
    fn drop(&mut self) {
        self.submitter.success_flag().cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceSummary, Occupant};
    use time::macros::datetime;

    #[test]
    fn test_report_links() {
        assert_eq!(ReportLink::for_device("d1", Some(Health::Pass)).href().as_deref(), Some("/device/d1"));
        assert_eq!(ReportLink::for_device("d1", Some(Health::Fail)).href().as_deref(), Some("/problem/d1"));
        assert_eq!(ReportLink::for_device("d1", None), ReportLink::NoReport);
        assert_eq!(ReportLink::NoReport.href(), None);
    }

    #[test]
    fn test_row_for_empty_and_occupied_slots() {
        let now = datetime!(2024-05-01 12:00 UTC);
        let window = time::Duration::minutes(5);
        let buffer = SlotEditBuffer::default();

        let empty = slot_row(3, &Slot::default(), &buffer, now, window);
        assert_eq!(empty.placeholder, Some(UNASSIGNED_PLACEHOLDER));
        assert_eq!(empty.status, None);
        assert_eq!(empty.asset_tag, AssetTagCell::Disabled);
        assert!(!empty.flaggable);
        assert_eq!(empty.device_input, "");

        let device = DeviceSummary {
            health: Some(Health::Pass),
            validated: true,
            asset_tag: Some("AT-1".into()),
            last_seen: Some(datetime!(2024-05-01 11:59 UTC)),
            ..DeviceSummary::new("dev1")
        };
        let slot = Slot {
            name: Some("s4".into()),
            occupant: Occupant::Occupied(device),
            ..Slot::default()
        };
        let row = slot_row(4, &slot, &buffer, now, window);
        assert_eq!(
            row.status,
            Some(StatusIndicator { health: HealthCategory::Validated, reporting: true })
        );
        assert_eq!(row.device_input, "dev1");
        assert_eq!(row.placeholder, None);
        assert_eq!(row.report, Some(ReportLink::DeviceReport("dev1".into())));
        assert_eq!(row.asset_tag, AssetTagCell::Tag(Some("AT-1".into())));
        assert!(row.flaggable);
    }
}
