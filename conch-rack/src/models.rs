//! Wire and domain types for racks, slots, devices and relays.
//!
//! Shapes follow the backend JSON contract. Anything the backend has sent in
//! more than one shape over time (occupants, validated markers, health
//! strings) is normalised here so the rest of the crate sees one canonical form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Rack-unit position of a slot. Larger numbers sit higher in the rack.
pub type SlotNumber = u32;

/// Room name -> racks in that room. `BTreeMap` keeps rooms sorted by name.
pub type RoomIndex = BTreeMap<String, Vec<RackSummary>>;

/// Device id -> slot number, the body of a layout submission.
pub type Assignments = BTreeMap<String, SlotNumber>;

/// Raw validation outcome as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Health {
    Pass,
    Fail,
    Unknown,
}

impl<'de> Deserialize<'de> for Health {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_uppercase().as_str() {
            "PASS" => Health::Pass,
            "FAIL" => Health::Fail,
            _ => Health::Unknown,
        })
    }
}

/// What the rack view knows about the device installed in a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    #[serde(default)]
    pub health: Option<Health>,
    #[serde(default, deserialize_with = "truthy_marker")]
    pub validated: bool,
    #[serde(default, deserialize_with = "truthy_marker")]
    pub graduated: bool,
    #[serde(default)]
    pub asset_tag: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
}

impl DeviceSummary {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            health: None,
            validated: false,
            graduated: false,
            asset_tag: None,
            last_seen: None,
        }
    }

    /// Either marker counts; older backends only send `graduated`.
    pub fn is_validated(&self) -> bool {
        self.validated || self.graduated
    }
}

/// Accepts `true`/`false`, a timestamp string, a number or null.
fn truthy_marker<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
        Some(serde_json::Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(_) => true,
    })
}

/// Canonical occupancy of a slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Occupant {
    #[default]
    Empty,
    Occupied(DeviceSummary),
}

impl Occupant {
    pub fn device(&self) -> Option<&DeviceSummary> {
        match self {
            Occupant::Empty => None,
            Occupant::Occupied(device) => Some(device),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.device().map(|d| d.id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Occupant::Empty)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireOccupant {
    Id(String),
    Device(DeviceSummary),
}

impl<'de> Deserialize<'de> for Occupant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<WireOccupant>::deserialize(deserializer)? {
            None => Occupant::Empty,
            Some(WireOccupant::Id(id)) if id.trim().is_empty() => Occupant::Empty,
            Some(WireOccupant::Id(id)) => Occupant::Occupied(DeviceSummary::new(id)),
            Some(WireOccupant::Device(device)) => Occupant::Occupied(device),
        })
    }
}

impl Serialize for Occupant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Occupant::Empty => serializer.serialize_none(),
            Occupant::Occupied(device) => device.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Slot {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub occupant: Occupant,
}

/// Full layout of one rack, replaced wholesale on every load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rack {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub slots: BTreeMap<SlotNumber, Slot>,
}

impl Rack {
    pub fn slot(&self, number: SlotNumber) -> Option<&Slot> {
        self.slots.get(&number)
    }

    /// Slots top of rack first, the order rows are displayed in.
    pub fn display_order(&self) -> impl Iterator<Item = (SlotNumber, &Slot)> {
        self.slots.iter().rev().map(|(n, s)| (*n, s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RackSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayLocation {
    pub rack_id: String,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub rack_name: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayDevice {
    pub id: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relay {
    pub id: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub ipaddr: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated: Option<OffsetDateTime>,
    #[serde(default)]
    pub location: Option<RelayLocation>,
    #[serde(default)]
    pub devices: Vec<RelayDevice>,
}

impl Relay {
    /// Display name: the alias when set, the id otherwise.
    pub fn label(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.id,
        }
    }

    pub fn rack_id(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.rack_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDatacenter {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRack {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub unit: Option<SlotNumber>,
}

/// Where a device is installed, as answered by `/device/{id}/location`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceLocation {
    #[serde(default)]
    pub datacenter: Option<LocationDatacenter>,
    pub rack: LocationRack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub user: String,
    pub password: String,
}
